//! Story text in, storybook out.

use tracing::{info, warn};

use crate::assemble::{StorybookAssembler, StorybookManifest};
use crate::document::StoryDocument;
use crate::error::{ParseError, StorybookError};
use crate::segment::segment;

/// What to do when the story text has no usable structured payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UntitledPolicy {
    /// Fail the request
    #[default]
    Reject,
    /// Treat the whole text as an untitled story
    Accept,
}

/// Rejects prompts that are empty or a single word.
pub fn validate_prompt(prompt: &str) -> Result<&str, StorybookError> {
    let prompt = prompt.trim();
    if prompt.split_whitespace().count() <= 1 {
        return Err(StorybookError::InvalidPrompt);
    }
    Ok(prompt)
}

/// Parse, segment and assemble.
#[derive(Clone, Debug)]
pub struct Pipeline {
    assembler: StorybookAssembler,
    untitled: UntitledPolicy,
}

impl Pipeline {
    /// Pipeline that fails on story text without a payload.
    pub fn new(assembler: StorybookAssembler) -> Self {
        Self {
            assembler,
            untitled: UntitledPolicy::default(),
        }
    }

    /// Sets what happens to story text without a usable payload.
    pub fn with_untitled_policy(mut self, policy: UntitledPolicy) -> Self {
        self.untitled = policy;
        self
    }

    /// Parses the story out of `raw_text`, honouring the untitled policy.
    pub fn document(&self, raw_text: &str) -> Result<StoryDocument, StorybookError> {
        match StoryDocument::parse(raw_text) {
            Ok(doc) => Ok(doc),
            Err(err @ (ParseError::NoPayloadFound | ParseError::MalformedPayload(_)))
                if self.untitled == UntitledPolicy::Accept =>
            {
                warn!("No usable story payload ({}), using the text as-is", err);
                Ok(StoryDocument::untitled(raw_text))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Runs the whole pipeline. Nothing is generated unless parsing and
    /// segmenting both succeed.
    pub async fn run(&self, raw_text: &str) -> Result<StorybookManifest, StorybookError> {
        let doc = self.document(raw_text)?;
        let pages = segment(&doc, self.assembler.config().sentences_per_page)?;
        info!("'{}' split into {} pages", doc.title, pages.len());
        Ok(self.assembler.assemble(&doc, pages).await?)
    }
}
