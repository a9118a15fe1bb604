//! Turns a page set into finished page images on disk.
//!
//! A storybook is all or nothing: if any page fails, sibling pages are
//! cancelled, the half-written folder is removed and the error is returned.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::constants::STORYBOOKS_DIR;
use crate::document::StoryDocument;
use crate::error::{AssemblyError, CompositeError};
use crate::overlay::TextOverlay;
use crate::provider::ImageProvider;
use crate::segment::{Page, PageSet};

/// Characters that never make it into a title or folder name.
const UNSAFE_TITLE_CHARS: &[char] = &[
    '?', ';', ':', '%', '#', '@', '*', '&', '^', '$', '!', '<', '>', ',', '\\', '/',
];

/// A finished page on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
    /// Reading position
    pub index: usize,
    /// Absolute path of the composited image
    pub image_path: PathBuf,
}

/// Everything a viewer needs to show a finished storybook.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorybookManifest {
    /// Sanitized title
    pub title: String,
    /// Storybook folder relative to the public root, eg `storybooks/Cat_1700000000`
    pub output_directory: PathBuf,
    /// Pages in reading order
    pub pages: Vec<RenderedPage>,
}

impl StorybookManifest {
    /// Page image paths in reading order.
    pub fn image_paths(&self) -> Vec<PathBuf> {
        self.pages.iter().map(|page| page.image_path.clone()).collect()
    }
}

/// Replaces characters that don't belong in paths or markup with spaces.
///
/// Runs of unsafe characters collapse into a single space.
pub fn sanitize_title(title: &str) -> String {
    let mut sanitized = String::with_capacity(title.len());
    let mut in_run = false;
    for c in title.chars() {
        if UNSAFE_TITLE_CHARS.contains(&c) {
            if !in_run {
                sanitized.push(' ');
            }
            in_run = true;
        } else {
            sanitized.push(c);
            in_run = false;
        }
    }
    sanitized
}

/// Folder name for a storybook: title with underscores, plus the creation time.
pub fn storybook_dir_name(sanitized_title: &str, epoch_seconds: i64) -> String {
    format!("{}_{}", sanitized_title.replace(' ', "_"), epoch_seconds)
}

/// File name for page `index`.
pub fn page_file_name(index: usize) -> String {
    format!("page_{index}.png")
}

/// Drives the image provider and the overlay to produce a storybook.
#[derive(Clone)]
pub struct StorybookAssembler {
    provider: Arc<dyn ImageProvider>,
    overlay: Arc<TextOverlay>,
    config: PipelineConfig,
}

impl std::fmt::Debug for StorybookAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorybookAssembler")
            .field("overlay", &self.overlay)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StorybookAssembler {
    /// New assembler; pages are written below `config.public_dir`.
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        overlay: TextOverlay,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            overlay: Arc::new(overlay),
            config,
        }
    }

    /// The config this assembler was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Renders every page and writes it into a fresh storybook folder.
    pub async fn assemble(
        &self,
        doc: &StoryDocument,
        pages: PageSet,
    ) -> Result<StorybookManifest, AssemblyError> {
        let title = sanitize_title(&doc.title);
        let dir_name = storybook_dir_name(&title, chrono::Utc::now().timestamp());
        let output_dir = self.create_output_dir(&dir_name).await?;
        let page_count = pages.len();
        info!(
            "Assembling '{}' ({} pages) into {}",
            title,
            page_count,
            output_dir.display()
        );

        let rendered = match self.render_pages(&output_dir, pages).await {
            Ok(rendered) => rendered,
            Err(err) => {
                error!("Storybook '{}' failed: {}", title, err);
                if let Err(cleanup_err) = tokio::fs::remove_dir_all(&output_dir).await {
                    warn!(
                        "Failed to clean up {}: {}",
                        output_dir.display(),
                        cleanup_err
                    );
                }
                return Err(err);
            }
        };

        info!("Storybook '{}' finished with {} pages", title, rendered.len());
        Ok(StorybookManifest {
            title,
            output_directory: Path::new(STORYBOOKS_DIR).join(dir_name),
            pages: rendered,
        })
    }

    async fn create_output_dir(&self, dir_name: &str) -> Result<PathBuf, AssemblyError> {
        let parent = self.config.storybooks_dir();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|source| AssemblyError::DirectoryCreateFailed {
                path: parent.clone(),
                source,
            })?;

        // create_dir (not _all) so two runs can never share a folder
        let output_dir = parent.join(dir_name);
        tokio::fs::create_dir(&output_dir)
            .await
            .map_err(|source| AssemblyError::DirectoryCreateFailed {
                path: output_dir.clone(),
                source,
            })?;

        Ok(std::path::absolute(&output_dir).unwrap_or(output_dir))
    }

    async fn render_pages(
        &self,
        output_dir: &Path,
        pages: PageSet,
    ) -> Result<Vec<RenderedPage>, AssemblyError> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.get()));
        let mut tasks = JoinSet::new();

        for page in pages {
            let semaphore = semaphore.clone();
            let provider = self.provider.clone();
            let overlay = self.overlay.clone();
            let model = self.config.image_model.clone();
            let negative_prompt = self.config.negative_prompt.clone();
            let output_dir = output_dir.to_path_buf();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|err| AssemblyError::TaskFailed(err.to_string()))?;
                render_page(
                    provider.as_ref(),
                    &overlay,
                    &model,
                    &negative_prompt,
                    &output_dir,
                    page,
                )
                .await
            });
        }

        let mut rendered = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|err| AssemblyError::TaskFailed(err.to_string()))
                .and_then(|page| page);
            match result {
                Ok(page) => rendered.push(page),
                Err(err) => {
                    tasks.abort_all();
                    // let aborted pages settle before the folder is removed
                    while tasks.join_next().await.is_some() {}
                    return Err(err);
                }
            }
        }

        rendered.sort_by_key(|page| page.index);
        Ok(rendered)
    }
}

async fn render_page(
    provider: &dyn ImageProvider,
    overlay: &TextOverlay,
    model: &str,
    negative_prompt: &str,
    output_dir: &Path,
    page: Page,
) -> Result<RenderedPage, AssemblyError> {
    debug!("Generating image for page {}", page.index);
    let raw = provider
        .generate_image(model, &page.image_prompt, negative_prompt)
        .await
        .map_err(|source| AssemblyError::ProviderFailed {
            index: page.index,
            source,
        })?;

    let png = composite_page(overlay, &raw, &page.text).map_err(|source| {
        AssemblyError::CompositeFailed {
            index: page.index,
            source,
        }
    })?;

    let image_path = output_dir.join(page_file_name(page.index));
    tokio::fs::write(&image_path, png)
        .await
        .map_err(|source| AssemblyError::WriteFailed {
            path: image_path.clone(),
            source,
        })?;

    debug!("Wrote page {} to {}", page.index, image_path.display());
    Ok(RenderedPage {
        index: page.index,
        image_path,
    })
}

/// Decodes the provider's image, draws the page text and encodes a PNG.
fn composite_page(overlay: &TextOverlay, raw: &[u8], text: &str) -> Result<Vec<u8>, CompositeError> {
    let image = image::load_from_memory(raw).map_err(CompositeError::Decode)?;
    let page = overlay.overlay(&image, text)?;

    let mut output = Cursor::new(Vec::new());
    page.write_to(&mut output, ImageFormat::Png)
        .map_err(CompositeError::Encode)?;
    Ok(output.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_title("Cat's Big Day! #1"), "Cat's Big Day   1");
        assert_eq!(sanitize_title("A/B\\C"), "A B C");
        assert_eq!(sanitize_title("<b>Bold</b>"), " b Bold b ");
        assert_eq!(sanitize_title("Wow?!;:"), "Wow ");
        assert_eq!(sanitize_title("Plain Title"), "Plain Title");
        assert_eq!(sanitize_title("50%off"), "50 off");
    }

    #[test]
    fn dir_name_uses_underscores_and_timestamp() {
        assert_eq!(
            storybook_dir_name("Cats Big Day", 1_700_000_000),
            "Cats_Big_Day_1700000000"
        );
        assert_eq!(page_file_name(3), "page_3.png");
    }

    #[test]
    fn manifest_image_paths_follow_page_order() {
        let manifest = StorybookManifest {
            title: "t".to_string(),
            output_directory: PathBuf::from("storybooks/t_1"),
            pages: vec![
                RenderedPage {
                    index: 0,
                    image_path: PathBuf::from("/a/page_0.png"),
                },
                RenderedPage {
                    index: 1,
                    image_path: PathBuf::from("/a/page_1.png"),
                },
            ],
        };
        assert_eq!(
            manifest.image_paths(),
            vec![PathBuf::from("/a/page_0.png"), PathBuf::from("/a/page_1.png")]
        );
    }
}
