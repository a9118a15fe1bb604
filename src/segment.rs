//! Splitting a narrative into pages.
//!
//! Sentences are found by splitting on `". "`, which means abbreviations and
//! decimals ("Mr. Fox", "3. 5") get split too. That's a known limitation.

use std::num::NonZeroUsize;

use tracing::debug;

use crate::document::StoryDocument;
use crate::error::SegmentationError;

const SENTENCE_DELIMITER: &str = ". ";

/// One page of the storybook: some narrative and the prompt to illustrate it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    /// Zero-based reading position
    pub index: usize,
    /// Narrative text printed on the page
    pub text: String,
    /// The scene prompt this page was paired with
    pub scene_prompt: String,
    /// Self-contained prompt sent to the image model
    pub image_prompt: String,
}

/// Pages in reading order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageSet {
    pages: Vec<Page>,
}

impl PageSet {
    /// The pages, in reading order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Number of pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True when there are no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl IntoIterator for PageSet {
    type Item = Page;
    type IntoIter = std::vec::IntoIter<Page>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

/// Splits the document's narrative into pages of `sentences_per_page` sentences.
///
/// Page `i` gets prompt `i`; once the prompts run out every remaining page
/// reuses the last one. Prompts never wrap around to the start.
pub fn segment(
    doc: &StoryDocument,
    sentences_per_page: NonZeroUsize,
) -> Result<PageSet, SegmentationError> {
    let sentences = split_sentences(&doc.narrative);
    if sentences.is_empty() {
        return Err(SegmentationError::EmptyNarrative);
    }
    let pages: Vec<Page> = sentences
        .chunks(sentences_per_page.get())
        .enumerate()
        .map(|(index, chunk)| {
            let text = join_sentences(chunk);
            // no prompts at all only happens for hand-built documents
            let scene_prompt = doc
                .image_prompts
                .get(index)
                .or(doc.image_prompts.last())
                .cloned()
                .unwrap_or_else(|| text.clone());
            let image_prompt = enrich_prompt(&text, &scene_prompt);
            Page {
                index,
                text,
                scene_prompt,
                image_prompt,
            }
        })
        .collect();

    debug!(
        "Segmented {} sentences into {} pages ({} prompts)",
        sentences.len(),
        pages.len(),
        doc.image_prompts.len()
    );
    Ok(PageSet { pages })
}

/// Builds the prompt sent to the image model for a page.
///
/// Pure function of its inputs, so identical pages hash to identical prompts.
pub fn enrich_prompt(text: &str, scene_prompt: &str) -> String {
    format!(
        "Story context, between the $ symbols: ${text}$. \
         Illustrate this moment as a page from a children's storybook, showing: {scene_prompt}"
    )
}

fn split_sentences(narrative: &str) -> Vec<&str> {
    narrative
        .split(SENTENCE_DELIMITER)
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .collect()
}

/// Joins a chunk back together, putting back the full stop the split ate.
fn join_sentences(chunk: &[&str]) -> String {
    let mut text = chunk.join(SENTENCE_DELIMITER);
    if !text.ends_with(['.', '!', '?', '"', '\'']) {
        text.push('.');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAT_STORY: &str =
        "A cat woke up. It stretched. It yawned. Then it ate breakfast. It played outside.";

    fn doc(narrative: &str, prompts: &[&str]) -> StoryDocument {
        StoryDocument {
            title: "Cat".to_string(),
            narrative: narrative.to_string(),
            moral: String::new(),
            image_prompts: prompts.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn three() -> NonZeroUsize {
        NonZeroUsize::new(3).expect("non-zero")
    }

    #[test]
    fn cat_story_makes_two_pages() {
        let pages = segment(&doc(CAT_STORY, &["a sleepy cat", "a cat eating"]), three())
            .expect("segment");
        assert_eq!(pages.len(), 2);

        let first = &pages.pages()[0];
        assert_eq!(first.index, 0);
        assert_eq!(first.text, "A cat woke up. It stretched. It yawned.");
        assert_eq!(first.scene_prompt, "a sleepy cat");

        let second = &pages.pages()[1];
        assert_eq!(second.index, 1);
        assert_eq!(second.text, "Then it ate breakfast. It played outside.");
        assert_eq!(second.scene_prompt, "a cat eating");
    }

    #[test]
    fn short_prompt_list_reuses_last_prompt() {
        let pages = segment(&doc(CAT_STORY, &["a sleepy cat"]), three()).expect("segment");
        assert_eq!(pages.len(), 2);
        assert!(pages.pages().iter().all(|p| p.scene_prompt == "a sleepy cat"));

        let one = NonZeroUsize::new(1).expect("non-zero");
        let pages = segment(&doc(CAT_STORY, &["first", "second"]), one).expect("segment");
        let prompts: Vec<&str> = pages.pages().iter().map(|p| p.scene_prompt.as_str()).collect();
        assert_eq!(prompts, vec!["first", "second", "second", "second", "second"]);
    }

    #[test]
    fn page_count_is_ceiling_of_sentences() {
        for sentence_count in 1usize..=10 {
            let narrative = (0..sentence_count)
                .map(|n| format!("Sentence number {n}"))
                .collect::<Vec<_>>()
                .join(". ");
            let pages = segment(&doc(&narrative, &["p"]), three()).expect("segment");
            assert_eq!(pages.len(), sentence_count.div_ceil(3));
            for (expected_index, page) in pages.pages().iter().enumerate() {
                assert_eq!(page.index, expected_index);
                assert!(page.text.split(". ").count() <= 3);
            }
            let first = &pages.pages()[0];
            assert!(first.text.starts_with("Sentence number 0"));
        }
    }

    #[test]
    fn enriched_prompt_is_deterministic() {
        let a = enrich_prompt("A cat woke up.", "a sleepy cat");
        let b = enrich_prompt("A cat woke up.", "a sleepy cat");
        assert_eq!(a, b);
        assert!(a.contains("$A cat woke up.$"));
        assert!(a.contains("a sleepy cat"));
        assert!(a.contains("children's storybook"));
        assert_ne!(a, enrich_prompt("A cat woke up.", "a cat eating"));
    }

    #[test]
    fn missing_prompts_fall_back_to_page_text() {
        let pages = segment(&doc("A cat napped. The end.", &[]), three()).expect("segment");
        assert_eq!(pages.pages()[0].scene_prompt, "A cat napped. The end.");
    }

    #[test]
    fn empty_narrative_fails() {
        for narrative in ["", "   ", ". ", " .  . "] {
            assert_eq!(
                segment(&doc(narrative, &["p"]), three()),
                Err(SegmentationError::EmptyNarrative),
                "{narrative:?}"
            );
        }
    }

    #[test]
    fn abbreviations_split_like_sentences() {
        let pages = segment(
            &doc("Mr. Fox ran. He hid.", &["fox"]),
            NonZeroUsize::new(1).expect("non-zero"),
        )
        .expect("segment");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages.pages()[0].text, "Mr.");
    }
}
