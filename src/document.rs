//! Story documents, as written by the text model.

use serde::Deserialize;
use tracing::debug;

use crate::constants::UNTITLED_STORY_TITLE;
use crate::error::ParseError;

/// A parsed story, ready to be split into pages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoryDocument {
    /// Story title as the model wrote it
    pub title: String,
    /// The story body
    pub narrative: String,
    /// The moral of the story
    pub moral: String,
    /// Scene prompts, in reading order
    pub image_prompts: Vec<String>,
}

/// Wire shape of the payload; every field is optional so we can name the missing one.
#[derive(Deserialize)]
struct StoryPayload {
    title: Option<String>,
    story: Option<String>,
    moral: Option<String>,
    #[serde(rename = "imagePrompts")]
    image_prompts: Option<Vec<String>>,
}

impl StoryDocument {
    /// Extracts the story payload embedded in `raw`.
    ///
    /// Models like to wrap their JSON in chatter, so the payload is taken to be
    /// everything from the first `{` to the last `}`.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let payload = embedded_payload(raw).ok_or(ParseError::NoPayloadFound)?;
        let parsed: StoryPayload = serde_json::from_str(payload).map_err(|err| {
            debug!("Failed to deserialize story payload: {}", err);
            ParseError::MalformedPayload(err)
        })?;

        let title = required("title", parsed.title)?;
        let narrative = required("story", parsed.story)?;
        let moral = parsed.moral.ok_or(ParseError::MissingField("moral"))?;
        let image_prompts = parsed
            .image_prompts
            .filter(|prompts| !prompts.is_empty())
            .ok_or(ParseError::MissingField("imagePrompts"))?;

        Ok(Self {
            title,
            narrative,
            moral,
            image_prompts,
        })
    }

    /// Treats the whole text as the story, for when the model skipped the JSON.
    ///
    /// The narrative doubles as the only image prompt.
    pub fn untitled(raw: &str) -> Self {
        let narrative = raw.trim().to_string();
        Self {
            title: UNTITLED_STORY_TITLE.to_string(),
            image_prompts: vec![narrative.clone()],
            narrative,
            moral: String::new(),
        }
    }
}

fn embedded_payload(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    raw.get(start..=end)
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ParseError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or(ParseError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"title": "The Brave Cat", "story": "A cat woke up. It stretched.", "moral": "Be brave.", "imagePrompts": ["a sleepy cat", "a cat stretching"]}"#;

    #[test]
    fn parses_payload_surrounded_by_noise() {
        for raw in [
            PAYLOAD.to_string(),
            format!("Sure! Here is your story:\n{PAYLOAD}\nHope you like it."),
            format!("```json\n{PAYLOAD}\n```"),
        ] {
            let doc = StoryDocument::parse(&raw).expect("parse story");
            assert_eq!(doc.title, "The Brave Cat");
            assert_eq!(doc.narrative, "A cat woke up. It stretched.");
            assert_eq!(doc.moral, "Be brave.");
            assert_eq!(doc.image_prompts, vec!["a sleepy cat", "a cat stretching"]);
        }
    }

    #[test]
    fn braces_inside_strings_are_kept() {
        let raw = r#"noise {"title": "T", "story": "A {curly} tale.", "moral": "", "imagePrompts": ["p"]} trailing"#;
        let doc = StoryDocument::parse(raw).expect("parse story");
        assert_eq!(doc.narrative, "A {curly} tale.");
        assert_eq!(doc.moral, "");
    }

    #[test]
    fn no_braces_is_no_payload() {
        assert!(matches!(
            StoryDocument::parse("Once upon a time there was a cat."),
            Err(ParseError::NoPayloadFound)
        ));
        assert!(matches!(
            StoryDocument::parse("only an opening { here"),
            Err(ParseError::NoPayloadFound)
        ));
        assert!(matches!(
            StoryDocument::parse("backwards } braces {"),
            Err(ParseError::NoPayloadFound)
        ));
    }

    #[test]
    fn broken_json_is_malformed() {
        assert!(matches!(
            StoryDocument::parse(r#"{"title": "T", "story": }"#),
            Err(ParseError::MalformedPayload(_))
        ));
        assert!(matches!(
            StoryDocument::parse(r#"{"title": 7, "story": "s", "moral": "m", "imagePrompts": ["p"]}"#),
            Err(ParseError::MalformedPayload(_))
        ));
    }

    #[test]
    fn missing_fields_are_named() {
        let cases = [
            (r#"{"story": "s", "moral": "m", "imagePrompts": ["p"]}"#, "title"),
            (r#"{"title": "t", "moral": "m", "imagePrompts": ["p"]}"#, "story"),
            (r#"{"title": "t", "story": "s", "imagePrompts": ["p"]}"#, "moral"),
            (r#"{"title": "t", "story": "s", "moral": "m"}"#, "imagePrompts"),
            (r#"{"title": "t", "story": "s", "moral": "m", "imagePrompts": []}"#, "imagePrompts"),
            (r#"{"title": "  ", "story": "s", "moral": "m", "imagePrompts": ["p"]}"#, "title"),
        ];
        for (raw, field) in cases {
            match StoryDocument::parse(raw) {
                Err(ParseError::MissingField(missing)) => assert_eq!(missing, field, "{raw}"),
                other => panic!("expected missing {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn untitled_uses_whole_text() {
        let doc = StoryDocument::untitled("  A cat napped. The end.  ");
        assert_eq!(doc.title, UNTITLED_STORY_TITLE);
        assert_eq!(doc.narrative, "A cat napped. The end.");
        assert_eq!(doc.image_prompts, vec!["A cat napped. The end."]);
    }
}
