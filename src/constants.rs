//! Shared constants/defaults for the pipeline
//!

/// Image model used when nothing else is configured.
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1.5";

/// Text model used to write stories.
pub const DEFAULT_TEXT_MODEL: &str = "gpt-5.2";

/// Base URL for the OpenAI API.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Size requested from the image API.
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

/// How many sentences end up on each page.
pub const DEFAULT_SENTENCES_PER_PAGE: usize = 3;

/// Wrap width for the overlay text, in characters.
pub const DEFAULT_MAX_TEXT_WIDTH_CHARS: usize = 40;

/// Default font size for the page text, in pixels.
pub const DEFAULT_FONT_SIZE: f32 = 30.0;

/// Default font file for the page text.
pub const DEFAULT_FONT_PATH: &str = "PlayfairDisplaySC-Regular.otf";

/// Gap between the text block and the bottom edge of the page.
pub const TEXT_BOTTOM_MARGIN: u32 = 20;

/// Padding between the text block and its background box.
pub const TEXT_BOX_PADDING: u32 = 10;

/// Alpha of the tinted box behind the text.
pub const TEXT_BOX_ALPHA: u8 = 128;

/// Default number of pages rendered at once.
pub const DEFAULT_PAGE_CONCURRENCY: usize = 4;

/// Directory (under the public root) holding every storybook.
pub const STORYBOOKS_DIR: &str = "storybooks";

/// Default public assets root.
pub const DEFAULT_PUBLIC_DIR: &str = "static";

/// Default catalog file.
pub const DEFAULT_CATALOG_FILE: &str = "storybooks.json";

/// Title used when the story text carried no structured payload.
pub const UNTITLED_STORY_TITLE: &str = "Generated Story";

/// Request timeout for the OpenAI API, in seconds.
pub const OPENAI_TIMEOUT_SECONDS: u64 = 300;
