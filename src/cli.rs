//! CLI parser
use clap::{Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_CATALOG_FILE, DEFAULT_FONT_PATH, DEFAULT_FONT_SIZE, DEFAULT_IMAGE_MODEL,
    DEFAULT_MAX_TEXT_WIDTH_CHARS, DEFAULT_PAGE_CONCURRENCY, DEFAULT_PUBLIC_DIR,
    DEFAULT_SENTENCES_PER_PAGE, DEFAULT_TEXT_MODEL,
};

fn non_zero(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
}

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "STORYBOOK_DEBUG")]
    /// Enable debug logging. Env: STORYBOOK_DEBUG
    pub debug: bool,

    #[clap(long, default_value = DEFAULT_PUBLIC_DIR, env = "STORYBOOK_PUBLIC_DIR")]
    /// Public assets root, storybooks go in `<public_dir>/storybooks/`.
    /// Env: STORYBOOK_PUBLIC_DIR
    pub public_dir: PathBuf,

    #[clap(long, default_value = DEFAULT_CATALOG_FILE, env = "STORYBOOK_CATALOG")]
    /// Catalog file listing every storybook. Env: STORYBOOK_CATALOG
    pub catalog: PathBuf,

    #[command(subcommand)]
    /// What to do
    pub command: Command,
}

#[derive(Subcommand, Debug)]
/// Subcommands
pub enum Command {
    /// Write a story from a prompt, then illustrate it
    Generate {
        /// What the story should be about, eg "a shy dragon learns to sing"
        prompt: String,

        #[clap(long, default_value = DEFAULT_TEXT_MODEL, env = "STORYBOOK_TEXT_MODEL")]
        /// Text model that writes the story
        text_model: String,

        #[command(flatten)]
        /// Rendering options
        render: RenderOptions,
    },
    /// Illustrate story text that was already written
    Assemble {
        #[clap(long, short)]
        /// File holding the story text, defaults to stdin
        input: Option<PathBuf>,

        #[command(flatten)]
        /// Rendering options
        render: RenderOptions,
    },
    /// List the storybooks in the catalog
    List,
}

#[derive(clap::Args, Debug)]
/// Options shared by everything that renders pages
pub struct RenderOptions {
    #[arg(required = true, long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// OpenAI API key
    pub openai_api_key: String,

    #[clap(long, default_value = DEFAULT_IMAGE_MODEL, env = "STORYBOOK_IMAGE_MODEL")]
    /// Image model used for every page
    pub image_model: String,

    #[clap(long, default_value = "")]
    /// Things the illustrations should avoid
    pub negative_prompt: String,

    #[clap(long, default_value = DEFAULT_FONT_PATH, env = "STORYBOOK_FONT")]
    /// Font used for the page text
    pub font: PathBuf,

    #[clap(long, default_value_t = DEFAULT_FONT_SIZE)]
    /// Font size for the page text, in pixels
    pub font_size: f32,

    #[clap(long, default_value_t = non_zero(DEFAULT_SENTENCES_PER_PAGE))]
    /// Sentences on each page
    pub sentences_per_page: NonZeroUsize,

    #[clap(long, default_value_t = non_zero(DEFAULT_MAX_TEXT_WIDTH_CHARS))]
    /// Wrap width for the page text, in characters
    pub max_text_width: NonZeroUsize,

    #[clap(
        long,
        short,
        default_value_t = non_zero(DEFAULT_PAGE_CONCURRENCY),
        env = "STORYBOOK_CONCURRENCY"
    )]
    /// Pages generated at the same time
    pub concurrency: NonZeroUsize,

    #[clap(long)]
    /// Treat text without a story payload as a single untitled story
    pub allow_untitled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_defaults_come_from_constants() {
        let cli = CliOptions::try_parse_from([
            "storybook",
            "assemble",
            "--openai-api-key",
            "sk-test",
        ])
        .expect("parse");
        match cli.command {
            Command::Assemble { input, render } => {
                assert!(input.is_none());
                assert_eq!(render.font_size, DEFAULT_FONT_SIZE);
                assert_eq!(render.sentences_per_page.get(), DEFAULT_SENTENCES_PER_PAGE);
                assert_eq!(render.max_text_width.get(), DEFAULT_MAX_TEXT_WIDTH_CHARS);
                assert_eq!(render.concurrency.get(), DEFAULT_PAGE_CONCURRENCY);
            }
            other => panic!("expected assemble, got {other:?}"),
        }
    }

    #[test]
    fn zero_sentences_per_page_is_rejected() {
        let parsed = CliOptions::try_parse_from([
            "storybook",
            "assemble",
            "--openai-api-key",
            "sk-test",
            "--sentences-per-page",
            "0",
        ]);
        assert!(parsed.is_err());
    }
}
