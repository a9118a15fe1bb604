//! Config handling

use std::num::NonZeroUsize;
use std::path::PathBuf;

use tracing::log::LevelFilter;

use crate::constants::{
    DEFAULT_IMAGE_MODEL, DEFAULT_PAGE_CONCURRENCY, DEFAULT_PUBLIC_DIR, DEFAULT_SENTENCES_PER_PAGE,
    STORYBOOKS_DIR,
};

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Knobs for turning a story into pages.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Public assets root; storybooks land in `<public_dir>/storybooks/`
    pub public_dir: PathBuf,
    /// Image model asked for every page
    pub image_model: String,
    /// Things the image model should stay away from
    pub negative_prompt: String,
    /// Sentences printed on each page
    pub sentences_per_page: NonZeroUsize,
    /// Pages rendered at once
    pub concurrency: NonZeroUsize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            negative_prompt: String::new(),
            sentences_per_page: NonZeroUsize::new(DEFAULT_SENTENCES_PER_PAGE)
                .unwrap_or(NonZeroUsize::MIN),
            concurrency: NonZeroUsize::new(DEFAULT_PAGE_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl PipelineConfig {
    /// Directory that holds every storybook folder.
    pub fn storybooks_dir(&self) -> PathBuf {
        self.public_dir.join(STORYBOOKS_DIR)
    }
}
