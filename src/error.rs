//! Error handling

use std::path::PathBuf;

use crate::provider::ProviderError;

/// Failures while pulling a story out of raw model output.
#[derive(Debug)]
pub enum ParseError {
    /// No `{ ... }` region in the text
    NoPayloadFound,
    /// The embedded payload isn't valid for a story
    MalformedPayload(serde_json::Error),
    /// A required field is absent (or empty)
    MissingField(&'static str),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPayloadFound => write!(f, "No structured story payload found in text"),
            Self::MalformedPayload(err) => write!(f, "Malformed story payload: {err}"),
            Self::MissingField(field) => write!(f, "Story payload is missing field '{field}'"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedPayload(err) => Some(err),
            _ => None,
        }
    }
}

/// Failures while splitting a narrative into pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationError {
    /// The narrative had no sentences in it
    EmptyNarrative,
}

impl std::fmt::Display for SegmentationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyNarrative => write!(f, "Narrative contains no sentences"),
        }
    }
}

impl std::error::Error for SegmentationError {}

/// Failures while burning text into a page image.
#[derive(Debug)]
pub enum CompositeError {
    /// The provider's bytes weren't a readable image
    Decode(image::ImageError),
    /// The image has no pixels to draw on
    EmptyImage,
    /// Encoding the finished page failed
    Encode(image::ImageError),
}

impl std::fmt::Display for CompositeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "Failed to decode page image: {err}"),
            Self::EmptyImage => write!(f, "Page image has zero width or height"),
            Self::Encode(err) => write!(f, "Failed to encode page image: {err}"),
        }
    }
}

impl std::error::Error for CompositeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(err) | Self::Encode(err) => Some(err),
            Self::EmptyImage => None,
        }
    }
}

/// Failures while producing the storybook on disk.
#[derive(Debug)]
pub enum AssemblyError {
    /// The output directory couldn't be created (or already existed)
    DirectoryCreateFailed {
        /// Directory we tried to create
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// The image provider failed for a page
    ProviderFailed {
        /// Page index
        index: usize,
        /// What the provider reported
        source: ProviderError,
    },
    /// Compositing the text onto a page failed
    CompositeFailed {
        /// Page index
        index: usize,
        /// Underlying compositing error
        source: CompositeError,
    },
    /// Writing a finished page failed
    WriteFailed {
        /// File we tried to write
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// A page task panicked or was cancelled
    TaskFailed(String),
}

impl std::fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectoryCreateFailed { path, source } => {
                write!(f, "Failed to create {}: {source}", path.display())
            }
            Self::ProviderFailed { index, source } => {
                write!(f, "Image generation failed for page {index}: {source}")
            }
            Self::CompositeFailed { index, source } => {
                write!(f, "Text overlay failed for page {index}: {source}")
            }
            Self::WriteFailed { path, source } => {
                write!(f, "Failed to write {}: {source}", path.display())
            }
            Self::TaskFailed(message) => write!(f, "Page task failed: {message}"),
        }
    }
}

impl std::error::Error for AssemblyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DirectoryCreateFailed { source, .. } | Self::WriteFailed { source, .. } => {
                Some(source)
            }
            Self::ProviderFailed { source, .. } => Some(source),
            Self::CompositeFailed { source, .. } => Some(source),
            Self::TaskFailed(_) => None,
        }
    }
}

/// Top-level error for the storybook crate.
#[derive(Debug)]
pub enum StorybookError {
    /// The user's prompt was too thin to write a story from
    InvalidPrompt,
    /// Story text couldn't be parsed
    Parse(ParseError),
    /// Story couldn't be split into pages
    Segmentation(SegmentationError),
    /// Pages couldn't be produced
    Assembly(AssemblyError),
    /// The text model failed
    Provider(ProviderError),
    /// Reading or writing the catalog file failed
    CatalogIo(std::io::Error),
    /// The catalog file isn't valid JSON
    CatalogFormat(serde_json::Error),
}

impl std::fmt::Display for StorybookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPrompt => write!(f, "Please enter a story prompt of at least two words"),
            Self::Parse(err) => write!(f, "{err}"),
            Self::Segmentation(err) => write!(f, "{err}"),
            Self::Assembly(err) => write!(f, "{err}"),
            Self::Provider(err) => write!(f, "Story generation failed: {err}"),
            Self::CatalogIo(err) => write!(f, "Catalog error: {err}"),
            Self::CatalogFormat(err) => write!(f, "Catalog is corrupt: {err}"),
        }
    }
}

impl std::error::Error for StorybookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Segmentation(err) => Some(err),
            Self::Assembly(err) => Some(err),
            Self::Provider(err) => Some(err),
            Self::CatalogIo(err) => Some(err),
            Self::CatalogFormat(err) => Some(err),
            Self::InvalidPrompt => None,
        }
    }
}

impl From<ParseError> for StorybookError {
    fn from(err: ParseError) -> Self {
        StorybookError::Parse(err)
    }
}

impl From<SegmentationError> for StorybookError {
    fn from(err: SegmentationError) -> Self {
        StorybookError::Segmentation(err)
    }
}

impl From<AssemblyError> for StorybookError {
    fn from(err: AssemblyError) -> Self {
        StorybookError::Assembly(err)
    }
}

impl From<ProviderError> for StorybookError {
    fn from(err: ProviderError) -> Self {
        StorybookError::Provider(err)
    }
}

impl From<std::io::Error> for StorybookError {
    fn from(err: std::io::Error) -> Self {
        StorybookError::CatalogIo(err)
    }
}

impl From<serde_json::Error> for StorybookError {
    fn from(err: serde_json::Error) -> Self {
        StorybookError::CatalogFormat(err)
    }
}
