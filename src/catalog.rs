//! Append-only list of finished storybooks, stored as a JSON file.
//!
//! There's no locking; two processes appending at once can lose an entry.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::assemble::StorybookManifest;
use crate::error::StorybookError;

/// One storybook as the viewer sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Storybook title
    pub title: String,
    /// Folder relative to the public root
    pub path: String,
    /// Page images in reading order
    pub all_images: Vec<String>,
}

impl From<&StorybookManifest> for CatalogEntry {
    fn from(manifest: &StorybookManifest) -> Self {
        Self {
            title: manifest.title.clone(),
            path: manifest.output_directory.to_string_lossy().to_string(),
            all_images: manifest
                .pages
                .iter()
                .map(|page| page.image_path.to_string_lossy().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    storybooks: Vec<CatalogEntry>,
}

/// Handle on the catalog file.
#[derive(Clone, Debug)]
pub struct Catalog {
    path: PathBuf,
}

impl Catalog {
    /// Opens the catalog, creating an empty one if the file doesn't exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorybookError> {
        let catalog = Self { path: path.into() };
        if tokio::fs::try_exists(&catalog.path).await? {
            debug!("{} already exists.", catalog.path.display());
        } else {
            catalog.write(&CatalogFile::default()).await?;
            info!("{} created.", catalog.path.display());
        }
        Ok(catalog)
    }

    /// Where the catalog lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every storybook, oldest first.
    pub async fn load(&self) -> Result<Vec<CatalogEntry>, StorybookError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let file: CatalogFile = serde_json::from_slice(&bytes).map_err(|err| {
            error!("Error loading storybooks: {}", err);
            StorybookError::from(err)
        })?;
        Ok(file.storybooks)
    }

    /// Adds a finished storybook to the end of the catalog.
    pub async fn append(&self, manifest: &StorybookManifest) -> Result<CatalogEntry, StorybookError> {
        let mut storybooks = self.load().await?;
        let entry = CatalogEntry::from(manifest);
        storybooks.push(entry.clone());
        self.write(&CatalogFile { storybooks }).await?;
        info!("Storybook '{}' saved successfully.", entry.title);
        Ok(entry)
    }

    /// Looks a storybook up by its relative folder.
    pub async fn find(&self, path: &str) -> Result<Option<CatalogEntry>, StorybookError> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|entry| entry.path == path))
    }

    async fn write(&self, file: &CatalogFile) -> Result<(), StorybookError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(file)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
