//! Writes covers and page images under the upload root.
//!
//! Layout:
//! - `{root}/covers/{id}.{ext}`
//! - `{root}/pages/{title}/{chapter}/{id}_page{NNN}.{ext}`
//!
//! Returned paths are relative to the root and always `/`-separated so the
//! persistence layer can store them as-is.

use crate::helpers::image_extension;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub const COVERS_DIR: &str = "covers";
pub const PAGES_DIR: &str = "pages";

#[derive(Debug, Clone)]
pub struct PageStore {
    root: PathBuf,
}

impl PageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub async fn save_cover(&self, source_url: &str, bytes: &[u8]) -> io::Result<String> {
        let file_name = format!("{}.{}", random_id(), image_extension(source_url));
        let relative = format!("{}/{}", COVERS_DIR, file_name);
        self.write(&relative, bytes).await?;
        Ok(relative)
    }

    /// `index` is 1-based and restarts for every chapter.
    pub async fn save_page(
        &self,
        title_folder: &str,
        chapter_folder: &str,
        index: usize,
        source_url: &str,
        bytes: &[u8],
    ) -> io::Result<String> {
        let relative = format!(
            "{}/{}/{}/{}",
            PAGES_DIR,
            title_folder,
            chapter_folder,
            page_file_name(index, &image_extension(source_url))
        );
        self.write(&relative, bytes).await?;
        Ok(relative)
    }

    /// Best-effort removal of files from an incomplete chapter.
    pub async fn discard(&self, relative_paths: &[String]) {
        for relative in relative_paths {
            if let Err(e) = fs::remove_file(self.absolute(relative)).await {
                log::warn!("Could not remove partial page {}: {}", relative, e);
            }
        }
    }

    async fn write(&self, relative: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.absolute(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Write then rename so a crash never leaves a truncated image behind
        let tmp_path = path.with_extension("part");
        fs::write(&tmp_path, bytes).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        Ok(())
    }
}

fn random_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn page_file_name(index: usize, ext: &str) -> String {
    format!("{}_page{:03}.{}", random_id(), index, ext)
}
