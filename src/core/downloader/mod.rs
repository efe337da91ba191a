// ─── Downloader ───
// Fetch-or-validate access to remote files, cached below a base directory.

mod client;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::{IoResultExt, WorkspaceResult};
use crate::core::hash::HashAlgorithm;
use crate::core::resolution::ResolutionResult;

pub use client::HttpDownloader;

/// Whether the downloader may use the network, the local cache, or both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Always fetch, ignoring local copies of unvalidated files.
    RemoteOnly,
    /// Never touch the network.
    LocalOnly,
    /// Serve fresh local copies, fetch otherwise.
    #[default]
    LocalThenRemote,
}

impl ResolveMode {
    pub fn allows_remote(self) -> bool {
        self != ResolveMode::LocalOnly
    }
}

/// Destinations are relative to the downloader's base directory.
///
/// A `NotFound` result means the remote answered 404, or that the file is
/// absent locally while running [`ResolveMode::LocalOnly`]. Any other
/// non-success status is an error carrying the URL and status.
#[async_trait]
pub trait Downloader: Send + Sync {
    fn base_dir(&self) -> &Path;

    /// A downloader sharing this one's connection pool, rooted elsewhere.
    fn with_base_dir(&self, base_dir: PathBuf) -> Arc<dyn Downloader>;

    async fn download(&self, url: &str, relative: &str)
        -> WorkspaceResult<ResolutionResult<PathBuf>>;

    async fn download_and_validate(
        &self,
        url: &str,
        relative: &str,
        algorithm: HashAlgorithm,
        hash: &str,
    ) -> WorkspaceResult<ResolutionResult<PathBuf>>;

    async fn read_string(
        &self,
        url: &str,
        relative: &str,
    ) -> WorkspaceResult<ResolutionResult<String>> {
        let downloaded = self.download(url, relative).await?;
        read_to_string(downloaded).await
    }

    async fn read_string_and_validate(
        &self,
        url: &str,
        relative: &str,
        algorithm: HashAlgorithm,
        hash: &str,
    ) -> WorkspaceResult<ResolutionResult<String>> {
        let downloaded = self
            .download_and_validate(url, relative, algorithm, hash)
            .await?;
        read_to_string(downloaded).await
    }

    async fn read_bytes(
        &self,
        url: &str,
        relative: &str,
    ) -> WorkspaceResult<ResolutionResult<Vec<u8>>> {
        let downloaded = self.download(url, relative).await?;
        read_to_bytes(downloaded).await
    }

    async fn read_bytes_and_validate(
        &self,
        url: &str,
        relative: &str,
        algorithm: HashAlgorithm,
        hash: &str,
    ) -> WorkspaceResult<ResolutionResult<Vec<u8>>> {
        let downloaded = self
            .download_and_validate(url, relative, algorithm, hash)
            .await?;
        read_to_bytes(downloaded).await
    }
}

async fn read_to_string(
    downloaded: ResolutionResult<PathBuf>,
) -> WorkspaceResult<ResolutionResult<String>> {
    match downloaded {
        ResolutionResult::Found { value, up_to_date } => {
            let text = tokio::fs::read_to_string(&value).await.at(&value)?;
            Ok(ResolutionResult::found(text, up_to_date))
        }
        ResolutionResult::NotFound => Ok(ResolutionResult::NotFound),
    }
}

async fn read_to_bytes(
    downloaded: ResolutionResult<PathBuf>,
) -> WorkspaceResult<ResolutionResult<Vec<u8>>> {
    match downloaded {
        ResolutionResult::Found { value, up_to_date } => {
            let bytes = tokio::fs::read(&value).await.at(&value)?;
            Ok(ResolutionResult::found(bytes, up_to_date))
        }
        ResolutionResult::NotFound => Ok(ResolutionResult::NotFound),
    }
}
