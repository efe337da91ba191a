use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{Downloader, ResolveMode};
use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::fs;
use crate::core::hash::{HashAlgorithm, StreamingHasher};
use crate::core::resolution::ResolutionResult;

/// Unvalidated local copies younger than this are served without a request.
const CACHE_TIMEOUT_HOURS: i64 = 24;

/// Attempts per validated download before a digest mismatch becomes fatal.
const VALIDATED_ATTEMPTS: usize = 2;

type PathLocks = Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>;

/// reqwest-backed downloader.
///
/// Concurrent requests for the same destination are serialized, so a second
/// caller observes the file produced by the first rather than fetching again.
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    base_dir: PathBuf,
    mode: ResolveMode,
    locks: PathLocks,
}

impl HttpDownloader {
    pub fn new(client: Client, base_dir: PathBuf, mode: ResolveMode) -> Self {
        Self {
            client,
            base_dir,
            mode,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    fn lock_for(&self, dest: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(dest.to_path_buf()).or_default().clone()
    }

    /// Stream `url` into `dest`, optionally checking the digest before publishing.
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected: Option<(HashAlgorithm, &str)>,
    ) -> WorkspaceResult<ResolutionResult<PathBuf>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Not found: {}", url);
            return Ok(ResolutionResult::NotFound);
        }
        if !status.is_success() {
            return Err(WorkspaceError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        fs::create_parent_dirs(dest)?;
        let staged = fs::temporary_sibling(dest);
        let mut hasher = expected.map(|(algorithm, _)| StreamingHasher::new(algorithm));

        let written = async {
            let mut file = tokio::fs::File::create(&staged).await.at(&staged)?;
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                if let Some(hasher) = hasher.as_mut() {
                    hasher.update(&chunk);
                }
                file.write_all(&chunk).await.at(&staged)?;
            }
            file.flush().await.at(&staged)?;
            Ok::<(), WorkspaceError>(())
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e);
        }

        if let (Some(hasher), Some((algorithm, hash))) = (hasher, expected) {
            let actual = hasher.finish();
            if !actual.eq_ignore_ascii_case(hash) {
                let _ = tokio::fs::remove_file(&staged).await;
                return Err(WorkspaceError::HashMismatch {
                    path: dest.to_path_buf(),
                    algorithm: algorithm.name(),
                    expected: hash.to_string(),
                    actual,
                });
            }
        }

        let (from, to) = (staged.clone(), dest.to_path_buf());
        let moved = tokio::task::spawn_blocking(move || fs::atomic_move(&from, &to))
            .await
            .map_err(|e| WorkspaceError::Other(format!("Download task failed: {}", e)))?;
        if let Err(e) = moved {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e);
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(ResolutionResult::found(dest.to_path_buf(), false))
    }
}

fn is_fresh(path: &Path) -> bool {
    let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    let modified: DateTime<Utc> = modified.into();
    Utc::now() - modified < Duration::hours(CACHE_TIMEOUT_HOURS)
}

#[async_trait]
impl Downloader for HttpDownloader {
    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn with_base_dir(&self, base_dir: PathBuf) -> Arc<dyn Downloader> {
        Arc::new(Self {
            client: self.client.clone(),
            base_dir,
            mode: self.mode,
            locks: self.locks.clone(),
        })
    }

    async fn download(
        &self,
        url: &str,
        relative: &str,
    ) -> WorkspaceResult<ResolutionResult<PathBuf>> {
        let dest = self.base_dir.join(relative);
        let lock = self.lock_for(&dest);
        let _guard = lock.lock().await;

        if self.mode != ResolveMode::RemoteOnly && dest.is_file() {
            if self.mode == ResolveMode::LocalOnly || is_fresh(&dest) {
                debug!("Using cached {:?}", dest);
                return Ok(ResolutionResult::found(dest, true));
            }
        }

        if !self.mode.allows_remote() {
            return Ok(ResolutionResult::NotFound);
        }

        self.fetch(url, &dest, None).await
    }

    async fn download_and_validate(
        &self,
        url: &str,
        relative: &str,
        algorithm: HashAlgorithm,
        hash: &str,
    ) -> WorkspaceResult<ResolutionResult<PathBuf>> {
        let dest = self.base_dir.join(relative);
        let lock = self.lock_for(&dest);
        let _guard = lock.lock().await;

        if dest.is_file() {
            let check = dest.clone();
            let expected = hash.to_string();
            let valid = tokio::task::spawn_blocking(move || algorithm.validate(&check, &expected))
                .await
                .map_err(|e| WorkspaceError::Other(format!("Hash task failed: {}", e)))?;
            match valid {
                Ok(true) => return Ok(ResolutionResult::found(dest, true)),
                Ok(false) => warn!("Found hash mismatch on file at {:?}, re-downloading", dest),
                Err(e) => warn!("Failed to test hash on file at {:?} ({}), re-downloading", dest, e),
            }
            if let Err(e) = tokio::fs::remove_file(&dest).await {
                warn!("Failed to delete file at {:?} ({}), will try to re-download anyways", dest, e);
            }
        }

        if !self.mode.allows_remote() {
            return Ok(ResolutionResult::NotFound);
        }

        let mut attempt = 1;
        loop {
            match self.fetch(url, &dest, Some((algorithm, hash))).await {
                Err(WorkspaceError::HashMismatch { actual, .. }) if attempt < VALIDATED_ATTEMPTS => {
                    warn!(
                        "Downloaded {} hashed to {} instead of {}, retrying",
                        url, actual, hash
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    /// Minimal HTTP/1.1 server answering `path -> (status, body)`.
    async fn serve(routes: Vec<(&'static str, u16, Vec<u8>)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let routes = Arc::new(routes);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    counter.fetch_add(1, Ordering::SeqCst);
                    let (status, body) = routes
                        .iter()
                        .find(|(p, _, _)| *p == path)
                        .map(|(_, s, b)| (*s, b.clone()))
                        .unwrap_or((404, Vec::new()));
                    let head = format!(
                        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (format!("http://{}", addr), hits)
    }

    fn downloader(base: &Path, mode: ResolveMode) -> HttpDownloader {
        HttpDownloader::new(Client::new(), base.to_path_buf(), mode)
    }

    #[tokio::test]
    async fn validated_download_is_cached() {
        let body = b"jar bytes".to_vec();
        let sha1 = HashAlgorithm::Sha1.digest(&body);
        let (base_url, hits) = serve(vec![("/client.jar", 200, body.clone())]).await;
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path(), ResolveMode::LocalThenRemote);
        let url = format!("{}/client.jar", base_url);

        let first = dl
            .download_and_validate(&url, "v/client.jar", HashAlgorithm::Sha1, &sha1)
            .await
            .unwrap();
        assert!(first.is_found());
        assert!(!first.up_to_date());
        assert_eq!(std::fs::read(dir.path().join("v/client.jar")).unwrap(), body);

        let second = dl
            .download_and_validate(&url, "v/client.jar", HashAlgorithm::Sha1, &sha1)
            .await
            .unwrap();
        assert!(second.up_to_date());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn corrupt_local_copy_is_replaced() {
        let body = b"good".to_vec();
        let sha1 = HashAlgorithm::Sha1.digest(&body);
        let (base_url, _) = serve(vec![("/a.jar", 200, body.clone())]).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jar"), b"corrupt").unwrap();

        let result = downloader(dir.path(), ResolveMode::LocalThenRemote)
            .download_and_validate(&format!("{}/a.jar", base_url), "a.jar", HashAlgorithm::Sha1, &sha1)
            .await
            .unwrap();
        assert!(!result.up_to_date());
        assert_eq!(std::fs::read(dir.path().join("a.jar")).unwrap(), body);
    }

    #[tokio::test]
    async fn persistent_mismatch_is_fatal_and_leaves_no_file() {
        let (base_url, hits) = serve(vec![("/a.jar", 200, b"evil".to_vec())]).await;
        let dir = tempfile::tempdir().unwrap();

        let err = downloader(dir.path(), ResolveMode::LocalThenRemote)
            .download_and_validate(&format!("{}/a.jar", base_url), "a.jar", HashAlgorithm::Sha1, "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::HashMismatch { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), VALIDATED_ATTEMPTS);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn status_codes_map_to_results() {
        let (base_url, hits) = serve(vec![("/boom", 500, Vec::new())]).await;
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path(), ResolveMode::RemoteOnly);

        let missing = dl
            .download_and_validate(&format!("{}/missing", base_url), "m", HashAlgorithm::Sha1, "00")
            .await
            .unwrap();
        assert!(!missing.is_found());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let err = dl.download(&format!("{}/boom", base_url), "b").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::DownloadFailed { status: 500, .. }));
    }

    #[tokio::test]
    async fn local_only_never_touches_network() {
        let (base_url, hits) = serve(vec![("/x", 200, b"x".to_vec())]).await;
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path(), ResolveMode::LocalOnly);

        let missing = dl.read_string(&format!("{}/x", base_url), "x").await.unwrap();
        assert!(!missing.is_found());

        std::fs::write(dir.path().join("x"), "stale").unwrap();
        let cached = dl.read_string(&format!("{}/x", base_url), "x").await.unwrap();
        assert_eq!(cached, ResolutionResult::found("stale".to_string(), true));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let (base_url, hits) = serve(vec![("/m.json", 200, b"{}".to_vec())]).await;
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path(), ResolveMode::LocalThenRemote);
        let url = format!("{}/m.json", base_url);

        let (a, b) = tokio::join!(dl.read_bytes(&url, "m.json"), dl.read_bytes(&url, "m.json"));
        assert_eq!(a.unwrap().into_value().unwrap(), b"{}");
        assert_eq!(b.unwrap().into_value().unwrap(), b"{}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
