// ─── Version Repository ───
// Resolves version ids to full descriptors through the downloader.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};

use super::descriptor::VersionDescriptor;
use super::manifest::{VersionClassifier, VersionManifestV2, VersionReference};
use crate::core::downloader::Downloader;
use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::hash::HashAlgorithm;
use crate::core::resolution::ResolutionResult;

const MANIFEST_LOCATION: &str = "version_manifest_v2.json";

#[async_trait]
pub trait VersionManifestRepository: Send + Sync {
    /// Every known version, including injected ones.
    async fn available_versions(&self) -> WorkspaceResult<ResolutionResult<Vec<VersionReference>>>;

    async fn latest_version(
        &self,
        classifier: VersionClassifier,
    ) -> WorkspaceResult<ResolutionResult<VersionReference>>;

    /// A missing id is `NotFound`, never an error.
    async fn full_version(&self, id: &str)
        -> WorkspaceResult<ResolutionResult<Arc<VersionDescriptor>>>;

    /// Register a local descriptor file, returning its version id.
    async fn inject(&self, path: &Path) -> WorkspaceResult<String>;
}

/// Repository backed by the launcher manifest endpoint.
///
/// The manifest itself is subject to the downloader's freshness window;
/// descriptors are validated against the SHA-1 the manifest advertises.
pub struct LauncherMetaRepository {
    downloader: Arc<dyn Downloader>,
    manifest_url: String,
    manifest: tokio::sync::Mutex<Option<ResolutionResult<Arc<VersionManifestV2>>>>,
    descriptors: Mutex<HashMap<String, Arc<VersionDescriptor>>>,
    injected: Mutex<HashMap<String, Arc<VersionDescriptor>>>,
}

impl LauncherMetaRepository {
    pub fn new(downloader: Arc<dyn Downloader>, manifest_url: impl Into<String>) -> Self {
        Self {
            downloader,
            manifest_url: manifest_url.into(),
            manifest: tokio::sync::Mutex::new(None),
            descriptors: Mutex::new(HashMap::new()),
            injected: Mutex::new(HashMap::new()),
        }
    }

    async fn manifest(&self) -> WorkspaceResult<ResolutionResult<Arc<VersionManifestV2>>> {
        let mut cached = self.manifest.lock().await;
        if let Some(manifest) = cached.as_ref() {
            return Ok(manifest.clone());
        }

        info!("Fetching Minecraft version manifest...");
        let raw = self
            .downloader
            .read_string(&self.manifest_url, MANIFEST_LOCATION)
            .await?;
        let parsed = raw.try_map(|text| {
            serde_json::from_str::<VersionManifestV2>(&text).map(Arc::new)
        })?;
        if let Some(manifest) = parsed.value() {
            info!("Loaded {} versions from manifest", manifest.versions.len());
        }

        *cached = Some(parsed.clone());
        Ok(parsed)
    }

    fn injected(&self, id: &str) -> Option<Arc<VersionDescriptor>> {
        let injected = self.injected.lock().unwrap_or_else(|e| e.into_inner());
        injected.get(id).cloned()
    }
}

fn reference_for(descriptor: &VersionDescriptor, url: String) -> VersionReference {
    VersionReference {
        id: descriptor.id.clone(),
        classifier: descriptor.classifier,
        url,
        time: descriptor.time,
        release_time: descriptor.release_time,
        sha1: None,
        compliance_level: descriptor.compliance_level,
    }
}

#[async_trait]
impl VersionManifestRepository for LauncherMetaRepository {
    async fn available_versions(&self) -> WorkspaceResult<ResolutionResult<Vec<VersionReference>>> {
        let manifest = self.manifest().await?;
        let injected: Vec<VersionReference> = {
            let injected = self.injected.lock().unwrap_or_else(|e| e.into_inner());
            injected
                .values()
                .map(|d| reference_for(d, format!("injected:{}", d.id)))
                .collect()
        };

        Ok(match manifest {
            ResolutionResult::Found { value, up_to_date } => {
                let listed: Vec<VersionReference> = value
                    .versions
                    .iter()
                    .filter(|v| !versions_contains(&injected, &v.id))
                    .cloned()
                    .collect();
                let mut versions = injected;
                versions.extend(listed);
                ResolutionResult::found(versions, up_to_date)
            }
            ResolutionResult::NotFound if !injected.is_empty() => {
                ResolutionResult::found(injected, true)
            }
            ResolutionResult::NotFound => ResolutionResult::NotFound,
        })
    }

    async fn latest_version(
        &self,
        classifier: VersionClassifier,
    ) -> WorkspaceResult<ResolutionResult<VersionReference>> {
        let manifest = self.manifest().await?;
        Ok(match manifest {
            ResolutionResult::Found { value, up_to_date } => {
                match value.latest_id(classifier).and_then(|id| value.find(id)) {
                    Some(reference) => ResolutionResult::found(reference.clone(), up_to_date),
                    None => ResolutionResult::NotFound,
                }
            }
            ResolutionResult::NotFound => ResolutionResult::NotFound,
        })
    }

    async fn full_version(
        &self,
        id: &str,
    ) -> WorkspaceResult<ResolutionResult<Arc<VersionDescriptor>>> {
        if let Some(descriptor) = self.injected(id) {
            return Ok(ResolutionResult::found(descriptor, true));
        }
        {
            let descriptors = self.descriptors.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(descriptor) = descriptors.get(id) {
                return Ok(ResolutionResult::found(descriptor.clone(), true));
            }
        }

        let manifest = match self.manifest().await? {
            ResolutionResult::Found { value, .. } => value,
            ResolutionResult::NotFound => return Ok(ResolutionResult::NotFound),
        };
        let Some(reference) = manifest.find(id) else {
            debug!("Version {} is not listed in the manifest", id);
            return Ok(ResolutionResult::NotFound);
        };

        let location = format!("versions/{}/{}.json", id, id);
        let raw = match &reference.sha1 {
            Some(sha1) => {
                self.downloader
                    .read_string_and_validate(&reference.url, &location, HashAlgorithm::Sha1, sha1)
                    .await?
            }
            None => self.downloader.read_string(&reference.url, &location).await?,
        };

        // The manifest lists this version, so a missing document is a broken remote.
        let (text, up_to_date) = match raw {
            ResolutionResult::Found { value, up_to_date } => (value, up_to_date),
            ResolutionResult::NotFound => {
                return Err(WorkspaceError::DownloadFailed {
                    url: reference.url.clone(),
                    status: 404,
                })
            }
        };

        let descriptor = Arc::new(serde_json::from_str::<VersionDescriptor>(&text)?);
        let mut descriptors = self.descriptors.lock().unwrap_or_else(|e| e.into_inner());
        let descriptor = descriptors
            .entry(id.to_string())
            .or_insert(descriptor)
            .clone();
        Ok(ResolutionResult::found(descriptor, up_to_date))
    }

    async fn inject(&self, path: &Path) -> WorkspaceResult<String> {
        let text = tokio::fs::read_to_string(path).await.at(path)?;
        let descriptor: VersionDescriptor = serde_json::from_str(&text)?;
        let id = descriptor.id.clone();
        info!("Injected local version descriptor {} from {:?}", id, path);
        let mut injected = self.injected.lock().unwrap_or_else(|e| e.into_inner());
        injected.insert(id.clone(), Arc::new(descriptor));
        Ok(id)
    }
}

fn versions_contains(versions: &[VersionReference], id: &str) -> bool {
    versions.iter().any(|v| v.id == id)
}
