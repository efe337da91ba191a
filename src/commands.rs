use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::core::error::{WorkspaceError, WorkspaceResult};
use crate::core::mappings::LayerSpec;
use crate::core::mappings::MappingLayers;
use crate::core::modifier::{AccessWidenerModifier, MappingsModifier, Modifiers, OfficialMappingsModifier};
use crate::core::platform::MinecraftPlatform;
use crate::core::resolution::ResolutionResult;
use crate::core::resolver::sync::{FileSystemModel, SyncExecutor};
use crate::core::resolver::MinecraftResolver;
use crate::core::version::{VersionClassifier, VersionManifestRepository};

#[derive(Debug, Serialize)]
pub struct MinecraftVersionInfo {
    pub id: String,
    pub release_time: Option<String>,
    pub version_type: String,
}

#[derive(Debug, Serialize)]
pub struct ResolvedArtifact {
    pub artifact_id: String,
    pub platform: MinecraftPlatform,
    pub version: String,
    pub jar: PathBuf,
    pub up_to_date: bool,
    pub dependencies: Vec<String>,
}

/// What to build for `mcws resolve`.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub version: String,
    pub platform: MinecraftPlatform,
    pub official: bool,
    /// `format:path` notations, in layering order.
    pub mappings: Vec<String>,
    /// `from:to`, applied to tiny layers.
    pub tiny_namespaces: Option<String>,
    pub access_wideners: Vec<PathBuf>,
    /// Local descriptors registered before resolving.
    pub descriptors: Vec<PathBuf>,
}

impl ResolveRequest {
    pub fn new(version: impl Into<String>, platform: MinecraftPlatform) -> Self {
        Self {
            version: version.into(),
            platform,
            official: false,
            mappings: Vec::new(),
            tiny_namespaces: None,
            access_wideners: Vec::new(),
            descriptors: Vec::new(),
        }
    }
}

pub async fn get_minecraft_versions(
    versions: &dyn VersionManifestRepository,
) -> WorkspaceResult<Vec<MinecraftVersionInfo>> {
    let listed = versions
        .available_versions()
        .await?
        .into_value()
        .unwrap_or_default();

    Ok(listed
        .into_iter()
        .map(|entry| MinecraftVersionInfo {
            id: entry.id,
            release_time: entry.release_time.map(|t| t.to_rfc3339()),
            version_type: entry.classifier.id().to_string(),
        })
        .collect())
}

pub async fn get_latest_version(
    versions: &dyn VersionManifestRepository,
    classifier: VersionClassifier,
) -> WorkspaceResult<Option<MinecraftVersionInfo>> {
    Ok(versions
        .latest_version(classifier)
        .await?
        .into_value()
        .map(|entry| MinecraftVersionInfo {
            id: entry.id,
            release_time: entry.release_time.map(|t| t.to_rfc3339()),
            version_type: entry.classifier.id().to_string(),
        }))
}

pub async fn inject_version(versions: &dyn VersionManifestRepository, descriptor: &Path) -> WorkspaceResult<String> {
    versions.inject(descriptor).await
}

/// Parse a `format:path` layer notation.
pub fn parse_layer(notation: &str, tiny_namespaces: Option<&str>) -> WorkspaceResult<LayerSpec> {
    let Some((format, path)) = notation.split_once(':').filter(|(f, p)| !f.is_empty() && !p.is_empty()) else {
        return Err(WorkspaceError::Configuration(format!(
            "mapping layer '{}' must be written as format:path",
            notation
        )));
    };
    let name = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let spec = LayerSpec::new(name, format, path);

    match tiny_namespaces {
        Some(namespaces) if format.starts_with("tiny") => {
            let (from, to) = namespaces.split_once(':').ok_or_else(|| {
                WorkspaceError::Configuration(format!("tiny namespaces '{}' must be written as from:to", namespaces))
            })?;
            Ok(spec.with_namespaces(from, to))
        }
        _ => Ok(spec),
    }
}

/// Modifiers for `request`: renaming first, access wideners last.
pub async fn build_modifiers(request: &ResolveRequest, sync: &SyncExecutor) -> WorkspaceResult<Modifiers> {
    let mut modifiers: Modifiers = Vec::new();
    if request.official {
        modifiers.push(Arc::new(OfficialMappingsModifier));
    }
    if !request.mappings.is_empty() {
        let specs = request
            .mappings
            .iter()
            .map(|notation| parse_layer(notation, request.tiny_namespaces.as_deref()))
            .collect::<WorkspaceResult<Vec<_>>>()?;
        let layers = MappingLayers::new(specs)?;
        modifiers.push(Arc::new(MappingsModifier::resolve(&layers, sync, Arc::new(FileSystemModel)).await?));
    }
    if !request.access_wideners.is_empty() {
        modifiers.push(Arc::new(AccessWidenerModifier::new(request.access_wideners.clone())));
    }
    Ok(modifiers)
}

/// Resolve the requested environment. An unknown version is reported with
/// the latest release as a suggestion.
pub async fn resolve_artifact(resolver: &MinecraftResolver, request: &ResolveRequest) -> WorkspaceResult<ResolvedArtifact> {
    for descriptor in &request.descriptors {
        let id = inject_version(resolver.versions().as_ref(), descriptor).await?;
        info!("Registered local version {}", id);
    }

    let modifiers = build_modifiers(request, &resolver.context().sync).await?;
    let resolved = resolver.provide(request.platform, &request.version, &modifiers).await?;
    let ResolutionResult::Found { value: environment, up_to_date } = resolved else {
        let latest = match get_latest_version(resolver.versions().as_ref(), VersionClassifier::Release).await {
            Ok(latest) => latest.map(|v| v.id),
            Err(e) => {
                warn!("Could not look up the latest release: {}", e);
                None
            }
        };
        return Err(WorkspaceError::VersionNotFound {
            version: request.version.clone(),
            latest,
        });
    };

    Ok(ResolvedArtifact {
        artifact_id: environment.decorated_artifact_id.clone(),
        platform: environment.platform,
        version: environment.metadata.id.clone(),
        jar: environment.jar.clone(),
        up_to_date,
        dependencies: environment.dependencies.iter().map(|d| d.to_string()).collect(),
    })
}
