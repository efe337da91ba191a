// Ordered stack of mapping layers, each a dependency notation plus a format.

use std::path::PathBuf;
use std::sync::Arc;

use sha1::{Digest, Sha1};
use tracing::{debug, info};

use super::{MappingFormat, MappingSet};
use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::resolver::sync::{HostModel, SyncExecutor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    pub name: String,
    pub format: String,
    /// Dependency notation handed to the host for resolution.
    pub notation: String,
    /// `(from, to)` for multi-namespace formats.
    pub namespaces: Option<(String, String)>,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, format: impl Into<String>, notation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            notation: notation.into(),
            namespaces: None,
        }
    }

    pub fn with_namespaces(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.namespaces = Some((from.into(), to.into()));
        self
    }
}

#[derive(Debug, Clone)]
struct Layer {
    spec: LayerSpec,
    format: MappingFormat,
}

/// A layer whose dependency has been resolved to its single file.
#[derive(Debug, Clone)]
pub struct ResolvedLayer {
    pub name: String,
    pub format: MappingFormat,
    pub file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MappingLayers {
    layers: Vec<Layer>,
}

impl MappingLayers {
    /// Validates every format up front; nothing is resolved or read here.
    pub fn new(specs: Vec<LayerSpec>) -> WorkspaceResult<Self> {
        if specs.is_empty() {
            return Err(WorkspaceError::Configuration("no mapping layers declared".into()));
        }
        let layers = specs
            .into_iter()
            .map(|spec| {
                let namespaces = spec.namespaces.as_ref().map(|(f, t)| (f.as_str(), t.as_str()));
                let format = MappingFormat::from_name(&spec.format, namespaces)?;
                Ok(Layer { spec, format })
            })
            .collect::<WorkspaceResult<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Resolve each layer's notation through the host, on the driving thread.
    /// A layer must resolve to exactly one file.
    pub async fn resolve(&self, sync: &SyncExecutor, host: Arc<dyn HostModel>) -> WorkspaceResult<Vec<ResolvedLayer>> {
        let mut resolved = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let notation = layer.spec.notation.clone();
            let model = host.clone();
            let files = sync.post(move || model.resolve_files(&notation)).await?;
            let [file] = <[PathBuf; 1]>::try_from(files).map_err(|files| {
                WorkspaceError::Configuration(format!(
                    "mapping layer '{}' ({}) did not resolve to exactly 1 file (got {})",
                    layer.spec.name,
                    layer.spec.notation,
                    files.len()
                ))
            })?;
            debug!("Mapping layer '{}' resolved to {:?}", layer.spec.name, file);
            resolved.push(ResolvedLayer {
                name: layer.spec.name.clone(),
                format: layer.format.clone(),
                file,
            });
        }
        Ok(resolved)
    }
}

/// SHA-1 over every layer's name, format and file contents, in order.
pub fn state_key(layers: &[ResolvedLayer]) -> WorkspaceResult<String> {
    let mut hasher = Sha1::new();
    for layer in layers {
        hasher.update(layer.name.as_bytes());
        hasher.update([0]);
        hasher.update(layer.format.name().as_bytes());
        if let MappingFormat::Tiny { from, to } = &layer.format {
            hasher.update(format!("{}:{}", from, to).as_bytes());
        }
        hasher.update([0]);
        hasher.update(std::fs::read(&layer.file).at(&layer.file)?);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Read every layer and merge them in declaration order; later layers win.
pub fn read_layers(layers: &[ResolvedLayer]) -> WorkspaceResult<MappingSet> {
    let mut merged = MappingSet::default();
    for layer in layers {
        let set = layer.format.read(&layer.file)?;
        info!(
            "Read {} classes from mapping layer '{}' ({})",
            set.len(),
            layer.name,
            layer.format.name()
        );
        merged = merged.merge(&set);
    }
    Ok(merged)
}
