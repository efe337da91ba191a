use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tracing::info;

use super::ArtifactModifier;
use crate::core::access_widener::AccessWidener;
use crate::core::error::{IoResultExt, WorkspaceResult};
use crate::core::jar::registry::{self, TransformerInputs};
use crate::core::jar::EntryTransformer;
use crate::core::resolver::{blocking, MinecraftEnvironment, ResolverContext};

/// Applies project access wideners. Its output depends on project files,
/// so it is kept in the project-local cache.
#[derive(Debug)]
pub struct AccessWidenerModifier {
    files: Vec<PathBuf>,
    namespace: Option<String>,
    state_key: OnceLock<String>,
}

impl AccessWidenerModifier {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            namespace: None,
            state_key: OnceLock::new(),
        }
    }

    /// Require every file to declare `namespace` in its header.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn read_all(files: &[PathBuf], namespace: Option<&str>) -> WorkspaceResult<AccessWidener> {
        let mut widener = AccessWidener::default();
        for file in files {
            let text = std::fs::read_to_string(file).at(file)?;
            widener.read(&text, namespace)?;
        }
        Ok(widener)
    }
}

#[async_trait]
impl ArtifactModifier for AccessWidenerModifier {
    fn key(&self) -> &'static str {
        "aw"
    }

    fn state_key(&self) -> WorkspaceResult<String> {
        if let Some(key) = self.state_key.get() {
            return Ok(key.clone());
        }
        let mut hasher = Sha1::new();
        if let Some(namespace) = &self.namespace {
            hasher.update(namespace.as_bytes());
        }
        hasher.update([0]);
        for file in &self.files {
            hasher.update(std::fs::read(file).at(file)?);
            hasher.update([0]);
        }
        let key = hex::encode(hasher.finalize());
        Ok(self.state_key.get_or_init(|| key).clone())
    }

    fn requires_local_storage(&self) -> bool {
        true
    }

    fn after_remap(&self) -> bool {
        true
    }

    async fn provide_transformers(
        &self,
        _context: &ResolverContext,
        _environment: &MinecraftEnvironment,
    ) -> WorkspaceResult<Vec<Box<dyn EntryTransformer>>> {
        let (files, namespace) = (self.files.clone(), self.namespace.clone());
        let widener = blocking(move || Self::read_all(&files, namespace.as_deref())).await?;
        info!("Applying access wideners from {} files", self.files.len());
        let inputs = TransformerInputs {
            access_widener: Some(Arc::new(widener)),
            ..TransformerInputs::default()
        };
        registry::create_all(&["access-widener"], &inputs)
    }
}
