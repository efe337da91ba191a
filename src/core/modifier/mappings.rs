use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{remapping_transformers, ArtifactModifier};
use crate::core::error::WorkspaceResult;
use crate::core::jar::EntryTransformer;
use crate::core::mappings::layers::{self, ResolvedLayer};
use crate::core::mappings::MappingLayers;
use crate::core::resolver::sync::{HostModel, SyncExecutor};
use crate::core::resolver::{blocking, MinecraftEnvironment, ResolverContext};

/// Remaps with a user-declared stack of mapping layers.
///
/// Layers are resolved through the host when the modifier is built, so the
/// state key is known before any resolution starts.
#[derive(Debug, Clone)]
pub struct MappingsModifier {
    layers: Vec<ResolvedLayer>,
    state_key: String,
}

impl MappingsModifier {
    pub async fn resolve(
        layers: &MappingLayers,
        sync: &SyncExecutor,
        host: Arc<dyn HostModel>,
    ) -> WorkspaceResult<Self> {
        let layers = layers.resolve(sync, host).await?;
        let hashed = layers.clone();
        let state_key = blocking(move || layers::state_key(&hashed)).await?;
        Ok(Self { layers, state_key })
    }

    pub fn layers(&self) -> &[ResolvedLayer] {
        &self.layers
    }
}

#[async_trait]
impl ArtifactModifier for MappingsModifier {
    fn key(&self) -> &'static str {
        "cm"
    }

    fn state_key(&self) -> WorkspaceResult<String> {
        Ok(self.state_key.clone())
    }

    fn requires_local_storage(&self) -> bool {
        false
    }

    fn remaps(&self) -> bool {
        true
    }

    async fn provide_transformers(
        &self,
        _context: &ResolverContext,
        environment: &MinecraftEnvironment,
    ) -> WorkspaceResult<Vec<Box<dyn EntryTransformer>>> {
        let resolved = self.layers.clone();
        let mappings = blocking(move || layers::read_layers(&resolved)).await?;
        info!("Merged {} mapping layers into {} classes", self.layers.len(), mappings.len());
        remapping_transformers(mappings, &environment.jar).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tokio::runtime::Runtime;

    use super::*;
    use crate::core::mappings::LayerSpec;
    use crate::core::resolver::sync::FileSystemModel;

    fn build(runtime: &Runtime, specs: Vec<LayerSpec>) -> WorkspaceResult<MappingsModifier> {
        let layers = MappingLayers::new(specs)?;
        let (sync, mut driver) = SyncExecutor::new();
        driver.process_sync_tasks_until_complete(
            runtime,
            MappingsModifier::resolve(&layers, &sync, Arc::new(FileSystemModel)),
        )
    }

    fn csrg(path: &Path) -> LayerSpec {
        LayerSpec::new("custom", "csrg", path.display().to_string())
    }

    #[test]
    fn state_key_follows_layer_contents() {
        let runtime = Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom.csrg");

        std::fs::write(&file, "a net/minecraft/World\n").unwrap();
        let first = build(&runtime, vec![csrg(&file)]).unwrap();
        let again = build(&runtime, vec![csrg(&file)]).unwrap();
        assert_eq!(first.state_key().unwrap(), again.state_key().unwrap());
        assert_eq!(first.state_key().unwrap().len(), 40);

        std::fs::write(&file, "a net/minecraft/Level\n").unwrap();
        let changed = build(&runtime, vec![csrg(&file)]).unwrap();
        assert_ne!(first.state_key().unwrap(), changed.state_key().unwrap());
        assert_eq!(changed.key(), "cm");
        assert_eq!(changed.layers().len(), 1);
    }

    #[test]
    fn unresolvable_layers_fail_construction() {
        let runtime = Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = build(&runtime, vec![csrg(&dir.path().join("missing.csrg"))]).unwrap_err();
        assert!(err.to_string().contains("did not resolve"), "{}", err);
    }
}
