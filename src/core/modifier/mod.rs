// ─── Artifact Modifiers ───
// Named, composable transformations of a resolved Minecraft jar. Each one
// contributes a key and a digest of its inputs to the artifact id, so two
// different configurations never share storage.

mod access_widener;
mod mappings;
mod official;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::{WorkspaceError, WorkspaceResult};
use crate::core::jar::registry::{self, TransformerInputs};
use crate::core::jar::EntryTransformer;
use crate::core::mappings::MappingSet;
use crate::core::remap::{ClassHierarchy, MappingRemapper};
use crate::core::resolver::{blocking, MinecraftEnvironment, ResolverContext};

pub use access_widener::AccessWidenerModifier;
pub use mappings::MappingsModifier;
pub use official::OfficialMappingsModifier;

pub const ENTRY_SEPARATOR: char = '_';
pub const KEY_VALUE_SEPARATOR: char = '-';

#[async_trait]
pub trait ArtifactModifier: Send + Sync {
    /// Short (1-3 character) tag for this kind of modification.
    fn key(&self) -> &'static str;

    /// Digest of this modifier's inputs. Computed once, then cached.
    fn state_key(&self) -> WorkspaceResult<String>;

    /// Whether the output must live in project-local rather than shared storage.
    fn requires_local_storage(&self) -> bool;

    /// Whether this modifier renames classes. At most one may be active.
    fn remaps(&self) -> bool {
        false
    }

    /// Whether this modifier reads names in the remapped namespace and so
    /// must come after the remapping modifier, when there is one.
    fn after_remap(&self) -> bool {
        false
    }

    /// Transformers to run over `environment`'s jar, in order.
    async fn provide_transformers(
        &self,
        context: &ResolverContext,
        environment: &MinecraftEnvironment,
    ) -> WorkspaceResult<Vec<Box<dyn EntryTransformer>>>;
}

/// Ordered list of modifiers for one resolution.
pub type Modifiers = Vec<Arc<dyn ArtifactModifier>>;

/// Reject modifier sets that cannot be applied together.
pub fn validate(modifiers: &[Arc<dyn ArtifactModifier>]) -> WorkspaceResult<()> {
    let mut keys = HashSet::new();
    for modifier in modifiers {
        if !keys.insert(modifier.key()) {
            return Err(WorkspaceError::Configuration(format!(
                "modifier '{}' was declared more than once",
                modifier.key()
            )));
        }
    }
    let remapping: Vec<&str> = modifiers.iter().filter(|m| m.remaps()).map(|m| m.key()).collect();
    if remapping.len() > 1 {
        return Err(WorkspaceError::Configuration(format!(
            "only one remapping modifier may be active, got {}",
            remapping.join(", ")
        )));
    }
    if let Some(remapper) = modifiers.iter().position(|m| m.remaps()) {
        if let Some(early) = modifiers[..remapper].iter().find(|m| m.after_remap()) {
            return Err(WorkspaceError::Configuration(format!(
                "modifier '{}' must be declared after the remapping modifier '{}'",
                early.key(),
                modifiers[remapper].key()
            )));
        }
    }
    Ok(())
}

/// `base [ '_' key '-' stateKey ]*`, in declaration order.
pub fn decorate_artifact_id(base: &str, modifiers: &[Arc<dyn ArtifactModifier>]) -> WorkspaceResult<String> {
    let mut decorated = String::with_capacity(base.len() + 48 * modifiers.len());
    decorated.push_str(base);
    for modifier in modifiers {
        decorated.push(ENTRY_SEPARATOR);
        decorated.push_str(modifier.key());
        decorated.push(KEY_VALUE_SEPARATOR);
        decorated.push_str(&modifier.state_key()?);
    }
    Ok(decorated)
}

pub fn requires_local_storage(modifiers: &[Arc<dyn ArtifactModifier>]) -> bool {
    modifiers.iter().any(|m| m.requires_local_storage())
}

/// Remap transformer for `mappings`, with the class hierarchy read from `jar`.
pub(crate) async fn remapping_transformers(
    mappings: MappingSet,
    jar: &Path,
) -> WorkspaceResult<Vec<Box<dyn EntryTransformer>>> {
    let jar = jar.to_path_buf();
    let hierarchy = blocking(move || ClassHierarchy::from_jar(&jar)).await?;
    debug!("Remapping {} classes against a hierarchy of {}", mappings.len(), hierarchy.len());
    let inputs = TransformerInputs {
        remapper: Some(Arc::new(MappingRemapper::new(Arc::new(mappings), hierarchy))),
        ..TransformerInputs::default()
    };
    registry::create_all(&["remap"], &inputs)
}
