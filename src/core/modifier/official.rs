use async_trait::async_trait;
use tracing::info;

use super::{remapping_transformers, ArtifactModifier};
use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::jar::EntryTransformer;
use crate::core::mappings::{proguard, MappingSet};
use crate::core::platform::MinecraftSide;
use crate::core::resolver::{artifact_file_name, blocking, MinecraftEnvironment, ResolverContext};

/// Remaps to the names Mojang publishes alongside each release.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfficialMappingsModifier;

fn no_mappings(version: &str, side: MinecraftSide) -> WorkspaceError {
    WorkspaceError::Other(format!(
        "No mappings were available for Minecraft {} side {}! Official mappings are only available for releases 1.14.4 and newer.",
        version, side
    ))
}

impl OfficialMappingsModifier {
    async fn side_mappings(
        context: &ResolverContext,
        environment: &MinecraftEnvironment,
        side: MinecraftSide,
    ) -> WorkspaceResult<MappingSet> {
        let version = &environment.metadata.id;
        let download = environment
            .metadata
            .download(side.mappings_download())
            .ok_or_else(|| no_mappings(version, side))?;
        let relative = artifact_file_name(&format!("{}_m-obf", side.id()), version, Some("mappings"), "txt");
        let file = context
            .download_validated(download, &relative)
            .await?
            .into_value()
            .ok_or_else(|| no_mappings(version, side))?;

        let text = tokio::fs::read_to_string(&file).await.at(&file)?;
        let mappings = blocking(move || proguard::read(&text)).await?;
        info!("Read {} official {} mappings for {}", mappings.len(), side, version);
        Ok(mappings)
    }
}

#[async_trait]
impl ArtifactModifier for OfficialMappingsModifier {
    fn key(&self) -> &'static str {
        "map"
    }

    // one set of official names per version
    fn state_key(&self) -> WorkspaceResult<String> {
        Ok(String::new())
    }

    fn requires_local_storage(&self) -> bool {
        false
    }

    fn remaps(&self) -> bool {
        true
    }

    async fn provide_transformers(
        &self,
        context: &ResolverContext,
        environment: &MinecraftEnvironment,
    ) -> WorkspaceResult<Vec<Box<dyn EntryTransformer>>> {
        let mut merged = MappingSet::default();
        for side in environment.platform.active_sides() {
            let mappings = Self::side_mappings(context, environment, *side).await?;
            merged = merged.merge(&mappings);
        }
        remapping_transformers(merged, &environment.jar).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::core::classfile::testing::ClassBuilder;
    use crate::core::classfile::AccessFlags;
    use crate::core::downloader::testing::StaticDownloader;
    use crate::core::downloader::Downloader;
    use crate::core::hash::HashAlgorithm;
    use crate::core::jar::testing::write_jar;
    use crate::core::jar::{apply, read_entries};
    use crate::core::platform::MinecraftPlatform;
    use crate::core::resolver::sync::SyncExecutor;
    use crate::core::version::{LauncherMetaRepository, VersionDescriptor};

    const MAPPINGS_URL: &str = "https://meta.example/client.txt";
    const MAPPINGS: &str = "# comment\nnet.minecraft.World -> a:\n    int height -> b\n";

    fn setup(root: &Path, with_mappings: bool) -> (ResolverContext, MinecraftEnvironment) {
        let mut descriptor = serde_json::json!({"id": "1.20.1", "type": "release", "downloads": {}});
        if with_mappings {
            descriptor["downloads"]["client_mappings"] = serde_json::json!({
                "sha1": HashAlgorithm::Sha1.digest(MAPPINGS.as_bytes()),
                "url": MAPPINGS_URL
            });
        }
        let descriptor: VersionDescriptor = serde_json::from_value(descriptor).unwrap();

        let jar = root.join("client.jar");
        let class = ClassBuilder::new("a").field(AccessFlags::empty(), "b", "I").build();
        write_jar(&jar, &[("a.class", &class)]);

        let downloader: Arc<dyn Downloader> = Arc::new(StaticDownloader::new(
            &root.join("shared"),
            vec![(MAPPINGS_URL, MAPPINGS.as_bytes().to_vec())],
        ));
        let versions = Arc::new(LauncherMetaRepository::new(downloader.clone(), "unused"));
        let (sync, _driver) = SyncExecutor::new();
        let context = ResolverContext::new(downloader, versions, root.join("local"), sync);
        let environment = MinecraftEnvironment {
            decorated_artifact_id: "client".into(),
            platform: MinecraftPlatform::Client,
            jar,
            dependencies: BTreeSet::new(),
            metadata: Arc::new(descriptor),
        };
        (context, environment)
    }

    #[tokio::test]
    async fn remaps_to_official_names() {
        let dir = tempfile::tempdir().unwrap();
        let (context, environment) = setup(dir.path(), true);
        let transformers = OfficialMappingsModifier
            .provide_transformers(&context, &environment)
            .await
            .unwrap();

        let entry = read_entries(&environment.jar).unwrap().remove(0);
        let remapped = apply(&transformers, entry).unwrap().unwrap();
        assert_eq!(remapped.name, "net/minecraft/World.class");
        assert!(dir
            .path()
            .join("shared/libraries/net/minecraft/client_m-obf/1.20.1/client_m-obf-1.20.1-mappings.txt")
            .is_file());
    }

    #[tokio::test]
    async fn versions_without_mappings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (context, environment) = setup(dir.path(), false);
        let err = OfficialMappingsModifier
            .provide_transformers(&context, &environment)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("1.14.4"), "{}", err);
    }

    #[test]
    fn identity_is_independent_of_inputs() {
        assert_eq!(OfficialMappingsModifier.key(), "map");
        assert_eq!(OfficialMappingsModifier.state_key().unwrap(), "");
        assert!(OfficialMappingsModifier.remaps());
    }
}
