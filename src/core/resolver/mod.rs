// ─── Minecraft Resolver ───
// Produces merged, transformed Minecraft jars in the cache.
//
// Every (platform, version, modifier set) is computed at most once per
// resolver: concurrent callers await the same in-flight future. Outputs are
// staged next to their destination and renamed into place.

pub mod ivy;
pub mod sync;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::core::bundler::BundlerMetadata;
use crate::core::downloader::{Downloader, HttpDownloader};
use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::fs;
use crate::core::hash::HashAlgorithm;
use crate::core::http::build_http_client;
use crate::core::jar::registry::{self, TransformerInputs};
use crate::core::jar::{self, merge};
use crate::core::maven::{MavenArtifact, MINECRAFT_GROUP};
use crate::core::modifier::{self, ArtifactModifier};
use crate::core::platform::{MinecraftPlatform, MinecraftSide};
use crate::core::resolution::ResolutionResult;
use crate::core::settings::WorkspaceSettings;
use crate::core::version::{Download, LauncherMetaRepository, VersionDescriptor, VersionManifestRepository};

use self::sync::SyncExecutor;

pub const LIBRARIES_DIR: &str = "libraries";

// ── Context ─────────────────────────────────────────

/// Everything the resolver and the modifiers share, built once and passed
/// down explicitly.
#[derive(Clone)]
pub struct ResolverContext {
    /// Rooted at the shared cache.
    pub downloader: Arc<dyn Downloader>,
    pub versions: Arc<dyn VersionManifestRepository>,
    /// Project-local cache root.
    pub local_root: PathBuf,
    pub sync: SyncExecutor,
    pub force_refresh: bool,
    downloads: Arc<Semaphore>,
}

impl ResolverContext {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        versions: Arc<dyn VersionManifestRepository>,
        local_root: PathBuf,
        sync: SyncExecutor,
    ) -> Self {
        Self {
            downloader,
            versions,
            local_root,
            sync,
            force_refresh: false,
            downloads: Arc::new(Semaphore::new(4)),
        }
    }

    pub fn from_settings(settings: &WorkspaceSettings, project_dir: &Path, sync: SyncExecutor) -> WorkspaceResult<Self> {
        let client = build_http_client()?;
        let downloader: Arc<dyn Downloader> = Arc::new(HttpDownloader::new(
            client,
            settings.shared_cache.clone(),
            settings.resolve_mode,
        ));
        let versions = Arc::new(LauncherMetaRepository::new(downloader.clone(), settings.manifest_url.clone()));
        Ok(Self::new(downloader, versions, settings.local_cache_dir(project_dir), sync)
            .with_force_refresh(settings.force_refresh)
            .with_download_concurrency(settings.download_concurrency))
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn with_download_concurrency(mut self, permits: usize) -> Self {
        self.downloads = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    pub fn shared_root(&self) -> &Path {
        self.downloader.base_dir()
    }

    /// Fetch `download` to `relative` below the shared root, checking its SHA-1.
    pub async fn download_validated(
        &self,
        download: &Download,
        relative: &str,
    ) -> WorkspaceResult<ResolutionResult<PathBuf>> {
        let _permit = self
            .downloads
            .acquire()
            .await
            .map_err(|e| WorkspaceError::Other(format!("Download queue closed: {}", e)))?;
        self.downloader
            .download_and_validate(&download.url, relative, HashAlgorithm::Sha1, &download.sha1)
            .await
    }
}

/// `libraries/net/minecraft/<artifact>/<version>/<artifact>-<version>[-classifier].<ext>`
pub fn artifact_file_name(artifact: &str, version: &str, classifier: Option<&str>, extension: &str) -> String {
    let mut coordinate = MavenArtifact::new(MINECRAFT_GROUP, artifact, version).with_packaging(extension);
    if let Some(classifier) = classifier {
        coordinate = coordinate.with_classifier(classifier);
    }
    format!(
        "{}/{}/{}/{}/{}",
        LIBRARIES_DIR,
        coordinate.group_path(),
        coordinate.artifact_id,
        coordinate.version,
        coordinate.filename()
    )
}

pub fn artifact_path(root: &Path, artifact: &str, version: &str, classifier: Option<&str>, extension: &str) -> PathBuf {
    root.join(artifact_file_name(artifact, version, classifier, extension))
}

/// Run blocking work (hashing, jar IO, bytecode) off the async workers.
pub(crate) async fn blocking<T, F>(task: F) -> WorkspaceResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> WorkspaceResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| WorkspaceError::Other(format!("Blocking task failed: {}", e)))?
}

// ── Environment ─────────────────────────────────────

/// A resolved jar plus the metadata it came from.
#[derive(Debug, Clone)]
pub struct MinecraftEnvironment {
    pub decorated_artifact_id: String,
    pub platform: MinecraftPlatform,
    pub jar: PathBuf,
    pub dependencies: BTreeSet<MavenArtifact>,
    pub metadata: Arc<VersionDescriptor>,
}

pub type EnvironmentResult = ResolutionResult<Arc<MinecraftEnvironment>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociatedResolutionFlag {
    /// Run the action even when the output is up to date.
    ForceRegenerate,
    /// The action rewrites the environment jar; it gets a copy, which is
    /// moved back over the original once the action succeeds.
    ModifiesOriginal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EnvironmentKey {
    platform: MinecraftPlatform,
    version: String,
    extra: Option<String>,
}

impl EnvironmentKey {
    fn new(platform: MinecraftPlatform, version: &str, extra: Option<String>) -> Self {
        Self {
            platform,
            version: version.to_string(),
            extra,
        }
    }
}

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, Arc<WorkspaceError>>>>;
type Memo<T> = Mutex<HashMap<EnvironmentKey, SharedResult<T>>>;

/// The in-flight (or finished) computation for `key`, starting it if needed.
fn memoized<T, F>(memo: &Memo<T>, key: EnvironmentKey, start: F) -> impl Future<Output = WorkspaceResult<T>> + Send + 'static
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> BoxFuture<'static, WorkspaceResult<T>>,
{
    let shared = {
        let mut memo = memo.lock().unwrap_or_else(|e| e.into_inner());
        memo.entry(key)
            .or_insert_with(|| start().map(|r| r.map_err(Arc::new)).boxed().shared())
            .clone()
    };
    async move { shared.await.map_err(WorkspaceError::Shared) }
}

// ── Resolver ────────────────────────────────────────

struct ResolverState {
    context: ResolverContext,
    artifacts: Memo<EnvironmentResult>,
    associated: Memo<ResolutionResult<PathBuf>>,
}

#[derive(Clone)]
pub struct MinecraftResolver {
    state: Arc<ResolverState>,
}

impl MinecraftResolver {
    pub fn new(context: ResolverContext) -> Self {
        Self {
            state: Arc::new(ResolverState {
                context,
                artifacts: Mutex::new(HashMap::new()),
                associated: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn context(&self) -> &ResolverContext {
        &self.state.context
    }

    pub fn versions(&self) -> &Arc<dyn VersionManifestRepository> {
        &self.state.context.versions
    }

    /// Resolve `platform` at `version` with `modifiers` applied in order.
    ///
    /// An unknown version, or a version without a download for one of the
    /// platform's sides, is `NotFound`.
    pub async fn provide(
        &self,
        platform: MinecraftPlatform,
        version: &str,
        modifiers: &[Arc<dyn ArtifactModifier>],
    ) -> WorkspaceResult<EnvironmentResult> {
        modifier::validate(modifiers)?;
        if modifiers.is_empty() {
            return self.provide_base(platform, version).await;
        }

        let decorated = modifier::decorate_artifact_id(platform.artifact_id(), modifiers)?;
        let key = EnvironmentKey::new(platform, version, Some(decorated.clone()));
        let resolver = self.clone();
        let version = version.to_string();
        let modifiers = modifiers.to_vec();
        memoized(&self.state.artifacts, key, move || {
            async move {
                let artifact = decorated.clone();
                resolver
                    .provide_modified(platform, version, modifiers, decorated)
                    .await
                    .map_err(|e| e.during(artifact, "apply modifiers"))
            }
            .boxed()
        })
        .await
    }

    fn provide_base(&self, platform: MinecraftPlatform, version: &str) -> BoxFuture<'static, WorkspaceResult<EnvironmentResult>> {
        let key = EnvironmentKey::new(platform, version, None);
        let resolver = self.clone();
        let version = version.to_string();
        memoized(&self.state.artifacts, key, move || match platform.side() {
            Some(side) => async move { resolver.provide_side(platform, side, version).await }.boxed(),
            None => async move { resolver.provide_joined(version).await }.boxed(),
        })
        .boxed()
    }

    async fn descriptor(&self, version: &str, artifact: &str) -> WorkspaceResult<Option<Arc<VersionDescriptor>>> {
        let descriptor = self
            .state
            .context
            .versions
            .full_version(version)
            .await
            .map_err(|e| e.during(artifact, "resolve version"))?;
        Ok(descriptor.into_value())
    }

    // single-sided jar straight from the launcher metadata
    async fn provide_side(
        &self,
        platform: MinecraftPlatform,
        side: MinecraftSide,
        version: String,
    ) -> WorkspaceResult<EnvironmentResult> {
        let context = &self.state.context;
        let artifact = platform.artifact_id();
        let Some(descriptor) = self.descriptor(&version, artifact).await? else {
            return Ok(ResolutionResult::NotFound);
        };
        let Some(download) = descriptor.download(side.jar_download()) else {
            warn!("Minecraft {} has no {} download", version, side);
            return Ok(ResolutionResult::NotFound);
        };

        let bundled_name = artifact_file_name(&format!("{}_m-obf_b-bundled", artifact), &version, None, "jar");
        let downloaded = match context
            .download_validated(download, &bundled_name)
            .await
            .map_err(|e| e.during(artifact, "download jar"))?
        {
            ResolutionResult::Found { value, up_to_date } => (value, up_to_date),
            ResolutionResult::NotFound => return Ok(ResolutionResult::NotFound),
        };

        let jar_path = downloaded.0.clone();
        let bundler = blocking(move || BundlerMetadata::read(&jar_path))
            .await
            .map_err(|e| e.during(artifact, "read bundler metadata"))?;
        match &bundler {
            Some(metadata) => info!("Resolved bundler metadata {} from jar at {:?}", metadata.version, downloaded.0),
            None => debug!("No bundler metadata found in jar {:?}", downloaded.0),
        }
        let dependencies = side.dependencies(&descriptor, bundler.as_ref())?;
        let output = artifact_path(context.shared_root(), artifact, &version, None, "jar");

        let environment = |up_to_date: bool| {
            ResolutionResult::found(
                Arc::new(MinecraftEnvironment {
                    decorated_artifact_id: artifact.to_string(),
                    platform,
                    jar: output.clone(),
                    dependencies: dependencies.clone(),
                    metadata: descriptor.clone(),
                }),
                up_to_date,
            )
        };

        if !context.force_refresh && downloaded.1 && output.is_file() {
            debug!("Minecraft {} {} is up to date", side, version);
            self.write_metadata(artifact, &output, &descriptor, &dependencies, true)?;
            return Ok(environment(true));
        }

        info!("Preparing Minecraft: Java Edition {} version {}", side, version);
        self.clean_associated_artifacts(platform, &version)?;

        let mut ids = Vec::new();
        let mut inputs = TransformerInputs::default();
        if bundler.is_none() && !side.allowed_packages().is_empty() {
            ids.push("filter");
            inputs.allowed_packages = side.allowed_packages().iter().map(|p| p.to_string()).collect();
        }
        ids.push("strip-signatures");
        let transformers = registry::create_all(&ids, &inputs)?;

        let (source, destination) = (downloaded.0.clone(), output.clone());
        blocking(move || {
            fs::create_parent_dirs(&destination)?;
            let extracted = fs::temporary_sibling(&destination);
            side.extract_jar(&source, &extracted, bundler.as_ref())?;
            let transformed = jar::transform_jar(&extracted, &destination, &transformers);
            let _ = std::fs::remove_file(&extracted);
            transformed
        })
        .await
        .map_err(|e| e.during(artifact, "transform jar"))?;

        self.write_metadata(artifact, &output, &descriptor, &dependencies, false)?;
        info!("Successfully prepared Minecraft: Java Edition {} version {}", side, version);
        Ok(environment(false))
    }

    async fn provide_joined(&self, version: String) -> WorkspaceResult<EnvironmentResult> {
        let platform = MinecraftPlatform::Joined;
        let artifact = platform.artifact_id();
        let (client, server) = tokio::try_join!(
            self.provide_base(MinecraftPlatform::Client, &version),
            self.provide_base(MinecraftPlatform::Server, &version),
        )?;
        let (
            ResolutionResult::Found { value: client, up_to_date: client_up_to_date },
            ResolutionResult::Found { value: server, up_to_date: server_up_to_date },
        ) = (client, server)
        else {
            return Ok(ResolutionResult::NotFound);
        };

        let context = &self.state.context;
        let output = artifact_path(context.shared_root(), artifact, &version, None, "jar");
        let dependencies: BTreeSet<MavenArtifact> =
            client.dependencies.union(&server.dependencies).cloned().collect();
        let environment = |up_to_date: bool| {
            ResolutionResult::found(
                Arc::new(MinecraftEnvironment {
                    decorated_artifact_id: artifact.to_string(),
                    platform,
                    jar: output.clone(),
                    dependencies: dependencies.clone(),
                    metadata: client.metadata.clone(),
                }),
                up_to_date,
            )
        };

        if !context.force_refresh && client_up_to_date && server_up_to_date && output.is_file() {
            debug!("Minecraft joined {} is up to date", version);
            self.write_metadata(artifact, &output, &client.metadata, &dependencies, true)?;
            return Ok(environment(true));
        }

        info!("Preparing Minecraft: Java Edition joined version {}", version);
        self.clean_associated_artifacts(platform, &version)?;

        let (client_jar, server_jar, destination) = (client.jar.clone(), server.jar.clone(), output.clone());
        blocking(move || merge::merge_jars(&client_jar, &server_jar, &destination))
            .await
            .map_err(|e| e.during(artifact, "merge jars"))?;

        self.write_metadata(artifact, &output, &client.metadata, &dependencies, false)?;
        info!("Successfully prepared Minecraft: Java Edition joined version {}", version);
        Ok(environment(false))
    }

    async fn provide_modified(
        &self,
        platform: MinecraftPlatform,
        version: String,
        modifiers: Vec<Arc<dyn ArtifactModifier>>,
        decorated: String,
    ) -> WorkspaceResult<EnvironmentResult> {
        let (input, input_up_to_date) = match self.provide_base(platform, &version).await? {
            ResolutionResult::Found { value, up_to_date } => (value, up_to_date),
            ResolutionResult::NotFound => return Ok(ResolutionResult::NotFound),
        };

        let context = &self.state.context;
        let root = if modifier::requires_local_storage(&modifiers) {
            context.local_root.as_path()
        } else {
            context.shared_root()
        };
        let output = artifact_path(root, &decorated, &version, None, "jar");
        let environment = |up_to_date: bool| {
            ResolutionResult::found(
                Arc::new(MinecraftEnvironment {
                    decorated_artifact_id: decorated.clone(),
                    platform,
                    jar: output.clone(),
                    dependencies: input.dependencies.clone(),
                    metadata: input.metadata.clone(),
                }),
                up_to_date,
            )
        };

        if !context.force_refresh && input_up_to_date && output.is_file() {
            debug!("{} {} is up to date", decorated, version);
            self.write_metadata(&decorated, &output, &input.metadata, &input.dependencies, true)?;
            return Ok(environment(true));
        }

        info!("Preparing {} version {}", decorated, version);
        let mut transformers = Vec::new();
        for modifier in &modifiers {
            let provided = modifier
                .provide_transformers(context, &input)
                .await
                .map_err(|e| e.during(decorated.as_str(), "prepare modifier"))?;
            transformers.extend(provided);
        }

        let (source, destination) = (input.jar.clone(), output.clone());
        let written = blocking(move || jar::transform_jar(&source, &destination, &transformers))
            .await
            .map_err(|e| e.during(decorated.as_str(), "transform jar"))?;
        debug!("Wrote {} entries to {:?}", written, output);

        self.write_metadata(&decorated, &output, &input.metadata, &input.dependencies, false)?;
        info!("Successfully prepared {} version {}", decorated, version);
        Ok(environment(false))
    }

    /// Produce a file derived from an environment, e.g. decompiled sources.
    ///
    /// `action(environment, output)` runs only when the environment was just
    /// regenerated, when forced, or when the output is missing. The result
    /// lands at `<decorated>-<version>-<id>.jar` next to the environment jar.
    pub async fn produce_associated_artifact<A, Fut>(
        &self,
        platform: MinecraftPlatform,
        version: &str,
        modifiers: &[Arc<dyn ArtifactModifier>],
        id: &str,
        flags: &[AssociatedResolutionFlag],
        action: A,
    ) -> WorkspaceResult<ResolutionResult<PathBuf>>
    where
        A: FnOnce(Arc<MinecraftEnvironment>, PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = WorkspaceResult<()>> + Send + 'static,
    {
        modifier::validate(modifiers)?;
        let decorated = format!("{}-{}", modifier::decorate_artifact_id(platform.artifact_id(), modifiers)?, id);
        let key = EnvironmentKey::new(platform, version, Some(decorated.clone()));
        let resolver = self.clone();
        let version = version.to_string();
        let modifiers = modifiers.to_vec();
        let id = id.to_string();
        let flags = flags.to_vec();
        memoized(&self.state.associated, key, move || {
            async move {
                resolver
                    .produce_associated(platform, version, modifiers, id, flags, action)
                    .await
                    .map_err(|e| e.during(decorated, "produce associated artifact"))
            }
            .boxed()
        })
        .await
    }

    async fn produce_associated<A, Fut>(
        &self,
        platform: MinecraftPlatform,
        version: String,
        modifiers: Vec<Arc<dyn ArtifactModifier>>,
        id: String,
        flags: Vec<AssociatedResolutionFlag>,
        action: A,
    ) -> WorkspaceResult<ResolutionResult<PathBuf>>
    where
        A: FnOnce(Arc<MinecraftEnvironment>, PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = WorkspaceResult<()>> + Send + 'static,
    {
        let (environment, up_to_date) = match self.provide(platform, &version, &modifiers).await? {
            ResolutionResult::Found { value, up_to_date } => (value, up_to_date),
            ResolutionResult::NotFound => return Ok(ResolutionResult::NotFound),
        };
        let output = environment.jar.with_file_name(format!(
            "{}-{}-{}.jar",
            environment.decorated_artifact_id, environment.metadata.id, id
        ));

        let forced = flags.contains(&AssociatedResolutionFlag::ForceRegenerate);
        if !self.state.context.force_refresh && up_to_date && !forced && output.exists() {
            return Ok(ResolutionResult::found(output, true));
        }

        let staged_output = fs::temporary_sibling(&output);
        let outcome = if flags.contains(&AssociatedResolutionFlag::ModifiesOriginal) {
            let staged_input = fs::temporary_sibling(&environment.jar);
            std::fs::copy(&environment.jar, &staged_input).at(&staged_input)?;
            let copy = Arc::new(MinecraftEnvironment {
                jar: staged_input.clone(),
                ..(*environment).clone()
            });
            let result = action(copy, staged_output.clone()).await;
            match result {
                Ok(()) => fs::atomic_move(&staged_input, &environment.jar),
                Err(e) => {
                    let _ = std::fs::remove_file(&staged_input);
                    Err(e)
                }
            }
        } else {
            action(environment.clone(), staged_output.clone()).await
        };

        if let Err(e) = outcome.and_then(|()| fs::atomic_move(&staged_output, &output)) {
            let _ = std::fs::remove_file(&staged_output);
            return Err(e);
        }
        Ok(ResolutionResult::found(output, false))
    }

    fn write_metadata(
        &self,
        artifact: &str,
        jar: &Path,
        descriptor: &VersionDescriptor,
        dependencies: &BTreeSet<MavenArtifact>,
        up_to_date: bool,
    ) -> WorkspaceResult<()> {
        let Some(dir) = jar.parent() else {
            return Ok(());
        };
        let written = ivy::write_if_necessary(dir, artifact, descriptor, dependencies, up_to_date && !self.state.context.force_refresh)
            .map_err(|e| e.during(artifact, "write metadata"))?;
        if written {
            debug!("Wrote module metadata for {} {}", artifact, descriptor.id);
        }
        Ok(())
    }

    /// Delete jars derived from a base artifact that is about to be regenerated.
    fn clean_associated_artifacts(&self, platform: MinecraftPlatform, version: &str) -> WorkspaceResult<()> {
        let base = artifact_path(self.state.context.shared_root(), platform.artifact_id(), version, None, "jar");
        let Some(dir) = base.parent() else {
            return Ok(());
        };
        if !dir.is_dir() {
            return Ok(());
        }
        let mut failures = 0;
        for entry in std::fs::read_dir(dir).at(dir)? {
            let path = entry.at(dir)?.path();
            let is_jar = path.extension().is_some_and(|e| e == "jar");
            if is_jar && path != base {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to delete {:?}: {}", path, e);
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            return Err(WorkspaceError::Other(format!(
                "Failed to delete {} associated artifacts of {} {}",
                failures, platform, version
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use super::*;
    use crate::core::downloader::testing::StaticDownloader;
    use crate::core::jar::testing::write_jar;

    pub const MANIFEST_URL: &str = "https://meta.example/manifest.json";
    pub const VERSION: &str = "1.20.1";
    const VERSION_URL: &str = "https://meta.example/1.20.1.json";
    const CLIENT_URL: &str = "https://meta.example/client.jar";
    const SERVER_URL: &str = "https://meta.example/server.jar";

    /// A launcher-metadata world with one version whose jars hold `client`
    /// and `server` entries.
    pub struct Fixture {
        pub downloader: StaticDownloader,
        pub shared: PathBuf,
        pub local: PathBuf,
    }

    fn jar_bytes(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> Vec<u8> {
        let path = dir.join(name);
        write_jar(&path, entries);
        std::fs::read(path).unwrap()
    }

    impl Fixture {
        pub fn new(root: &Path, client: &[(&str, &[u8])], server: &[(&str, &[u8])]) -> Self {
            let scratch = root.join("scratch");
            std::fs::create_dir_all(&scratch).unwrap();
            let client = jar_bytes(&scratch, "client.jar", client);
            let server = jar_bytes(&scratch, "server.jar", server);
            let descriptor = serde_json::to_vec(&serde_json::json!({
                "id": VERSION,
                "type": "release",
                "downloads": {
                    "client": {"sha1": HashAlgorithm::Sha1.digest(&client), "size": client.len(), "url": CLIENT_URL},
                    "server": {"sha1": HashAlgorithm::Sha1.digest(&server), "size": server.len(), "url": SERVER_URL}
                },
                "libraries": [{"name": "com.mojang:brigadier:1.1.8"}]
            }))
            .unwrap();
            let manifest = serde_json::to_vec(&serde_json::json!({
                "latest": {"release": VERSION, "snapshot": VERSION},
                "versions": [{
                    "id": VERSION,
                    "type": "release",
                    "url": VERSION_URL,
                    "sha1": HashAlgorithm::Sha1.digest(&descriptor)
                }]
            }))
            .unwrap();

            let shared = root.join("shared");
            let downloader = StaticDownloader::new(
                &shared,
                vec![
                    (MANIFEST_URL, manifest),
                    (VERSION_URL, descriptor),
                    (CLIENT_URL, client),
                    (SERVER_URL, server),
                ],
            );
            Self {
                downloader,
                shared,
                local: root.join("local"),
            }
        }

        pub fn resolver(&self) -> MinecraftResolver {
            let downloader: Arc<dyn Downloader> = Arc::new(self.downloader.clone());
            let versions = Arc::new(LauncherMetaRepository::new(downloader.clone(), MANIFEST_URL));
            let (sync, _driver) = SyncExecutor::new();
            MinecraftResolver::new(ResolverContext::new(downloader, versions, self.local.clone(), sync))
        }

        pub fn fetches(&self, url_suffix: &str) -> usize {
            self.downloader
                .requests()
                .iter()
                .filter(|u| u.ends_with(url_suffix))
                .count()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Fixture, VERSION};
    use super::*;
    use crate::core::classfile::testing::ClassBuilder;
    use crate::core::modifier::testing::FixedModifier;
    use crate::core::modifier::AccessWidenerModifier;

    fn found(result: EnvironmentResult) -> (Arc<MinecraftEnvironment>, bool) {
        match result {
            ResolutionResult::Found { value, up_to_date } => (value, up_to_date),
            ResolutionResult::NotFound => panic!("expected an environment"),
        }
    }

    fn entry_names(jar: &Path) -> Vec<String> {
        jar::read_entries(jar).unwrap().into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn artifact_names_follow_the_maven_layout() {
        assert_eq!(
            artifact_file_name("client_map-", "1.20.1", Some("sources"), "jar"),
            "libraries/net/minecraft/client_map-/1.20.1/client_map--1.20.1-sources.jar"
        );
    }

    #[tokio::test]
    async fn second_resolution_is_up_to_date_and_identical() {
        let dir = tempfile::tempdir().unwrap();
        let class = ClassBuilder::new("net/minecraft/World").build();
        let fixture = Fixture::new(dir.path(), &[("net/minecraft/World.class", &class)], &[]);

        let (first, up_to_date) = found(fixture.resolver().provide(MinecraftPlatform::Client, VERSION, &[]).await.unwrap());
        assert!(!up_to_date);
        let bytes = std::fs::read(&first.jar).unwrap();
        assert!(first.jar.starts_with(&fixture.shared));
        assert!(ivy::metadata_file(first.jar.parent().unwrap(), VERSION).is_file());
        assert_eq!(first.dependencies.len(), 1);

        let (second, up_to_date) = found(fixture.resolver().provide(MinecraftPlatform::Client, VERSION, &[]).await.unwrap());
        assert!(up_to_date);
        assert_eq!(std::fs::read(&second.jar).unwrap(), bytes);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_computation() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path(), &[("a.txt", b"a")], &[]);
        let resolver = fixture.resolver();

        let (a, b) = tokio::join!(
            resolver.provide(MinecraftPlatform::Client, VERSION, &[]),
            resolver.provide(MinecraftPlatform::Client, VERSION, &[]),
        );
        assert_eq!(found(a.unwrap()).0.jar, found(b.unwrap()).0.jar);
        assert_eq!(fixture.fetches("client.jar"), 1);
    }

    #[tokio::test]
    async fn unknown_versions_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path(), &[], &[]);
        let result = fixture.resolver().provide(MinecraftPlatform::Joined, "1.99", &[]).await.unwrap();
        assert!(!result.is_found());
    }

    #[tokio::test]
    async fn server_jars_without_bundler_are_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(
            dir.path(),
            &[],
            &[
                ("net/minecraft/server/Main.class", b"m"),
                ("com/google/common/Lists.class", b"g"),
                ("Root.class", b"r"),
                ("META-INF/MOJANGCS.SF", b"sig"),
            ],
        );
        let (server, _) = found(fixture.resolver().provide(MinecraftPlatform::Server, VERSION, &[]).await.unwrap());
        assert_eq!(entry_names(&server.jar), vec!["net/minecraft/server/Main.class", "Root.class"]);
    }

    #[tokio::test]
    async fn joined_merges_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(
            dir.path(),
            &[("net/minecraft/client/Gui.class", b"c")],
            &[("net/minecraft/server/Main.class", b"s")],
        );
        let (joined, _) = found(fixture.resolver().provide(MinecraftPlatform::Joined, VERSION, &[]).await.unwrap());
        assert_eq!(joined.platform, MinecraftPlatform::Joined);
        assert_eq!(
            entry_names(&joined.jar),
            vec!["net/minecraft/client/Gui.class", "net/minecraft/server/Main.class"]
        );
    }

    #[tokio::test]
    async fn conflicting_entries_fail_the_joined_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(
            dir.path(),
            &[("net/minecraft/a/B.class", b"X")],
            &[("net/minecraft/a/B.class", b"Y")],
        );
        let err = fixture
            .resolver()
            .provide(MinecraftPlatform::Joined, VERSION, &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("net/minecraft/a/B.class"), "{}", err);
        assert!(err.to_string().contains("merge jars"), "{}", err);
        let joined = artifact_path(&fixture.shared, "joined", VERSION, None, "jar");
        assert!(!joined.exists());
    }

    #[tokio::test]
    async fn modified_artifacts_are_stored_by_decorated_id() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path(), &[("a.txt", b"a")], &[]);
        let shared: Vec<Arc<dyn ArtifactModifier>> = vec![Arc::new(FixedModifier::new("cm", "aa"))];
        let mut local = FixedModifier::new("aw", "bb");
        local.local = true;
        let local: Vec<Arc<dyn ArtifactModifier>> = vec![Arc::new(local)];

        let resolver = fixture.resolver();
        let (env, _) = found(resolver.provide(MinecraftPlatform::Client, VERSION, &shared).await.unwrap());
        assert_eq!(env.decorated_artifact_id, "client_cm-aa");
        assert!(env.jar.starts_with(&fixture.shared));
        assert_eq!(entry_names(&env.jar), vec!["a.txt"]);

        let (env, _) = found(resolver.provide(MinecraftPlatform::Client, VERSION, &local).await.unwrap());
        assert!(env.jar.starts_with(&fixture.local));

        let (again, up_to_date) =
            found(fixture.resolver().provide(MinecraftPlatform::Client, VERSION, &local).await.unwrap());
        assert!(up_to_date);
        assert_eq!(again.jar, env.jar);
    }

    #[tokio::test]
    async fn access_widener_declared_before_the_remapper_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path(), &[("a.txt", b"a")], &[]);
        let file = dir.path().join("project.accesswidener");
        std::fs::write(&file, "accessWidener v2 named\naccessible class net/minecraft/World\n").unwrap();
        let widener: Arc<dyn ArtifactModifier> = Arc::new(AccessWidenerModifier::new(vec![file]));
        let mut remapper = FixedModifier::new("map", "");
        remapper.remaps = true;
        let remapper: Arc<dyn ArtifactModifier> = Arc::new(remapper);

        let err = fixture
            .resolver()
            .provide(MinecraftPlatform::Client, VERSION, &[widener.clone(), remapper.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Configuration(_)), "{}", err);
        assert_eq!(fixture.fetches("client.jar"), 0);

        let (env, _) = found(
            fixture
                .resolver()
                .provide(MinecraftPlatform::Client, VERSION, &[remapper, widener])
                .await
                .unwrap(),
        );
        assert!(env.decorated_artifact_id.starts_with("client_map-_aw-"), "{}", env.decorated_artifact_id);
        assert!(env.jar.starts_with(&fixture.local));
    }

    #[tokio::test]
    async fn associated_artifacts_run_only_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path(), &[("a.txt", b"a")], &[]);

        let produce = |resolver: MinecraftResolver, flags: Vec<AssociatedResolutionFlag>| async move {
            let ran = Arc::new(Mutex::new(false));
            let marker = ran.clone();
            let result = resolver
                .produce_associated_artifact(MinecraftPlatform::Client, VERSION, &[], "sources", &flags, move |_, out| async move {
                    *marker.lock().unwrap() = true;
                    std::fs::write(&out, b"sources").at(&out)
                })
                .await
                .unwrap();
            let ran = *ran.lock().unwrap();
            (result, ran)
        };

        let (first, ran) = produce(fixture.resolver(), vec![]).await;
        assert!(ran);
        let path = first.value().unwrap().clone();
        assert!(path.ends_with("client-1.20.1-sources.jar"));
        assert_eq!(std::fs::read(&path).unwrap(), b"sources");

        let (second, ran) = produce(fixture.resolver(), vec![]).await;
        assert!(!ran);
        assert!(second.up_to_date());

        let (_, ran) = produce(fixture.resolver(), vec![AssociatedResolutionFlag::ForceRegenerate]).await;
        assert!(ran);
    }
}
