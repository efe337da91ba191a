use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use minecraft_workspace::commands::{self, ResolveRequest};
use minecraft_workspace::core::downloader::ResolveMode;
use minecraft_workspace::core::resolver::sync::SyncExecutor;
use minecraft_workspace::core::settings::WorkspaceSettings;
use minecraft_workspace::core::version::VersionClassifier;
use minecraft_workspace::{MinecraftPlatform, MinecraftResolver, ResolverContext, WorkspaceError, WorkspaceResult};

#[derive(Debug, Parser)]
#[command(name = "mcws", version, about = "Prepare Minecraft jars for development workspaces")]
struct Cli {
    /// Project directory holding workspace_settings.json and the local cache.
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Regenerate artifacts even when cached outputs are up to date.
    #[arg(long, global = true)]
    refresh: bool,

    /// Never touch the network.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Channel {
    Release,
    Snapshot,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Platform {
    Client,
    Server,
    Joined,
}

impl From<Platform> for MinecraftPlatform {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Client => MinecraftPlatform::Client,
            Platform::Server => MinecraftPlatform::Server,
            Platform::Joined => MinecraftPlatform::Joined,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List known versions, or only the latest of a channel.
    Versions {
        #[arg(long, value_enum)]
        latest: Option<Channel>,
    },
    /// Produce a Minecraft jar, optionally remapped and widened.
    Resolve {
        #[arg(long)]
        version: String,
        #[arg(long, value_enum, default_value = "joined")]
        platform: Platform,
        /// Remap to the official names.
        #[arg(long)]
        official: bool,
        /// Mapping layer as format:path; repeat to stack layers.
        #[arg(long = "mappings", value_name = "FORMAT:PATH")]
        mappings: Vec<String>,
        #[arg(long, value_name = "FROM:TO")]
        tiny_namespaces: Option<String>,
        #[arg(long = "access-widener", value_name = "PATH")]
        access_wideners: Vec<PathBuf>,
        /// Register a local version descriptor first.
        #[arg(long = "descriptor", value_name = "PATH")]
        descriptors: Vec<PathBuf>,
    },
    /// Validate a local version descriptor and print its id.
    Inject { descriptor: PathBuf },
}

fn print_json<T: Serialize>(value: &T) -> WorkspaceResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(command: Command, resolver: &MinecraftResolver) -> WorkspaceResult<()> {
    match command {
        Command::Versions { latest: None } => {
            print_json(&commands::get_minecraft_versions(resolver.versions().as_ref()).await?)
        }
        Command::Versions { latest: Some(channel) } => {
            let classifier = match channel {
                Channel::Release => VersionClassifier::Release,
                Channel::Snapshot => VersionClassifier::Snapshot,
            };
            match commands::get_latest_version(resolver.versions().as_ref(), classifier).await? {
                Some(version) => print_json(&version),
                None => Err(WorkspaceError::Other(format!("No latest {} is known", classifier))),
            }
        }
        Command::Resolve {
            version,
            platform,
            official,
            mappings,
            tiny_namespaces,
            access_wideners,
            descriptors,
        } => {
            let request = ResolveRequest {
                official,
                mappings,
                tiny_namespaces,
                access_wideners,
                descriptors,
                ..ResolveRequest::new(version, platform.into())
            };
            let resolved = commands::resolve_artifact(resolver, &request).await?;
            info!("Resolved {} at {:?}", resolved.artifact_id, resolved.jar);
            print_json(&resolved)
        }
        Command::Inject { descriptor } => {
            let id = commands::inject_version(resolver.versions().as_ref(), &descriptor).await?;
            println!("{}", id);
            Ok(())
        }
    }
}

fn run(cli: Cli) -> WorkspaceResult<()> {
    let mut settings = WorkspaceSettings::load(&cli.project);
    settings.force_refresh |= cli.refresh;
    if cli.offline {
        settings.resolve_mode = ResolveMode::LocalOnly;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let (sync, mut driver) = SyncExecutor::new();
    let context = ResolverContext::from_settings(&settings, &cli.project, sync)?;
    let resolver = MinecraftResolver::new(context);

    driver.process_sync_tasks_until_complete(&runtime, execute(cli.command, &resolver))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,minecraft_workspace=debug")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
