// ─── Platforms & Sides ───
// Which distributions make up an artifact and which libraries each needs.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::bundler::BundlerMetadata;
use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::maven::{MavenArtifact, MINECRAFT_GROUP};
use crate::core::version::descriptor::{DownloadClassifier, VersionDescriptor};

/// Groups shipped with the client that the dedicated server never loads.
pub const CLIENT_ONLY_DEPENDENCY_GROUPS: &[&str] = &[
    "oshi-project",
    "net.java.dev.jna",
    "com.ibm.icu",
    "net.java.jinput",
    "net.java.jutils",
    "org.lwjgl",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinecraftSide {
    Client,
    Server,
}

impl MinecraftSide {
    pub fn id(self) -> &'static str {
        match self {
            MinecraftSide::Client => "client",
            MinecraftSide::Server => "server",
        }
    }

    pub fn jar_download(self) -> DownloadClassifier {
        match self {
            MinecraftSide::Client => DownloadClassifier::Client,
            MinecraftSide::Server => DownloadClassifier::Server,
        }
    }

    pub fn mappings_download(self) -> DownloadClassifier {
        match self {
            MinecraftSide::Client => DownloadClassifier::ClientMappings,
            MinecraftSide::Server => DownloadClassifier::ServerMappings,
        }
    }

    /// Packages kept when the downloaded jar still carries shaded libraries.
    /// Empty means no filtering.
    pub fn allowed_packages(self) -> &'static [&'static str] {
        match self {
            MinecraftSide::Client => &[],
            MinecraftSide::Server => &["net/minecraft"],
        }
    }

    /// Library coordinates this side needs at compile time.
    pub fn dependencies(
        self,
        descriptor: &VersionDescriptor,
        bundler: Option<&BundlerMetadata>,
    ) -> WorkspaceResult<BTreeSet<MavenArtifact>> {
        match (self, bundler) {
            (MinecraftSide::Server, Some(bundler)) => bundler
                .libraries
                .iter()
                .map(|element| MavenArtifact::parse(&element.id))
                .collect(),
            (MinecraftSide::Server, None) => Ok(descriptor_libraries(descriptor, |library| {
                !CLIENT_ONLY_DEPENDENCY_GROUPS.contains(&library.group_id.as_str())
            })),
            (MinecraftSide::Client, _) => Ok(descriptor_libraries(descriptor, |_| true)),
        }
    }

    /// Produce the real jar for this side from the downloaded file.
    ///
    /// Bundled servers have their nested jar extracted; everything else is
    /// hard-linked, or copied when linking is not possible.
    pub fn extract_jar(self, downloaded: &Path, output: &Path, bundler: Option<&BundlerMetadata>) -> WorkspaceResult<()> {
        if output.exists() {
            std::fs::remove_file(output).at(output)?;
        }
        match (self, bundler) {
            (MinecraftSide::Server, Some(bundler)) => bundler.extract_server(downloaded, output),
            _ => {
                if std::fs::hard_link(downloaded, output).is_err() {
                    std::fs::copy(downloaded, output).at(output)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for MinecraftSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

fn descriptor_libraries(
    descriptor: &VersionDescriptor,
    filter: impl Fn(&MavenArtifact) -> bool,
) -> BTreeSet<MavenArtifact> {
    descriptor
        .libraries
        .iter()
        .filter(|library| library.is_allowed_for_current_os() && !library.is_natives())
        .filter_map(|library| library.coordinate())
        .filter(|coordinate| filter(coordinate))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinecraftPlatform {
    Client,
    Server,
    Joined,
}

impl MinecraftPlatform {
    pub const ALL: [MinecraftPlatform; 3] = [
        MinecraftPlatform::Client,
        MinecraftPlatform::Server,
        MinecraftPlatform::Joined,
    ];

    pub fn from_id(id: &str) -> WorkspaceResult<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.artifact_id() == id)
            .ok_or_else(|| {
                WorkspaceError::Configuration(format!(
                    "unknown platform '{}' (expected client, server or joined)",
                    id
                ))
            })
    }

    pub fn artifact_id(self) -> &'static str {
        match self {
            MinecraftPlatform::Client => "client",
            MinecraftPlatform::Server => "server",
            MinecraftPlatform::Joined => "joined",
        }
    }

    /// `net.minecraft:<artifact>`
    pub fn module_name(self) -> String {
        format!("{}:{}", MINECRAFT_GROUP, self.artifact_id())
    }

    pub fn active_sides(self) -> &'static [MinecraftSide] {
        match self {
            MinecraftPlatform::Client => &[MinecraftSide::Client],
            MinecraftPlatform::Server => &[MinecraftSide::Server],
            MinecraftPlatform::Joined => &[MinecraftSide::Client, MinecraftSide::Server],
        }
    }

    pub fn includes(self, side: MinecraftSide) -> bool {
        self.active_sides().contains(&side)
    }

    /// The single side of a one-sided platform.
    pub fn side(self) -> Option<MinecraftSide> {
        match self {
            MinecraftPlatform::Client => Some(MinecraftSide::Client),
            MinecraftPlatform::Server => Some(MinecraftSide::Server),
            MinecraftPlatform::Joined => None,
        }
    }

    /// Capabilities advertised by this platform's artifact. A joined jar
    /// stands in for both the client and the server.
    pub fn capabilities(self) -> Vec<String> {
        self.active_sides()
            .iter()
            .map(|side| format!("{}:{}", MINECRAFT_GROUP, side.id()))
            .collect()
    }
}

impl fmt::Display for MinecraftPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.artifact_id())
    }
}
