// ─── Version Manifest ───
// Mojang's launcher manifest (v2): every known version and the latest pointers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionClassifier {
    Release,
    Snapshot,
    OldBeta,
    OldAlpha,
}

impl VersionClassifier {
    pub fn id(self) -> &'static str {
        match self {
            VersionClassifier::Release => "release",
            VersionClassifier::Snapshot => "snapshot",
            VersionClassifier::OldBeta => "old_beta",
            VersionClassifier::OldAlpha => "old_alpha",
        }
    }
}

impl fmt::Display for VersionClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Top-level Mojang version manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionManifestV2 {
    #[serde(default)]
    pub latest: LatestVersions,
    pub versions: Vec<VersionReference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatestVersions {
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub snapshot: Option<String>,
}

/// A single entry in the manifest, pointing at a full descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionReference {
    pub id: String,
    #[serde(rename = "type")]
    pub classifier: VersionClassifier,
    pub url: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub release_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub compliance_level: Option<u32>,
}

impl VersionManifestV2 {
    pub fn find(&self, id: &str) -> Option<&VersionReference> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Latest version id for the classifier, where the manifest declares one.
    pub fn latest_id(&self, classifier: VersionClassifier) -> Option<&str> {
        match classifier {
            VersionClassifier::Release => self.latest.release.as_deref(),
            VersionClassifier::Snapshot => self.latest.snapshot.as_deref(),
            VersionClassifier::OldBeta | VersionClassifier::OldAlpha => None,
        }
    }
}
