// ─── Version Descriptor ───
// A full per-version document: libraries, downloads, main class, Java runtime.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::manifest::VersionClassifier;
use crate::core::maven::MavenArtifact;

/// Immutable once parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub classifier: VersionClassifier,
    #[serde(default)]
    pub main_class: Option<String>,
    #[serde(default)]
    pub release_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub compliance_level: Option<u32>,
    #[serde(default)]
    pub assets: Option<String>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexReference>,
    #[serde(default)]
    pub downloads: HashMap<String, Download>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    /// Absent on old descriptors; callers pick their own default.
    #[serde(default)]
    pub java_version: Option<JavaRuntimeVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaRuntimeVersion {
    #[serde(default)]
    pub component: Option<String>,
    pub major_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexReference {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

/// Keys of the `downloads` map of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadClassifier {
    Client,
    ClientMappings,
    Server,
    ServerMappings,
}

impl DownloadClassifier {
    pub fn key(self) -> &'static str {
        match self {
            DownloadClassifier::Client => "client",
            DownloadClassifier::ClientMappings => "client_mappings",
            DownloadClassifier::Server => "server",
            DownloadClassifier::ServerMappings => "server_mappings",
        }
    }
}

impl VersionDescriptor {
    pub fn download(&self, classifier: DownloadClassifier) -> Option<&Download> {
        self.downloads.get(classifier.key())
    }

    pub fn java_major(&self) -> Option<u32> {
        self.java_version.as_ref().map(|j| j.major_version)
    }
}

// ─── Library Entry with Rules ───

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibraryArtifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, LibraryArtifact>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryArtifact {
    #[serde(default)]
    pub path: Option<String>,
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

impl Library {
    /// Evaluate whether this library applies to the current OS.
    ///
    /// No rules means allowed. Otherwise start disallowed and let every rule
    /// whose OS matches (or that names no OS) set the state, top to bottom.
    pub fn is_allowed_for_current_os(&self) -> bool {
        let rules = match &self.rules {
            Some(r) => r,
            None => return true,
        };

        let current_os = current_os_name();
        let mut allowed = false;

        for rule in rules {
            let os_matches = match &rule.os {
                None => true,
                Some(os) => {
                    os.name.as_deref().map_or(true, |name| name == current_os)
                        && os.arch.as_deref().map_or(true, |arch| arch == current_arch())
                }
            };

            if os_matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }

        allowed
    }

    /// Native-only libraries are never compile dependencies.
    pub fn is_natives(&self) -> bool {
        self.natives.is_some() || self.name.contains(":natives-")
    }

    pub fn coordinate(&self) -> Option<MavenArtifact> {
        MavenArtifact::parse(&self.name).ok()
    }
}

/// Get the Mojang OS name for the current platform.
fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

fn current_arch() -> &'static str {
    if cfg!(target_arch = "x86") {
        "x86"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x86_64"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(rules: Option<Vec<LibraryRule>>) -> Library {
        Library {
            name: "test:lib:1.0".into(),
            downloads: None,
            rules,
            natives: None,
        }
    }

    fn os_rule(action: RuleAction, name: &str) -> LibraryRule {
        LibraryRule {
            action,
            os: Some(OsRule {
                name: Some(name.to_string()),
                arch: None,
            }),
        }
    }

    #[test]
    fn no_rules_means_allowed() {
        assert!(library(None).is_allowed_for_current_os());
    }

    #[test]
    fn allow_only_current_os() {
        let lib = library(Some(vec![os_rule(RuleAction::Allow, current_os_name())]));
        assert!(lib.is_allowed_for_current_os());
        let other = library(Some(vec![os_rule(RuleAction::Allow, "no-such-os")]));
        assert!(!other.is_allowed_for_current_os());
    }

    #[test]
    fn disallow_current_os() {
        let lib = library(Some(vec![
            LibraryRule {
                action: RuleAction::Allow,
                os: None,
            },
            os_rule(RuleAction::Disallow, current_os_name()),
        ]));
        assert!(!lib.is_allowed_for_current_os());
    }

    #[test]
    fn parses_descriptor_without_java_version() {
        let parsed: VersionDescriptor = serde_json::from_value(serde_json::json!({
            "id": "1.6.4",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "downloads": {
                "client": {"sha1": "aa", "size": 1, "url": "https://example.com/client.jar"}
            },
            "libraries": [
                {"name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.0", "natives": {"linux": "natives-linux"}},
                {"name": "com.google.guava:guava:14.0"}
            ]
        }))
        .unwrap();

        assert_eq!(parsed.java_major(), None);
        assert_eq!(
            parsed.download(DownloadClassifier::Client).map(|d| d.url.as_str()),
            Some("https://example.com/client.jar")
        );
        assert!(parsed.download(DownloadClassifier::ServerMappings).is_none());
        assert!(parsed.libraries[0].is_natives());
        assert!(!parsed.libraries[1].is_natives());
    }

    #[test]
    fn parses_java_version() {
        let parsed: VersionDescriptor = serde_json::from_value(serde_json::json!({
            "id": "1.20.1",
            "type": "release",
            "javaVersion": {"component": "java-runtime-gamma", "majorVersion": 17}
        }))
        .unwrap();
        assert_eq!(parsed.java_major(), Some(17));
    }
}
