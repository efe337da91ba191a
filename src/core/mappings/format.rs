use std::io::{Cursor, Read};
use std::path::Path;

use zip::ZipArchive;

use super::{parchment, proguard, srg, tiny, MappingSet};
use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};

pub const DEFAULT_TINY_FROM: &str = "official";
pub const DEFAULT_TINY_TO: &str = "named";

/// Supported mapping formats, selected by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingFormat {
    ProGuard,
    Srg,
    Csrg,
    Tsrg,
    Tiny { from: String, to: String },
    Parchment,
}

impl MappingFormat {
    pub const NAMES: [&'static str; 6] = ["proguard", "srg", "csrg", "tsrg", "tiny", "parchment"];

    /// Unknown names are a configuration error, raised before any file is touched.
    pub fn from_name(name: &str, namespaces: Option<(&str, &str)>) -> WorkspaceResult<Self> {
        let format = match name.to_ascii_lowercase().as_str() {
            "proguard" => Self::ProGuard,
            "srg" => Self::Srg,
            "csrg" => Self::Csrg,
            "tsrg" | "tsrg2" => Self::Tsrg,
            "tiny" | "tiny2" => {
                let (from, to) = namespaces.unwrap_or((DEFAULT_TINY_FROM, DEFAULT_TINY_TO));
                Self::Tiny {
                    from: from.to_string(),
                    to: to.to_string(),
                }
            }
            "parchment" => Self::Parchment,
            other => {
                return Err(WorkspaceError::Configuration(format!(
                    "unknown mapping format '{}' (supported: {})",
                    other,
                    Self::NAMES.join(", ")
                )))
            }
        };
        Ok(format)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ProGuard => "proguard",
            Self::Srg => "srg",
            Self::Csrg => "csrg",
            Self::Tsrg => "tsrg",
            Self::Tiny { .. } => "tiny",
            Self::Parchment => "parchment",
        }
    }

    /// Entry holding the mappings when the input is an archive.
    fn archive_entry(&self) -> Option<&'static str> {
        match self {
            Self::Tiny { .. } => Some("mappings/mappings.tiny"),
            Self::Parchment => Some("parchment.json"),
            _ => None,
        }
    }

    pub fn read(&self, path: &Path) -> WorkspaceResult<MappingSet> {
        let bytes = std::fs::read(path).at(path)?;
        self.read_bytes(&bytes)
    }

    pub fn read_bytes(&self, bytes: &[u8]) -> WorkspaceResult<MappingSet> {
        let text = if bytes.starts_with(b"PK") {
            self.read_archive(bytes)?
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        };
        match self {
            Self::ProGuard => proguard::read(&text),
            Self::Srg => srg::read_srg(&text),
            Self::Csrg => srg::read_csrg(&text),
            Self::Tsrg => srg::read_tsrg(&text),
            Self::Tiny { from, to } => tiny::read(&text, from, to),
            Self::Parchment => parchment::read(&text),
        }
    }

    fn read_archive(&self, bytes: &[u8]) -> WorkspaceResult<String> {
        let entry = self.archive_entry().ok_or_else(|| WorkspaceError::Mappings {
            format: self.name(),
            message: "archives are not supported for this format".into(),
        })?;
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut file = archive.by_name(entry).map_err(|_| WorkspaceError::Mappings {
            format: self.name(),
            message: format!("archive has no '{}' entry", entry),
        })?;
        let mut text = String::new();
        file.read_to_string(&mut text).map_err(|e| WorkspaceError::Mappings {
            format: self.name(),
            message: e.to_string(),
        })?;
        Ok(text)
    }
}
