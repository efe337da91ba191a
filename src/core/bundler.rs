// ─── Bundler Metadata ───
// Modern server jars ship their real server jar and libraries as nested
// entries described by tab-separated index files.

use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::jar::manifest::JarManifest;

pub const FORMAT_ATTRIBUTE: &str = "Bundler-Format";

/// Newest format this crate knows how to read.
pub const READER_FORMAT: FormatVersion = FormatVersion { major: 1, minor: 0 };

const MANIFEST: &str = "META-INF/MANIFEST.MF";
const MAIN_CLASS: &str = "META-INF/main-class";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    pub fn parse(attribute: &str) -> WorkspaceResult<Self> {
        let mut parts = attribute.trim().split('.');
        let (Some(major), Some(minor)) = (parts.next(), parts.next()) else {
            return Err(WorkspaceError::Bundler(format!("Invalid version {}", attribute)));
        };
        let number = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| WorkspaceError::Bundler(format!("Invalid version {}", attribute)))
        };
        Ok(Self {
            major: number(major)?,
            minor: number(minor)?,
        })
    }

    /// Whether a reader at `reader` can interpret data written in this version.
    pub fn compatible_with(self, reader: FormatVersion) -> bool {
        reader.major == self.major && reader.minor >= self.minor
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One row of an index file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleElement {
    pub sha256: String,
    /// Maven coordinate of the element.
    pub id: String,
    /// Path of the element inside the bundler jar.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlerMetadata {
    pub version: FormatVersion,
    pub libraries: Vec<BundleElement>,
    pub server: BundleElement,
    pub main_class: Option<String>,
}

impl BundlerMetadata {
    /// `None` when the jar is not a bundler jar.
    pub fn read(jar: &Path) -> WorkspaceResult<Option<Self>> {
        let file = std::fs::File::open(jar).at(jar)?;
        let mut archive = zip::ZipArchive::new(file)?;

        let manifest = match read_entry(&mut archive, MANIFEST)? {
            Some(bytes) => JarManifest::parse(&bytes),
            None => return Ok(None),
        };
        let Some(format) = manifest.main_attribute(FORMAT_ATTRIBUTE) else {
            return Ok(None);
        };
        let version = FormatVersion::parse(format)?;
        if !version.compatible_with(READER_FORMAT) {
            return Err(WorkspaceError::Bundler(format!(
                "{:?} uses bundler format {}, which cannot be read by format {}",
                jar, version, READER_FORMAT
            )));
        }

        let server = read_index(&mut archive, "versions")?
            .into_iter()
            .next()
            .ok_or_else(|| WorkspaceError::Bundler("Missing server jar from versions list".into()))?;
        let libraries = read_index(&mut archive, "libraries")?;
        let main_class = read_entry(&mut archive, MAIN_CLASS)?
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string());

        Ok(Some(Self {
            version,
            libraries,
            server,
            main_class,
        }))
    }

    /// Copy the nested server jar out of `bundle` into `output`.
    pub fn extract_server(&self, bundle: &Path, output: &Path) -> WorkspaceResult<()> {
        let file = std::fs::File::open(bundle).at(bundle)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entry = archive.by_name(&self.server.path).map_err(|_| {
            WorkspaceError::Bundler(format!(
                "Could not locate server artifact in {:?} at {}",
                bundle, self.server.path
            ))
        })?;
        let mut out = std::fs::File::create(output).at(output)?;
        std::io::copy(&mut entry, &mut out).at(output)?;
        Ok(())
    }
}

fn read_entry<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> WorkspaceResult<Option<Vec<u8>>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn read_index<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    index: &str,
) -> WorkspaceResult<Vec<BundleElement>> {
    let Some(bytes) = read_entry(archive, &format!("META-INF/{}.list", index))? else {
        return Ok(Vec::new());
    };
    String::from_utf8_lossy(&bytes)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let columns: Vec<&str> = line.split('\t').collect();
            match columns.as_slice() {
                [sha256, id, path, ..] => Ok(BundleElement {
                    sha256: sha256.to_string(),
                    id: id.to_string(),
                    path: format!("META-INF/{}/{}", index, path),
                }),
                _ => Err(WorkspaceError::Bundler(format!(
                    "Malformed line in {}.list: {}",
                    index, line
                ))),
            }
        })
        .collect()
}
