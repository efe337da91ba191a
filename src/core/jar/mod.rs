// ─── Jar Transformation Engine ───
// Streams the entries of a jar through an ordered list of transformers and
// writes the survivors, in source order, to a new jar.

pub mod filter;
pub mod lvt;
pub mod manifest;
pub mod merge;
pub mod registry;
pub mod signature;
pub mod source_file;

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::fs;

const VERSIONS_PREFIX: &str = "META-INF/versions/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Class,
    Resource,
    Manifest,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarEntry {
    pub name: String,
    pub kind: EntryKind,
    pub time: Option<zip::DateTime>,
    pub data: Vec<u8>,
    /// Java release of a multi-release entry under `META-INF/versions/<n>/`.
    pub release: Option<u16>,
}

impl JarEntry {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let kind = if name.ends_with('/') {
            EntryKind::Directory
        } else if name.eq_ignore_ascii_case(manifest::MANIFEST_PATH) {
            EntryKind::Manifest
        } else if name.ends_with(".class") {
            EntryKind::Class
        } else {
            EntryKind::Resource
        };
        let release = name
            .strip_prefix(VERSIONS_PREFIX)
            .and_then(|rest| rest.split_once('/'))
            .and_then(|(release, _)| release.parse().ok());
        Self {
            name,
            kind,
            time: None,
            data,
            release,
        }
    }

    pub fn with_time(mut self, time: Option<zip::DateTime>) -> Self {
        self.time = time;
        self
    }

    /// Same entry with new contents; name, kind and time are kept.
    pub fn with_data(self, data: Vec<u8>) -> Self {
        Self { data, ..self }
    }

    /// Internal class name, without any multi-release prefix.
    pub fn class_name(&self) -> Option<&str> {
        if self.kind != EntryKind::Class {
            return None;
        }
        let name = match self.release {
            Some(_) => self
                .name
                .strip_prefix(VERSIONS_PREFIX)
                .and_then(|rest| rest.split_once('/'))
                .map(|(_, rest)| rest)
                .unwrap_or(&self.name),
            None => &self.name,
        };
        name.strip_suffix(".class")
    }

    /// Entry path for a class renamed to `class_name`, keeping the release prefix.
    pub fn path_for_class(&self, class_name: &str) -> String {
        match self.release {
            Some(release) => format!("{}{}/{}.class", VERSIONS_PREFIX, release, class_name),
            None => format!("{}.class", class_name),
        }
    }
}

/// One stage of the pipeline. Returning `Ok(None)` deletes the entry.
pub trait EntryTransformer: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform(&self, entry: JarEntry) -> WorkspaceResult<Option<JarEntry>>;
}

/// Run `entry` through every transformer, stopping at the first deletion.
pub fn apply(
    transformers: &[Box<dyn EntryTransformer>],
    mut entry: JarEntry,
) -> WorkspaceResult<Option<JarEntry>> {
    for transformer in transformers {
        match transformer.transform(entry)? {
            Some(next) => entry = next,
            None => return Ok(None),
        }
    }
    Ok(Some(entry))
}

pub fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, index: usize) -> WorkspaceResult<JarEntry> {
    let mut file = archive.by_index(index)?;
    let time: Option<zip::DateTime> = file.last_modified().into();
    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data)?;
    Ok(JarEntry::new(file.name(), data).with_time(time))
}

/// Every entry of `jar`, in archive order.
pub fn read_entries(jar: &Path) -> WorkspaceResult<Vec<JarEntry>> {
    let file = File::open(jar).at(jar)?;
    let mut archive = ZipArchive::new(file)?;
    (0..archive.len()).map(|i| read_entry(&mut archive, i)).collect()
}

/// Sequential jar writer; entries keep the order they are written in.
pub struct JarWriter {
    zip: ZipWriter<File>,
}

impl JarWriter {
    pub fn create(path: &Path) -> WorkspaceResult<Self> {
        let file = File::create(path).at(path)?;
        Ok(Self {
            zip: ZipWriter::new(file),
        })
    }

    pub fn write(&mut self, entry: &JarEntry) -> WorkspaceResult<()> {
        let mut options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        if let Some(time) = entry.time {
            options = options.last_modified_time(time);
        }
        if entry.kind == EntryKind::Directory {
            self.zip.add_directory(entry.name.as_str(), options)?;
        } else {
            self.zip.start_file(entry.name.as_str(), options)?;
            std::io::Write::write_all(&mut self.zip, &entry.data)?;
        }
        Ok(())
    }

    pub fn finish(self) -> WorkspaceResult<()> {
        self.zip.finish()?;
        Ok(())
    }
}

/// Transform `source` into `destination`, publishing atomically.
///
/// Class-format failures are reported with the entry and source jar; they are
/// never retried. Returns the number of entries written.
pub fn transform_jar(
    source: &Path,
    destination: &Path,
    transformers: &[Box<dyn EntryTransformer>],
) -> WorkspaceResult<usize> {
    let names: Vec<&str> = transformers.iter().map(|t| t.name()).collect();
    debug!("Transforming {:?} -> {:?} with {:?}", source, destination, names);

    fs::write_atomically(destination, |staged| {
        let file = File::open(source).at(source)?;
        let mut archive = ZipArchive::new(file)?;
        let mut writer = JarWriter::create(staged)?;
        let mut written = 0;
        for index in 0..archive.len() {
            let entry = read_entry(&mut archive, index)?;
            let name = entry.name.clone();
            let transformed = apply(transformers, entry).map_err(|e| match e {
                WorkspaceError::ClassFormat(reason) => WorkspaceError::MalformedClass {
                    entry: name,
                    artifact: source.display().to_string(),
                    reason,
                },
                other => other,
            })?;
            if let Some(entry) = transformed {
                writer.write(&entry)?;
                written += 1;
            }
        }
        writer.finish()?;
        Ok(written)
    })
}
