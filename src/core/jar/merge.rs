// ─── Jar Merge ───
// Combines a client and a server jar into one joined jar.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use tracing::info;
use zip::ZipArchive;

use super::{read_entry, EntryKind, JarEntry, JarWriter};
use crate::core::classfile::attributes::{self, append_marker_annotation};
use crate::core::classfile::{open, Attribute, ClassFile};
use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::fs;

/// Invisible annotation placed on classes shipped identically by both sides.
pub const BOTH_SIDES_ANNOTATION: &str = "Lmcws/merge/BothSides;";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub shared: usize,
    pub client_only: usize,
    pub server_only: usize,
}

fn mark_both_sides(entry: JarEntry) -> WorkspaceResult<JarEntry> {
    let source = open(&entry.data)?;
    let pool = source.pool();
    let mut class = ClassFile::read(&source)?;
    let marker = class.pool.intern_utf8(BOTH_SIDES_ANNOTATION)?;
    match attributes::find(pool, &source.attributes(), attributes::RUNTIME_INVISIBLE_ANNOTATIONS)? {
        Some((position, existing)) => {
            class.attributes[position].info = append_marker_annotation(pool, Some(&existing), marker)?;
        }
        None => {
            let name = class.pool.intern_utf8(attributes::RUNTIME_INVISIBLE_ANNOTATIONS)?;
            let info = append_marker_annotation(pool, None, marker)?;
            class.attributes.push(Attribute { name, info });
        }
    }
    let data = class.to_bytes()?;
    Ok(entry.with_data(data))
}

/// Merge `client` and `server` into `output`.
///
/// Client entries come first in client order, then server-only entries in
/// server order. An entry present on both sides with different contents is
/// an [`WorkspaceError::AmbiguousMerge`], except the manifest, where the
/// client copy wins.
pub fn merge_jars(client: &Path, server: &Path, output: &Path) -> WorkspaceResult<MergeStats> {
    info!("Merging {:?} and {:?}", client, server);
    let mut client_jar = ZipArchive::new(File::open(client).at(client)?)?;
    let mut server_jar = ZipArchive::new(File::open(server).at(server)?)?;
    let client_names: HashSet<String> = client_jar.file_names().map(str::to_string).collect();

    let stats = fs::write_atomically(output, |staged| {
        let mut writer = JarWriter::create(staged)?;
        let mut stats = MergeStats::default();

        for index in 0..client_jar.len() {
            let entry = read_entry(&mut client_jar, index)?;
            let Some(server_index) = server_jar.index_for_name(&entry.name) else {
                stats.client_only += 1;
                writer.write(&entry)?;
                continue;
            };
            stats.shared += 1;
            let server_entry = read_entry(&mut server_jar, server_index)?;
            let merged = match entry.kind {
                EntryKind::Manifest | EntryKind::Directory => entry,
                _ if entry.data != server_entry.data => {
                    return Err(WorkspaceError::AmbiguousMerge { entry: entry.name })
                }
                EntryKind::Class => {
                    let name = entry.name.clone();
                    mark_both_sides(entry).map_err(|e| match e {
                        WorkspaceError::ClassFormat(reason) => WorkspaceError::MalformedClass {
                            entry: name,
                            artifact: client.display().to_string(),
                            reason,
                        },
                        other => other,
                    })?
                }
                EntryKind::Resource => entry,
            };
            writer.write(&merged)?;
        }

        for index in 0..server_jar.len() {
            let entry = read_entry(&mut server_jar, index)?;
            if client_names.contains(&entry.name) {
                continue;
            }
            stats.server_only += 1;
            writer.write(&entry)?;
        }

        writer.finish()?;
        Ok(stats)
    })?;

    info!(
        "Merged jar has {} shared, {} client-only and {} server-only entries",
        stats.shared, stats.client_only, stats.server_only
    );
    Ok(stats)
}
