use super::{EntryKind, EntryTransformer, JarEntry};
use noak::reader::attributes::SourceFile;

use crate::core::classfile::attributes;
use crate::core::classfile::{open, Attribute, ClassFile, ClassSource};
use crate::core::error::WorkspaceResult;

/// Points `SourceFile` at the outermost class's simple name, e.g.
/// `net/minecraft/World$Chunk` gets `World.java`.
pub struct SourceFileFixer;

pub fn source_file_name(class_name: &str) -> String {
    let simple = class_name.rsplit('/').next().unwrap_or(class_name);
    let outer = simple.split('$').next().unwrap_or(simple);
    format!("{}.java", outer)
}

/// Point the `SourceFile` of `class`, freshly read from `source`, at the
/// outer class; `false` when it already does.
pub fn fix_source_file(source: &ClassSource<'_>, class: &mut ClassFile) -> WorkspaceResult<bool> {
    let expected = source_file_name(&class.name()?);
    let pool = source.pool();
    let found = attributes::find(pool, &source.attributes(), attributes::SOURCE_FILE)?;
    let position = match found {
        Some((position, attribute)) => {
            let current: SourceFile = attributes::read(pool, &attribute)?;
            if pool.get(current.source_file())?.content == expected.as_str() {
                return Ok(false);
            }
            Some(position)
        }
        None => None,
    };
    let value = class.pool.intern_utf8(&expected)?;
    let info = attributes::index_info(value);
    match position {
        Some(position) => class.attributes[position].info = info,
        None => {
            let name = class.pool.intern_utf8(attributes::SOURCE_FILE)?;
            class.attributes.push(Attribute { name, info });
        }
    }
    Ok(true)
}

impl EntryTransformer for SourceFileFixer {
    fn name(&self) -> &'static str {
        "source-file"
    }

    fn transform(&self, entry: JarEntry) -> WorkspaceResult<Option<JarEntry>> {
        if entry.kind != EntryKind::Class {
            return Ok(Some(entry));
        }
        let source = open(&entry.data)?;
        let mut class = ClassFile::read(&source)?;
        if !fix_source_file(&source, &mut class)? {
            return Ok(Some(entry));
        }
        let data = class.to_bytes()?;
        Ok(Some(entry.with_data(data)))
    }
}
