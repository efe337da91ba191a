use std::sync::Arc;

use noak::reader::attributes::InnerClasses;

use super::{Access, AccessWidener};
use crate::core::classfile::attributes;
use crate::core::classfile::{open, utf8, AccessFlags, ClassFile, ClassSource, VISIBILITY};
use crate::core::error::WorkspaceResult;
use crate::core::jar::{EntryKind, EntryTransformer, JarEntry};

fn make_public(access: AccessFlags) -> AccessFlags {
    access.difference(VISIBILITY) | AccessFlags::PUBLIC
}

fn widen_class(access: AccessFlags, rule: Access) -> AccessFlags {
    let mut access = access;
    if rule.accessible || rule.extendable {
        access = make_public(access);
    }
    if rule.extendable {
        access.remove(AccessFlags::FINAL);
    }
    access
}

fn widen_method(access: AccessFlags, is_constructor: bool, rule: Access) -> AccessFlags {
    let mut widened = access;
    if rule.accessible {
        widened = make_public(widened);
        // a private instance method must not start taking part in virtual dispatch
        if access.contains(AccessFlags::PRIVATE) && !access.contains(AccessFlags::STATIC) && !is_constructor {
            widened.insert(AccessFlags::FINAL);
        }
    }
    if rule.extendable {
        if !widened.contains(AccessFlags::PUBLIC) {
            widened = widened.difference(VISIBILITY) | AccessFlags::PROTECTED;
        }
        widened.remove(AccessFlags::FINAL);
    }
    widened
}

fn widen_field(access: AccessFlags, rule: Access) -> AccessFlags {
    let mut access = access;
    if rule.accessible {
        access = make_public(access);
    }
    if rule.mutable {
        access.remove(AccessFlags::FINAL);
    }
    access
}

/// Applies an [`AccessWidener`] to every class of a jar.
///
/// Any class may carry an `InnerClasses` row for a widened class, so every
/// class entry is visited, including multi-release copies.
pub struct AccessWidenerTransformer {
    widener: Arc<AccessWidener>,
}

impl AccessWidenerTransformer {
    pub fn new(widener: Arc<AccessWidener>) -> Self {
        Self { widener }
    }

    /// Widen `class`, freshly read from `source`. Returns whether anything changed.
    pub fn widen(&self, source: &ClassSource<'_>, class: &mut ClassFile) -> WorkspaceResult<bool> {
        let pool = source.pool();
        let name = class.name()?;
        let mut changed = false;

        if let Some(rule) = self.widener.class_access(&name) {
            let access = widen_class(class.access, rule);
            changed |= access != class.access;
            class.access = access;
        }

        for (method, read) in class.methods.iter_mut().zip(source.methods().iter()) {
            let read = read?;
            let method_name = utf8(pool, read.name())?;
            let descriptor = utf8(pool, read.descriptor())?;
            if let Some(rule) = self.widener.method_access(&name, &method_name, &descriptor) {
                let access = widen_method(method.access, method_name == "<init>", rule);
                changed |= access != method.access;
                method.access = access;
            }
        }

        for (field, read) in class.fields.iter_mut().zip(source.fields().iter()) {
            let read = read?;
            let field_name = utf8(pool, read.name())?;
            let descriptor = utf8(pool, read.descriptor())?;
            if let Some(rule) = self.widener.field_access(&name, &field_name, &descriptor) {
                let access = widen_field(field.access, rule);
                changed |= access != field.access;
                field.access = access;
            }
        }

        if let Some((position, attribute)) = attributes::find(pool, &source.attributes(), attributes::INNER_CLASSES)? {
            let table: InnerClasses = attributes::read(pool, &attribute)?;
            let mut rows = attributes::inner_classes(&table)?;
            let mut rows_changed = false;
            for row in &mut rows {
                let inner = class.pool.class_name(row.inner)?;
                if let Some(rule) = self.widener.class_access(&inner) {
                    let access = widen_class(row.access, rule);
                    rows_changed |= access != row.access;
                    row.access = access;
                }
            }
            if rows_changed {
                class.attributes[position].info = attributes::write_inner_classes(&rows)?;
                changed = true;
            }
        }

        Ok(changed)
    }
}

impl EntryTransformer for AccessWidenerTransformer {
    fn name(&self) -> &'static str {
        "access-widener"
    }

    fn transform(&self, entry: JarEntry) -> WorkspaceResult<Option<JarEntry>> {
        if entry.kind != EntryKind::Class || self.widener.is_empty() {
            return Ok(Some(entry));
        }
        let source = open(&entry.data)?;
        let mut class = ClassFile::read(&source)?;
        if !self.widen(&source, &mut class)? {
            return Ok(Some(entry));
        }
        let data = class.to_bytes()?;
        Ok(Some(entry.with_data(data)))
    }
}
