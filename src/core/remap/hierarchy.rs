use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::core::classfile::{class_name, open, utf8, AccessFlags};
use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::jar::{read_entry, EntryKind};

#[derive(Debug, Clone, Default)]
struct ClassNode {
    super_name: Option<String>,
    interfaces: Vec<String>,
    private_methods: HashSet<(String, String)>,
    private_fields: HashSet<(String, String)>,
    fields: HashSet<(String, String)>,
}

/// Superclass and interface edges of every class in a jar, in the source
/// namespace, plus which members are private and therefore not inherited.
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    classes: HashMap<String, ClassNode>,
}

impl ClassHierarchy {
    pub fn from_jar(jar: &Path) -> WorkspaceResult<Self> {
        let mut archive = ZipArchive::new(File::open(jar).at(jar)?)?;
        let mut hierarchy = ClassHierarchy::default();
        for index in 0..archive.len() {
            let entry = read_entry(&mut archive, index)?;
            // versioned copies share the hierarchy of the base entry
            if entry.kind != EntryKind::Class || entry.release.is_some() {
                continue;
            }
            hierarchy.add(&entry.data).map_err(|e| match e {
                WorkspaceError::ClassFormat(reason) => WorkspaceError::MalformedClass {
                    entry: entry.name.clone(),
                    artifact: jar.display().to_string(),
                    reason,
                },
                other => other,
            })?;
        }
        debug!("Read the hierarchy of {} classes from {:?}", hierarchy.len(), jar);
        Ok(hierarchy)
    }

    pub fn add(&mut self, class_data: &[u8]) -> WorkspaceResult<()> {
        let source = open(class_data)?;
        let pool = source.pool();
        let mut node = ClassNode {
            super_name: source.super_class().map(|s| class_name(pool, s)).transpose()?,
            interfaces: source
                .interfaces()
                .iter()
                .map(|i| class_name(pool, i?))
                .collect::<WorkspaceResult<_>>()?,
            ..ClassNode::default()
        };
        for method in source.methods().iter() {
            let method = method?;
            if method.access_flags().contains(AccessFlags::PRIVATE) {
                node.private_methods
                    .insert((utf8(pool, method.name())?, utf8(pool, method.descriptor())?));
            }
        }
        for field in source.fields().iter() {
            let field = field?;
            let key = (utf8(pool, field.name())?, utf8(pool, field.descriptor())?);
            if field.access_flags().contains(AccessFlags::PRIVATE) {
                node.private_fields.insert(key.clone());
            }
            node.fields.insert(key);
        }
        self.classes.insert(class_name(pool, source.this_class())?, node);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// `class` followed by its known ancestors, superclasses before interfaces.
    pub fn lineage(&self, class: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([class.to_string()]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(node) = self.classes.get(&next) {
                queue.extend(node.super_name.iter().cloned());
                queue.extend(node.interfaces.iter().cloned());
            }
            order.push(next);
        }
        order
    }

    pub fn is_private_method(&self, class: &str, name: &str, descriptor: &str) -> bool {
        self.classes
            .get(class)
            .is_some_and(|n| n.private_methods.contains(&(name.to_string(), descriptor.to_string())))
    }

    /// Whether `class` itself declares the field, private or not.
    pub fn declares_field(&self, class: &str, name: &str, descriptor: &str) -> bool {
        self.classes
            .get(class)
            .is_some_and(|n| n.fields.contains(&(name.to_string(), descriptor.to_string())))
    }

    pub fn is_private_field(&self, class: &str, name: &str, descriptor: &str) -> bool {
        self.classes
            .get(class)
            .is_some_and(|n| n.private_fields.contains(&(name.to_string(), descriptor.to_string())))
    }
}
