// ─── Remapping ───
// Renames classes, members and descriptors inside class files, resolving
// member names through the class hierarchy so overrides stay consistent.

mod class;
pub mod hierarchy;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::core::classfile::descriptor::remap_descriptor;
use crate::core::classfile::{open, ClassFile};
use crate::core::error::WorkspaceResult;
use crate::core::jar::lvt::fix_local_variables;
use crate::core::jar::manifest::JarManifest;
use crate::core::jar::source_file::fix_source_file;
use crate::core::jar::{EntryKind, EntryTransformer, JarEntry};
use crate::core::mappings::MappingSet;

pub use class::remap_class;
pub use hierarchy::ClassHierarchy;

/// Name lookups in the source namespace. `None` means "unchanged".
pub trait Remapper: Send + Sync {
    fn map_class(&self, name: &str) -> Option<String>;

    fn map_field(&self, owner: &str, name: &str, descriptor: &str) -> Option<String>;

    fn map_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<String>;

    /// Element of an annotation type; only the name is known.
    fn map_annotation_element(&self, _annotation: &str, _name: &str) -> Option<String> {
        None
    }

    /// Name for the local variable in `slot` of a method.
    fn parameter_name(&self, _owner: &str, _method: &str, _descriptor: &str, _slot: u16) -> Option<String> {
        None
    }

    fn map_type(&self, name: &str) -> String {
        self.map_class(name).unwrap_or_else(|| name.to_string())
    }

    fn map_descriptor(&self, descriptor: &str) -> String {
        remap_descriptor(descriptor, &mut |name| self.map_type(name))
    }
}

type MemberKey = (String, String, String);

/// [`Remapper`] backed by a [`MappingSet`]. Members not mapped on their
/// owner are looked up on its ancestors, skipping private ones.
pub struct MappingRemapper {
    mappings: Arc<MappingSet>,
    hierarchy: ClassHierarchy,
    methods: Mutex<HashMap<MemberKey, Option<String>>>,
    fields: Mutex<HashMap<MemberKey, Option<String>>>,
}

impl MappingRemapper {
    pub fn new(mappings: Arc<MappingSet>, hierarchy: ClassHierarchy) -> Self {
        Self {
            mappings,
            hierarchy,
            methods: Mutex::new(HashMap::new()),
            fields: Mutex::new(HashMap::new()),
        }
    }

    fn memoized(
        cache: &Mutex<HashMap<MemberKey, Option<String>>>,
        key: MemberKey,
        compute: impl FnOnce() -> Option<String>,
    ) -> Option<String> {
        if let Ok(cache) = cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }
        let value = compute();
        if let Ok(mut cache) = cache.lock() {
            cache.insert(key, value.clone());
        }
        value
    }

    fn resolve_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<String> {
        for class in self.hierarchy.lineage(owner) {
            if class != owner && self.hierarchy.is_private_method(&class, name, descriptor) {
                continue;
            }
            let mapped = self
                .mappings
                .class(&class)
                .and_then(|c| c.method(name, descriptor))
                .map(|m| m.named.clone());
            if let Some(named) = mapped {
                return (named != name).then_some(named);
            }
        }
        None
    }

    /// The first class in the lineage that declares the field owns it; an
    /// unmapped declaration there hides any mapping further up.
    fn resolve_field(&self, owner: &str, name: &str, descriptor: &str) -> Option<String> {
        for class in self.hierarchy.lineage(owner) {
            if class != owner && self.hierarchy.is_private_field(&class, name, descriptor) {
                continue;
            }
            let mapped = self
                .mappings
                .class(&class)
                .and_then(|c| c.field(name, Some(descriptor)))
                .map(|f| f.named.clone());
            if let Some(named) = mapped {
                return (named != name).then_some(named);
            }
            if self.hierarchy.declares_field(&class, name, descriptor) {
                return None;
            }
        }
        None
    }
}

impl Remapper for MappingRemapper {
    fn map_class(&self, name: &str) -> Option<String> {
        self.mappings.map_class(name).filter(|mapped| mapped != name)
    }

    fn map_field(&self, owner: &str, name: &str, descriptor: &str) -> Option<String> {
        let key = (owner.to_string(), name.to_string(), descriptor.to_string());
        Self::memoized(&self.fields, key, || self.resolve_field(owner, name, descriptor))
    }

    fn map_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<String> {
        if name.starts_with('<') {
            return None;
        }
        let key = (owner.to_string(), name.to_string(), descriptor.to_string());
        Self::memoized(&self.methods, key, || self.resolve_method(owner, name, descriptor))
    }

    fn map_annotation_element(&self, annotation: &str, name: &str) -> Option<String> {
        self.mappings
            .class(annotation)?
            .methods_named(name)
            .find(|m| m.descriptor.starts_with("()"))
            .map(|m| m.named.clone())
            .filter(|named| named != name)
    }

    fn parameter_name(&self, owner: &str, method: &str, descriptor: &str, slot: u16) -> Option<String> {
        self.mappings
            .class(owner)?
            .method(method, descriptor)?
            .parameters
            .get(&slot)
            .cloned()
    }
}

/// Remaps class entries and moves them to their new paths. Afterwards the
/// `SourceFile` attribute follows the new name and obfuscated local names
/// are replaced.
pub struct ClassRemapTransformer {
    remapper: Arc<dyn Remapper>,
}

impl ClassRemapTransformer {
    pub fn new(remapper: Arc<dyn Remapper>) -> Self {
        Self { remapper }
    }

    fn remap_manifest(&self, entry: JarEntry) -> JarEntry {
        let mut manifest = JarManifest::parse(&entry.data);
        let Some(main) = manifest.main_attribute("Main-Class").map(|m| m.replace('.', "/")) else {
            return entry;
        };
        match self.remapper.map_class(&main) {
            Some(mapped) => {
                manifest.set_main_attribute("Main-Class", mapped.replace('/', "."));
                entry.with_data(manifest.to_bytes())
            }
            None => entry,
        }
    }
}

impl EntryTransformer for ClassRemapTransformer {
    fn name(&self) -> &'static str {
        "remap"
    }

    fn transform(&self, entry: JarEntry) -> WorkspaceResult<Option<JarEntry>> {
        match entry.kind {
            EntryKind::Class => {}
            EntryKind::Manifest => return Ok(Some(self.remap_manifest(entry))),
            _ => return Ok(Some(entry)),
        }
        let source = open(&entry.data)?;
        let mut class = ClassFile::read(&source)?;
        let original = class.name()?;
        remap_class(&source, &mut class, self.remapper.as_ref())?;
        let remapped = class.to_bytes()?;

        // the fixers work on the renamed class
        let source = open(&remapped)?;
        let mut class = ClassFile::read(&source)?;
        let source_file_fixed = fix_source_file(&source, &mut class)?;
        let locals_fixed = fix_local_variables(&source, &mut class)?;
        let renamed = class.name()?;
        let data = if source_file_fixed || locals_fixed {
            class.to_bytes()?
        } else {
            remapped
        };

        if renamed == original {
            return Ok(Some(entry.with_data(data)));
        }
        debug!("Remapped {} -> {}", original, renamed);
        let path = entry.path_for_class(&renamed);
        Ok(Some(JarEntry::new(path, data).with_time(entry.time)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classfile::attributes;
    use crate::core::classfile::testing::{index_attribute, local_names, ClassBuilder};
    use crate::core::classfile::{AccessFlags, Constant};

    fn mappings() -> MappingSet {
        let mut builder = MappingSet::builder();
        builder
            .add_class("a", "net/minecraft/World")
            .add_class("b", "net/minecraft/Entity")
            .add_class("c", "net/minecraft/Player")
            .add_field("a", "f", Some("Lb;"), "player")
            .add_method("a", "m", "(Lb;)V", "spawn")
            .add_method("a", "p", "()V", "hidden")
            .add_method("b", "t", "()V", "tick")
            .add_parameter("a", "m", "(Lb;)V", 1, "entity");
        builder.build()
    }

    fn classes() -> Vec<Vec<u8>> {
        vec![
            ClassBuilder::new("a")
                .field(AccessFlags::PUBLIC, "f", "Lb;")
                .method_with_locals(AccessFlags::PUBLIC, "m", "(Lb;)V", &[("\u{2603}", "La;", 0), ("\u{2603}", "Lb;", 1)])
                .method(AccessFlags::PRIVATE, "p", "()V")
                .signature("Ljava/lang/Object;Ljava/util/function/Supplier<Lb;>;")
                .inner_class("a$1", Some("a"), Some("1"), AccessFlags::empty())
                .source_file("SourceFile")
                .string("a")
                .build(),
            ClassBuilder::new("b")
                .method(AccessFlags::PUBLIC, "t", "()V")
                .lambda("run", "b", "t", "()V", "b", "t")
                .build(),
            ClassBuilder::new("c")
                .super_class("a")
                .method(AccessFlags::PUBLIC, "m", "(Lb;)V")
                .method(AccessFlags::PUBLIC, "p", "()V")
                .method_referencing("use", "()V", "c", "f", "Lb;", false)
                .build(),
        ]
    }

    fn transformer(set: MappingSet, classes: &[Vec<u8>]) -> ClassRemapTransformer {
        let mut hierarchy = ClassHierarchy::default();
        for data in classes {
            hierarchy.add(data).unwrap();
        }
        ClassRemapTransformer::new(Arc::new(MappingRemapper::new(Arc::new(set), hierarchy)))
    }

    fn run(transformer: &ClassRemapTransformer, classes: &[Vec<u8>]) -> Vec<JarEntry> {
        classes
            .iter()
            .map(|data| {
                let name = ClassFile::parse(data).unwrap().name().unwrap();
                transformer
                    .transform(JarEntry::new(format!("{}.class", name), data.clone()))
                    .unwrap()
                    .unwrap()
            })
            .collect()
    }

    fn member_names(class: &ClassFile) -> Vec<(String, String)> {
        class
            .fields
            .iter()
            .chain(&class.methods)
            .map(|m| (class.member_name(m).unwrap(), class.member_descriptor(m).unwrap()))
            .collect()
    }

    #[test]
    fn renames_classes_members_and_paths() {
        let input = classes();
        let out = run(&transformer(mappings(), &input), &input);

        assert_eq!(out[0].name, "net/minecraft/World.class");
        let world = ClassFile::parse(&out[0].data).unwrap();
        assert_eq!(
            member_names(&world),
            vec![
                ("player".into(), "Lnet/minecraft/Entity;".into()),
                ("spawn".into(), "(Lnet/minecraft/Entity;)V".into()),
                ("hidden".into(), "()V".into()),
            ]
        );
        assert_eq!(
            index_attribute(&out[0].data, attributes::SIGNATURE).as_deref(),
            Some("Ljava/lang/Object;Ljava/util/function/Supplier<Lnet/minecraft/Entity;>;")
        );
        assert_eq!(index_attribute(&out[0].data, attributes::SOURCE_FILE).as_deref(), Some("World.java"));
        // string literals are left alone
        let literal = world.pool.indices().into_iter().find_map(|i| match world.pool.get(i).unwrap() {
            Constant::String { value } => Some(world.pool.utf8(*value).unwrap()),
            _ => None,
        });
        assert_eq!(literal.as_deref(), Some("a"));

        // parameter names come from the mappings, the rest are generated
        let locals: Vec<String> = local_names(&out[0].data, 0).into_iter().map(|(_, n)| n).collect();
        assert_eq!(locals, vec!["this", "entity"]);
    }

    #[test]
    fn overrides_follow_the_ancestor_but_private_methods_do_not() {
        let input = classes();
        let out = run(&transformer(mappings(), &input), &input);
        let player = ClassFile::parse(&out[2].data).unwrap();
        assert_eq!(player.name().unwrap(), "net/minecraft/Player");
        assert_eq!(player.super_name().unwrap().as_deref(), Some("net/minecraft/World"));
        let names: Vec<String> = member_names(&player).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["spawn", "p", "use"]);

        // field read through the subclass resolves to the inherited field
        let field_ref = player
            .pool
            .indices()
            .into_iter()
            .find(|i| matches!(player.pool.get(*i).unwrap(), Constant::Fieldref { .. }))
            .unwrap();
        assert_eq!(
            player.pool.member_ref(field_ref).unwrap(),
            ("net/minecraft/Player".into(), "player".into(), "Lnet/minecraft/Entity;".into())
        );
    }

    #[test]
    fn a_field_declared_by_the_owner_shadows_the_inherited_mapping() {
        let mut input = classes();
        input.push(
            ClassBuilder::new("d")
                .super_class("a")
                .field(AccessFlags::PUBLIC, "f", "Lb;")
                .method_referencing("read", "()V", "d", "f", "Lb;", false)
                .build(),
        );
        let out = run(&transformer(mappings(), &input), &input);
        let shadowing = ClassFile::parse(&out[3].data).unwrap();
        assert_eq!(member_names(&shadowing)[0], ("f".into(), "Lnet/minecraft/Entity;".into()));
        let field_ref = shadowing
            .pool
            .indices()
            .into_iter()
            .find(|i| matches!(shadowing.pool.get(*i).unwrap(), Constant::Fieldref { .. }))
            .unwrap();
        assert_eq!(
            shadowing.pool.member_ref(field_ref).unwrap(),
            ("d".into(), "f".into(), "Lnet/minecraft/Entity;".into())
        );
    }

    #[test]
    fn lambda_call_sites_use_the_interface_method_name() {
        let input = classes();
        let out = run(&transformer(mappings(), &input), &input);
        let entity = ClassFile::parse(&out[1].data).unwrap();
        let indy = entity
            .pool
            .indices()
            .into_iter()
            .find_map(|i| match entity.pool.get(i).unwrap() {
                Constant::InvokeDynamic { name_and_type, .. } => Some(*name_and_type),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            entity.pool.name_and_type(indy).unwrap(),
            ("tick".into(), "()Lnet/minecraft/Entity;".into())
        );
    }

    #[test]
    fn remapping_with_the_inverse_restores_original_names() {
        let input = classes();
        let forward = run(&transformer(mappings(), &input), &input);
        let renamed: Vec<Vec<u8>> = forward.into_iter().map(|e| e.data).collect();
        let back = run(&transformer(mappings().reverse(), &renamed), &renamed);

        for (original, restored) in input.iter().zip(&back) {
            let original = ClassFile::parse(original).unwrap();
            let restored = ClassFile::parse(&restored.data).unwrap();
            assert_eq!(original.name().unwrap(), restored.name().unwrap());
            assert_eq!(original.super_name().unwrap(), restored.super_name().unwrap());
            assert_eq!(member_names(&original), member_names(&restored));
        }
        assert_eq!(back[0].name, "a.class");
    }

    #[test]
    fn manifest_main_class_is_remapped() {
        let set = {
            let mut builder = MappingSet::builder();
            builder.add_class("a", "net/minecraft/client/Main");
            builder.build()
        };
        let transformer = transformer(set, &[]);
        let out = transformer
            .transform(JarEntry::new("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\nMain-Class: a\r\n".to_vec()))
            .unwrap()
            .unwrap();
        let manifest = JarManifest::parse(&out.data);
        assert_eq!(manifest.main_attribute("Main-Class"), Some("net.minecraft.client.Main"));
    }
}
