// ─── Mappings ───
// A frozen table of class/field/method/parameter renamings from a source
// ("obfuscated") namespace to a target ("named") namespace, plus the readers
// for the supported on-disk formats.

pub mod format;
pub mod layers;
pub mod parchment;
pub mod proguard;
pub mod srg;
pub mod tiny;

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;

use crate::core::classfile::descriptor::remap_descriptor;

pub use format::MappingFormat;
pub use layers::{LayerSpec, MappingLayers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub obfuscated: String,
    pub named: String,
    /// Source-namespace descriptor, when the format records one.
    pub descriptor: Option<String>,
    pub javadoc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMapping {
    pub obfuscated: String,
    pub descriptor: String,
    pub named: String,
    /// Local variable slot -> name.
    pub parameters: BTreeMap<u16, String>,
    pub javadoc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    pub obfuscated: String,
    pub named: String,
    pub javadoc: Option<String>,
    fields: IndexMap<(String, Option<String>), FieldMapping>,
    methods: IndexMap<(String, String), MethodMapping>,
}

impl ClassMapping {
    fn new(obfuscated: &str, named: &str) -> Self {
        Self {
            obfuscated: obfuscated.to_string(),
            named: named.to_string(),
            javadoc: None,
            fields: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    /// Exact descriptor match first, then a descriptor-less entry.
    pub fn field(&self, name: &str, descriptor: Option<&str>) -> Option<&FieldMapping> {
        if let Some(desc) = descriptor {
            if let Some(field) = self.fields.get(&(name.to_string(), Some(desc.to_string()))) {
                return Some(field);
            }
        }
        if let Some(field) = self.fields.get(&(name.to_string(), None)) {
            return Some(field);
        }
        if descriptor.is_none() {
            return self.fields.values().find(|f| f.obfuscated == name);
        }
        None
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodMapping> {
        self.methods.get(&(name.to_string(), descriptor.to_string()))
    }

    /// Methods called `name`, whatever their descriptor.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodMapping> + 'a {
        self.methods.values().filter(move |m| m.obfuscated == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields.values()
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodMapping> {
        self.methods.values()
    }

    /// Carries no naming opinion, only documentation and parameter names.
    pub fn is_identity(&self) -> bool {
        self.obfuscated == self.named
            && self.fields.values().all(|f| f.obfuscated == f.named)
            && self.methods.values().all(|m| m.obfuscated == m.named)
    }

    fn insert_field(&mut self, field: FieldMapping) {
        self.fields
            .insert((field.obfuscated.clone(), field.descriptor.clone()), field);
    }

    fn insert_method(&mut self, method: MethodMapping) {
        self.methods
            .insert((method.obfuscated.clone(), method.descriptor.clone()), method);
    }
}

/// Immutable once built; produced by [`MappingSetBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSet {
    classes: IndexMap<String, ClassMapping>,
}

impl MappingSet {
    pub fn builder() -> MappingSetBuilder {
        MappingSetBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn class(&self, obfuscated: &str) -> Option<&ClassMapping> {
        self.classes.get(obfuscated)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassMapping> {
        self.classes.values()
    }

    /// Target name of a class, or of its outer class with the inner suffix kept.
    pub fn map_class(&self, obfuscated: &str) -> Option<String> {
        if let Some(class) = self.classes.get(obfuscated) {
            return Some(class.named.clone());
        }
        let (outer, inner) = obfuscated.rsplit_once('$')?;
        self.map_class(outer).map(|outer| format!("{}${}", outer, inner))
    }

    pub fn map_descriptor(&self, descriptor: &str) -> String {
        remap_descriptor(descriptor, &mut |name| {
            self.map_class(name).unwrap_or_else(|| name.to_string())
        })
    }

    /// Swap source and target namespaces. Descriptors are rewritten into the
    /// new source namespace.
    pub fn reverse(&self) -> MappingSet {
        let mut builder = MappingSetBuilder::default();
        for class in self.classes.values() {
            let reversed = builder.class(&class.named, &class.obfuscated);
            reversed.javadoc = class.javadoc.clone();
            for field in class.fields.values() {
                reversed.insert_field(FieldMapping {
                    obfuscated: field.named.clone(),
                    named: field.obfuscated.clone(),
                    descriptor: field.descriptor.as_deref().map(|d| self.map_descriptor(d)),
                    javadoc: field.javadoc.clone(),
                });
            }
            for method in class.methods.values() {
                reversed.insert_method(MethodMapping {
                    obfuscated: method.named.clone(),
                    descriptor: self.map_descriptor(&method.descriptor),
                    named: method.obfuscated.clone(),
                    parameters: method.parameters.clone(),
                    javadoc: method.javadoc.clone(),
                });
            }
        }
        builder.build()
    }

    /// Ordered union of `self` and `other`; `other` wins every conflict.
    ///
    /// Identity entries in `other` rename nothing. They are matched against
    /// the *target* names of `self` and only contribute javadoc and
    /// parameter names.
    pub fn merge(&self, other: &MappingSet) -> MappingSet {
        let mut classes = self.classes.clone();
        let mut by_named: HashMap<String, String> = classes
            .values()
            .map(|c| (c.named.clone(), c.obfuscated.clone()))
            .collect();

        for incoming in other.classes.values() {
            if let Some(existing) = classes.get_mut(&incoming.obfuscated) {
                merge_class(existing, incoming);
                by_named.insert(existing.named.clone(), existing.obfuscated.clone());
                continue;
            }
            if incoming.is_identity() {
                if let Some(obfuscated) = by_named.get(&incoming.obfuscated).cloned() {
                    let to_named = NamedSpace::new(&classes);
                    let overlay = to_named.overlay_for(&classes[&obfuscated], incoming);
                    if let Some(existing) = classes.get_mut(&obfuscated) {
                        merge_class(existing, &overlay);
                    }
                    continue;
                }
            }
            by_named.insert(incoming.named.clone(), incoming.obfuscated.clone());
            classes.insert(incoming.obfuscated.clone(), incoming.clone());
        }
        MappingSet { classes }
    }
}

fn merge_class(existing: &mut ClassMapping, incoming: &ClassMapping) {
    if incoming.named != incoming.obfuscated {
        existing.named = incoming.named.clone();
    }
    if incoming.javadoc.is_some() {
        existing.javadoc = incoming.javadoc.clone();
    }
    for field in incoming.fields.values() {
        merge_field(existing, field);
    }
    for method in incoming.methods.values() {
        let key = (method.obfuscated.clone(), method.descriptor.clone());
        match existing.methods.get_mut(&key) {
            Some(current) => {
                if method.named != method.obfuscated {
                    current.named = method.named.clone();
                }
                if method.javadoc.is_some() {
                    current.javadoc = method.javadoc.clone();
                }
                current
                    .parameters
                    .extend(method.parameters.iter().map(|(k, v)| (*k, v.clone())));
            }
            None => {
                existing.methods.insert(key, method.clone());
            }
        }
    }
}

/// A field without a descriptor stands for every field of that name, so it
/// overrides all of them; a field with one supersedes the descriptor-less entry.
fn merge_field(existing: &mut ClassMapping, field: &FieldMapping) {
    let apply = |current: &mut FieldMapping| {
        if field.named != field.obfuscated {
            current.named = field.named.clone();
        }
        if field.javadoc.is_some() {
            current.javadoc = field.javadoc.clone();
        }
    };
    if field.descriptor.is_none() {
        let mut matched = false;
        for current in existing.fields.values_mut().filter(|f| f.obfuscated == field.obfuscated) {
            apply(current);
            matched = true;
        }
        if !matched {
            existing
                .fields
                .insert((field.obfuscated.clone(), None), field.clone());
        }
        return;
    }

    let loose = existing.fields.shift_remove(&(field.obfuscated.clone(), None));
    let key = (field.obfuscated.clone(), field.descriptor.clone());
    match existing.fields.get_mut(&key) {
        Some(current) => apply(current),
        None => {
            let mut inserted = FieldMapping {
                descriptor: field.descriptor.clone(),
                ..loose.unwrap_or_else(|| field.clone())
            };
            apply(&mut inserted);
            existing.fields.insert(key, inserted);
        }
    }
}

/// Translates an identity overlay keyed by target names back into the
/// source namespace of an existing class.
struct NamedSpace {
    obfuscated_to_named: HashMap<String, String>,
}

impl NamedSpace {
    fn new(classes: &IndexMap<String, ClassMapping>) -> Self {
        Self {
            obfuscated_to_named: classes
                .values()
                .map(|c| (c.obfuscated.clone(), c.named.clone()))
                .collect(),
        }
    }

    fn named_descriptor(&self, descriptor: &str) -> String {
        remap_descriptor(descriptor, &mut |name| {
            self.obfuscated_to_named
                .get(name)
                .cloned()
                .unwrap_or_else(|| name.to_string())
        })
    }

    fn overlay_for(&self, target: &ClassMapping, incoming: &ClassMapping) -> ClassMapping {
        let mut overlay = ClassMapping::new(&target.obfuscated, &target.obfuscated);
        overlay.javadoc = incoming.javadoc.clone();
        for field in incoming.fields.values() {
            let matched = target.fields.values().find(|f| {
                f.named == field.obfuscated
                    && match (&f.descriptor, &field.descriptor) {
                        (Some(ours), Some(theirs)) => self.named_descriptor(ours) == *theirs,
                        _ => true,
                    }
            });
            if let Some(matched) = matched {
                overlay.insert_field(FieldMapping {
                    obfuscated: matched.obfuscated.clone(),
                    named: matched.obfuscated.clone(),
                    descriptor: matched.descriptor.clone(),
                    javadoc: field.javadoc.clone(),
                });
            }
        }
        for method in incoming.methods.values() {
            let matched = target.methods.values().find(|m| {
                m.named == method.obfuscated && self.named_descriptor(&m.descriptor) == method.descriptor
            });
            let (obfuscated, descriptor) = match matched {
                Some(m) => (m.obfuscated.clone(), m.descriptor.clone()),
                // not renamed by earlier layers: source and target names agree
                None if target.obfuscated == target.named => {
                    (method.obfuscated.clone(), method.descriptor.clone())
                }
                None => continue,
            };
            overlay.insert_method(MethodMapping {
                obfuscated: obfuscated.clone(),
                descriptor,
                named: obfuscated,
                parameters: method.parameters.clone(),
                javadoc: method.javadoc.clone(),
            });
        }
        overlay
    }
}

/// Mutable staging area for a [`MappingSet`].
#[derive(Debug, Default)]
pub struct MappingSetBuilder {
    classes: IndexMap<String, ClassMapping>,
}

impl MappingSetBuilder {
    /// Get or create the class entry for `obfuscated`; an existing entry is renamed.
    pub fn class(&mut self, obfuscated: &str, named: &str) -> &mut ClassMapping {
        let class = self
            .classes
            .entry(obfuscated.to_string())
            .or_insert_with(|| ClassMapping::new(obfuscated, named));
        class.named = named.to_string();
        class
    }

    /// Class entry for members whose owner has no explicit class line.
    fn owner(&mut self, obfuscated: &str) -> &mut ClassMapping {
        self.classes
            .entry(obfuscated.to_string())
            .or_insert_with(|| ClassMapping::new(obfuscated, obfuscated))
    }

    pub fn add_class(&mut self, obfuscated: &str, named: &str) -> &mut Self {
        self.class(obfuscated, named);
        self
    }

    pub fn add_field(&mut self, owner: &str, obfuscated: &str, descriptor: Option<&str>, named: &str) -> &mut Self {
        self.owner(owner).insert_field(FieldMapping {
            obfuscated: obfuscated.to_string(),
            named: named.to_string(),
            descriptor: descriptor.map(str::to_string),
            javadoc: None,
        });
        self
    }

    pub fn add_method(&mut self, owner: &str, obfuscated: &str, descriptor: &str, named: &str) -> &mut Self {
        let class = self.owner(owner);
        let key = (obfuscated.to_string(), descriptor.to_string());
        match class.methods.get_mut(&key) {
            Some(method) => method.named = named.to_string(),
            None => class.insert_method(MethodMapping {
                obfuscated: obfuscated.to_string(),
                descriptor: descriptor.to_string(),
                named: named.to_string(),
                parameters: BTreeMap::new(),
                javadoc: None,
            }),
        }
        self
    }

    /// Name a parameter by local variable slot. Creates an identity method
    /// entry when the method itself is not renamed.
    pub fn add_parameter(&mut self, owner: &str, method: &str, descriptor: &str, slot: u16, name: &str) -> &mut Self {
        self.method_entry(owner, method, descriptor)
            .parameters
            .insert(slot, name.to_string());
        self
    }

    pub fn set_class_javadoc(&mut self, owner: &str, javadoc: &str) -> &mut Self {
        self.owner(owner).javadoc = Some(javadoc.to_string());
        self
    }

    pub fn set_field_javadoc(&mut self, owner: &str, field: &str, descriptor: Option<&str>, javadoc: &str) -> &mut Self {
        let class = self.owner(owner);
        let key = (field.to_string(), descriptor.map(str::to_string));
        match class.fields.get_mut(&key) {
            Some(f) => f.javadoc = Some(javadoc.to_string()),
            None => class.insert_field(FieldMapping {
                obfuscated: field.to_string(),
                named: field.to_string(),
                descriptor: descriptor.map(str::to_string),
                javadoc: Some(javadoc.to_string()),
            }),
        }
        self
    }

    pub fn set_method_javadoc(&mut self, owner: &str, method: &str, descriptor: &str, javadoc: &str) -> &mut Self {
        self.method_entry(owner, method, descriptor).javadoc = Some(javadoc.to_string());
        self
    }

    fn method_entry(&mut self, owner: &str, method: &str, descriptor: &str) -> &mut MethodMapping {
        self.owner(owner)
            .methods
            .entry((method.to_string(), descriptor.to_string()))
            .or_insert_with(|| MethodMapping {
                obfuscated: method.to_string(),
                descriptor: descriptor.to_string(),
                named: method.to_string(),
                parameters: BTreeMap::new(),
                javadoc: None,
            })
    }

    pub fn build(self) -> MappingSet {
        MappingSet { classes: self.classes }
    }
}
