// Parchment exports: javadoc and parameter names keyed by named identity.
// Every entry is an identity mapping; it only makes sense layered on top of
// a set that already names classes and members.

use serde::Deserialize;

use super::{MappingSet, MappingSetBuilder};
use crate::core::error::{WorkspaceError, WorkspaceResult};

#[derive(Debug, Deserialize)]
struct ParchmentExport {
    #[serde(default)]
    classes: Vec<ParchmentClass>,
}

#[derive(Debug, Deserialize)]
struct ParchmentClass {
    name: String,
    #[serde(default)]
    javadoc: Vec<String>,
    #[serde(default)]
    fields: Vec<ParchmentField>,
    #[serde(default)]
    methods: Vec<ParchmentMethod>,
}

#[derive(Debug, Deserialize)]
struct ParchmentField {
    name: String,
    descriptor: String,
    #[serde(default)]
    javadoc: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ParchmentMethod {
    name: String,
    descriptor: String,
    #[serde(default)]
    javadoc: Vec<String>,
    #[serde(default)]
    parameters: Vec<ParchmentParameter>,
}

#[derive(Debug, Deserialize)]
struct ParchmentParameter {
    index: u16,
    name: Option<String>,
}

fn joined(lines: &[String]) -> Option<String> {
    (!lines.is_empty()).then(|| lines.join("\n"))
}

pub fn read(text: &str) -> WorkspaceResult<MappingSet> {
    let export: ParchmentExport = serde_json::from_str(text).map_err(|e| WorkspaceError::Mappings {
        format: "parchment",
        message: e.to_string(),
    })?;

    let mut builder = MappingSetBuilder::default();
    for class in &export.classes {
        builder.add_class(&class.name, &class.name);
        if let Some(doc) = joined(&class.javadoc) {
            builder.set_class_javadoc(&class.name, &doc);
        }
        for field in &class.fields {
            match joined(&field.javadoc) {
                Some(doc) => builder.set_field_javadoc(&class.name, &field.name, Some(&field.descriptor), &doc),
                None => builder.add_field(&class.name, &field.name, Some(&field.descriptor), &field.name),
            };
        }
        for method in &class.methods {
            builder.add_method(&class.name, &method.name, &method.descriptor, &method.name);
            if let Some(doc) = joined(&method.javadoc) {
                builder.set_method_javadoc(&class.name, &method.name, &method.descriptor, &doc);
            }
            for parameter in &method.parameters {
                if let Some(name) = &parameter.name {
                    builder.add_parameter(&class.name, &method.name, &method.descriptor, parameter.index, name);
                }
            }
        }
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "version": "1.1.0",
        "classes": [{
            "name": "net/minecraft/World",
            "javadoc": ["The world.", "One per dimension."],
            "fields": [{ "name": "player", "descriptor": "Lnet/minecraft/Entity;" }],
            "methods": [{
                "name": "spawn",
                "descriptor": "(Lnet/minecraft/Entity;)V",
                "javadoc": ["Spawns."],
                "parameters": [{ "index": 1, "name": "toSpawn" }, { "index": 2 }]
            }]
        }]
    }"#;

    #[test]
    fn export_becomes_identity_entries() {
        let set = read(EXPORT).unwrap();
        let world = set.class("net/minecraft/World").unwrap();
        assert!(world.is_identity());
        assert_eq!(world.javadoc.as_deref(), Some("The world.\nOne per dimension."));
        let spawn = world.method("spawn", "(Lnet/minecraft/Entity;)V").unwrap();
        assert_eq!(spawn.javadoc.as_deref(), Some("Spawns."));
        assert_eq!(spawn.parameters.len(), 1);
        assert_eq!(spawn.parameters.get(&1).map(String::as_str), Some("toSpawn"));
    }

    #[test]
    fn malformed_json_is_a_mappings_error() {
        let err = read("{ nope").unwrap_err();
        assert!(matches!(err, WorkspaceError::Mappings { format: "parchment", .. }));
    }
}
