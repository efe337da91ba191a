// Static registry of the built-in entry transformers, selectable by id.

use std::sync::Arc;

use super::filter::FilterTransformer;
use super::lvt::LocalVariableNameFixer;
use super::signature::SignatureStripper;
use super::source_file::SourceFileFixer;
use super::EntryTransformer;
use crate::core::access_widener::{AccessWidener, AccessWidenerTransformer};
use crate::core::error::{WorkspaceError, WorkspaceResult};
use crate::core::remap::{ClassRemapTransformer, Remapper};

/// Inputs a transformer may need. Each provider takes what it uses.
#[derive(Clone, Default)]
pub struct TransformerInputs {
    pub allowed_packages: Vec<String>,
    pub remapper: Option<Arc<dyn Remapper>>,
    pub access_widener: Option<Arc<AccessWidener>>,
}

type Factory = fn(&TransformerInputs) -> WorkspaceResult<Box<dyn EntryTransformer>>;

pub struct TransformerProvider {
    pub id: &'static str,
    pub description: &'static str,
    factory: Factory,
}

impl TransformerProvider {
    pub fn create(&self, inputs: &TransformerInputs) -> WorkspaceResult<Box<dyn EntryTransformer>> {
        (self.factory)(inputs)
    }
}

fn missing(id: &str, input: &str) -> WorkspaceError {
    WorkspaceError::Configuration(format!("transformer '{}' requires {}", id, input))
}

pub static PROVIDERS: &[TransformerProvider] = &[
    TransformerProvider {
        id: "filter",
        description: "keep classes in the allowed packages",
        factory: |inputs| {
            if inputs.allowed_packages.is_empty() {
                return Err(missing("filter", "at least one allowed package"));
            }
            Ok(Box::new(FilterTransformer::new(inputs.allowed_packages.iter().cloned())))
        },
    },
    TransformerProvider {
        id: "strip-signatures",
        description: "drop jar signatures and manifest digests",
        factory: |_| Ok(Box::new(SignatureStripper)),
    },
    TransformerProvider {
        id: "fix-lvt-names",
        description: "replace invalid local variable names",
        factory: |_| Ok(Box::new(LocalVariableNameFixer)),
    },
    TransformerProvider {
        id: "remap",
        description: "rename classes and members",
        factory: |inputs| {
            let remapper = inputs.remapper.clone().ok_or_else(|| missing("remap", "a remapper"))?;
            Ok(Box::new(ClassRemapTransformer::new(remapper)))
        },
    },
    TransformerProvider {
        id: "access-widener",
        description: "relax access flags",
        factory: |inputs| {
            let widener = inputs
                .access_widener
                .clone()
                .ok_or_else(|| missing("access-widener", "an access widener"))?;
            Ok(Box::new(AccessWidenerTransformer::new(widener)))
        },
    },
    TransformerProvider {
        id: "source-file",
        description: "point SourceFile at the outer class",
        factory: |_| Ok(Box::new(SourceFileFixer)),
    },
];

pub fn provider(id: &str) -> WorkspaceResult<&'static TransformerProvider> {
    PROVIDERS.iter().find(|p| p.id == id).ok_or_else(|| {
        let known: Vec<&str> = PROVIDERS.iter().map(|p| p.id).collect();
        WorkspaceError::Configuration(format!(
            "unknown transformer '{}' (known: {})",
            id,
            known.join(", ")
        ))
    })
}

/// Build the transformers named by `ids`, in order.
pub fn create_all(ids: &[&str], inputs: &TransformerInputs) -> WorkspaceResult<Vec<Box<dyn EntryTransformer>>> {
    // resolve every id before building anything
    let providers = ids.iter().map(|id| provider(id)).collect::<WorkspaceResult<Vec<_>>>()?;
    providers.into_iter().map(|p| p.create(inputs)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_transformers_in_order() {
        let inputs = TransformerInputs {
            allowed_packages: vec!["net/minecraft".into()],
            ..TransformerInputs::default()
        };
        let transformers = create_all(&["filter", "strip-signatures", "source-file"], &inputs).unwrap();
        let names: Vec<&str> = transformers.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["filter", "strip-signatures", "source-file"]);
    }

    #[test]
    fn unknown_ids_and_missing_inputs_are_configuration_errors() {
        let inputs = TransformerInputs::default();
        let err = create_all(&["strip-signatures", "decompile"], &inputs).err().unwrap();
        assert!(matches!(err, WorkspaceError::Configuration(ref m) if m.contains("decompile")));

        let err = create_all(&["remap"], &inputs).err().unwrap();
        assert!(matches!(err, WorkspaceError::Configuration(_)));
        assert!(create_all(&["access-widener"], &inputs).is_err());
        assert!(create_all(&["filter"], &inputs).is_err());
    }
}
