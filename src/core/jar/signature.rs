use super::manifest::JarManifest;
use super::{EntryKind, EntryTransformer, JarEntry};
use crate::core::error::WorkspaceResult;

const SIGNATURE_SUFFIXES: [&str; 4] = [".SF", ".RSA", ".DSA", ".EC"];

/// Removes jar signing data so a modified jar still loads.
///
/// Digest attributes are stripped from the manifest and signature block
/// files under `META-INF/` are deleted.
pub struct SignatureStripper;

fn is_signature_file(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };
    !file.contains('/')
        && (file.starts_with("SIG-")
            || SIGNATURE_SUFFIXES
                .iter()
                .any(|suffix| file.to_ascii_uppercase().ends_with(suffix)))
}

impl EntryTransformer for SignatureStripper {
    fn name(&self) -> &'static str {
        "strip-signatures"
    }

    fn transform(&self, entry: JarEntry) -> WorkspaceResult<Option<JarEntry>> {
        match entry.kind {
            EntryKind::Manifest => {
                let mut manifest = JarManifest::parse(&entry.data);
                if manifest.strip_section_attributes(|key| key.to_ascii_uppercase().ends_with("-DIGEST")) {
                    let data = manifest.to_bytes();
                    return Ok(Some(entry.with_data(data)));
                }
                Ok(Some(entry))
            }
            EntryKind::Resource if is_signature_file(&entry.name) => Ok(None),
            _ => Ok(Some(entry)),
        }
    }
}
