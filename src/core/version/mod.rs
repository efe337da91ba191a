pub mod descriptor;
pub mod manifest;
pub mod repository;

pub use descriptor::{Download, DownloadClassifier, Library, VersionDescriptor};
pub use manifest::{VersionClassifier, VersionManifestV2, VersionReference, DEFAULT_MANIFEST_URL};
pub use repository::{LauncherMetaRepository, VersionManifestRepository};
