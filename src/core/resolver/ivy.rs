// Ivy module descriptors for synthesized artifacts, so an ordinary
// dependency resolver can consume them from the cache directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};
use crate::core::fs;
use crate::core::maven::{MavenArtifact, MINECRAFT_GROUP};
use crate::core::version::VersionDescriptor;

/// Bumped whenever the descriptor layout changes.
pub const METADATA_VERSION: u32 = 2;

pub const INJECTED_DEPENDENCIES: &[&str] = &["com.google.code.findbugs:jsr305:3.0.2"];

const IVY_SCHEMA: &str = "http://ant.apache.org/ivy/schemas/ivy.xsd";
const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const EXTRA_NAMESPACE: &str = "https://minecraft-workspace.dev/ivy-extra";

#[derive(Serialize)]
struct IvyModule<'a> {
    #[serde(rename = "@version")]
    version: &'a str,
    #[serde(rename = "@xmlns:xsi")]
    xmlns_xsi: &'a str,
    #[serde(rename = "@xmlns:mcws")]
    xmlns_mcws: &'a str,
    #[serde(rename = "@xsi:noNamespaceSchemaLocation")]
    schema: &'a str,
    info: Info<'a>,
    dependencies: Dependencies<'a>,
}

#[derive(Serialize)]
struct Info<'a> {
    #[serde(rename = "@organisation")]
    organisation: &'a str,
    #[serde(rename = "@module")]
    module: &'a str,
    #[serde(rename = "@revision")]
    revision: &'a str,
    #[serde(rename = "@status")]
    status: &'a str,
    license: License<'a>,
    #[serde(rename = "mcws:mojangStatus")]
    mojang_status: &'a str,
    #[serde(rename = "mcws:javaVersion", skip_serializing_if = "Option::is_none")]
    java_version: Option<u32>,
}

#[derive(Serialize)]
struct License<'a> {
    #[serde(rename = "@name")]
    name: &'a str,
    #[serde(rename = "@url")]
    url: &'a str,
}

#[derive(Serialize)]
struct Dependencies<'a> {
    dependency: Vec<Dependency<'a>>,
}

#[derive(Serialize)]
struct Dependency<'a> {
    #[serde(rename = "@org")]
    org: &'a str,
    #[serde(rename = "@name")]
    name: &'a str,
    #[serde(rename = "@rev")]
    rev: &'a str,
    #[serde(rename = "@transitive")]
    transitive: &'a str,
}

pub fn metadata_file(artifact_dir: &Path, version: &str) -> PathBuf {
    artifact_dir.join(format!("ivy-{}-vg{}.xml", version, METADATA_VERSION))
}

/// Render the module descriptor of `artifact_id` at `descriptor`'s version.
pub fn render(
    artifact_id: &str,
    descriptor: &VersionDescriptor,
    dependencies: &BTreeSet<MavenArtifact>,
) -> WorkspaceResult<String> {
    let mut all = dependencies.clone();
    for injected in INJECTED_DEPENDENCIES {
        all.insert(MavenArtifact::parse(injected)?);
    }

    let module = IvyModule {
        version: "2.0",
        xmlns_xsi: XSI,
        xmlns_mcws: EXTRA_NAMESPACE,
        schema: IVY_SCHEMA,
        info: Info {
            organisation: MINECRAFT_GROUP,
            module: artifact_id,
            revision: &descriptor.id,
            status: "release",
            license: License {
                name: "Minecraft EULA",
                url: "https://www.minecraft.net/en-us/eula",
            },
            mojang_status: descriptor.classifier.id(),
            java_version: descriptor.java_major(),
        },
        dependencies: Dependencies {
            dependency: all
                .iter()
                .map(|d| Dependency {
                    org: &d.group_id,
                    name: &d.artifact_id,
                    rev: &d.version,
                    transitive: "false",
                })
                .collect(),
        },
    };

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let mut serializer = quick_xml::se::Serializer::with_root(&mut xml, Some("ivy-module"))
        .map_err(|e| WorkspaceError::Xml(e.to_string()))?;
    serializer.indent(' ', 4);
    module
        .serialize(serializer)
        .map_err(|e| WorkspaceError::Xml(e.to_string()))?;
    xml.push('\n');
    Ok(xml)
}

/// Write the descriptor next to the artifact unless an up-to-date one exists.
/// Returns whether a file was written.
pub fn write_if_necessary(
    artifact_dir: &Path,
    artifact_id: &str,
    descriptor: &VersionDescriptor,
    dependencies: &BTreeSet<MavenArtifact>,
    up_to_date: bool,
) -> WorkspaceResult<bool> {
    let path = metadata_file(artifact_dir, &descriptor.id);
    if up_to_date && path.is_file() {
        return Ok(false);
    }
    let xml = render(artifact_id, descriptor, dependencies)?;
    fs::write_atomically(&path, |staged| std::fs::write(staged, xml.as_bytes()).at(staged))?;
    Ok(true)
}
