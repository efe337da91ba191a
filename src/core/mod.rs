// ─── Workspace Core ───
// Resolution and transformation pipeline for Minecraft: Java Edition jars.
//
// Architecture:
//   core/
//     resolver/        Memoized environment resolution, Ivy metadata, sync executor
//     platform         Client / server / joined and their library sets
//     modifier/        Official mappings, custom mapping layers, access wideners
//     version/         Launcher manifest + per-version descriptors
//     downloader/      Cached downloads with hash validation
//     bundler          Bundled server jar metadata and extraction
//     jar/             Entry pipeline, merge, filters, signature stripping
//     classfile/       Class file model and attribute codecs
//     remap/           Class hierarchy and bytecode renaming
//     mappings/        Mapping sets, formats and layering
//     access_widener/  Access widener parser and transformer
//     settings         Per-project settings file

pub mod access_widener;
pub mod bundler;
pub mod classfile;
pub mod downloader;
pub mod error;
pub mod fs;
pub mod hash;
pub mod http;
pub mod jar;
pub mod mappings;
pub mod maven;
pub mod modifier;
pub mod platform;
pub mod remap;
pub mod resolution;
pub mod resolver;
pub mod settings;
pub mod version;
