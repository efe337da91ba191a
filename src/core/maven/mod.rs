mod artifact;

pub use artifact::MavenArtifact;

/// Group under which every synthesized Minecraft artifact is stored.
pub const MINECRAFT_GROUP: &str = "net.minecraft";
