pub mod commands;
pub mod core;

pub use crate::core::error::{WorkspaceError, WorkspaceResult};
pub use crate::core::platform::{MinecraftPlatform, MinecraftSide};
pub use crate::core::resolver::{MinecraftEnvironment, MinecraftResolver, ResolverContext};
