//! Path resolution and config digest helpers shared by the engine, SDK, and CLI.

pub mod digest;
pub mod path;

pub use digest::config_digest;
pub use path::{
    discover_project_root, expand_tilde, normalize_path, paths_equal, project_relative,
    resolve_workspace_path,
};
