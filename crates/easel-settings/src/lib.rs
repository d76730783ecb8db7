//! Layered configuration for the easel host.
//!
//! 1. Compiled defaults ([`EaselSettings::default()`])
//! 2. User file, `~/.easel/settings.json`, deep-merged over defaults
//! 3. `EASEL_*` environment variables

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
