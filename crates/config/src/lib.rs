//! Configuration loading and env substitution.
//!
//! Config files: `switchboard.toml`, `switchboard.yaml`, `switchboard.yml` or
//! `switchboard.json`, searched in `./` then the user config directory
//! (`~/.config/switchboard/` on Linux).
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod template;

pub use {
    error::{Error, Result},
    loader::{config_dir, data_dir, discover_and_load, find_config_file, load_config},
    schema::{
        DispatchConfig, MediaConfig, ServerConfig, SessionsConfig, SwitchboardConfig,
        WhatsAppSidecarConfig,
    },
    template::default_config_template,
};
