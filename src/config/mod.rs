//! Configuration module for narrator.
//!
//! Handles the TOML settings file and environment variable expansion.
//! Identifiers and secrets live in an explicit [`Settings`] value that is
//! handed to each client at construction.

mod settings;

pub use settings::{
    expand_env_vars, DrillSettings, NarrativeSettings, OpenAiSettings, PowerBiSettings, Settings,
    SettingsError, SinkSettings,
};
