// Library root
// -----------
// The binary (`main.rs`) parses arguments and hands off to `commands`.
//
// Module responsibilities:
// - `api`: blocking HTTP client for the backend and the `Backend` trait.
// - `archive`: packs an app folder into a build-context tarball.
// - `config`: per-app `config.toml` and the per-user global config.
// - `variant`: the variant workflow (add, start, remove, list, sync).
// - `ui`: prompts, spinners and colored output.
// - `telemetry`: opt-in usage events.
// - `commands` / `cli`: argument definitions and per-command wrappers.
pub mod api;
pub mod archive;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod ui;
pub mod variant;

pub use error::{Result, VariantError};
