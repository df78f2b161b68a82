// Error taxonomy for the variant workflow. Local validation problems,
// declined prompts and remote failures each get their own variant so the
// command wrappers can decide how to present them.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used by the variant workflow.
pub type Result<T> = std::result::Result<T, VariantError>;

#[derive(Error, Debug)]
pub enum VariantError {
    /// The per-app config file does not exist in the folder.
    #[error("Config file not found in {}. Make sure you are in the right folder and that you have run init first.", .0.display())]
    ConfigNotFound(PathBuf),

    /// Config file exists but could not be read or written.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No {0} exists! Please make sure you are in the right directory")]
    MissingSourceFile(String),

    #[error("Invalid input '{0}'. Please use only alphanumeric characters without spaces in the filename.")]
    InvalidBaseName(String),

    /// The user declined a confirmation or closed a selection.
    #[error("Operation cancelled.")]
    Cancelled,

    #[error("Prompt failed: {0:#}")]
    Prompt(anyhow::Error),

    #[error("No variants found for app {0}. Make sure you have deployed at least one variant.")]
    NoVariants(String),

    #[error("Variant {0} not found in backend. Maybe you removed it in the webUI?")]
    UnknownVariant(String),

    #[error("Error while building image: {0:#}")]
    Build(anyhow::Error),

    #[error("Error while adding variant: {0:#}")]
    Register(anyhow::Error),

    #[error("Error while updating variant: {0:#}")]
    Update(anyhow::Error),

    #[error("Failed to start container with app: {0:#}")]
    Start(anyhow::Error),

    /// The local HTTP client could not be set up.
    #[error("Failed to set up the HTTP client: {0:#}")]
    Client(anyhow::Error),

    /// Transport-level failure reaching the backend.
    #[error("Failed to connect to the backend: {0:#}")]
    Connection(anyhow::Error),

    #[error("Error while removing variant {name} for App {app_name} from the backend: {err:#}")]
    Remove {
        name: String,
        app_name: String,
        err: anyhow::Error,
    },

    #[error("Error while listing variants: {0:#}")]
    List(anyhow::Error),

    #[error("Error while syncing config with the backend: {0:#}")]
    Sync(anyhow::Error),
}

impl VariantError {
    /// Actionable hints printed under the main message.
    pub fn hints(&self) -> Vec<&'static str> {
        match self {
            VariantError::Connection(_) => vec![
                "First, please ensure that the backend service is running and accessible.",
                "Second, try restarting the containers (if using Docker Compose).",
            ],
            _ => Vec::new(),
        }
    }

    /// User-declined prompts are not failures worth coloring red.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, VariantError::Cancelled)
    }
}

/// Whether an error chain bottoms out in a reqwest connection failure.
pub fn is_connection_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|e| e.is_connect())
            .unwrap_or(false)
    })
}
