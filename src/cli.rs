// Command-line surface: `appctl variant serve|list|remove`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Package app folders and manage their variants on the backend"
)]
pub struct Cli {
    /// Show debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Commands for variants
    Variant {
        #[command(subcommand)]
        command: VariantCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum VariantCommands {
    /// Adds a variant to the web UI and serves the API locally
    Serve(ServeArgs),
    /// List the variants in the backend
    List(AppFolderArgs),
    /// Remove an existing variant
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct AppFolderArgs {
    /// Folder holding the app code and its config.toml
    #[arg(long = "app_folder", value_name = "DIR", default_value = ".")]
    pub app_folder: PathBuf,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub folder: AppFolderArgs,

    /// The name of the file to run
    #[arg(long = "file_name", value_name = "FILE")]
    pub file_name: Option<String>,

    /// The file to run, when --file_name is not given
    #[arg(value_name = "FILE")]
    pub file: Option<String>,
}

impl ServeArgs {
    /// `--file_name` wins over the positional file.
    pub fn target_file(&self) -> Option<&str> {
        self.file_name.as_deref().or(self.file.as_deref())
    }
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub folder: AppFolderArgs,

    /// Variant to remove; prompts when omitted
    #[arg(long = "variant_name", value_name = "NAME")]
    pub variant_name: Option<String>,
}
