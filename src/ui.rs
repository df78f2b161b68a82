// UI layer: confirmation prompts and variant selection through `dialoguer`,
// spinners through `indicatif`, and the colored status lines the commands
// print. The workflow only sees the `Prompter` trait so it can run without
// a terminal.

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Blocking questions asked of the user.
pub trait Prompter {
    /// Yes/no question. Defaults to "no".
    fn confirm(&self, prompt: &str) -> Result<bool>;

    /// Pick one of `choices`. `None` means the user backed out.
    fn select(&self, prompt: &str, choices: &[String]) -> Result<Option<usize>>;
}

/// Prompter backed by the real terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        let answer = Confirm::new().with_prompt(prompt).default(false).interact()?;
        Ok(answer)
    }

    fn select(&self, prompt: &str, choices: &[String]) -> Result<Option<usize>> {
        // `Select` shows a keyboard-navigable list; Esc or q backs out.
        let picked = Select::new()
            .with_prompt(prompt)
            .items(choices)
            .default(0)
            .interact_opt()?;
        Ok(picked)
    }
}

/// Spinner shown while a long request is running.
pub fn spinner(msg: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style =
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(msg.into());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

pub fn progress(msg: &str) {
    println!("{}", msg.dark_grey());
}

pub fn notice(msg: &str) {
    println!("{}", msg.yellow());
}

pub fn success(msg: &str) {
    println!("{}", msg.green());
}

pub fn error(msg: &str) {
    println!("{}", msg.red());
}

/// Prints where a started variant can be reached.
pub fn print_endpoint(uri: &str, docs: &str, playground: &str) {
    println!("\n{}", "Congratulations! 🎉".green().bold());
    println!(
        "{}{}{}",
        "Your app has been deployed locally as an API. 🚀".cyan(),
        " You can access it here: ".white(),
        uri.yellow().bold()
    );
    println!(
        "{}{}{}",
        "\nRead the API documentation. 📚".cyan(),
        " It's available at: ".white(),
        docs.yellow().bold()
    );
    println!(
        "{}{}{}\n",
        "\nStart experimenting with your app in the playground. 🎮".cyan(),
        " Go to: ".white(),
        playground.yellow().bold()
    );
}

/// One backend variant, as shown by `variant list`.
pub fn print_variant(variant: &crate::api::AppVariant) {
    println!("{}", variant.variant_name.as_str().bold());
    println!("  {} {}", "id:".cyan(), variant.variant_id);
    println!("  {} {}", "app:".cyan(), variant.app_name);
    if let Some(base) = &variant.base_name {
        println!("  {} {}", "base:".cyan(), base);
    }
    if let Some(config) = &variant.config_name {
        println!("  {} {}", "config:".cyan(), config);
    }
    if let Some(previous) = &variant.previous_variant_name {
        println!("  {} {}", "previous variant:".cyan(), previous);
    }
    if let Some(uri) = &variant.uri {
        println!("  {} {}", "uri:".cyan(), uri);
    }
    if let Some(params) = variant.parameters.as_ref().filter(|p| !p.is_null()) {
        println!("  {} {}", "parameters:".cyan(), params);
    }
}
