// Per-command wrappers. Each one wires the real HTTP client, terminal
// prompter and global config into a `VariantManager`, runs the operation and
// turns any failure into a printed message. Failures never change the exit
// status.

use std::path::Path;

use crate::api::ApiClient;
use crate::cli::{AppFolderArgs, RemoveArgs, ServeArgs, VariantCommands};
use crate::config::{AppConfig, GlobalConfig};
use crate::error::VariantError;
use crate::telemetry::HttpEventSink;
use crate::ui::{self, TerminalPrompter};
use crate::variant::{VariantManager, DEFAULT_CONFIG_NAME};

pub fn run(command: VariantCommands) {
    match command {
        VariantCommands::Serve(args) => serve(args),
        VariantCommands::List(args) => list(args),
        VariantCommands::Remove(args) => remove(args),
    }
}

fn report(context: &str, err: &VariantError) {
    if err.is_cancelled() {
        println!("{}", err);
        return;
    }
    ui::error(context);
    ui::error(&format!("Error message: {}", err));
    for hint in err.hints() {
        ui::error(&format!("- {}", hint));
    }
}

/// Everything a command needs to build a manager for one app folder.
struct Session {
    global: GlobalConfig,
    client: ApiClient,
    host: String,
    events: Option<HttpEventSink>,
}

impl Session {
    fn open(app_folder: &Path) -> Result<Self, VariantError> {
        let config_path = AppConfig::path_in(app_folder);
        if !config_path.exists() {
            return Err(VariantError::ConfigNotFound(app_folder.to_path_buf()));
        }
        let config = AppConfig::load(&config_path)?;
        let global = GlobalConfig::load(&GlobalConfig::default_path()?)?;

        let host = config.host().to_string();
        let api_key = config.api_key().or(global.api_key()).map(str::to_string);
        let client = ApiClient::new(&host, api_key.as_deref()).map_err(VariantError::Client)?;
        log::debug!("Using backend {}", client.base_url());

        let events = if global.telemetry_tracking_enabled {
            HttpEventSink::from_env()
        } else {
            None
        };
        Ok(Session {
            global,
            client,
            host,
            events,
        })
    }

    fn manager<'a>(&'a self, app_folder: &Path, prompter: &'a TerminalPrompter) -> VariantManager<'a> {
        let manager = VariantManager::new(app_folder, self.host.clone(), &self.client, prompter, &self.global);
        match &self.events {
            Some(events) => manager.with_events(events),
            None => manager,
        }
    }
}

fn serve(args: ServeArgs) {
    let Some(file_name) = args.target_file().map(str::to_string) else {
        ui::error(
            "To serve variant, kindly provide the filename and run:\n\
             >>> appctl variant serve --file_name <filename>.py\n\
             or\n\
             >>> appctl variant serve <filename>.py",
        );
        return;
    };
    let app_folder = args.folder.app_folder.as_path();

    let session = match Session::open(app_folder) {
        Ok(session) => session,
        Err(e) => return report("Failed during configuration check.", &e),
    };
    let prompter = TerminalPrompter;
    let manager = session.manager(app_folder, &prompter);

    if let Err(e) = manager.config_check() {
        return report("Failed during configuration check.", &e);
    }

    let outcome = match manager.add(&file_name, DEFAULT_CONFIG_NAME) {
        Ok(outcome) => outcome,
        Err(e) => return report("Failed to add variant.", &e),
    };

    // An updated variant is restarted by the backend.
    if let Some(variant_id) = outcome.variant_id() {
        if let Err(e) = manager.start(Some(variant_id)) {
            let context = match e {
                VariantError::Connection(_) => "Failed to connect to the backend. Here's how you can solve the issue:",
                _ => "Failed to start container with app.",
            };
            report(context, &e);
        }
    }
}

fn list(args: AppFolderArgs) {
    let app_folder = args.app_folder.as_path();
    let result = Session::open(app_folder).and_then(|session| {
        let prompter = TerminalPrompter;
        let manager = session.manager(app_folder, &prompter);
        manager.config_check()?;
        manager.list().map(|_| ())
    });
    if let Err(e) = result {
        report("Error while listing variants.", &e);
    }
}

fn remove(args: RemoveArgs) {
    let app_folder = args.folder.app_folder.as_path();
    let result = Session::open(app_folder).and_then(|session| {
        let prompter = TerminalPrompter;
        let manager = session.manager(app_folder, &prompter);
        manager.config_check()?;
        manager.remove(args.variant_name.as_deref()).map(|_| ())
    });
    if let Err(e) = result {
        report("Error while removing variant.", &e);
    }
}
