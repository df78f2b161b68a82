// The variant workflow: build and register app variants, start and remove
// them, list what the backend knows, and keep the app's `config.toml` in
// step with the backend.

use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::api::{AppVariant, Backend};
use crate::archive;
use crate::config::{AppConfig, GlobalConfig, VariantEntry};
use crate::error::{is_connection_error, Result, VariantError};
use crate::telemetry::{self, EventSink};
use crate::ui::{self, Prompter};

/// Config name every variant is registered under for now.
pub const DEFAULT_CONFIG_NAME: &str = "default";

fn base_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[a-zA-Z0-9_]+$").expect("valid base name regex"))
}

/// Base name for a source file: the file name without a trailing `.py`.
pub fn base_name(file_name: &str) -> &str {
    file_name.strip_suffix(".py").unwrap_or(file_name)
}

/// `<base>.<config>`, rejecting base names outside `[A-Za-z0-9_]`.
pub fn derive_variant_name(file_name: &str, config_name: &str) -> Result<String> {
    let base = base_name(file_name);
    if !base_name_pattern().is_match(base) {
        return Err(VariantError::InvalidBaseName(base.to_string()));
    }
    Ok(format!("{}.{}", base, config_name))
}

/// Result of a successful `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new variant was registered; it can be started with this id.
    Added { variant_name: String, variant_id: String },
    /// An existing variant got a new image. The backend restarts it, so the
    /// caller must not start it again.
    Updated { variant_name: String },
}

impl AddOutcome {
    pub fn variant_id(&self) -> Option<&str> {
        match self {
            AddOutcome::Added { variant_id, .. } => Some(variant_id),
            AddOutcome::Updated { .. } => None,
        }
    }
}

/// URLs printed after a variant is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub uri: String,
    pub docs: String,
    pub playground: String,
}

impl Endpoint {
    fn new(service_uri: &str, host: &str, app_id: &str) -> Self {
        let base = service_uri.trim_end_matches('/');
        let webui_host = if host == "localhost" { "http://localhost" } else { host };
        Endpoint {
            uri: format!("{}/", base),
            docs: format!("{}/docs", base),
            playground: format!(
                "{}/apps/{}/playground",
                webui_host.trim_end_matches('/'),
                app_id
            ),
        }
    }
}

/// Runs variant operations for one app folder against one backend.
pub struct VariantManager<'a> {
    app_folder: PathBuf,
    host: String,
    backend: &'a dyn Backend,
    prompter: &'a dyn Prompter,
    global: &'a GlobalConfig,
    events: Option<&'a dyn EventSink>,
}

impl<'a> VariantManager<'a> {
    pub fn new(
        app_folder: impl Into<PathBuf>,
        host: impl Into<String>,
        backend: &'a dyn Backend,
        prompter: &'a dyn Prompter,
        global: &'a GlobalConfig,
    ) -> Self {
        VariantManager {
            app_folder: app_folder.into(),
            host: host.into(),
            backend,
            prompter,
            global,
            events: None,
        }
    }

    /// Attach a sink for usage events.
    pub fn with_events(mut self, events: &'a dyn EventSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config_path(&self) -> PathBuf {
        AppConfig::path_in(&self.app_folder)
    }

    fn load_config(&self) -> Result<AppConfig> {
        let path = self.config_path();
        if !path.exists() {
            return Err(VariantError::ConfigNotFound(self.app_folder.clone()));
        }
        Ok(AppConfig::load(&path)?)
    }

    fn confirm(&self, prompt: &str) -> Result<()> {
        match self.prompter.confirm(prompt) {
            Ok(true) => Ok(()),
            Ok(false) => Err(VariantError::Cancelled),
            Err(e) => Err(VariantError::Prompt(e)),
        }
    }

    fn choose_variant(&self, config: &AppConfig) -> Result<VariantEntry> {
        let names = config.variant_names();
        match self.prompter.select("Please choose a variant", &names) {
            Ok(Some(idx)) => config
                .variants()
                .get(idx)
                .cloned()
                .ok_or(VariantError::Cancelled),
            Ok(None) => Err(VariantError::Cancelled),
            Err(e) => Err(VariantError::Prompt(e)),
        }
    }

    fn check_sources(&self, file_name: &str) -> Result<()> {
        if !self.app_folder.join(file_name).exists() {
            return Err(VariantError::MissingSourceFile(file_name.to_string()));
        }
        if !self.app_folder.join(".env").exists() {
            self.confirm(
                "No .env file found! Are you sure you handled the API keys needed in your application?\n Do you want to continue without it?",
            )?;
        }
        if !self.app_folder.join("requirements.txt").exists() {
            self.confirm(
                "No requirements.txt file found! Are you sure you do not need it in your application?\n Do you want to continue without it?",
            )?;
        }
        Ok(())
    }

    /// Packs the app folder, builds an image from it and either registers a
    /// new variant or updates the image of the existing one. The config file
    /// is only written after the backend accepted the change.
    pub fn add(&self, file_name: &str, config_name: &str) -> Result<AddOutcome> {
        let mut config = self.load_config()?;

        self.check_sources(file_name)?;
        let variant_name = derive_variant_name(file_name, config_name)?;
        let base = base_name(file_name);

        let existing_id = config.variant_id(&variant_name).map(str::to_string);
        if existing_id.is_some() {
            self.confirm("This variant already exists. Do you want to overwrite it?")?;
        }

        ui::progress(&format!("Preparing code base {} into a tar file...", base));
        let packed = archive::build_archive(&self.app_folder, file_name).map_err(VariantError::Build)?;

        ui::progress(&format!(
            "Building code base {} for {} into a docker image...",
            base, variant_name
        ));
        let spinner = ui::spinner("Building image...");
        let built = self.backend.build_image(&config.app_id, base, packed.path());
        spinner.finish_and_clear();
        if let Err(e) = packed.discard() {
            log::warn!("Failed to remove build archive: {}", e);
        }
        let image = built.map_err(VariantError::Build)?;
        log::debug!("Built image {} ({})", image.docker_id, image.tags);

        let outcome = match existing_id {
            Some(variant_id) => {
                ui::progress(&format!("Updating {} to server...", base));
                self.backend
                    .update_variant_image(&variant_id, &image)
                    .map_err(VariantError::Update)?;
                AddOutcome::Updated {
                    variant_name: variant_name.clone(),
                }
            }
            None => {
                ui::notice(&format!("Adding {} to server...", variant_name));
                let response = self
                    .backend
                    .add_variant(&config.app_id, base, config_name, &image)
                    .map_err(VariantError::Register)?;
                config.upsert_variant(variant_name.clone(), response.variant_id.clone());
                AddOutcome::Added {
                    variant_name: variant_name.clone(),
                    variant_id: response.variant_id,
                }
            }
        };

        self.track_deployment(&config);

        match &outcome {
            AddOutcome::Updated { .. } => ui::success(&format!(
                "Variant {} for App {} updated successfully 🎉",
                variant_name, config.app_name
            )),
            AddOutcome::Added { .. } => ui::success(&format!(
                "Variant {} for App {} added successfully!",
                variant_name, config.app_name
            )),
        }

        config.save(&self.config_path())?;
        Ok(outcome)
    }

    fn track_deployment(&self, config: &AppConfig) {
        if !self.global.telemetry_tracking_enabled {
            return;
        }
        let Some(events) = self.events else {
            return;
        };
        let tracked = self.backend.user_profile().and_then(|profile| {
            let cloud = config.api_key().or(self.global.api_key()).is_some();
            let props = telemetry::deployment_properties(&config.app_id, &profile.id, cloud);
            events.capture(&profile.id, telemetry::DEPLOYMENT_EVENT, props)
        });
        if let Err(e) = tracked {
            log::warn!("Failed to record deployment event: {:#}", e);
        }
    }

    /// Starts a variant's container, asking which one when no id is given.
    pub fn start(&self, variant_id: Option<&str>) -> Result<Endpoint> {
        let config = self.load_config()?;
        if !config.has_variants() {
            return Err(VariantError::NoVariants(config.app_name.clone()));
        }

        let variant_id = match variant_id {
            Some(id) if config.contains_variant_id(id) => id.to_string(),
            Some(id) => return Err(VariantError::UnknownVariant(id.to_string())),
            None => self.choose_variant(&config)?.id,
        };

        let service_uri = self.backend.start_variant(&variant_id).map_err(|e| {
            if is_connection_error(&e) {
                VariantError::Connection(e)
            } else {
                VariantError::Start(e)
            }
        })?;

        let endpoint = Endpoint::new(&service_uri, &self.host, &config.app_id);
        ui::print_endpoint(&endpoint.uri, &endpoint.docs, &endpoint.playground);
        Ok(endpoint)
    }

    /// Removes a variant on the backend. The local config keeps its entry
    /// until the next sync with the backend.
    pub fn remove(&self, variant_name: Option<&str>) -> Result<VariantEntry> {
        let config = self.load_config()?;
        if !config.has_variants() {
            return Err(VariantError::NoVariants(config.app_name.clone()));
        }

        let entry = match variant_name {
            Some(name) => match config.variant_id(name) {
                Some(id) => VariantEntry {
                    name: name.to_string(),
                    id: id.to_string(),
                },
                None => return Err(VariantError::UnknownVariant(name.to_string())),
            },
            None => self.choose_variant(&config)?,
        };

        self.backend
            .remove_variant(&entry.id)
            .map_err(|err| VariantError::Remove {
                name: entry.name.clone(),
                app_name: config.app_name.clone(),
                err,
            })?;

        ui::success(&format!(
            "Variant {} for App {} removed successfully!",
            entry.name, config.app_name
        ));
        Ok(entry)
    }

    /// Prints the variants the backend has for this app.
    pub fn list(&self) -> Result<Vec<AppVariant>> {
        let config = self.load_config()?;
        let variants = self
            .backend
            .list_app_variants(&config.app_id)
            .map_err(VariantError::List)?;

        if variants.is_empty() {
            ui::error(&format!("No variants found for app {}", config.app_name));
        }
        for variant in &variants {
            ui::print_variant(variant);
        }
        Ok(variants)
    }

    /// Rewrites the local variant list from the backend's, in backend order.
    pub fn config_check(&self) -> Result<()> {
        ui::progress("\nChecking and updating config file...");
        let mut config = self.load_config()?;
        let variants = self
            .backend
            .list_app_variants(&config.app_id)
            .map_err(VariantError::Sync)?;

        config.replace_variants(variants.into_iter().map(|v| VariantEntry {
            name: v.variant_name,
            id: v.variant_id,
        }));
        config.save(&self.config_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AddVariantResponse, Image, UserProfile};
    use anyhow::{anyhow, Context};
    use serde_json::{Map, Value};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct FakeBackend {
        calls: RefCell<Vec<String>>,
        remote: Vec<AppVariant>,
        fail_build: bool,
        fail_profile: bool,
        fail_start: bool,
        refuse_start: bool,
        next_id: RefCell<u32>,
    }

    impl FakeBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl Backend for FakeBackend {
        fn build_image(&self, app_id: &str, base_name: &str, archive: &Path) -> anyhow::Result<Image> {
            assert!(archive.exists(), "archive must exist during upload");
            self.record(format!("build {} {}", app_id, base_name));
            if self.fail_build {
                return Err(anyhow!("build exploded"));
            }
            Ok(Image {
                docker_id: "sha256:1".into(),
                tags: format!("registry/{}:latest", base_name),
            })
        }

        fn add_variant(
            &self,
            _app_id: &str,
            base_name: &str,
            config_name: &str,
            _image: &Image,
        ) -> anyhow::Result<AddVariantResponse> {
            self.record(format!("add {}.{}", base_name, config_name));
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            Ok(AddVariantResponse {
                variant_id: format!("new{}", next),
            })
        }

        fn update_variant_image(&self, variant_id: &str, _image: &Image) -> anyhow::Result<()> {
            self.record(format!("update {}", variant_id));
            Ok(())
        }

        fn start_variant(&self, variant_id: &str) -> anyhow::Result<String> {
            self.record(format!("start {}", variant_id));
            if self.refuse_start {
                // Nothing listens on the discard port, so this is a real refused connection.
                let res = reqwest::blocking::get("http://127.0.0.1:9/")
                    .context("Failed to send Start variant request")?;
                anyhow::bail!("unexpected response from closed port: {}", res.status());
            }
            if self.fail_start {
                return Err(anyhow!("Start variant failed: 500 Internal Server Error - boom"));
            }
            Ok(format!("http://localhost/app1/{}", variant_id))
        }

        fn remove_variant(&self, variant_id: &str) -> anyhow::Result<()> {
            self.record(format!("remove {}", variant_id));
            Ok(())
        }

        fn list_app_variants(&self, app_id: &str) -> anyhow::Result<Vec<AppVariant>> {
            self.record(format!("list {}", app_id));
            Ok(self.remote.clone())
        }

        fn user_profile(&self) -> anyhow::Result<UserProfile> {
            self.record("profile".into());
            if self.fail_profile {
                return Err(anyhow!("profile unavailable"));
            }
            Ok(UserProfile {
                id: "user1".into(),
            })
        }
    }

    /// Answers prompts from a script; panics if asked more than scripted.
    #[derive(Default)]
    struct ScriptedPrompter {
        confirms: RefCell<VecDeque<bool>>,
        selections: RefCell<VecDeque<Option<usize>>>,
        asked: RefCell<Vec<String>>,
    }

    impl ScriptedPrompter {
        fn confirming(answers: &[bool]) -> Self {
            ScriptedPrompter {
                confirms: RefCell::new(answers.iter().copied().collect()),
                ..Default::default()
            }
        }

        fn selecting(choice: Option<usize>) -> Self {
            ScriptedPrompter {
                selections: RefCell::new(VecDeque::from([choice])),
                ..Default::default()
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&self, prompt: &str) -> anyhow::Result<bool> {
            self.asked.borrow_mut().push(prompt.to_string());
            Ok(self
                .confirms
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected confirm: {}", prompt)))
        }

        fn select(&self, prompt: &str, _choices: &[String]) -> anyhow::Result<Option<usize>> {
            self.asked.borrow_mut().push(prompt.to_string());
            Ok(self
                .selections
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected select: {}", prompt)))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: RefCell<Vec<(String, String, Map<String, Value>)>>,
    }

    impl EventSink for RecordingSink {
        fn capture(&self, user_id: &str, event: &str, properties: Map<String, Value>) -> anyhow::Result<()> {
            self.events
                .borrow_mut()
                .push((user_id.into(), event.into(), properties));
            Ok(())
        }
    }

    fn app_folder(variants: &[(&str, &str)], with_env: bool, with_reqs: bool) -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "print('hello')\n").unwrap();
        if with_env {
            fs::write(dir.path().join(".env"), "KEY=1\n").unwrap();
        }
        if with_reqs {
            fs::write(dir.path().join("requirements.txt"), "fastapi\n").unwrap();
        }
        let mut config = AppConfig::new("demo", "app1");
        for (name, id) in variants {
            config.upsert_variant(*name, *id);
        }
        config.save(&AppConfig::path_in(dir.path())).unwrap();
        dir
    }

    fn reload(dir: &TempDir) -> AppConfig {
        AppConfig::load(&AppConfig::path_in(dir.path())).unwrap()
    }

    fn leftover_archives(dir: &TempDir) -> usize {
        fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(archive::ARCHIVE_PREFIX)
            })
            .count()
    }

    #[test]
    fn variant_name_is_base_plus_config() {
        assert_eq!(derive_variant_name("app.py", "default").unwrap(), "app.default");
        assert_eq!(derive_variant_name("my_app2", "default").unwrap(), "my_app2.default");
        assert!(matches!(
            derive_variant_name("my-app.py", "default"),
            Err(VariantError::InvalidBaseName(_))
        ));
        assert!(derive_variant_name("my app.py", "default").is_err());
        assert!(derive_variant_name(".py", "default").is_err());
    }

    #[test]
    fn add_registers_new_variant_and_persists_it() {
        let dir = app_folder(&[], true, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let outcome = manager.add("app.py", DEFAULT_CONFIG_NAME).unwrap();

        assert_eq!(
            outcome,
            AddOutcome::Added {
                variant_name: "app.default".into(),
                variant_id: "new1".into()
            }
        );
        assert_eq!(outcome.variant_id(), Some("new1"));
        assert_eq!(backend.calls(), vec!["build app1 app", "add app.default"]);
        assert!(prompter.asked.borrow().is_empty());

        let config = reload(&dir);
        assert_eq!(config.variant_names(), vec!["app.default"]);
        assert_eq!(config.variant_id("app.default"), Some("new1"));
        assert_eq!(leftover_archives(&dir), 0);
    }

    #[test]
    fn re_adding_updates_in_place_without_duplicates() {
        let dir = app_folder(&[("chat.default", "c1"), ("app.default", "a1")], true, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::confirming(&[true]);
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let outcome = manager.add("app.py", DEFAULT_CONFIG_NAME).unwrap();

        assert_eq!(outcome.variant_id(), None);
        assert_eq!(backend.calls(), vec!["build app1 app", "update a1"]);
        let config = reload(&dir);
        assert_eq!(config.variant_names(), vec!["chat.default", "app.default"]);
        assert_eq!(config.variant_id("app.default"), Some("a1"));
    }

    #[test]
    fn declining_overwrite_changes_nothing() {
        let dir = app_folder(&[("app.default", "a1")], true, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::confirming(&[false]);
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let err = manager.add("app.py", DEFAULT_CONFIG_NAME).unwrap_err();
        assert!(err.is_cancelled());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn declining_missing_env_stops_before_archive_and_network() {
        let dir = app_folder(&[], false, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::confirming(&[false]);
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let err = manager.add("app.py", DEFAULT_CONFIG_NAME).unwrap_err();
        assert!(matches!(err, VariantError::Cancelled));
        assert!(backend.calls().is_empty());
        assert_eq!(leftover_archives(&dir), 0);
        assert!(prompter.asked.borrow()[0].contains(".env"));
    }

    #[test]
    fn accepting_missing_files_asks_for_each() {
        let dir = app_folder(&[], false, false);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::confirming(&[true, true]);
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        manager.add("app.py", DEFAULT_CONFIG_NAME).unwrap();
        let asked = prompter.asked.borrow();
        assert_eq!(asked.len(), 2);
        assert!(asked[1].contains("requirements.txt"));
    }

    #[test]
    fn missing_source_file_is_reported_first() {
        let dir = app_folder(&[], false, false);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let err = manager.add("missing.py", DEFAULT_CONFIG_NAME).unwrap_err();
        assert!(matches!(err, VariantError::MissingSourceFile(ref f) if f == "missing.py"));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn invalid_base_name_stops_before_network() {
        let dir = app_folder(&[], true, true);
        fs::write(dir.path().join("my-app.py"), "").unwrap();
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let err = manager.add("my-app.py", DEFAULT_CONFIG_NAME).unwrap_err();
        assert!(matches!(err, VariantError::InvalidBaseName(_)));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn failed_build_leaves_config_and_removes_archive() {
        let dir = app_folder(&[], true, true);
        let backend = FakeBackend {
            fail_build: true,
            ..Default::default()
        };
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let err = manager.add("app.py", DEFAULT_CONFIG_NAME).unwrap_err();
        assert!(matches!(err, VariantError::Build(_)));
        assert!(!reload(&dir).has_variants());
        assert_eq!(leftover_archives(&dir), 0);
    }

    #[test]
    fn deployment_event_sent_only_when_opted_in() {
        let dir = app_folder(&[], true, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::default();
        let sink = RecordingSink::default();
        let global = GlobalConfig {
            api_key: None,
            telemetry_tracking_enabled: true,
        };
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global)
            .with_events(&sink);

        manager.add("app.py", DEFAULT_CONFIG_NAME).unwrap();
        let events = sink.events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "user1");
        assert_eq!(events[0].1, telemetry::DEPLOYMENT_EVENT);
        assert_eq!(events[0].2["version"], "oss");

        let dir = app_folder(&[], true, true);
        let backend = FakeBackend::default();
        let sink = RecordingSink::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global)
            .with_events(&sink);
        manager.add("app.py", DEFAULT_CONFIG_NAME).unwrap();
        assert!(sink.events.borrow().is_empty());
        assert!(!backend.calls().contains(&"profile".to_string()));
    }

    #[test]
    fn telemetry_failure_does_not_fail_add() {
        let dir = app_folder(&[], true, true);
        let backend = FakeBackend {
            fail_profile: true,
            ..Default::default()
        };
        let prompter = ScriptedPrompter::default();
        let sink = RecordingSink::default();
        let global = GlobalConfig {
            api_key: None,
            telemetry_tracking_enabled: true,
        };
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global)
            .with_events(&sink);

        let outcome = manager.add("app.py", DEFAULT_CONFIG_NAME).unwrap();
        assert_eq!(outcome.variant_id(), Some("new1"));
        assert!(sink.events.borrow().is_empty());
        assert!(reload(&dir).variant_id("app.default").is_some());
    }

    #[test]
    fn start_with_known_id_prints_endpoint() {
        let dir = app_folder(&[("app.default", "a1")], true, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "localhost", &backend, &prompter, &global);

        let endpoint = manager.start(Some("a1")).unwrap();
        assert_eq!(endpoint.uri, "http://localhost/app1/a1/");
        assert_eq!(endpoint.docs, "http://localhost/app1/a1/docs");
        assert_eq!(endpoint.playground, "http://localhost/apps/app1/playground");
        assert_eq!(backend.calls(), vec!["start a1"]);
    }

    #[test]
    fn start_against_unreachable_backend_is_a_connection_error() {
        let dir = app_folder(&[("app.default", "a1")], true, true);
        let backend = FakeBackend {
            refuse_start: true,
            ..Default::default()
        };
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let err = manager.start(Some("a1")).unwrap_err();
        assert!(matches!(err, VariantError::Connection(_)), "unexpected error: {}", err);
        assert_eq!(err.hints().len(), 2);
    }

    #[test]
    fn start_failure_from_backend_is_not_a_connection_error() {
        let dir = app_folder(&[("app.default", "a1")], true, true);
        let backend = FakeBackend {
            fail_start: true,
            ..Default::default()
        };
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let err = manager.start(Some("a1")).unwrap_err();
        assert!(matches!(err, VariantError::Start(_)));
        assert!(err.hints().is_empty());
    }

    #[test]
    fn start_rejects_unknown_id_and_empty_config() {
        let dir = app_folder(&[("app.default", "a1")], true, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);
        assert!(matches!(
            manager.start(Some("zzz")),
            Err(VariantError::UnknownVariant(_))
        ));

        let empty = app_folder(&[], true, true);
        let manager = VariantManager::new(empty.path(), "http://localhost", &backend, &prompter, &global);
        assert!(matches!(manager.start(None), Err(VariantError::NoVariants(_))));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn start_without_id_uses_selection() {
        let dir = app_folder(&[("app.default", "a1"), ("chat.default", "c1")], true, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::selecting(Some(1));
        let global = GlobalConfig::default();
        let manager =
            VariantManager::new(dir.path(), "https://cloud.example.com", &backend, &prompter, &global);

        let endpoint = manager.start(None).unwrap();
        assert_eq!(backend.calls(), vec!["start c1"]);
        assert_eq!(endpoint.playground, "https://cloud.example.com/apps/app1/playground");
    }

    #[test]
    fn remove_resolves_id_among_several() {
        let dir = app_folder(
            &[("app.default", "a1"), ("chat.default", "c1"), ("bot.default", "b1")],
            true,
            true,
        );
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let removed = manager.remove(Some("chat.default")).unwrap();
        assert_eq!(removed.id, "c1");
        assert_eq!(backend.calls(), vec!["remove c1"]);
        // Local entry is left for the next sync.
        assert_eq!(reload(&dir).variant_id("chat.default"), Some("c1"));
    }

    #[test]
    fn remove_unknown_name_makes_no_backend_call() {
        let dir = app_folder(&[("app.default", "a1")], true, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let err = manager.remove(Some("ghost.default")).unwrap_err();
        assert!(matches!(err, VariantError::UnknownVariant(ref n) if n == "ghost.default"));
        assert!(err.to_string().contains("not found"));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn remove_selection_cancelled() {
        let dir = app_folder(&[("app.default", "a1")], true, true);
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::selecting(None);
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        assert!(manager.remove(None).unwrap_err().is_cancelled());
        assert!(backend.calls().is_empty());
    }

    fn remote(name: &str, id: &str) -> AppVariant {
        AppVariant {
            app_id: "app1".into(),
            app_name: "demo".into(),
            variant_id: id.into(),
            variant_name: name.into(),
            base_name: None,
            config_name: Some("default".into()),
            previous_variant_name: None,
            uri: None,
            parameters: None,
        }
    }

    #[test]
    fn list_returns_backend_variants_not_local_ones() {
        let dir = app_folder(&[("stale.default", "s1")], true, true);
        let backend = FakeBackend {
            remote: vec![remote("app.default", "a1")],
            ..Default::default()
        };
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        let listed = manager.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].variant_name, "app.default");
        assert_eq!(backend.calls(), vec!["list app1"]);
    }

    #[test]
    fn config_check_syncs_from_backend() {
        let dir = app_folder(&[("stale.default", "s1")], true, true);
        let backend = FakeBackend {
            remote: vec![remote("b.default", "b1"), remote("a.default", "a1")],
            ..Default::default()
        };
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        manager.config_check().unwrap();
        let config = reload(&dir);
        assert_eq!(config.variant_names(), vec!["b.default", "a.default"]);
        assert_eq!(config.variant_id("a.default"), Some("a1"));
    }

    #[test]
    fn config_check_without_config_file() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::default();
        let prompter = ScriptedPrompter::default();
        let global = GlobalConfig::default();
        let manager = VariantManager::new(dir.path(), "http://localhost", &backend, &prompter, &global);

        assert!(matches!(
            manager.config_check(),
            Err(VariantError::ConfigNotFound(_))
        ));
        assert!(backend.calls().is_empty());
    }
}
