//! In-memory doubles for the manager ports
//! Shared by the scenario tests; each test builds its own `Harness`

#![allow(dead_code)]

use acuhelper::config::Settings;
use acuhelper::domain::entities::{ProcessExecutionRequest, ProcessResult};
use acuhelper::domain::repositories::{
    ConfigError, ConfigStore, DownloadError, InstallerDownloader, OperatorConsole, PrivilegeCheck,
    ProcessError, ProcessRunner, RegistryError, SiteConfigEditor, SiteRegistry, WebConfigError,
};
use acuhelper::use_cases::VersionManager;
use acuhelper::{AcumaticaManager, ManagerDeps};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub struct MemoryConfig {
    settings: Mutex<Settings>,
}

impl MemoryConfig {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl ConfigStore for MemoryConfig {
    fn settings(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    fn save(&self, settings: Settings) -> Result<(), ConfigError> {
        *self.settings.lock().unwrap() = settings;
        Ok(())
    }
}

type Handler = Box<dyn Fn(&ProcessExecutionRequest) -> ProcessResult + Send + Sync>;

/// Records every request and answers with the handler's result
pub struct ScriptedRunner {
    pub calls: Mutex<Vec<ProcessExecutionRequest>>,
    handler: Handler,
}

impl ScriptedRunner {
    pub fn new(handler: impl Fn(&ProcessExecutionRequest) -> ProcessResult + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(|_| ok(""))
    }

    pub fn calls(&self) -> Vec<ProcessExecutionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn ok(output: &str) -> ProcessResult {
    ProcessResult {
        success: true,
        exit_code: Some(0),
        output: output.to_string(),
        ..ProcessResult::default()
    }
}

pub fn failed(code: i32, stderr: &str) -> ProcessResult {
    ProcessResult {
        success: false,
        exit_code: Some(code),
        error_output: stderr.to_string(),
        ..ProcessResult::default()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn execute(&self, request: &ProcessExecutionRequest) -> Result<ProcessResult, ProcessError> {
        self.calls.lock().unwrap().push(request.clone());
        let result = (self.handler)(request);
        // Same rule as the buffered tokio runner: only a failure that wrote
        // to stderr is raised.
        if request.throw_on_error && !result.success && !result.error_output.is_empty() {
            return Err(ProcessError::NonZeroExit {
                executable: request.executable_name(),
                code: result.exit_code.unwrap_or(-1),
                stderr: result.error_output,
            });
        }
        Ok(result)
    }
}

#[derive(Default)]
pub struct FakeDownloader {
    pub urls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InstallerDownloader for FakeDownloader {
    async fn download(
        &self,
        url: &str,
        destination: &Path,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<u64, DownloadError> {
        self.urls.lock().unwrap().push(url.to_string());
        progress(0);
        std::fs::write(destination, b"msi").map_err(|e| DownloadError::Io {
            path: destination.to_path_buf(),
            message: e.to_string(),
        })?;
        progress(100);
        Ok(3)
    }
}

/// Answers every prompt with a fixed reply and remembers the questions
pub struct ScriptedConsole {
    answer: bool,
    pub questions: Mutex<Vec<String>>,
}

impl ScriptedConsole {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

impl OperatorConsole for ScriptedConsole {
    fn header(&self, _title: &str, _subtitle: Option<&str>) {}
    fn section(&self, _title: &str) {}
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn table(&self, _title: Option<&str>, _rows: &[(&str, String)]) {}
    fn summary(&self, _operation: &str, _status: &str, _details: &[(&str, String)]) {}
    fn progress(&self, _label: &str, _percent: u8) {}

    fn confirm(&self, question: &str) -> bool {
        self.questions.lock().unwrap().push(question.to_string());
        self.answer
    }
}

/// Site name -> (path, recorded version)
#[derive(Default)]
pub struct MemoryRegistry {
    pub sites: Mutex<HashMap<String, (PathBuf, Option<String>)>>,
}

impl MemoryRegistry {
    pub fn with_site(self, name: &str, path: impl Into<PathBuf>, version: Option<&str>) -> Self {
        self.sites
            .lock()
            .unwrap()
            .insert(name.to_string(), (path.into(), version.map(str::to_string)));
        self
    }
}

#[async_trait]
impl SiteRegistry for MemoryRegistry {
    async fn site_path(&self, site_name: &str) -> Result<Option<PathBuf>, RegistryError> {
        Ok(self.sites.lock().unwrap().get(site_name).map(|(path, _)| path.clone()))
    }

    async fn installed_sites(&self) -> Result<Vec<String>, RegistryError> {
        let mut names: Vec<String> = self.sites.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn site_version(&self, site_name: &str) -> Result<Option<String>, RegistryError> {
        Ok(self
            .sites
            .lock()
            .unwrap()
            .get(site_name)
            .and_then(|(_, version)| version.clone()))
    }
}

/// Records development-configuration requests; optionally fails them
#[derive(Default)]
pub struct RecordingEditor {
    pub dev_configured: Mutex<Vec<PathBuf>>,
    pub fail_dev_config: bool,
}

impl RecordingEditor {
    pub fn dev_configured(&self) -> Vec<PathBuf> {
        self.dev_configured.lock().unwrap().clone()
    }
}

impl SiteConfigEditor for RecordingEditor {
    fn site_version(&self, _web_config: &Path) -> Result<Option<String>, WebConfigError> {
        Ok(None)
    }

    fn apply_development_configuration(&self, web_config: &Path) -> Result<(), WebConfigError> {
        self.dev_configured.lock().unwrap().push(web_config.to_path_buf());
        if self.fail_dev_config {
            return Err(WebConfigError::NotFound(web_config.to_path_buf()));
        }
        Ok(())
    }

    fn connection_string(&self, _web_config: &Path) -> Result<Option<String>, WebConfigError> {
        Ok(None)
    }

    fn update_connection_string(&self, _web_config: &Path, _value: &str) -> Result<(), WebConfigError> {
        Ok(())
    }
}

pub struct FixedPrivileges(pub bool);

impl PrivilegeCheck for FixedPrivileges {
    fn is_elevated(&self) -> bool {
        self.0
    }
}

/// A facade wired to the doubles above over a temporary root directory
pub struct Harness {
    pub root: TempDir,
    pub runner: Arc<ScriptedRunner>,
    pub downloader: Arc<FakeDownloader>,
    pub console: Arc<ScriptedConsole>,
    pub registry: Arc<MemoryRegistry>,
    pub editor: Arc<RecordingEditor>,
    pub manager: AcumaticaManager,
}

pub struct HarnessBuilder {
    runner: ScriptedRunner,
    console_answer: bool,
    registry: MemoryRegistry,
    editor: RecordingEditor,
    elevated: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            runner: ScriptedRunner::succeeding(),
            console_answer: true,
            registry: MemoryRegistry::default(),
            editor: RecordingEditor::default(),
            elevated: true,
        }
    }
}

impl HarnessBuilder {
    pub fn runner(mut self, runner: ScriptedRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn answering(mut self, answer: bool) -> Self {
        self.console_answer = answer;
        self
    }

    pub fn registry(mut self, registry: MemoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn editor(mut self, editor: RecordingEditor) -> Self {
        self.editor = editor;
        self
    }

    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    pub fn build(self) -> Harness {
        let root = TempDir::new().unwrap();
        let settings = Settings {
            acumatica_dir: root.path().to_path_buf(),
            download_base_url: "http://builds.test".to_string(),
            ..Settings::default()
        };

        let config: Arc<MemoryConfig> = Arc::new(MemoryConfig::new(settings));
        let runner = Arc::new(self.runner);
        let downloader = Arc::new(FakeDownloader::default());
        let console = Arc::new(ScriptedConsole::answering(self.console_answer));
        let registry = Arc::new(self.registry);
        let editor = Arc::new(self.editor);

        let deps = ManagerDeps {
            config: config.clone(),
            runner: runner.clone(),
            downloader: downloader.clone(),
            console: console.clone(),
            registry: registry.clone(),
            editor: editor.clone(),
            privileges: Arc::new(FixedPrivileges(self.elevated)),
        };
        let versions = VersionManager::new(
            config,
            runner.clone(),
            downloader.clone(),
            console.clone(),
        )
        .with_msiexec("msiexec.exe")
        .with_temp_dir(root.path());

        Harness {
            manager: AcumaticaManager::with_version_manager(deps, versions),
            root,
            runner,
            downloader,
            console,
            registry,
            editor,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn versions_root(&self) -> PathBuf {
        self.root.path().join("Versions")
    }

    /// Lay out an installed version: `Data/ac.exe` and, when asked, the patch utility.
    pub fn install_fake_version(&self, version: &str, with_patch_tool: bool) -> PathBuf {
        let data = self.versions_root().join(version).join("Data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("ac.exe"), b"").unwrap();
        if with_patch_tool {
            let tool = data.join("PatchUtility");
            std::fs::create_dir_all(&tool).unwrap();
            std::fs::write(tool.join("PatchTool.exe"), b"").unwrap();
        }
        self.versions_root().join(version)
    }
}

/// Runner handler that mimics an administrative MSI install: it lays out
/// `<TARGETDIR>/Acumatica ERP/Data/ac.exe` for every msiexec call.
pub fn msi_unpacking_handler(request: &ProcessExecutionRequest) -> ProcessResult {
    if request.executable_name() == "msiexec" {
        if let Some(target) = request
            .arguments
            .iter()
            .find_map(|arg| arg.strip_prefix("TARGETDIR="))
        {
            let data = Path::new(target).join("Acumatica ERP").join("Data");
            std::fs::create_dir_all(&data).unwrap();
            std::fs::write(data.join("ac.exe"), b"").unwrap();
        }
    }
    ok("")
}
