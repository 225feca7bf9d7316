//! Ports - contracts for every collaborator the managers depend on
//! Implementations live in the adapters and infrastructure layers

use crate::config::Settings;
use crate::domain::entities::{ProcessExecutionRequest, ProcessResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Runs external programs
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the request to completion.
    ///
    /// A missing executable yields a failed result rather than an error.
    /// An error is returned only when the process cannot be spawned or when
    /// `throw_on_error` is set and the process exits non-zero.
    async fn execute(&self, request: &ProcessExecutionRequest) -> Result<ProcessResult, ProcessError>;
}

/// Persistent module configuration (directory layout and defaults)
pub trait ConfigStore: Send + Sync {
    /// Current settings; defaults when nothing could be read.
    fn settings(&self) -> Settings;

    /// Persist the settings before returning.
    fn save(&self, settings: Settings) -> Result<(), ConfigError>;

    fn get(&self, key: &str) -> Result<String, ConfigError> {
        self.settings().get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut settings = self.settings();
        settings.set(key, value)?;
        self.save(settings)
    }
}

/// Operator-facing presentation and prompts
pub trait OperatorConsole: Send + Sync {
    fn header(&self, title: &str, subtitle: Option<&str>);
    fn section(&self, title: &str);
    fn step(&self, message: &str);
    fn success(&self, message: &str);
    fn table(&self, title: Option<&str>, rows: &[(&str, String)]);
    fn summary(&self, operation: &str, status: &str, details: &[(&str, String)]);
    fn progress(&self, label: &str, percent: u8);
    /// Ask a yes/no question. Any failure to ask counts as "no".
    fn confirm(&self, question: &str) -> bool;
}

/// Host-local inventory of installed sites
#[async_trait]
pub trait SiteRegistry: Send + Sync {
    async fn site_path(&self, site_name: &str) -> Result<Option<PathBuf>, RegistryError>;

    async fn installed_sites(&self) -> Result<Vec<String>, RegistryError>;

    async fn site_exists(&self, site_name: &str) -> Result<bool, RegistryError> {
        Ok(self.site_path(site_name).await?.is_some())
    }

    /// Version string recorded in the site's configuration file.
    async fn site_version(&self, site_name: &str) -> Result<Option<String>, RegistryError>;
}

/// Reads and edits a site's XML configuration file
pub trait SiteConfigEditor: Send + Sync {
    fn site_version(&self, web_config: &Path) -> Result<Option<String>, WebConfigError>;

    fn apply_development_configuration(&self, web_config: &Path) -> Result<(), WebConfigError>;

    fn connection_string(&self, web_config: &Path) -> Result<Option<String>, WebConfigError>;

    fn update_connection_string(&self, web_config: &Path, value: &str) -> Result<(), WebConfigError>;
}

/// Fetches installer packages
#[async_trait]
pub trait InstallerDownloader: Send + Sync {
    /// Stream `url` into `destination`, calling `progress` with 0 once the
    /// body starts and then with each newly completed 10 % step. Returns the
    /// number of bytes written.
    async fn download(
        &self,
        url: &str,
        destination: &Path,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<u64, DownloadError>;
}

/// Whether the current process may change machine-wide state
pub trait PrivilegeCheck: Send + Sync {
    fn is_elevated(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to start {executable}: {source}")]
    SpawnFailed {
        executable: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error while running {executable}: {message}")]
    Io { executable: String, message: String },
    #[error("{executable} failed with exit code {code}: {stderr}")]
    NonZeroExit {
        executable: String,
        code: i32,
        stderr: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("Failed to write configuration to {path}: {message}")]
    Write { path: PathBuf, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    WebConfig(#[from] WebConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum WebConfigError {
    #[error("web.config not found at: {0}")]
    NotFound(PathBuf),
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
    #[error("{0} connection string not found")]
    MissingConnectionString(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("Server returned {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Failed to write {path}: {message}")]
    Io { path: PathBuf, message: String },
}
