//! Domain entities - value objects shared by the version, site and patch managers

use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

pub const DEFAULT_DB_SERVER: &str = "localhost";
pub const DEFAULT_IIS_WEBSITE: &str = "Default Web Site";
pub const DEFAULT_IIS_APP_POOL: &str = "DefaultAppPool";

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{2}\.[0-9]{3}\.[0-9]{4}$").expect("version pattern is valid"))
}

/// A platform build number in `MM.mmm.bbbb` form.
///
/// The validated string is the only source of truth; `major`, `minor` and
/// the major release label are all derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    number: String,
    pub is_preview: bool,
    pub debugger_tools: bool,
    pub install_new_version: bool,
    pub install_date: Option<DateTime<Local>>,
    pub size: Option<u64>,
    pub path: Option<PathBuf>,
}

impl Version {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let number = value.as_ref().trim();
        if !version_pattern().is_match(number) {
            return Err(DomainError::InvalidVersion(number.to_string()));
        }
        Ok(Self {
            number: number.to_string(),
            is_preview: false,
            debugger_tools: false,
            install_new_version: false,
            install_date: None,
            size: None,
            path: None,
        })
    }

    pub fn preview(mut self, is_preview: bool) -> Self {
        self.is_preview = is_preview;
        self
    }

    pub fn with_install_new_version(mut self, install: bool) -> Self {
        self.install_new_version = install;
        self
    }

    /// Full build number; installed builds live in a directory of this name.
    pub fn as_str(&self) -> &str {
        &self.number
    }

    pub fn major(&self) -> u32 {
        self.segment(0)
    }

    pub fn minor(&self) -> u32 {
        self.segment(1)
    }

    /// Release label used by the build server folders: `24.100.0023` -> `24.1`.
    ///
    /// The major segment is kept as written. The minor segment is divided by
    /// 100 and rounded half to even, so `24.250` maps to `24.2`.
    pub fn major_release(&self) -> String {
        let major = self.number.split('.').next().unwrap_or_default();
        let minor = self.minor();
        let (whole, rest) = (minor / 100, minor % 100);
        let release = if rest > 50 || (rest == 50 && whole % 2 == 1) {
            whole + 1
        } else {
            whole
        };
        format!("{}.{}", major, release)
    }

    /// True when this build is `major.minor` or newer.
    pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
        self.major() > major || (self.major() == major && self.minor() >= minor)
    }

    fn segment(&self, index: usize) -> u32 {
        // Shape is guaranteed by `parse`, every segment is ASCII digits.
        self.number
            .split('.')
            .nth(index)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.number)
    }
}

impl FromStr for Version {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Target of a single install or remove call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConfiguration {
    pub version: Version,
    pub version_path: PathBuf,
    pub install_debug_tools: bool,
    /// Bypasses the "already installed" short-circuit on install and the
    /// confirmation prompt on removal.
    pub force_install: bool,
}

/// Administrative actions understood by the configuration utility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteAction {
    NewInstance,
    DbMaint,
    DbConnection,
    CompanyConfig,
    NewTrainingInstance,
    DeleteSite,
    RenameSite,
    UpgradeSite,
}

impl SiteAction {
    /// Value of the `-configmode:` selector.
    pub fn config_mode(&self) -> &'static str {
        match self {
            SiteAction::NewInstance => "NewInstance",
            SiteAction::DbMaint => "DBMaint",
            SiteAction::DbConnection => "DBConnection",
            SiteAction::CompanyConfig => "CompanyConfig",
            SiteAction::NewTrainingInstance => "NewTrainingInstance",
            SiteAction::DeleteSite => "DeleteSite",
            SiteAction::RenameSite => "RenameSite",
            SiteAction::UpgradeSite => "UpgradeSite",
        }
    }
}

impl fmt::Display for SiteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_mode())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SiteType {
    #[default]
    NotSet,
    Production,
    Development,
}

impl SiteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteType::NotSet => "NotSet",
            SiteType::Production => "Production",
            SiteType::Development => "Development",
        }
    }
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(SiteType::Production),
            "development" | "dev" => Ok(SiteType::Development),
            "notset" | "" => Ok(SiteType::NotSet),
            _ => Err(DomainError::InvalidSiteType(s.to_string())),
        }
    }
}

/// One site operation, built fresh by the caller for every call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfiguration {
    pub action: SiteAction,
    pub site_name: String,
    pub site_path: Option<PathBuf>,
    pub version: Version,
    pub is_portal: bool,
    pub site_type: SiteType,
    pub is_preview: bool,
    pub force_install: bool,
    /// Skip the "site already exists" confirmation.
    pub overwrite_existing: bool,
    pub db_server: String,
    pub iis_website: String,
    pub iis_app_pool: String,
}

impl SiteConfiguration {
    pub fn new(action: SiteAction, site_name: impl Into<String>, version: Version) -> Self {
        Self {
            action,
            site_name: site_name.into(),
            site_path: None,
            version,
            is_portal: false,
            site_type: SiteType::NotSet,
            is_preview: false,
            force_install: false,
            overwrite_existing: false,
            db_server: DEFAULT_DB_SERVER.to_string(),
            iis_website: DEFAULT_IIS_WEBSITE.to_string(),
            iis_app_pool: DEFAULT_IIS_APP_POOL.to_string(),
        }
    }

    pub fn with_action(&self, action: SiteAction) -> Self {
        Self {
            action,
            ..self.clone()
        }
    }

    pub fn site_path_display(&self) -> String {
        self.site_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchAction {
    Check,
    Patch,
    Rollback,
}

impl PatchAction {
    /// Subcommand passed to the patch utility.
    pub fn subcommand(&self) -> &'static str {
        match self {
            PatchAction::Check => "check",
            PatchAction::Patch => "patch",
            PatchAction::Rollback => "rollback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchConfiguration {
    pub action: PatchAction,
    pub site_name: String,
    pub site_path: PathBuf,
    pub version: Version,
    pub backup_path: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
}

/// Request to run one external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExecutionRequest {
    pub executable: PathBuf,
    pub arguments: Vec<String>,
    /// Stream output lines to the log as they arrive instead of buffering.
    pub real_time_logging: bool,
    /// Turn a non-zero exit into an error instead of a failed result.
    pub throw_on_error: bool,
}

impl ProcessExecutionRequest {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            arguments: Vec::new(),
            real_time_logging: false,
            throw_on_error: false,
        }
    }

    pub fn arg(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn streaming(mut self) -> Self {
        self.real_time_logging = true;
        self
    }

    pub fn throw_on_error(mut self) -> Self {
        self.throw_on_error = true;
        self
    }

    /// Base name without extension, used to tag log lines.
    pub fn executable_name(&self) -> String {
        file_stem(&self.executable)
    }

    pub fn argument_string(&self) -> String {
        self.arguments.join(" ")
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    pub success: bool,
    /// `None` when the process never ran or was terminated by a signal.
    pub exit_code: Option<i32>,
    pub output: String,
    pub error_output: String,
    pub error_message: Option<String>,
}

impl ProcessResult {
    pub fn executable_not_found(executable: &Path) -> Self {
        Self {
            success: false,
            error_message: Some(format!("Executable not found at: {}", executable.display())),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchCheckResult {
    pub has_patch: bool,
    pub version: Option<String>,
    pub patch_number: Option<String>,
    pub message: String,
}

impl PatchCheckResult {
    pub fn none(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchResult {
    pub success: bool,
    pub version: Option<String>,
    pub patch_number: Option<String>,
    pub message: String,
}

impl PatchResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Version '{0}' is invalid. Expected format is ##.###.####")]
    InvalidVersion(String),
    #[error("Site type '{0}' is invalid. Expected Production or Development")]
    InvalidSiteType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_validation() {
        assert!(Version::parse("24.100.0023").is_ok());
        assert!(Version::parse(" 25.105.0001 ").is_ok());

        for bad in [
            "24.100",
            "24.100.23",
            "24.1000.0023",
            "invalid",
            "24.100.0023.1",
            "",
            "٢٤.١٠٠.٠٠٢٣",
            "２４.１００.００２３",
        ] {
            let err = Version::parse(bad).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Version '{}' is invalid. Expected format is ##.###.####", bad)
            );
        }
    }

    #[test]
    fn test_major_release_rounds_minor() {
        assert_eq!(Version::parse("24.100.0023").unwrap().major_release(), "24.1");
        assert_eq!(Version::parse("23.200.0045").unwrap().major_release(), "23.2");
        assert_eq!(Version::parse("25.105.0001").unwrap().major_release(), "25.1");
        assert_eq!(Version::parse("24.149.0001").unwrap().major_release(), "24.1");
        assert_eq!(Version::parse("24.150.0001").unwrap().major_release(), "24.2");
    }

    #[test]
    fn test_major_release_rounds_half_to_even() {
        assert_eq!(Version::parse("24.250.0001").unwrap().major_release(), "24.2");
        assert_eq!(Version::parse("24.350.0001").unwrap().major_release(), "24.4");
        assert_eq!(Version::parse("24.050.0001").unwrap().major_release(), "24.0");
        assert_eq!(Version::parse("24.251.0001").unwrap().major_release(), "24.3");
    }

    #[test]
    fn test_major_release_keeps_major_text() {
        assert_eq!(Version::parse("05.100.0001").unwrap().major_release(), "05.1");
    }

    #[test]
    fn test_major_release_is_stable() {
        let version = Version::parse("24.200.0123").unwrap();
        assert_eq!(version.major_release(), version.major_release());
        assert_eq!(version.major(), 24);
        assert_eq!(version.minor(), 200);
    }

    #[test]
    fn test_is_at_least() {
        let version = Version::parse("25.100.0248").unwrap();
        assert!(version.is_at_least(25, 100));
        assert!(version.is_at_least(24, 200));
        assert!(!version.is_at_least(25, 200));
        assert!(!Version::parse("24.200.0123").unwrap().is_at_least(25, 100));
    }

    #[test]
    fn test_site_type_parsing() {
        assert_eq!("development".parse::<SiteType>().unwrap(), SiteType::Development);
        assert_eq!("Production".parse::<SiteType>().unwrap(), SiteType::Production);
        assert!("staging".parse::<SiteType>().is_err());
    }

    #[test]
    fn test_executable_name_strips_extension() {
        let request = ProcessExecutionRequest::new(r"C:/Acumatica/Versions/24.100.0023/Data/ac.exe");
        assert_eq!(request.executable_name(), "ac");
    }
}
