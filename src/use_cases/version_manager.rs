/// Version lifecycle - installed builds on disk, download and MSI unpack
/// A version directory counts as installed only when it holds the
/// configuration utility; nothing else records install state.

use crate::domain::entities::{ProcessExecutionRequest, Version, VersionConfiguration};
use crate::domain::repositories::{
    ConfigStore, DownloadError, InstallerDownloader, OperatorConsole, ProcessError, ProcessRunner,
};
use crate::domain::utils::{directory_size, format_bytes};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Folder the administrative install nests everything under
const NESTED_INSTALL_DIR: &str = "Acumatica ERP";

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("MSI installation failed: {0}")]
    Installer(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct VersionManager {
    config: Arc<dyn ConfigStore>,
    runner: Arc<dyn ProcessRunner>,
    downloader: Arc<dyn InstallerDownloader>,
    console: Arc<dyn OperatorConsole>,
    msiexec: PathBuf,
    temp_dir: PathBuf,
}

impl VersionManager {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        runner: Arc<dyn ProcessRunner>,
        downloader: Arc<dyn InstallerDownloader>,
        console: Arc<dyn OperatorConsole>,
    ) -> Self {
        Self {
            config,
            runner,
            downloader,
            console,
            msiexec: default_msiexec(),
            temp_dir: std::env::temp_dir(),
        }
    }

    pub fn with_msiexec(mut self, msiexec: impl Into<PathBuf>) -> Self {
        self.msiexec = msiexec.into();
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn version_path(&self, version: &Version) -> PathBuf {
        self.config.settings().versions_root().join(version.as_str())
    }

    pub fn config_utility_path(&self, version: &Version) -> PathBuf {
        config_utility_in(&self.version_path(version))
    }

    pub fn patch_utility_path(&self, version: &Version) -> PathBuf {
        self.version_path(version)
            .join("Data")
            .join("PatchUtility")
            .join("PatchTool.exe")
    }

    pub fn is_installed(&self, version: &Version) -> bool {
        self.config_utility_path(version).is_file()
    }

    pub fn download_url(&self, version: &Version) -> String {
        download_url(&self.config.settings().download_base_url, version)
    }

    /// Installed versions, newest install first.
    pub fn list_installed(&self) -> Vec<Version> {
        let root = self.config.settings().versions_root();
        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(_) => {
                tracing::debug!("Versions directory does not exist: {}", root.display());
                return Vec::new();
            }
        };

        let mut versions: Vec<Version> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let path = entry.path();
                let name = entry.file_name();
                let mut version = Version::parse(name.to_string_lossy()).ok()?;
                if !config_utility_in(&path).is_file() {
                    return None;
                }
                version.install_date = entry
                    .metadata()
                    .ok()
                    .and_then(|meta| meta.created().or_else(|_| meta.modified()).ok())
                    .map(DateTime::<Local>::from);
                version.size = Some(directory_size(&path));
                version.path = Some(path);
                Some(version)
            })
            .collect();

        versions.sort_by(|a, b| b.install_date.cmp(&a.install_date));
        versions
    }

    pub async fn install(&self, config: &VersionConfiguration) -> bool {
        let version = &config.version;
        self.console.header(
            "Acumatica Version Installation",
            Some(&format!("Version {}", version)),
        );

        if !config.force_install && self.is_installed(version) {
            tracing::warn!("Version {} is already installed", version);
            return true;
        }

        match self.download_and_install(config).await {
            Ok(()) => {
                self.console.summary(
                    "Version Installation",
                    "Completed Successfully",
                    &[
                        ("Version", version.to_string()),
                        ("Install Path", config.version_path.display().to_string()),
                        ("Preview", yes_no(version.is_preview)),
                        ("Debug Tools", yes_no(config.install_debug_tools)),
                    ],
                );
                true
            }
            Err(e) => {
                tracing::error!("Failed to install version {}: {}", version, e);
                false
            }
        }
    }

    async fn download_and_install(&self, config: &VersionConfiguration) -> Result<(), VersionError> {
        self.console.section("Downloading Version");
        let url = self.download_url(&config.version);
        tracing::info!("Download URL: {}", url);

        let installer = self
            .temp_dir
            .join(format!("AcumaticaERP_{}.msi", config.version));
        let result = self.fetch_and_unpack(config, &url, &installer).await;

        if installer.exists() {
            match tokio::fs::remove_file(&installer).await {
                Ok(()) => tracing::debug!("Temporary file deleted: {}", installer.display()),
                Err(e) => tracing::warn!("Could not delete {}: {}", installer.display(), e),
            }
        }
        result
    }

    async fn fetch_and_unpack(
        &self,
        config: &VersionConfiguration,
        url: &str,
        installer: &Path,
    ) -> Result<(), VersionError> {
        self.console.step("Downloading installer...");
        let label = format!("Downloading version {}", config.version);
        let bytes = self
            .downloader
            .download(url, installer, &|percent: u8| {
                self.console.progress(&label, percent)
            })
            .await?;
        self.console.success(&format!(
            "Downloaded {} to: {}",
            format_bytes(bytes),
            installer.display()
        ));

        self.console.section("Installing Version");
        self.run_installer(installer, config).await?;

        flatten_install(&config.version_path)?;
        self.console.success("MSI installation completed successfully");
        Ok(())
    }

    async fn run_installer(
        &self,
        installer: &Path,
        config: &VersionConfiguration,
    ) -> Result<(), VersionError> {
        tokio::fs::create_dir_all(&config.version_path).await?;

        let mut request = ProcessExecutionRequest::new(&self.msiexec)
            .arg("/a")
            .arg(installer.display().to_string());
        if config.install_debug_tools {
            request = request.arg("ADDLOCAL=DEBUGGERTOOLS");
        }
        let request = request
            .arg("/qb")
            .arg(format!("TARGETDIR={}", config.version_path.display()))
            .streaming();

        self.console.step("Running MSI installer...");
        tracing::debug!("MSI install arguments: {}", request.argument_string());

        let result = self.runner.execute(&request).await?;
        if !result.success {
            let reason = result.error_message.unwrap_or_else(|| match result.exit_code {
                Some(code) => format!("exit code {}", code),
                None => "installer was terminated".to_string(),
            });
            return Err(VersionError::Installer(reason));
        }
        Ok(())
    }

    pub async fn remove(&self, config: &VersionConfiguration) -> bool {
        let version = &config.version;
        self.console.header(
            "Acumatica Version Removal",
            Some(&format!("Version {}", version)),
        );

        if !self.is_installed(version) {
            tracing::warn!("Version {} is not installed", version);
            return true;
        }

        let size = directory_size(&config.version_path);
        tracing::info!("Removing version from: {}", config.version_path.display());
        tracing::info!("Freeing up: {}", format_bytes(size));

        if !config.force_install
            && !self
                .console
                .confirm(&format!("Are you sure you want to remove version {}?", version))
        {
            tracing::info!("Removal cancelled");
            return false;
        }

        match tokio::fs::remove_dir_all(&config.version_path).await {
            Ok(()) => {
                self.console.summary(
                    "Version Removal",
                    "Completed Successfully",
                    &[
                        ("Version", version.to_string()),
                        ("Freed Space", format_bytes(size)),
                    ],
                );
                true
            }
            Err(e) => {
                tracing::error!("Failed to remove version {}: {}", version, e);
                false
            }
        }
    }
}

fn config_utility_in(version_path: &Path) -> PathBuf {
    version_path.join("Data").join("ac.exe")
}

pub(crate) fn yes_no(value: bool) -> String {
    let text = if value { "Yes" } else { "No" };
    text.to_string()
}

fn default_msiexec() -> PathBuf {
    std::env::var_os("SystemRoot")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\Windows"))
        .join("System32")
        .join("msiexec.exe")
}

/// `<base>/builds/[preview/]<major release>/<version>/AcumaticaERP/AcumaticaERPInstall.msi`
pub fn download_url(base_url: &str, version: &Version) -> String {
    format!(
        "{}/builds/{}{}/{}/AcumaticaERP/AcumaticaERPInstall.msi",
        base_url.trim_end_matches('/'),
        if version.is_preview { "preview/" } else { "" },
        version.major_release(),
        version
    )
}

/// Drop leftover `.msi` files and lift the nested install folder into
/// `version_path`. Existing files are overwritten.
pub fn flatten_install(version_path: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(version_path)? {
        let path = entry?.path();
        let is_msi = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("msi"));
        if is_msi && path.is_file() {
            std::fs::remove_file(&path)?;
        }
    }

    let nested = version_path.join(NESTED_INSTALL_DIR);
    if !nested.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(&nested) {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&nested) else {
            continue;
        };
        let destination = version_path.join(relative);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if destination.exists() {
            std::fs::remove_file(&destination)?;
        }
        std::fs::rename(entry.path(), &destination)?;
    }

    std::fs::remove_dir_all(&nested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DOWNLOAD_BASE_URL;
    use tempfile::TempDir;

    #[test]
    fn test_download_url() {
        let version = Version::parse("24.100.0023").unwrap();
        assert_eq!(
            download_url(DEFAULT_DOWNLOAD_BASE_URL, &version),
            "https://acumatica-builds.s3.amazonaws.com/builds/24.1/24.100.0023/AcumaticaERP/AcumaticaERPInstall.msi"
        );

        let preview = Version::parse("25.200.0001").unwrap().preview(true);
        assert_eq!(
            download_url("http://mirror.local/", &preview),
            "http://mirror.local/builds/preview/25.2/25.200.0001/AcumaticaERP/AcumaticaERPInstall.msi"
        );
    }

    #[test]
    fn test_flatten_install() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("AcumaticaERPInstall.msi"), b"msi").unwrap();
        std::fs::write(root.join("Other.MSI"), b"msi").unwrap();
        let nested = root.join(NESTED_INSTALL_DIR).join("Data");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("ac.exe"), b"exe").unwrap();
        std::fs::create_dir_all(nested.join("PatchUtility")).unwrap();
        std::fs::write(nested.join("PatchUtility").join("PatchTool.exe"), b"exe").unwrap();

        flatten_install(root).unwrap();

        assert!(!root.join("AcumaticaERPInstall.msi").exists());
        assert!(!root.join("Other.MSI").exists());
        assert!(!root.join(NESTED_INSTALL_DIR).exists());
        assert!(root.join("Data").join("ac.exe").is_file());
        assert!(root.join("Data").join("PatchUtility").join("PatchTool.exe").is_file());
    }

    #[test]
    fn test_flatten_without_nested_folder() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Data")).unwrap();
        std::fs::write(dir.path().join("Data").join("ac.exe"), b"exe").unwrap();

        flatten_install(dir.path()).unwrap();
        assert!(dir.path().join("Data").join("ac.exe").is_file());
    }
}
