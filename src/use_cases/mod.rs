/// Use Cases - Application-specific business rules
/// Uses domain entities and repository interfaces

pub mod arg_builders;
pub mod patch_manager;
pub mod site_manager;
pub mod version_manager;

pub use arg_builders::{ArgBuilder, ArgBuilderFactory, UnsupportedAction};
pub use patch_manager::{PatchError, PatchManager, PATCH_SUPPORT_GATE};
pub use site_manager::{SiteError, SiteManager};
pub use version_manager::{VersionError, VersionManager};

use crate::config::Settings;
use crate::domain::entities::{
    DomainError, PatchAction, PatchCheckResult, PatchConfiguration, PatchResult,
    SiteAction, SiteConfiguration, SiteType, Version, VersionConfiguration,
};
use crate::domain::repositories::{
    ConfigError, ConfigStore, InstallerDownloader, OperatorConsole, PrivilegeCheck,
    ProcessRunner, RegistryError, SiteConfigEditor, SiteRegistry, WebConfigError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Collaborators the facade wires into the three managers
#[derive(Clone)]
pub struct ManagerDeps {
    pub config: Arc<dyn ConfigStore>,
    pub runner: Arc<dyn ProcessRunner>,
    pub downloader: Arc<dyn InstallerDownloader>,
    pub console: Arc<dyn OperatorConsole>,
    pub registry: Arc<dyn SiteRegistry>,
    pub editor: Arc<dyn SiteConfigEditor>,
    pub privileges: Arc<dyn PrivilegeCheck>,
}

/// Errors raised by lookups the facade performs before any manager runs
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Could not find site path for: {0}")]
    SiteNotFound(String),
    #[error("Could not determine version for site: {0}")]
    SiteVersionUnknown(String),
    #[error(transparent)]
    InvalidVersion(#[from] DomainError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    WebConfig(#[from] WebConfigError),
}

/// Orchestration root: turns site names into value objects and dispatches
/// to the version, site and patch managers
pub struct AcumaticaManager {
    config: Arc<dyn ConfigStore>,
    registry: Arc<dyn SiteRegistry>,
    editor: Arc<dyn SiteConfigEditor>,
    versions: Arc<VersionManager>,
    sites: SiteManager,
    patches: PatchManager,
}

impl AcumaticaManager {
    pub fn new(deps: ManagerDeps) -> Self {
        let versions = VersionManager::new(
            deps.config.clone(),
            deps.runner.clone(),
            deps.downloader.clone(),
            deps.console.clone(),
        );
        Self::with_version_manager(deps, versions)
    }

    /// Wire the facade around a pre-configured version manager (custom
    /// installer location or temp directory).
    pub fn with_version_manager(deps: ManagerDeps, versions: VersionManager) -> Self {
        let versions = Arc::new(versions);
        let sites = SiteManager::new(
            versions.clone(),
            deps.runner.clone(),
            deps.registry.clone(),
            deps.editor.clone(),
            deps.config.clone(),
            deps.console.clone(),
            deps.privileges.clone(),
        );
        let patches = PatchManager::new(versions.clone(), deps.runner.clone());

        Self {
            config: deps.config,
            registry: deps.registry,
            editor: deps.editor,
            versions,
            sites,
            patches,
        }
    }

    pub fn versions(&self) -> &VersionManager {
        &self.versions
    }

    // ========== Version Management ==========

    pub async fn install_version(&self, version: Version, force: bool) -> bool {
        let settings = self.config.settings();
        let config = VersionConfiguration {
            version_path: self.versions.version_path(&version),
            install_debug_tools: settings.install_debug_tools || version.debugger_tools,
            force_install: force || version.install_new_version,
            version,
        };
        self.versions.install(&config).await
    }

    /// `skip_confirmation` removes without asking the operator.
    pub async fn remove_version(&self, version: Version, skip_confirmation: bool) -> bool {
        let config = VersionConfiguration {
            version_path: self.versions.version_path(&version),
            install_debug_tools: false,
            force_install: skip_confirmation,
            version,
        };
        self.versions.remove(&config).await
    }

    pub fn installed_versions(&self) -> Vec<Version> {
        self.versions.list_installed()
    }

    pub fn is_version_installed(&self, version: &Version) -> bool {
        self.versions.is_installed(version)
    }

    // ========== Site Management ==========

    /// A site configuration pre-filled with this host's database and IIS defaults.
    pub fn new_site_configuration(&self, site_name: &str, version: Version) -> SiteConfiguration {
        let settings = self.config.settings();
        let mut site = SiteConfiguration::new(SiteAction::NewInstance, site_name, version);
        site.db_server = settings.db_server;
        site.iis_website = settings.iis_website;
        site.iis_app_pool = settings.iis_app_pool;
        site
    }

    pub async fn create_site(&self, site: SiteConfiguration) -> bool {
        let site = self.sites.resolve_defaults(site);
        self.sites.create_site(site).await
    }

    /// Remove a site, locating it through the registry. When the registry has
    /// no version for the site, the newest installed version's utility is used.
    pub async fn remove_site(&self, site_name: &str) -> Result<bool, ManagerError> {
        let site_path = self.site_path_or_default(site_name).await?;
        let version = match self.registered_version(site_name).await? {
            Some(version) => version,
            None => self
                .versions
                .list_installed()
                .into_iter()
                .next()
                .ok_or_else(|| ManagerError::SiteVersionUnknown(site_name.to_string()))?,
        };

        let mut site = SiteConfiguration::new(SiteAction::DeleteSite, site_name, version);
        site.site_path = Some(site_path);
        Ok(self.sites.remove_site(site).await)
    }

    pub async fn update_site(&self, site_name: &str, new_version: &str) -> Result<bool, ManagerError> {
        let version = Version::parse(new_version)?;
        let site_path = self.site_path_or_default(site_name).await?;

        let mut site = SiteConfiguration::new(SiteAction::UpgradeSite, site_name, version);
        site.site_path = Some(site_path);
        Ok(self.sites.update_site(site).await)
    }

    pub async fn installed_sites(&self) -> Result<Vec<String>, ManagerError> {
        Ok(self.registry.installed_sites().await?)
    }

    pub async fn site_version(&self, site_name: &str) -> Result<Option<String>, ManagerError> {
        Ok(self.registry.site_version(site_name).await?)
    }

    pub fn requires_administrator_privileges(&self) -> bool {
        self.sites.requires_administrator_privileges()
    }

    pub async fn connection_string(&self, site_name: &str) -> Result<Option<String>, ManagerError> {
        let web_config = self.registered_site_path(site_name).await?.join("web.config");
        Ok(self.editor.connection_string(&web_config)?)
    }

    pub async fn update_connection_string(&self, site_name: &str, value: &str) -> Result<(), ManagerError> {
        let web_config = self.registered_site_path(site_name).await?.join("web.config");
        Ok(self.editor.update_connection_string(&web_config, value)?)
    }

    async fn registered_site_path(&self, site_name: &str) -> Result<PathBuf, ManagerError> {
        self.registry
            .site_path(site_name)
            .await?
            .ok_or_else(|| ManagerError::SiteNotFound(site_name.to_string()))
    }

    async fn site_path_or_default(&self, site_name: &str) -> Result<PathBuf, ManagerError> {
        Ok(match self.registry.site_path(site_name).await? {
            Some(path) => path,
            None => self.config.settings().default_site_path(site_name),
        })
    }

    async fn registered_version(&self, site_name: &str) -> Result<Option<Version>, ManagerError> {
        match self.registry.site_version(site_name).await? {
            Some(version) if !version.trim().is_empty() => Ok(Some(Version::parse(version)?)),
            _ => Ok(None),
        }
    }

    // ========== Patch Management ==========

    async fn patch_configuration(
        &self,
        site_name: &str,
        action: PatchAction,
        site_path: Option<PathBuf>,
    ) -> Result<PatchConfiguration, ManagerError> {
        let site_path = match site_path {
            Some(path) => path,
            None => self.registered_site_path(site_name).await?,
        };
        let version = self
            .registered_version(site_name)
            .await?
            .ok_or_else(|| ManagerError::SiteVersionUnknown(site_name.to_string()))?;

        Ok(PatchConfiguration {
            action,
            site_name: site_name.to_string(),
            site_path,
            version,
            backup_path: None,
            archive_path: None,
        })
    }

    pub async fn check_for_patches(&self, site_name: &str) -> Result<PatchCheckResult, ManagerError> {
        let config = self.patch_configuration(site_name, PatchAction::Check, None).await?;
        Ok(self.patches.check(&config).await)
    }

    pub async fn apply_patch(
        &self,
        site_name: &str,
        site_path: Option<PathBuf>,
        backup_path: Option<PathBuf>,
    ) -> Result<PatchResult, ManagerError> {
        let mut config = self
            .patch_configuration(site_name, PatchAction::Patch, site_path)
            .await?;
        config.backup_path = backup_path;
        Ok(self.patches.apply(&config, config.backup_path.as_deref()).await)
    }

    pub async fn apply_patch_from_archive(
        &self,
        site_name: &str,
        archive_path: &Path,
        backup_path: Option<PathBuf>,
    ) -> Result<PatchResult, ManagerError> {
        let mut config = self
            .patch_configuration(site_name, PatchAction::Patch, None)
            .await?;
        config.backup_path = backup_path;
        config.archive_path = Some(archive_path.to_path_buf());
        Ok(self
            .patches
            .apply_from_archive(&config, archive_path, config.backup_path.as_deref())
            .await)
    }

    pub async fn rollback_patch(
        &self,
        site_name: &str,
        backup_path: Option<PathBuf>,
    ) -> Result<PatchResult, ManagerError> {
        let mut config = self
            .patch_configuration(site_name, PatchAction::Rollback, None)
            .await?;
        config.backup_path = backup_path;
        Ok(self.patches.rollback(&config, config.backup_path.as_deref()).await)
    }

    pub fn is_patch_tool_available(&self, version: &str) -> Result<bool, ManagerError> {
        let version = Version::parse(version)?;
        Ok(self.patches.is_patch_tool_available(&version))
    }

    // ========== Configuration ==========

    pub fn settings(&self) -> Settings {
        self.config.settings()
    }

    pub fn config_value(&self, key: &str) -> Result<String, ManagerError> {
        Ok(self.config.get(key)?)
    }

    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), ManagerError> {
        Ok(self.config.set(key, value)?)
    }

    pub fn acumatica_dir(&self) -> PathBuf {
        self.config.settings().acumatica_dir
    }

    pub fn set_acumatica_dir(&self, path: impl Into<PathBuf>) -> Result<(), ManagerError> {
        self.update_settings(|s| s.acumatica_dir = path.into())
    }

    pub fn site_dir(&self) -> String {
        self.config.settings().site_dir
    }

    pub fn set_site_dir(&self, directory: &str) -> Result<(), ManagerError> {
        self.update_settings(|s| s.site_dir = directory.to_string())
    }

    pub fn version_dir(&self) -> String {
        self.config.settings().version_dir
    }

    pub fn set_version_dir(&self, directory: &str) -> Result<(), ManagerError> {
        self.update_settings(|s| s.version_dir = directory.to_string())
    }

    pub fn default_site_type(&self) -> SiteType {
        self.config.settings().site_type
    }

    pub fn set_default_site_type(&self, site_type: SiteType) -> Result<(), ManagerError> {
        self.set_config_value("SiteType", site_type.as_str())
    }

    pub fn install_debug_tools(&self) -> bool {
        self.config.settings().install_debug_tools
    }

    pub fn set_install_debug_tools(&self, install: bool) -> Result<(), ManagerError> {
        self.update_settings(|s| s.install_debug_tools = install)
    }

    /// Directory new sites are created under when no path is given.
    pub fn default_site_install_path(&self) -> PathBuf {
        self.config.settings().sites_root()
    }

    fn update_settings(&self, change: impl FnOnce(&mut Settings)) -> Result<(), ManagerError> {
        let mut settings = self.config.settings();
        change(&mut settings);
        Ok(self.config.save(settings)?)
    }
}
