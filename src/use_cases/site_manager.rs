/// Site lifecycle - create, remove and update sites through the
/// configuration utility of the site's platform version

use crate::domain::entities::{
    ProcessExecutionRequest, SiteAction, SiteConfiguration, SiteType, VersionConfiguration,
};
use crate::domain::repositories::{
    ConfigStore, OperatorConsole, PrivilegeCheck, ProcessError, ProcessRunner, RegistryError,
    SiteConfigEditor, SiteRegistry,
};
use crate::use_cases::arg_builders::{ArgBuilder, ArgBuilderFactory, UnsupportedAction};
use crate::use_cases::version_manager::{yes_no, VersionManager};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("This operation must be run as Administrator")]
    PrivilegesRequired,
    #[error("Configuration utility not found at: {0}")]
    ConfigUtilityNotFound(PathBuf),
    #[error(transparent)]
    UnsupportedAction(#[from] UnsupportedAction),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Process(#[from] ProcessError),
}

pub struct SiteManager {
    versions: Arc<VersionManager>,
    factory: ArgBuilderFactory,
    runner: Arc<dyn ProcessRunner>,
    registry: Arc<dyn SiteRegistry>,
    editor: Arc<dyn SiteConfigEditor>,
    config: Arc<dyn ConfigStore>,
    console: Arc<dyn OperatorConsole>,
    privileges: Arc<dyn PrivilegeCheck>,
}

impl SiteManager {
    pub fn new(
        versions: Arc<VersionManager>,
        runner: Arc<dyn ProcessRunner>,
        registry: Arc<dyn SiteRegistry>,
        editor: Arc<dyn SiteConfigEditor>,
        config: Arc<dyn ConfigStore>,
        console: Arc<dyn OperatorConsole>,
        privileges: Arc<dyn PrivilegeCheck>,
    ) -> Self {
        Self {
            versions,
            factory: ArgBuilderFactory::new(),
            runner,
            registry,
            editor,
            config,
            console,
            privileges,
        }
    }

    pub fn requires_administrator_privileges(&self) -> bool {
        !self.privileges.is_elevated()
    }

    /// Fill the site type and path from settings when the caller left them unset.
    pub fn resolve_defaults(&self, mut site: SiteConfiguration) -> SiteConfiguration {
        let settings = self.config.settings();
        if site.site_type == SiteType::NotSet {
            site.site_type = settings.site_type;
        }
        if site.site_path.is_none() {
            site.site_path = Some(settings.default_site_path(&site.site_name));
        }
        site
    }

    pub async fn create_site(&self, site: SiteConfiguration) -> bool {
        self.console.header(
            "Acumatica Site Installation",
            Some(&format!("Version {} • Site: {}", site.version, site.site_name)),
        );

        let name = site.site_name.clone();
        match self.try_create_site(site).await {
            Ok(created) => created,
            Err(e) => {
                tracing::error!("Failed to create site {}: {}", name, e);
                false
            }
        }
    }

    async fn try_create_site(&self, site: SiteConfiguration) -> Result<bool, SiteError> {
        self.console.section("Validating Prerequisites");

        if !self.privileges.is_elevated() {
            tracing::error!("Administrator privileges required");
            return Err(SiteError::PrivilegesRequired);
        }
        self.console.success("Administrator privileges confirmed");

        if self.registry.site_exists(&site.site_name).await? {
            tracing::warn!("Site '{}' already exists", site.site_name);
            let proceed = site.overwrite_existing
                || self.console.confirm(&format!(
                    "Site '{}' already exists. Do you want to continue and potentially overwrite it?",
                    site.site_name
                ));
            if !proceed {
                tracing::error!("Site creation cancelled - site already exists");
                return Ok(false);
            }
            tracing::info!("Continuing with existing site '{}'", site.site_name);
        }

        let site = self.resolve_defaults(site);
        let is_dev = site.site_type == SiteType::Development;

        if !self.versions.is_installed(&site.version) {
            tracing::warn!("Version {} not found locally", site.version);

            let install = site.version.install_new_version
                || self.console.confirm(&format!(
                    "You do not have version {} installed, do you want to install?",
                    site.version
                ));
            if !install {
                tracing::error!("Site installation cancelled - version not available");
                return Ok(false);
            }

            self.console.section("Installing Required Version");
            let version_config = VersionConfiguration {
                version: site.version.clone(),
                version_path: self.versions.version_path(&site.version),
                install_debug_tools: is_dev || self.config.settings().install_debug_tools,
                force_install: site.force_install,
            };
            if !self.versions.install(&version_config).await {
                tracing::error!("Failed to install required version");
                return Ok(false);
            }
        } else {
            self.console.success(&format!(
                "Version {} found at {}",
                site.version,
                self.versions.version_path(&site.version).display()
            ));
        }

        self.console.section("Configuring Site Parameters");
        self.console.table(
            Some("Site Configuration"),
            &[
                ("Site Name", site.site_name.clone()),
                ("Version", site.version.to_string()),
                ("Install Path", site.site_path_display()),
                ("Portal Site", yes_no(site.is_portal)),
                ("Site Type", site.site_type.to_string()),
                ("Preview Build", yes_no(site.version.is_preview)),
            ],
        );

        self.console.section("Installing Site");
        let site = site.with_action(SiteAction::NewInstance);
        let builder = self.factory.create(&site)?;
        let created = self.run_config_utility(&site, builder).await?;
        if !created {
            return Ok(false);
        }

        if is_dev {
            self.console.step("Applying development configuration");
            if let Some(site_path) = &site.site_path {
                if let Err(e) = self
                    .editor
                    .apply_development_configuration(&site_path.join("web.config"))
                {
                    tracing::warn!("Could not apply development configuration: {}", e);
                }
            }
        }

        self.console.summary(
            "Site Installation",
            "Completed Successfully",
            &[
                ("Site Name", site.site_name.clone()),
                ("Version", site.version.to_string()),
                ("Path", site.site_path_display()),
                ("Type", site.site_type.to_string()),
                ("Portal", yes_no(site.is_portal)),
            ],
        );
        Ok(true)
    }

    pub async fn remove_site(&self, site: SiteConfiguration) -> bool {
        self.console.header(
            "Acumatica Site Removal",
            Some(&format!("Site: {}", site.site_name)),
        );
        self.console.section("Removing Site Registration");

        let site = site.with_action(SiteAction::DeleteSite);
        let removed = match self.factory.create(&site) {
            Ok(builder) => self.run_config_utility(&site, builder).await,
            Err(e) => Err(e.into()),
        };

        match removed {
            Ok(true) => {
                self.console.summary(
                    "Site Removal",
                    "Completed Successfully",
                    &[("Site Name", site.site_name.clone())],
                );
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::error!("Failed to remove site {}: {}", site.site_name, e);
                false
            }
        }
    }

    /// Upgrading a site in place is not available yet; this always reports
    /// failure after validating its input.
    pub async fn update_site(&self, site: SiteConfiguration) -> bool {
        self.console.header(
            "Acumatica Site Update",
            Some(&format!("Site: {} → Version: {}", site.site_name, site.version)),
        );

        if site.site_name.trim().is_empty() {
            tracing::error!("A site name is required");
            return false;
        }

        tracing::warn!("Site update is not yet implemented");
        tracing::info!("This feature will be available in a future version");
        false
    }

    async fn run_config_utility(
        &self,
        site: &SiteConfiguration,
        builder: ArgBuilder,
    ) -> Result<bool, SiteError> {
        let executable = self.versions.config_utility_path(&site.version);
        if !executable.is_file() {
            tracing::error!("Configuration utility not found at: {}", executable.display());
            return Err(SiteError::ConfigUtilityNotFound(executable));
        }

        self.console.step("Executing Acumatica configuration utility...");
        let request = ProcessExecutionRequest::new(executable)
            .args(builder.build_args(site))
            .streaming();

        let result = self.runner.execute(&request).await?;
        Ok(result.success)
    }
}
