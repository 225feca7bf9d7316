/// Argument builders for the configuration utility
/// One variant per supported site action; anything else is refused up front

use crate::domain::entities::{SiteAction, SiteConfiguration, SiteType};

const DEFAULT_COMPANY: &str = "CompanyID=1;CompanyType=;LoginName=;";
const DEMO_COMPANY: &str = "CompanyID=2;CompanyType=SalesDemo;ParentID=1;Visible=Yes;LoginName=Company;";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgBuilder {
    NewInstance,
    DeleteSite,
    UpgradeSite,
}

impl ArgBuilder {
    pub fn action(&self) -> SiteAction {
        match self {
            ArgBuilder::NewInstance => SiteAction::NewInstance,
            ArgBuilder::DeleteSite => SiteAction::DeleteSite,
            ArgBuilder::UpgradeSite => SiteAction::UpgradeSite,
        }
    }

    /// Render the argument list. Values are separate list items and are
    /// never quoted; the process runner hands them over verbatim.
    pub fn build_args(&self, site: &SiteConfiguration) -> Vec<String> {
        let mode = format!("-configmode:{}", self.action().config_mode());
        match self {
            ArgBuilder::NewInstance => {
                let mut args = vec![
                    mode,
                    format!("-iname:{}", site.site_name),
                    format!("-ipath:{}", site.site_path_display()),
                    format!("-dbsrvname:{}", site.db_server),
                    format!("-dbname:{}", site.site_name),
                    "-dbsrvwinauth:True".to_string(),
                    format!("-swebsite:{}", site.iis_website),
                    format!("-svirtdir:{}", site.site_name),
                    format!("-spool:{}", site.iis_app_pool),
                    "-output:Quiet".to_string(),
                    format!("-company:{}", DEFAULT_COMPANY),
                    format!("-company:{}", DEMO_COMPANY),
                ];
                if site.is_portal {
                    args.push("-portal".to_string());
                }
                if site.site_type == SiteType::Development {
                    args.push("-developmentmode".to_string());
                }
                args
            }
            ArgBuilder::DeleteSite => vec![mode, format!("-sitename:{}", site.site_name)],
            ArgBuilder::UpgradeSite => vec![
                mode,
                format!("-sitename:{}", site.site_name),
                format!("-targetversion:{}", site.version),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Site action {0} is not yet supported")]
pub struct UnsupportedAction(pub SiteAction);

/// Picks the argument builder for a site operation
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgBuilderFactory;

impl ArgBuilderFactory {
    pub fn new() -> Self {
        Self
    }

    /// `RenameSite` is refused: the utility needs a target name that the
    /// configuration has no field for.
    pub fn create(&self, site: &SiteConfiguration) -> Result<ArgBuilder, UnsupportedAction> {
        match site.action {
            SiteAction::NewInstance => Ok(ArgBuilder::NewInstance),
            SiteAction::DeleteSite => Ok(ArgBuilder::DeleteSite),
            SiteAction::UpgradeSite => Ok(ArgBuilder::UpgradeSite),
            other => Err(UnsupportedAction(other)),
        }
    }
}
