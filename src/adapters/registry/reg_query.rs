//! Site registry adapter - implements SiteRegistry by shelling out to reg.exe
//! Sites live below `HKLM\SOFTWARE\ACUMATICA ERP\<site>` with a `Path` value

use crate::domain::entities::ProcessExecutionRequest;
use crate::domain::repositories::{ProcessRunner, RegistryError, SiteConfigEditor, SiteRegistry};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

pub const ACUMATICA_REGISTRY_KEY: &str = r"HKLM\SOFTWARE\ACUMATICA ERP";
const ACUMATICA_REGISTRY_KEY_FULL: &str = r"HKEY_LOCAL_MACHINE\SOFTWARE\ACUMATICA ERP";
const PATH_VALUE: &str = "Path";

fn value_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.+?)\s+(REG_[A-Z_]+)(?:\s+(.*))?$").expect("value line pattern is valid")
    })
}

/// One `Path` value found below the root key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub key: String,
    pub path: String,
}

pub struct RegQuerySiteRegistry {
    runner: Arc<dyn ProcessRunner>,
    editor: Arc<dyn SiteConfigEditor>,
    reg_exe: PathBuf,
}

impl RegQuerySiteRegistry {
    pub fn new(runner: Arc<dyn ProcessRunner>, editor: Arc<dyn SiteConfigEditor>) -> Self {
        Self {
            runner,
            editor,
            reg_exe: default_reg_exe(),
        }
    }

    pub fn with_reg_exe(mut self, reg_exe: impl Into<PathBuf>) -> Self {
        self.reg_exe = reg_exe.into();
        self
    }

    /// Run `reg query` and return its output, `None` when the key is absent.
    async fn query(&self, arguments: Vec<String>) -> Result<Option<String>, RegistryError> {
        let request = ProcessExecutionRequest::new(&self.reg_exe).args(arguments);
        let result = self.runner.execute(&request).await?;

        if !result.success {
            tracing::debug!(
                "reg query returned no data: {}",
                result
                    .error_message
                    .as_deref()
                    .unwrap_or(result.error_output.as_str())
            );
            return Ok(None);
        }
        Ok(Some(result.output))
    }
}

fn default_reg_exe() -> PathBuf {
    std::env::var_os("SystemRoot")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\Windows"))
        .join("System32")
        .join("reg.exe")
}

/// Parse `reg query` output into `(key, Path)` pairs.
pub fn parse_path_values(output: &str) -> Vec<RegistryEntry> {
    let mut current_key: Option<&str> = None;
    let mut entries = Vec::new();

    for line in output.lines().map(str::trim) {
        if line.starts_with("HKEY_") {
            current_key = Some(line);
            continue;
        }
        let (Some(key), Some(captures)) = (current_key, value_line_pattern().captures(line)) else {
            continue;
        };
        if !captures[1].eq_ignore_ascii_case(PATH_VALUE) {
            continue;
        }
        let path = captures.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
        if path.is_empty() {
            continue;
        }
        entries.push(RegistryEntry {
            key: key.to_string(),
            path: path.to_string(),
        });
    }

    entries
}

/// Site name for a key directly below the root key.
fn site_name(key: &str) -> Option<&str> {
    let prefix = format!(r"{}\", ACUMATICA_REGISTRY_KEY_FULL);
    let head = key.get(..prefix.len())?;
    if key.len() <= prefix.len() || !head.eq_ignore_ascii_case(&prefix) {
        return None;
    }
    let name = &key[prefix.len()..];
    (!name.contains('\\')).then_some(name)
}

#[async_trait]
impl SiteRegistry for RegQuerySiteRegistry {
    async fn site_path(&self, site_name: &str) -> Result<Option<PathBuf>, RegistryError> {
        let key = format!(r"{}\{}", ACUMATICA_REGISTRY_KEY, site_name);
        let Some(output) = self
            .query(vec!["query".into(), key, "/v".into(), PATH_VALUE.into()])
            .await?
        else {
            tracing::debug!("Registry key not found for site: {}", site_name);
            return Ok(None);
        };

        let path = parse_path_values(&output).into_iter().next().map(|e| PathBuf::from(e.path));
        match &path {
            Some(path) => tracing::debug!("Found site path in registry: {}", path.display()),
            None => tracing::debug!("Path value not found or empty for site: {}", site_name),
        }
        Ok(path)
    }

    async fn installed_sites(&self) -> Result<Vec<String>, RegistryError> {
        let Some(output) = self
            .query(vec![
                "query".into(),
                ACUMATICA_REGISTRY_KEY.into(),
                "/s".into(),
                "/v".into(),
                PATH_VALUE.into(),
            ])
            .await?
        else {
            tracing::debug!("Acumatica ERP registry key not found");
            return Ok(Vec::new());
        };

        let sites: Vec<String> = parse_path_values(&output)
            .iter()
            .filter_map(|entry| site_name(&entry.key))
            .map(str::to_string)
            .collect();
        tracing::debug!("Found {} sites in registry", sites.len());
        Ok(sites)
    }

    async fn site_version(&self, site_name: &str) -> Result<Option<String>, RegistryError> {
        let Some(site_path) = self.site_path(site_name).await? else {
            tracing::debug!("Could not find site path for: {}", site_name);
            return Ok(None);
        };
        Ok(self.editor.site_version(&site_path.join("web.config"))?)
    }
}
