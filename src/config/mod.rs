use crate::domain::entities::{
    SiteType, DEFAULT_DB_SERVER, DEFAULT_IIS_APP_POOL, DEFAULT_IIS_WEBSITE,
};
use crate::domain::repositories::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://acumatica-builds.s3.amazonaws.com";

/// Module configuration persisted as JSON.
///
/// Key names match the configuration file written by earlier releases of
/// the helper so existing files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of every version and site directory
    #[serde(rename = "AcumaticaDir")]
    pub acumatica_dir: PathBuf,

    /// Site directory name below the root
    #[serde(rename = "AcumaticaSiteDir")]
    pub site_dir: String,

    /// Version directory name below the root
    #[serde(rename = "AcumaticaVersionDir")]
    pub version_dir: String,

    #[serde(rename = "SiteType")]
    pub site_type: SiteType,

    #[serde(rename = "InstallDebugTools")]
    pub install_debug_tools: bool,

    #[serde(rename = "DbServer")]
    pub db_server: String,

    #[serde(rename = "IisWebsite")]
    pub iis_website: String,

    #[serde(rename = "IisAppPool")]
    pub iis_app_pool: String,

    #[serde(rename = "DownloadBaseUrl")]
    pub download_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            acumatica_dir: PathBuf::from(r"C:\Acumatica"),
            site_dir: "Sites".to_string(),
            version_dir: "Versions".to_string(),
            site_type: SiteType::Production,
            install_debug_tools: false,
            db_server: DEFAULT_DB_SERVER.to_string(),
            iis_website: DEFAULT_IIS_WEBSITE.to_string(),
            iis_app_pool: DEFAULT_IIS_APP_POOL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    /// Every key accepted by [`Settings::get`] and [`Settings::set`]
    pub const KEYS: [&'static str; 9] = [
        "AcumaticaDir",
        "AcumaticaSiteDir",
        "AcumaticaVersionDir",
        "SiteType",
        "InstallDebugTools",
        "DbServer",
        "IisWebsite",
        "IisAppPool",
        "DownloadBaseUrl",
    ];

    /// Load settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |message: String| ConfigError::Write {
            path: path.to_path_buf(),
            message,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| write_error(e.to_string()))
    }

    pub fn versions_root(&self) -> PathBuf {
        self.acumatica_dir.join(&self.version_dir)
    }

    pub fn sites_root(&self) -> PathBuf {
        self.acumatica_dir.join(&self.site_dir)
    }

    pub fn default_site_path(&self, site_name: &str) -> PathBuf {
        self.sites_root().join(site_name)
    }

    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let value = match canonical_key(key)? {
            "AcumaticaDir" => self.acumatica_dir.display().to_string(),
            "AcumaticaSiteDir" => self.site_dir.clone(),
            "AcumaticaVersionDir" => self.version_dir.clone(),
            "SiteType" => self.site_type.to_string(),
            "InstallDebugTools" => self.install_debug_tools.to_string(),
            "DbServer" => self.db_server.clone(),
            "IisWebsite" => self.iis_website.clone(),
            "IisAppPool" => self.iis_app_pool.clone(),
            _ => self.download_base_url.clone(),
        };
        Ok(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key = canonical_key(key)?;
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "AcumaticaDir" => self.acumatica_dir = PathBuf::from(value),
            "AcumaticaSiteDir" => self.site_dir = value.to_string(),
            "AcumaticaVersionDir" => self.version_dir = value.to_string(),
            "SiteType" => {
                self.site_type = match value.parse::<SiteType>() {
                    Ok(SiteType::NotSet) | Err(_) => return Err(invalid()),
                    Ok(site_type) => site_type,
                }
            }
            "InstallDebugTools" => {
                self.install_debug_tools = value.trim().parse().map_err(|_| invalid())?
            }
            "DbServer" => self.db_server = value.to_string(),
            "IisWebsite" => self.iis_website = value.to_string(),
            "IisAppPool" => self.iis_app_pool = value.to_string(),
            _ => self.download_base_url = value.trim_end_matches('/').to_string(),
        }
        Ok(())
    }
}

fn canonical_key(key: &str) -> Result<&'static str, ConfigError> {
    Settings::KEYS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(key.trim()))
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.acumatica_dir, PathBuf::from(r"C:\Acumatica"));
        assert_eq!(settings.site_dir, "Sites");
        assert_eq!(settings.version_dir, "Versions");
        assert_eq!(settings.site_type, SiteType::Production);
        assert!(!settings.install_debug_tools);
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let json = r#"{ "AcumaticaDir": "D:\\Acu", "SiteType": "Development" }"#;

        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.acumatica_dir, PathBuf::from(r"D:\Acu"));
        assert_eq!(settings.site_type, SiteType::Development);
        assert_eq!(settings.version_dir, "Versions");
        assert_eq!(settings.db_server, DEFAULT_DB_SERVER);
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"not json").unwrap();
        temp_file.flush().unwrap();

        assert!(Settings::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_get_and_set_keys() {
        let mut settings = Settings::default();
        settings.set("installdebugtools", "true").unwrap();
        settings.set("SiteType", "dev").unwrap();
        settings.set("AcumaticaVersionDir", "Builds").unwrap();

        assert_eq!(settings.get("InstallDebugTools").unwrap(), "true");
        assert_eq!(settings.get("SiteType").unwrap(), "Development");
        assert_eq!(settings.versions_root(), PathBuf::from(r"C:\Acumatica").join("Builds"));
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set("Colour", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            settings.set("InstallDebugTools", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("SiteType", "NotSet"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut settings = Settings::default();
        settings.acumatica_dir = dir.path().to_path_buf();

        settings.write_to(&path).unwrap();
        assert_eq!(Settings::from_file(&path).unwrap(), settings);
    }
}
