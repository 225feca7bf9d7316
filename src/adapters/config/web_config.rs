//! Site configuration adapter - implements SiteConfigEditor over web.config
//! Reads go through serde-xml-rs DTOs, edits stream the document through
//! xml-rs so everything that is not touched is written back as it was

use crate::domain::repositories::{SiteConfigEditor, WebConfigError};
use serde::Deserialize;
use std::path::Path;
use xml::attribute::OwnedAttribute;
use xml::name::OwnedName;
use xml::reader::{EventReader, ParserConfig, XmlEvent};
use xml::writer::EmitterConfig;

/// Name of the connection string the platform reads its database from
pub const MAIN_CONNECTION_STRING: &str = "ProjectX";

#[derive(Debug, Clone, Default)]
pub struct WebConfigEditor;

impl WebConfigEditor {
    pub fn new() -> Self {
        Self
    }

    fn load(&self, web_config: &Path) -> Result<Option<WebConfigDto>, WebConfigError> {
        if !web_config.is_file() {
            tracing::debug!("web.config not found at: {}", web_config.display());
            return Ok(None);
        }
        let contents = read(web_config)?;
        serde_xml_rs::from_str(&contents)
            .map(Some)
            .map_err(|e| WebConfigError::Parse {
                path: web_config.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Rewrite `web_config`, letting `edit` adjust the attributes of every
    /// element. Returns how many elements `edit` reported as changed.
    fn rewrite<F>(&self, web_config: &Path, mut edit: F) -> Result<usize, WebConfigError>
    where
        F: FnMut(&[String], &str, &mut Vec<OwnedAttribute>) -> bool,
    {
        if !web_config.is_file() {
            return Err(WebConfigError::NotFound(web_config.to_path_buf()));
        }
        let contents = read(web_config)?;
        let parse_error = |message: String| WebConfigError::Parse {
            path: web_config.to_path_buf(),
            message,
        };
        let write_error = |message: String| WebConfigError::Write {
            path: web_config.to_path_buf(),
            message,
        };

        let parser = EventReader::new_with_config(
            contents.as_bytes(),
            ParserConfig::new()
                .trim_whitespace(false)
                .whitespace_to_characters(true)
                .ignore_comments(false),
        );
        let mut output = Vec::with_capacity(contents.len());
        let mut writer = EmitterConfig::new()
            .perform_indent(false)
            .normalize_empty_elements(false)
            .autopad_comments(false)
            .create_writer(&mut output);

        let mut ancestors: Vec<String> = Vec::new();
        let mut changed = 0;

        for event in parser {
            let event = match event.map_err(|e| parse_error(e.to_string()))? {
                XmlEvent::StartElement {
                    name,
                    mut attributes,
                    namespace,
                } => {
                    if edit(&ancestors, &name.local_name, &mut attributes) {
                        changed += 1;
                    }
                    ancestors.push(name.local_name.clone());
                    XmlEvent::StartElement {
                        name,
                        attributes,
                        namespace,
                    }
                }
                XmlEvent::EndElement { name } => {
                    ancestors.pop();
                    XmlEvent::EndElement { name }
                }
                other => other,
            };
            if let Some(write_event) = event.as_writer_event() {
                writer
                    .write(write_event)
                    .map_err(|e| write_error(e.to_string()))?;
            }
        }
        drop(writer);

        std::fs::write(web_config, &output).map_err(|e| write_error(e.to_string()))?;
        Ok(changed)
    }
}

fn read(path: &Path) -> Result<String, WebConfigError> {
    std::fs::read_to_string(path).map_err(|e| WebConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn set_attribute(attributes: &mut Vec<OwnedAttribute>, name: &str, value: &str) {
    match attributes
        .iter_mut()
        .find(|a| a.name.prefix.is_none() && a.name.local_name == name)
    {
        Some(existing) => existing.value = value.to_string(),
        None => attributes.push(OwnedAttribute::new(OwnedName::local(name), value)),
    }
}

fn attribute<'a>(attributes: &'a [OwnedAttribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name.prefix.is_none() && a.name.local_name == name)
        .map(|a| a.value.as_str())
}

impl SiteConfigEditor for WebConfigEditor {
    fn site_version(&self, web_config: &Path) -> Result<Option<String>, WebConfigError> {
        let version = self.load(web_config)?.and_then(|doc| {
            doc.app_settings?
                .entries
                .into_iter()
                .find(|add| add.key.as_deref() == Some("Version"))
                .and_then(|add| add.value)
                .filter(|v| !v.is_empty())
        });
        if let Some(version) = &version {
            tracing::debug!("Found version {} in web.config", version);
        }
        Ok(version)
    }

    fn apply_development_configuration(&self, web_config: &Path) -> Result<(), WebConfigError> {
        let mut compilation_done = false;
        let mut pages_done = false;

        self.rewrite(web_config, |_, element, attributes| match element {
            "compilation" if !compilation_done => {
                compilation_done = true;
                set_attribute(attributes, "optimizeCompilations", "true");
                set_attribute(attributes, "batch", "false");
                tracing::debug!("Set optimizeCompilations=true and batch=false");
                true
            }
            "pages" if !pages_done => {
                pages_done = true;
                set_attribute(attributes, "compilationMode", "Never");
                tracing::debug!("Set pages compilationMode=Never");
                true
            }
            _ => false,
        })?;

        tracing::info!("Development configuration applied to {}", web_config.display());
        Ok(())
    }

    fn connection_string(&self, web_config: &Path) -> Result<Option<String>, WebConfigError> {
        Ok(self.load(web_config)?.and_then(|doc| {
            doc.connection_strings?
                .entries
                .into_iter()
                .find(|add| add.name.as_deref() == Some(MAIN_CONNECTION_STRING))
                .and_then(|add| add.connection_string)
        }))
    }

    fn update_connection_string(&self, web_config: &Path, value: &str) -> Result<(), WebConfigError> {
        let changed = self.rewrite(web_config, |ancestors, element, attributes| {
            let matches = element == "add"
                && ancestors.last().map(String::as_str) == Some("connectionStrings")
                && attribute(attributes, "name") == Some(MAIN_CONNECTION_STRING);
            if matches {
                set_attribute(attributes, "connectionString", value);
            }
            matches
        })?;

        if changed == 0 {
            return Err(WebConfigError::MissingConnectionString(
                MAIN_CONNECTION_STRING.to_string(),
            ));
        }
        tracing::info!("Connection string updated in {}", web_config.display());
        Ok(())
    }
}

/// Data Transfer Objects for the parts of web.config this crate reads
#[derive(Debug, Deserialize)]
#[serde(rename = "configuration")]
struct WebConfigDto {
    #[serde(rename = "appSettings", default)]
    app_settings: Option<EntriesDto>,
    #[serde(rename = "connectionStrings", default)]
    connection_strings: Option<EntriesDto>,
}

#[derive(Debug, Deserialize)]
struct EntriesDto {
    #[serde(rename = "add", default)]
    entries: Vec<AddDto>,
}

#[derive(Debug, Deserialize)]
struct AddDto {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "connectionString", default)]
    connection_string: Option<String>,
}
