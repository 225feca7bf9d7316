/// Patch lifecycle - check, apply and roll back patches with the patch
/// utility shipped inside each installed version
///
/// The utility only reports through free text, so outcomes are read from
/// its output with fixed patterns.

use crate::domain::entities::{
    PatchAction, PatchCheckResult, PatchConfiguration, PatchResult, ProcessExecutionRequest,
    Version,
};
use crate::domain::repositories::{ProcessError, ProcessRunner};
use crate::use_cases::version_manager::VersionManager;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Oldest platform release (major, minor) whose patch utility can be driven
pub const PATCH_SUPPORT_GATE: (u32, u32) = (25, 100);

const NO_PATCHES_AVAILABLE: &str = "No patches are available for download";
const ROLLBACK_COMPLETED: &str = "Rollback completed";
const NOTHING_TO_ROLL_BACK: &str = "Nothing to roll back";
const NOTHING_TO_ROLL_BACK_MESSAGE: &str = "Nothing to roll back. The site has not been patched.";

fn patch_found_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"A new patch found: (.+) P(\d+)").expect("patch found pattern is valid"))
}

fn patch_applied_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"The patch with the (.+) P(\d+) version has been applied")
            .expect("patch applied pattern is valid")
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("{}", unsupported_message(.0))]
    UnsupportedVersion(String),
    #[error("Patch utility not found at: {0}")]
    PatchUtilityNotFound(PathBuf),
    #[error(transparent)]
    Process(#[from] ProcessError),
}

fn unsupported_message(version: &str) -> String {
    format!(
        "Patching is not supported for version {}. The patch utility requires version {}.{} or later.",
        version, PATCH_SUPPORT_GATE.0, PATCH_SUPPORT_GATE.1
    )
}

pub fn is_supported(version: &Version) -> bool {
    version.is_at_least(PATCH_SUPPORT_GATE.0, PATCH_SUPPORT_GATE.1)
}

pub struct PatchManager {
    versions: Arc<VersionManager>,
    runner: Arc<dyn ProcessRunner>,
}

impl PatchManager {
    pub fn new(versions: Arc<VersionManager>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { versions, runner }
    }

    /// Path of the patch utility for `version`, refusing unsupported
    /// versions and missing binaries.
    pub fn patch_utility_path(&self, version: &Version) -> Result<PathBuf, PatchError> {
        if !is_supported(version) {
            return Err(PatchError::UnsupportedVersion(version.to_string()));
        }
        let path = self.versions.patch_utility_path(version);
        if !path.is_file() {
            return Err(PatchError::PatchUtilityNotFound(path));
        }
        Ok(path)
    }

    pub fn is_patch_tool_available(&self, version: &Version) -> bool {
        match self.patch_utility_path(version) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Patch utility unavailable for {}: {}", version, e);
                false
            }
        }
    }

    pub async fn check(&self, config: &PatchConfiguration) -> PatchCheckResult {
        tracing::debug!("Checking for patches at site path: {}", config.site_path.display());
        if !is_supported(&config.version) {
            return PatchCheckResult::none(unsupported_message(config.version.as_str()));
        }

        let args = tool_args(PatchAction::Check, &config.site_path, None, None);
        match self.run_tool(&config.version, args).await {
            Ok(output) => {
                let found = patch_found_pattern()
                    .captures(&output)
                    .map(|c| (c[1].to_string(), c[2].to_string()));
                match found {
                    Some((version, patch_number)) => {
                        tracing::info!("Patch {} P{} is available", version, patch_number);
                        PatchCheckResult {
                            has_patch: true,
                            version: Some(version),
                            patch_number: Some(patch_number),
                            message: output,
                        }
                    }
                    None => PatchCheckResult::none(output),
                }
            }
            Err(e) => {
                tracing::error!(
                    "Failed to check for patches at {}: {}",
                    config.site_path.display(),
                    e
                );
                PatchCheckResult::none(format!("Error checking for patches: {}", e))
            }
        }
    }

    pub async fn apply(&self, config: &PatchConfiguration, backup_path: Option<&Path>) -> PatchResult {
        tracing::debug!("Applying patch at site path: {}", config.site_path.display());
        if !is_supported(&config.version) {
            return PatchResult::failure(unsupported_message(config.version.as_str()));
        }

        let args = tool_args(PatchAction::Patch, &config.site_path, None, backup_path);
        match self.run_tool(&config.version, args).await {
            Ok(output) => applied_result(output),
            Err(e) => {
                tracing::error!("Failed to apply patch at {}: {}", config.site_path.display(), e);
                PatchResult::failure(format!("Error applying patch: {}", e))
            }
        }
    }

    /// Apply the patch contained in `archive_path` instead of downloading one.
    pub async fn apply_from_archive(
        &self,
        config: &PatchConfiguration,
        archive_path: &Path,
        backup_path: Option<&Path>,
    ) -> PatchResult {
        tracing::debug!(
            "Applying patch from archive {} at site path: {}",
            archive_path.display(),
            config.site_path.display()
        );
        if !is_supported(&config.version) {
            return PatchResult::failure(unsupported_message(config.version.as_str()));
        }

        let args = tool_args(
            PatchAction::Patch,
            &config.site_path,
            Some(archive_path),
            backup_path,
        );
        match self.run_tool(&config.version, args).await {
            Ok(output) => applied_result(output),
            Err(e) => {
                tracing::error!(
                    "Failed to apply patch from archive {} at {}: {}",
                    archive_path.display(),
                    config.site_path.display(),
                    e
                );
                PatchResult::failure(format!("Error applying patch from archive: {}", e))
            }
        }
    }

    pub async fn rollback(&self, config: &PatchConfiguration, backup_path: Option<&Path>) -> PatchResult {
        tracing::debug!("Rolling back patch at site path: {}", config.site_path.display());
        if !is_supported(&config.version) {
            return PatchResult::failure(unsupported_message(config.version.as_str()));
        }

        let args = tool_args(PatchAction::Rollback, &config.site_path, None, backup_path);
        match self.run_tool(&config.version, args).await {
            Ok(output) if output.contains(ROLLBACK_COMPLETED) => PatchResult {
                success: true,
                message: ROLLBACK_COMPLETED.to_string(),
                ..PatchResult::default()
            },
            Ok(output) if output.contains(NOTHING_TO_ROLL_BACK) => {
                PatchResult::failure(NOTHING_TO_ROLL_BACK_MESSAGE)
            }
            Ok(output) => PatchResult::failure(output),
            Err(e) => {
                tracing::error!("Failed to rollback patch at {}: {}", config.site_path.display(), e);
                PatchResult::failure(format!("Error rolling back patch: {}", e))
            }
        }
    }

    async fn run_tool(&self, version: &Version, args: Vec<String>) -> Result<String, PatchError> {
        let tool = self.patch_utility_path(version)?;
        let request = ProcessExecutionRequest::new(tool).args(args).throw_on_error();
        tracing::debug!("Executing PatchTool with arguments: {}", request.argument_string());

        let result = self.runner.execute(&request).await?;
        Ok(result.output)
    }
}

fn tool_args(
    action: PatchAction,
    site_path: &Path,
    archive_path: Option<&Path>,
    backup_path: Option<&Path>,
) -> Vec<String> {
    let mut args = vec![
        action.subcommand().to_string(),
        "--path".to_string(),
        site_path.display().to_string(),
    ];
    if let Some(archive) = archive_path {
        args.push("--archive".to_string());
        args.push(archive.display().to_string());
    }
    if let Some(backup) = backup_path {
        args.push("--zip".to_string());
        args.push(backup.display().to_string());
    }
    args
}

fn applied_result(output: String) -> PatchResult {
    let applied = patch_applied_pattern()
        .captures(&output)
        .map(|c| (c[1].to_string(), c[2].to_string()));
    if let Some((version, patch_number)) = applied {
        tracing::info!("Applied patch {} P{}", version, patch_number);
        return PatchResult {
            success: true,
            version: Some(version),
            patch_number: Some(patch_number),
            message: output,
        };
    }
    if output.contains(NO_PATCHES_AVAILABLE) {
        return PatchResult::failure(NO_PATCHES_AVAILABLE);
    }
    PatchResult::failure(output)
}
