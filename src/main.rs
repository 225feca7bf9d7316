/// Main entry point using Clean Architecture
/// This file is part of the outermost layer (Frameworks & Drivers)

use acuhelper::adapters::{FileConfigStore, RegQuerySiteRegistry, TokioProcessRunner, WebConfigEditor};
use acuhelper::config::Settings;
use acuhelper::domain::entities::{SiteType, Version};
use acuhelper::infrastructure::{HostPrivileges, ReqwestDownloader, TerminalConsole};
use acuhelper::{AcumaticaManager, ManagerDeps};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "acuhelper", version, about = "Install Acumatica ERP versions and manage sites")]
struct Cli {
    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "ACUHELPER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install, remove and list platform versions
    #[command(subcommand)]
    Version(VersionCommand),
    /// Create, remove and inspect sites
    #[command(subcommand)]
    Site(SiteCommand),
    /// Check, apply and roll back patches
    #[command(subcommand)]
    Patch(PatchCommand),
    /// Read and change module configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum VersionCommand {
    Install {
        #[arg(value_parser = parse_version)]
        version: Version,
        /// Download from the preview channel
        #[arg(long)]
        preview: bool,
        /// Reinstall even when the version is present
        #[arg(long)]
        force: bool,
        #[arg(long)]
        debug_tools: bool,
    },
    Remove {
        #[arg(value_parser = parse_version)]
        version: Version,
        /// Remove without asking
        #[arg(long)]
        force: bool,
    },
    List,
}

#[derive(Subcommand)]
enum SiteCommand {
    Create(CreateSiteArgs),
    Remove { name: String },
    Update {
        name: String,
        #[arg(value_parser = parse_version)]
        version: Version,
    },
    List,
    Version { name: String },
}

#[derive(Args)]
struct CreateSiteArgs {
    name: String,
    #[arg(value_parser = parse_version)]
    version: Version,
    /// Install directory (defaults to <root>/<site dir>/<name>)
    #[arg(long)]
    path: Option<PathBuf>,
    #[arg(long)]
    portal: bool,
    /// Production or Development (defaults to the configured type)
    #[arg(long, value_parser = parse_site_type)]
    site_type: Option<SiteType>,
    #[arg(long)]
    preview: bool,
    /// Install the version without asking when it is missing
    #[arg(long)]
    install_version: bool,
    /// Continue when a site with this name is already registered
    #[arg(long)]
    overwrite: bool,
}

#[derive(Subcommand)]
enum PatchCommand {
    Check { site: String },
    Apply {
        site: String,
        /// Apply the patch in this archive instead of downloading one
        #[arg(long)]
        archive: Option<PathBuf>,
        #[arg(long)]
        backup: Option<PathBuf>,
        /// Site directory override
        #[arg(long)]
        path: Option<PathBuf>,
    },
    Rollback {
        site: String,
        #[arg(long)]
        backup: Option<PathBuf>,
    },
    /// Report whether the patch utility can be used for a version
    Tool {
        #[arg(value_parser = parse_version)]
        version: Version,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Get { key: String },
    Set { key: String, value: String },
}

fn parse_version(value: &str) -> Result<Version, String> {
    Version::parse(value).map_err(|e| e.to_string())
}

fn parse_site_type(value: &str) -> Result<SiteType, String> {
    value.parse::<SiteType>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acuhelper=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // ========== Dependency Injection Setup ==========

    let config_path = cli.config.clone().unwrap_or_else(FileConfigStore::default_path);
    tracing::debug!("Using configuration file: {}", config_path.display());

    let runner = Arc::new(TokioProcessRunner::new());
    let editor = Arc::new(WebConfigEditor::new());
    let deps = ManagerDeps {
        config: Arc::new(FileConfigStore::new(config_path)),
        runner: runner.clone(),
        downloader: Arc::new(ReqwestDownloader::new()),
        console: Arc::new(TerminalConsole::new(cli.yes)),
        registry: Arc::new(RegQuerySiteRegistry::new(runner, editor.clone())),
        editor,
        privileges: Arc::new(HostPrivileges::new()),
    };
    let manager = AcumaticaManager::new(deps);

    let succeeded = match cli.command {
        Command::Version(command) => run_version(&manager, command).await,
        Command::Site(command) => run_site(&manager, command, cli.yes).await?,
        Command::Patch(command) => run_patch(&manager, command).await?,
        Command::Config(command) => run_config(&manager, command)?,
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_version(manager: &AcumaticaManager, command: VersionCommand) -> bool {
    match command {
        VersionCommand::Install {
            version,
            preview,
            force,
            debug_tools,
        } => {
            let mut version = version.preview(preview);
            version.debugger_tools = debug_tools;
            manager.install_version(version, force).await
        }
        VersionCommand::Remove { version, force } => manager.remove_version(version, force).await,
        VersionCommand::List => {
            let versions = manager.installed_versions();
            if versions.is_empty() {
                println!("No versions installed");
            }
            for version in versions {
                let installed = version
                    .install_date
                    .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                let size = version
                    .size
                    .map(acuhelper::domain::utils::format_bytes)
                    .unwrap_or_default();
                println!("{:<14} {:<18} {}", version.as_str(), installed, size);
            }
            true
        }
    }
}

async fn run_site(manager: &AcumaticaManager, command: SiteCommand, assume_yes: bool) -> anyhow::Result<bool> {
    let succeeded = match command {
        SiteCommand::Create(args) => {
            let version = args
                .version
                .preview(args.preview)
                .with_install_new_version(args.install_version || assume_yes);
            let mut site = manager.new_site_configuration(&args.name, version);
            site.site_path = args.path;
            site.is_portal = args.portal;
            site.is_preview = args.preview;
            site.site_type = args.site_type.unwrap_or(SiteType::NotSet);
            site.overwrite_existing = args.overwrite;
            manager.create_site(site).await
        }
        SiteCommand::Remove { name } => manager.remove_site(&name).await?,
        SiteCommand::Update { name, version } => manager.update_site(&name, version.as_str()).await?,
        SiteCommand::List => {
            for site in manager.installed_sites().await? {
                println!("{}", site);
            }
            true
        }
        SiteCommand::Version { name } => match manager.site_version(&name).await? {
            Some(version) => {
                println!("{}", version);
                true
            }
            None => {
                tracing::error!("No version recorded for site {}", name);
                false
            }
        },
    };
    Ok(succeeded)
}

async fn run_patch(manager: &AcumaticaManager, command: PatchCommand) -> anyhow::Result<bool> {
    let succeeded = match command {
        PatchCommand::Check { site } => {
            let result = manager.check_for_patches(&site).await?;
            match (&result.version, &result.patch_number) {
                (Some(version), Some(patch)) if result.has_patch => {
                    println!("Patch available: {} P{}", version, patch)
                }
                _ => println!("{}", result.message.trim()),
            }
            true
        }
        PatchCommand::Apply {
            site,
            archive,
            backup,
            path,
        } => {
            let result = match archive {
                Some(archive) => manager.apply_patch_from_archive(&site, &archive, backup).await?,
                None => manager.apply_patch(&site, path, backup).await?,
            };
            println!("{}", result.message.trim());
            result.success
        }
        PatchCommand::Rollback { site, backup } => {
            let result = manager.rollback_patch(&site, backup).await?;
            println!("{}", result.message.trim());
            result.success
        }
        PatchCommand::Tool { version } => {
            let available = manager.is_patch_tool_available(version.as_str())?;
            println!(
                "Patch utility for {} is {}",
                version,
                if available { "available" } else { "not available" }
            );
            available
        }
    };
    Ok(succeeded)
}

fn run_config(manager: &AcumaticaManager, command: ConfigCommand) -> anyhow::Result<bool> {
    match command {
        ConfigCommand::Show => {
            for key in Settings::KEYS {
                println!("{:<20} {}", key, manager.config_value(key)?);
            }
            println!("{:<20} {}", "DefaultSitePath", manager.default_site_install_path().display());
        }
        ConfigCommand::Get { key } => println!("{}", manager.config_value(&key)?),
        ConfigCommand::Set { key, value } => {
            manager.set_config_value(&key, &value)?;
            tracing::info!("{} set to {}", key, manager.config_value(&key)?);
        }
    }
    Ok(true)
}
