//! CLI Tooling
//!
//! Command-line interface over the compliance pipeline. `CliContext` runs
//! commands against whatever host, checkout, and operator it is given;
//! `run` wires up the `gh`/`git` backed ones for the binary.

use crate::compliance::evaluate;
use crate::config::{ConfigLoader, ConformerConfig};
use crate::error::{ConformError, Result};
use crate::logging::init_logging;
use crate::remediation::{scan, AutoApprove, Operator, Remediator};
use crate::remote::cache::{CacheStats, CachedHost};
use crate::remote::checkout::GitCheckout;
use crate::remote::gh::GhHost;
use crate::remote::{Checkout, RepositoryHost};
use crate::template::{Template, TemplateRegistry};
use crate::tooling::format;
use crate::tooling::prompt::PromptOperator;
use crate::types::RepoId;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Conformer CLI - template compliance for hosted repositories
#[derive(Parser, Debug)]
#[command(name = "conformer", version)]
#[command(about = "Check repositories against a template repository and open pull requests for missing files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Working directory; `conformer.toml` is read from here
    #[arg(long, default_value = ".", global = true)]
    pub workspace: PathBuf,

    /// Configuration file path, layered over the standard sources
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Template repository (owner/name), overriding `[template]`
    #[arg(long, global = true, value_parser = parse_repo)]
    pub template: Option<RepoId>,

    /// Disable the in-process cache of host lookups
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Inspect the template repository
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Report which template files a repository is missing
    Check {
        /// Repository to check (owner/name)
        #[arg(value_parser = parse_repo)]
        repo: RepoId,
        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Check every repository of a user or organization
    Scan {
        owner: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Open or update a pull request adding the missing files
    Remediate {
        /// Repository to remediate (owner/name)
        #[arg(value_parser = parse_repo)]
        repo: RepoId,
        /// Proceed at every confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Remediate every non-compliant repository of an owner
    Batch {
        owner: String,
        /// Proceed at every confirmation
        #[arg(long, short = 'y')]
        yes: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TemplateCommands {
    /// Print the template's directory structure
    Show {
        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Print the merged configuration as TOML
    Show,
}

fn parse_repo(s: &str) -> std::result::Result<RepoId, String> {
    s.parse::<RepoId>().map_err(|e| e.to_string())
}

impl Commands {
    /// Whether the command talks to the hosting service.
    pub fn needs_host(&self) -> bool {
        !matches!(self, Commands::Config { .. })
    }
}

impl Cli {
    /// Fold command line flags into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut ConformerConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
        if let Some(template) = &self.template {
            config.template.owner = template.owner.clone();
            config.template.name = template.name.clone();
        }
        if self.no_cache {
            config.host.cache = false;
        }
    }
}

/// Host adapter chosen by `[host] cache`.
enum HostHandle {
    Direct(GhHost),
    Cached(CachedHost<GhHost>),
}

/// `gh`/`git` backed collaborators for a process run.
pub struct GhServices {
    host: HostHandle,
    checkout: GitCheckout,
}

impl GhServices {
    pub fn from_config(config: &ConformerConfig, workspace_root: &std::path::Path) -> Result<Self> {
        let gh = GhHost::new(config.host.gh_binary.clone());
        let host = if config.host.cache {
            HostHandle::Cached(CachedHost::new(gh))
        } else {
            HostHandle::Direct(gh)
        };
        let checkout = GitCheckout::new(
            config.clone_root(workspace_root)?,
            config.host.gh_binary.clone(),
            config.host.git_binary.clone(),
            config.host.web_url.clone(),
        );
        Ok(Self { host, checkout })
    }

    pub fn host(&self) -> &dyn RepositoryHost {
        match &self.host {
            HostHandle::Direct(h) => h as &dyn RepositoryHost,
            HostHandle::Cached(h) => h as &dyn RepositoryHost,
        }
    }

    pub fn checkout(&self) -> &dyn Checkout {
        &self.checkout
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        match &self.host {
            HostHandle::Direct(_) => None,
            HostHandle::Cached(h) => Some(h.stats()),
        }
    }

    /// Fail early with a readable message when `gh` cannot act for anyone.
    pub fn ensure_authenticated(&self) -> Result<()> {
        let gh = match &self.host {
            HostHandle::Direct(h) => h,
            HostHandle::Cached(h) => h.inner(),
        };
        if gh.check_auth()? {
            Ok(())
        } else {
            Err(ConformError::ConfigError(
                "gh is not authenticated; run `gh auth login` first".to_string(),
            ))
        }
    }
}

/// Load configuration, install logging, and execute the parsed command.
pub fn run(cli: &Cli) -> Result<String> {
    let mut config = ConfigLoader::load(&cli.workspace, cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    init_logging(Some(&config.logging))?;

    let services = GhServices::from_config(&config, &cli.workspace)?;
    if cli.command.needs_host() {
        services.ensure_authenticated()?;
    }
    let prompt = PromptOperator;
    let context = CliContext::new(config, services.host(), services.checkout(), &prompt);
    let result = context.execute(&cli.command);
    if let Some(stats) = services.cache_stats() {
        debug!(hits = stats.hits, misses = stats.misses, "Host cache usage");
    }
    result
}

/// CLI context: configuration plus the collaborators commands run against.
pub struct CliContext<'a> {
    config: ConformerConfig,
    host: &'a dyn RepositoryHost,
    checkout: &'a dyn Checkout,
    /// Consulted at the confirmation gates unless `--yes` was given.
    operator: &'a dyn Operator,
    registry: TemplateRegistry,
}

impl<'a> CliContext<'a> {
    pub fn new(
        config: ConformerConfig,
        host: &'a dyn RepositoryHost,
        checkout: &'a dyn Checkout,
        operator: &'a dyn Operator,
    ) -> Self {
        Self {
            config,
            host,
            checkout,
            operator,
            registry: TemplateRegistry::new(),
        }
    }

    pub fn config(&self) -> &ConformerConfig {
        &self.config
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Template {
                command: TemplateCommands::Show { format },
            } => {
                let template = self.template()?;
                if format == "json" {
                    format::format_template_json(&template)
                } else {
                    format::format_template_text(&template, self.config.template.max_display_depth)
                }
            }
            Commands::Check { repo, format } => {
                let template = self.template()?;
                let report = evaluate(self.host, repo, &template)?;
                info!(repo = %repo, missing = report.missing_count, "Checked repository");
                if format == "json" {
                    format::format_report_json(&report)
                } else {
                    Ok(format::format_report_text(&report))
                }
            }
            Commands::Scan { owner, format } => {
                let template = self.template()?;
                let entries = scan(self.host, &template, owner)?;
                if format == "json" {
                    format::format_scan_json(&entries)
                } else {
                    Ok(format::format_scan_text(&entries))
                }
            }
            Commands::Remediate { repo, yes } => {
                let template = self.template()?;
                let run = self.remediator(*yes).remediate(&template, repo)?;
                Ok(format::format_run_text(&run))
            }
            Commands::Batch { owner, yes, format } => {
                let template = self.template()?;
                let report = self.remediator(*yes).remediate_batch(&template, owner)?;
                if format == "json" {
                    format::format_batch_json(&report)
                } else {
                    Ok(format::format_batch_text(&report))
                }
            }
            Commands::Config {
                command: ConfigCommands::Show,
            } => self.config.to_toml(),
        }
    }

    fn template(&self) -> Result<Arc<Template>> {
        self.registry
            .get_or_load(self.host, &self.config.template.repo())
    }

    fn remediator(&self, yes: bool) -> Remediator<'_> {
        let operator: &dyn Operator = if yes { &AutoApprove } else { self.operator };
        Remediator::new(
            self.host,
            self.checkout,
            operator,
            self.config.remediation_settings(),
        )
    }
}
