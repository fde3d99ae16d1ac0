//! Permscope - Permission Scope Lookup
//!
//! Resolves the permission scopes required to call API urls, using the
//! configured permissions dataset.
//!
//! ## Configuration
//!
//! - `PERMSCOPE_CONFIG` - Path to the TOML config file (default: permscope.toml)
//! - `RUST_LOG` - Log filter (default: the configured level)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use permscope_permissions::{
    FileContentProvider, IndexCache, ScopeRequest, ScopeResolver, ScopeType,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

mod config;

use config::PermscopeConfig;

/// Permscope CLI
#[derive(Parser)]
#[command(name = "permscope")]
#[command(about = "Resolve the permission scopes required by API requests")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "permscope.toml", env = "PERMSCOPE_CONFIG")]
    config: PathBuf,

    /// Override the dataset root directory
    #[arg(long, env = "PERMSCOPE_DATA_ROOT")]
    data_root: Option<PathBuf>,

    /// Locale of the scope descriptions
    #[arg(long)]
    locale: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the scopes required by one or more urls
    Scopes {
        /// Request url (repeatable)
        #[arg(short, long = "url", required = true)]
        urls: Vec<String>,

        /// Application, DelegatedWork or DelegatedPersonal
        #[arg(short = 't', long)]
        scope_type: Option<ScopeType>,

        /// HTTP verb
        #[arg(long, default_value = "GET")]
        verb: String,

        /// Include hidden scopes
        #[arg(long)]
        include_hidden: bool,

        /// Report only least-privilege scopes
        #[arg(long)]
        least_privilege: bool,
    },

    /// Show which template a url matches
    Match {
        #[arg(short, long)]
        url: String,
    },

    /// Build the index and report dataset health
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PermscopeConfig::load_or_default(&cli.config)?;
    if let Some(root) = cli.data_root.clone() {
        config.dataset.root = root;
    }

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { config.logging.level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(config = ?cli.config, root = %config.dataset.root.display(), "configuration loaded");

    let provider = Arc::new(FileContentProvider::new(config.dataset.root.clone()));
    let cache = Arc::new(IndexCache::new());
    let resolver = ScopeResolver::new(config.resolver_config(), provider, cache);
    let locale = cli.locale.as_deref();

    let output = match cli.command {
        Command::Scopes {
            urls,
            scope_type,
            verb,
            include_hidden,
            least_privilege,
        } => {
            let mut request = ScopeRequest::new(urls)
                .with_verb(verb)
                .include_hidden(include_hidden)
                .least_privilege_only(least_privilege);
            request.scope_type = scope_type;

            let result = resolver
                .get_scopes(locale, &request)
                .await
                .context("Failed to resolve scopes")?;
            serde_json::to_value(&result)?
        }
        Command::Match { url } => {
            let index = resolver.index(locale).await.context("Failed to load permissions")?;
            match index.match_url(&url)? {
                Some(matched) => json!({
                    "url": url,
                    "template": index.declared_template(&matched),
                    "bindings": matched.bindings,
                }),
                None => json!({ "url": url, "template": null }),
            }
        }
        Command::Check => {
            let index = resolver.index(locale).await.context("Failed to load permissions")?;
            for skipped in index.parse_errors() {
                warn!(entry = %skipped.entry, "{}", skipped.message);
            }
            json!({
                "templates": index.len(),
                "empty": index.is_empty(),
                "skipped": index.parse_errors(),
                "buildMillis": index.build_duration().as_millis() as u64,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
