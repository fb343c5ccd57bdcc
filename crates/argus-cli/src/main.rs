mod config;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use argus_client::{ProxyFetcher, SiteAdapter, SiteConfig, builtin_sites, find_site};
use argus_core::pipeline::Pipeline;
use argus_core::proxy::ProxyRotator;

use crate::config::RunConfig;
use crate::sink::CsvSink;

#[derive(Parser)]
#[command(name = "argus", version, about = "Multi-source fundraising-campaign profile aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every source, reconcile duplicates, and export one CSV
    Run {
        /// Path to the JSON run configuration (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Newline-delimited host:port:user:pass proxy pool
        #[arg(short, long, env = "ARGUS_PROXIES")]
        proxies: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "profiles.csv")]
        out: PathBuf,

        /// Restrict the run to these site ids (default: all built-ins)
        #[arg(long)]
        site: Vec<String>,
    },

    /// List the built-in site adapters
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("argus=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            proxies,
            out,
            site,
        } => cmd_run(config.as_deref(), &proxies, &out, &site).await,
        Commands::Sources => {
            for site in builtin_sites() {
                println!("{} ({} seed listing(s))", site.id, site.seeds.len());
            }
            Ok(())
        }
    }
}

async fn cmd_run(
    config_path: Option<&std::path::Path>,
    proxies: &std::path::Path,
    out: &std::path::Path,
    sites: &[String],
) -> Result<()> {
    let run_config = match config_path {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    // Fatal startup checks: proxy pool and site selection.
    let rotator = Arc::new(ProxyRotator::from_file(proxies)?);
    let selected = select_sites(sites)?;

    let fetcher = ProxyFetcher::with_timeout(run_config.fetch_timeout());
    let mut pipeline = Pipeline::new(
        run_config.fetch_config(),
        run_config.reconcile_config(),
        rotator,
        CsvSink::new(out),
    );

    for site in selected {
        let adapter = SiteAdapter::new(site, fetcher.clone())?;
        pipeline.collect(adapter).await?;
    }

    let report = pipeline.finish()?;
    println!(
        "Wrote {} canonical records ({} fetched) to {}",
        report.written,
        report.fetched,
        out.display()
    );
    Ok(())
}

fn select_sites(ids: &[String]) -> Result<Vec<&'static SiteConfig>> {
    if ids.is_empty() {
        return Ok(builtin_sites().iter().collect());
    }
    ids.iter()
        .map(|id| {
            find_site(id).with_context(|| format!("Unknown site '{id}'. Try `argus sources`."))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_sites_defaults_to_all_builtins() {
        let selected = select_sites(&[]).unwrap();
        assert_eq!(selected.len(), builtin_sites().len());
    }

    #[test]
    fn select_sites_filters_and_rejects_unknown() {
        let selected = select_sites(&["icodrops".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "icodrops");

        assert!(select_sites(&["bogus".to_string()]).is_err());
    }
}
