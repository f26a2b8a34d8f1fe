use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

use sitepress::{SiteBuilder, SiteConfig};

#[derive(Parser)]
#[command(name = "sitepress", version, about = "Minimal static site generator")]
struct Cli {
    /// Path to the site configuration file
    #[arg(short, long, default_value = "site.toml", global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site
    Build {
        /// Override the configured source directory
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Override the configured output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of parallel jobs (defaults to the CPU count)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Remove the output directory
    Clean,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut config = SiteConfig::from_path(&cli.config)?;

    match cli.command {
        Command::Build {
            source,
            output,
            jobs,
        } => {
            if let Some(source) = source {
                config.source_dirs = vec![source];
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            let mut builder = SiteBuilder::new(config);
            if let Some(jobs) = jobs {
                builder.set_parallel_jobs(jobs);
            }
            let stats = builder.build()?;
            println!(
                "Built {} page(s) from {} content file(s), {} asset(s) copied, {} warning(s) in {:.2?}",
                stats.pages_emitted,
                stats.files_loaded,
                stats.assets_copied,
                stats.warnings,
                stats.build_time
            );
        }
        Command::Clean => {
            SiteBuilder::new(config).clean()?;
            println!("Output directory removed");
        }
    }

    Ok(())
}
