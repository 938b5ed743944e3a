use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use shaker::error::short_hash;
use shaker::{LinkMode, ManifestParser, Outcome, Shaker, ShakerConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shaker")]
#[command(author, version, long_about = None)]
#[command(about = "Resolve and vendor formulas from git repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve all requirements and rebuild the namespace directory
    Install {
        /// Project root containing formula-requirements.txt
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Copy payloads instead of symlinking them
        #[arg(long)]
        copy: bool,

        /// Don't let root manifest pins override nested requirements
        #[arg(long)]
        no_override: bool,

        /// Print the install report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the requirements of a manifest without touching mirrors
    Requirements {
        /// Project root containing formula-requirements.txt
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Manifest to read (defaults to the root manifest)
        manifest: Option<PathBuf>,
    },

    /// Show the directory layout used for a project
    Paths {
        /// Project root containing formula-requirements.txt
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    init_colors();

    match cli.command {
        Commands::Install {
            root,
            copy,
            no_override,
            json,
        } => {
            let mut config = ShakerConfig::from_env(root)?;
            if copy {
                config.link_mode = LinkMode::Copy;
            }
            if no_override {
                config.override_from_top_level = false;
            }
            install(config, json)?;
        }
        Commands::Requirements { root, manifest } => {
            requirements(ShakerConfig::from_env(root)?, manifest)?;
        }
        Commands::Paths { root } => {
            paths(&ShakerConfig::from_env(root)?);
        }
    }

    Ok(())
}

fn install(config: ShakerConfig, json: bool) -> Result<()> {
    let report = Shaker::new(config)
        .install()
        .context("Formula installation failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for formula in &report.formulas {
        let status = match formula.outcome {
            Outcome::Installed => "✓".green(),
            Outcome::AlreadySatisfied => "=".dimmed(),
            Outcome::Overridden => "↑".yellow(),
        };
        let mut notes = Vec::new();
        if formula.fetched {
            notes.push("fetched");
        }
        if formula.outcome == Outcome::Overridden {
            notes.push("pinned by project");
        }

        println!(
            "  {} {} {} <{}>{}",
            status,
            formula.name.bold(),
            formula.revision.cyan(),
            short_hash(&formula.hash),
            if notes.is_empty() {
                String::new()
            } else {
                format!(" ({})", notes.join(", ")).dimmed().to_string()
            }
        );
    }

    println!();
    println!(
        "{} {} formulas in {} ({} fetched, {} checked out)",
        "==>".bold().green(),
        report.resolved.len().to_string().bold(),
        report.namespace_dir.display().to_string().cyan(),
        report.fetch_count(),
        report.checkout_count()
    );

    Ok(())
}

fn requirements(config: ShakerConfig, manifest: Option<PathBuf>) -> Result<()> {
    let root_manifest = config.root_manifest();
    let path = manifest.unwrap_or_else(|| root_manifest.clone());
    let parser = ManifestParser::new(root_manifest, config.default_revision);

    let requirements = parser.parse_file(&path)?;
    if requirements.is_empty() {
        println!("No requirements in {}", path.display());
        return Ok(());
    }

    for req in requirements {
        let revision = if req.explicit_revision {
            req.revision.cyan().to_string()
        } else {
            format!("{} (default)", req.revision).dimmed().to_string()
        };
        println!("{} {} {}", req.name.bold(), revision, req.url.dimmed());
    }

    Ok(())
}

fn paths(config: &ShakerConfig) {
    println!("{}", "==> Layout".bold().green());
    println!(
        "  {}: {}",
        "Root manifest".dimmed(),
        config.root_manifest().display().to_string().cyan()
    );
    println!(
        "  {}: {}",
        "Mirrors".dimmed(),
        config.mirrors_path().display().to_string().cyan()
    );
    println!(
        "  {}: {}",
        "Namespace".dimmed(),
        config.namespace_path().display().to_string().cyan()
    );
    println!(
        "  {}: {}",
        "Link mode".dimmed(),
        match config.link_mode {
            LinkMode::Symlink => "symlink",
            LinkMode::Copy => "copy",
        }
    );
}

/// NO_COLOR wins, then CLICOLOR_FORCE, then CLICOLOR=0, then TTY detection
fn init_colors() {
    let var = |key: &str| std::env::var(key).ok();

    let enabled = if var("NO_COLOR").is_some() {
        false
    } else if var("CLICOLOR_FORCE").is_some_and(|v| v != "0") {
        true
    } else if var("CLICOLOR").is_some_and(|v| v == "0") {
        false
    } else {
        std::io::IsTerminal::is_terminal(&std::io::stdout())
    };
    colored::control::set_override(enabled);
}
