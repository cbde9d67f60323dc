//! Trellis CLI - validate and exercise route manifests from the command line
//!
//! Without `--config` the built-in cluster console manifest is used.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use trellis_core::{NodeId, RouteManifest, RouteTree, StackSnapshot};
use trellis_router::{Navigator, Router, RouterConfig, TransitionReport};

mod script;

use script::Step;

/// Cluster console routes shipped with the binary
const BUILTIN_MANIFEST: &str = include_str!("../routes/console.toml");

/// Trellis - hierarchical route/state resolution for single-page applications
#[derive(Parser)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Route manifest (TOML)
    #[arg(short, long, global = true, env = "TRELLIS_MANIFEST")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and validate the manifest, then print the route tree
    Check,

    /// List qualified state names
    States {
        /// Only list states matching this glob (e.g. "admin.*")
        #[arg(short, long)]
        pattern: Option<String>,
    },

    /// Run a navigation script and print every transition
    Navigate {
        /// Steps: /path, @state[=json] or !event[=json][#owner:view]
        #[arg(required = true)]
        steps: Vec<String>,

        /// Print reports and the final stack as JSON lines
        #[arg(long)]
        json: bool,

        /// Maximum redirect hops while settling a target
        #[arg(long, default_value = "16")]
        max_redirects: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    let manifest = load_manifest(cli.config.as_deref())?;

    match cli.command {
        Commands::Check => check(manifest)?,
        Commands::States { pattern } => list_states(manifest, pattern.as_deref())?,
        Commands::Navigate {
            steps,
            json,
            max_redirects,
        } => {
            let config = RouterConfig {
                name: "trellis-cli".to_string(),
                max_redirects,
                ..RouterConfig::default()
            };
            navigate(manifest, config, &steps, json).await?;
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }

    Ok(())
}

fn load_manifest(path: Option<&Path>) -> Result<RouteManifest> {
    match path {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read manifest {}", path.display()))?;
            RouteManifest::from_toml(&source)
                .with_context(|| format!("Failed to parse manifest {}", path.display()))
        }
        None => {
            debug!("using built-in cluster console manifest");
            RouteManifest::from_toml(BUILTIN_MANIFEST).context("Built-in manifest is invalid")
        }
    }
}

// ============================================================================
// check / states
// ============================================================================

fn check(manifest: RouteManifest) -> Result<()> {
    let controllers = manifest.referenced_controllers();
    let (tree, _) = manifest.build().context("Route tree is invalid")?;

    for node in tree.iter() {
        let indent = "  ".repeat(node.depth());
        let mut line = format!("{}{} {}", indent, node.name().bold(), node.pattern());

        if let Some(child) = node.default_child() {
            line.push_str(&format!(" (default {})", tree.node(child).name()).dimmed().to_string());
        }
        if let Some(target) = node.redirect() {
            line.push_str(&format!(" -> {}", target).yellow().to_string());
        }
        if let Some(connect) = node.connect() {
            line.push_str(&format!(" [{}.{}]", connect.controller, connect.outlet).cyan().to_string());
        }
        let events: Vec<&str> = node.event_names().collect();
        if !events.is_empty() {
            line.push_str(&format!(" on {}", events.join(", ")).green().to_string());
        }
        println!("{}", line);
    }

    println!(
        "{} {} states, {} controllers",
        "OK".green().bold(),
        tree.len(),
        controllers.len()
    );
    Ok(())
}

fn list_states(manifest: RouteManifest, pattern: Option<&str>) -> Result<()> {
    let (tree, _) = manifest.build().context("Route tree is invalid")?;

    for node in tree.iter() {
        let name = node.qualified_name();
        if pattern.map_or(true, |p| glob_match::glob_match(p, name)) {
            println!("{:<40} {}", name, full_pattern(&tree, node.id()));
        }
    }
    Ok(())
}

/// The URL pattern of a state, from the root
fn full_pattern(tree: &RouteTree, id: NodeId) -> String {
    let segments: Vec<String> = tree
        .ancestry(id)
        .into_iter()
        .flat_map(|node| tree.node(node).pattern().segments().to_vec())
        .map(|segment| segment.to_string())
        .collect();
    format!("/{}", segments.join("/"))
}

// ============================================================================
// navigate
// ============================================================================

async fn navigate(
    manifest: RouteManifest,
    config: RouterConfig,
    steps: &[String],
    json: bool,
) -> Result<()> {
    let steps = script::parse_steps(steps)?;
    let (tree, controllers) = manifest.build().context("Route tree is invalid")?;

    let (navigator, handle) = Navigator::spawn(Router::with_config(tree, controllers, config));
    let mut reports = navigator.subscribe();

    let mut failed = 0;
    for step in &steps {
        if !json {
            println!("{} {}", "STEP".cyan().bold(), step.to_string().yellow());
        }
        match run_step(&navigator, step).await {
            Ok(true) => {}
            Ok(false) => {
                if !json {
                    println!("  {}", "not handled".dimmed());
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("  {} {}", "ERROR".red().bold(), e);
            }
        }
        drain_reports(&mut reports, json)?;
    }

    if let Err(e) = navigator.settle().await {
        failed += 1;
        eprintln!("{} {}", "ERROR".red().bold(), e);
    }
    drain_reports(&mut reports, json)?;

    let snapshot = navigator.snapshot().await?;
    print_final(&snapshot, json)?;

    drop(navigator);
    handle.await.context("Navigator task failed")?;

    if failed > 0 {
        bail!("{} of {} steps failed", failed, steps.len());
    }
    Ok(())
}

/// Run one step; `false` means an event nobody handled
async fn run_step(navigator: &Navigator, step: &Step) -> trellis_router::Result<bool> {
    match step {
        Step::Navigate { path } => navigator.navigate(path).await.map(|_| true),
        Step::Transition { state, context } => navigator
            .transition_to(state, context.clone())
            .await
            .map(|_| true),
        Step::Dispatch { event, .. } => {
            let context = step.event_context().unwrap_or_default();
            navigator.dispatch(event, context).await
        }
    }
}

fn drain_reports(
    reports: &mut broadcast::Receiver<TransitionReport>,
    json: bool,
) -> Result<()> {
    loop {
        match reports.try_recv() {
            Ok(report) => print_report(&report, json)?,
            Err(TryRecvError::Lagged(missed)) => warn!(missed, "transition reports dropped"),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}

fn print_report(report: &TransitionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    println!(
        "  {} {}",
        format!("#{}", report.generation).dimmed(),
        report.target.yellow()
    );
    if !report.exited.is_empty() {
        println!("    {} {}", "exit ".red(), report.exited.join(", "));
    }
    if !report.entered.is_empty() {
        println!("    {} {}", "enter".green(), report.entered.join(", "));
    }
    if !report.deferred.is_empty() {
        println!("    {} {}", "defer".cyan(), report.deferred.len());
    }
    println!("    {} {}", "stack".bold(), report.stack);
    Ok(())
}

fn print_final(snapshot: &StackSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    println!("{} {}", "FINAL".green().bold(), snapshot);
    for entry in &snapshot.states {
        let mut line = format!("  {}", entry.state);
        if !entry.params.is_empty() {
            line.push_str(&format!(" {}", serde_json::to_string(&entry.params)?));
        }
        if let Some(outlet) = &entry.outlet {
            line.push_str(&format!(" [{}]", outlet).cyan().to_string());
        }
        println!("{}", line);
    }
    Ok(())
}
