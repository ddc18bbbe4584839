use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tabgroups::actor::{self, broadcast::BroadcastEvent};
use tabgroups::common::config::{self, Config};
use tabgroups::common::log;
use tabgroups::model::{Group, GroupRegistry, PinTier, WindowRef};
use tabgroups::restore::{self, GroupSnapshot, RestoreMode};

#[derive(Parser)]
#[command(name = "tabgroups", about = "Inspect tab group sessions and settings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a saved session against a list of live windows and print the
    /// groups that would be restored.
    Restore {
        /// Session file written at quit.
        #[arg(long, value_name = "PATH")]
        snapshot: PathBuf,
        /// JSON array of live windows, frontmost first.
        #[arg(long, value_name = "PATH")]
        live: PathBuf,
        /// smart | always | off. Defaults to the configured mode.
        #[arg(long)]
        mode: Option<RestoreMode>,
        /// Also print the change notifications as JSON lines.
        #[arg(long)]
        events: bool,
    },
    /// Decode a session file and summarize it.
    Check {
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Config {
        /// Only report validation issues.
        #[arg(long)]
        validate: bool,
        /// Path to configuration file to use (overrides default).
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

fn main() {
    sigpipe::reset();
    log::init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Restore { snapshot, live, mode, events } => run_restore(&snapshot, &live, mode, events),
        Commands::Check { snapshot } => run_check(snapshot),
        Commands::Config { validate, config } => run_config(config, validate),
    };
    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(1);
        }
    }
}

fn default_session_file() -> anyhow::Result<PathBuf> {
    config::session_file().ok_or_else(|| anyhow!("Could not determine home directory"))
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path.or_else(config::config_file) {
        Some(path) => Config::read_or_default(&path).with_context(|| format!("reading {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn run_restore(snapshot: &Path, live: &Path, mode: Option<RestoreMode>, events: bool) -> anyhow::Result<bool> {
    let mode = match mode {
        Some(mode) => mode,
        None => load_config(None)?.session.restore_mode,
    };
    let Some(snapshots) = restore::load_session(snapshot)? else {
        println!("No pending session");
        return Ok(true);
    };
    let buf = fs::read_to_string(live).with_context(|| format!("reading {}", live.display()))?;
    let live_windows: Vec<WindowRef> =
        serde_json::from_str(&buf).with_context(|| format!("decoding {}", live.display()))?;

    let (events_tx, mut events_rx) = actor::channel::<BroadcastEvent>();
    let mut registry = GroupRegistry::with_events(events_tx);
    for group in restore::restore_pass(&snapshots, &live_windows, &registry.grouped_window_ids(), mode) {
        if group.install(&mut registry).is_none() {
            eprintln!("Skipped a restored group the registry rejected");
        }
    }

    let tree = ascii_tree::Tree::Node(
        format!("restored {} of {} groups ({mode})", registry.len(), snapshots.len()),
        registry.groups().map(group_tree).collect(),
    );
    let mut out = String::new();
    ascii_tree::write_tree(&mut out, &tree)?;
    print!("{out}");

    if events {
        for event in actor::drain(&mut events_rx) {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(true)
}

fn group_tree(group: &Group) -> ascii_tree::Tree {
    let title = match group.display_name() {
        Some(name) => format!("group {} \"{name}\"", group.id()),
        None => format!("group {}", group.id()),
    };
    let active = group.active_window().map(|w| w.id);
    let leaves = group
        .windows()
        .iter()
        .map(|w| {
            let marker = if Some(w.id) == active { "* " } else { "  " };
            let line = if w.is_separator {
                format!("{marker}{} ---", w.id)
            } else {
                format!("{marker}{}{} {}", w.id, pin_label(w.pin_tier), w.display_title())
            };
            ascii_tree::Tree::Leaf(vec![line])
        })
        .collect();
    ascii_tree::Tree::Node(title, leaves)
}

fn pin_label(tier: PinTier) -> &'static str {
    match tier {
        PinTier::None => "",
        PinTier::Normal => " [pinned]",
        PinTier::Super => " [super]",
    }
}

fn run_check(snapshot: Option<PathBuf>) -> anyhow::Result<bool> {
    let path = match snapshot {
        Some(path) => path,
        None => default_session_file()?,
    };
    let Some(snapshots) = restore::load_session(&path)? else {
        println!("No pending session in {}", path.display());
        return Ok(true);
    };
    let windows: usize = snapshots.iter().map(GroupSnapshot::managed_window_count).sum();
    println!("{} groups, {} windows", snapshots.len(), windows);
    for (i, snap) in snapshots.iter().enumerate() {
        let pinned = snap.windows.iter().filter(|w| w.is_pinned()).count();
        println!(
            "  {i}: {} windows, {pinned} pinned, active {}{}",
            snap.managed_window_count(),
            snap.active_index,
            snap.name.as_deref().map(|n| format!(", \"{n}\"")).unwrap_or_default()
        );
    }
    Ok(true)
}

fn run_config(path: Option<PathBuf>, validate: bool) -> anyhow::Result<bool> {
    let config = load_config(path)?;
    let issues = config.validate();
    if !validate {
        print!("{}", toml::to_string_pretty(&config)?);
    }
    if issues.is_empty() {
        if validate {
            println!("Config validation passed");
        }
        return Ok(true);
    }
    for issue in issues {
        eprintln!("{issue}");
    }
    Ok(false)
}
