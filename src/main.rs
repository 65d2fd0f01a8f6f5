//! tesselbox - a deterministic hexagonal side-view sandbox
//!
//! Runs a world headless for a fixed number of ticks, or serves it to an
//! external renderer over the JSON-lines bridge.

mod bridge;
mod config;
mod game;
mod input;
mod scripted_input;

use anyhow::{Context, Result};
use clap::Parser;
use config::{GameConfig, DEFAULT_CONFIG_PATH};
use game::{Game, GameMode, Intent, DEFAULT_WORLD_NAME};
use input::NoInput;
use scripted_input::ScriptedInputPlayer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Ticks a headless run lasts without `--ticks` or a script.
const DEFAULT_HEADLESS_TICKS: u64 = 600;

#[derive(Debug, Parser)]
#[command(name = "tesselbox", version, about)]
struct Cli {
    /// Config file (TOML). Missing or invalid files fall back to defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// World to load, or create when it has never been saved.
    #[arg(long, default_value = DEFAULT_WORLD_NAME)]
    world: String,
    /// Seed for a newly created world.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    creative: bool,
    /// Override the saves directory from the config.
    #[arg(long)]
    saves: Option<PathBuf>,
    /// Serve the bridge instead of running headless. Without a value the
    /// configured address is used.
    #[arg(long, value_name = "ADDR")]
    bridge: Option<Option<String>>,
    /// Headless run length.
    #[arg(long)]
    ticks: Option<u64>,
    /// JSON input script for headless runs.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Save the world and player before exiting.
    #[arg(long)]
    save_on_exit: bool,
}

fn main() -> Result<()> {
    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting tesselbox v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut config = GameConfig::load_from_path(&cli.config);
    if let Some(saves) = &cli.saves {
        config.saves_dir = saves.clone();
    }
    let bridge_addr = cli
        .bridge
        .clone()
        .map(|addr| addr.unwrap_or_else(|| config.bridge_addr.clone()));

    let catalog = Arc::new(config.load_catalog()?);
    let mut game = Game::new(config, catalog)?;

    match bridge_addr {
        Some(addr) => run_bridge(&mut game, &addr)?,
        None => run_headless(&mut game, &cli)?,
    }

    if cli.save_on_exit && game.session().is_some() {
        game.back_to_menu().context("saving on exit")?;
        info!("Saved on exit");
    }
    Ok(())
}

fn run_bridge(game: &mut Game, addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid bridge address `{addr}`"))?;
    let handle = bridge::BridgeServer::start(addr)
        .with_context(|| format!("binding bridge on {addr}"))?;
    println!("bridge listening on {}", handle.local_addr);
    bridge::serve(game, &handle.endpoint)
}

fn run_headless(game: &mut Game, cli: &Cli) -> Result<()> {
    let mode = if cli.creative {
        GameMode::Creative
    } else {
        GameMode::Survival
    };
    game.start(mode, &cli.world, cli.seed)?;

    let mut script = cli
        .script
        .as_deref()
        .map(ScriptedInputPlayer::from_path)
        .transpose()
        .context("loading input script")?;
    let max_ticks = cli.ticks.unwrap_or(match script {
        Some(_) => u64::MAX,
        None => DEFAULT_HEADLESS_TICKS,
    });

    for _ in 0..max_ticks {
        match script.as_mut() {
            Some(script) => {
                let Some((keys, intent)) = script.advance() else {
                    break;
                };
                game.tick(&keys, intent);
            }
            None => {
                game.tick(&NoInput, Intent::default());
            }
        }
    }

    if script.as_ref().is_some_and(|script| !script.finished()) {
        info!("Tick budget ran out before the input script finished");
    }

    if let Some(session) = game.session() {
        let summary = serde_json::json!({
            "world": session.name,
            "seed": session.world.seed(),
            "tick": game.tick_count().0,
            "player": session.player.position.to_array(),
            "on_ground": session.player.on_ground,
            "resident_chunks": session.world.resident_chunk_count(),
            "organisms": session.world.organisms().count(),
        });
        println!("{summary}");
    }
    Ok(())
}
