mod bridge;
mod engine;
mod error;
mod host_io;
mod sprite;
mod stage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use native32_core::Native32Container;

use engine::Engine;
use host_io::NullHost;

/// Parses a Native32 container and optionally runs its scheduler headlessly.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the container file.
    input: PathBuf,

    /// Run the scheduler for N ticks with a no-op host instead of just
    /// loading the container.
    #[arg(long)]
    ticks: Option<u64>,

    /// Print the parsed header and table sizes instead of (or in addition
    /// to) running ticks.
    #[arg(long)]
    dump: bool,
}

fn run(args: Args) -> Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let container = Native32Container::parse(bytes)
        .with_context(|| format!("parsing {}", args.input.display()))?;

    if args.dump {
        let header = &container.header;
        println!("colorspace     = {:?}", header.colorspace);
        println!("generator      = {}", header.generator);
        println!("resolution     = {}x{}", header.cursor_width, header.cursor_height);
        println!("frame_tbl      = {:#x}", header.frame_tbl);
        println!("image_tbl      = {:#x}", header.image_tbl);
        println!("action_tbl     = {:#x}", header.action_tbl);
        println!("movie_tbl      = {:#x}", header.movie_tbl);
        println!("button_tbl     = {:#x}", header.button_tbl);
        println!("button_cond_tbl= {:#x}", header.button_cond_tbl);
    }

    if let Some(ticks) = args.ticks {
        let container = Arc::new(container);
        let host = NullHost::new(8);
        let mut engine = Engine::new(container, host);
        for _ in 0..ticks {
            engine.tick().context("running scheduler tick")?;
        }
        log::info!("ran {ticks} ticks");
    }

    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(args) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
