//! Watches a match through its host. Lines typed on standard input are sent
//! as chat; `quit` stops watching.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use crossbeam_channel::unbounded;
use pokeproto::{
    bind_client, init_tracing, spawn_stdin_reader, spectate, BattleResult, Overrides, PeerConfig, SpectatorEvent,
};

#[derive(Parser, Debug)]
#[command(name = "spectator", about = "Watch a PokeProto battle", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name shown on chat lines
    #[arg(short, long)]
    name: Option<String>,

    /// Port to bind (defaults to any free port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Host to watch; the first to answer when omitted
    #[arg(long)]
    host: Option<String>,
}

fn run(args: Args) -> BattleResult<()> {
    let config = PeerConfig::load_or_default(args.config.as_deref())?.with_overrides(Overrides {
        name: args.name,
        port: args.port,
        verbose: args.verbose,
        ..Overrides::default()
    })?;
    init_tracing(config.verbose);

    let transport = bind_client(&config)?;
    println!("Looking for {} to watch...", args.host.as_deref().unwrap_or("a host"));

    let (events, printed) = unbounded::<SpectatorEvent>();
    let printer = thread::spawn(move || {
        for event in printed {
            println!("{event}");
        }
    });

    let result = spectate(
        transport,
        &config,
        args.host.as_deref(),
        spawn_stdin_reader(),
        Some(events),
    );
    let _ = printer.join();

    let view = result?;
    if let Some((winner, loser)) = view.result() {
        println!("{winner} defeated {loser} in {} turns", view.turns_reported());
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "spectator failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
