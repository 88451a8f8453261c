//! Hosts a match: advertises on the discovery port, pairs with the first
//! joiner and plays from standard input.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use crossbeam_channel::unbounded;
use pokeproto::{
    bind_host, host_match, init_tracing, spawn_stdin_reader, BattleNotice, BattleResult, LocalSetup, MatchOptions,
    Overrides, PeerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "host", about = "Host a PokeProto battle", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trainer name advertised to joiners
    #[arg(short, long)]
    name: Option<String>,

    /// Port to bind (defaults to the discovery range)
    #[arg(short, long)]
    port: Option<u16>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Combatant to bring
    #[arg(long)]
    pokemon: Option<String>,

    /// Special-attack boosts
    #[arg(long)]
    attack_boosts: Option<u8>,

    /// Special-defense boosts
    #[arg(long)]
    defense_boosts: Option<u8>,

    /// Spectator fan-out: P (peer-to-peer) or B (broadcast)
    #[arg(long)]
    mode: Option<String>,
}

fn run(args: Args) -> BattleResult<()> {
    let config = PeerConfig::load_or_default(args.config.as_deref())?.with_overrides(Overrides {
        name: args.name,
        port: args.port,
        verbose: args.verbose,
        pokemon: args.pokemon,
        attack_boosts: args.attack_boosts,
        defense_boosts: args.defense_boosts,
        mode: args.mode,
    })?;
    init_tracing(config.verbose);

    let local = LocalSetup::new(config.name.clone(), config.battle.pokemon.clone(), config.boosts()?);
    let transport = bind_host(&config)?;
    println!(
        "Hosting as {} with {} on {} (mode {})",
        config.name,
        local.pokemon,
        transport.local_addr(),
        config.communication_mode()?
    );
    println!("Moves: N or N! to boost, 'defend' to arm a defense boost, 'chat <text>', 'quit'");

    let (notices, printed) = unbounded::<BattleNotice>();
    let printer = thread::spawn(move || {
        for notice in printed {
            println!("{notice}");
        }
    });

    let options = MatchOptions::new(spawn_stdin_reader()).with_notices(notices);
    let result = host_match(transport, &config, local, options);
    let _ = printer.join();

    let outcome = result?;
    println!(
        "{} won after {} turns{}",
        outcome.winner,
        outcome.turns,
        if outcome.forfeit { " (forfeit)" } else { "" }
    );
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "host failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
