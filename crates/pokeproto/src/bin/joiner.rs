//! Joins a match: discovers a host, pairs with it and plays from standard
//! input.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use crossbeam_channel::unbounded;
use pokeproto::{
    bind_client, init_tracing, join_match, spawn_stdin_reader, BattleNotice, BattleResult, LocalSetup, MatchOptions,
    Overrides, PeerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "joiner", about = "Join a PokeProto battle", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trainer name sent in the handshake
    #[arg(short, long)]
    name: Option<String>,

    /// Port to bind (defaults to any free port)
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

    /// Host to join; the first to answer when omitted
    #[arg(long)]
    host: Option<String>,
}

fn run(args: Args) -> BattleResult<()> {
    let config = PeerConfig::load_or_default(args.config.as_deref())?.with_overrides(Overrides {
        name: args.name,
        port: args.port,
        verbose: args.verbose,
        pokemon: args.pokemon,
        attack_boosts: args.attack_boosts,
        defense_boosts: args.defense_boosts,
        mode: None,
    })?;
    init_tracing(config.verbose);

    let local = LocalSetup::new(config.name.clone(), config.battle.pokemon.clone(), config.boosts()?);
    let transport = bind_client(&config)?;
    println!("Looking for {} as {}...", args.host.as_deref().unwrap_or("a host"), config.name);

    let (notices, printed) = unbounded::<BattleNotice>();
    let printer = thread::spawn(move || {
        for notice in printed {
            println!("{notice}");
        }
    });

    let options = MatchOptions::new(spawn_stdin_reader()).with_notices(notices);
    let result = join_match(transport, &config, local, args.host.as_deref(), options);
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
            tracing::error!(error = %e, "joiner failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
