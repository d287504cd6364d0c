//! RoboWar headless CLI
//!
//! Runs a battle between reference robots and prints the results table.

use clap::Parser;
use robowar_core::{BattleConfig, BattleResults, EngineError};
use robowar_sim::{Battle, BotKind, ReplayRecorder};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit code for a battle stopped by the user.
const EXIT_STOPPED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "robowar")]
#[command(about = "Run a headless robot battle", long_about = None)]
struct Args {
    /// Comma-separated robot names (see --list); `name#2` fields a second copy
    #[arg(short, long, value_delimiter = ',')]
    robots: Vec<String>,

    /// Number of rounds
    #[arg(short = 'n', long)]
    rounds: Option<u32>,

    /// Turn ceiling per round
    #[arg(short = 't', long)]
    max_turns: Option<u64>,

    /// Arena width
    #[arg(long)]
    width: Option<f64>,

    /// Arena height
    #[arg(long)]
    height: Option<f64>,

    /// Master seed for determinism
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON battle configuration; flags override its fields
    #[arg(short, long)]
    config: Option<String>,

    /// Export the turn snapshots and results to a JSON replay file
    #[arg(long)]
    export: Option<String>,

    /// JSON results on stdout
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// List the available robots and exit
    #[arg(long)]
    list: bool,
}

/// Builds the battle configuration from the config file and flags.
fn build_config(args: &Args) -> Result<BattleConfig, EngineError> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| EngineError::config(format!("{}: {}", path, e)))?;
            BattleConfig::from_json(&json)?
        }
        None => BattleConfig::default(),
    };

    if !args.robots.is_empty() {
        config.roster = BattleConfig::with_robots(args.robots.iter().map(|r| r.trim().to_string())).roster;
    }
    if let Some(rounds) = args.rounds {
        config.rounds = rounds;
    }
    if let Some(max_turns) = args.max_turns {
        config.max_turns = max_turns;
    }
    if let Some(width) = args.width {
        config.arena_width = width;
    }
    if let Some(height) = args.height {
        config.arena_height = height;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    if config.roster.is_empty() {
        return Err(EngineError::config("no robots given (use --robots or --config)"));
    }
    Ok(config)
}

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose {
        "debug"
    } else if json {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn print_table(results: &BattleResults) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "{:<6} {:<18} {:>9} {:>8} {:>8} {:>8} {:>8} {:>4} {:>4} {:>4}",
        "Rank", "Robot", "Total", "Survival", "Bullet", "Ram", "Bonus", "1st", "2nd", "3rd"
    );
    for r in &results.robots {
        let c = &r.components;
        let bonus = c.last_survivor_bonus + c.bullet_kill_bonus + c.ram_kill_bonus;
        let marker = if r.disqualified { " (disqualified)" } else { "" };
        info!(
            "{:<6} {:<18} {:>9.1} {:>8.1} {:>8.1} {:>8.1} {:>8.1} {:>4} {:>4} {:>4}{}",
            r.placement,
            r.name,
            r.total_score,
            c.survival,
            c.bullet_damage,
            c.ram_damage,
            bonus,
            r.firsts,
            r.seconds,
            r.thirds,
            marker
        );
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

async fn run(args: Args) -> Result<i32, EngineError> {
    let config = build_config(&args)?;
    let recorder = args.export.as_ref().map(|_| ReplayRecorder::new(&config));

    let mut battle = Battle::with_bots(config)?;
    if let Some(recorder) = &recorder {
        battle = battle.with_sink(recorder.clone());
    }
    let token = battle.cancel_token();

    // Robots run on worker threads; the battle loop blocks between turns
    let mut handle = tokio::task::spawn_blocking(move || battle.run());
    let joined = tokio::select! {
        joined = &mut handle => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Stop requested, finishing the current turn");
            token.cancel();
            handle.await
        }
    };
    let results = joined.map_err(|e| EngineError::Sandbox(format!("battle task failed: {}", e)))??;

    if let (Some(recorder), Some(path)) = (&recorder, &args.export) {
        recorder.finalize(&results);
        recorder.write_to_file(path)?;
        info!("Replay with {} snapshots written to {}", recorder.frame_count(), path);
    }

    if args.json {
        let json = serde_json::to_string_pretty(&results).map_err(|e| EngineError::Export(e.to_string()))?;
        println!("{}", json);
    } else {
        print_table(&results);
    }

    Ok(if results.aborted { EXIT_STOPPED } else { 0 })
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.json);

    if args.list {
        for kind in BotKind::all() {
            println!("{:<14} {}", kind.name(), kind.description());
        }
        return;
    }

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            if e.is_config() {
                eprintln!("Available robots: {}", BotKind::all().iter().map(|k| k.name()).collect::<Vec<_>>().join(", "));
            }
            1
        }
    };
    std::process::exit(code);
}
