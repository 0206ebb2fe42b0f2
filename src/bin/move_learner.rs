use chess::Color;
use chess_move_learner::report::{
    analysis_summary, attempt_line, detailed_statistics, move_sequences, position_banner,
    recommendation_line,
};
use chess_move_learner::{
    LearnerConfig, LearnerSession, OfflineOracle, OpponentOracle, Position, StatisticsStore,
    StockfishOracle,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Learn a move for a chess position by simulated play",
    long_about = None
)]
struct Args {
    /// Starting position as FEN, or "start"
    #[arg(long, default_value = "start")]
    pos: String,

    /// Side to play: w, b, white or black
    #[arg(long = "as", default_value = "w", value_parser = parse_color)]
    play_as: Color,

    /// Maximum plies per simulated game [default: 200]
    #[arg(long)]
    depth: Option<u32>,

    /// Number of simulations to run [default: 50]
    #[arg(long)]
    strength: Option<u32>,

    /// Path to the UCI opponent engine [default: stockfish]
    #[arg(long)]
    stockfish: Option<String>,

    /// Move memory file [default: chess_memory.json]
    #[arg(long)]
    memory: Option<PathBuf>,

    /// Seed for reproducible playouts
    #[arg(long)]
    seed: Option<u64>,

    /// JSON configuration file; flags above override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_color(raw: &str) -> Result<Color, String> {
    match raw.to_ascii_lowercase().as_str() {
        "w" | "white" => Ok(Color::White),
        "b" | "black" => Ok(Color::Black),
        other => Err(format!("expected w, b, white or black, got '{}'", other)),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => LearnerConfig::from_json_file(path)?,
        None => LearnerConfig::default(),
    };
    if let Some(depth) = args.depth {
        config.depth_cap = depth;
    }
    if let Some(strength) = args.strength {
        config.max_attempts = strength;
    }
    if let Some(engine_path) = args.stockfish {
        config.oracle.engine_path = engine_path;
    }
    if let Some(memory) = args.memory {
        config.memory_path = memory;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;

    let position = match Position::from_fen(&args.pos) {
        Ok(position) => position,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", position_banner(&position, args.play_as, &config));

    let oracle: Box<dyn OpponentOracle> = match StockfishOracle::new(config.oracle.clone()) {
        Ok(engine) => Box::new(engine),
        Err(e) => {
            warn!(error = %e, "opponent engine unavailable");
            println!("Warning: {}. Opponent replies will be random moves.", e);
            Box::new(OfflineOracle)
        }
    };

    let store = StatisticsStore::open(&config.memory_path);
    let max_attempts = config.max_attempts;

    let mut session = match LearnerSession::new(position, args.play_as, config, oracle, store) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Opponent: {}", session.oracle_name());

    let report = session.find_move(max_attempts);

    println!();
    println!("{}", analysis_summary(&report.analysis, session.position()));
    println!();
    for attempt in &report.attempts {
        println!("{}", attempt_line(attempt, max_attempts));
    }

    if let Some(recommendation) = &report.recommendation {
        if let Some(record) = session.store().record(&report.key, &recommendation.move_id) {
            println!();
            println!("{}", move_sequences(record));
        }
    }

    println!();
    println!(
        "{}",
        detailed_statistics(session.store(), &report.key, session.position())
    );
    println!();
    println!("{}", recommendation_line(report.recommendation.as_ref()));

    Ok(())
}
