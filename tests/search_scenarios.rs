use chess::{ChessMove, Color};
use chess_move_learner::{
    move_from_id, simulate, LearnerConfig, LearnerSession, MoveSource, OfflineOracle,
    OpponentOracle, OracleError, Outcome, Position, PositionKey, SimulationSettings,
    StatisticsStore, Strategy, TacticalAnalyzer, TacticalTrace, Verdict,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

/// Oracle whose engine died: every request errors
struct BrokenPipeOracle;

impl OpponentOracle for BrokenPipeOracle {
    fn name(&self) -> &str {
        "broken"
    }

    fn best_reply(
        &mut self,
        _position: &Position,
        _budget: Duration,
    ) -> Result<ChessMove, OracleError> {
        Err(OracleError::CommunicationError("broken pipe".to_string()))
    }
}

fn seeded_config(depth_cap: u32, seed: u64) -> LearnerConfig {
    LearnerConfig {
        depth_cap,
        seed: Some(seed),
        ..LearnerConfig::default()
    }
}

fn session(
    fen: &str,
    learner: Color,
    config: LearnerConfig,
    store: StatisticsStore,
) -> LearnerSession {
    LearnerSession::new(
        Position::from_fen(fen).unwrap(),
        learner,
        config,
        Box::new(OfflineOracle),
        store,
    )
    .unwrap()
}

#[test]
fn test_single_attempt_from_start_records_one_game() {
    let mut session = session(
        "start",
        Color::White,
        seeded_config(200, 2024),
        StatisticsStore::in_memory(),
    );

    let report = session.find_move(1);
    assert_eq!(report.attempts.len(), 1);

    let store = session.into_store();
    assert_eq!(store.position_count(), 1);
    let records = store.records(&report.key).unwrap();
    assert_eq!(records.len(), 1);
    let record = records.values().next().unwrap();
    assert_eq!(record.wins + record.draws + record.losses, 1);
    assert_eq!(record.results.len(), 1);
    assert!(record.results[0].move_count <= 200);
}

#[test]
fn test_forced_mate_ranked_first_and_found() {
    let fen = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";
    let position = Position::from_fen(fen).unwrap();

    let attacks = TacticalAnalyzer::new(Color::White).rank_attacks(&position);
    assert_eq!(attacks[0].chess_move, move_from_id("h5f7").unwrap());
    assert!(attacks[0].priority >= 10_000);

    let mut session = session(
        fen,
        Color::White,
        seeded_config(200, 5),
        StatisticsStore::in_memory(),
    );
    assert_eq!(session.analyze().strategy, Strategy::Checkmate);

    let report = session.find_move(5);
    assert!(report.found_win());
    let recommendation = report.recommendation.unwrap();
    assert_eq!(recommendation.notation, "Qxf7#");
    assert_eq!(recommendation.source, MoveSource::Priority);
    assert!(report.attempts.len() <= 5);

    // The mating capture is the first move, so it adds nothing to the tactical totals
    let record = session.store().record(&report.key, "h5f7").unwrap();
    assert_eq!(record.wins, 1);
    assert_eq!(record.total_captures, 0);
    assert_eq!(record.results[0].tactical_info.checks_given, 0);
    assert!((record.score() - 11_500.0).abs() < 1e-9);
}

#[test]
fn test_failing_oracle_still_terminates() {
    let settings = SimulationSettings {
        depth_cap: 80,
        ..SimulationSettings::default()
    };
    let mut oracle = BrokenPipeOracle;

    for seed in 0..5 {
        let mut rng = StdRng::seed_from_u64(seed);
        let result = simulate(
            &Position::default(),
            move_from_id("g1f3").unwrap(),
            Color::White,
            &mut oracle,
            &settings,
            &mut rng,
        );
        assert!(result.ply_count >= 1 && result.ply_count <= 80);
        assert!(result.trace.termination.is_some());
        assert!(matches!(
            result.outcome,
            Outcome::Win | Outcome::Draw | Outcome::Loss
        ));
    }

    let mut session = LearnerSession::new(
        Position::default(),
        Color::White,
        seeded_config(40, 9),
        Box::new(BrokenPipeOracle),
        StatisticsStore::in_memory(),
    )
    .unwrap();
    let report = session.find_move(3);
    assert!(!report.attempts.is_empty());
    assert!(report.attempts.iter().all(|a| a.plies <= 40));
}

#[test]
fn test_defending_ignores_memorised_draw() {
    // White king in check from an undefended rook
    let fen = "4k3/8/8/8/8/8/4r3/4K3 w - - 0 1";
    let position = Position::from_fen(fen).unwrap();
    let key = PositionKey::encode(&position, Color::White);

    let mut store = StatisticsStore::in_memory();
    store.record_outcome(&key, "e1d1", "Kd1", Outcome::Draw, 60, TacticalTrace::default());

    let mut session = session(fen, Color::White, seeded_config(200, 3), store);
    let report = session.find_move(1);

    assert_eq!(report.analysis.strategy, Strategy::Defend);
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.attempts[0].move_id, "e1e2");
    assert_eq!(report.attempts[0].source, MoveSource::Priority);

    // Capturing the rook leaves bare kings
    let recommendation = report.recommendation.unwrap();
    assert_eq!(recommendation.move_id, "e1e2");
    assert_eq!(recommendation.verdict, Verdict::Draw);
}

#[test]
fn test_session_can_move_between_positions() {
    let mut session = session(
        "start",
        Color::White,
        seeded_config(30, 77),
        StatisticsStore::in_memory(),
    );
    let start_key = session.position_key();
    session.find_move(2);

    let black_to_move =
        Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
    assert!(session.set_position(black_to_move.clone(), Color::White).is_err());
    session.set_position(black_to_move, Color::Black).unwrap();
    assert_ne!(session.position_key(), start_key);

    session.find_move(2);
    assert_eq!(session.store().position_count(), 2);
}
