use std::sync::Arc;

use seqcast_core::adaptive::VerificationController;
use seqcast_core::ledger::{PerformanceLedger, PredictionRecord};
use seqcast_core::spectral::CycleDetector;
use seqcast_core::{
    parse_sequence, ControllerState, CycleMethod, DeferredSpawner, InlineSpawner, Predictor,
    PredictorConfig, Session, Strategy, Symbol,
};

fn deferred_predictor(training: &str) -> (Predictor, Arc<DeferredSpawner>) {
    let spawner = Arc::new(DeferredSpawner::new());
    let predictor = Predictor::builder()
        .fixed_hour(15)
        .spawner(spawner.clone())
        .build(&parse_sequence(training).unwrap())
        .unwrap();
    (predictor, spawner)
}

/// Feed the opposite of every prediction so each verification misses.
fn feed_adversarial(predictor: &mut Predictor, rounds: usize) {
    let mut next = predictor
        .last_prediction()
        .map_or(Symbol::A, |p| p.symbol.inverted());
    for _ in 0..rounds {
        let prediction = predictor.predict_next(next);
        next = prediction.symbol.inverted();
    }
}

#[test]
fn test_sequence_grows_by_one_per_prediction() {
    let (mut predictor, _) = deferred_predictor("ABBABAABAB");
    for (i, symbol) in parse_sequence("ABBBABAAAB").unwrap().into_iter().enumerate() {
        predictor.predict_next(symbol);
        assert_eq!(predictor.sequence().len(), 10 + i + 1);
    }
    assert_eq!(predictor.prediction_count(), 10);
    assert!(predictor.transitions().transition_count() <= predictor.sequence().len() as u64 - 1);
}

#[test]
fn test_tiny_training_set_predicts_without_error() {
    let mut session = Session::default().with_spawner(Arc::new(DeferredSpawner::new()));
    session.train("AABAB").unwrap();
    let response = session.predict("A").unwrap();
    assert!((0.0..=1.0).contains(&response.confidence));
}

#[test]
fn test_alternating_sequence_has_period_two() {
    let seq = parse_sequence(&"AB".repeat(6)).unwrap();
    for method in [CycleMethod::Spectral, CycleMethod::Autocorrelation] {
        let estimate = CycleDetector::new(method, 10).estimate(&seq).unwrap();
        assert_eq!(estimate.period, 2, "{method:?}");
        assert_eq!(estimate.vote.symbol, Symbol::A);
        assert!(estimate.vote.confidence > 0.0);
    }
}

/// Feed every prediction back as the true symbol so each verification hits.
fn feed_cooperative_until_resumed(predictor: &mut Predictor, max_rounds: usize) -> usize {
    for round in 1..=max_rounds {
        let Some(last) = predictor.last_prediction() else {
            predictor.predict_next(Symbol::A);
            continue;
        };
        predictor.predict_next(last.symbol);
        if predictor.state() == ControllerState::Predicting {
            return round;
        }
    }
    max_rounds
}

#[test]
fn test_threshold_enters_waiting_exactly_once() {
    let (mut predictor, spawner) = deferred_predictor("AABBABABBBAABABA");
    // First call has nothing to verify; the next three miss.
    feed_adversarial(&mut predictor, 4);
    assert_eq!(predictor.state(), ControllerState::Waiting);
    assert_eq!(predictor.reanalysis_scheduled(), 1);

    // Error streak keeps growing past the threshold without re-entering.
    feed_adversarial(&mut predictor, 3);
    assert_eq!(predictor.consecutive_errors(), 6);
    assert_eq!(predictor.state(), ControllerState::Waiting);
    assert_eq!(predictor.reanalysis_scheduled(), 1);
    assert_eq!(spawner.pending(), 1);
    assert!(predictor.reanalysis_in_flight());

    assert_eq!(spawner.run_pending(), 1);
    assert_eq!(predictor.state(), ControllerState::Predicting);
    assert_eq!(predictor.consecutive_errors(), 0);
    assert!(!predictor.reanalysis_in_flight());

    let snapshot = predictor.snapshot();
    assert_eq!(snapshot.reanalysis_completed, 1);
    let report = snapshot.last_reanalysis.unwrap();
    assert_eq!(report.observations, 20);

    // A fresh episode schedules a fresh pass.
    feed_adversarial(&mut predictor, 3);
    assert_eq!(predictor.state(), ControllerState::Waiting);
    assert_eq!(predictor.reanalysis_scheduled(), 2);
}

#[test]
fn test_second_crossing_while_pass_queued_does_not_reschedule() {
    let (mut predictor, spawner) = deferred_predictor("AABBABABBBAABABA");
    feed_adversarial(&mut predictor, 4);
    assert_eq!(predictor.state(), ControllerState::Waiting);
    assert_eq!(predictor.reanalysis_scheduled(), 1);

    // 3 misses then 10 hits: 10/13 clears the 0.75 resume threshold.
    let rounds = feed_cooperative_until_resumed(&mut predictor, 30);
    assert_eq!(rounds, 10);
    assert_eq!(predictor.state(), ControllerState::Predicting);
    assert!(predictor.reanalysis_in_flight());
    assert_eq!(spawner.pending(), 1);

    // Crossing again while the first pass is still queued.
    feed_adversarial(&mut predictor, 3);
    assert_eq!(predictor.state(), ControllerState::Waiting);
    assert_eq!(predictor.reanalysis_scheduled(), 1);
    assert_eq!(spawner.pending(), 1);

    assert_eq!(spawner.run_pending(), 1);
    assert_eq!(predictor.state(), ControllerState::Predicting);
    assert!(!predictor.reanalysis_in_flight());
}

#[test]
fn test_inline_reanalysis_releases_before_returning() {
    let mut predictor = Predictor::builder()
        .fixed_hour(3)
        .spawner(Arc::new(InlineSpawner))
        .build(&parse_sequence("ABABBBAABA").unwrap())
        .unwrap();
    feed_adversarial(&mut predictor, 4);
    assert_eq!(predictor.reanalysis_scheduled(), 1);
    assert_eq!(predictor.state(), ControllerState::Predicting);
    assert_eq!(predictor.snapshot().reanalysis_completed, 1);
}

#[test]
fn test_resume_threshold_boundaries() {
    fn ledger_with(correct: usize) -> PerformanceLedger {
        let mut ledger = PerformanceLedger::new();
        for i in 0..20 {
            ledger.push(PredictionRecord::new(Symbol::A, 0.6, Strategy::Pattern));
            let actual = if i < correct { Symbol::A } else { Symbol::B };
            ledger.resolve_last(actual);
        }
        ledger
    }

    for (correct, resumes) in [(16, true), (14, false)] {
        let mut controller = VerificationController::from_config(&PredictorConfig::default());
        for _ in 0..3 {
            controller.record_miss();
        }
        assert_eq!(controller.state(), ControllerState::Waiting);

        let confidence = ledger_with(correct).recent_confidence(20);
        controller.record_hit(confidence);
        let expected = if resumes {
            ControllerState::Predicting
        } else {
            ControllerState::Waiting
        };
        assert_eq!(controller.state(), expected, "{correct}/20");
    }
}

#[test]
fn test_weights_after_calibration_sum_to_one() {
    let (mut predictor, _) = deferred_predictor("ABBABBABBABBABBABB");
    for symbol in parse_sequence("ABBABBABAABBA").unwrap() {
        predictor.predict_next(symbol);
        assert!((predictor.weights().sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_snapshot_serializes_strategy_keys() {
    let (mut predictor, _) = deferred_predictor("AABABBAB");
    predictor.predict_next(Symbol::B);
    let json = serde_json::to_value(predictor.snapshot()).unwrap();
    assert!(json["strategies"]["classifier"].is_object());
    assert_eq!(json["state"], "PREDICTING");
    assert_eq!(json["sequence_len"], 9);
}
