//! Integration tests for the step driver.
//!
//! Tests run the full pipeline (store → batteries → decisions → settlement →
//! persist) with deterministic decision makers and zero waits.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use agents::{Decision, DecisionMaker, DecisionSource, HouseholdSnapshot, MockDecisionMaker};
use async_trait::async_trait;
use simulation::{
    DatasetFeed, MetricsHook, RunMode, Simulation, SimulationConfig, SimulationError, StepOutcome,
};
use storage::{
    FallbackLogSink, JsonFileStore, LogKind, MemoryLogSink, MemoryStore, SqliteLogSink,
    WorldStore,
};
use serde_json::json;
use tokio::sync::watch;
use types::{AgentAction, Cash, GridStatus, Price, Role, SettlementAction, WorldState};

/// Producer donates during blackouts and offers P2P otherwise; consumer buys.
struct BlackoutDonor;

#[async_trait]
impl DecisionMaker for BlackoutDonor {
    fn name(&self) -> &str {
        "blackout-donor"
    }

    async fn produce(&self, snapshot: &HouseholdSnapshot) -> Decision {
        let action = match (snapshot.role, snapshot.grid_status) {
            (Role::Producer, GridStatus::Blackout) => AgentAction::DonateMasjid,
            (Role::Producer, GridStatus::Online) => AgentAction::OfferP2p,
            (Role::Consumer, _) => AgentAction::BuyP2p,
        };
        Decision::new(action, "scripted", DecisionSource::Mock)
    }
}

const DATASET: &str = "\
timestamp,grid_status,grid_price,peak_period,house_a_solar,house_a_load,house_b_solar,house_b_load
13:00:00,ON,38.0,OFF_PEAK,2.0,0.5,0.0,1.5
19:30:00,OFF,0,PEAK,1.5,0.3,0.0,2.5
";

fn dataset_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DATASET.as_bytes()).unwrap();
    file
}

fn memory_log() -> (Arc<MemoryLogSink>, FallbackLogSink) {
    let sink = Arc::new(MemoryLogSink::default());
    (sink.clone(), FallbackLogSink::new(sink))
}

fn settled(outcome: StepOutcome) -> Box<simulation::StepReport> {
    match outcome {
        StepOutcome::Settled(report) => report,
        other => panic!("expected a settled step, got {other:?}"),
    }
}

/// An empty store is reset first; the next step settles against the
/// initial world. At grid price 22 the P2P bands are empty, so both
/// households fall back to the grid.
#[tokio::test]
async fn test_missing_world_is_reset_then_stepped() {
    let store = Arc::new(MemoryStore::new());
    let (log, sink) = memory_log();
    let mut sim = Simulation::new(
        SimulationConfig::instant(),
        store.clone(),
        Arc::new(MockDecisionMaker),
        sink,
    )
    .unwrap();

    assert!(matches!(sim.step().await.unwrap(), StepOutcome::Reset));
    assert_eq!(sim.stats().resets, 1);
    assert_eq!(log.of_kind(LogKind::Reset).len(), 1);

    let report = settled(sim.step().await.unwrap());
    assert_eq!(report.producer.action, AgentAction::OfferP2p);
    assert_eq!(report.consumer.action, AgentAction::BuyP2p);
    assert_eq!(report.resolution.action, SettlementAction::GridToA);
    assert_eq!(log.of_kind(LogKind::Negotiation).len(), 1);
    assert_eq!(log.of_kind(LogKind::GridBuy).len(), 1);
    assert_eq!(log.of_kind(LogKind::Decision).len(), 2);

    let world = store.get_full_state().unwrap().unwrap();
    assert_eq!(world.house_a.wallet_balance, Cash::from_float(4995.6));
    assert_eq!(world.house_b.wallet_balance, Cash::from_float(1967.0));
    assert!((world.house_a.battery_level - 84.0).abs() < 1e-9);
    assert!((world.house_b.battery_level - 7.5).abs() < 1e-9);
    assert_eq!(world.house_a.last_action, AgentAction::OfferP2p);
    assert_eq!(world.house_b.agent_log, "Battery low, seeking P2P purchase");
    assert_eq!(world.controls.action, 3);
}

/// Replaying a daytime row then a blackout row yields a P2P trade and then
/// a masjid donation, after which the feed is exhausted and the loop ends.
#[tokio::test]
async fn test_replay_trade_then_donation() {
    let file = dataset_file();
    let feed = DatasetFeed::from_path(file.path()).unwrap();
    let store = Arc::new(MemoryStore::with_state(&WorldState::initial()).unwrap());
    let (log, sink) = memory_log();

    let mut sim = Simulation::new(
        SimulationConfig::instant().with_mode(RunMode::Replay),
        store.clone(),
        Arc::new(BlackoutDonor),
        sink,
    )
    .unwrap()
    .with_feed(feed);
    let metrics = Arc::new(MetricsHook::new());
    sim.add_hook(metrics.clone());

    let (_tx, rx) = watch::channel(false);
    let stats = sim.run(rx).await.unwrap();
    assert_eq!(stats.steps_completed, 2);
    assert_eq!(stats.last_action, Some(SettlementAction::AToMasjid));

    let snap = metrics.snapshot();
    assert_eq!(snap.count(SettlementAction::AToB), 1);
    assert_eq!(snap.count(SettlementAction::AToMasjid), 1);
    assert!((snap.p2p_kwh - 1.5).abs() < 1e-9);
    assert_eq!(snap.p2p_value, Cash::from_float(50.4));
    assert!((snap.donated_kwh - 1.2).abs() < 1e-9);

    let world = store.get_full_state().unwrap().unwrap();
    assert_eq!(world.simulation.clock, "19:30:00");
    assert_eq!(world.grid.status, GridStatus::Blackout);
    assert_eq!(world.grid.voltage, 0);
    // Trade: A +23.4, B -50.4. The donation moves no money.
    assert_eq!(world.house_a.wallet_balance, Cash::from_float(5023.4));
    assert_eq!(world.house_b.wallet_balance, Cash::from_float(1949.6));
    assert_eq!(world.market.transaction_price, Price::from_float(15.6));
    assert!(!world.market.active_contract);
    assert!((world.community.total_donated_kwh - 1.2).abs() < 1e-9);
    assert_eq!(world.controls.action, 2);
    assert_eq!(world.controls.action_label, "A_TO_MASJID");

    assert_eq!(log.of_kind(LogKind::Startup).len(), 1);
    assert_eq!(log.of_kind(LogKind::Transaction).len(), 1);
    assert_eq!(log.of_kind(LogKind::Charity).len(), 1);
}

/// Batteries move before settlement: the P2P shift lands on top of the
/// solar charge and the deficit discharge.
#[tokio::test]
async fn test_replay_battery_then_transfer() {
    let file = dataset_file();
    let store = Arc::new(MemoryStore::with_state(&WorldState::initial()).unwrap());
    let (_log, sink) = memory_log();
    let mut sim = Simulation::new(
        SimulationConfig::instant().with_mode(RunMode::Replay),
        store.clone(),
        Arc::new(MockDecisionMaker),
        sink,
    )
    .unwrap()
    .with_feed(DatasetFeed::from_path(file.path()).unwrap());

    let report = settled(sim.step().await.unwrap());
    assert_eq!(report.resolution.action, SettlementAction::AToB);
    // A: 85 + 7.5 - 15 ; B: 15 - 7.5 + 15
    assert!((report.world.house_a.battery_level - 77.5).abs() < 1e-9);
    assert!((report.world.house_b.battery_level - 22.5).abs() < 1e-9);
    let details = report.world.market.transaction_details.clone().unwrap();
    assert_eq!(details.agreed_price, Price::from_float(15.6));
    assert_eq!(details.buyer_payment, Cash::from_float(50.4));
}

#[tokio::test]
async fn test_replay_without_feed_is_rejected() {
    let (_log, sink) = memory_log();
    let mut sim = Simulation::new(
        SimulationConfig::instant().with_mode(RunMode::Replay),
        Arc::new(MemoryStore::new()),
        Arc::new(MockDecisionMaker),
        sink,
    )
    .unwrap();
    let (_tx, rx) = watch::channel(false);
    assert!(matches!(
        sim.run(rx).await,
        Err(SimulationError::MissingFeed)
    ));
}

#[tokio::test]
async fn test_step_limit_stops_live_loop() {
    let store = Arc::new(MemoryStore::with_state(&WorldState::initial()).unwrap());
    let (log, sink) = memory_log();
    let mut sim = Simulation::new(
        SimulationConfig::instant().with_max_steps(3),
        store,
        Arc::new(MockDecisionMaker),
        sink,
    )
    .unwrap();

    let (_tx, rx) = watch::channel(false);
    let stats = sim.run(rx).await.unwrap();
    assert_eq!(stats.steps_completed, 3);
    assert_eq!(stats.step_errors, 0);
    assert_eq!(log.of_kind(LogKind::Decision).len(), 6);
}

/// The inter-step wait is cut short by a shutdown signal.
#[tokio::test]
async fn test_shutdown_interrupts_delay() {
    let store = Arc::new(MemoryStore::with_state(&WorldState::initial()).unwrap());
    let (_log, sink) = memory_log();
    let mut sim = Simulation::new(
        SimulationConfig::instant().with_step_delay(Duration::from_secs(3600)),
        store,
        Arc::new(MockDecisionMaker),
        sink,
    )
    .unwrap();

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    let stats = tokio::time::timeout(Duration::from_secs(10), sim.run(rx))
        .await
        .expect("run should stop on shutdown")
        .unwrap();
    assert_eq!(stats.steps_completed, 1);
}

#[tokio::test]
async fn test_shutdown_before_start_runs_nothing() {
    let (_log, sink) = memory_log();
    let mut sim = Simulation::new(
        SimulationConfig::instant(),
        Arc::new(MemoryStore::new()),
        Arc::new(MockDecisionMaker),
        sink,
    )
    .unwrap();
    let (_tx, rx) = watch::channel(true);
    let stats = sim.run(rx).await.unwrap();
    assert_eq!(stats.steps_completed, 0);
}

/// File-backed store and SQLite log stream end to end.
#[tokio::test]
async fn test_file_store_and_sqlite_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::open(dir.path().join("world.json")).unwrap());
    let db = dir.path().join("logs.db");
    let sink = FallbackLogSink::new(SqliteLogSink::open(&db).unwrap());

    let mut sim = Simulation::new(
        SimulationConfig::instant().with_max_steps(2),
        store,
        Arc::new(MockDecisionMaker),
        sink,
    )
    .unwrap();
    let (_tx, rx) = watch::channel(false);
    let stats = sim.run(rx).await.unwrap();
    assert_eq!(stats.steps_completed, 2);
    assert_eq!(stats.resets, 1);

    let reopened = JsonFileStore::open(dir.path().join("world.json")).unwrap();
    let world = reopened.get_full_state().unwrap().unwrap();
    assert_eq!(world.controls.action, 3);

    let logs = SqliteLogSink::open(&db).unwrap();
    assert_eq!(logs.count(LogKind::Decision).unwrap(), 4);
    assert_eq!(logs.count(LogKind::Reset).unwrap(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Live inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Writes a new producer solar reading while the decision is in flight,
/// the way a sensor bridge would.
struct SolarSensorDuringDecision {
    sensor: Arc<dyn WorldStore>,
}

#[async_trait]
impl DecisionMaker for SolarSensorDuringDecision {
    fn name(&self) -> &str {
        "solar-sensor"
    }

    async fn produce(&self, snapshot: &HouseholdSnapshot) -> Decision {
        if snapshot.role == Role::Producer {
            self.sensor
                .set("house_a/solar_output", json!(3.3))
                .unwrap();
        }
        Decision::new(AgentAction::Hold, "waiting", DecisionSource::Mock)
    }
}

/// Inputs changed between steps drive the next settlement and are still in
/// the store afterwards.
async fn check_inputs_followed_between_steps(
    store: Arc<dyn WorldStore>,
    external: Arc<dyn WorldStore>,
) {
    store.reset().unwrap();
    let (_log, sink) = memory_log();
    let mut sim = Simulation::new(
        SimulationConfig::instant(),
        store.clone(),
        Arc::new(MockDecisionMaker),
        sink,
    )
    .unwrap();

    let first = settled(sim.step().await.unwrap());
    assert_eq!(first.resolution.action, SettlementAction::GridToA);

    let grid = json!({"status": "BLACKOUT", "voltage": 0});
    external
        .update("grid", grid.as_object().unwrap().clone())
        .unwrap();
    external.set("house_b/current_load", json!(3.0)).unwrap();

    // Blackout: the refused P2P falls through and the grid is unavailable.
    let second = settled(sim.step().await.unwrap());
    assert_eq!(second.world.grid.status, GridStatus::Blackout);
    assert_eq!(second.world.house_b.current_load, 3.0);
    assert_eq!(second.resolution.action, SettlementAction::Idle);

    let world = store.get_full_state().unwrap().unwrap();
    assert_eq!(world.grid.status, GridStatus::Blackout);
    assert_eq!(world.grid.voltage, 0);
    assert_eq!(world.house_b.current_load, 3.0);
    // 7.5% minus a 3 kW deficit over half an hour, clamped at empty.
    assert_eq!(world.house_b.battery_level, 0.0);
    assert!((world.house_a.battery_level - 83.0).abs() < 1e-9);
    assert_eq!(world.house_a.wallet_balance, Cash::from_float(4995.6));
    assert_eq!(world.house_b.wallet_balance, Cash::from_float(1967.0));
    assert_eq!(world.controls.action, 0);
}

/// An input written during the step is not reverted by the step's writes.
async fn check_mid_step_input_kept(store: Arc<dyn WorldStore>, sensor: Arc<dyn WorldStore>) {
    store.reset().unwrap();
    let (_log, sink) = memory_log();
    let mut sim = Simulation::new(
        SimulationConfig::instant(),
        store.clone(),
        Arc::new(SolarSensorDuringDecision { sensor }),
        sink,
    )
    .unwrap();

    // Settled against the inputs read at the start of the step.
    let report = settled(sim.step().await.unwrap());
    assert_eq!(report.resolution.action, SettlementAction::GridToA);

    let world = store.get_full_state().unwrap().unwrap();
    assert_eq!(world.house_a.solar_output, 3.3);
    assert_eq!(world.house_a.wallet_balance, Cash::from_float(4995.6));
    assert!((world.house_a.battery_level - 84.0).abs() < 1e-9);
    assert_eq!(world.house_a.last_action, AgentAction::Hold);
}

#[tokio::test]
async fn test_live_inputs_followed_memory_store() {
    let store: Arc<dyn WorldStore> = Arc::new(MemoryStore::new());
    check_inputs_followed_between_steps(store.clone(), store).await;
}

#[tokio::test]
async fn test_live_inputs_followed_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.json");
    let driver: Arc<dyn WorldStore> = Arc::new(JsonFileStore::open(&path).unwrap());
    let bridge: Arc<dyn WorldStore> = Arc::new(JsonFileStore::open(&path).unwrap());
    check_inputs_followed_between_steps(driver, bridge).await;
}

#[tokio::test]
async fn test_mid_step_input_kept_memory_store() {
    let store: Arc<dyn WorldStore> = Arc::new(MemoryStore::new());
    check_mid_step_input_kept(store.clone(), store).await;
}

#[tokio::test]
async fn test_mid_step_input_kept_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.json");
    let driver: Arc<dyn WorldStore> = Arc::new(JsonFileStore::open(&path).unwrap());
    let sensor: Arc<dyn WorldStore> = Arc::new(JsonFileStore::open(&path).unwrap());
    check_mid_step_input_kept(driver, sensor).await;
}
