//! The step driver.

use std::sync::Arc;

use agents::{Decision, DecisionMaker, DecisionSource, HouseholdSnapshot};
use serde::Serialize;
use serde_json::json;
use sim_core::{Resolution, SettlementEngine, SettlementEvent, SettlementKind};
use storage::{FallbackLogSink, LogKind, StoreError, WorldStore};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use types::{HouseholdId, SettlementAction, WorldState};

use crate::config::{RunMode, SimulationConfig};
use crate::dataset::DatasetFeed;
use crate::error::SimulationError;
use crate::hooks::{HookContext, HookRunner, StepHook};

/// Counters over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub steps_completed: u64,
    pub resets: u64,
    pub step_errors: u64,
    pub last_action: Option<SettlementAction>,
}

/// Everything one completed step produced.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: u64,
    pub producer: Decision,
    pub consumer: Decision,
    pub resolution: Resolution,
    /// World after settlement (and after the contract flag was cleared).
    pub world: WorldState,
}

#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Step ran to completion.
    Settled(Box<StepReport>),
    /// World was missing or corrupt and has been reset; no step ran.
    Reset,
    /// Replay dataset has no rows left.
    Exhausted,
}

/// Drives the world forward one step at a time.
pub struct Simulation {
    config: SimulationConfig,
    engine: SettlementEngine,
    store: Arc<dyn WorldStore>,
    producer_agent: Arc<dyn DecisionMaker>,
    consumer_agent: Arc<dyn DecisionMaker>,
    log: FallbackLogSink,
    feed: Option<DatasetFeed>,
    hooks: HookRunner,
    stats: SimulationStats,
}

impl Simulation {
    /// Build a driver using `agent` for both households.
    pub fn new(
        config: SimulationConfig,
        store: Arc<dyn WorldStore>,
        agent: Arc<dyn DecisionMaker>,
        log: FallbackLogSink,
    ) -> Result<Self, SimulationError> {
        let engine = SettlementEngine::new(config.engine.clone())?;
        Ok(Self {
            config,
            engine,
            store,
            producer_agent: agent.clone(),
            consumer_agent: agent,
            log,
            feed: None,
            hooks: HookRunner::new(),
            stats: SimulationStats::default(),
        })
    }

    /// Use a separate decision maker per household.
    pub fn with_agents(
        mut self,
        producer: Arc<dyn DecisionMaker>,
        consumer: Arc<dyn DecisionMaker>,
    ) -> Self {
        self.producer_agent = producer;
        self.consumer_agent = consumer;
        self
    }

    /// Attach the replay feed.
    pub fn with_feed(mut self, feed: DatasetFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn add_hook(&mut self, hook: Arc<dyn StepHook>) {
        self.hooks.add(hook);
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn store(&self) -> &Arc<dyn WorldStore> {
        &self.store
    }

    // =========================================================================
    // Step
    // =========================================================================

    /// Run one step: inputs → batteries → decisions → settlement → persist.
    pub async fn step(&mut self) -> Result<StepOutcome, SimulationError> {
        // Phase 1: Load the world, resetting it if unusable
        let mut world = match self.store.get_full_state() {
            Ok(Some(world)) => world,
            Ok(None) => return self.recover_world("missing world state").await,
            Err(StoreError::Corrupt(reason)) => return self.recover_world(&reason).await,
            Err(e) => return Err(e.into()),
        };

        // Phase 2: Apply replay inputs
        if self.config.mode == RunMode::Replay {
            let feed = self.feed.as_mut().ok_or(SimulationError::MissingFeed)?;
            let Some(row) = feed.next_row() else {
                return Ok(StepOutcome::Exhausted);
            };
            row.apply(&mut world);
            self.persist("simulation", &world.simulation);
            self.persist("grid", &world.grid);
            for id in [HouseholdId::HouseA, HouseholdId::HouseB] {
                let house = world.household(id);
                self.persist_fields(
                    id.key(),
                    json!({
                        "solar_output": house.solar_output,
                        "current_load": house.current_load,
                    }),
                );
            }
        }

        let step = self.stats.steps_completed + 1;
        debug!(step, clock = %world.simulation.clock, grid = %world.grid.status, "step start");
        self.hooks
            .on_step_start(&HookContext::new(step, world.clone()));

        // Phase 3: Battery dynamics for both households
        for id in [HouseholdId::HouseA, HouseholdId::HouseB] {
            let level = self.engine.battery().step(world.household_mut(id));
            self.persist(&format!("{}/battery_level", id.key()), &level);
        }

        // Phase 4: Decisions, issued concurrently against the same snapshot
        let producer_snapshot = HouseholdSnapshot::from_world(&world, HouseholdId::HouseA);
        let consumer_snapshot = HouseholdSnapshot::from_world(&world, HouseholdId::HouseB);
        let (producer, consumer) = tokio::join!(
            self.producer_agent.produce(&producer_snapshot),
            self.consumer_agent.produce(&consumer_snapshot),
        );
        for (id, decision) in [(HouseholdId::HouseA, &producer), (HouseholdId::HouseB, &consumer)] {
            self.record_decision(&mut world, id, decision);
        }
        self.hooks
            .on_decisions(&producer, &consumer, &HookContext::new(step, world.clone()));

        // Phase 5: Settlement
        let resolution = self
            .engine
            .resolve_step(&world, producer.action, consumer.action);
        for event in &resolution.events {
            self.log_event(event);
        }
        resolution.apply(&mut world);

        self.persist_settlement(&world);
        self.log_settlement(&resolution);
        info!(
            step,
            clock = %world.simulation.clock,
            action = %resolution.action,
            "{}",
            resolution.summary
        );
        self.hooks
            .on_settlement(&resolution, &HookContext::new(step, world.clone()));

        // Phase 6: Hold the contract signal, then clear it
        if resolution.action == SettlementAction::AToB {
            sleep(self.config.settlement_pause).await;
            world.market.active_contract = false;
            self.persist("market/active_contract", &false);
        }

        self.stats.steps_completed = step;
        self.stats.last_action = Some(resolution.action);

        Ok(StepOutcome::Settled(Box::new(StepReport {
            step,
            producer,
            consumer,
            resolution,
            world,
        })))
    }

    // =========================================================================
    // Loop
    // =========================================================================

    /// Step until interrupted, the dataset runs out, or `max_steps` is hit.
    ///
    /// A failed step is logged and the loop carries on. Setting `shutdown`
    /// to `true` stops the loop between steps and cuts the inter-step wait
    /// short; an in-flight step is allowed to finish.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SimulationStats, SimulationError> {
        if self.config.mode == RunMode::Replay && self.feed.is_none() {
            return Err(SimulationError::MissingFeed);
        }

        let mode = match self.config.mode {
            RunMode::Live => "live",
            RunMode::Replay => "replay",
        };
        info!(
            mode,
            producer = self.producer_agent.name(),
            consumer = self.consumer_agent.name(),
            delay_secs = self.config.step_delay.as_secs_f64(),
            "simulation starting"
        );
        self.log.emit(
            "system",
            LogKind::Startup,
            format!(
                "Echo-Grid started in {mode} mode (agents: {} / {})",
                self.producer_agent.name(),
                self.consumer_agent.name()
            ),
        );

        loop {
            if *shutdown.borrow() {
                info!("shutdown requested");
                break;
            }
            if self
                .config
                .max_steps
                .is_some_and(|max| self.stats.steps_completed >= max)
            {
                info!(steps = self.stats.steps_completed, "step limit reached");
                break;
            }

            match self.step().await {
                Ok(StepOutcome::Settled(_)) => {}
                Ok(StepOutcome::Reset) => continue,
                Ok(StepOutcome::Exhausted) => {
                    info!("dataset exhausted");
                    break;
                }
                Err(e) => {
                    self.stats.step_errors += 1;
                    error!(error = %e, "step failed");
                    self.log
                        .emit("system", LogKind::Error, format!("Loop error: {e}"));
                }
            }

            tokio::select! {
                _ = sleep(self.config.step_delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        self.hooks.on_simulation_end(&self.stats);
        Ok(self.stats.clone())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn recover_world(&mut self, reason: &str) -> Result<StepOutcome, SimulationError> {
        warn!(reason, "world state unusable, resetting");
        self.log.emit(
            "system",
            LogKind::Warning,
            format!("Missing world state ({reason}). Resetting simulation..."),
        );
        self.store.reset()?;
        self.log
            .emit("system", LogKind::Reset, "World reset to initial state");
        self.stats.resets += 1;
        sleep(self.config.reset_pause).await;
        Ok(StepOutcome::Reset)
    }

    fn record_decision(&self, world: &mut WorldState, id: HouseholdId, decision: &Decision) {
        let house = world.household_mut(id);
        house.last_action = decision.action;
        house.agent_log = decision.rationale.clone();
        self.persist_fields(
            id.key(),
            json!({
                "last_action": decision.action,
                "agent_log": decision.rationale,
            }),
        );

        let agent = id.key();
        let kind = match decision.source {
            DecisionSource::Oracle | DecisionSource::Mock => LogKind::Decision,
            DecisionSource::Malformed | DecisionSource::QuotaFallback => LogKind::Warning,
            DecisionSource::ErrorFallback => LogKind::Error,
        };
        self.log.emit(
            agent,
            kind,
            format!("{} | {}", decision.action, decision.rationale),
        );
    }

    fn log_event(&self, event: &SettlementEvent) {
        let message = match event {
            SettlementEvent::TradeTooSmall { volume_kwh } => {
                format!("P2P skipped: {volume_kwh:.2} kWh is below the minimum trade")
            }
            SettlementEvent::NegotiationFailed(refusal) => {
                format!("Negotiation failed: {refusal}")
            }
        };
        debug!("{message}");
        self.log.emit("market", LogKind::Negotiation, message);
    }

    fn log_settlement(&self, resolution: &Resolution) {
        let kind = match resolution.kind {
            SettlementKind::PeerTrade => LogKind::Transaction,
            SettlementKind::Donation => LogKind::Charity,
            SettlementKind::GridPurchase => LogKind::GridBuy,
            SettlementKind::GridSale => LogKind::GridSell,
            SettlementKind::Idle => LogKind::Idle,
        };
        self.log.emit("market", kind, resolution.summary.clone());
    }

    /// Write back only the fields settlement owns. Inputs (solar, load, grid,
    /// clock) are left to whoever wrote them, even if they changed mid-step.
    fn persist_settlement(&self, world: &WorldState) {
        for id in [HouseholdId::HouseA, HouseholdId::HouseB] {
            let house = world.household(id);
            self.persist_fields(
                id.key(),
                json!({
                    "battery_level": house.battery_level,
                    "wallet_balance": house.wallet_balance,
                }),
            );
        }
        let market = &world.market;
        self.persist_fields(
            "market",
            json!({
                "active_contract": market.active_contract,
                "transaction_price": market.transaction_price,
                "latest_transaction": market.latest_transaction,
                "transaction_details": market.transaction_details,
            }),
        );
        self.persist(
            "community/total_donated_kwh",
            &world.community.total_donated_kwh,
        );
        self.persist("controls", &world.controls);
    }

    /// Best-effort write: failures are logged and the step continues.
    fn persist<T: Serialize + ?Sized>(&self, path: &str, value: &T) {
        let result = serde_json::to_value(value)
            .map_err(StoreError::from)
            .and_then(|value| self.store.set(path, value));
        if let Err(e) = result {
            self.write_failed(path, &e);
        }
    }

    fn persist_fields(&self, path: &str, fields: serde_json::Value) {
        let serde_json::Value::Object(fields) = fields else {
            return;
        };
        if let Err(e) = self.store.update(path, fields) {
            self.write_failed(path, &e);
        }
    }

    fn write_failed(&self, path: &str, e: &StoreError) {
        warn!(path, error = %e, "store write failed");
        self.log.emit(
            "system",
            LogKind::Error,
            format!("Store write to {path} failed: {e}"),
        );
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field("hooks", &self.hooks)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Resolves once `shutdown` turns true; never if the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
