//! MetricsHook - aggregates settlement statistics over a run.

use std::sync::atomic::{AtomicU64, Ordering};

use agents::Decision;
use parking_lot::Mutex;
use sim_core::{Resolution, SettlementEvent, SettlementKind};
use types::{Cash, SettlementAction};

use crate::hooks::{HookContext, StepHook};

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Settlements observed.
    pub steps: u64,
    /// Count per action code, indexed by code (0..=4).
    pub action_counts: [u64; 5],
    /// Peer trades that were eligible but did not close on price.
    pub negotiation_refusals: u64,
    /// Peer trades that were eligible but too small.
    pub undersized_trades: u64,
    /// Decisions that came from a fallback path.
    pub fallback_decisions: u64,
    /// Energy moved peer-to-peer.
    pub p2p_kwh: f64,
    /// Buyer payments across all peer trades.
    pub p2p_value: Cash,
    /// Energy donated during the run.
    pub donated_kwh: f64,
}

impl MetricsSnapshot {
    pub fn count(&self, action: SettlementAction) -> u64 {
        self.action_counts[usize::from(action.code())]
    }
}

#[derive(Debug, Default)]
struct Totals {
    action_counts: [u64; 5],
    p2p_kwh: f64,
    p2p_value: Cash,
    donated_kwh: f64,
}

/// Built-in hook collecting settlement metrics.
#[derive(Debug, Default)]
pub struct MetricsHook {
    steps: AtomicU64,
    refusals: AtomicU64,
    undersized: AtomicU64,
    fallbacks: AtomicU64,
    totals: Mutex<Totals>,
}

impl MetricsHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let totals = self.totals.lock();
        MetricsSnapshot {
            steps: self.steps.load(Ordering::Relaxed),
            action_counts: totals.action_counts,
            negotiation_refusals: self.refusals.load(Ordering::Relaxed),
            undersized_trades: self.undersized.load(Ordering::Relaxed),
            fallback_decisions: self.fallbacks.load(Ordering::Relaxed),
            p2p_kwh: totals.p2p_kwh,
            p2p_value: totals.p2p_value,
            donated_kwh: totals.donated_kwh,
        }
    }
}

impl StepHook for MetricsHook {
    fn name(&self) -> &str {
        "Metrics"
    }

    fn on_decisions(&self, producer: Decision, consumer: Decision, _ctx: &HookContext) {
        let n = u64::from(producer.is_fallback()) + u64::from(consumer.is_fallback());
        self.fallbacks.fetch_add(n, Ordering::Relaxed);
    }

    fn on_settlement(&self, resolution: Resolution, _ctx: &HookContext) {
        self.steps.fetch_add(1, Ordering::Relaxed);
        for event in &resolution.events {
            match event {
                SettlementEvent::NegotiationFailed(_) => {
                    self.refusals.fetch_add(1, Ordering::Relaxed);
                }
                SettlementEvent::TradeTooSmall { .. } => {
                    self.undersized.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let mut totals = self.totals.lock();
        totals.action_counts[usize::from(resolution.action.code())] += 1;
        if let Some(trade) = resolution.transaction() {
            totals.p2p_kwh += trade.kwh;
            totals.p2p_value += trade.buyer_payment;
        }
        if resolution.kind == SettlementKind::Donation {
            totals.donated_kwh += resolution
                .mutations
                .iter()
                .map(|m| match m {
                    sim_core::Mutation::Donate { kwh } => *kwh,
                    _ => 0.0,
                })
                .sum::<f64>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agents::DecisionSource;
    use sim_core::{Mutation, Refusal};
    use types::{AgentAction, Price, WorldState};

    fn ctx() -> HookContext {
        HookContext::new(1, WorldState::initial())
    }

    #[test]
    fn test_counts_actions_and_donations() {
        let hook = MetricsHook::new();
        hook.on_settlement(Resolution::idle(), &ctx());
        hook.on_settlement(
            Resolution::new(
                SettlementAction::AToMasjid,
                SettlementKind::Donation,
                vec![Mutation::Donate { kwh: 1.2 }],
                "donation",
            ),
            &ctx(),
        );

        let snap = hook.snapshot();
        assert_eq!(snap.steps, 2);
        assert_eq!(snap.count(SettlementAction::Idle), 1);
        assert_eq!(snap.count(SettlementAction::AToMasjid), 1);
        assert!((snap.donated_kwh - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_counts_refusals_and_fallbacks() {
        let hook = MetricsHook::new();
        let mut res = Resolution::idle();
        res.events.push(SettlementEvent::NegotiationFailed(Refusal::NoOverlap {
            seller_bid: Price::from_float(12.0),
            buyer_bid: Price::from_float(11.5),
        }));
        hook.on_settlement(res, &ctx());

        let fallback = Decision::new(AgentAction::Hold, "err", DecisionSource::ErrorFallback);
        let ok = Decision::new(AgentAction::BuyP2p, "ok", DecisionSource::Oracle);
        hook.on_decisions(fallback, ok, &ctx());

        let snap = hook.snapshot();
        assert_eq!(snap.negotiation_refusals, 1);
        assert_eq!(snap.fallback_decisions, 1);
    }
}
