//! Built-in settlement rules, in their default evaluation order.

use types::{AgentAction, HouseholdId, Role, SettlementAction, TransactionDetails};

use crate::settlement::{
    Mutation, Resolution, SettlementEvent, SettlementKind, SettlementRule, StepContext,
};

/// Peer trade, then donation, then grid.
pub fn default_rules() -> Vec<Box<dyn SettlementRule>> {
    vec![
        Box::new(PeerTradeRule),
        Box::new(DonationRule),
        Box::new(GridRule),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Peer-to-peer trade
// ─────────────────────────────────────────────────────────────────────────────

/// Producer battery energy sold to the consumer at a negotiated price.
///
/// Eligible when the producer offers energy, the consumer wants to buy, the
/// producer battery is above the trade floor and the consumer is in deficit.
/// Too-small volumes and failed negotiations fall through.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerTradeRule;

impl SettlementRule for PeerTradeRule {
    fn name(&self) -> &'static str {
        "peer_trade"
    }

    fn evaluate(
        &self,
        ctx: &StepContext<'_>,
        events: &mut Vec<SettlementEvent>,
    ) -> Option<Resolution> {
        let producer = ctx.world.producer();
        let consumer = ctx.world.consumer();

        let eligible = ctx.producer_intent.offers_energy()
            && ctx.consumer_intent == AgentAction::BuyP2p
            && producer.battery_level > ctx.config.trade_battery_floor
            && ctx.net_consumer() < 0.0;
        if !eligible {
            return None;
        }

        let spare = ctx
            .battery
            .spare_energy_kwh(producer.battery_level, ctx.config.battery_reserve_percent);
        let volume = consumer
            .deficit_kw()
            .min(spare)
            .min(ctx.config.max_trade_kwh);
        if volume < ctx.config.min_trade_kwh {
            events.push(SettlementEvent::TradeTooSmall { volume_kwh: volume });
            return None;
        }

        let grid_price = ctx.world.grid.price_per_unit;
        let seller = ctx
            .negotiator
            .negotiate(grid_price, Role::Producer, producer.battery_level);
        let buyer = ctx
            .negotiator
            .negotiate(grid_price, Role::Consumer, consumer.battery_level);

        let deal = match ctx.negotiator.resolve(&seller, &buyer, volume) {
            Ok(deal) => deal,
            Err(refusal) => {
                events.push(SettlementEvent::NegotiationFailed(refusal));
                return None;
            }
        };

        let details = TransactionDetails {
            seller: HouseholdId::HouseA,
            buyer: HouseholdId::HouseB,
            kwh: deal.kwh,
            grid_price: deal.grid_price,
            seller_bid: deal.seller_bid,
            buyer_bid: deal.buyer_bid,
            agreed_price: deal.agreed_price,
            buyer_cost_per_unit: deal.buyer_cost_per_unit,
            seller_revenue: deal.seller_revenue,
            buyer_payment: deal.buyer_payment,
            seller_profit_per_unit: deal.seller_profit_per_unit,
            seller_profit_total: deal.seller_profit_total,
            buyer_savings_per_unit: deal.buyer_savings_per_unit,
            buyer_savings_total: deal.buyer_savings_total,
        };
        let summary = format!(
            "P2P: {:.2} kWh A->B @ {}/kWh (+{} rent) | seller +{}, buyer -{}",
            deal.kwh,
            deal.agreed_price,
            ctx.negotiator.transmission_rent(),
            deal.seller_revenue,
            deal.buyer_payment,
        );

        Some(Resolution::new(
            SettlementAction::AToB,
            SettlementKind::PeerTrade,
            vec![
                Mutation::Credit {
                    house: HouseholdId::HouseA,
                    amount: deal.seller_revenue,
                },
                Mutation::Debit {
                    house: HouseholdId::HouseB,
                    amount: deal.buyer_payment,
                },
                Mutation::ShiftBattery {
                    from: HouseholdId::HouseA,
                    to: HouseholdId::HouseB,
                    percent: ctx.battery.kwh_to_percent(deal.kwh),
                },
                Mutation::RecordTrade(details),
            ],
            summary,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Donation
// ─────────────────────────────────────────────────────────────────────────────

/// Producer surplus given to the masjid during a blackout.
#[derive(Debug, Clone, Copy, Default)]
pub struct DonationRule;

impl SettlementRule for DonationRule {
    fn name(&self) -> &'static str {
        "donation"
    }

    fn evaluate(
        &self,
        ctx: &StepContext<'_>,
        _events: &mut Vec<SettlementEvent>,
    ) -> Option<Resolution> {
        let net = ctx.net_producer();
        if ctx.producer_intent != AgentAction::DonateMasjid
            || ctx.world.grid.status.is_online()
            || net <= ctx.config.donation_excess_threshold_kw
        {
            return None;
        }

        Some(Resolution::new(
            SettlementAction::AToMasjid,
            SettlementKind::Donation,
            vec![Mutation::Donate { kwh: net }],
            format!("Donation: {net:.2} kWh A->Masjid during blackout"),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grid
// ─────────────────────────────────────────────────────────────────────────────

/// Deficits bought from, and opted-in surplus sold to, the central grid.
///
/// Only runs while the grid is online. The producer's purchase sets the
/// output code first; the consumer's purchase only sets it if nothing else
/// has. Both charges can land in the same step. The consumer never sells.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridRule;

impl SettlementRule for GridRule {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn evaluate(
        &self,
        ctx: &StepContext<'_>,
        _events: &mut Vec<SettlementEvent>,
    ) -> Option<Resolution> {
        if !ctx.world.grid.status.is_online() {
            return None;
        }

        let price = ctx.world.grid.price_per_unit;
        let producer = ctx.world.producer();
        let consumer = ctx.world.consumer();

        let mut action = SettlementAction::Idle;
        let mut bought = false;
        let mut mutations = Vec::new();
        let mut notes = Vec::new();

        if producer.net_kw() < 0.0 {
            let kw = producer.deficit_kw();
            let cost = price.for_kwh(kw);
            mutations.push(Mutation::Debit {
                house: HouseholdId::HouseA,
                amount: cost,
            });
            notes.push(format!("Grid->A {kw:.2} kW, A -{cost}"));
            action = SettlementAction::GridToA;
            bought = true;
        } else if producer.net_kw() > 0.0 && ctx.producer_intent == AgentAction::SellToGrid {
            let kw = producer.excess_kw();
            let revenue = price.for_kwh(kw);
            mutations.push(Mutation::Credit {
                house: HouseholdId::HouseA,
                amount: revenue,
            });
            notes.push(format!("A->Grid {kw:.2} kW, A +{revenue}"));
        }

        if consumer.net_kw() < 0.0 {
            let kw = consumer.deficit_kw();
            let cost = price.for_kwh(kw);
            mutations.push(Mutation::Debit {
                house: HouseholdId::HouseB,
                amount: cost,
            });
            notes.push(format!("Grid->B {kw:.2} kW, B -{cost}"));
            if action == SettlementAction::Idle {
                action = SettlementAction::GridToB;
            }
            bought = true;
        }

        if mutations.is_empty() {
            return None;
        }

        let kind = if bought {
            SettlementKind::GridPurchase
        } else {
            SettlementKind::GridSale
        };
        Some(Resolution::new(action, kind, mutations, notes.join("; ")))
    }
}
