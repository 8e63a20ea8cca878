//! Pricing negotiation between the producer and the consumer.
//!
//! Both sides derive a bid band from the current grid price (the reference
//! price `R`), the generation cost `G` and the transmission rent `T`:
//!
//! ```text
//! seller: [G + 1.0,  R - T - 1.0]   bid leans low:  (2·min + max) / 3
//! buyer:  [G + 0.5,  R - T - 0.5]   bid leans high: (min + 2·max) / 3
//! ```
//!
//! Bids are rounded to one decimal and clamped into their band. A deal exists
//! when the buyer bids at least the seller's price; the agreed price is the
//! rounded midpoint. Agreed prices that would cost either side more than a
//! small tolerance are refused.

use std::fmt;

use serde::{Deserialize, Serialize};
use types::{Cash, Price, Role};

use crate::config::EngineConfig;

/// Inclusive bid band for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidBounds {
    pub min: Price,
    pub max: Price,
}

/// One side's opening price for the step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub role: Role,
    pub bounds: BidBounds,
    pub price: Price,
    /// Grid price the band was derived from.
    pub reference_price: Price,
    /// Bidder's battery level when the bid was made.
    pub battery_level: f64,
}

/// Accepted trade terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub kwh: f64,
    pub grid_price: Price,
    pub seller_bid: Price,
    pub buyer_bid: Price,
    pub agreed_price: Price,
    pub buyer_cost_per_unit: Price,
    pub seller_profit_per_unit: Price,
    pub buyer_savings_per_unit: Price,
    pub seller_revenue: Cash,
    pub buyer_payment: Cash,
    pub seller_profit_total: Cash,
    pub buyer_savings_total: Cash,
}

/// Why a negotiation did not produce a deal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Refusal {
    /// The buyer bid below the seller.
    NoOverlap { seller_bid: Price, buyer_bid: Price },
    /// The seller would lose more than its tolerance per unit.
    SellerLoss {
        agreed_price: Price,
        profit_per_unit: Price,
    },
    /// The buyer would pay more than the grid by more than its tolerance.
    BuyerLoss {
        agreed_price: Price,
        savings_per_unit: Price,
    },
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::NoOverlap {
                seller_bid,
                buyer_bid,
            } => write!(
                f,
                "no price overlap: seller asks {seller_bid}, buyer offers {buyer_bid}"
            ),
            Refusal::SellerLoss {
                agreed_price,
                profit_per_unit,
            } => write!(
                f,
                "unprofitable for seller at {agreed_price}: {profit_per_unit}/unit"
            ),
            Refusal::BuyerLoss {
                agreed_price,
                savings_per_unit,
            } => write!(
                f,
                "unprofitable for buyer at {agreed_price}: {savings_per_unit}/unit versus grid"
            ),
        }
    }
}

/// Computes bids and resolves them into deals.
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiator {
    generation_cost: Price,
    transmission_rent: Price,
    seller_margin: Price,
    buyer_margin: Price,
    seller_loss_tolerance: Price,
    buyer_loss_tolerance: Price,
}

impl Negotiator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            generation_cost: config.generation_cost,
            transmission_rent: config.transmission_rent,
            seller_margin: config.seller_margin,
            buyer_margin: config.buyer_margin,
            seller_loss_tolerance: config.seller_loss_tolerance,
            buyer_loss_tolerance: config.buyer_loss_tolerance,
        }
    }

    pub fn transmission_rent(&self) -> Price {
        self.transmission_rent
    }

    /// Bid band for `role` at reference price `grid_price`.
    pub fn bounds(&self, grid_price: Price, role: Role) -> BidBounds {
        let margin = match role {
            Role::Producer => self.seller_margin,
            Role::Consumer => self.buyer_margin,
        };
        BidBounds {
            min: self.generation_cost + margin,
            max: grid_price - self.transmission_rent - margin,
        }
    }

    /// Opening bid for `role`.
    pub fn negotiate(&self, grid_price: Price, role: Role, battery_level: f64) -> Bid {
        let bounds = self.bounds(grid_price, role);
        let weighted = match role {
            Role::Producer => Price((2 * bounds.min.0 + bounds.max.0) / 3),
            Role::Consumer => Price((bounds.min.0 + 2 * bounds.max.0) / 3),
        };
        let price = weighted.round_to_tenth().clamp_to(bounds.min, bounds.max);

        Bid {
            role,
            bounds,
            price,
            reference_price: grid_price,
            battery_level,
        }
    }

    /// Try to close a trade of `trade_kwh` between the two bids.
    pub fn resolve(&self, seller: &Bid, buyer: &Bid, trade_kwh: f64) -> Result<Deal, Refusal> {
        if buyer.price < seller.price {
            return Err(Refusal::NoOverlap {
                seller_bid: seller.price,
                buyer_bid: buyer.price,
            });
        }

        let grid_price = seller.reference_price;
        let agreed_price = seller.price.midpoint(buyer.price);
        let buyer_cost_per_unit = agreed_price + self.transmission_rent;
        let seller_profit_per_unit = agreed_price - self.generation_cost;
        let buyer_savings_per_unit = grid_price - buyer_cost_per_unit;

        if seller_profit_per_unit < -self.seller_loss_tolerance {
            return Err(Refusal::SellerLoss {
                agreed_price,
                profit_per_unit: seller_profit_per_unit,
            });
        }
        if buyer_savings_per_unit < -self.buyer_loss_tolerance {
            return Err(Refusal::BuyerLoss {
                agreed_price,
                savings_per_unit: buyer_savings_per_unit,
            });
        }

        Ok(Deal {
            kwh: trade_kwh,
            grid_price,
            seller_bid: seller.price,
            buyer_bid: buyer.price,
            agreed_price,
            buyer_cost_per_unit,
            seller_profit_per_unit,
            buyer_savings_per_unit,
            seller_revenue: agreed_price.for_kwh(trade_kwh),
            buyer_payment: buyer_cost_per_unit.for_kwh(trade_kwh),
            seller_profit_total: seller_profit_per_unit.for_kwh(trade_kwh),
            buyer_savings_total: buyer_savings_per_unit.for_kwh(trade_kwh),
        })
    }
}
