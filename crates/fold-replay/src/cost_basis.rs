use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fold_stream::{OrderKey, SignedEvent};
use fold_types::{Amount, Family, TypeError};

use crate::error::Anomaly;
use crate::flow::{Flow, flow_rule};
use crate::replayer::KeyFold;

/// Weighted-average cost basis of one share-based position.
///
/// The exchange rate is tokens per share. Inflows blend the new tokens into
/// the rate; outflows leave it untouched. Rate arithmetic is done in display
/// scale, so a rate of `1.2` means 1.2 tokens per share regardless of how
/// many wei either side holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBasisState {
    pub rate: Decimal,
    pub shares: Amount,
    pub cumulative_in: Amount,
    pub cumulative_out: Amount,
    pub created_at: Option<i64>,
    pub last_in_at: Option<i64>,
    pub last_out_at: Option<i64>,
    /// `shares > 0` after the last applied event.
    pub active: bool,
    /// Number of inactive-to-active crossings.
    pub activations: u32,
}

impl Default for CostBasisState {
    fn default() -> Self {
        Self {
            rate: Decimal::ONE,
            shares: Amount::ZERO,
            cumulative_in: Amount::ZERO,
            cumulative_out: Amount::ZERO,
            created_at: None,
            last_in_at: None,
            last_out_at: None,
            active: false,
            activations: 0,
        }
    }
}

impl CostBasisState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `shares` for `tokens`.
    pub fn inflow(&mut self, timestamp: i64, tokens: Amount, shares: Amount) -> Result<(), TypeError> {
        self.cumulative_in = self.cumulative_in.checked_add(tokens)?;
        let new_shares = self.shares.checked_add(shares)?;
        if new_shares.is_positive() {
            let held = self
                .rate
                .checked_mul(self.shares.to_display()?)
                .ok_or(TypeError::AmountOverflow)?;
            let numerator = held
                .checked_add(tokens.to_display()?)
                .ok_or(TypeError::AmountOverflow)?;
            self.rate = numerator
                .checked_div(new_shares.to_display()?)
                .ok_or(TypeError::AmountOverflow)?
                .normalize();
        }
        self.set_shares(new_shares);
        self.created_at.get_or_insert(timestamp);
        self.last_in_at = Some(timestamp);
        Ok(())
    }

    /// Dispose of `shares`, receiving `tokens`. The rate is sticky.
    ///
    /// Returns the resulting share balance when it went negative; the
    /// subtraction is applied regardless.
    pub fn outflow(&mut self, timestamp: i64, tokens: Amount, shares: Amount) -> Result<Option<Amount>, TypeError> {
        self.cumulative_out = self.cumulative_out.checked_add(tokens)?;
        let new_shares = self.shares.checked_sub(shares)?;
        self.set_shares(new_shares);
        self.last_out_at = Some(timestamp);
        Ok(new_shares.is_negative().then_some(new_shares))
    }

    fn set_shares(&mut self, shares: Amount) {
        let now_active = shares.is_positive();
        if now_active && !self.active {
            self.activations += 1;
        }
        self.active = now_active;
        self.shares = shares;
    }

    /// Current value of the position: `rate × shares`, display scale.
    pub fn current_value(&self) -> Result<Decimal, TypeError> {
        self.rate
            .checked_mul(self.shares.to_display()?)
            .map(|value| value.normalize())
            .ok_or(TypeError::DisplayOverflow(self.shares.raw()))
    }

    /// Tokens in minus tokens out.
    pub fn net_balance(&self) -> Result<Amount, TypeError> {
        self.cumulative_in.checked_sub(self.cumulative_out)
    }
}

impl KeyFold for CostBasisState {
    fn apply(&mut self, family: Family, signed: &SignedEvent) -> Result<Option<Anomaly>, TypeError> {
        let Some(rule) = flow_rule(signed.kind(), family) else {
            return Ok(None);
        };
        let timestamp = signed.position().timestamp;
        let tokens = signed.event.magnitude(rule.tokens);
        let shares = signed.event.magnitude(rule.shares);
        match rule.flow {
            Flow::Inflow => {
                self.inflow(timestamp, tokens, shares)?;
                Ok(None)
            }
            Flow::Outflow => Ok(self
                .outflow(timestamp, tokens, shares)?
                .map(|shares| negative_shares(signed.order, shares))),
        }
    }
}

fn negative_shares(at: OrderKey, shares: Amount) -> Anomaly {
    Anomaly::Ordering { at, shares }
}
