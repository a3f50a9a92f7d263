//! Per-`(trader, market)` position, keyed and invariant-checked as in the
//! data model: `size = 0 ⇒ entry_price = 0 ∧ reserved_margin = 0`.

use crate::fixed::Fixed18;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub trader: String,
    pub market_id: String,
    /// Signed: positive long, negative short.
    pub size: Fixed18,
    pub entry_price: Fixed18,
    pub reserved_margin: Fixed18,
    pub realized_pnl_cum: Fixed18,
}

impl Position {
    pub fn flat(trader: impl Into<String>, market_id: impl Into<String>) -> Self {
        Self {
            trader: trader.into(),
            market_id: market_id.into(),
            size: Fixed18::ZERO,
            entry_price: Fixed18::ZERO,
            reserved_margin: Fixed18::ZERO,
            realized_pnl_cum: Fixed18::ZERO,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    pub fn unrealized_pnl(&self, mark_price: Fixed18) -> Fixed18 {
        if self.is_flat() {
            return Fixed18::ZERO;
        }
        let diff = mark_price.checked_sub(self.entry_price).unwrap_or(Fixed18::ZERO);
        diff.checked_mul(self.size).unwrap_or(Fixed18::ZERO)
    }

    /// Maintenance margin requirement at `mark_price`, per the liquidation
    /// engine's trigger condition: `|size| * mark * maintenance_margin_bps / 10000`.
    pub fn maintenance_margin(&self, mark_price: Fixed18, maintenance_margin_bps: u32) -> Fixed18 {
        let notional = self.size.abs().checked_mul(mark_price).unwrap_or(Fixed18::ZERO);
        crate::fixed::bps_of(notional, maintenance_margin_bps).unwrap_or(Fixed18::ZERO)
    }

    /// `reserved_margin + unrealized_pnl`, the liquidation engine's equity figure.
    pub fn equity(&self, mark_price: Fixed18) -> Fixed18 {
        self.reserved_margin
            .checked_add(self.unrealized_pnl(mark_price))
            .unwrap_or(self.reserved_margin)
    }

    pub fn is_liquidatable(&self, mark_price: Fixed18, maintenance_margin_bps: u32) -> bool {
        if self.is_flat() {
            return false;
        }
        self.equity(mark_price) < self.maintenance_margin(mark_price, maintenance_margin_bps)
    }
}

/// Outcome of applying a fill to a position: the new position state, the
/// realized PnL delta (signed), and the required-margin delta the vault
/// must reserve or release against it.
#[derive(Debug, Clone)]
pub struct PositionFillOutcome {
    pub position: Position,
    pub realized_pnl_delta: Fixed18,
    pub required_margin: Fixed18,
}

/// Applies one fill leg to `position`. `signed_qty` is positive for a BUY
/// fill and negative for a SELL fill on this trader's side. Same-direction
/// fills extend the position at a size-weighted average entry price;
/// opposite-direction fills realize PnL on the closed portion and, if the
/// fill overshoots the existing size, flip to the opposite direction at the
/// fill price for the residual.
pub fn apply_fill(
    position: &Position,
    fill_price: Fixed18,
    signed_qty: Fixed18,
    leverage: u32,
) -> Option<PositionFillOutcome> {
    let leverage = Fixed18::from_i64(leverage.max(1) as i64);
    let same_direction = position.is_flat() || position.size.signum() == signed_qty.signum();

    let (new_size, new_entry, realized_pnl_delta) = if same_direction {
        let old_abs = position.size.abs();
        let add_abs = signed_qty.abs();
        let new_size = position.size.checked_add(signed_qty)?;
        let total_abs = old_abs.checked_add(add_abs)?;
        let new_entry = if total_abs.is_zero() {
            Fixed18::ZERO
        } else {
            let weighted = old_abs
                .checked_mul(position.entry_price)?
                .checked_add(add_abs.checked_mul(fill_price)?)?;
            weighted.checked_div(total_abs)?
        };
        (new_size, new_entry, Fixed18::ZERO)
    } else {
        let pos_sign = position.size.signum();
        let closed_size = position.size.abs().min(signed_qty.abs());
        let price_diff = fill_price.checked_sub(position.entry_price)?;
        let pnl = price_diff
            .checked_mul(closed_size)?
            .checked_mul_int(pos_sign)?;

        let overshoot = signed_qty.abs().checked_sub(closed_size)?;
        if overshoot.is_zero() {
            let new_size = position.size.checked_add(signed_qty)?;
            let new_entry = if new_size.is_zero() { Fixed18::ZERO } else { position.entry_price };
            (new_size, new_entry, pnl)
        } else {
            // Flip: close the old position entirely, open the residual in
            // the new direction at the fill price.
            let new_size = overshoot.checked_mul_int(signed_qty.signum())?;
            (new_size, fill_price, pnl)
        }
    };

    let required_margin = new_size.abs().checked_mul(fill_price)?.checked_div(leverage)?;

    Some(PositionFillOutcome {
        position: Position {
            trader: position.trader.clone(),
            market_id: position.market_id.clone(),
            size: new_size,
            entry_price: new_entry,
            reserved_margin: required_margin,
            realized_pnl_cum: position.realized_pnl_cum.checked_add(realized_pnl_delta)?,
        },
        realized_pnl_delta,
        required_margin,
    })
}
