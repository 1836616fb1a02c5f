//! Line and order pricing.
//!
//! A line's gross price is `unit_price * quantity`; its discount is the
//! product's discount percentage of that gross, rounded to the cent. The
//! order sub-total is the sum of the discounted line totals, and tax is
//! charged on the sub-total.

use common::Money;
use serde::{Deserialize, Serialize};

/// Flat tax rate applied to every order's sub-total.
pub const TAX_RATE_PERCENT: f64 = 18.0;

/// The priced form of one cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    pub gross: Money,
    pub discount: Money,
    pub total: Money,
}

/// Prices a single line.
pub fn price_line(unit_price: Money, quantity: u32, discount_percent: f64) -> LinePricing {
    let gross = unit_price.multiply(quantity);
    let discount = gross.percentage(discount_percent);
    LinePricing {
        gross,
        discount,
        total: gross - discount,
    }
}

/// Totals stored on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

impl OrderTotals {
    /// Accumulates priced lines and applies [`TAX_RATE_PERCENT`].
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a LinePricing>) -> Self {
        let mut sub_total = Money::zero();
        let mut discount_amount = Money::zero();
        for line in lines {
            sub_total += line.total;
            discount_amount += line.discount;
        }

        let tax_amount = sub_total.percentage(TAX_RATE_PERCENT);
        Self {
            sub_total,
            discount_amount,
            tax_amount,
            total_amount: sub_total + tax_amount,
        }
    }
}
