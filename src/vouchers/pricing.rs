use rust_decimal::{Decimal, RoundingStrategy};

/// Price of a discounted purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Money taken off the base price
    pub discount_applied: Decimal,
    pub final_price: Decimal,
}

/// Computes purchase prices from a fixed base price
#[derive(Debug, Clone, Copy)]
pub struct PurchasePricing {
    base_price: Decimal,
}

impl PurchasePricing {
    pub fn new(base_price: Decimal) -> Self {
        Self { base_price }
    }

    pub fn base_price(&self) -> Decimal {
        self.base_price
    }

    /// final = base * (1 - rate / 100), both amounts rounded half-up to cents
    ///
    /// `discount_applied + final_price == base_price` always holds.
    pub fn quote(&self, discount_rate: Decimal) -> Quote {
        let final_price = (self.base_price * (Decimal::ONE_HUNDRED - discount_rate) / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Quote {
            discount_applied: self.base_price - final_price,
            final_price,
        }
    }
}
