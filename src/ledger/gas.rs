//! Fixed gas policy applied to every transaction.

use alloy::primitives::U256;

/// Default gas price.
pub const GAS_PRICE: u64 = 30_000_000;

/// Default gas limit.
pub const GAS_LIMIT: u64 = 30_000_000;

/// Gas price and limit stamped into outgoing transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    price: U256,
    limit: U256,
}

impl GasPolicy {
    pub fn new(price: U256, limit: U256) -> Self {
        Self { price, limit }
    }

    pub fn price(&self) -> U256 {
        self.price
    }

    pub fn limit(&self) -> U256 {
        self.limit
    }
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self::new(U256::from(GAS_PRICE), U256::from(GAS_LIMIT))
    }
}
