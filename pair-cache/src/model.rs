use derive_more::Constructor;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::{biguint_serde, key::TokenId};

/// A curve configuration: four unbounded non-negative integers. Opaque to this system
/// except for the [`Order::tradable`] predicate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Constructor)]
pub struct Order {
    #[serde(with = "biguint_serde")]
    pub y: BigUint,
    #[serde(with = "biguint_serde")]
    pub z: BigUint,
    #[serde(with = "biguint_serde")]
    pub a: BigUint,
    #[serde(with = "biguint_serde")]
    pub b: BigUint,
}

impl Order {
    /// An order has non-zero inventory and a non-zero price range: `y > 0 && ((B > 0 &&
    /// A >= 0) || A > 0)`, equivalently "the curve has non-zero inventory and non-zero
    /// price range".
    pub fn tradable(&self) -> bool {
        !self.y.is_zero() && (!self.b.is_zero() || !self.a.is_zero())
    }
}

/// A unit of liquidity composed of two opposing curve-parameterized orders.
///
/// `order0` sells `token0` for `token1`; `order1` sells `token1` for `token0`. The two
/// tokens are distinct and their order is authoritative — never re-sorted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Constructor)]
pub struct Strategy {
    #[serde(with = "biguint_serde")]
    pub id: BigUint,
    pub token0: TokenId,
    pub token1: TokenId,
    pub order0: Order,
    pub order1: Order,
}

/// A parts-per-million trading fee for a pair.
pub type PairFeePpm = u32;

/// `(number, hash)` identifying a block for reorg detection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Constructor)]
pub struct BlockMetadata {
    pub number: u64,
    pub hash: String,
}

/// Number of recent blocks `Cache::blocks_metadata` retains for reorg detection.
pub const BLOCK_HISTORY_LEN: usize = 3;
