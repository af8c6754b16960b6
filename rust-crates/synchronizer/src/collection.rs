//! Rune collection: enumerates the runes an owner holds.
//!
//! The rune contract only exposes `balanceOf` and `tokenOfOwnerByIndex`, so the
//! collection is rebuilt by walking every owner index. Indices that revert are
//! counted and skipped.

use std::{
    collections::BTreeMap,
    future::Future,
};

use ethers::types::{
    Address,
    U256,
};
use futures::{
    StreamExt,
    stream,
};
use tracing::{
    debug,
    warn,
};

use crate::outcome::Rune;

/// Owner-indexed token views of the rune contract.
pub trait OwnedTokens: Send + Sync {
    fn balance_of(&self, owner: Address) -> impl Future<Output = crate::Result<U256>> + Send;

    fn token_of_owner_by_index(
        &self,
        owner: Address,
        index: U256,
    ) -> impl Future<Output = crate::Result<U256>> + Send;
}

/// Indices walked per owner. Balances above this are truncated.
pub const MAX_ENUMERATED: u64 = 10_000;
const CONCURRENT_LOOKUPS: usize = 8;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Collection {
    pub balance: U256,
    pub tokens: BTreeMap<Rune, Vec<U256>>,
    pub failed_lookups: usize,
}

impl Collection {
    pub fn owns(&self, rune: Rune) -> bool {
        self.count(rune) > 0
    }

    pub fn count(&self, rune: Rune) -> usize {
        self.tokens.get(&rune).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.tokens.values().map(Vec::len).sum()
    }
}

pub async fn enumerate_runes<T: OwnedTokens>(tokens: &T, owner: Address) -> crate::Result<Collection> {
    let balance = tokens.balance_of(owner).await?;
    let walked = if balance > U256::from(MAX_ENUMERATED) {
        warn!(%balance, "rune balance too large; enumerating the first {MAX_ENUMERATED}");
        MAX_ENUMERATED
    } else {
        balance.as_u64()
    };

    let lookups: Vec<_> = stream::iter(0..walked)
        .map(|index| tokens.token_of_owner_by_index(owner, U256::from(index)))
        .buffered(CONCURRENT_LOOKUPS)
        .collect()
        .await;

    let mut collection = Collection {
        balance,
        ..Default::default()
    };
    for (index, lookup) in lookups.into_iter().enumerate() {
        match lookup {
            Ok(token_id) => collection
                .tokens
                .entry(Rune::from_token_id(token_id))
                .or_default()
                .push(token_id),
            Err(err) => {
                debug!(index, error = %err, "owner index lookup failed");
                collection.failed_lookups += 1;
            }
        }
    }
    Ok(collection)
}
