//! Per-account store of submitted items that still wait for a resolve.
//!
//! Rift bets and anvil strikes cannot be listed from their contracts, so the
//! client remembers every id it saw in a submit receipt until the matching
//! settlement arrives. The store is advisory: losing it only hides items from
//! the page, it never changes what happens on chain.

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc,
        Mutex,
    },
};

use anyhow::{
    Context,
    anyhow,
    bail,
};
use chrono::{
    DateTime,
    Utc,
};
use ethers::types::U256;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use sled::{
    Config,
    Db,
    Tree,
};

use crate::{
    Account,
    GameId,
    big_int,
    games::ANVIL_STRIKE_COST,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    RiftChoice { choice: u8 },
    AnvilStrike,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItem {
    #[serde(with = "big_int")]
    pub id: U256,
    #[serde(with = "big_int")]
    pub amount: U256,
    pub kind: ItemKind,
    pub created_at: DateTime<Utc>,
}

/// Key of one pending list: the owning account and the game it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub account: Account,
    pub game: GameId,
}

impl StoreKey {
    pub fn new(account: &Account, game: GameId) -> Self {
        Self {
            account: *account,
            game,
        }
    }

    /// 20 address bytes followed by the game tag.
    pub fn to_bytes(self) -> [u8; 21] {
        let mut bytes = [0u8; 21];
        bytes[..20].copy_from_slice(self.account.address().as_bytes());
        bytes[20] = self.game.tag();
        bytes
    }
}

pub trait PendingStore {
    /// Items of `account` for `game`, oldest first.
    fn load(&self, account: &Account, game: GameId) -> crate::Result<Vec<PendingItem>>;

    /// Replaces the whole list. Saving an empty list removes the entry.
    fn save(
        &mut self,
        account: &Account,
        game: GameId,
        items: &[PendingItem],
    ) -> crate::Result<()>;
}

fn encode_items(items: &[PendingItem]) -> crate::Result<Vec<u8>> {
    serde_json::to_vec(items).context("serialize pending items")
}

fn decode_items(bytes: &[u8]) -> crate::Result<Vec<PendingItem>> {
    serde_json::from_slice(bytes).context("deserialize pending items")
}

/// Shared in-memory store. Clones see the same data, which is how tests model
/// a page being reloaded.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPendingStore {
    entries: Arc<Mutex<HashMap<StoreKey, Vec<u8>>>>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingStore for InMemoryPendingStore {
    fn load(&self, account: &Account, game: GameId) -> crate::Result<Vec<PendingItem>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("pending store lock poisoned"))?;
        match entries.get(&StoreKey::new(account, game)) {
            Some(bytes) => decode_items(bytes),
            None => Ok(Vec::new()),
        }
    }

    fn save(
        &mut self,
        account: &Account,
        game: GameId,
        items: &[PendingItem],
    ) -> crate::Result<()> {
        let key = StoreKey::new(account, game);
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("pending store lock poisoned"))?;
        if items.is_empty() {
            entries.remove(&key);
        } else {
            entries.insert(key, encode_items(items)?);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SledPendingStore {
    tree: Tree,
}

impl SledPendingStore {
    pub fn new(db: &Db) -> crate::Result<Self> {
        let tree = db
            .open_tree("pending_items")
            .context("open pending_items tree")?;
        Ok(Self { tree })
    }

    /// Opens the store under `path`. sled locks the directory, so a second
    /// client pointed at the same data directory fails here.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let db = Config::default()
            .path(path)
            .open()
            .with_context(|| format!("open pending store at {}", path.display()))?;
        Self::new(&db)
    }
}

impl PendingStore for SledPendingStore {
    fn load(&self, account: &Account, game: GameId) -> crate::Result<Vec<PendingItem>> {
        let key = StoreKey::new(account, game).to_bytes();
        match self.tree.get(key).context("read pending items")? {
            Some(bytes) => decode_items(bytes.as_ref()),
            None => Ok(Vec::new()),
        }
    }

    fn save(
        &mut self,
        account: &Account,
        game: GameId,
        items: &[PendingItem],
    ) -> crate::Result<()> {
        let key = StoreKey::new(account, game).to_bytes();
        if items.is_empty() {
            self.tree.remove(key).context("remove pending items")?;
        } else {
            self.tree
                .insert(key, encode_items(items)?)
                .context("persist pending items")?;
        }
        self.tree.flush().context("flush pending items")?;
        Ok(())
    }
}

/// Parses a list exported from the browser client.
///
/// Rift lists are objects `{ "betId": "12n", "amount": "10n", "choice": 2 }`;
/// anvil lists are bare ids.
pub fn parse_legacy(game: GameId, json: &str) -> crate::Result<Vec<PendingItem>> {
    if !game.keeps_pending_items() {
        bail!("{game} does not keep pending items");
    }
    let value: Value = serde_json::from_str(json).context("parse legacy pending items")?;
    let Value::Array(entries) = value else {
        bail!("legacy pending items must be a JSON array");
    };
    let now = Utc::now();
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            legacy_item(game, entry, now).with_context(|| format!("legacy entry {index}"))
        })
        .collect()
}

fn legacy_item(game: GameId, entry: &Value, now: DateTime<Utc>) -> crate::Result<PendingItem> {
    match game {
        GameId::Rift => {
            let field = |name: &str| {
                entry
                    .get(name)
                    .ok_or_else(|| anyhow!("missing `{name}`"))
            };
            let choice = big_int::from_json(field("choice")?)?;
            if choice > U256::from(3) {
                bail!("rift choice {choice} out of range");
            }
            Ok(PendingItem {
                id: big_int::from_json(field("betId")?)?,
                amount: big_int::from_json(field("amount")?)?,
                kind: ItemKind::RiftChoice {
                    choice: choice.as_u32() as u8,
                },
                created_at: now,
            })
        }
        _ => Ok(PendingItem {
            id: big_int::from_json(entry)?,
            amount: U256::from(ANVIL_STRIKE_COST),
            kind: ItemKind::AnvilStrike,
            created_at: now,
        }),
    }
}
