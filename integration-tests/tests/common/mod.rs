#![allow(dead_code)]

use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::Mutex,
};

use anyhow::anyhow;
use ethers::types::{
    Address,
    Log,
    TxHash,
    U256,
};
use generated_abi::test_helpers::test_address;
use synchronizer::{
    Account,
    GameAction,
    GameId,
    ReconcileOutcome,
    SyncConfig,
    Synchronizer,
    chain::{
        ChainGateway,
        SubmitError,
        drive_transaction,
    },
    pending::{
        PendingStore,
        SledPendingStore,
        StoreKey,
    },
    reads::{
        BalanceReader,
        BalanceSnapshot,
        ReadKey,
        ReadValue,
    },
    receipt::Receipt,
};
use tempdir::TempDir;
use tokio::{
    sync::mpsc,
    time::Instant,
};

pub fn rift() -> Address {
    test_address(0x0b)
}

pub fn anvil() -> Address {
    test_address(0x0a)
}

/// A data directory with one open sled database, shared by every page
/// instance a test creates. A new page over the same database is what a
/// reload looks like to the pending store.
pub struct TestContext {
    _dir: TempDir,
    db: sled::Db,
    pub chain: ScriptedChain,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = TempDir::new("chaos-it").unwrap();
        let db = sled::Config::default()
            .path(dir.path().join("pending"))
            .open()
            .unwrap();
        Self {
            _dir: dir,
            db,
            chain: ScriptedChain::default(),
        }
    }

    /// Overwrites the stored list of `account` with bytes that do not decode.
    pub fn corrupt(&self, account: Account, game: GameId) {
        self.db
            .open_tree("pending_items")
            .unwrap()
            .insert(StoreKey::new(&account, game).to_bytes(), b"{not json".to_vec())
            .unwrap();
    }

    pub fn store(&self) -> SledPendingStore {
        SledPendingStore::new(&self.db).unwrap()
    }

    /// A freshly mounted page for `account` with the given coin balance.
    pub fn page(&self, game: GameId, account: Account, coins: u64) -> Synchronizer<SledPendingStore> {
        let contract = match game {
            GameId::Rift => rift(),
            _ => anvil(),
        };
        let mut page = Synchronizer::new(game, contract, self.store(), &SyncConfig::default());
        page.set_account(Some(account));
        page.ingest_snapshot(coins_snapshot(account, game, coins));
        page.take_read_invalidation();
        page
    }
}

pub fn coins_snapshot(account: Account, game: GameId, coins: u64) -> BalanceSnapshot {
    let now = Instant::now();
    let mut reader = BalanceReader::new(game, 5, now);
    reader.set_account(Some(account), now);
    reader.record(
        Some(account),
        ReadKey::Coins,
        Ok(ReadValue::Amount(U256::from(coins))),
        now,
    );
    reader.snapshot().clone()
}

enum Mined {
    Receipt(Receipt),
    Lost(String),
}

/// Wallet and node stand-in. Each `submit` takes the next scripted
/// submission; the receipt for its hash is handed out once.
#[derive(Default)]
pub struct ScriptedChain {
    submissions: Mutex<VecDeque<Result<TxHash, SubmitError>>>,
    receipts: Mutex<HashMap<TxHash, Mined>>,
}

impl ScriptedChain {
    pub fn mine(&self, hash: TxHash, logs: Vec<Log>) {
        self.script(hash, Mined::Receipt(Receipt::success(hash, logs)));
    }

    pub fn revert(&self, hash: TxHash) {
        self.script(hash, Mined::Receipt(Receipt::reverted(hash)));
    }

    pub fn lose(&self, hash: TxHash, reason: &str) {
        self.script(hash, Mined::Lost(reason.to_string()));
    }

    pub fn reject(&self, err: SubmitError) {
        self.submissions.lock().unwrap().push_back(Err(err));
    }

    fn script(&self, hash: TxHash, mined: Mined) {
        self.submissions.lock().unwrap().push_back(Ok(hash));
        self.receipts.lock().unwrap().insert(hash, mined);
    }
}

impl ChainGateway for ScriptedChain {
    async fn submit(&self, _action: &GameAction) -> Result<TxHash, SubmitError> {
        self.submissions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(SubmitError::Rejected))
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> anyhow::Result<Receipt> {
        match self.receipts.lock().unwrap().remove(&hash) {
            Some(Mined::Receipt(receipt)) => Ok(receipt),
            Some(Mined::Lost(reason)) => Err(anyhow!(reason)),
            None => Err(anyhow!("no receipt scripted for {hash:?}")),
        }
    }
}

/// Dispatches `action`, drives it through `chain` and feeds every report
/// back to the page. Returns the reconcile outcome, if a receipt arrived.
pub async fn play<S: PendingStore>(
    page: &mut Synchronizer<S>,
    chain: &ScriptedChain,
    action: GameAction,
) -> Option<ReconcileOutcome> {
    let ticket = page.dispatch(action.clone()).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    drive_transaction(chain, ticket, action, &tx).await;
    drop(tx);
    let mut outcome = None;
    while let Some(event) = rx.recv().await {
        if let Some(reconciled) = page.handle(event) {
            outcome = Some(reconciled);
        }
    }
    outcome
}
