//! Balance/state reader: polled contract views with stale-while-revalidate
//! semantics.
//!
//! [`BalanceReader`] holds the schedule and the last known values. The
//! [`reader_worker`] task owns one and performs the reads; it reports whole
//! [`BalanceSnapshot`]s tagged with the account they were read for.

use std::{
    collections::BTreeMap,
    future::Future,
    time::Duration,
};

use ethers::types::{
    Address,
    U256,
};
use futures::future::join_all;
use tokio::{
    sync::mpsc,
    time::{
        self,
        Instant,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    Account,
    GameId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReadKey {
    Coins,
    Points,
    HasActiveBet,
    PendingPoints,
    PlinkoGameBalance,
    CascadePendingWinnings,
    AltarTimeLeft,
    AltarEssence,
    AltarHarbinger,
}

impl ReadKey {
    /// Account-scoped reads are skipped while no account is connected.
    pub fn account_scoped(self) -> bool {
        !matches!(
            self,
            ReadKey::AltarTimeLeft | ReadKey::AltarEssence | ReadKey::AltarHarbinger
        )
    }

    pub fn default_poll_secs(self) -> u64 {
        match self {
            ReadKey::Coins
            | ReadKey::HasActiveBet
            | ReadKey::PendingPoints
            | ReadKey::PlinkoGameBalance => 10,
            ReadKey::Points | ReadKey::AltarEssence | ReadKey::AltarHarbinger => 5,
            ReadKey::CascadePendingWinnings => 2,
            ReadKey::AltarTimeLeft => 30,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReadKey::Coins => "Coins",
            ReadKey::Points => "Points",
            ReadKey::HasActiveBet => "Active bet",
            ReadKey::PendingPoints => "Pending points",
            ReadKey::PlinkoGameBalance => "Game balance",
            ReadKey::CascadePendingWinnings => "Pending winnings",
            ReadKey::AltarTimeLeft => "Time left",
            ReadKey::AltarEssence => "Altar essence",
            ReadKey::AltarHarbinger => "Harbinger",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadValue {
    Amount(U256),
    Flag(bool),
    Address(Address),
}

impl ReadValue {
    pub fn as_amount(&self) -> Option<U256> {
        match self {
            ReadValue::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ReadValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            ReadValue::Address(address) => Some(*address),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadState {
    pub value: Option<ReadValue>,
    pub fetched_at: Option<Instant>,
    pub failures: u32,
    pub degraded: bool,
}

/// Mirror of polled contract state. Never authoritative: receipts decide what
/// happened, the snapshot only catches up.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BalanceSnapshot {
    pub account: Option<Account>,
    pub reads: BTreeMap<ReadKey, ReadState>,
}

impl BalanceSnapshot {
    pub fn value(&self, key: ReadKey) -> Option<ReadValue> {
        self.reads.get(&key).and_then(|state| state.value)
    }

    pub fn amount(&self, key: ReadKey) -> Option<U256> {
        self.value(key).and_then(|value| value.as_amount())
    }

    pub fn flag(&self, key: ReadKey) -> Option<bool> {
        self.value(key).and_then(|value| value.as_flag())
    }

    pub fn address(&self, key: ReadKey) -> Option<Address> {
        self.value(key).and_then(|value| value.as_address())
    }

    pub fn fetched_at(&self, key: ReadKey) -> Option<Instant> {
        self.reads.get(&key).and_then(|state| state.fetched_at)
    }

    pub fn is_degraded(&self, key: ReadKey) -> bool {
        self.reads.get(&key).is_some_and(|state| state.degraded)
    }

    /// Altar countdown ticked down locally since the last poll.
    pub fn altar_seconds_left(&self, now: Instant) -> Option<u64> {
        let polled = self.amount(ReadKey::AltarTimeLeft)?;
        let polled = if polled > U256::from(u64::MAX) {
            u64::MAX
        } else {
            polled.as_u64()
        };
        let elapsed = self
            .fetched_at(ReadKey::AltarTimeLeft)
            .map(|at| now.saturating_duration_since(at).as_secs())
            .unwrap_or_default();
        Some(polled.saturating_sub(elapsed))
    }
}

/// Contract views the reader polls.
pub trait ContractReads: Send + Sync + 'static {
    fn read(
        &self,
        key: ReadKey,
        account: Option<Address>,
    ) -> impl Future<Output = crate::Result<ReadValue>> + Send;
}

/// Poll schedule and last known values for one page.
#[derive(Clone, Debug)]
pub struct BalanceReader {
    game: GameId,
    degraded_after: u32,
    snapshot: BalanceSnapshot,
    next_due: BTreeMap<ReadKey, Instant>,
}

impl BalanceReader {
    pub fn new(game: GameId, degraded_after: u32, now: Instant) -> Self {
        let next_due = game.reads().iter().map(|key| (*key, now)).collect();
        Self {
            game,
            degraded_after: degraded_after.max(1),
            snapshot: BalanceSnapshot::default(),
            next_due,
        }
    }

    pub fn game(&self) -> GameId {
        self.game
    }

    pub fn account(&self) -> Option<Account> {
        self.snapshot.account
    }

    pub fn snapshot(&self) -> &BalanceSnapshot {
        &self.snapshot
    }

    /// Drops every value read for the previous account and schedules a fresh
    /// poll of everything.
    pub fn set_account(&mut self, account: Option<Account>, now: Instant) {
        if self.snapshot.account == account {
            return;
        }
        self.snapshot = BalanceSnapshot {
            account,
            reads: BTreeMap::new(),
        };
        self.invalidate(now);
    }

    pub fn invalidate(&mut self, now: Instant) {
        for due in self.next_due.values_mut() {
            *due = now;
        }
    }

    pub fn due(&self, now: Instant) -> Vec<ReadKey> {
        let connected = self.snapshot.account.is_some();
        self.next_due
            .iter()
            .filter(|(key, due)| **due <= now && (connected || !key.account_scoped()))
            .map(|(key, _)| *key)
            .collect()
    }

    /// Stores a read result. Results read for any account other than the
    /// current one are dropped and `false` is returned.
    pub fn record(
        &mut self,
        account: Option<Account>,
        key: ReadKey,
        result: crate::Result<ReadValue>,
        now: Instant,
    ) -> bool {
        if account != self.snapshot.account || !self.next_due.contains_key(&key) {
            debug!(?key, "dropping read for a previous account");
            return false;
        }
        let interval = Duration::from_secs(self.game.poll_secs(key));
        self.next_due.insert(key, now + interval);
        let state = self.snapshot.reads.entry(key).or_default();
        match result {
            Ok(value) => {
                if state.degraded {
                    info!(?key, "read recovered");
                }
                state.value = Some(value);
                state.fetched_at = Some(now);
                state.failures = 0;
                state.degraded = false;
            }
            Err(err) => {
                state.failures = state.failures.saturating_add(1);
                debug!(?key, failures = state.failures, error = %err, "read failed");
                if state.failures == self.degraded_after {
                    warn!(?key, error = %err, "read keeps failing; showing last known value");
                    state.degraded = true;
                }
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderCommand {
    FetchNow,
    SetAccount(Option<Account>),
    Shutdown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReaderEvent {
    Snapshot(BalanceSnapshot),
}

async fn poll_due<R: ContractReads>(
    reads: &R,
    reader: &mut BalanceReader,
    event_tx: &mpsc::UnboundedSender<ReaderEvent>,
) -> bool {
    let now = Instant::now();
    let keys = reader.due(now);
    if keys.is_empty() {
        return true;
    }
    let account = reader.account();
    let results = join_all(
        keys.iter()
            .map(|key| reads.read(*key, account.map(|a| a.address()))),
    )
    .await;
    let now = Instant::now();
    for (key, result) in keys.into_iter().zip(results) {
        reader.record(account, key, result, now);
    }
    event_tx
        .send(ReaderEvent::Snapshot(reader.snapshot().clone()))
        .is_ok()
}

/// Polls the page's reads until shut down or until the event receiver goes away.
pub async fn reader_worker<R: ContractReads>(
    reads: R,
    mut reader: BalanceReader,
    mut cmd_rx: mpsc::UnboundedReceiver<ReaderCommand>,
    event_tx: mpsc::UnboundedSender<ReaderEvent>,
) -> crate::Result<()> {
    let mut ticker = time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !poll_due(&reads, &mut reader, &event_tx).await {
                    break;
                }
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    ReaderCommand::FetchNow => {
                        reader.invalidate(Instant::now());
                        if !poll_due(&reads, &mut reader, &event_tx).await {
                            break;
                        }
                    }
                    ReaderCommand::SetAccount(account) => {
                        reader.set_account(account, Instant::now());
                        if event_tx
                            .send(ReaderEvent::Snapshot(reader.snapshot().clone()))
                            .is_err()
                        {
                            break;
                        }
                        if !poll_due(&reads, &mut reader, &event_tx).await {
                            break;
                        }
                    }
                    ReaderCommand::Shutdown => break,
                }
            }
        }
    }
    debug!(game = %reader.game(), "reader worker stopped");
    Ok(())
}
