//! Confirmation reconciler: the per-page state machine that owns the single
//! in-flight action.
//!
//! ```text
//! Idle -> AwaitingSubmission -> AwaitingConfirmation -> Reconciling -> Idle
//!                 |                      |
//!                 +-----> Failed <-------+----------------------> Idle
//! ```
//!
//! Events come from the chain task driving the transaction
//! ([`ChainEvent`]). Every event names the ticket or hash it belongs to, and
//! events for anything other than the current action are ignored.

use std::{
    collections::{
        HashSet,
        VecDeque,
    },
    fmt,
};

use chrono::Utc;
use ethers::types::{
    Address,
    TxHash,
};
use tokio::time::Instant;
use tracing::{
    debug,
    error,
    info,
    warn,
};

use crate::{
    Account,
    GameId,
    SyncConfig,
    action::{
        GameAction,
        TransactionAction,
    },
    chain::{
        ChainEvent,
        SubmitError,
    },
    decode::{
        Effect,
        decode_effect,
    },
    dispatcher::{
        self,
        DispatchError,
        PageView,
    },
    notices::{
        NoticeBoard,
        NoticeId,
        NoticeLevel,
    },
    outcome::RoundResult,
    pending::{
        self,
        PendingItem,
        PendingStore,
    },
    reads::{
        BalanceSnapshot,
        ReadKey,
    },
    receipt::Receipt,
};

/// Identifies one dispatched action until its transaction hash is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn first() -> Self {
        Ticket(0)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingSubmission {
        ticket: Ticket,
        action: GameAction,
        notice: NoticeId,
    },
    AwaitingConfirmation {
        ticket: Ticket,
        action: GameAction,
        notice: NoticeId,
        hash: TxHash,
    },
    Reconciling {
        action: GameAction,
        notice: NoticeId,
        hash: TxHash,
    },
    Failed {
        action: GameAction,
        notice: NoticeId,
        reason: String,
    },
}

impl Phase {
    pub fn action(&self) -> Option<&GameAction> {
        match self {
            Phase::Idle => None,
            Phase::AwaitingSubmission { action, .. }
            | Phase::AwaitingConfirmation { action, .. }
            | Phase::Reconciling { action, .. }
            | Phase::Failed { action, .. } => Some(action),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingSubmission { .. } => "awaiting_submission",
            Phase::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Phase::Reconciling { .. } => "reconciling",
            Phase::Failed { .. } => "failed",
        }
    }
}

/// What the page shows between actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Ready,
    AwaitingResolution,
    ResultAvailable(RoundResult),
    /// Winnings wait to be claimed (coin flip only).
    Claimable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(Effect),
    /// The receipt confirmed but the expected event was absent.
    OutcomeUnknown,
    Reverted,
    /// The hash was already reconciled.
    Duplicate,
    /// The receipt belongs to an abandoned or unknown transaction.
    Stale,
}

/// Bounded set of hashes, oldest evicted first.
#[derive(Clone, Debug)]
struct RecentHashes {
    capacity: usize,
    order: VecDeque<TxHash>,
    members: HashSet<TxHash>,
}

impl RecentHashes {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    fn contains(&self, hash: &TxHash) -> bool {
        self.members.contains(hash)
    }

    fn insert(&mut self, hash: TxHash) {
        if !self.members.insert(hash) {
            return;
        }
        self.order.push_back(hash);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }
}

pub const OUTCOME_UNKNOWN: &str =
    "Transaction confirmed, but the outcome is unknown. Please refresh.";

pub const PENDING_UNREADABLE: &str =
    "Local pending items could not be read. Items placed earlier may need to be resolved elsewhere.";

pub struct Synchronizer<S> {
    game: GameId,
    contract: Address,
    account: Option<Account>,
    store: S,
    pending: Vec<PendingItem>,
    phase: Phase,
    stage: Stage,
    notices: NoticeBoard,
    snapshot: BalanceSnapshot,
    processed: RecentHashes,
    abandoned: RecentHashes,
    next_ticket: u64,
    reads_invalidated: bool,
    last_transition: Option<Instant>,
    animation: Option<RoundResult>,
}

impl<S: PendingStore> Synchronizer<S> {
    pub fn new(game: GameId, contract: Address, store: S, config: &SyncConfig) -> Self {
        Self {
            game,
            contract,
            account: None,
            store,
            pending: Vec::new(),
            phase: Phase::Idle,
            stage: Stage::Ready,
            notices: NoticeBoard::default(),
            snapshot: BalanceSnapshot::default(),
            processed: RecentHashes::new(config.processed_hashes),
            abandoned: RecentHashes::new(config.processed_hashes),
            next_ticket: 0,
            reads_invalidated: false,
            last_transition: None,
            animation: None,
        }
    }

    pub fn game(&self) -> GameId {
        self.game
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn pending(&self) -> &[PendingItem] {
        &self.pending
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn snapshot(&self) -> &BalanceSnapshot {
        &self.snapshot
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn in_flight(&self) -> Option<TransactionAction> {
        self.phase.action().map(GameAction::transaction)
    }

    /// Switches the page to `account`. Everything derived from the previous
    /// account is dropped and its transaction, if any, is abandoned.
    pub fn set_account(&mut self, account: Option<Account>) {
        if self.account == account {
            return;
        }
        self.abandon_in_flight();
        self.account = account;
        self.pending.clear();
        self.notices.clear();
        self.snapshot = BalanceSnapshot {
            account,
            ..Default::default()
        };
        self.stage = Stage::Ready;
        self.animation = None;
        self.last_transition = Some(Instant::now());
        info!(game = %self.game, account = ?account.map(|a| a.to_string()), "account changed");

        if let Some(account) = account {
            if self.game.keeps_pending_items() {
                match self.store.load(&account, self.game) {
                    Ok(items) => {
                        debug!(game = %self.game, %account, items = items.len(), "loaded pending items");
                        self.pending = items;
                    }
                    Err(err) => {
                        warn!(game = %self.game, %account, error = ?err, "pending items unreadable, starting empty");
                        self.notices.open(NoticeLevel::Error, PENDING_UNREADABLE);
                    }
                }
            }
        }
        self.stage = self.resting_stage();
        self.reads_invalidated = true;
    }

    /// Takes a reader snapshot. Snapshots read for another account are
    /// dropped and `false` is returned.
    pub fn ingest_snapshot(&mut self, snapshot: BalanceSnapshot) -> bool {
        if snapshot.account != self.account {
            debug!(game = %self.game, "dropping snapshot for a previous account");
            return false;
        }
        self.snapshot = snapshot;
        self.derive_flip_stage();
        true
    }

    /// Checks preconditions and, when they hold, makes `action` the in-flight
    /// action. The caller submits it and reports back under the ticket.
    pub fn dispatch(&mut self, action: GameAction) -> Result<Ticket, DispatchError> {
        let view = PageView {
            game: self.game,
            account: self.account.as_ref(),
            in_flight: self.phase != Phase::Idle,
            snapshot: &self.snapshot,
            pending: &self.pending,
        };
        if let Err(precondition) = dispatcher::check(&action, &view) {
            let message = precondition.message_for(&action);
            let notice = self.notices.open(NoticeLevel::Error, message.clone());
            info!(game = %self.game, %action, %precondition, "action rejected");
            return Err(DispatchError {
                precondition,
                notice,
                message,
            });
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        let notice = self
            .notices
            .open(NoticeLevel::Loading, action.loading_message());
        if matches!(self.stage, Stage::ResultAvailable(_)) {
            self.stage = self.resting_stage();
        }
        info!(game = %self.game, %ticket, %action, "action dispatched");
        self.set_phase(Phase::AwaitingSubmission {
            ticket,
            action,
            notice,
        });
        Ok(ticket)
    }

    pub fn handle(&mut self, event: ChainEvent) -> Option<ReconcileOutcome> {
        match event {
            ChainEvent::Submitted { ticket, hash } => {
                self.on_submitted(ticket, hash);
                None
            }
            ChainEvent::SubmissionFailed { ticket, error } => {
                self.on_submission_failed(ticket, &error);
                None
            }
            ChainEvent::Confirmed(receipt) => Some(self.on_receipt(receipt)),
            ChainEvent::WaitFailed { hash, reason } => {
                self.on_wait_failed(hash, &reason);
                None
            }
        }
    }

    pub fn on_submitted(&mut self, ticket: Ticket, hash: TxHash) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::AwaitingSubmission {
                ticket: current,
                action,
                notice,
            } if current == ticket => {
                info!(game = %self.game, %ticket, ?hash, "transaction submitted");
                self.notices
                    .update(notice, NoticeLevel::Loading, action.waiting_message());
                self.set_phase(Phase::AwaitingConfirmation {
                    ticket,
                    action,
                    notice,
                    hash,
                });
            }
            other => {
                self.phase = other;
                debug!(game = %self.game, %ticket, ?hash, "submission of an abandoned action");
                self.abandoned.insert(hash);
            }
        }
    }

    pub fn on_submission_failed(&mut self, ticket: Ticket, err: &SubmitError) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::AwaitingSubmission {
                ticket: current,
                action,
                notice,
            } if current == ticket => {
                warn!(game = %self.game, %ticket, %action, error = %err, "submission failed");
                let reason = err.to_string();
                self.notices.update(notice, NoticeLevel::Error, reason.clone());
                self.set_phase(Phase::Failed {
                    action,
                    notice,
                    reason,
                });
                self.set_phase(Phase::Idle);
            }
            other => {
                self.phase = other;
                debug!(game = %self.game, %ticket, "ignoring failure of an abandoned action");
            }
        }
    }

    pub fn on_wait_failed(&mut self, hash: TxHash, reason: &str) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::AwaitingConfirmation {
                action,
                notice,
                hash: current,
                ..
            } if current == hash => {
                warn!(game = %self.game, ?hash, %action, reason, "waiting for confirmation failed");
                self.abandoned.insert(hash);
                self.notices.update(
                    notice,
                    NoticeLevel::Error,
                    format!("Transaction failed: {reason}"),
                );
                self.set_phase(Phase::Failed {
                    action,
                    notice,
                    reason: reason.to_string(),
                });
                self.set_phase(Phase::Idle);
                self.reads_invalidated = true;
            }
            other => {
                self.phase = other;
                debug!(game = %self.game, ?hash, "ignoring wait failure of an abandoned transaction");
            }
        }
    }

    /// Applies a mined receipt. Each hash is reconciled at most once; receipts
    /// of abandoned or unknown transactions change nothing.
    pub fn on_receipt(&mut self, receipt: Receipt) -> ReconcileOutcome {
        let hash = receipt.hash;
        if self.processed.contains(&hash) {
            debug!(game = %self.game, ?hash, "receipt already reconciled");
            return ReconcileOutcome::Duplicate;
        }
        let (action, notice) = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::AwaitingConfirmation {
                action,
                notice,
                hash: current,
                ..
            } if current == hash => (action, notice),
            other => {
                self.phase = other;
                if self.abandoned.contains(&hash) {
                    info!(game = %self.game, ?hash, "ignoring late confirmation");
                } else {
                    debug!(game = %self.game, ?hash, "ignoring receipt of an unknown transaction");
                }
                self.processed.insert(hash);
                return ReconcileOutcome::Stale;
            }
        };
        self.processed.insert(hash);
        self.set_phase(Phase::Reconciling {
            action: action.clone(),
            notice,
            hash,
        });

        if !receipt.success {
            warn!(game = %self.game, ?hash, %action, "transaction reverted");
            let reason = "Transaction failed on-chain.".to_string();
            self.notices
                .update(notice, NoticeLevel::Error, reason.clone());
            self.set_phase(Phase::Failed {
                action,
                notice,
                reason,
            });
            self.reads_invalidated = true;
            self.set_phase(Phase::Idle);
            return ReconcileOutcome::Reverted;
        }

        let outcome = match decode_effect(&action, self.contract, &receipt.logs, Utc::now()) {
            Ok(effect) => {
                self.apply(&action, notice, effect.clone());
                ReconcileOutcome::Applied(effect)
            }
            Err(missing) => {
                warn!(game = %self.game, ?hash, %action, %missing, "outcome unknown");
                self.notices.update(notice, NoticeLevel::Error, OUTCOME_UNKNOWN);
                ReconcileOutcome::OutcomeUnknown
            }
        };
        self.reads_invalidated = true;
        self.set_phase(Phase::Idle);
        outcome
    }

    /// Stops waiting for the in-flight action. Its transaction may still land;
    /// that receipt is then ignored.
    pub fn cancel(&mut self) -> bool {
        let Some(notice) = self.abandon_in_flight() else {
            return false;
        };
        self.notices.update(
            notice,
            NoticeLevel::Info,
            "Stopped waiting. The transaction may still land; refresh later.",
        );
        self.reads_invalidated = true;
        true
    }

    /// Dismisses a shown result.
    pub fn acknowledge_result(&mut self) {
        if matches!(self.stage, Stage::ResultAvailable(_)) {
            self.stage = self.resting_stage();
        }
    }

    /// Merges items exported from the browser client into the current
    /// account's list and persists it. Known ids are skipped; returns how many
    /// items were added.
    pub fn import_legacy(&mut self, json: &str) -> crate::Result<usize> {
        let Some(account) = self.account else {
            anyhow::bail!("no account to import pending items for");
        };
        let mut added = 0;
        for item in pending::parse_legacy(self.game, json)? {
            if self.pending.iter().any(|known| known.id == item.id) {
                continue;
            }
            self.pending.push(item);
            added += 1;
        }
        info!(game = %self.game, %account, added, "imported legacy pending items");
        if added == 0 {
            return Ok(0);
        }
        self.persist()?;
        if self.stage == Stage::Ready {
            self.stage = self.resting_stage();
        }
        self.notices
            .open(NoticeLevel::Info, format!("Imported {added} pending items."));
        Ok(added)
    }

    /// Whether a transition since the last call asked for a re-poll.
    pub fn take_read_invalidation(&mut self) -> bool {
        std::mem::take(&mut self.reads_invalidated)
    }

    /// Result whose animation has not been started yet.
    pub fn take_animation(&mut self) -> Option<RoundResult> {
        self.animation.take()
    }

    fn abandon_in_flight(&mut self) -> Option<NoticeId> {
        let notice = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => return None,
            Phase::AwaitingSubmission { ticket, notice, .. } => {
                info!(game = %self.game, %ticket, "abandoned before submission");
                notice
            }
            Phase::AwaitingConfirmation { hash, notice, .. }
            | Phase::Reconciling { hash, notice, .. } => {
                info!(game = %self.game, ?hash, "abandoned while awaiting confirmation");
                self.abandoned.insert(hash);
                notice
            }
            Phase::Failed { notice, .. } => notice,
        };
        self.last_transition = Some(Instant::now());
        Some(notice)
    }

    fn apply(&mut self, action: &GameAction, notice: NoticeId, effect: Effect) {
        let mut message = success_message(action, &effect);
        let mut level = NoticeLevel::Success;
        let mut store_changed = false;
        match effect {
            Effect::Opened(item) => {
                if self.pending.iter().all(|existing| existing.id != item.id) {
                    info!(game = %self.game, id = %item.id, "pending item opened");
                    self.pending.push(item);
                    store_changed = true;
                }
                self.stage = Stage::AwaitingResolution;
            }
            Effect::BetLocked => self.stage = Stage::AwaitingResolution,
            Effect::Settled { id, result } => {
                if let Some(id) = id {
                    let before = self.pending.len();
                    self.pending.retain(|item| item.id != id);
                    store_changed = self.pending.len() != before;
                    info!(game = %self.game, %id, win = result.win, "pending item settled");
                }
                if !result.win {
                    level = NoticeLevel::Info;
                }
                self.animation = Some(result.clone());
                self.stage = Stage::ResultAvailable(result);
            }
            Effect::Claimed => self.stage = Stage::Ready,
            Effect::Channeled | Effect::Transferred => {}
        }

        if store_changed {
            if let Err(err) = self.persist() {
                error!(game = %self.game, error = ?err, "saving pending items failed");
                message.push_str(" (could not save pending items locally)");
                level = NoticeLevel::Error;
            }
        }
        self.notices.update(notice, level, message);
    }

    fn persist(&mut self) -> crate::Result<()> {
        let Some(account) = self.account else {
            return Ok(());
        };
        self.store.save(&account, self.game, &self.pending)
    }

    fn resting_stage(&self) -> Stage {
        if self.game.keeps_pending_items() && !self.pending.is_empty() {
            Stage::AwaitingResolution
        } else {
            Stage::Ready
        }
    }

    fn derive_flip_stage(&mut self) {
        if self.game != GameId::CoinFlip || self.phase != Phase::Idle {
            return;
        }
        let fresh = |key| {
            self.snapshot
                .fetched_at(key)
                .is_some_and(|at| self.last_transition.is_none_or(|t| at >= t))
        };
        if !fresh(ReadKey::PendingPoints) || !fresh(ReadKey::HasActiveBet) {
            return;
        }
        let (Some(pending_points), Some(active)) = (
            self.snapshot.amount(ReadKey::PendingPoints),
            self.snapshot.flag(ReadKey::HasActiveBet),
        ) else {
            return;
        };
        let derived = if !pending_points.is_zero() {
            Stage::Claimable
        } else if active {
            Stage::AwaitingResolution
        } else {
            Stage::Ready
        };
        if matches!(self.stage, Stage::ResultAvailable(_))
            && matches!(derived, Stage::Ready | Stage::Claimable)
        {
            return;
        }
        self.stage = derived;
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!(game = %self.game, from = self.phase.name(), to = phase.name(), "phase");
        self.phase = phase;
        self.last_transition = Some(Instant::now());
    }
}

fn success_message(action: &GameAction, effect: &Effect) -> String {
    match (effect, action) {
        (Effect::Opened(item), GameAction::RiftPlaceBet { .. }) => {
            format!("Bet #{} is now active!", item.id)
        }
        (Effect::Opened(item), _) => format!("Strike #{} is ready to be resolved!", item.id),
        (Effect::BetLocked, _) => "Your bet is locked. Flip the coin!".to_string(),
        (Effect::Settled { result, .. }, _) => result.headline(),
        (Effect::Channeled, _) => "Channeling Confirmed!".to_string(),
        (Effect::Claimed, GameAction::CascadeCollect) => {
            "Winnings collected successfully!".to_string()
        }
        (Effect::Claimed, _) => "Points claimed!".to_string(),
        (Effect::Transferred, GameAction::BuyCoins { .. }) => {
            "Coins purchased successfully!".to_string()
        }
        (Effect::Transferred, GameAction::RedeemPoints { .. }) => {
            "Redemption Successful! Your legend grows.".to_string()
        }
        (Effect::Transferred, GameAction::PlinkoDeposit { .. }) => {
            "Deposit confirmed.".to_string()
        }
        (Effect::Transferred, GameAction::PlinkoWithdraw { .. }) => {
            "Withdrawal confirmed.".to_string()
        }
        (Effect::Transferred, _) => "Transaction confirmed.".to_string(),
    }
}

#[cfg(test)]
mod tests;
