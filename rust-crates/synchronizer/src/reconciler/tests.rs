#![allow(non_snake_case)]

use ethers::types::U256;
use generated_abi::test_helpers::{
    alice,
    anvil_struck_log,
    bob,
    coin_flipped_log,
    forge_settled_log,
    test_address,
    test_tx_hash,
    unrelated_log,
};
use proptest::prelude::*;

use super::*;
use crate::{
    decode::Effect,
    dispatcher::Precondition,
    outcome::ResultDetail,
    pending::{
        InMemoryPendingStore,
        ItemKind,
    },
    reads::{
        BalanceReader,
        ReadValue,
    },
};

fn anvil() -> Address {
    test_address(0x0a)
}

fn coinflip() -> Address {
    test_address(0x0c)
}

fn snapshot_for(account: Account, game: GameId, values: &[(ReadKey, ReadValue)]) -> BalanceSnapshot {
    let now = Instant::now();
    let mut reader = BalanceReader::new(game, 5, now);
    reader.set_account(Some(account), now);
    for (key, value) in values {
        reader.record(Some(account), *key, Ok(*value), now);
    }
    reader.snapshot().clone()
}

fn coins(n: u64) -> (ReadKey, ReadValue) {
    (ReadKey::Coins, ReadValue::Amount(U256::from(n)))
}

fn anvil_page(store: InMemoryPendingStore, coin_balance: u64) -> Synchronizer<InMemoryPendingStore> {
    let mut sync = Synchronizer::new(GameId::Anvil, anvil(), store, &SyncConfig::default());
    let account = Account(alice());
    sync.set_account(Some(account));
    sync.ingest_snapshot(snapshot_for(account, GameId::Anvil, &[coins(coin_balance)]));
    sync.take_read_invalidation();
    sync
}

fn strike_and_confirm(sync: &mut Synchronizer<InMemoryPendingStore>, strike_id: u64, hash_seed: u64) {
    let ticket = sync.dispatch(GameAction::AnvilStrike).unwrap();
    let hash = test_tx_hash(hash_seed);
    sync.on_submitted(ticket, hash);
    let receipt = Receipt::success(
        hash,
        vec![anvil_struck_log(anvil(), alice(), U256::from(strike_id))],
    );
    let outcome = sync.on_receipt(receipt);
    assert!(matches!(outcome, ReconcileOutcome::Applied(Effect::Opened(_))));
}

fn pending_ids(items: &[PendingItem]) -> Vec<U256> {
    items.iter().map(|item| item.id).collect()
}

#[test]
fn dispatch__strike_with_zero_coins_is_rejected_without_submitting() {
    // given
    let mut sync = anvil_page(InMemoryPendingStore::new(), 0);

    // when
    let err = sync.dispatch(GameAction::AnvilStrike).unwrap_err();

    // then
    assert!(matches!(
        err.precondition,
        Precondition::InsufficientBalance { .. }
    ));
    assert_eq!(sync.phase(), &Phase::Idle);
    assert_eq!(sync.in_flight(), None);
    let notice = sync.notices().get(err.notice).unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "You need 10 coins to strike the anvil.");
}

#[test]
fn on_receipt__strike_stores_item_and_invalidates_reads() {
    // given
    let store = InMemoryPendingStore::new();
    let mut sync = anvil_page(store.clone(), 10);
    let ticket = sync.dispatch(GameAction::AnvilStrike).unwrap();
    let hash = test_tx_hash(1);
    sync.on_submitted(ticket, hash);
    let receipt = Receipt::success(
        hash,
        vec![
            unrelated_log(anvil()),
            anvil_struck_log(anvil(), alice(), U256::from(7)),
        ],
    );

    // when
    let outcome = sync.on_receipt(receipt);

    // then
    assert!(matches!(outcome, ReconcileOutcome::Applied(Effect::Opened(_))));
    assert_eq!(pending_ids(sync.pending()), vec![U256::from(7)]);
    let stored = store.load(&Account(alice()), GameId::Anvil).unwrap();
    assert_eq!(pending_ids(&stored), vec![U256::from(7)]);
    assert_eq!(stored[0].kind, ItemKind::AnvilStrike);
    assert_eq!(sync.stage(), &Stage::AwaitingResolution);
    assert_eq!(sync.phase(), &Phase::Idle);
    assert!(sync.take_read_invalidation());
    assert_eq!(
        sync.notices().latest().unwrap().message,
        "Strike #7 is ready to be resolved!"
    );
}

#[test]
fn on_receipt__zero_award_settlement_is_a_loss_and_removes_item() {
    // given
    let store = InMemoryPendingStore::new();
    let mut sync = anvil_page(store.clone(), 10);
    strike_and_confirm(&mut sync, 7, 1);
    let ticket = sync
        .dispatch(GameAction::AnvilResolve {
            strike_id: U256::from(7),
        })
        .unwrap();
    let hash = test_tx_hash(2);
    sync.on_submitted(ticket, hash);

    // when
    let outcome = sync.on_receipt(Receipt::success(
        hash,
        vec![forge_settled_log(
            anvil(),
            alice(),
            U256::from(7),
            "Fizzle",
            U256::zero(),
            U256::zero(),
        )],
    ));

    // then
    let ReconcileOutcome::Applied(Effect::Settled { id, result }) = outcome else {
        panic!("expected a settlement, got {outcome:?}");
    };
    assert_eq!(id, Some(U256::from(7)));
    assert!(!result.win);
    assert!(sync.pending().is_empty());
    assert!(store.load(&Account(alice()), GameId::Anvil).unwrap().is_empty());
    assert_eq!(sync.stage(), &Stage::ResultAvailable(result.clone()));
    assert_eq!(sync.take_animation(), Some(result));
    assert_eq!(sync.notices().latest().unwrap().level, NoticeLevel::Info);
}

#[test]
fn on_receipt__missing_event_reports_unknown_outcome_and_leaves_store() {
    // given
    let store = InMemoryPendingStore::new();
    let mut sync = anvil_page(store.clone(), 10);
    strike_and_confirm(&mut sync, 7, 1);
    let ticket = sync
        .dispatch(GameAction::AnvilResolve {
            strike_id: U256::from(7),
        })
        .unwrap();
    let hash = test_tx_hash(2);
    sync.on_submitted(ticket, hash);

    // when
    let outcome = sync.on_receipt(Receipt::success(hash, vec![unrelated_log(anvil())]));

    // then
    assert_eq!(outcome, ReconcileOutcome::OutcomeUnknown);
    assert_eq!(pending_ids(sync.pending()), vec![U256::from(7)]);
    assert_eq!(
        pending_ids(&store.load(&Account(alice()), GameId::Anvil).unwrap()),
        vec![U256::from(7)]
    );
    assert_eq!(sync.phase(), &Phase::Idle);
    let notice = sync.notices().latest().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, OUTCOME_UNKNOWN);
}

#[test]
fn on_receipt__same_hash_is_reconciled_once() {
    // given
    let mut sync = anvil_page(InMemoryPendingStore::new(), 20);
    let ticket = sync.dispatch(GameAction::AnvilStrike).unwrap();
    let hash = test_tx_hash(1);
    sync.on_submitted(ticket, hash);
    let receipt = Receipt::success(hash, vec![anvil_struck_log(anvil(), alice(), U256::from(7))]);
    sync.on_receipt(receipt.clone());

    // when
    let second = sync.on_receipt(receipt);

    // then
    assert_eq!(second, ReconcileOutcome::Duplicate);
    assert_eq!(sync.pending().len(), 1);
}

#[test]
fn dispatch__second_action_while_in_flight_is_rejected() {
    // given
    let mut sync = anvil_page(InMemoryPendingStore::new(), 100);
    sync.dispatch(GameAction::AnvilStrike).unwrap();

    // when
    let err = sync.dispatch(GameAction::AnvilStrike).unwrap_err();

    // then
    assert_eq!(err.precondition, Precondition::ActionInFlight);
    assert_eq!(
        sync.in_flight(),
        Some(TransactionAction {
            kind: crate::ActionKind::Submit,
            related_id: None,
        })
    );
}

#[test]
fn on_submission_failed__clears_in_flight_and_keeps_store() {
    // given
    let store = InMemoryPendingStore::new();
    let mut sync = anvil_page(store.clone(), 10);
    let ticket = sync.dispatch(GameAction::AnvilStrike).unwrap();

    // when
    sync.on_submission_failed(ticket, &SubmitError::Rejected);

    // then
    assert_eq!(sync.phase(), &Phase::Idle);
    let notice = sync.notices().latest().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Transaction rejected.");
    assert!(store.load(&Account(alice()), GameId::Anvil).unwrap().is_empty());
}

#[test]
fn on_receipt__reverted_transaction_leaves_store_untouched() {
    // given
    let store = InMemoryPendingStore::new();
    let mut sync = anvil_page(store.clone(), 10);
    let ticket = sync.dispatch(GameAction::AnvilStrike).unwrap();
    let hash = test_tx_hash(3);
    sync.on_submitted(ticket, hash);

    // when
    let outcome = sync.on_receipt(Receipt::reverted(hash));

    // then
    assert_eq!(outcome, ReconcileOutcome::Reverted);
    assert!(sync.pending().is_empty());
    assert!(store.load(&Account(alice()), GameId::Anvil).unwrap().is_empty());
    assert_eq!(sync.phase(), &Phase::Idle);
    assert_eq!(
        sync.notices().latest().unwrap().message,
        "Transaction failed on-chain."
    );
}

#[test]
fn on_receipt__late_confirmation_after_cancel_is_ignored() {
    // given
    let store = InMemoryPendingStore::new();
    let mut sync = anvil_page(store.clone(), 10);
    let ticket = sync.dispatch(GameAction::AnvilStrike).unwrap();
    let hash = test_tx_hash(4);
    sync.on_submitted(ticket, hash);
    assert!(sync.cancel());

    // when
    let outcome = sync.on_receipt(Receipt::success(
        hash,
        vec![anvil_struck_log(anvil(), alice(), U256::from(9))],
    ));

    // then
    assert_eq!(outcome, ReconcileOutcome::Stale);
    assert!(sync.pending().is_empty());
    assert!(store.load(&Account(alice()), GameId::Anvil).unwrap().is_empty());
}

#[test]
fn on_submitted__hash_of_cancelled_action_is_abandoned() {
    // given
    let mut sync = anvil_page(InMemoryPendingStore::new(), 10);
    let ticket = sync.dispatch(GameAction::AnvilStrike).unwrap();
    sync.cancel();
    let hash = test_tx_hash(5);

    // when
    sync.on_submitted(ticket, hash);
    let outcome = sync.on_receipt(Receipt::success(
        hash,
        vec![anvil_struck_log(anvil(), alice(), U256::from(1))],
    ));

    // then
    assert_eq!(sync.phase(), &Phase::Idle);
    assert_eq!(outcome, ReconcileOutcome::Stale);
}

#[test]
fn on_wait_failed__returns_to_idle_with_error_notice() {
    // given
    let mut sync = anvil_page(InMemoryPendingStore::new(), 10);
    let ticket = sync.dispatch(GameAction::AnvilStrike).unwrap();
    let hash = test_tx_hash(6);
    sync.on_submitted(ticket, hash);

    // when
    sync.on_wait_failed(hash, "no receipt after 120s");

    // then
    assert_eq!(sync.phase(), &Phase::Idle);
    assert_eq!(
        sync.notices().latest().unwrap().message,
        "Transaction failed: no receipt after 120s"
    );
}

#[test]
fn set_account__isolates_and_restores_pending_items() {
    // given
    let store = InMemoryPendingStore::new();
    let mut sync = anvil_page(store, 10);
    strike_and_confirm(&mut sync, 7, 1);

    // when
    sync.set_account(Some(Account(bob())));
    let bobs = pending_ids(sync.pending());
    sync.set_account(Some(Account(alice())));

    // then
    assert!(bobs.is_empty());
    assert_eq!(pending_ids(sync.pending()), vec![U256::from(7)]);
    assert_eq!(sync.stage(), &Stage::AwaitingResolution);
}

#[test]
fn set_account__abandons_transaction_of_previous_account() {
    // given
    let store = InMemoryPendingStore::new();
    let mut sync = anvil_page(store.clone(), 10);
    let ticket = sync.dispatch(GameAction::AnvilStrike).unwrap();
    let hash = test_tx_hash(8);
    sync.on_submitted(ticket, hash);

    // when
    sync.set_account(Some(Account(bob())));
    let outcome = sync.on_receipt(Receipt::success(
        hash,
        vec![anvil_struck_log(anvil(), alice(), U256::from(3))],
    ));

    // then
    assert_eq!(outcome, ReconcileOutcome::Stale);
    assert!(store.load(&Account(alice()), GameId::Anvil).unwrap().is_empty());
    assert!(store.load(&Account(bob()), GameId::Anvil).unwrap().is_empty());
}

#[test]
fn ingest_snapshot__drops_snapshot_of_previous_account() {
    // given
    let mut sync = anvil_page(InMemoryPendingStore::new(), 10);
    let stale = snapshot_for(Account(bob()), GameId::Anvil, &[coins(500)]);

    // when
    let accepted = sync.ingest_snapshot(stale);

    // then
    assert!(!accepted);
    assert_eq!(sync.snapshot().amount(ReadKey::Coins), Some(U256::from(10)));
}

/// Store whose records cannot be decoded.
struct UnreadableStore;

impl PendingStore for UnreadableStore {
    fn load(&self, _account: &Account, _game: GameId) -> crate::Result<Vec<PendingItem>> {
        Err(anyhow::anyhow!("deserialize pending items: expected a sequence"))
    }

    fn save(&mut self, _account: &Account, _game: GameId, _items: &[PendingItem]) -> crate::Result<()> {
        Ok(())
    }
}

#[test]
fn set_account__unreadable_pending_items_start_empty_with_notice() {
    // given
    let mut sync = Synchronizer::new(GameId::Anvil, anvil(), UnreadableStore, &SyncConfig::default());
    let account = Account(alice());

    // when
    sync.set_account(Some(account));

    // then
    assert_eq!(sync.account(), Some(&account));
    assert!(sync.pending().is_empty());
    assert_eq!(sync.stage(), &Stage::Ready);
    assert!(sync.take_read_invalidation());
    let notice = sync.notices().latest().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, PENDING_UNREADABLE);

    sync.ingest_snapshot(snapshot_for(account, GameId::Anvil, &[coins(10)]));
    assert!(sync.dispatch(GameAction::AnvilStrike).is_ok());
}

#[test]
fn import_legacy__imported_items_survive_a_later_strike() {
    // given
    let store = InMemoryPendingStore::new();
    let mut sync = anvil_page(store.clone(), 10);

    // when
    let added = sync.import_legacy(r#"["5n","6n"]"#).unwrap();
    strike_and_confirm(&mut sync, 7, 1);

    // then
    assert_eq!(added, 2);
    let expected = vec![U256::from(5), U256::from(6), U256::from(7)];
    assert_eq!(pending_ids(sync.pending()), expected);
    let stored = store.load(&Account(alice()), GameId::Anvil).unwrap();
    assert_eq!(pending_ids(&stored), expected);
}

#[test]
fn import_legacy__skips_known_ids_and_needs_an_account() {
    // given
    let mut sync = anvil_page(InMemoryPendingStore::new(), 10);
    strike_and_confirm(&mut sync, 5, 1);
    let mut disconnected = Synchronizer::new(
        GameId::Anvil,
        anvil(),
        InMemoryPendingStore::new(),
        &SyncConfig::default(),
    );

    // when
    let added = sync.import_legacy(r#"["5n","6n"]"#).unwrap();
    let without_account = disconnected.import_legacy(r#"["5n"]"#);

    // then
    assert_eq!(added, 1);
    assert_eq!(pending_ids(sync.pending()), vec![U256::from(5), U256::from(6)]);
    assert!(without_account.is_err());
    assert!(disconnected.pending().is_empty());
}

fn flip_page() -> Synchronizer<InMemoryPendingStore> {
    let mut sync = Synchronizer::new(
        GameId::CoinFlip,
        coinflip(),
        InMemoryPendingStore::new(),
        &SyncConfig::default(),
    );
    sync.set_account(Some(Account(alice())));
    sync
}

fn flip_reads(coin_balance: u64, active: bool, pending_points: u64) -> BalanceSnapshot {
    snapshot_for(
        Account(alice()),
        GameId::CoinFlip,
        &[
            coins(coin_balance),
            (ReadKey::HasActiveBet, ReadValue::Flag(active)),
            (
                ReadKey::PendingPoints,
                ReadValue::Amount(U256::from(pending_points)),
            ),
        ],
    )
}

#[test]
fn ingest_snapshot__derives_coin_flip_stage_from_reads() {
    // given
    let mut sync = flip_page();

    // when
    sync.ingest_snapshot(flip_reads(5, true, 0));
    let flipping = sync.stage().clone();
    sync.ingest_snapshot(flip_reads(5, false, 2));
    let finished = sync.stage().clone();
    sync.ingest_snapshot(flip_reads(5, false, 0));
    let choosing = sync.stage().clone();

    // then
    assert_eq!(flipping, Stage::AwaitingResolution);
    assert_eq!(finished, Stage::Claimable);
    assert_eq!(choosing, Stage::Ready);
}

#[test]
fn ingest_snapshot__reads_older_than_last_transition_do_not_move_stage() {
    // given
    let mut sync = flip_page();
    let old_reads = flip_reads(5, false, 0);
    let ticket = sync
        .dispatch_after(old_reads.clone(), GameAction::FlipPlaceBet { heads: true });
    let hash = test_tx_hash(10);
    sync.on_submitted(ticket, hash);
    sync.on_receipt(Receipt::success(hash, vec![]));

    // when
    sync.ingest_snapshot(old_reads);

    // then
    assert_eq!(sync.stage(), &Stage::AwaitingResolution);
}

#[test]
fn on_receipt__flip_result_is_shown_until_acknowledged() {
    // given
    let mut sync = flip_page();
    sync.ingest_snapshot(flip_reads(5, true, 0));
    let ticket = sync.dispatch(GameAction::FlipCoin).unwrap();
    let hash = test_tx_hash(11);
    sync.on_submitted(ticket, hash);

    // when
    sync.on_receipt(Receipt::success(
        hash,
        vec![coin_flipped_log(coinflip(), alice(), false, true)],
    ));
    sync.ingest_snapshot(flip_reads(5, false, 0));
    let shown = sync.stage().clone();
    sync.acknowledge_result();

    // then
    let Stage::ResultAvailable(result) = shown else {
        panic!("expected a result, got {shown:?}");
    };
    assert_eq!(result.detail, ResultDetail::Coin { heads: true });
    assert!(!result.win);
    assert_eq!(sync.stage(), &Stage::Ready);
}

impl Synchronizer<InMemoryPendingStore> {
    /// Dispatches with `reads` in place as if they had just been polled.
    fn dispatch_after(&mut self, reads: BalanceSnapshot, action: GameAction) -> Ticket {
        self.ingest_snapshot(reads);
        self.dispatch(action).unwrap()
    }
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Dispatch,
    Submit,
    RejectSubmission,
    Confirm { with_event: bool },
    ConfirmAgain,
    FailWait,
    Cancel,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Dispatch),
        Just(Step::Submit),
        Just(Step::RejectSubmission),
        any::<bool>().prop_map(|with_event| Step::Confirm { with_event }),
        Just(Step::ConfirmAgain),
        Just(Step::FailWait),
        Just(Step::Cancel),
    ]
}

proptest! {
    #[test]
    fn synchronizer__never_holds_two_actions_in_flight(steps in prop::collection::vec(step(), 1..40)) {
        let store = InMemoryPendingStore::new();
        let mut sync = anvil_page(store.clone(), 1_000);
        let mut ticket = None;
        let mut hash = None;
        let mut seed = 100;
        let mut applied = std::collections::HashMap::new();

        for step in steps {
            let was_in_flight = sync.in_flight().is_some();
            match step {
                Step::Dispatch => {
                    let result = sync.dispatch(GameAction::AnvilStrike);
                    if was_in_flight {
                        prop_assert_eq!(
                            result.map_err(|e| e.precondition),
                            Err(Precondition::ActionInFlight)
                        );
                    } else {
                        ticket = result.ok();
                        hash = None;
                    }
                }
                Step::Submit => {
                    if let Some(t) = ticket.take() {
                        seed += 1;
                        let h = test_tx_hash(seed);
                        sync.on_submitted(t, h);
                        hash = Some(h);
                    }
                }
                Step::RejectSubmission => {
                    if let Some(t) = ticket.take() {
                        sync.on_submission_failed(t, &SubmitError::Rejected);
                    }
                }
                Step::Confirm { .. } | Step::ConfirmAgain if hash.is_some() => {
                    let h = hash.unwrap_or_default();
                    let logs = match step {
                        Step::Confirm { with_event: true } => {
                            vec![anvil_struck_log(anvil(), alice(), U256::from(seed))]
                        }
                        _ => vec![],
                    };
                    if let ReconcileOutcome::Applied(_) = sync.on_receipt(Receipt::success(h, logs)) {
                        *applied.entry(h).or_insert(0) += 1;
                    }
                }
                Step::Confirm { .. } | Step::ConfirmAgain => {}
                Step::FailWait => {
                    if let Some(h) = hash {
                        sync.on_wait_failed(h, "dropped");
                    }
                }
                Step::Cancel => {
                    sync.cancel();
                }
            }

            prop_assert_eq!(sync.in_flight().is_some(), sync.phase() != &Phase::Idle);
            prop_assert!(
                matches!(
                    sync.phase(),
                    Phase::Idle | Phase::AwaitingSubmission { .. } | Phase::AwaitingConfirmation { .. }
                ),
                "transient phase leaked: {:?}",
                sync.phase()
            );
        }

        prop_assert!(applied.values().all(|count| *count == 1));
        let stored = store.load(&Account(alice()), GameId::Anvil).unwrap();
        prop_assert_eq!(pending_ids(&stored), pending_ids(sync.pending()));
    }
}
