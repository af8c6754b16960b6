#![allow(non_snake_case)]

mod common;

use common::{
    TestContext,
    anvil,
    play,
};
use ethers::types::U256;
use generated_abi::test_helpers::{
    alice,
    anvil_struck_log,
    test_tx_hash,
    unrelated_log,
};
use synchronizer::{
    Account,
    GameAction,
    GameId,
    Phase,
    ReconcileOutcome,
    Stage,
    chain::SubmitError,
    notices::NoticeLevel,
    pending::PendingStore,
    receipt::Receipt,
    reconciler::OUTCOME_UNKNOWN,
};

fn player() -> Account {
    Account::from(alice())
}

fn has_notice(page: &synchronizer::Synchronizer<impl PendingStore>, message: &str) -> bool {
    page.notices().iter().any(|notice| notice.message == message)
}

#[tokio::test]
async fn on_receipt__missing_event_reports_unknown_outcome_and_keeps_the_store() {
    let ctx = TestContext::new();
    let mut page = ctx.page(GameId::Anvil, player(), 25);

    // given
    ctx.chain
        .mine(test_tx_hash(1), vec![unrelated_log(anvil())]);

    // when
    let outcome = play(&mut page, &ctx.chain, GameAction::AnvilStrike).await;

    // then
    assert_eq!(outcome, Some(ReconcileOutcome::OutcomeUnknown));
    assert!(has_notice(&page, OUTCOME_UNKNOWN));
    assert_eq!(page.phase(), &Phase::Idle);
    assert!(page.pending().is_empty());
    assert!(ctx.store().load(&player(), GameId::Anvil).unwrap().is_empty());
    assert!(page.take_read_invalidation());
}

#[tokio::test]
async fn on_receipt__reverted_transaction_changes_no_items() {
    let ctx = TestContext::new();
    let mut page = ctx.page(GameId::Anvil, player(), 25);

    // given
    ctx.chain.revert(test_tx_hash(1));

    // when
    let outcome = play(&mut page, &ctx.chain, GameAction::AnvilStrike).await;

    // then
    assert_eq!(outcome, Some(ReconcileOutcome::Reverted));
    assert!(has_notice(&page, "Transaction failed on-chain."));
    assert_eq!(page.stage(), &Stage::Ready);
    assert!(ctx.store().load(&player(), GameId::Anvil).unwrap().is_empty());
}

#[tokio::test]
async fn wait_failure__returns_to_idle_with_an_error_notice() {
    let ctx = TestContext::new();
    let mut page = ctx.page(GameId::Anvil, player(), 25);

    // given
    ctx.chain.lose(test_tx_hash(1), "connection reset");

    // when
    let outcome = play(&mut page, &ctx.chain, GameAction::AnvilStrike).await;

    // then
    assert_eq!(outcome, None);
    assert_eq!(page.phase(), &Phase::Idle);
    assert!(has_notice(&page, "Transaction failed: connection reset"));
    assert!(page.pending().is_empty());

    // a late receipt for the lost hash is ignored
    let late = page.on_receipt(Receipt::success(
        test_tx_hash(1),
        vec![anvil_struck_log(anvil(), alice(), U256::from(3))],
    ));
    assert_eq!(late, ReconcileOutcome::Stale);
    assert!(page.pending().is_empty());
}

#[tokio::test]
async fn submission_rejected__leaves_the_page_ready_for_another_try() {
    let ctx = TestContext::new();
    let mut page = ctx.page(GameId::Anvil, player(), 25);

    // given
    ctx.chain.reject(SubmitError::Rejected);
    ctx.chain.mine(
        test_tx_hash(2),
        vec![anvil_struck_log(anvil(), alice(), U256::from(9))],
    );

    // when
    let first = play(&mut page, &ctx.chain, GameAction::AnvilStrike).await;
    let second = play(&mut page, &ctx.chain, GameAction::AnvilStrike).await;

    // then
    assert_eq!(first, None);
    assert!(
        page.notices()
            .iter()
            .any(|notice| notice.level == NoticeLevel::Error
                && notice.message == "Transaction rejected.")
    );
    assert!(matches!(second, Some(ReconcileOutcome::Applied(_))));
    assert_eq!(page.pending().len(), 1);
}

#[tokio::test]
async fn cancel__late_confirmation_is_ignored() {
    let ctx = TestContext::new();
    let mut page = ctx.page(GameId::Anvil, player(), 25);
    let hash = test_tx_hash(4);

    // given
    let ticket = page.dispatch(GameAction::AnvilStrike).unwrap();
    page.on_submitted(ticket, hash);
    assert!(page.in_flight().is_some());

    // when
    assert!(page.cancel());
    let late = page.on_receipt(Receipt::success(
        hash,
        vec![anvil_struck_log(anvil(), alice(), U256::from(11))],
    ));

    // then
    assert_eq!(late, ReconcileOutcome::Stale);
    assert_eq!(page.phase(), &Phase::Idle);
    assert!(page.pending().is_empty());
    assert!(ctx.store().load(&player(), GameId::Anvil).unwrap().is_empty());
    assert!(page.dispatch(GameAction::AnvilStrike).is_ok());
}

#[tokio::test]
async fn on_receipt__second_delivery_of_a_receipt_is_a_duplicate() {
    let ctx = TestContext::new();
    let mut page = ctx.page(GameId::Anvil, player(), 25);
    let logs = vec![anvil_struck_log(anvil(), alice(), U256::from(5))];

    // given
    ctx.chain.mine(test_tx_hash(1), logs.clone());
    play(&mut page, &ctx.chain, GameAction::AnvilStrike).await;

    // when
    let again = page.on_receipt(Receipt::success(test_tx_hash(1), logs));

    // then
    assert_eq!(again, ReconcileOutcome::Duplicate);
    assert_eq!(page.pending().len(), 1);
    assert_eq!(
        ctx.store().load(&player(), GameId::Anvil).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn dispatch__second_action_while_one_is_in_flight_is_refused() {
    let ctx = TestContext::new();
    let mut page = ctx.page(GameId::Anvil, player(), 25);

    // given
    page.dispatch(GameAction::AnvilStrike).unwrap();

    // when
    let second = page.dispatch(GameAction::AnvilStrike);

    // then
    assert!(second.is_err());
    assert!(matches!(page.phase(), Phase::AwaitingSubmission { .. }));
}
