//! Preconditions checked before an action is handed to the wallet.

use ethers::types::U256;
use thiserror::Error;

use crate::{
    Account,
    GameId,
    action::GameAction,
    games::{
        self,
        ANVIL_STRIKE_COST,
    },
    notices::NoticeId,
    pending::PendingItem,
    reads::{
        BalanceSnapshot,
        ReadKey,
    },
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Precondition {
    #[error("Please connect your wallet first.")]
    NotConnected,
    #[error("Another transaction is still in flight.")]
    ActionInFlight,
    #[error("Not enough {}: need {need}, have {}.", .read.label().to_lowercase(), show(.have))]
    InsufficientBalance {
        read: ReadKey,
        have: Option<U256>,
        need: U256,
    },
    #[error("The minimum is {min}, got {got}.")]
    BelowMinimum { min: U256, got: U256 },
    #[error("#{0} is not one of your pending items.")]
    UnknownPendingItem(U256),
    #[error("There is nothing to claim yet.")]
    NothingToClaim,
    #[error("A {action} action cannot run on the {page} page.")]
    WrongGame { page: GameId, action: GameId },
    #[error("That choice is not on the table.")]
    BadChoice,
}

fn show(value: &Option<U256>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "unknown".to_string(),
    }
}

impl Precondition {
    /// Notice text for a rejected `action`, worded the way each page asks.
    pub fn message_for(&self, action: &GameAction) -> String {
        match (self, action) {
            (Precondition::InsufficientBalance { .. }, GameAction::AnvilStrike) => {
                format!("You need {ANVIL_STRIKE_COST} coins to strike the anvil.")
            }
            (Precondition::InsufficientBalance { .. }, GameAction::FlipPlaceBet { .. }) => {
                "You need at least 1 coin to play.".to_string()
            }
            (
                Precondition::InsufficientBalance { .. },
                GameAction::PlinkoDrop { .. } | GameAction::PlinkoWithdraw { .. },
            ) => "Not enough in-game balance.".to_string(),
            (Precondition::InsufficientBalance { .. }, GameAction::RedeemPoints { .. }) => {
                "You do not have enough points for this prize.".to_string()
            }
            (Precondition::InsufficientBalance { .. }, GameAction::AltarChannel { .. }) => {
                "Not enough coins to channel.".to_string()
            }
            (Precondition::BelowMinimum { min, .. }, GameAction::AltarChannel { .. }) => {
                format!("You must channel at least {min} coins.")
            }
            (Precondition::BelowMinimum { .. }, GameAction::BuyCoins { .. }) => {
                "Please enter a valid amount.".to_string()
            }
            (Precondition::BelowMinimum { .. }, _) => "Please enter a bet amount.".to_string(),
            _ => self.to_string(),
        }
    }
}

/// A precondition failure, with the notice that reported it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DispatchError {
    pub precondition: Precondition,
    pub notice: NoticeId,
    pub message: String,
}

/// Page state the preconditions look at.
#[derive(Clone, Copy, Debug)]
pub struct PageView<'a> {
    pub game: GameId,
    pub account: Option<&'a Account>,
    pub in_flight: bool,
    pub snapshot: &'a BalanceSnapshot,
    pub pending: &'a [PendingItem],
}

/// Checks run in order; the first failure is reported. Purely local: nothing
/// here touches the network.
pub fn check(action: &GameAction, page: &PageView<'_>) -> Result<(), Precondition> {
    if page.account.is_none() {
        return Err(Precondition::NotConnected);
    }
    if action.game() != page.game {
        return Err(Precondition::WrongGame {
            page: page.game,
            action: action.game(),
        });
    }
    if page.in_flight {
        return Err(Precondition::ActionInFlight);
    }
    match action {
        GameAction::RiftPlaceBet { choice, .. } if games::rift_choice(*choice).is_none() => {
            return Err(Precondition::BadChoice);
        }
        GameAction::PlinkoDrop { risk, .. }
        | GameAction::PegsDrop { risk, .. }
        | GameAction::CascadeDrop { risk, .. }
            if games::risk_level(*risk).is_none() =>
        {
            return Err(Precondition::BadChoice);
        }
        _ => {}
    }
    if let Some((min, got)) = action.minimum() {
        if got < min {
            return Err(Precondition::BelowMinimum { min, got });
        }
    }
    if let Some(id) = action.related_id() {
        if !page.pending.iter().any(|item| item.id == id) {
            return Err(Precondition::UnknownPendingItem(id));
        }
    }
    if let Some(read) = action.claims_from() {
        if page.snapshot.amount(read).is_some_and(|owed| owed.is_zero()) {
            return Err(Precondition::NothingToClaim);
        }
    }
    if let Some(cost) = action.cost() {
        let have = page.snapshot.amount(cost.read);
        if have.is_none_or(|have| have < cost.amount) {
            return Err(Precondition::InsufficientBalance {
                read: cost.read,
                have,
                need: cost.amount,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use chrono::Utc;
    use ethers::types::Address;
    use tokio::time::Instant;

    use super::*;
    use crate::{
        pending::ItemKind,
        reads::BalanceReader,
        reads::ReadValue,
    };

    fn alice() -> Account {
        Account(Address::repeat_byte(0xa1))
    }

    fn snapshot_with(values: &[(ReadKey, u64)], game: GameId) -> BalanceSnapshot {
        let now = Instant::now();
        let mut reader = BalanceReader::new(game, 5, now);
        reader.set_account(Some(alice()), now);
        for (key, value) in values {
            reader.record(
                Some(alice()),
                *key,
                Ok(ReadValue::Amount(U256::from(*value))),
                now,
            );
        }
        reader.snapshot().clone()
    }

    fn view<'a>(
        game: GameId,
        account: Option<&'a Account>,
        snapshot: &'a BalanceSnapshot,
        pending: &'a [PendingItem],
    ) -> PageView<'a> {
        PageView {
            game,
            account,
            in_flight: false,
            snapshot,
            pending,
        }
    }

    #[test]
    fn check__strike_with_zero_coins_is_rejected() {
        // given
        let account = alice();
        let snapshot = snapshot_with(&[(ReadKey::Coins, 0)], GameId::Anvil);
        let page = view(GameId::Anvil, Some(&account), &snapshot, &[]);

        // when
        let result = check(&GameAction::AnvilStrike, &page);

        // then
        let err = result.unwrap_err();
        assert_eq!(
            err,
            Precondition::InsufficientBalance {
                read: ReadKey::Coins,
                have: Some(U256::zero()),
                need: U256::from(ANVIL_STRIKE_COST),
            }
        );
        assert_eq!(
            err.message_for(&GameAction::AnvilStrike),
            "You need 10 coins to strike the anvil."
        );
    }

    #[test]
    fn check__unknown_balance_counts_as_insufficient() {
        let account = alice();
        let snapshot = BalanceSnapshot::default();
        let page = view(GameId::Anvil, Some(&account), &snapshot, &[]);
        let result = check(&GameAction::AnvilStrike, &page);
        assert!(matches!(
            result,
            Err(Precondition::InsufficientBalance { have: None, .. })
        ));
    }

    #[test]
    fn check__single_flight_comes_before_balance() {
        // given
        let account = alice();
        let snapshot = snapshot_with(&[(ReadKey::Coins, 0)], GameId::Anvil);
        let mut page = view(GameId::Anvil, Some(&account), &snapshot, &[]);
        page.in_flight = true;

        // when
        let result = check(&GameAction::AnvilStrike, &page);

        // then
        assert_eq!(result, Err(Precondition::ActionInFlight));
    }

    #[test]
    fn check__altar_requires_five_coins() {
        // given
        let account = alice();
        let snapshot = snapshot_with(&[(ReadKey::Coins, 100)], GameId::Altar);
        let page = view(GameId::Altar, Some(&account), &snapshot, &[]);
        let action = GameAction::AltarChannel {
            amount: U256::from(4),
        };

        // when
        let err = check(&action, &page).unwrap_err();

        // then
        assert_eq!(err.message_for(&action), "You must channel at least 5 coins.");
    }

    #[test]
    fn check__resolving_unknown_item_is_rejected() {
        // given
        let account = alice();
        let snapshot = snapshot_with(&[(ReadKey::Coins, 0)], GameId::Rift);
        let pending = [PendingItem {
            id: U256::from(1),
            amount: U256::from(5),
            kind: ItemKind::RiftChoice { choice: 0 },
            created_at: Utc::now(),
        }];
        let page = view(GameId::Rift, Some(&account), &snapshot, &pending);

        // when
        let known = check(
            &GameAction::RiftResolve {
                bet_id: U256::from(1),
            },
            &page,
        );
        let unknown = check(
            &GameAction::RiftResolve {
                bet_id: U256::from(2),
            },
            &page,
        );

        // then
        assert_eq!(known, Ok(()));
        assert_eq!(
            unknown,
            Err(Precondition::UnknownPendingItem(U256::from(2)))
        );
    }

    #[test]
    fn check__bad_rift_choice_and_risk_are_rejected() {
        let account = alice();
        let snapshot = snapshot_with(&[(ReadKey::Coins, 100)], GameId::Rift);
        let page = view(GameId::Rift, Some(&account), &snapshot, &[]);
        let bet = GameAction::RiftPlaceBet {
            choice: 4,
            amount: U256::one(),
        };
        assert_eq!(check(&bet, &page), Err(Precondition::BadChoice));

        let snapshot = snapshot_with(&[(ReadKey::Coins, 100)], GameId::Pegs);
        let page = view(GameId::Pegs, Some(&account), &snapshot, &[]);
        let drop = GameAction::PegsDrop {
            amount: U256::one(),
            risk: 3,
        };
        assert_eq!(check(&drop, &page), Err(Precondition::BadChoice));
    }

    #[test]
    fn check__claim_with_nothing_pending_is_rejected() {
        let account = alice();
        let snapshot = snapshot_with(&[(ReadKey::CascadePendingWinnings, 0)], GameId::Cascade);
        let page = view(GameId::Cascade, Some(&account), &snapshot, &[]);
        assert_eq!(
            check(&GameAction::CascadeCollect, &page),
            Err(Precondition::NothingToClaim)
        );
    }

    #[test]
    fn check__disconnected_and_wrong_page_are_rejected() {
        let account = alice();
        let snapshot = BalanceSnapshot::default();
        let disconnected = view(GameId::Anvil, None, &snapshot, &[]);
        assert_eq!(
            check(&GameAction::AnvilStrike, &disconnected),
            Err(Precondition::NotConnected)
        );
        let wrong = view(GameId::Rift, Some(&account), &snapshot, &[]);
        assert!(matches!(
            check(&GameAction::AnvilStrike, &wrong),
            Err(Precondition::WrongGame { .. })
        ));
    }

    #[test]
    fn check__plinko_drop_is_paid_from_game_balance() {
        // given
        let account = alice();
        let snapshot = snapshot_with(
            &[(ReadKey::Coins, 1_000), (ReadKey::PlinkoGameBalance, 1)],
            GameId::Plinko,
        );
        let page = view(GameId::Plinko, Some(&account), &snapshot, &[]);
        let action = GameAction::PlinkoDrop {
            amount: U256::from(2),
            risk: 0,
        };

        // when
        let err = check(&action, &page).unwrap_err();

        // then
        assert_eq!(err.message_for(&action), "Not enough in-game balance.");
    }
}
