//! What a page can ask the chain to do, and what each request expects back.

use std::fmt;

use ethers::types::U256;
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    GameId,
    games::{
        self,
        ANVIL_STRIKE_COST,
        COINFLIP_STAKE,
    },
    reads::ReadKey,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Opens something that is settled by a later resolve.
    Submit,
    Resolve,
    Claim,
    Deposit,
    Withdraw,
    Purchase,
    Redeem,
}

/// The in-flight action as the page tracks it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAction {
    pub kind: ActionKind,
    pub related_id: Option<U256>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameAction {
    BuyCoins { amount: U256 },
    RedeemPoints { cost: U256 },
    FlipPlaceBet { heads: bool },
    FlipCoin,
    FlipClaim,
    RiftPlaceBet { choice: u8, amount: U256 },
    RiftResolve { bet_id: U256 },
    AnvilStrike,
    AnvilResolve { strike_id: U256 },
    AltarChannel { amount: U256 },
    PlinkoDeposit { amount: U256 },
    PlinkoWithdraw { amount: U256 },
    PlinkoDrop { amount: U256, risk: u8 },
    PegsDrop { amount: U256, risk: u8 },
    CascadeDrop { amount: U256, risk: u8 },
    CascadeCollect,
}

/// Receipt event an action's outcome is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    CoinFlipped,
    BetPlaced,
    BetSettled,
    AnvilStruck,
    ForgeSettled,
    ChaoticEvent,
    BallDropped,
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventName::CoinFlipped => "CoinFlipped",
            EventName::BetPlaced => "BetPlaced",
            EventName::BetSettled => "BetSettled",
            EventName::AnvilStruck => "AnvilStruck",
            EventName::ForgeSettled => "ForgeSettled",
            EventName::ChaoticEvent => "ChaoticEvent",
            EventName::BallDropped => "BallDropped",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expectation {
    /// The event must be in the receipt; a miss means the outcome is unknown.
    Event(EventName),
    /// The event is only emitted on some outcomes; a miss is an outcome too.
    MaybeEvent(EventName),
    /// A successful receipt is the whole outcome.
    Receipt,
}

/// Balance an action spends, and how much of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cost {
    pub read: ReadKey,
    pub amount: U256,
}

impl GameAction {
    pub fn game(&self) -> GameId {
        match self {
            GameAction::BuyCoins { .. } => GameId::Buy,
            GameAction::RedeemPoints { .. } => GameId::Redeem,
            GameAction::FlipPlaceBet { .. } | GameAction::FlipCoin | GameAction::FlipClaim => {
                GameId::CoinFlip
            }
            GameAction::RiftPlaceBet { .. } | GameAction::RiftResolve { .. } => GameId::Rift,
            GameAction::AnvilStrike | GameAction::AnvilResolve { .. } => GameId::Anvil,
            GameAction::AltarChannel { .. } => GameId::Altar,
            GameAction::PlinkoDeposit { .. }
            | GameAction::PlinkoWithdraw { .. }
            | GameAction::PlinkoDrop { .. } => GameId::Plinko,
            GameAction::PegsDrop { .. } => GameId::Pegs,
            GameAction::CascadeDrop { .. } | GameAction::CascadeCollect => GameId::Cascade,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            GameAction::BuyCoins { .. } => ActionKind::Purchase,
            GameAction::RedeemPoints { .. } => ActionKind::Redeem,
            GameAction::FlipPlaceBet { .. }
            | GameAction::RiftPlaceBet { .. }
            | GameAction::AnvilStrike => ActionKind::Submit,
            GameAction::FlipCoin
            | GameAction::RiftResolve { .. }
            | GameAction::AnvilResolve { .. }
            | GameAction::AltarChannel { .. }
            | GameAction::PlinkoDrop { .. }
            | GameAction::PegsDrop { .. }
            | GameAction::CascadeDrop { .. } => ActionKind::Resolve,
            GameAction::FlipClaim | GameAction::CascadeCollect => ActionKind::Claim,
            GameAction::PlinkoDeposit { .. } => ActionKind::Deposit,
            GameAction::PlinkoWithdraw { .. } => ActionKind::Withdraw,
        }
    }

    /// Pending item a resolve settles.
    pub fn related_id(&self) -> Option<U256> {
        match self {
            GameAction::RiftResolve { bet_id } => Some(*bet_id),
            GameAction::AnvilResolve { strike_id } => Some(*strike_id),
            _ => None,
        }
    }

    pub fn transaction(&self) -> TransactionAction {
        TransactionAction {
            kind: self.kind(),
            related_id: self.related_id(),
        }
    }

    pub fn expectation(&self) -> Expectation {
        match self {
            GameAction::FlipCoin => Expectation::Event(EventName::CoinFlipped),
            GameAction::RiftPlaceBet { .. } => Expectation::Event(EventName::BetPlaced),
            GameAction::RiftResolve { .. } => Expectation::Event(EventName::BetSettled),
            GameAction::AnvilStrike => Expectation::Event(EventName::AnvilStruck),
            GameAction::AnvilResolve { .. } => Expectation::Event(EventName::ForgeSettled),
            GameAction::AltarChannel { .. } => Expectation::MaybeEvent(EventName::ChaoticEvent),
            GameAction::PlinkoDrop { .. }
            | GameAction::PegsDrop { .. }
            | GameAction::CascadeDrop { .. } => Expectation::Event(EventName::BallDropped),
            GameAction::BuyCoins { .. }
            | GameAction::RedeemPoints { .. }
            | GameAction::FlipPlaceBet { .. }
            | GameAction::FlipClaim
            | GameAction::PlinkoDeposit { .. }
            | GameAction::PlinkoWithdraw { .. }
            | GameAction::CascadeCollect => Expectation::Receipt,
        }
    }

    /// Balance that must cover the action before it is submitted.
    pub fn cost(&self) -> Option<Cost> {
        let (read, amount) = match self {
            GameAction::RedeemPoints { cost } => (ReadKey::Points, *cost),
            GameAction::FlipPlaceBet { .. } => (ReadKey::Coins, U256::from(COINFLIP_STAKE)),
            GameAction::AnvilStrike => (ReadKey::Coins, U256::from(ANVIL_STRIKE_COST)),
            GameAction::RiftPlaceBet { amount, .. }
            | GameAction::AltarChannel { amount }
            | GameAction::PlinkoDeposit { amount }
            | GameAction::PegsDrop { amount, .. }
            | GameAction::CascadeDrop { amount, .. } => (ReadKey::Coins, *amount),
            GameAction::PlinkoWithdraw { amount } | GameAction::PlinkoDrop { amount, .. } => {
                (ReadKey::PlinkoGameBalance, *amount)
            }
            GameAction::BuyCoins { .. }
            | GameAction::FlipCoin
            | GameAction::FlipClaim
            | GameAction::RiftResolve { .. }
            | GameAction::AnvilResolve { .. }
            | GameAction::CascadeCollect => return None,
        };
        Some(Cost { read, amount })
    }

    /// Smallest amount the contract accepts, for actions that carry one.
    pub fn minimum(&self) -> Option<(U256, U256)> {
        match self {
            GameAction::AltarChannel { amount } => {
                Some((U256::from(games::ALTAR_MIN_CHANNEL), *amount))
            }
            GameAction::BuyCoins { amount }
            | GameAction::RedeemPoints { cost: amount }
            | GameAction::RiftPlaceBet { amount, .. }
            | GameAction::PlinkoDeposit { amount }
            | GameAction::PlinkoWithdraw { amount }
            | GameAction::PlinkoDrop { amount, .. }
            | GameAction::PegsDrop { amount, .. }
            | GameAction::CascadeDrop { amount, .. } => Some((U256::one(), *amount)),
            _ => None,
        }
    }

    /// Claim-kind balance that must be non-zero.
    pub fn claims_from(&self) -> Option<ReadKey> {
        match self {
            GameAction::FlipClaim => Some(ReadKey::PendingPoints),
            GameAction::CascadeCollect => Some(ReadKey::CascadePendingWinnings),
            _ => None,
        }
    }

    pub fn loading_message(&self) -> String {
        match self {
            GameAction::BuyCoins { amount } => format!("Buying {amount} coins..."),
            GameAction::RedeemPoints { cost } => {
                match cost_as_u64(*cost).and_then(games::prize_costing) {
                    Some(prize) => format!("Redeeming points for a {}...", prize.name),
                    None => format!("Redeeming {cost} points..."),
                }
            }
            GameAction::FlipPlaceBet { heads } => {
                format!("Placing your bet on {}...", if *heads { "heads" } else { "tails" })
            }
            GameAction::FlipCoin => "Flipping the coin...".to_string(),
            GameAction::FlipClaim => "Claiming your points...".to_string(),
            GameAction::RiftPlaceBet { .. } => "Sending your bet to the Rift...".to_string(),
            GameAction::RiftResolve { bet_id } => format!("Resolving Bet #{bet_id}..."),
            GameAction::AnvilStrike => "Striking the anvil...".to_string(),
            GameAction::AnvilResolve { strike_id } => {
                format!("Revealing the outcome of Forge #{strike_id}...")
            }
            GameAction::AltarChannel { amount } => {
                format!("Channeling {amount} coins into the Altar...")
            }
            GameAction::PlinkoDeposit { amount } => format!("Depositing {amount} coins..."),
            GameAction::PlinkoWithdraw { amount } => format!("Withdrawing {amount} coins..."),
            GameAction::PlinkoDrop { .. }
            | GameAction::PegsDrop { .. }
            | GameAction::CascadeDrop { .. } => "Dropping the ball...".to_string(),
            GameAction::CascadeCollect => "Collecting your winnings...".to_string(),
        }
    }

    pub fn waiting_message(&self) -> &'static str {
        match self.expectation() {
            Expectation::Event(_) => "Waiting for the on-chain result...",
            Expectation::MaybeEvent(_) => "Waiting for the chaos to settle...",
            Expectation::Receipt => "Waiting for confirmation...",
        }
    }
}

fn cost_as_u64(value: U256) -> Option<u64> {
    (value <= U256::from(u64::MAX)).then(|| value.as_u64())
}

impl fmt::Display for GameAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameAction::BuyCoins { amount } => write!(f, "buy {amount} coins"),
            GameAction::RedeemPoints { cost } => write!(f, "redeem {cost} points"),
            GameAction::FlipPlaceBet { heads } => {
                write!(f, "bet on {}", if *heads { "heads" } else { "tails" })
            }
            GameAction::FlipCoin => f.write_str("flip"),
            GameAction::FlipClaim => f.write_str("claim points"),
            GameAction::RiftPlaceBet { choice, amount } => {
                write!(f, "rift bet of {amount} on choice {choice}")
            }
            GameAction::RiftResolve { bet_id } => write!(f, "resolve bet #{bet_id}"),
            GameAction::AnvilStrike => f.write_str("strike the anvil"),
            GameAction::AnvilResolve { strike_id } => write!(f, "resolve forge #{strike_id}"),
            GameAction::AltarChannel { amount } => write!(f, "channel {amount}"),
            GameAction::PlinkoDeposit { amount } => write!(f, "deposit {amount}"),
            GameAction::PlinkoWithdraw { amount } => write!(f, "withdraw {amount}"),
            GameAction::PlinkoDrop { amount, risk }
            | GameAction::PegsDrop { amount, risk }
            | GameAction::CascadeDrop { amount, risk } => {
                write!(f, "drop {amount} at risk {risk}")
            }
            GameAction::CascadeCollect => f.write_str("collect winnings"),
        }
    }
}
