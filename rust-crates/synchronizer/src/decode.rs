//! Receipt decoding: turns the logs of a confirmed transaction into the one
//! state transition its action implies.

use chrono::{
    DateTime,
    Utc,
};
use ethers::{
    abi::RawLog,
    contract::EthEvent,
    types::{
        Address,
        Log,
        U256,
    },
};
use generated_abi::{
    altar_types::ChaoticEventFilter,
    anvil_types::{
        AnvilStruckFilter,
        ForgeSettledFilter,
    },
    cascade_types,
    coinflip_types::CoinFlippedFilter,
    pegs_types,
    plinko_types,
    rift_types::{
        BetPlacedFilter,
        BetSettledFilter,
    },
};
use thiserror::Error;
use tracing::warn;

use crate::{
    GameId,
    action::{
        EventName,
        Expectation,
        GameAction,
    },
    games::ANVIL_STRIKE_COST,
    outcome::{
        AwardUnit,
        RoundResult,
    },
    pending::{
        ItemKind,
        PendingItem,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    CoinFlipped(CoinFlippedFilter),
    BetPlaced(BetPlacedFilter),
    BetSettled(BetSettledFilter),
    AnvilStruck(AnvilStruckFilter),
    ForgeSettled(ForgeSettledFilter),
    ChaoticEvent(ChaoticEventFilter),
    PlinkoDropped(plinko_types::BallDroppedFilter),
    PegsDropped(pegs_types::BallDroppedFilter),
    CascadeDropped(cascade_types::BallDroppedFilter),
}

/// State transition implied by a confirmed receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// A submit opened an item that a later resolve settles.
    Opened(PendingItem),
    /// The coin-flip bet is locked in and waits for the flip.
    BetLocked,
    /// A resolve produced an outcome. `id` is the settled pending item, if any.
    Settled {
        id: Option<U256>,
        result: RoundResult,
    },
    /// The altar accepted the coins without a chaos roll.
    Channeled,
    Claimed,
    /// Coins or points moved with nothing else to show.
    Transferred,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("receipt holds no {0} event")]
pub struct MissingEvent(pub EventName);

fn first<E: EthEvent>(contract: Address, logs: &[Log]) -> Option<E> {
    logs.iter()
        .filter(|log| log.address == contract)
        .find_map(|log| {
            let raw = RawLog {
                topics: log.topics.clone(),
                data: log.data.to_vec(),
            };
            <E as EthEvent>::decode_log(&raw).ok()
        })
}

/// First log emitted by `contract` that decodes as `event` for the action's
/// game. Plinko and Pegs share a signature, so the emitting contract is what
/// tells them apart.
pub fn find_event(
    action: &GameAction,
    event: EventName,
    contract: Address,
    logs: &[Log],
) -> Option<GameEvent> {
    match (event, action.game()) {
        (EventName::CoinFlipped, _) => first(contract, logs).map(GameEvent::CoinFlipped),
        (EventName::BetPlaced, _) => first(contract, logs).map(GameEvent::BetPlaced),
        (EventName::BetSettled, _) => first(contract, logs).map(GameEvent::BetSettled),
        (EventName::AnvilStruck, _) => first(contract, logs).map(GameEvent::AnvilStruck),
        (EventName::ForgeSettled, _) => first(contract, logs).map(GameEvent::ForgeSettled),
        (EventName::ChaoticEvent, _) => first(contract, logs).map(GameEvent::ChaoticEvent),
        (EventName::BallDropped, GameId::Plinko) => {
            first(contract, logs).map(GameEvent::PlinkoDropped)
        }
        (EventName::BallDropped, GameId::Pegs) => first(contract, logs).map(GameEvent::PegsDropped),
        (EventName::BallDropped, GameId::Cascade) => {
            first(contract, logs).map(GameEvent::CascadeDropped)
        }
        (EventName::BallDropped, _) => None,
    }
}

/// Maps a confirmed receipt of `action` to its effect. Never guesses: when the
/// expected event is absent the result is [`MissingEvent`].
pub fn decode_effect(
    action: &GameAction,
    contract: Address,
    logs: &[Log],
    now: DateTime<Utc>,
) -> Result<Effect, MissingEvent> {
    let event = match action.expectation() {
        Expectation::Receipt => return Ok(receipt_only_effect(action)),
        Expectation::Event(name) => {
            find_event(action, name, contract, logs).ok_or(MissingEvent(name))?
        }
        Expectation::MaybeEvent(name) => match find_event(action, name, contract, logs) {
            Some(event) => event,
            None => return Ok(Effect::Channeled),
        },
    };

    let effect = match event {
        GameEvent::CoinFlipped(flip) => Effect::Settled {
            id: None,
            result: RoundResult::coin(flip.win, flip.result_heads),
        },
        GameEvent::BetPlaced(bet) => Effect::Opened(PendingItem {
            id: bet.bet_id,
            amount: bet.amount,
            kind: ItemKind::RiftChoice {
                choice: bet.choice,
            },
            created_at: now,
        }),
        GameEvent::BetSettled(settled) => {
            warn_if_other_item(action, settled.bet_id);
            Effect::Settled {
                id: Some(settled.bet_id),
                result: RoundResult::rift(settled.choice, settled.outcome, settled.payout),
            }
        }
        GameEvent::AnvilStruck(struck) => Effect::Opened(PendingItem {
            id: struck.strike_id,
            amount: U256::from(ANVIL_STRIKE_COST),
            kind: ItemKind::AnvilStrike,
            created_at: now,
        }),
        GameEvent::ForgeSettled(forge) => {
            warn_if_other_item(action, forge.strike_id);
            Effect::Settled {
                id: Some(forge.strike_id),
                result: RoundResult::forge(forge.outcome, forge.points_won, forge.token_id),
            }
        }
        GameEvent::ChaoticEvent(chaos) => Effect::Settled {
            id: None,
            result: RoundResult::altar(chaos.event_type, chaos.points_won),
        },
        GameEvent::PlinkoDropped(drop) => Effect::Settled {
            id: None,
            result: RoundResult::bin(drop.risk, drop.outcome_bin, drop.coins_won, AwardUnit::Coins),
        },
        GameEvent::PegsDropped(drop) => Effect::Settled {
            id: None,
            result: RoundResult::bin(
                drop.risk,
                drop.outcome_bin,
                drop.points_won,
                AwardUnit::Points,
            ),
        },
        GameEvent::CascadeDropped(drop) => Effect::Settled {
            id: None,
            result: RoundResult::cascade(drop.risk, drop.points_won),
        },
    };
    Ok(effect)
}

fn receipt_only_effect(action: &GameAction) -> Effect {
    match action {
        GameAction::FlipPlaceBet { .. } => Effect::BetLocked,
        GameAction::FlipClaim | GameAction::CascadeCollect => Effect::Claimed,
        _ => Effect::Transferred,
    }
}

fn warn_if_other_item(action: &GameAction, settled: U256) {
    if let Some(requested) = action.related_id() {
        if requested != settled {
            warn!(%requested, %settled, "settlement names a different item than requested");
        }
    }
}
