use ethers::{
    abi::{
        Token,
        encode,
    },
    contract::EthEvent,
    types::{
        Address,
        Bytes,
        H256,
        Log,
        U256,
    },
};

use crate::{
    altar_types,
    anvil_types,
    cascade_types,
    coinflip_types,
    pegs_types,
    plinko_types,
    rift_types,
};

/// Deterministic addresses for players and contracts in tests.
pub fn test_address(seed: u8) -> Address {
    Address::repeat_byte(seed)
}

pub fn alice() -> Address {
    test_address(0xa1)
}

pub fn bob() -> Address {
    test_address(0xb0)
}

pub fn test_tx_hash(seed: u64) -> H256 {
    H256::from_low_u64_be(seed)
}

fn event_log(
    contract: Address,
    signature: H256,
    player: Address,
    data: Vec<Token>,
) -> Log {
    Log {
        address: contract,
        topics: vec![signature, H256::from(player)],
        data: Bytes::from(encode(&data)),
        ..Default::default()
    }
}

/// A log no casino contract emits, for padding receipts.
pub fn unrelated_log(contract: Address) -> Log {
    Log {
        address: contract,
        topics: vec![H256::repeat_byte(0xee)],
        data: Bytes::from(encode(&[Token::Uint(U256::one())])),
        ..Default::default()
    }
}

pub fn coin_flipped_log(
    contract: Address,
    player: Address,
    win: bool,
    result_heads: bool,
) -> Log {
    event_log(
        contract,
        coinflip_types::CoinFlippedFilter::signature(),
        player,
        vec![Token::Bool(win), Token::Bool(result_heads)],
    )
}

pub fn bet_placed_log(
    contract: Address,
    player: Address,
    bet_id: U256,
    choice: u8,
    amount: U256,
) -> Log {
    event_log(
        contract,
        rift_types::BetPlacedFilter::signature(),
        player,
        vec![
            Token::Uint(bet_id),
            Token::Uint(U256::from(choice)),
            Token::Uint(amount),
        ],
    )
}

pub fn bet_settled_log(
    contract: Address,
    player: Address,
    bet_id: U256,
    choice: u8,
    outcome: u8,
    payout: U256,
) -> Log {
    event_log(
        contract,
        rift_types::BetSettledFilter::signature(),
        player,
        vec![
            Token::Uint(bet_id),
            Token::Uint(U256::from(choice)),
            Token::Uint(U256::from(outcome)),
            Token::Uint(payout),
        ],
    )
}

pub fn anvil_struck_log(contract: Address, player: Address, strike_id: U256) -> Log {
    event_log(
        contract,
        anvil_types::AnvilStruckFilter::signature(),
        player,
        vec![Token::Uint(strike_id)],
    )
}

pub fn forge_settled_log(
    contract: Address,
    player: Address,
    strike_id: U256,
    outcome: &str,
    points_won: U256,
    token_id: U256,
) -> Log {
    event_log(
        contract,
        anvil_types::ForgeSettledFilter::signature(),
        player,
        vec![
            Token::Uint(strike_id),
            Token::String(outcome.to_owned()),
            Token::Uint(points_won),
            Token::Uint(token_id),
        ],
    )
}

pub fn chaotic_event_log(
    contract: Address,
    player: Address,
    event_type: &str,
    points_won: U256,
) -> Log {
    event_log(
        contract,
        altar_types::ChaoticEventFilter::signature(),
        player,
        vec![Token::String(event_type.to_owned()), Token::Uint(points_won)],
    )
}

pub fn plinko_ball_dropped_log(
    contract: Address,
    player: Address,
    amount: U256,
    risk: u8,
    outcome_bin: u8,
    coins_won: U256,
) -> Log {
    event_log(
        contract,
        plinko_types::BallDroppedFilter::signature(),
        player,
        vec![
            Token::Uint(amount),
            Token::Uint(U256::from(risk)),
            Token::Uint(U256::from(outcome_bin)),
            Token::Uint(coins_won),
        ],
    )
}

pub fn pegs_ball_dropped_log(
    contract: Address,
    player: Address,
    amount: U256,
    risk: u8,
    outcome_bin: u8,
    points_won: U256,
) -> Log {
    event_log(
        contract,
        pegs_types::BallDroppedFilter::signature(),
        player,
        vec![
            Token::Uint(amount),
            Token::Uint(U256::from(risk)),
            Token::Uint(U256::from(outcome_bin)),
            Token::Uint(points_won),
        ],
    )
}

pub fn cascade_ball_dropped_log(
    contract: Address,
    player: Address,
    amount: U256,
    risk: u8,
    points_won: U256,
) -> Log {
    event_log(
        contract,
        cascade_types::BallDroppedFilter::signature(),
        player,
        vec![
            Token::Uint(amount),
            Token::Uint(U256::from(risk)),
            Token::Uint(points_won),
        ],
    )
}
