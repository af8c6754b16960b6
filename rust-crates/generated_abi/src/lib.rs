use ethers::types::U256;

pub mod hub_types {
    use ethers::contract::abigen;

    abigen!(
        ChaosCoin,
        r#"[
            function getCoins(address player) external view returns (uint256)
            function points(address player) external view returns (uint256)
            function buyCoins(uint256 amount) external payable
            function redeemPoints(uint256 amount) external
        ]"#
    );
}

pub mod coinflip_types {
    use ethers::contract::abigen;

    abigen!(
        CoinFlip,
        r#"[
            function hasActiveBet(address player) external view returns (bool)
            function pendingPoints(address player) external view returns (uint256)
            function placeBet(bool guessHeads) external
            function flip() external
            function claimPoints() external
            event CoinFlipped(address indexed player, bool win, bool resultHeads)
        ]"#
    );
}

pub mod rift_types {
    use ethers::contract::abigen;

    abigen!(
        QuantumRift,
        r#"[
            function placeBet(uint8 choice, uint256 amount) external
            function resolveBet(uint256 betId) external
            event BetPlaced(address indexed player, uint256 betId, uint8 choice, uint256 amount)
            event BetSettled(address indexed player, uint256 betId, uint8 choice, uint8 outcome, uint256 payout)
        ]"#
    );
}

pub mod anvil_types {
    use ethers::contract::abigen;

    abigen!(
        AethericAnvil,
        r#"[
            function strikeAnvil() external
            function resolveForge(uint256 strikeId) external
            event AnvilStruck(address indexed player, uint256 strikeId)
            event ForgeSettled(address indexed player, uint256 strikeId, string outcome, uint256 pointsWon, uint256 tokenId)
        ]"#
    );
}

pub mod altar_types {
    use ethers::contract::abigen;

    abigen!(
        ChaosAltar,
        r#"[
            function getTimeLeft() external view returns (uint256)
            function altarEssence() external view returns (uint256)
            function currentHarbinger() external view returns (address)
            function channel(uint256 amount) external
            event ChaoticEvent(address indexed player, string eventType, uint256 pointsWon)
        ]"#
    );
}

pub mod plinko_types {
    use ethers::contract::abigen;

    abigen!(
        ChaosPlinko,
        r#"[
            function gameBalances(address player) external view returns (uint256)
            function deposit(uint256 amount) external
            function withdraw(uint256 amount) external
            function dropBall(uint256 amount, uint8 risk) external
            event BallDropped(address indexed player, uint256 amount, uint8 risk, uint8 outcomeBin, uint256 coinsWon)
        ]"#
    );
}

pub mod pegs_types {
    use ethers::contract::abigen;

    abigen!(
        ChaosPegs,
        r#"[
            function dropBall(uint256 amount, uint8 risk) external
            event BallDropped(address indexed player, uint256 amount, uint8 risk, uint8 outcomeBin, uint256 pointsWon)
        ]"#
    );
}

pub mod cascade_types {
    use ethers::contract::abigen;

    abigen!(
        ChaosCascade,
        r#"[
            function pendingWinnings(address player) external view returns (uint256)
            function dropBall(uint256 amount, uint8 risk) external
            function collectWinnings() external
            event BallDropped(address indexed player, uint256 amount, uint8 risk, uint256 pointsWon)
        ]"#
    );
}

pub mod runes_types {
    use ethers::contract::abigen;

    abigen!(
        ChaosRunes,
        r#"[
            function balanceOf(address owner) external view returns (uint256)
            function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256)
        ]"#
    );
}

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

/// Price of a single chaos coin in wei (0.0001 ETH).
pub const COIN_PRICE_WEI: u64 = 100_000_000_000_000;

/// Wei that must accompany `buyCoins(amount)`.
pub fn coins_cost_wei(amount: U256) -> U256 {
    amount.saturating_mul(U256::from(COIN_PRICE_WEI))
}
