//! Static catalogue of the casino pages: which contract each talks to, what it
//! polls and the fixed tables shown next to the controls.

use std::{
    fmt,
    str::FromStr,
};

use anyhow::bail;
use serde::{
    Deserialize,
    Serialize,
};

use crate::reads::ReadKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameId {
    Buy,
    Redeem,
    CoinFlip,
    Rift,
    Anvil,
    Altar,
    Plinko,
    Pegs,
    Cascade,
}

impl GameId {
    pub const ALL: [GameId; 9] = [
        GameId::Buy,
        GameId::Redeem,
        GameId::CoinFlip,
        GameId::Rift,
        GameId::Anvil,
        GameId::Altar,
        GameId::Plinko,
        GameId::Pegs,
        GameId::Cascade,
    ];

    /// Byte appended to the account address in pending-store keys. Never reuse
    /// a retired value.
    pub fn tag(self) -> u8 {
        match self {
            GameId::Buy => 1,
            GameId::Redeem => 2,
            GameId::CoinFlip => 3,
            GameId::Rift => 4,
            GameId::Anvil => 5,
            GameId::Altar => 6,
            GameId::Plinko => 7,
            GameId::Pegs => 8,
            GameId::Cascade => 9,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|game| game.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            GameId::Buy => "buy",
            GameId::Redeem => "redeem",
            GameId::CoinFlip => "coinflip",
            GameId::Rift => "rift",
            GameId::Anvil => "anvil",
            GameId::Altar => "altar",
            GameId::Plinko => "plinko",
            GameId::Pegs => "pegs",
            GameId::Cascade => "cascade",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            GameId::Buy => "Buy Coins",
            GameId::Redeem => "Redeem Points",
            GameId::CoinFlip => "Coin Flip",
            GameId::Rift => "Quantum Rift",
            GameId::Anvil => "Aetheric Anvil",
            GameId::Altar => "Chaos Altar",
            GameId::Plinko => "Chaos Plinko",
            GameId::Pegs => "Chaos Pegs",
            GameId::Cascade => "Chaos Cascade",
        }
    }

    /// Deployment record entry of the contract the page's actions go to.
    pub fn contract(self) -> &'static str {
        match self {
            GameId::Buy | GameId::Redeem => "hub",
            GameId::CoinFlip => "coinflip",
            GameId::Rift => "rift",
            GameId::Anvil => "anvil",
            GameId::Altar => "altar",
            GameId::Plinko => "plinko",
            GameId::Pegs => "pegs",
            GameId::Cascade => "cascade",
        }
    }

    pub fn reads(self) -> &'static [ReadKey] {
        match self {
            GameId::Buy | GameId::Rift | GameId::Anvil | GameId::Pegs => &[ReadKey::Coins],
            GameId::Redeem => &[ReadKey::Points],
            GameId::CoinFlip => &[
                ReadKey::Coins,
                ReadKey::HasActiveBet,
                ReadKey::PendingPoints,
            ],
            GameId::Altar => &[
                ReadKey::Coins,
                ReadKey::AltarTimeLeft,
                ReadKey::AltarEssence,
                ReadKey::AltarHarbinger,
            ],
            GameId::Plinko => &[ReadKey::Coins, ReadKey::PlinkoGameBalance],
            GameId::Cascade => &[ReadKey::Coins, ReadKey::CascadePendingWinnings],
        }
    }

    /// Poll interval of `key` on this page, in seconds.
    pub fn poll_secs(self, key: ReadKey) -> u64 {
        match (self, key) {
            (GameId::Altar, ReadKey::Coins) => 5,
            _ => key.default_poll_secs(),
        }
    }

    /// Games whose contracts cannot list a player's open items, so the client
    /// keeps them in the pending store.
    pub fn keeps_pending_items(self) -> bool {
        matches!(self, GameId::Rift | GameId::Anvil)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GameId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match Self::ALL.into_iter().find(|game| game.name() == wanted) {
            Some(game) => Ok(game),
            None => bail!(
                "unknown game `{s}`; expected one of {}",
                Self::ALL.map(GameId::name).join(", ")
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiftChoice {
    pub id: u8,
    pub name: &'static str,
    pub multiplier: &'static str,
    pub tag: &'static str,
}

pub const RIFT_CHOICES: [RiftChoice; 4] = [
    RiftChoice {
        id: 0,
        name: "Stable Decay",
        multiplier: "1.6x",
        tag: "Common",
    },
    RiftChoice {
        id: 1,
        name: "Chrono Surge",
        multiplier: "3.8x",
        tag: "Uncommon",
    },
    RiftChoice {
        id: 2,
        name: "Void Echo",
        multiplier: "9.6x",
        tag: "Rare",
    },
    RiftChoice {
        id: 3,
        name: "Paradox Bloom",
        multiplier: "19.2x",
        tag: "Legendary",
    },
];

pub fn rift_choice(id: u8) -> Option<&'static RiftChoice> {
    RIFT_CHOICES.get(usize::from(id))
}

pub const PLINKO_ROWS: usize = 16;
pub const PLINKO_BINS: usize = PLINKO_ROWS + 1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiskLevel {
    pub name: &'static str,
    pub multipliers: [f64; PLINKO_BINS],
}

/// Bin payout tables shared by Plinko and Pegs, indexed by the `risk` argument.
pub const RISK_LEVELS: [RiskLevel; 3] = [
    RiskLevel {
        name: "Low",
        multipliers: [
            16.0, 11.0, 10.0, 5.0, 3.0, 1.5, 1.0, 0.5, 0.3, 0.5, 1.0, 1.5, 3.0, 5.0, 10.0, 11.0,
            16.0,
        ],
    },
    RiskLevel {
        name: "Medium",
        multipliers: [
            30.0, 15.0, 7.0, 4.0, 2.0, 1.0, 0.5, 0.4, 0.3, 0.4, 0.5, 1.0, 2.0, 4.0, 7.0, 15.0,
            30.0,
        ],
    },
    RiskLevel {
        name: "Chaos",
        multipliers: [
            100.0, 30.0, 5.0, 1.0, 0.5, 0.3, 0.2, 0.0, 0.0, 0.0, 0.2, 0.3, 0.5, 1.0, 5.0, 30.0,
            100.0,
        ],
    },
];

pub fn risk_level(risk: u8) -> Option<&'static RiskLevel> {
    RISK_LEVELS.get(usize::from(risk))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prize {
    pub name: &'static str,
    pub cost: u64,
    pub description: &'static str,
}

pub const PRIZES: [Prize; 3] = [
    Prize {
        name: "Diamond Hands NFT",
        cost: 1_000,
        description: "A symbol of your unwavering conviction. Purely for the flex.",
    },
    Prize {
        name: "Chaos Chrono Watch",
        cost: 5_000,
        description: "A timepiece that bends reality. They will know you are a winner.",
    },
    Prize {
        name: "Hyper-Dimensional Lambo",
        cost: 25_000,
        description: "Forget the moon. This is for cruising between galaxies.",
    },
];

pub fn prize_costing(cost: u64) -> Option<&'static Prize> {
    PRIZES.iter().find(|prize| prize.cost == cost)
}

/// Coins burned by one anvil strike.
pub const ANVIL_STRIKE_COST: u64 = 10;
/// Coins staked by one coin-flip bet.
pub const COINFLIP_STAKE: u64 = 1;
/// Smallest amount the altar accepts.
pub const ALTAR_MIN_CHANNEL: u64 = 5;
