use std::fmt;

use ethers::types::U256;

use crate::games;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AwardUnit {
    Points,
    Coins,
}

impl fmt::Display for AwardUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AwardUnit::Points => f.write_str("points"),
            AwardUnit::Coins => f.write_str("coins"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rune {
    Flux,
    Entropy,
    Gravity,
    Singularity,
    Parallax,
}

impl Rune {
    pub const ALL: [Rune; 5] = [
        Rune::Flux,
        Rune::Entropy,
        Rune::Gravity,
        Rune::Singularity,
        Rune::Parallax,
    ];

    pub fn from_token_id(token_id: U256) -> Self {
        let index = (token_id % U256::from(Self::ALL.len())).as_usize();
        Self::ALL[index]
    }

    pub fn name(self) -> &'static str {
        match self {
            Rune::Flux => "Rune of Flux",
            Rune::Entropy => "Rune of Entropy",
            Rune::Gravity => "Rune of Gravity",
            Rune::Singularity => "Rune of Singularity",
            Rune::Parallax => "Rune of Parallax",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Rune::Flux => "Pulsates with unstable energy.",
            Rune::Entropy => "Hums with cosmic decay.",
            Rune::Gravity => "Bends the space around it.",
            Rune::Singularity => "Born from a collapsed star.",
            Rune::Parallax => "Refracts reality itself.",
        }
    }
}

/// Forge outcomes that mint a rune.
pub const NFT_FORGE_OUTCOMES: [&str; 2] = ["Rune Spark", "Genesis Forge"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultDetail {
    Coin { heads: bool },
    Rift { choice: u8, outcome: u8 },
    Forge {
        outcome: String,
        token_id: U256,
        rune: Option<Rune>,
    },
    Altar { event_type: String },
    Bin { risk: u8, bin: u8 },
    Cascade { risk: u8 },
}

/// Outcome of a resolve, read from its receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundResult {
    pub win: bool,
    pub award: U256,
    pub unit: AwardUnit,
    pub detail: ResultDetail,
}

impl RoundResult {
    pub fn coin(win: bool, heads: bool) -> Self {
        Self {
            win,
            award: U256::zero(),
            unit: AwardUnit::Points,
            detail: ResultDetail::Coin { heads },
        }
    }

    pub fn rift(choice: u8, outcome: u8, payout: U256) -> Self {
        Self {
            win: !payout.is_zero(),
            award: payout,
            unit: AwardUnit::Points,
            detail: ResultDetail::Rift { choice, outcome },
        }
    }

    pub fn forge(outcome: String, points_won: U256, token_id: U256) -> Self {
        let rune = NFT_FORGE_OUTCOMES
            .contains(&outcome.as_str())
            .then(|| Rune::from_token_id(token_id));
        Self {
            win: rune.is_some() || !points_won.is_zero(),
            award: points_won,
            unit: AwardUnit::Points,
            detail: ResultDetail::Forge {
                outcome,
                token_id,
                rune,
            },
        }
    }

    pub fn altar(event_type: String, points_won: U256) -> Self {
        Self {
            win: !points_won.is_zero(),
            award: points_won,
            unit: AwardUnit::Points,
            detail: ResultDetail::Altar { event_type },
        }
    }

    pub fn bin(risk: u8, bin: u8, won: U256, unit: AwardUnit) -> Self {
        Self {
            win: !won.is_zero(),
            award: won,
            unit,
            detail: ResultDetail::Bin { risk, bin },
        }
    }

    pub fn cascade(risk: u8, points_won: U256) -> Self {
        Self {
            win: !points_won.is_zero(),
            award: points_won,
            unit: AwardUnit::Points,
            detail: ResultDetail::Cascade { risk },
        }
    }

    pub fn rune(&self) -> Option<Rune> {
        match &self.detail {
            ResultDetail::Forge { rune, .. } => *rune,
            _ => None,
        }
    }

    /// Landing bin, for results that animate a falling ball.
    pub fn bin_index(&self) -> Option<u8> {
        match self.detail {
            ResultDetail::Bin { bin, .. } => Some(bin),
            _ => None,
        }
    }

    /// One-line summary shown on the result panel and in the notice.
    pub fn headline(&self) -> String {
        match &self.detail {
            ResultDetail::Coin { heads } => {
                let side = if *heads { "Heads" } else { "Tails" };
                if self.win {
                    format!("{side}! You won! Claim your points.")
                } else {
                    format!("{side}. Unlucky, better luck next time!")
                }
            }
            ResultDetail::Rift { outcome, .. } => {
                let landed = games::rift_choice(*outcome)
                    .map(|choice| choice.name)
                    .unwrap_or("an unknown state");
                if self.win {
                    format!(
                        "The Rift collapsed into {landed}. You won {} {}!",
                        self.award, self.unit
                    )
                } else {
                    format!("The Rift collapsed into {landed}. Unlucky, the Rift was unstable.")
                }
            }
            ResultDetail::Forge { outcome, rune, .. } => match rune {
                Some(rune) => format!("LEGENDARY FORGE! You minted the {}!", rune.name()),
                None if self.win => {
                    format!("{outcome}! You forged {} {}.", self.award, self.unit)
                }
                None => format!("{outcome}... the forge was unstable."),
            },
            ResultDetail::Altar { event_type } => match event_type.as_str() {
                "Altar Shatter" => format!(
                    "JACKPOT! You shattered the Altar and won {} points!",
                    self.award
                ),
                "Essence Drain" => format!(
                    "Essence Drain! You siphoned {} points from the jackpot.",
                    self.award
                ),
                "Power Surge" => {
                    "Power Surge! Your channeled amount was doubled for dominance.".to_string()
                }
                other if self.win => format!("{other}! You won {} points.", self.award),
                other => format!("{other}!"),
            },
            ResultDetail::Bin { bin, .. } => {
                if self.win {
                    format!("Bin {bin}. WIN! You won {} {}!", self.award, self.unit)
                } else {
                    format!("Bin {bin}. UNLUCKY! You hit a dead bin.")
                }
            }
            ResultDetail::Cascade { .. } => {
                if self.win {
                    format!("+{} points added to your pot!", self.award)
                } else {
                    "CHAOS! Your pending winnings have been wiped!".to_string()
                }
            }
        }
    }
}
