//! Cosmetic result animations. They run on the UI tick and never hold up an
//! action; the result itself is already applied when one starts.

use rand::Rng;
use std::time::{
    Duration,
    Instant,
};
use synchronizer::{
    games::{
        PLINKO_BINS,
        PLINKO_ROWS,
    },
    outcome::{
        ResultDetail,
        RoundResult,
    },
};

pub const COIN_SPIN: Duration = Duration::from_millis(1_200);
pub const COIN_FACE_SWAP: Duration = Duration::from_millis(100);
pub const BALL_ROW_STEP: Duration = Duration::from_millis(90);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnimationKind {
    CoinSpin { heads: bool },
    /// Column of the ball after each row, starting above row 0.
    BallDrop { path: Vec<usize> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationFrame {
    Coin { heads: bool, settled: bool },
    Ball { row: usize, column: usize, settled: bool },
}

#[derive(Clone, Debug)]
pub struct Animation {
    kind: AnimationKind,
    started: Instant,
}

impl Animation {
    /// Animation for a freshly reconciled result, if its game has one.
    pub fn for_result<R: Rng + ?Sized>(
        result: &RoundResult,
        rng: &mut R,
        now: Instant,
    ) -> Option<Self> {
        let kind = match result.detail {
            ResultDetail::Coin { heads } => AnimationKind::CoinSpin { heads },
            ResultDetail::Bin { bin, .. } => AnimationKind::BallDrop {
                path: ball_path(rng, usize::from(bin)),
            },
            _ => return None,
        };
        Some(Self { kind, started: now })
    }

    pub fn kind(&self) -> &AnimationKind {
        &self.kind
    }

    pub fn duration(&self) -> Duration {
        match &self.kind {
            AnimationKind::CoinSpin { .. } => COIN_SPIN,
            AnimationKind::BallDrop { path } => {
                BALL_ROW_STEP * u32::try_from(path.len()).unwrap_or(u32::MAX)
            }
        }
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.duration()
    }

    pub fn frame(&self, now: Instant) -> AnimationFrame {
        let elapsed = now.saturating_duration_since(self.started);
        let settled = self.is_finished(now);
        match &self.kind {
            AnimationKind::CoinSpin { heads } => {
                if settled {
                    return AnimationFrame::Coin {
                        heads: *heads,
                        settled,
                    };
                }
                let swaps = elapsed.as_millis() / COIN_FACE_SWAP.as_millis();
                AnimationFrame::Coin {
                    heads: swaps % 2 == 0,
                    settled,
                }
            }
            AnimationKind::BallDrop { path } => {
                let step = (elapsed.as_millis() / BALL_ROW_STEP.as_millis()) as usize;
                let row = step.min(path.len().saturating_sub(1));
                AnimationFrame::Ball {
                    row,
                    column: path.get(row).copied().unwrap_or_default(),
                    settled,
                }
            }
        }
    }
}

/// Random walk from column 0 through every peg row that lands in `bin`.
/// Each row moves the ball right by one or leaves it where it is; a step is
/// only random while both directions can still reach the bin.
pub fn ball_path<R: Rng + ?Sized>(rng: &mut R, bin: usize) -> Vec<usize> {
    let bin = bin.min(PLINKO_BINS - 1);
    let mut path = Vec::with_capacity(PLINKO_ROWS + 1);
    let mut column = 0;
    path.push(column);
    for row in 0..PLINKO_ROWS {
        let remaining = PLINKO_ROWS - row;
        let needed = bin - column;
        let go_right = if needed == remaining {
            true
        } else if needed == 0 {
            false
        } else {
            rng.random_bool(0.5)
        };
        if go_right {
            column += 1;
        }
        path.push(column);
    }
    path
}
