// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The FSRS-6 memory model: retrievability, stability and difficulty updates,
//! and interval fuzzing. Everything here is a pure function of its inputs and
//! the weight vector.

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;

pub type Retrievability = f64;
pub type Stability = f64;
pub type Difficulty = f64;
/// Time in days.
pub type T = f64;

pub const WEIGHT_COUNT: usize = 21;

pub type Weights = [f64; WEIGHT_COUNT];

pub const DEFAULT_WEIGHTS: Weights = [
    0.212, 1.2931, 2.3065, 8.2956, 6.4133, 0.8334, 3.0194, 0.001, 1.8722, 0.1666, 0.796, 1.4835,
    0.0614, 0.2629, 1.6483, 0.6014, 1.8729, 0.5425, 0.0912, 0.0658, 0.1542,
];

const S_MIN: Stability = 0.001;
const S_MAX: Stability = 36500.0;
const D_MIN: Difficulty = 1.0;
const D_MAX: Difficulty = 10.0;

/// Intervals below this many days are never fuzzed.
const FUZZ_THRESHOLD: f64 = 2.5;

/// `(start, end, factor)`: each band widens the fuzz range by `factor` per day
/// of interval that falls inside it.
const FUZZ_RANGES: [(f64, f64, f64); 3] = [
    (2.5, 7.0, 0.15),
    (7.0, 20.0, 0.1),
    (20.0, f64::INFINITY, 0.05),
];

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    /// All ratings in the order the scheduler reports outcomes.
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Rating::Again => 1,
            Rating::Hard => 2,
            Rating::Good => 3,
            Rating::Easy => 4,
        }
    }

    /// Position in [`Rating::ALL`].
    pub fn index(&self) -> usize {
        (self.value() - 1) as usize
    }

    /// Cards graded `Again` or `Hard` come back later in the same session.
    pub fn should_repeat(&self) -> bool {
        matches!(self, Rating::Again | Rating::Hard)
    }
}

impl From<Rating> for f64 {
    fn from(rating: Rating) -> f64 {
        f64::from(rating.value())
    }
}

impl TryFrom<u8> for Rating {
    type Error = ErrorReport;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            _ => fail(format!("Invalid rating: {value}")),
        }
    }
}

impl ToSql for Rating {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.value())))
    }
}

impl FromSql for Rating {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let n: i64 = FromSql::column_result(value)?;
        let n = u8::try_from(n).map_err(|_| FromSqlError::OutOfRange(n))?;
        Rating::try_from(n).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CardState {
    New,
    Learning,
    Review,
    Relearning,
}

impl CardState {
    pub fn value(&self) -> u8 {
        match self {
            CardState::New => 0,
            CardState::Learning => 1,
            CardState::Review => 2,
            CardState::Relearning => 3,
        }
    }
}

impl TryFrom<u8> for CardState {
    type Error = ErrorReport;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CardState::New),
            1 => Ok(CardState::Learning),
            2 => Ok(CardState::Review),
            3 => Ok(CardState::Relearning),
            _ => fail(format!("Invalid card state: {value}")),
        }
    }
}

impl ToSql for CardState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.value())))
    }
}

impl FromSql for CardState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let n: i64 = FromSql::column_result(value)?;
        let n = u8::try_from(n).map_err(|_| FromSqlError::OutOfRange(n))?;
        CardState::try_from(n).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

fn decay(w: &Weights) -> f64 {
    -w[20]
}

fn factor(w: &Weights) -> f64 {
    0.9f64.powf(1.0 / decay(w)) - 1.0
}

fn clamp_s(s: Stability) -> Stability {
    s.clamp(S_MIN, S_MAX)
}

fn clamp_d(d: Difficulty) -> Difficulty {
    d.clamp(D_MIN, D_MAX)
}

pub fn retrievability(w: &Weights, t: T, s: Stability) -> Retrievability {
    (1.0 + factor(w) * t / s).powf(decay(w))
}

/// The unrounded interval, in days, at which retrievability falls to
/// `retention`.
pub fn interval(w: &Weights, retention: f64, s: Stability) -> T {
    (s / factor(w)) * (retention.powf(1.0 / decay(w)) - 1.0)
}

pub fn initial_stability(w: &Weights, g: Rating) -> Stability {
    clamp_s(w[g.index()])
}

/// Unclamped initial difficulty; [`initial_difficulty`] clamps it.
fn raw_initial_difficulty(w: &Weights, g: Rating) -> Difficulty {
    let g: f64 = g.into();
    w[4] - f64::exp(w[5] * (g - 1.0)) + 1.0
}

pub fn initial_difficulty(w: &Weights, g: Rating) -> Difficulty {
    clamp_d(raw_initial_difficulty(w, g))
}

pub fn new_difficulty(w: &Weights, d: Difficulty, g: Rating) -> Difficulty {
    let g: f64 = g.into();
    let delta = -w[6] * (g - 3.0);
    let damped = d + delta * (10.0 - d) / 9.0;
    let target = raw_initial_difficulty(w, Rating::Easy);
    clamp_d(w[7] * target + (1.0 - w[7]) * damped)
}

fn recall_stability(w: &Weights, d: Difficulty, s: Stability, r: Retrievability, g: Rating) -> Stability {
    let hard_penalty = if g == Rating::Hard { w[15] } else { 1.0 };
    let easy_bonus = if g == Rating::Easy { w[16] } else { 1.0 };
    let growth = f64::exp(w[8])
        * (11.0 - d)
        * s.powf(-w[9])
        * (f64::exp((1.0 - r) * w[10]) - 1.0)
        * hard_penalty
        * easy_bonus;
    clamp_s(s * (1.0 + growth))
}

fn forget_stability(w: &Weights, d: Difficulty, s: Stability, r: Retrievability) -> Stability {
    let long_term =
        w[11] * d.powf(-w[12]) * ((s + 1.0).powf(w[13]) - 1.0) * f64::exp((1.0 - r) * w[14]);
    let short_term = s / f64::exp(w[17] * w[18]);
    clamp_s(long_term.min(short_term))
}

/// Stability after a long-term review.
pub fn new_stability(w: &Weights, d: Difficulty, s: Stability, r: Retrievability, g: Rating) -> Stability {
    if g == Rating::Again {
        forget_stability(w, d, s, r)
    } else {
        recall_stability(w, d, s, r, g)
    }
}

/// Stability after a same-day review, used while a card is in its learning
/// steps.
pub fn short_term_stability(w: &Weights, s: Stability, g: Rating) -> Stability {
    let g: f64 = g.into();
    let mut increase = f64::exp(w[17] * (g - 3.0 + w[18])) * s.powf(-w[19]);
    if g >= 3.0 {
        increase = increase.max(1.0);
    }
    clamp_s(s * increase)
}

/// The inclusive range of days a fuzzed `interval` may land on.
pub fn fuzz_range(interval: f64, elapsed_days: u32, maximum_interval: u32) -> (u32, u32) {
    let mut delta = 1.0;
    for (start, end, factor) in FUZZ_RANGES {
        delta += factor * (interval.min(end) - start).max(0.0);
    }
    let maximum = f64::from(maximum_interval);
    let interval = interval.min(maximum);
    let mut min_ivl = (interval - delta).round().max(2.0);
    let max_ivl = (interval + delta).round().min(maximum);
    if interval > f64::from(elapsed_days) {
        min_ivl = min_ivl.max(f64::from(elapsed_days) + 1.0);
    }
    let min_ivl = min_ivl.min(max_ivl);
    (min_ivl as u32, max_ivl as u32)
}

/// Spread `interval` over its fuzz range using `fuzz` in `[0, 1)`.
pub fn apply_fuzz(interval: u32, elapsed_days: u32, maximum_interval: u32, fuzz: f64) -> u32 {
    let ivl = f64::from(interval);
    if ivl < FUZZ_THRESHOLD {
        return interval;
    }
    let (min_ivl, max_ivl) = fuzz_range(ivl, elapsed_days, maximum_interval);
    let span = f64::from(max_ivl - min_ivl + 1);
    (fuzz * span + f64::from(min_ivl)).floor() as u32
}

/// A deterministic value in `[0, 1)` derived from `seed`.
pub fn fuzz_factor(seed: &str) -> f64 {
    let hash = blake3::hash(seed.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    // Keep 53 bits so the quotient is exactly representable.
    let n = u64::from_le_bytes(bytes) >> 11;
    n as f64 / (1u64 << 53) as f64
}

/// Parse a weight vector from its comma-separated representation.
pub fn parse_weights(s: &str) -> Fallible<Weights> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != WEIGHT_COUNT {
        return fail(format!(
            "expected {WEIGHT_COUNT} weights, found {}",
            parts.len()
        ));
    }
    let mut w = [0.0; WEIGHT_COUNT];
    for (slot, part) in w.iter_mut().zip(parts) {
        *slot = part.parse::<f64>()?;
        if !slot.is_finite() {
            return fail(format!("weight is not a finite number: {part}"));
        }
    }
    Ok(w)
}

pub fn format_weights(w: &Weights) -> String {
    w.iter().map(f64::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: &Weights = &DEFAULT_WEIGHTS;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_retrievability_at_zero_is_one() {
        assert!(approx_eq(retrievability(W, 0.0, 3.0), 1.0));
    }

    #[test]
    fn test_retrievability_at_stability_is_ninety_percent() {
        // Stability is defined as the time for R to drop to 90%.
        for s in [0.5, 3.0, 42.0] {
            assert!(approx_eq(retrievability(W, s, s), 0.9));
        }
    }

    #[test]
    fn test_interval_at_ninety_percent_equals_stability() {
        for s in [0.5, 3.0, 42.0] {
            assert!(approx_eq(interval(W, 0.9, s), s));
        }
        assert!(interval(W, 0.8, 10.0) > interval(W, 0.95, 10.0));
    }

    #[test]
    fn test_initial_stability_is_weight() {
        assert_eq!(initial_stability(W, Rating::Again), 0.212);
        assert_eq!(initial_stability(W, Rating::Easy), 8.2956);
    }

    #[test]
    fn test_initial_difficulty_decreases_with_grade() {
        let d: Vec<f64> = Rating::ALL
            .iter()
            .map(|g| initial_difficulty(W, *g))
            .collect();
        assert!(d[0] > d[1] && d[1] > d[2] && d[2] >= d[3]);
        assert!(d.iter().all(|d| (D_MIN..=D_MAX).contains(d)));
    }

    #[test]
    fn test_new_difficulty_moves_with_grade() {
        assert!(new_difficulty(W, 5.0, Rating::Again) > 5.0);
        assert!(new_difficulty(W, 5.0, Rating::Easy) < 5.0);
        assert!(new_difficulty(W, 10.0, Rating::Again) <= D_MAX);
        assert!(new_difficulty(W, 1.0, Rating::Easy) >= D_MIN);
    }

    #[test]
    fn test_new_stability() {
        let r = retrievability(W, 10.0, 10.0);
        let again = new_stability(W, 5.0, 10.0, r, Rating::Again);
        let hard = new_stability(W, 5.0, 10.0, r, Rating::Hard);
        let good = new_stability(W, 5.0, 10.0, r, Rating::Good);
        let easy = new_stability(W, 5.0, 10.0, r, Rating::Easy);
        assert!(again < 10.0);
        assert!(hard > 10.0);
        assert!(hard < good && good < easy);
    }

    #[test]
    fn test_short_term_stability_never_shrinks_on_success() {
        for s in [0.1, 2.3, 30.0] {
            assert!(short_term_stability(W, s, Rating::Good) >= s);
            assert!(short_term_stability(W, s, Rating::Easy) >= s);
        }
    }

    #[test]
    fn test_fuzz_stays_in_range() {
        for interval in [3u32, 8, 25, 400] {
            let (lo, hi) = fuzz_range(f64::from(interval), 0, 36500);
            assert!(lo <= interval && interval <= hi);
            for fuzz in [0.0, 0.25, 0.5, 0.999] {
                let fuzzed = apply_fuzz(interval, 0, 36500, fuzz);
                assert!(lo <= fuzzed && fuzzed <= hi, "{fuzzed} outside {lo}..={hi}");
            }
        }
    }

    #[test]
    fn test_short_intervals_are_not_fuzzed() {
        assert_eq!(apply_fuzz(1, 0, 36500, 0.9), 1);
        assert_eq!(apply_fuzz(2, 0, 36500, 0.9), 2);
    }

    #[test]
    fn test_fuzz_factor_is_deterministic() {
        let a = fuzz_factor("1700000000000_3_12.5");
        let b = fuzz_factor("1700000000000_3_12.5");
        let c = fuzz_factor("1700000000000_4_12.5");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!((0.0..1.0).contains(&a));
    }

    #[test]
    fn test_parse_weights() -> Fallible<()> {
        let w = parse_weights(&format_weights(&DEFAULT_WEIGHTS))?;
        assert_eq!(w, DEFAULT_WEIGHTS);
        assert!(parse_weights("1, 2, 3").is_err());
        let mut bad = format_weights(&DEFAULT_WEIGHTS);
        bad.push_str("x");
        assert!(parse_weights(&bad).is_err());
        Ok(())
    }

    #[test]
    fn test_rating_conversions() -> Fallible<()> {
        for rating in Rating::ALL {
            assert_eq!(Rating::try_from(rating.value())?, rating);
            assert_eq!(Rating::ALL[rating.index()], rating);
        }
        assert!(Rating::try_from(0).is_err());
        assert!(Rating::Again.should_repeat());
        assert!(Rating::Hard.should_repeat());
        assert!(!Rating::Good.should_repeat());
        Ok(())
    }
}
