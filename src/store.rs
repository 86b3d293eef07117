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

//! What the session needs from persistence.

use crate::allocator::Limit;
use crate::allocator::remaining;
use crate::config::DailyLimits;
use crate::error::Fallible;
use crate::params::Algorithm;
use crate::types::card::AlgorithmId;
use crate::types::card::Card;
use crate::types::card::DeckId;
use crate::types::counts::Amounts;
use crate::types::counts::Counts;
use crate::types::deck::Deck;
use crate::types::review::Review;
use crate::types::template::Template;
use crate::types::timestamp::Timestamp;

/// Which decks a session draws cards from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeckFilter {
    All,
    Deck(DeckId),
}

impl DeckFilter {
    pub fn deck_id(&self) -> Option<DeckId> {
        match self {
            DeckFilter::All => None,
            DeckFilter::Deck(id) => Some(*id),
        }
    }

    pub fn matches(&self, deck_id: DeckId) -> bool {
        match self {
            DeckFilter::All => true,
            DeckFilter::Deck(id) => *id == deck_id,
        }
    }
}

impl From<Option<DeckId>> for DeckFilter {
    fn from(deck_id: Option<DeckId>) -> Self {
        match deck_id {
            Some(id) => DeckFilter::Deck(id),
            None => DeckFilter::All,
        }
    }
}

/// Cards available right now in one deck, or across all decks when
/// `deck_id` is `None`.
#[derive(Clone, PartialEq, Debug)]
pub struct DeckCounts {
    pub deck_id: Option<DeckId>,
    pub title: String,
    pub counts: Counts,
}

/// Which categories have used up today's allowance.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct OverLimit {
    pub untouched: bool,
    pub learn: bool,
    pub review: bool,
    pub total: bool,
}

/// Today's limits and how much of them has been used.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Consumption {
    pub daily_limits: DailyLimits,
    pub consumed: Counts,
}

impl Consumption {
    pub fn remaining(&self) -> Counts {
        remaining(&self.daily_limits.as_counts(), &self.consumed)
    }

    pub fn over_limit(&self) -> OverLimit {
        let reached = |limit: u32, consumed: u32| match Limit::from_setting(limit) {
            Limit::Unlimited => false,
            Limit::Cards(limit) => consumed >= limit,
        };
        let limits = &self.daily_limits;
        let consumed = &self.consumed;
        let total = consumed.total > 0 && reached(limits.total, consumed.total);
        let category = |limit: u32, consumed: u32| consumed > 0 && (total || reached(limit, consumed));
        OverLimit {
            untouched: category(limits.untouched, consumed.untouched),
            learn: category(limits.learn, consumed.learn),
            review: category(limits.review, consumed.review),
            total,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct AlgorithmRecord {
    pub id: AlgorithmId,
    pub title: String,
    pub algorithm: Algorithm,
}

/// Everything a session needs to show and grade its cards.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SessionData {
    pub cards: Vec<Card>,
    pub decks: Vec<Deck>,
    pub templates: Vec<Template>,
    pub algorithms: Vec<AlgorithmRecord>,
}

/// A graded card and its review log entry, stored together.
#[derive(Clone, PartialEq, Debug)]
pub struct SessionResult {
    pub card: Card,
    pub review: Review,
}

pub trait Store: Send + Sync {
    /// The aggregate over the decks matching `filter` comes first, followed
    /// by one entry per matching deck.
    fn available_counts(&self, filter: DeckFilter, now: Timestamp) -> Fallible<Vec<DeckCounts>>;

    fn today_consumption(&self, now: Timestamp) -> Fallible<Consumption>;

    fn session_cards(&self, filter: DeckFilter, amounts: &Amounts, now: Timestamp) -> Fallible<SessionData>;

    /// Store the updated card and append its review, atomically.
    fn persist_result(&self, result: &SessionResult) -> Fallible<()>;
}
