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

//! Decides how many cards of each category enter a session, given what is
//! available and what is left of today's limits.

use crate::types::counts::Amounts;
use crate::types::counts::Category;
use crate::types::counts::Counts;
use crate::types::counts::LessonType;

/// A daily limit. Stored as a count where `0` means no limit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Limit {
    Unlimited,
    Cards(u32),
}

impl Limit {
    pub fn from_setting(value: u32) -> Self {
        if value == 0 {
            Limit::Unlimited
        } else {
            Limit::Cards(value)
        }
    }

    /// What is left after `consumed` cards. Unlimited stays unlimited.
    pub fn remaining(self, consumed: u32) -> u32 {
        match self {
            Limit::Unlimited => u32::MAX,
            Limit::Cards(limit) => limit.saturating_sub(consumed),
        }
    }
}

/// Per-category remainder of today's limits: `max(limit - consumed, 0)`,
/// with unlimited categories reported as `u32::MAX`.
pub fn remaining(limits: &Counts, consumed: &Counts) -> Counts {
    let diff = |ty: LessonType| Limit::from_setting(limits.get(ty)).remaining(consumed.get(ty));
    Counts {
        untouched: diff(LessonType::Untouched),
        learn: diff(LessonType::Learn),
        review: diff(LessonType::Review),
        total: diff(LessonType::Total),
    }
}

/// Plan a session of `requested` cards.
pub fn allocate(available: &Counts, diff: &Counts, requested: LessonType) -> Amounts {
    let mut amounts = Amounts::default();
    match requested.category() {
        None => {
            let mut remainder = diff.total;
            for category in Category::PRIORITY {
                let amount = available
                    .category(category)
                    .min(diff.category(category))
                    .min(remainder);
                amounts.set(category, amount);
                remainder -= amount;
            }
            amounts.recompute_total();
        }
        Some(category) => {
            let amount = available
                .category(category)
                .min(diff.category(category))
                .min(diff.total);
            amounts.set(category, amount);
            amounts.total = amount;
        }
    }
    log::debug!("Allocated {amounts:?} for {requested} from {available:?} within {diff:?}");
    amounts
}
