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

use crate::types::card::Card;
use crate::types::counts::Category;
use crate::types::counts::Counts;

/// Cards studied so far, and cards still to go, per category.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Progress {
    pub done: Counts,
    pub pending: Counts,
}

impl Progress {
    /// Cards before `index` are done; the rest are pending.
    pub fn partition(cards: &[Card], index: usize) -> Self {
        let mut progress = Progress::default();
        for (i, card) in cards.iter().enumerate() {
            let category = Category::of(card.state);
            if i < index {
                progress.done.increment(category);
            } else {
                progress.pending.increment(category);
            }
        }
        progress
    }
}
