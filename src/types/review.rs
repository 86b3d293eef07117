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

use crate::fsrs::CardState;
use crate::fsrs::Difficulty;
use crate::fsrs::Rating;
use crate::fsrs::Stability;
use crate::types::card::CardId;
use crate::types::timestamp::Timestamp;

/// The log entry written for one grading event.
#[derive(Clone, PartialEq, Debug)]
pub struct Review {
    pub card_id: CardId,
    /// The card's state before it was graded.
    pub state: CardState,
    pub rating: Rating,
    /// The fields below describe the card after grading.
    pub due_at: Timestamp,
    pub stability: Stability,
    pub difficulty: Difficulty,
    pub scheduled_days: u32,
    pub learning_steps: u32,
    /// Days elapsed since the previous review.
    pub time: u32,
    /// Ignored reviews do not count against today's limits.
    pub is_ignored: bool,
    pub reviewed_at: Timestamp,
}
