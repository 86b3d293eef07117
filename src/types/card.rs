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

use std::collections::BTreeMap;

use crate::fsrs::CardState;
use crate::fsrs::Difficulty;
use crate::fsrs::Stability;
use crate::types::timestamp::Timestamp;

pub type CardId = i64;
pub type DeckId = i64;
pub type TemplateId = i64;
pub type AlgorithmId = i64;
pub type FieldId = i64;

/// A card's text, keyed by the id of the template field it fills.
pub type CardContent = BTreeMap<FieldId, String>;

#[derive(Clone, PartialEq, Debug)]
pub struct Card {
    pub id: CardId,
    pub deck_id: DeckId,
    pub template_id: TemplateId,
    pub content: CardContent,
    pub state: CardState,
    /// The card's stability (an FSRS parameter).
    pub stability: Stability,
    /// The card's difficulty (an FSRS parameter).
    pub difficulty: Difficulty,
    /// Days until the next review, as chosen by the last grading.
    pub scheduled_days: u32,
    /// Index of the learning step the card is on.
    pub learning_steps: u32,
    /// The number of times the card has been reviewed.
    pub reps: u32,
    /// The number of times the card was forgotten after graduating.
    pub lapses: u32,
    /// `None` if and only if the card is new.
    pub due_at: Option<Timestamp>,
    pub last_reviewed_at: Option<Timestamp>,
}

impl Card {
    /// A card that has never been reviewed.
    pub fn new(id: CardId, deck_id: DeckId, template_id: TemplateId, content: CardContent) -> Self {
        Self {
            id,
            deck_id,
            template_id,
            content,
            state: CardState::New,
            stability: 0.0,
            difficulty: 0.0,
            scheduled_days: 0,
            learning_steps: 0,
            reps: 0,
            lapses: 0,
            due_at: None,
            last_reviewed_at: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.state == CardState::New
    }

    pub fn field(&self, field_id: FieldId) -> Option<&str> {
        self.content.get(&field_id).map(String::as_str)
    }

    /// Reset the card's scheduling state to that of a new card.
    pub fn reset_progress(&mut self) {
        let fresh = Card::new(self.id, self.deck_id, self.template_id, CardContent::new());
        self.state = fresh.state;
        self.stability = fresh.stability;
        self.difficulty = fresh.difficulty;
        self.scheduled_days = fresh.scheduled_days;
        self.learning_steps = fresh.learning_steps;
        self.reps = fresh.reps;
        self.lapses = fresh.lapses;
        self.due_at = fresh.due_at;
        self.last_reviewed_at = fresh.last_reviewed_at;
    }
}
