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

//! Graded cards waiting to be persisted, and what became of the ones that
//! were.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use crate::store::SessionResult;
use crate::types::card::Card;
use crate::types::review::Review;

/// Identifies one opening of a session.
pub type SessionId = u64;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UploadStatus {
    Success,
    Error,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Success => "success",
            UploadStatus::Error => "error",
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct UploadItem {
    /// Position of the graded card in the session's card list.
    pub index: usize,
    pub card: Card,
    pub review: Review,
}

impl UploadItem {
    pub fn to_result(&self) -> SessionResult {
        SessionResult {
            card: self.card.clone(),
            review: self.review.clone(),
        }
    }
}

/// The outcome of one persistence call.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct UploadReport {
    pub session: SessionId,
    pub index: usize,
    pub status: UploadStatus,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct UploadQueue {
    items: VecDeque<UploadItem>,
    log: BTreeMap<usize, UploadStatus>,
}

impl UploadQueue {
    pub fn push(&mut self, item: UploadItem) {
        self.items.push_back(item);
    }

    /// The next item to persist.
    pub fn head(&self) -> Option<&UploadItem> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove the item for `index` and record its status. Returns `false` if
    /// no such item is queued.
    pub fn complete(&mut self, index: usize, status: UploadStatus) -> bool {
        let Some(position) = self.items.iter().position(|item| item.index == index) else {
            return false;
        };
        self.items.remove(position);
        self.log.insert(index, status);
        true
    }

    pub fn status(&self, index: usize) -> Option<UploadStatus> {
        self.log.get(&index).copied()
    }

    pub fn log(&self) -> &BTreeMap<usize, UploadStatus> {
        &self.log
    }

    pub fn failures(&self) -> usize {
        self.log
            .values()
            .filter(|status| **status == UploadStatus::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsrs::CardState;
    use crate::fsrs::Rating;
    use crate::types::card::CardContent;
    use crate::types::timestamp::Timestamp;

    fn item(index: usize) -> UploadItem {
        let now = Timestamp::now();
        let card = Card::new(index as i64, 1, 1, CardContent::new());
        let review = Review {
            card_id: card.id,
            state: CardState::New,
            rating: Rating::Good,
            due_at: now,
            stability: 1.0,
            difficulty: 5.0,
            scheduled_days: 0,
            learning_steps: 1,
            time: 0,
            is_ignored: false,
            reviewed_at: now,
        };
        UploadItem { index, card, review }
    }

    #[test]
    fn test_fifo() {
        let mut queue = UploadQueue::default();
        queue.push(item(0));
        queue.push(item(1));
        assert_eq!(queue.head().map(|i| i.index), Some(0));
        assert!(queue.complete(0, UploadStatus::Success));
        assert_eq!(queue.head().map(|i| i.index), Some(1));
        assert!(queue.complete(1, UploadStatus::Error));
        assert!(queue.is_empty());
        assert_eq!(queue.status(0), Some(UploadStatus::Success));
        assert_eq!(queue.status(1), Some(UploadStatus::Error));
        assert_eq!(queue.failures(), 1);
    }

    #[test]
    fn test_complete_unknown_index() {
        let mut queue = UploadQueue::default();
        queue.push(item(0));
        assert!(!queue.complete(5, UploadStatus::Success));
        assert_eq!(queue.len(), 1);
        assert!(queue.log().is_empty());
    }

    #[test]
    fn test_status_is_set_once() {
        let mut queue = UploadQueue::default();
        queue.push(item(0));
        assert!(queue.complete(0, UploadStatus::Error));
        assert!(!queue.complete(0, UploadStatus::Success));
        assert_eq!(queue.status(0), Some(UploadStatus::Error));
    }
}
