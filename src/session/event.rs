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

use crate::fsrs::Rating;
use crate::session::upload::UploadReport;
use crate::store::Consumption;
use crate::store::DeckCounts;
use crate::store::SessionData;
use crate::types::card::DeckId;
use crate::types::card::FieldId;
use crate::types::counts::Category;
use crate::types::counts::LessonType;
use crate::types::timestamp::Timestamp;

/// Everything that can happen to a session.
#[derive(Clone, PartialEq, Debug)]
pub enum Event {
    /// Open a session over one deck, or all of them.
    OpenSession {
        lesson_type: LessonType,
        deck_id: Option<DeckId>,
    },
    AvailableCountsReceived(Vec<DeckCounts>),
    ConsumptionReceived(Consumption),
    /// The learner changed the planned amount of one category.
    AmountAdjusted { category: Category, value: u32 },
    SessionSubmitted,
    SessionDataReceived { data: SessionData, now: Timestamp },
    AnswerChanged { field_id: FieldId, value: String },
    CardSubmitted,
    GradeSelected { rating: Rating, now: Timestamp },
    /// Ask for (`true`) or withdraw (`false`) a request to end the session
    /// early.
    TerminationRequested(bool),
    /// Close the session. While studying, an unconfirmed close only asks for
    /// confirmation.
    SessionClosed { confirmed: bool },
    UploadResult(UploadReport),
}
