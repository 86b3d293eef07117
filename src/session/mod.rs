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

//! A study session as a pure state machine. Hosts feed it [`Event`]s through
//! [`Session::reduce`], perform the [`Effect`] it asks for, and read its
//! state back through the accessors.

pub mod answer;
pub mod event;
pub mod progress;
pub mod upload;

use std::collections::BTreeMap;

use crate::allocator::allocate;
use crate::error::Fallible;
use crate::error::fail;
use crate::fsrs::Rating;
use crate::scheduler::Outcome;
use crate::scheduler::Scheduler;
use crate::session::event::Event;
use crate::session::progress::Progress;
use crate::session::upload::SessionId;
use crate::session::upload::UploadItem;
use crate::session::upload::UploadQueue;
use crate::session::upload::UploadReport;
use crate::store::Consumption;
use crate::store::DeckCounts;
use crate::store::DeckFilter;
use crate::store::SessionData;
use crate::types::card::Card;
use crate::types::card::FieldId;
use crate::types::counts::Amounts;
use crate::types::counts::Category;
use crate::types::counts::Counts;
use crate::types::counts::LessonType;
use crate::types::template::Template;
use crate::types::timestamp::Timestamp;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum Phase {
    /// Choosing how many cards to study.
    #[default]
    Init,
    Started,
    Finished,
}

/// A fetch the session is waiting on.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Effect {
    FetchAvailableCounts(DeckFilter),
    FetchConsumption,
    FetchSessionData(DeckFilter, Amounts),
}

/// The learner's answers to the current card.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Form {
    pub answers: BTreeMap<FieldId, String>,
    /// The field to focus first.
    pub first_input_field: Option<FieldId>,
    pub is_submitted: bool,
}

/// The card being studied.
#[derive(Clone, PartialEq, Debug)]
pub struct Content {
    pub index: usize,
    pub card: Card,
    pub template: Template,
    pub form: Form,
    grades: [Outcome; 4],
}

impl Content {
    pub fn outcome(&self, rating: Rating) -> &Outcome {
        &self.grades[rating.index()]
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct Session {
    id: SessionId,
    is_open: bool,
    phase: Phase,
    termination_requested: bool,
    lesson_type: Option<LessonType>,
    filter: Option<DeckFilter>,
    available: Option<Vec<DeckCounts>>,
    consumption: Option<Consumption>,
    amounts: Option<Amounts>,
    is_submitted: bool,
    data: Option<SessionData>,
    /// Position of the current card in `data.cards`.
    index: usize,
    content: Option<Content>,
    progress: Option<Progress>,
    upload: UploadQueue,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reduce(mut self, event: Event) -> Session {
        match event {
            Event::OpenSession {
                lesson_type,
                deck_id,
            } => return self.open(lesson_type, DeckFilter::from(deck_id)),
            Event::AvailableCountsReceived(counts) => {
                if self.in_init() {
                    self.available = Some(counts);
                    self.plan();
                }
            }
            Event::ConsumptionReceived(consumption) => {
                if self.in_init() {
                    self.consumption = Some(consumption);
                    self.plan();
                }
            }
            Event::AmountAdjusted { category, value } => self.adjust(category, value),
            Event::SessionSubmitted => {
                if self.in_init() && self.amounts.is_some() {
                    self.is_submitted = true;
                }
            }
            Event::SessionDataReceived { data, now } => self.start(data, now),
            Event::AnswerChanged { field_id, value } => {
                if let Some(content) = &mut self.content {
                    if !content.form.is_submitted {
                        content.form.answers.insert(field_id, value);
                    }
                }
            }
            Event::CardSubmitted => {
                if self.termination_requested {
                    log::warn!("Ignoring submit while termination is pending.");
                } else if let Some(content) = &mut self.content {
                    content.form.is_submitted = true;
                }
            }
            Event::GradeSelected { rating, now } => self.grade(rating, now),
            Event::TerminationRequested(requested) => {
                self.termination_requested = requested && self.is_studying();
            }
            Event::SessionClosed { confirmed } => {
                if !self.is_open {
                    return self;
                }
                if self.is_studying() && !confirmed {
                    self.termination_requested = true;
                } else {
                    return self.close();
                }
            }
            Event::UploadResult(report) => self.record_upload(report),
        }
        self
    }

    fn open(self, lesson_type: LessonType, filter: DeckFilter) -> Session {
        if self.is_open {
            log::warn!("Session {} is already open.", self.id);
            return self;
        }
        let id = self.id + 1;
        log::debug!("Opening session {id}: {lesson_type} over {filter:?}");
        Session {
            id,
            is_open: true,
            lesson_type: Some(lesson_type),
            filter: Some(filter),
            ..Session::default()
        }
    }

    fn close(self) -> Session {
        log::debug!("Closing session {}", self.id);
        Session {
            id: self.id,
            ..Session::default()
        }
    }

    fn in_init(&self) -> bool {
        self.is_open && self.phase == Phase::Init && !self.is_submitted
    }

    fn is_studying(&self) -> bool {
        self.is_open && self.phase == Phase::Started
    }

    /// Run the allocator once both inputs are known. Later inputs keep the
    /// planned amounts, including the learner's adjustments.
    fn plan(&mut self) {
        if self.amounts.is_some() {
            return;
        }
        let (Some(available), Some(consumption), Some(lesson_type)) =
            (&self.available, &self.consumption, self.lesson_type)
        else {
            return;
        };
        let available = available.first().map(|d| d.counts).unwrap_or_default();
        self.amounts = Some(allocate(&available, &consumption.remaining(), lesson_type));
    }

    fn adjust(&mut self, category: Category, value: u32) {
        if !self.in_init() {
            return;
        }
        let available = self.available_counts();
        if let Some(amounts) = &mut self.amounts {
            amounts.set(category, value.min(available.category(category)));
            amounts.recompute_total();
        }
    }

    fn start(&mut self, data: SessionData, now: Timestamp) {
        if !self.is_open || !self.is_submitted || self.data.is_some() {
            log::warn!("Ignoring unexpected session data.");
            return;
        }
        log::debug!("Session {} received {} cards", self.id, data.cards.len());
        self.data = Some(data);
        self.phase = Phase::Started;
        self.index = 0;
        self.show_card(now);
    }

    fn grade(&mut self, rating: Rating, now: Timestamp) {
        if !self.is_studying() || self.termination_requested {
            log::warn!("Ignoring grade outside of study.");
            return;
        }
        let Some(content) = &self.content else {
            log::warn!("No card to grade.");
            return;
        };
        if !content.form.is_submitted {
            log::warn!("Card {} graded before it was submitted.", content.card.id);
            return;
        }
        let index = content.index;
        let outcome = content.outcome(rating).clone();
        if let Some(data) = &mut self.data {
            if rating.should_repeat() {
                data.cards.push(outcome.card.clone());
            }
        }
        self.upload.push(UploadItem {
            index,
            card: outcome.card,
            review: outcome.review,
        });
        self.index += 1;
        self.show_card(now);
    }

    /// Show the card at `index`, or finish if there is none.
    fn show_card(&mut self, now: Timestamp) {
        let Some(data) = &self.data else {
            return;
        };
        self.progress = Some(Progress::partition(&data.cards, self.index));
        let Some(card) = data.cards.get(self.index) else {
            log::debug!("Session {} finished", self.id);
            self.phase = Phase::Finished;
            self.termination_requested = false;
            self.content = None;
            return;
        };
        self.content = match resolve(data, card) {
            Ok((template, scheduler)) => {
                let requires_input = template.requires_input();
                Some(Content {
                    index: self.index,
                    card: card.clone(),
                    form: Form {
                        answers: BTreeMap::new(),
                        first_input_field: template.first_input_field(),
                        is_submitted: !requires_input,
                    },
                    grades: scheduler.grades(card, now),
                    template,
                })
            }
            Err(e) => {
                log::warn!("Card {} cannot be studied: {}", card.id, e.message());
                None
            }
        };
    }

    fn record_upload(&mut self, report: UploadReport) {
        if report.session != self.id {
            log::debug!(
                "Ignoring upload report for session {} in session {}",
                report.session,
                self.id
            );
            return;
        }
        if self.upload.complete(report.index, report.status) {
            log::debug!("Card at {}: {}", report.index, report.status.as_str());
        }
    }

    /// The fetch this session is waiting on, if any.
    pub fn pending_effect(&self) -> Option<Effect> {
        if !self.is_open {
            return None;
        }
        let filter = self.filter?;
        if self.phase != Phase::Init {
            return None;
        }
        if self.available.is_none() {
            return Some(Effect::FetchAvailableCounts(filter));
        }
        if self.consumption.is_none() {
            return Some(Effect::FetchConsumption);
        }
        match (self.is_submitted, self.amounts) {
            (true, Some(amounts)) if self.data.is_none() => {
                Some(Effect::FetchSessionData(filter, amounts))
            }
            _ => None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_termination_requested(&self) -> bool {
        self.termination_requested
    }

    pub fn lesson_type(&self) -> Option<LessonType> {
        self.lesson_type
    }

    pub fn filter(&self) -> Option<DeckFilter> {
        self.filter
    }

    pub fn available(&self) -> Option<&[DeckCounts]> {
        self.available.as_deref()
    }

    /// The counts the session allocates from.
    pub fn available_counts(&self) -> Counts {
        self.available
            .as_ref()
            .and_then(|counts| counts.first())
            .map(|d| d.counts)
            .unwrap_or_default()
    }

    pub fn consumption(&self) -> Option<&Consumption> {
        self.consumption.as_ref()
    }

    pub fn amounts(&self) -> Option<&Amounts> {
        self.amounts.as_ref()
    }

    pub fn is_submitted(&self) -> bool {
        self.is_submitted
    }

    pub fn cards(&self) -> &[Card] {
        self.data.as_ref().map(|d| d.cards.as_slice()).unwrap_or_default()
    }

    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    pub fn card(&self) -> Option<&Card> {
        self.content.as_ref().map(|c| &c.card)
    }

    pub fn template(&self) -> Option<&Template> {
        self.content.as_ref().map(|c| &c.template)
    }

    /// The four outcomes of the current card, once it has been submitted.
    pub fn grades(&self) -> Option<&[Outcome; 4]> {
        self.content
            .as_ref()
            .filter(|c| c.form.is_submitted)
            .map(|c| &c.grades)
    }

    /// Studying, but stuck on a card that cannot be shown.
    pub fn is_stalled(&self) -> bool {
        self.is_studying() && self.content.is_none()
    }

    pub fn progress(&self) -> Option<&Progress> {
        self.progress.as_ref()
    }

    pub fn upload(&self) -> &UploadQueue {
        &self.upload
    }
}

/// The template and scheduler for `card`.
fn resolve(data: &SessionData, card: &Card) -> Fallible<(Template, Scheduler)> {
    let Some(deck) = data.decks.iter().find(|d| d.id == card.deck_id) else {
        return fail(format!("deck {} is missing", card.deck_id));
    };
    let Some(template) = data.templates.iter().find(|t| t.id == card.template_id) else {
        return fail(format!("template {} is missing", card.template_id));
    };
    let Some(record) = data.algorithms.iter().find(|a| a.id == deck.algorithm_id) else {
        return fail(format!("algorithm {} is missing", deck.algorithm_id));
    };
    record.algorithm.validate()?;
    let scheduler = Scheduler::from_algorithm(&record.algorithm)?;
    Ok((template.clone(), scheduler))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;
    use crate::config::DailyLimits;
    use crate::fsrs::CardState;
    use crate::helper::sample_data;
    use crate::session::upload::UploadStatus;
    use crate::types::template::LayoutItem;
    use crate::types::template::Operation;

    fn now() -> Timestamp {
        Timestamp::new(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap())
    }

    fn counts(untouched: u32, learn: u32, review: u32) -> Event {
        Event::AvailableCountsReceived(vec![DeckCounts {
            deck_id: None,
            title: "All decks".to_string(),
            counts: Counts::new(untouched, learn, review),
        }])
    }

    fn consumption(total: u32, untouched: u32) -> Event {
        Event::ConsumptionReceived(Consumption {
            daily_limits: DailyLimits {
                total,
                untouched,
                learn: 10,
                review: 10,
            },
            consumed: Counts::default(),
        })
    }

    fn open(lesson_type: LessonType) -> Session {
        Session::new().reduce(Event::OpenSession {
            lesson_type,
            deck_id: None,
        })
    }

    /// A session studying `data`.
    fn started(data: SessionData) -> Session {
        let n = data.cards.len() as u32;
        open(LessonType::Untouched)
            .reduce(counts(n, 0, 0))
            .reduce(consumption(0, 0))
            .reduce(Event::SessionSubmitted)
            .reduce(Event::SessionDataReceived { data, now: now() })
    }

    fn submit_and_grade(session: Session, rating: Rating) -> Session {
        session
            .reduce(Event::CardSubmitted)
            .reduce(Event::GradeSelected { rating, now: now() })
    }

    fn check_progress(session: &Session) {
        if let Some(progress) = session.progress() {
            assert_eq!(
                progress.done.total + progress.pending.total,
                session.cards().len() as u32
            );
        }
    }

    #[test]
    fn test_open() {
        let session = open(LessonType::Total);
        assert!(session.is_open());
        assert_eq!(session.id(), 1);
        assert_eq!(session.phase(), Phase::Init);
        assert_eq!(session.filter(), Some(DeckFilter::All));
        assert_eq!(
            session.pending_effect(),
            Some(Effect::FetchAvailableCounts(DeckFilter::All))
        );
        let session = session.reduce(counts(1, 1, 1));
        assert_eq!(session.pending_effect(), Some(Effect::FetchConsumption));
        let session = session.reduce(consumption(10, 2));
        assert_eq!(session.pending_effect(), None);
    }

    #[test]
    fn test_open_twice_is_ignored() {
        let session = open(LessonType::Total).reduce(Event::OpenSession {
            lesson_type: LessonType::Review,
            deck_id: Some(4),
        });
        assert_eq!(session.id(), 1);
        assert_eq!(session.lesson_type(), Some(LessonType::Total));
    }

    #[test]
    fn test_allocation_waits_for_both_inputs() {
        let session = open(LessonType::Untouched).reduce(consumption(10, 2));
        assert_eq!(session.amounts(), None);
        let session = session.reduce(counts(3, 0, 0));
        assert_eq!(session.amounts(), Some(&Counts::new(2, 0, 0)));
    }

    #[test]
    fn test_amount_adjusted() {
        let session = open(LessonType::Total)
            .reduce(counts(5, 5, 5))
            .reduce(consumption(0, 0))
            .reduce(Event::AmountAdjusted {
                category: Category::Learn,
                value: 2,
            });
        assert_eq!(session.amounts(), Some(&Counts::new(5, 2, 5)));
        let session = session.reduce(Event::AmountAdjusted {
            category: Category::Review,
            value: 50,
        });
        assert_eq!(session.amounts(), Some(&Counts::new(5, 2, 5)));
    }

    #[test]
    fn test_adjustment_survives_new_inputs() {
        let session = open(LessonType::Total)
            .reduce(counts(5, 5, 5))
            .reduce(consumption(0, 0))
            .reduce(Event::AmountAdjusted {
                category: Category::Learn,
                value: 1,
            });
        assert_eq!(session.amounts(), Some(&Counts::new(5, 1, 5)));
        let session = session.reduce(counts(5, 5, 5)).reduce(consumption(0, 0));
        assert_eq!(session.amounts(), Some(&Counts::new(5, 1, 5)));
    }

    #[test]
    fn test_submit_requests_cards() {
        let session = open(LessonType::Total)
            .reduce(counts(2, 0, 0))
            .reduce(consumption(0, 0))
            .reduce(Event::SessionSubmitted);
        assert!(session.is_submitted());
        assert_eq!(
            session.pending_effect(),
            Some(Effect::FetchSessionData(DeckFilter::All, Counts::new(2, 0, 0)))
        );
        // Amounts are frozen once submitted.
        let session = session.reduce(Event::AmountAdjusted {
            category: Category::Untouched,
            value: 1,
        });
        assert_eq!(session.amounts(), Some(&Counts::new(2, 0, 0)));
    }

    #[test]
    fn test_start_shows_first_card() {
        let session = started(sample_data(2));
        assert_eq!(session.phase(), Phase::Started);
        assert_eq!(session.pending_effect(), None);
        let content = session.content().unwrap();
        assert_eq!(content.index, 0);
        assert_eq!(content.card.id, 1);
        assert_eq!(content.form.first_input_field, Some(2));
        assert!(!content.form.is_submitted);
        assert!(session.grades().is_none());
        let progress = session.progress().unwrap();
        assert_eq!(progress.done.total, 0);
        assert_eq!(progress.pending.untouched, 2);
    }

    #[test]
    fn test_answers_and_submit() {
        let session = started(sample_data(1)).reduce(Event::AnswerChanged {
            field_id: 2,
            value: "back 0".to_string(),
        });
        assert_eq!(
            session.content().unwrap().form.answers.get(&2).map(String::as_str),
            Some("back 0")
        );
        let session = session.reduce(Event::CardSubmitted);
        let grades = session.grades().unwrap();
        assert_eq!(grades[0].review.rating, Rating::Again);
        assert_eq!(grades[3].card.state, CardState::Review);
        // Answers are frozen after submission.
        let session = session.reduce(Event::AnswerChanged {
            field_id: 2,
            value: "other".to_string(),
        });
        assert_eq!(
            session.content().unwrap().form.answers.get(&2).map(String::as_str),
            Some("back 0")
        );
    }

    #[test]
    fn test_display_only_card_is_auto_submitted() {
        let mut data = sample_data(1);
        data.templates[0].content.layout = vec![
            LayoutItem {
                field: 1,
                operation: Operation::Display,
            },
            LayoutItem {
                field: 2,
                operation: Operation::Reveal,
            },
        ];
        let session = started(data);
        assert!(session.content().unwrap().form.is_submitted);
        assert!(session.grades().is_some());
    }

    #[test]
    fn test_grade_before_submit_is_ignored() {
        let session = started(sample_data(1)).reduce(Event::GradeSelected {
            rating: Rating::Good,
            now: now(),
        });
        assert_eq!(session.content().unwrap().index, 0);
        assert!(session.upload().is_empty());
    }

    #[test]
    fn test_again_and_hard_repeat() {
        let session = started(sample_data(3));
        let session = submit_and_grade(session, Rating::Again);
        check_progress(&session);
        assert_eq!(session.cards().len(), 4);
        let session = submit_and_grade(session, Rating::Hard);
        check_progress(&session);
        assert_eq!(session.cards().len(), 5);
        let session = submit_and_grade(session, Rating::Good);
        check_progress(&session);
        assert_eq!(session.cards().len(), 5);
        assert_eq!(session.upload().len(), 3);
        let mut queue = session.upload().clone();
        for index in 0..3 {
            assert_eq!(queue.head().map(|item| item.index), Some(index));
            queue.complete(index, UploadStatus::Success);
        }
        // The repeated cards carry their post-grade state.
        assert_eq!(session.cards()[3].state, CardState::Learning);
        assert_eq!(session.cards()[3].reps, 1);
        let progress = session.progress().unwrap();
        assert_eq!(progress.done.total, 3);
        assert_eq!(progress.pending.learn, 2);
    }

    #[test]
    fn test_finish() {
        let mut session = started(sample_data(2));
        while session.phase() == Phase::Started {
            session = submit_and_grade(session, Rating::Easy);
            check_progress(&session);
        }
        assert_eq!(session.phase(), Phase::Finished);
        assert!(session.content().is_none());
        assert!(!session.is_stalled());
        assert_eq!(session.progress().unwrap().done.total, 2);
        assert_eq!(session.upload().len(), 2);
    }

    #[test]
    fn test_empty_session_finishes() {
        let session = started(sample_data(0));
        assert_eq!(session.phase(), Phase::Finished);
        assert!(session.content().is_none());
    }

    #[test]
    fn test_missing_algorithm_stalls() {
        let mut data = sample_data(2);
        data.algorithms.clear();
        let session = started(data);
        assert_eq!(session.phase(), Phase::Started);
        assert!(session.is_stalled());
        let session = submit_and_grade(session, Rating::Good);
        assert!(session.upload().is_empty());
    }

    #[test]
    fn test_misconfigured_algorithm_stalls() {
        let mut data = sample_data(1);
        data.algorithms[0].algorithm.weights = "1, 2".to_string();
        assert!(started(data).is_stalled());
    }

    #[test]
    fn test_missing_template_stalls() {
        let mut data = sample_data(1);
        data.templates.clear();
        assert!(started(data).is_stalled());
    }

    #[test]
    fn test_termination() {
        let session = started(sample_data(2)).reduce(Event::SessionClosed { confirmed: false });
        assert!(session.is_open());
        assert!(session.is_termination_requested());

        // Submitting and grading wait while the learner decides.
        let session = submit_and_grade(session, Rating::Good);
        assert!(session.upload().is_empty());
        assert!(session.grades().is_none());
        assert!(!session.content().unwrap().form.is_submitted);

        let session = session.reduce(Event::TerminationRequested(false));
        assert!(!session.is_termination_requested());
        let session = session
            .reduce(Event::TerminationRequested(true))
            .reduce(Event::SessionClosed { confirmed: true });
        assert!(!session.is_open());
        assert_eq!(session.id(), 1);
        assert!(session.cards().is_empty());
        assert!(session.upload().is_empty());
    }

    #[test]
    fn test_close_in_init_needs_no_confirmation() {
        let session = open(LessonType::Total).reduce(Event::SessionClosed { confirmed: false });
        assert!(!session.is_open());
        assert!(!session.is_termination_requested());
    }

    #[test]
    fn test_termination_outside_study_is_ignored() {
        let session = open(LessonType::Total).reduce(Event::TerminationRequested(true));
        assert!(!session.is_termination_requested());
    }

    #[test]
    fn test_reopen_starts_fresh() {
        let session = submit_and_grade(started(sample_data(2)), Rating::Again)
            .reduce(Event::SessionClosed { confirmed: true })
            .reduce(Event::OpenSession {
                lesson_type: LessonType::Review,
                deck_id: Some(1),
            });
        assert_eq!(session.id(), 2);
        assert_eq!(session.filter(), Some(DeckFilter::Deck(1)));
        assert_eq!(session.amounts(), None);
        assert!(session.cards().is_empty());
        assert!(session.upload().is_empty());
        assert!(session.upload().log().is_empty());
    }

    #[test]
    fn test_upload_results() {
        let session = submit_and_grade(started(sample_data(2)), Rating::Good);
        let id = session.id();
        let stale = session.reduce(Event::UploadResult(UploadReport {
            session: id - 1,
            index: 0,
            status: UploadStatus::Success,
        }));
        assert_eq!(stale.upload().len(), 1);
        assert!(stale.upload().log().is_empty());

        let session = stale.reduce(Event::UploadResult(UploadReport {
            session: id,
            index: 0,
            status: UploadStatus::Error,
        }));
        assert!(session.upload().is_empty());
        assert_eq!(session.upload().status(0), Some(UploadStatus::Error));
    }
}
