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

//! Turns a card and a grade into the card's next state.

use crate::error::Fallible;
use crate::fsrs::CardState;
use crate::fsrs::Difficulty;
use crate::fsrs::Rating;
use crate::fsrs::Stability;
use crate::fsrs::apply_fuzz;
use crate::fsrs::fuzz_factor;
use crate::fsrs::initial_difficulty;
use crate::fsrs::initial_stability;
use crate::fsrs::interval;
use crate::fsrs::new_difficulty;
use crate::fsrs::new_stability;
use crate::fsrs::retrievability;
use crate::fsrs::short_term_stability;
use crate::params::Algorithm;
use crate::params::SchedulerParams;
use crate::params::Step;
use crate::params::parse_steps;
use crate::params::to_scheduler_params;
use crate::types::card::Card;
use crate::types::review::Review;
use crate::types::timestamp::Timestamp;

const MINUTES_PER_DAY: f64 = 1440.0;

/// A card after grading, and the log entry that records the grading.
#[derive(Clone, PartialEq, Debug)]
pub struct Outcome {
    pub card: Card,
    pub review: Review,
}

#[derive(Clone, Copy, Debug)]
enum Delay {
    /// A fixed learning step.
    Step { minutes: f64, next_step: u32 },
    /// Graduated: an interval in days derived from stability.
    Days(u32),
}

#[derive(Clone, Copy, Debug)]
struct Plan {
    stability: Stability,
    difficulty: Difficulty,
    /// The state the card is in while it sits on a short step.
    step_state: CardState,
    delay: Delay,
}

#[derive(Clone, Debug)]
pub struct Scheduler {
    params: SchedulerParams,
    learning_steps: Vec<Step>,
    relearning_steps: Vec<Step>,
}

impl Scheduler {
    pub fn new(params: &SchedulerParams) -> Fallible<Self> {
        Ok(Self {
            params: params.clone(),
            learning_steps: parse_steps(&params.learning_steps)?,
            relearning_steps: parse_steps(&params.relearning_steps)?,
        })
    }

    pub fn from_algorithm(algorithm: &Algorithm) -> Fallible<Self> {
        Self::new(&to_scheduler_params(algorithm)?)
    }

    pub fn params(&self) -> &SchedulerParams {
        &self.params
    }

    /// The outcome of grading `card` at `now` with each rating, in the order
    /// of [`Rating::ALL`].
    pub fn grades(&self, card: &Card, now: Timestamp) -> [Outcome; 4] {
        let elapsed = match card.last_reviewed_at {
            Some(last) if !card.is_new() => now.days_since(last),
            _ => 0,
        };
        let seed = format!(
            "{}_{}_{}",
            now.millis(),
            card.reps,
            card.difficulty * card.stability
        );
        let fuzz = fuzz_factor(&seed);
        let mut plans = Rating::ALL.map(|rating| self.plan(card, elapsed, rating, fuzz));
        self.order_intervals(&mut plans);
        let outcomes = Rating::ALL.map(|rating| {
            let plan = plans[rating.index()];
            self.outcome(card, now, elapsed, rating, plan)
        });
        for outcome in &outcomes {
            log::debug!(
                "Card {}: {} -> {:?}, {} days",
                card.id,
                outcome.review.rating.as_str(),
                outcome.card.state,
                outcome.card.scheduled_days
            );
        }
        outcomes
    }

    pub fn grade(&self, card: &Card, now: Timestamp, rating: Rating) -> Outcome {
        let [again, hard, good, easy] = self.grades(card, now);
        match rating {
            Rating::Again => again,
            Rating::Hard => hard,
            Rating::Good => good,
            Rating::Easy => easy,
        }
    }

    fn plan(&self, card: &Card, elapsed: u32, rating: Rating, fuzz: f64) -> Plan {
        let w = &self.params.w;
        // A card with no usable memory state is scheduled as if it were new.
        let unseeded = card.is_new() || card.stability <= 0.0;
        let (stability, difficulty) = if unseeded {
            (initial_stability(w, rating), initial_difficulty(w, rating))
        } else {
            match card.state {
                CardState::Review => {
                    let r = retrievability(w, f64::from(elapsed), card.stability);
                    (
                        new_stability(w, card.difficulty, card.stability, r, rating),
                        new_difficulty(w, card.difficulty, rating),
                    )
                }
                _ => (
                    short_term_stability(w, card.stability, rating),
                    new_difficulty(w, card.difficulty, rating),
                ),
            }
        };
        let (steps, cur_step, step_state, from_review) = match card.state {
            CardState::New => (&self.learning_steps, 0, CardState::Learning, false),
            CardState::Learning => (
                &self.learning_steps,
                card.learning_steps,
                CardState::Learning,
                false,
            ),
            CardState::Relearning => (
                &self.relearning_steps,
                card.learning_steps,
                CardState::Relearning,
                false,
            ),
            CardState::Review => (&self.relearning_steps, 0, CardState::Relearning, true),
        };
        let delay = match step_delay(steps, cur_step, rating, from_review) {
            Some((minutes, next_step)) => Delay::Step { minutes, next_step },
            None => Delay::Days(self.next_interval(stability, elapsed, fuzz)),
        };
        Plan {
            stability,
            difficulty,
            step_state,
            delay,
        }
    }

    fn next_interval(&self, s: Stability, elapsed: u32, fuzz: f64) -> u32 {
        let maximum = self.params.maximum_interval.max(1);
        let ivl = interval(&self.params.w, self.params.request_retention, s)
            .round()
            .clamp(1.0, f64::from(maximum)) as u32;
        if self.params.enable_fuzz {
            apply_fuzz(ivl, elapsed, maximum, fuzz)
        } else {
            ivl
        }
    }

    /// Graduating intervals must satisfy hard <= good < easy.
    fn order_intervals(&self, plans: &mut [Plan; 4]) {
        let maximum = self.params.maximum_interval.max(1);
        let (hard, good, easy) = (Rating::Hard.index(), Rating::Good.index(), Rating::Easy.index());
        if let (Delay::Days(h), Delay::Days(g)) = (plans[hard].delay, plans[good].delay) {
            let h = h.min(g);
            plans[hard].delay = Delay::Days(h);
            plans[good].delay = Delay::Days(g.max(h + 1).min(maximum));
        }
        if let (Delay::Days(g), Delay::Days(e)) = (plans[good].delay, plans[easy].delay) {
            plans[easy].delay = Delay::Days(e.max(g + 1).min(maximum));
        }
    }

    fn outcome(&self, card: &Card, now: Timestamp, elapsed: u32, rating: Rating, plan: Plan) -> Outcome {
        let mut next = card.clone();
        next.stability = plan.stability;
        next.difficulty = plan.difficulty;
        match plan.delay {
            Delay::Step { minutes, next_step } => {
                next.learning_steps = next_step;
                if minutes < MINUTES_PER_DAY {
                    next.state = plan.step_state;
                    next.scheduled_days = 0;
                } else {
                    next.state = CardState::Review;
                    next.scheduled_days = (minutes / MINUTES_PER_DAY).floor() as u32;
                }
                next.due_at = Some(now.plus_minutes(minutes));
            }
            Delay::Days(days) => {
                next.state = CardState::Review;
                next.learning_steps = 0;
                next.scheduled_days = days;
                next.due_at = Some(now.plus_days(days));
            }
        }
        if card.state == CardState::Review && rating == Rating::Again {
            next.lapses += 1;
        }
        next.reps += 1;
        next.last_reviewed_at = Some(now);
        let review = Review {
            card_id: card.id,
            state: card.state,
            rating,
            due_at: next.due_at.unwrap_or(now),
            stability: next.stability,
            difficulty: next.difficulty,
            scheduled_days: next.scheduled_days,
            learning_steps: next.learning_steps,
            time: elapsed,
            is_ignored: false,
            reviewed_at: now,
        };
        Outcome { card: next, review }
    }
}

/// The fixed delay, in minutes, and the step index a rating leads to, or
/// `None` if the card graduates.
fn step_delay(steps: &[Step], cur_step: u32, rating: Rating, from_review: bool) -> Option<(f64, u32)> {
    let cur = cur_step as usize;
    if cur >= steps.len() {
        return None;
    }
    let first = steps[0].minutes();
    let delay = match rating {
        Rating::Again => Some((first, 0)),
        _ if from_review => None,
        Rating::Hard => {
            let minutes = match steps.get(1) {
                Some(second) => ((first + second.minutes()) / 2.0).round(),
                None => (first * 1.5).round(),
            };
            Some((minutes, cur_step))
        }
        Rating::Good => steps
            .get(cur + 1)
            .map(|next| (next.minutes(), cur_step + 1)),
        Rating::Easy => None,
    };
    delay.filter(|(minutes, _)| *minutes > 0.0)
}
