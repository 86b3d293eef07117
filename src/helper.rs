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

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread::sleep;
use std::time::Duration;

use tempfile::TempDir;
use tempfile::tempdir;

use crate::config::LearningSettings;
use crate::db::Database;
use crate::error::Fallible;
use crate::error::fail;
use crate::params::Algorithm;
use crate::store::AlgorithmRecord;
use crate::store::Consumption;
use crate::store::DeckCounts;
use crate::store::DeckFilter;
use crate::store::SessionData;
use crate::store::SessionResult;
use crate::store::Store;
use crate::types::card::Card;
use crate::types::card::CardContent;
use crate::types::card::CardId;
use crate::types::card::DeckId;
use crate::types::counts::Amounts;
use crate::types::counts::Category;
use crate::types::counts::Counts;
use crate::types::deck::Deck;
use crate::types::template::Template;
use crate::types::template::TemplateContent;
use crate::types::timestamp::Timestamp;

/// A fresh database in a temporary directory. The directory lives as long as
/// the returned guard.
pub fn create_tmp_database(settings: LearningSettings) -> Fallible<(TempDir, Database)> {
    let dir = tempdir()?;
    let path = dir.path().join("koloda.db");
    let db = Database::new(&path.display().to_string(), settings)?;
    Ok((dir, db))
}

/// A deck with the default algorithm and template, holding `n` new cards.
pub fn seed_deck(db: &Database, title: &str, n: usize, now: Timestamp) -> Fallible<DeckId> {
    let algorithm_id = db.add_algorithm("Default", &Algorithm::default())?;
    let template_id = db.add_template("Basic", &TemplateContent::default())?;
    let deck_id = db.add_deck(title, algorithm_id, template_id)?;
    for i in 0..n {
        db.add_card(deck_id, &card_content(i), now)?;
    }
    Ok(deck_id)
}

pub fn card_content(i: usize) -> CardContent {
    CardContent::from([(1, format!("front {i}")), (2, format!("back {i}"))])
}

/// One deck of `n` new cards with the default algorithm and template.
pub fn sample_data(n: usize) -> SessionData {
    let cards = (0..n)
        .map(|i| Card::new(i as CardId + 1, 1, 1, card_content(i)))
        .collect();
    SessionData {
        cards,
        decks: vec![Deck {
            id: 1,
            title: "Deck".to_string(),
            algorithm_id: 1,
            template_id: 1,
        }],
        templates: vec![Template {
            id: 1,
            title: "Basic".to_string(),
            content: TemplateContent::default(),
        }],
        algorithms: vec![AlgorithmRecord {
            id: 1,
            title: "Default".to_string(),
            algorithm: Algorithm::default(),
        }],
    }
}

/// An in-memory store that records what was persisted and how many
/// persistence calls ran at once.
pub struct MemoryStore {
    data: SessionData,
    consumption: Consumption,
    persisted: Mutex<Vec<SessionResult>>,
    failing: BTreeSet<CardId>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new(data: SessionData, consumption: Consumption) -> Self {
        Self {
            data,
            consumption,
            persisted: Mutex::new(Vec::new()),
            failing: BTreeSet::new(),
            delay: Duration::from_millis(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Persisting these cards fails.
    pub fn failing(mut self, cards: &[CardId]) -> Self {
        self.failing = cards.iter().copied().collect();
        self
    }

    /// Each persistence call takes at least this long.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn persisted(&self) -> Vec<SessionResult> {
        match self.persisted.lock() {
            Ok(persisted) => persisted.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn counts(&self, filter: DeckFilter) -> Counts {
        let mut counts = Counts::default();
        for card in &self.data.cards {
            if filter.matches(card.deck_id) {
                counts.increment(Category::of(card.state));
            }
        }
        counts
    }
}

impl Store for MemoryStore {
    fn available_counts(&self, filter: DeckFilter, _now: Timestamp) -> Fallible<Vec<DeckCounts>> {
        Ok(vec![DeckCounts {
            deck_id: None,
            title: "All decks".to_string(),
            counts: self.counts(filter),
        }])
    }

    fn today_consumption(&self, _now: Timestamp) -> Fallible<Consumption> {
        Ok(self.consumption)
    }

    fn session_cards(&self, filter: DeckFilter, amounts: &Amounts, _now: Timestamp) -> Fallible<SessionData> {
        let mut taken = Counts::default();
        let mut cards = Vec::new();
        for card in &self.data.cards {
            let category = Category::of(card.state);
            if filter.matches(card.deck_id) && taken.category(category) < amounts.category(category) {
                taken.increment(category);
                cards.push(card.clone());
            }
        }
        Ok(SessionData {
            cards,
            ..self.data.clone()
        })
    }

    fn persist_result(&self, result: &SessionResult) -> Fallible<()> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        sleep(self.delay);
        let outcome = if self.failing.contains(&result.card.id) {
            fail(format!("cannot store card {}", result.card.id))
        } else {
            match self.persisted.lock() {
                Ok(mut persisted) => {
                    persisted.push(result.clone());
                    Ok(())
                }
                Err(_) => fail("store is poisoned"),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
