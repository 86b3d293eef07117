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
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::Params;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::config::DbConfig;

use crate::config::LearningSettings;
use crate::error::Fallible;
use crate::error::fail;
use crate::fsrs::CardState;
use crate::params::Algorithm;
use crate::store::AlgorithmRecord;
use crate::store::Consumption;
use crate::store::DeckCounts;
use crate::store::DeckFilter;
use crate::store::SessionData;
use crate::store::SessionResult;
use crate::store::Store;
use crate::types::card::AlgorithmId;
use crate::types::card::Card;
use crate::types::card::CardContent;
use crate::types::card::CardId;
use crate::types::card::DeckId;
use crate::types::card::TemplateId;
use crate::types::counts::Amounts;
use crate::types::counts::Counts;
use crate::types::deck::Deck;
use crate::types::review::Review;
use crate::types::template::Template;
use crate::types::template::TemplateContent;
use crate::types::timestamp::Timestamp;

const CARD_COLUMNS: &str = "card_id, deck_id, template_id, content, state, stability, difficulty, scheduled_days, learning_steps, reps, lapses, due_at, last_reviewed_at";

const ALL_DECKS_TITLE: &str = "All decks";

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    settings: LearningSettings,
}

impl Database {
    pub fn new(database_path: &str, settings: LearningSettings) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                log::debug!("Creating schema in {database_path}");
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { conn, settings })
    }

    pub fn settings(&self) -> &LearningSettings {
        &self.settings
    }

    pub fn add_algorithm(&self, title: &str, algorithm: &Algorithm) -> Fallible<AlgorithmId> {
        algorithm.validate()?;
        let content = serde_json::to_string(algorithm)?;
        let conn = self.acquire()?;
        let sql = "insert into algorithms (title, content, created_at) values (?, ?, ?) returning algorithm_id;";
        let id = conn.query_row(sql, (title, content, Timestamp::now()), |row| row.get(0))?;
        Ok(id)
    }

    pub fn add_template(&self, title: &str, content: &TemplateContent) -> Fallible<TemplateId> {
        if content.fields.is_empty() {
            return fail("A template needs at least one field.");
        }
        for item in &content.layout {
            if !content.fields.iter().any(|field| field.id == item.field) {
                return fail(format!("Layout refers to unknown field {}.", item.field));
            }
        }
        let content = serde_json::to_string(content)?;
        let conn = self.acquire()?;
        let sql = "insert into templates (title, content, created_at) values (?, ?, ?) returning template_id;";
        let id = conn.query_row(sql, (title, content, Timestamp::now()), |row| row.get(0))?;
        Ok(id)
    }

    pub fn add_deck(
        &self,
        title: &str,
        algorithm_id: AlgorithmId,
        template_id: TemplateId,
    ) -> Fallible<DeckId> {
        let conn = self.acquire()?;
        let sql = "insert into decks (title, algorithm_id, template_id, created_at) values (?, ?, ?, ?) returning deck_id;";
        let id = conn.query_row(
            sql,
            (title, algorithm_id, template_id, Timestamp::now()),
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Add a new card to a deck, using the deck's template.
    pub fn add_card(&self, deck_id: DeckId, content: &CardContent, now: Timestamp) -> Fallible<CardId> {
        let Some(deck) = self.deck(deck_id)? else {
            return fail(format!("No deck with id {deck_id}."));
        };
        let Some(template) = self.templates()?.into_iter().find(|t| t.id == deck.template_id) else {
            return fail(format!("No template with id {}.", deck.template_id));
        };
        for field in &template.content.fields {
            let filled = content.get(&field.id).is_some_and(|value| !value.trim().is_empty());
            if field.is_required && !filled {
                return fail(format!("Field {:?} is required.", field.title));
            }
        }
        let card = Card::new(0, deck_id, template.id, content.clone());
        let mut conn = self.acquire()?;
        let tx = conn.transaction()?;
        let id = insert_card(&tx, &card, now)?;
        tx.commit()?;
        log::debug!("Added card {id} to deck {deck_id}");
        Ok(id)
    }

    /// Put a card back into the new state and forget its reviews.
    pub fn reset_card_progress(&self, card_id: CardId) -> Fallible<()> {
        let Some(mut card) = self.card(card_id)? else {
            return fail(format!("No card with id {card_id}."));
        };
        card.reset_progress();
        let mut conn = self.acquire()?;
        let tx = conn.transaction()?;
        tx.execute("delete from reviews where card_id = ?;", [card_id])?;
        update_card(&tx, &card)?;
        tx.commit()?;
        Ok(())
    }

    pub fn deck(&self, deck_id: DeckId) -> Fallible<Option<Deck>> {
        Ok(self.decks()?.into_iter().find(|deck| deck.id == deck_id))
    }

    pub fn decks(&self) -> Fallible<Vec<Deck>> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare("select deck_id, title, algorithm_id, template_id from decks order by deck_id;")?;
        let mut rows = stmt.query([])?;
        let mut decks = Vec::new();
        while let Some(row) = rows.next()? {
            decks.push(Deck {
                id: row.get(0)?,
                title: row.get(1)?,
                algorithm_id: row.get(2)?,
                template_id: row.get(3)?,
            });
        }
        Ok(decks)
    }

    pub fn templates(&self) -> Fallible<Vec<Template>> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare("select template_id, title, content from templates order by template_id;")?;
        let mut rows = stmt.query([])?;
        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            let content: String = row.get(2)?;
            templates.push(Template {
                id: row.get(0)?,
                title: row.get(1)?,
                content: serde_json::from_str(&content)?,
            });
        }
        Ok(templates)
    }

    pub fn algorithms(&self) -> Fallible<Vec<AlgorithmRecord>> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare("select algorithm_id, title, content from algorithms order by algorithm_id;")?;
        let mut rows = stmt.query([])?;
        let mut algorithms = Vec::new();
        while let Some(row) = rows.next()? {
            let content: String = row.get(2)?;
            algorithms.push(AlgorithmRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                algorithm: serde_json::from_str(&content)?,
            });
        }
        Ok(algorithms)
    }

    pub fn card(&self, card_id: CardId) -> Fallible<Option<Card>> {
        let conn = self.acquire()?;
        let sql = format!("select {CARD_COLUMNS} from cards where card_id = ?;");
        let mut cards = query_cards(&conn, &sql, [card_id])?;
        Ok(cards.pop())
    }

    pub fn cards(&self) -> Fallible<Vec<Card>> {
        let conn = self.acquire()?;
        let sql = format!("select {CARD_COLUMNS} from cards order by card_id;");
        query_cards(&conn, &sql, [])
    }

    /// A card's reviews, oldest first.
    pub fn reviews(&self, card_id: CardId) -> Fallible<Vec<Review>> {
        let conn = self.acquire()?;
        let sql = "select card_id, state, rating, due_at, stability, difficulty, scheduled_days, learning_steps, time, is_ignored, reviewed_at from reviews where card_id = ? order by review_id;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([card_id])?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next()? {
            reviews.push(Review {
                card_id: row.get(0)?,
                state: row.get(1)?,
                rating: row.get(2)?,
                due_at: row.get(3)?,
                stability: row.get(4)?,
                difficulty: row.get(5)?,
                scheduled_days: row.get(6)?,
                learning_steps: row.get(7)?,
                time: row.get(8)?,
                is_ignored: row.get(9)?,
                reviewed_at: row.get(10)?,
            });
        }
        Ok(reviews)
    }

    /// Find stored data the scheduler could not work with.
    pub fn check(&self) -> Fallible<Vec<String>> {
        let mut problems = Vec::new();
        for record in self.algorithms()? {
            if let Err(e) = record.algorithm.validate() {
                problems.push(format!("Algorithm {:?}: {}", record.title, e.message()));
            }
        }
        let templates: BTreeSet<TemplateId> = self.templates()?.iter().map(|t| t.id).collect();
        for card in self.cards()? {
            let new = card.state == CardState::New;
            if new != card.due_at.is_none() || new != (card.reps == 0) {
                problems.push(format!(
                    "Card {}: state {:?} does not match its due date and repetitions.",
                    card.id, card.state
                ));
            }
            if !templates.contains(&card.template_id) {
                problems.push(format!("Card {}: unknown template {}.", card.id, card.template_id));
            }
        }
        Ok(problems)
    }

    fn acquire(&self) -> Fallible<MutexGuard<'_, Connection>> {
        match self.conn.lock() {
            Ok(conn) => Ok(conn),
            Err(_) => fail("database connection is poisoned"),
        }
    }
}

impl Store for Database {
    fn available_counts(&self, filter: DeckFilter, now: Timestamp) -> Fallible<Vec<DeckCounts>> {
        let conn = self.acquire()?;
        let sql = "
            select d.deck_id, d.title,
                coalesce(sum(case when c.state = 0 then 1 else 0 end), 0),
                coalesce(sum(case when c.state in (1, 3) and c.due_at <= ?2 then 1 else 0 end), 0),
                coalesce(sum(case when c.state = 2 and c.due_at <= ?2 then 1 else 0 end), 0)
            from decks d
            left outer join cards c on c.deck_id = d.deck_id
            where (?1 is null or d.deck_id = ?1)
            group by d.deck_id, d.title
            order by d.deck_id;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query((filter.deck_id(), now))?;
        let mut aggregate = Counts::default();
        let mut decks = Vec::new();
        while let Some(row) = rows.next()? {
            let counts = Counts::new(row.get(2)?, row.get(3)?, row.get(4)?);
            aggregate = aggregate.sum(&counts);
            decks.push(DeckCounts {
                deck_id: Some(row.get(0)?),
                title: row.get(1)?,
                counts,
            });
        }
        let title = match filter {
            DeckFilter::All => ALL_DECKS_TITLE.to_string(),
            DeckFilter::Deck(_) => decks
                .first()
                .map(|deck| deck.title.clone())
                .unwrap_or_default(),
        };
        let mut result = vec![DeckCounts {
            deck_id: None,
            title,
            counts: aggregate,
        }];
        result.extend(decks);
        Ok(result)
    }

    fn today_consumption(&self, now: Timestamp) -> Fallible<Consumption> {
        let (from, to) = self.settings.learning_day_range(now)?;
        let conn = self.acquire()?;
        let sql = "
            select
                coalesce(sum(case when state = 0 then 1 else 0 end), 0),
                coalesce(sum(case when state in (1, 3) then 1 else 0 end), 0),
                coalesce(sum(case when state = 2 then 1 else 0 end), 0)
            from reviews
            where is_ignored = 0 and reviewed_at >= ?1 and reviewed_at < ?2;";
        let consumed = conn.query_row(sql, (from, to), |row| {
            Ok(Counts::new(row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        Ok(Consumption {
            daily_limits: self.settings.daily_limits,
            consumed,
        })
    }

    fn session_cards(&self, filter: DeckFilter, amounts: &Amounts, now: Timestamp) -> Fallible<SessionData> {
        let deck_id = filter.deck_id();
        let mut cards = {
            let conn = self.acquire()?;
            let untouched = format!(
                "select {CARD_COLUMNS} from cards where state = 0 and (?1 is null or deck_id = ?1) order by created_at, card_id limit ?2;"
            );
            let learn = format!(
                "select {CARD_COLUMNS} from cards where state in (1, 3) and due_at <= ?2 and (?1 is null or deck_id = ?1) order by due_at, card_id limit ?3;"
            );
            let review = format!(
                "select {CARD_COLUMNS} from cards where state = 2 and due_at <= ?2 and (?1 is null or deck_id = ?1) order by due_at, card_id limit ?3;"
            );
            let mut cards = query_cards(&conn, &untouched, (deck_id, amounts.untouched))?;
            cards.extend(query_cards(&conn, &learn, (deck_id, now, amounts.learn))?);
            cards.extend(query_cards(&conn, &review, (deck_id, now, amounts.review))?);
            cards
        };
        cards.truncate(amounts.total as usize);
        let deck_ids: BTreeSet<DeckId> = cards.iter().map(|card| card.deck_id).collect();
        let decks: Vec<Deck> = self
            .decks()?
            .into_iter()
            .filter(|deck| deck_ids.contains(&deck.id))
            .collect();
        let template_ids: BTreeSet<TemplateId> = cards
            .iter()
            .map(|card| card.template_id)
            .chain(decks.iter().map(|deck| deck.template_id))
            .collect();
        let algorithm_ids: BTreeSet<AlgorithmId> = decks.iter().map(|deck| deck.algorithm_id).collect();
        let templates = self
            .templates()?
            .into_iter()
            .filter(|template| template_ids.contains(&template.id))
            .collect();
        let algorithms = self
            .algorithms()?
            .into_iter()
            .filter(|record| algorithm_ids.contains(&record.id))
            .collect();
        log::debug!("Fetched {} cards for {amounts:?}", cards.len());
        Ok(SessionData {
            cards,
            decks,
            templates,
            algorithms,
        })
    }

    fn persist_result(&self, result: &SessionResult) -> Fallible<()> {
        if result.card.id != result.review.card_id {
            return fail(format!(
                "Review for card {} does not belong to card {}.",
                result.review.card_id, result.card.id
            ));
        }
        let mut conn = self.acquire()?;
        let tx = conn.transaction()?;
        update_card(&tx, &result.card)?;
        insert_review(&tx, &result.review)?;
        tx.commit()?;
        Ok(())
    }
}

fn read_card(row: &Row) -> Fallible<Card> {
    let content: String = row.get(3)?;
    Ok(Card {
        id: row.get(0)?,
        deck_id: row.get(1)?,
        template_id: row.get(2)?,
        content: serde_json::from_str(&content)?,
        state: row.get(4)?,
        stability: row.get(5)?,
        difficulty: row.get(6)?,
        scheduled_days: row.get(7)?,
        learning_steps: row.get(8)?,
        reps: row.get(9)?,
        lapses: row.get(10)?,
        due_at: row.get(11)?,
        last_reviewed_at: row.get(12)?,
    })
}

fn query_cards<P: Params>(conn: &Connection, sql: &str, params: P) -> Fallible<Vec<Card>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut cards = Vec::new();
    while let Some(row) = rows.next()? {
        cards.push(read_card(row)?);
    }
    Ok(cards)
}

fn insert_card(tx: &Transaction, card: &Card, now: Timestamp) -> Fallible<CardId> {
    let sql = "insert into cards (deck_id, template_id, content, state, stability, difficulty, scheduled_days, learning_steps, reps, lapses, due_at, last_reviewed_at, created_at) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) returning card_id;";
    let id: CardId = tx.query_row(
        sql,
        (
            card.deck_id,
            card.template_id,
            serde_json::to_string(&card.content)?,
            card.state,
            card.stability,
            card.difficulty,
            card.scheduled_days,
            card.learning_steps,
            card.reps,
            card.lapses,
            card.due_at,
            card.last_reviewed_at,
            now,
        ),
        |row| row.get(0),
    )?;
    Ok(id)
}

fn update_card(tx: &Transaction, card: &Card) -> Fallible<()> {
    let sql = "update cards set state = ?, stability = ?, difficulty = ?, scheduled_days = ?, learning_steps = ?, reps = ?, lapses = ?, due_at = ?, last_reviewed_at = ? where card_id = ?;";
    let changed = tx.execute(
        sql,
        (
            card.state,
            card.stability,
            card.difficulty,
            card.scheduled_days,
            card.learning_steps,
            card.reps,
            card.lapses,
            card.due_at,
            card.last_reviewed_at,
            card.id,
        ),
    )?;
    if changed != 1 {
        return fail(format!("No card with id {}.", card.id));
    }
    Ok(())
}

fn insert_review(tx: &Transaction, review: &Review) -> Fallible<()> {
    let sql = "insert into reviews (card_id, state, rating, due_at, stability, difficulty, scheduled_days, learning_steps, time, is_ignored, reviewed_at) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);";
    tx.execute(
        sql,
        (
            review.card_id,
            review.state,
            review.rating,
            review.due_at,
            review.stability,
            review.difficulty,
            review.scheduled_days,
            review.learning_steps,
            review.time,
            review.is_ignored,
            review.reviewed_at,
        ),
    )?;
    Ok(())
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["cards"], |row| row.get(0))?;
    Ok(count > 0)
}
