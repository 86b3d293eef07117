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

use std::fmt::Display;
use std::fmt::Formatter;
use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;

use crate::cmd::open_database;
use crate::error::Fallible;
use crate::store::Consumption;
use crate::store::DeckCounts;
use crate::store::DeckFilter;
use crate::store::Store;
use crate::types::counts::Counts;
use crate::types::timestamp::Timestamp;

#[derive(ValueEnum, Clone, Copy)]
pub enum LessonsFormat {
    /// A table.
    Text,
    /// JSON output.
    Json,
}

impl Display for LessonsFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LessonsFormat::Text => write!(f, "text"),
            LessonsFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Serialize)]
struct CountsRow {
    deck_id: Option<i64>,
    title: String,
    untouched: u32,
    learn: u32,
    review: u32,
    total: u32,
}

impl CountsRow {
    fn new(deck_id: Option<i64>, title: &str, counts: &Counts) -> Self {
        Self {
            deck_id,
            title: title.to_string(),
            untouched: counts.untouched,
            learn: counts.learn,
            review: counts.review,
            total: counts.total,
        }
    }
}

#[derive(Serialize)]
struct Overview {
    lessons: Vec<CountsRow>,
    limits: CountsRow,
    consumed: CountsRow,
    over_limit: Vec<&'static str>,
}

pub fn print_lessons(db_path: &Path, format: LessonsFormat) -> Fallible<()> {
    let db = open_database(db_path)?;
    let now = Timestamp::now();
    let lessons = db.available_counts(DeckFilter::All, now)?;
    let consumption = db.today_consumption(now)?;
    let output = match format {
        LessonsFormat::Text => render_text(&lessons, &consumption),
        LessonsFormat::Json => serde_json::to_string_pretty(&overview(&lessons, &consumption))?,
    };
    println!("{output}");
    Ok(())
}

fn overview(lessons: &[DeckCounts], consumption: &Consumption) -> Overview {
    Overview {
        lessons: lessons
            .iter()
            .map(|deck| CountsRow::new(deck.deck_id, &deck.title, &deck.counts))
            .collect(),
        limits: CountsRow::new(None, "limits", &consumption.daily_limits.as_counts()),
        consumed: CountsRow::new(None, "consumed", &consumption.consumed),
        over_limit: over_limit_names(consumption),
    }
}

fn over_limit_names(consumption: &Consumption) -> Vec<&'static str> {
    let over = consumption.over_limit();
    [
        ("untouched", over.untouched),
        ("learn", over.learn),
        ("review", over.review),
        ("total", over.total),
    ]
    .into_iter()
    .filter_map(|(name, flag)| flag.then_some(name))
    .collect()
}

fn render_text(lessons: &[DeckCounts], consumption: &Consumption) -> String {
    let width = lessons
        .iter()
        .map(|deck| deck.title.chars().count())
        .max()
        .unwrap_or(0)
        .max("Deck".len());
    let mut lines = vec![format!(
        "{:<width$}  {:>9}  {:>5}  {:>6}  {:>5}",
        "Deck", "Untouched", "Learn", "Review", "Total"
    )];
    for deck in lessons {
        let c = &deck.counts;
        lines.push(format!(
            "{:<width$}  {:>9}  {:>5}  {:>6}  {:>5}",
            deck.title, c.untouched, c.learn, c.review, c.total
        ));
    }
    let limit = |value: u32| {
        if value == 0 {
            "unlimited".to_string()
        } else {
            value.to_string()
        }
    };
    let limits = &consumption.daily_limits;
    let consumed = &consumption.consumed;
    lines.push(String::new());
    lines.push(format!(
        "Today: {} untouched (limit {}), {} learn (limit {}), {} review (limit {}), {} total (limit {}).",
        consumed.untouched,
        limit(limits.untouched),
        consumed.learn,
        limit(limits.learn),
        consumed.review,
        limit(limits.review),
        consumed.total,
        limit(limits.total),
    ));
    let over = over_limit_names(consumption);
    if !over.is_empty() {
        lines.push(format!("Over the limit: {}.", over.join(", ")));
    }
    lines.join("\n")
}
