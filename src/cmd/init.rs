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

use std::path::Path;

use crate::cmd::create_database;
use crate::config::LearningSettings;
use crate::db::Database;
use crate::error::Fallible;
use crate::params::Algorithm;
use crate::types::card::DeckId;
use crate::types::template::TemplateContent;

/// Create the database and settings file if missing, and make sure there is
/// at least one deck to study.
pub fn init(db_path: &Path, deck_title: &str) -> Fallible<()> {
    let settings_path = LearningSettings::path_for(db_path);
    if !settings_path.exists() {
        LearningSettings::default().save(&settings_path)?;
        println!("Wrote {}.", settings_path.display());
    }
    let db = create_database(db_path)?;
    match ensure_deck(&db, deck_title)? {
        (id, true) => println!("Created deck {deck_title:?} with id {id}."),
        (id, false) => println!("Deck {deck_title:?} already exists with id {id}."),
    }
    Ok(())
}

/// The id of the deck titled `title`, creating it with the default algorithm
/// and template if needed. The flag is `true` if the deck was created.
pub fn ensure_deck(db: &Database, title: &str) -> Fallible<(DeckId, bool)> {
    if let Some(deck) = db.decks()?.into_iter().find(|deck| deck.title == title) {
        return Ok((deck.id, false));
    }
    let algorithm_id = match db.algorithms()?.first() {
        Some(record) => record.id,
        None => db.add_algorithm("Default", &Algorithm::default())?,
    };
    let template_id = match db.templates()?.first() {
        Some(template) => template.id,
        None => db.add_template("Basic", &TemplateContent::default())?,
    };
    let id = db.add_deck(title, algorithm_id, template_id)?;
    log::debug!("Created deck {id} with algorithm {algorithm_id} and template {template_id}");
    Ok((id, true))
}
