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

use crate::cmd::open_database;
use crate::db::Database;
use crate::error::Fallible;
use crate::error::fail;
use crate::types::card::CardContent;
use crate::types::card::DeckId;
use crate::types::timestamp::Timestamp;

pub fn import_file(db_path: &Path, deck_id: DeckId, file: &Path) -> Fallible<()> {
    let db = open_database(db_path)?;
    let text = std::fs::read_to_string(file)?;
    let count = import_cards(&db, deck_id, &text, Timestamp::now())?;
    println!("Imported {count} cards.");
    Ok(())
}

/// Add one card per line of `text`. Columns are tab-separated and fill the
/// deck template's fields in order. Blank lines and lines starting with `#`
/// are skipped.
pub fn import_cards(db: &Database, deck_id: DeckId, text: &str, now: Timestamp) -> Fallible<usize> {
    let Some(deck) = db.deck(deck_id)? else {
        return fail(format!("No deck with id {deck_id}."));
    };
    let Some(template) = db.templates()?.into_iter().find(|t| t.id == deck.template_id) else {
        return fail(format!("No template with id {}.", deck.template_id));
    };
    let fields = &template.content.fields;
    let mut count = 0;
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() > fields.len() {
            return fail(format!(
                "line {}: {} columns, but the template has {} fields.",
                number + 1,
                columns.len(),
                fields.len()
            ));
        }
        let content: CardContent = fields
            .iter()
            .zip(columns)
            .map(|(field, value)| (field.id, value.trim().to_string()))
            .collect();
        match db.add_card(deck_id, &content, now) {
            Ok(_) => count += 1,
            Err(e) => return fail(format!("line {}: {}", number + 1, e.message())),
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningSettings;
    use crate::helper::create_tmp_database;
    use crate::helper::seed_deck;

    #[test]
    fn test_import_cards() -> Fallible<()> {
        let (_dir, db) = create_tmp_database(LearningSettings::default())?;
        let deck_id = seed_deck(&db, "Spanish", 0, Timestamp::now())?;
        let text = "# front\tback\nla casa\tthe house\n\nel perro\tthe dog\n";
        assert_eq!(import_cards(&db, deck_id, text, Timestamp::now())?, 2);
        let cards = db.cards()?;
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].field(1), Some("la casa"));
        assert_eq!(cards[1].field(2), Some("the dog"));
        Ok(())
    }

    #[test]
    fn test_import_rejects_bad_lines() -> Fallible<()> {
        let (_dir, db) = create_tmp_database(LearningSettings::default())?;
        let deck_id = seed_deck(&db, "Spanish", 0, Timestamp::now())?;
        assert!(import_cards(&db, deck_id, "a\tb\tc\n", Timestamp::now()).is_err());
        // The back is required.
        assert!(import_cards(&db, deck_id, "only a front\n", Timestamp::now()).is_err());
        assert!(import_cards(&db, deck_id + 1, "a\tb\n", Timestamp::now()).is_err());
        Ok(())
    }
}
