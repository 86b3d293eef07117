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

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::check::check_database;
use crate::cmd::drill::Overrides;
use crate::cmd::drill::drill;
use crate::cmd::import::import_file;
use crate::cmd::init::init;
use crate::cmd::lessons::LessonsFormat;
use crate::cmd::lessons::print_lessons;
use crate::cmd::reset::reset_card;
use crate::error::Fallible;
use crate::types::card::CardId;
use crate::types::card::DeckId;
use crate::types::counts::LessonType;

const DEFAULT_DB: &str = "koloda.db";

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Create a database with a deck, and a settings file next to it.
    Init {
        /// Title of the first deck.
        #[arg(long, default_value = "Default")]
        deck: String,
        #[arg(long, default_value = DEFAULT_DB)]
        db: PathBuf,
    },
    /// Add cards from a tab-separated file, one card per line.
    Import {
        file: PathBuf,
        #[arg(long)]
        deck: DeckId,
        #[arg(long, default_value = DEFAULT_DB)]
        db: PathBuf,
    },
    /// Show what is available to study today.
    Lessons {
        #[arg(long, default_value = DEFAULT_DB)]
        db: PathBuf,
        #[arg(long, default_value_t = LessonsFormat::Text)]
        format: LessonsFormat,
    },
    /// Study cards.
    Drill {
        /// One of untouched, learn, review or total.
        #[arg(long, default_value = "total")]
        lesson: LessonType,
        /// Only study this deck.
        #[arg(long)]
        deck: Option<DeckId>,
        /// Override the planned number of new cards.
        #[arg(long)]
        untouched: Option<u32>,
        /// Override the planned number of learning cards.
        #[arg(long)]
        learn: Option<u32>,
        /// Override the planned number of review cards.
        #[arg(long)]
        review: Option<u32>,
        #[arg(long, default_value = DEFAULT_DB)]
        db: PathBuf,
    },
    /// Check the database for inconsistencies.
    Check {
        #[arg(long, default_value = DEFAULT_DB)]
        db: PathBuf,
    },
    /// Forget a card's progress and review history.
    Reset {
        card: CardId,
        #[arg(long, default_value = DEFAULT_DB)]
        db: PathBuf,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Init { deck, db } => init(&db, &deck),
        Command::Import { file, deck, db } => import_file(&db, deck, &file),
        Command::Lessons { db, format } => print_lessons(&db, format),
        Command::Drill {
            lesson,
            deck,
            untouched,
            learn,
            review,
            db,
        } => {
            let overrides = Overrides {
                untouched,
                learn,
                review,
            };
            drill(&db, lesson, deck, overrides).await
        }
        Command::Check { db } => check_database(&db),
        Command::Reset { card, db } => reset_card(&db, card),
    }
}
