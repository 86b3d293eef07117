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

//! A terminal host for study sessions.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::io::Stdin;

use crate::cmd::open_database;
use crate::error::Fallible;
use crate::fsrs::Rating;
use crate::runner::SessionRunner;
use crate::session::Content;
use crate::session::Phase;
use crate::session::answer::compare;
use crate::session::event::Event;
use crate::types::card::DeckId;
use crate::types::card::FieldId;
use crate::types::counts::Category;
use crate::types::counts::Counts;
use crate::types::counts::LessonType;
use crate::types::template::Operation;
use crate::types::timestamp::Timestamp;

/// Amounts the learner asked for on the command line, replacing the
/// allocator's plan.
#[derive(Clone, Copy, Default, Debug)]
pub struct Overrides {
    pub untouched: Option<u32>,
    pub learn: Option<u32>,
    pub review: Option<u32>,
}

impl Overrides {
    fn events(&self) -> Vec<Event> {
        [
            (Category::Untouched, self.untouched),
            (Category::Learn, self.learn),
            (Category::Review, self.review),
        ]
        .into_iter()
        .filter_map(|(category, value)| value.map(|value| Event::AmountAdjusted { category, value }))
        .collect()
    }
}

enum Flow {
    Continue,
    Quit,
}

struct Terminal {
    lines: Lines<BufReader<Stdin>>,
}

impl Terminal {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `message` and read a line. Upload reports that arrive while
    /// waiting are fed into the session. Returns `None` at end of input.
    async fn prompt(&mut self, runner: &mut SessionRunner, message: &str) -> Fallible<Option<String>> {
        print!("{message}");
        std::io::stdout().flush()?;
        loop {
            tokio::select! {
                line = self.lines.next_line() => return Ok(line?),
                Some(report) = runner.recv_report() => {
                    log::debug!("Upload for card at {} finished: {}", report.index, report.status.as_str());
                }
            }
        }
    }
}

pub async fn drill(
    db_path: &Path,
    lesson_type: LessonType,
    deck_id: Option<DeckId>,
    overrides: Overrides,
) -> Fallible<()> {
    let db = open_database(db_path)?;
    let mut runner = SessionRunner::new(Arc::new(db));
    runner.dispatch(Event::OpenSession {
        lesson_type,
        deck_id,
    })?;
    for event in overrides.events() {
        runner.dispatch(event)?;
    }

    let session = runner.session();
    let available = session.available_counts();
    let amounts = session.amounts().copied().unwrap_or_default();
    println!("Available: {}.", describe(&available));
    println!("Planned:   {}.", describe(&amounts));
    if let Some(consumption) = session.consumption() {
        let over = consumption.over_limit();
        if over.total {
            println!("The daily total limit has been reached.");
        }
        for (category, flag) in [
            (LessonType::Untouched, over.untouched),
            (LessonType::Learn, over.learn),
            (LessonType::Review, over.review),
        ] {
            if flag {
                println!("The daily {category} limit has been reached.");
            }
        }
    }
    if amounts.total == 0 {
        println!("Nothing to study.");
        runner.dispatch(Event::SessionClosed { confirmed: true })?;
        return Ok(());
    }

    runner.dispatch(Event::SessionSubmitted)?;
    let mut terminal = Terminal::new();
    loop {
        runner.poll_uploads();
        let session = runner.session();
        if session.phase() == Phase::Finished {
            break;
        }
        if session.is_stalled() {
            eprintln!("The next card cannot be studied. Run `koloda check` for details.");
            break;
        }
        if session.is_termination_requested() {
            match terminal.prompt(&mut runner, "End the session? [y/N] ").await? {
                Some(answer) if !answer.trim().eq_ignore_ascii_case("y") => {
                    runner.dispatch(Event::TerminationRequested(false))?;
                    continue;
                }
                _ => break,
            }
        }
        match study_card(&mut runner, &mut terminal).await? {
            Flow::Continue => {}
            Flow::Quit => break,
        }
    }

    runner.drain().await;
    let upload = runner.session().upload();
    let failures = upload.failures();
    println!("Studied {} cards.", upload.log().len());
    if failures > 0 {
        eprintln!("{failures} reviews could not be saved.");
    }
    runner.dispatch(Event::SessionClosed { confirmed: true })?;
    Ok(())
}

async fn study_card(runner: &mut SessionRunner, terminal: &mut Terminal) -> Fallible<Flow> {
    let Some(content) = runner.session().content().cloned() else {
        return Ok(Flow::Quit);
    };
    if let Some(progress) = runner.session().progress() {
        println!();
        println!(
            "[{}/{}]",
            progress.done.total + 1,
            progress.done.total + progress.pending.total
        );
    }
    for item in &content.template.content.layout {
        if item.operation == Operation::Display {
            println!("{}: {}", field_title(&content, item.field), field_text(&content, item.field));
        }
    }

    if content.template.requires_input() {
        for item in &content.template.content.layout {
            if item.operation != Operation::Type {
                continue;
            }
            let message = format!("{}? ", field_title(&content, item.field));
            let Some(value) = terminal.prompt(runner, &message).await? else {
                return Ok(Flow::Quit);
            };
            runner.dispatch(Event::AnswerChanged {
                field_id: item.field,
                value,
            })?;
        }
    } else if terminal.prompt(runner, "[enter to reveal] ").await?.is_none() {
        return Ok(Flow::Quit);
    }
    runner.dispatch(Event::CardSubmitted)?;

    let answers = runner
        .session()
        .content()
        .map(|c| c.form.answers.clone())
        .unwrap_or_default();
    for item in &content.template.content.layout {
        let title = field_title(&content, item.field);
        let text = field_text(&content, item.field);
        match item.operation {
            Operation::Display => {}
            Operation::Reveal => println!("{title}: {text}"),
            Operation::Type => {
                let typed = answers.get(&item.field).map(String::as_str).unwrap_or("");
                let mark = if compare(text, typed) { "correct" } else { "incorrect" };
                println!("{title}: {text} ({mark})");
            }
        }
    }

    let now = Timestamp::now();
    let Some(grades) = runner.session().grades() else {
        return Ok(Flow::Quit);
    };
    let menu: Vec<String> = Rating::ALL
        .iter()
        .zip(grades.iter())
        .map(|(rating, outcome)| {
            format!(
                "{} {} ({})",
                rating.value(),
                rating.as_str(),
                format_interval(now, outcome.card.due_at)
            )
        })
        .collect();
    println!("{}", menu.join("  "));

    let rating = loop {
        let Some(line) = terminal.prompt(runner, "Grade (1-4, q to quit): ").await? else {
            return Ok(Flow::Quit);
        };
        match line.trim() {
            "1" => break Rating::Again,
            "2" => break Rating::Hard,
            "3" => break Rating::Good,
            "4" => break Rating::Easy,
            "q" => {
                runner.dispatch(Event::SessionClosed { confirmed: false })?;
                return Ok(Flow::Continue);
            }
            _ => println!("Enter a number between 1 and 4."),
        }
    };
    runner.dispatch(Event::GradeSelected {
        rating,
        now: Timestamp::now(),
    })?;
    Ok(Flow::Continue)
}

fn field_title(content: &Content, field_id: FieldId) -> &str {
    content
        .template
        .field(field_id)
        .map(|field| field.title.as_str())
        .unwrap_or("?")
}

fn field_text(content: &Content, field_id: FieldId) -> &str {
    content.card.field(field_id).unwrap_or("")
}

fn describe(counts: &Counts) -> String {
    format!(
        "{} untouched, {} learn, {} review ({} total)",
        counts.untouched, counts.learn, counts.review, counts.total
    )
}

/// How long until `due`, in the largest whole unit: `"10m"`, `"3h"`, `"8d"`.
fn format_interval(now: Timestamp, due: Option<Timestamp>) -> String {
    let Some(due) = due else {
        return "now".to_string();
    };
    let minutes = (due.millis() - now.millis()).max(0) / 60_000;
    if minutes < 60 {
        format!("{}m", minutes.max(1))
    } else if minutes < 1440 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}d", minutes / 1440)
    }
}
