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
use std::str::FromStr;

use crate::error::ErrorReport;
use crate::error::fail;
use crate::fsrs::CardState;

/// The three kinds of card a lesson draws from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Category {
    Untouched,
    Learn,
    Review,
}

impl Category {
    /// The order in which a total budget is handed out.
    pub const PRIORITY: [Category; 3] = [Category::Untouched, Category::Learn, Category::Review];

    pub fn of(state: CardState) -> Category {
        match state {
            CardState::New => Category::Untouched,
            CardState::Learning | CardState::Relearning => Category::Learn,
            CardState::Review => Category::Review,
        }
    }
}

/// What a learner asks to study: one category, or everything.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LessonType {
    Untouched,
    Learn,
    Review,
    Total,
}

impl LessonType {
    pub fn category(self) -> Option<Category> {
        match self {
            LessonType::Untouched => Some(Category::Untouched),
            LessonType::Learn => Some(Category::Learn),
            LessonType::Review => Some(Category::Review),
            LessonType::Total => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LessonType::Untouched => "untouched",
            LessonType::Learn => "learn",
            LessonType::Review => "review",
            LessonType::Total => "total",
        }
    }
}

impl From<Category> for LessonType {
    fn from(category: Category) -> Self {
        match category {
            Category::Untouched => LessonType::Untouched,
            Category::Learn => LessonType::Learn,
            Category::Review => LessonType::Review,
        }
    }
}

impl FromStr for LessonType {
    type Err = ErrorReport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "untouched" => Ok(LessonType::Untouched),
            "learn" => Ok(LessonType::Learn),
            "review" => Ok(LessonType::Review),
            "total" => Ok(LessonType::Total),
            _ => fail(format!("Invalid lesson type: {s}")),
        }
    }
}

impl Display for LessonType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Card counts per lesson category, plus their total.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Counts {
    pub untouched: u32,
    pub learn: u32,
    pub review: u32,
    pub total: u32,
}

/// Planned card counts for one session.
pub type Amounts = Counts;

impl Counts {
    /// Counts whose total is the sum of the three categories.
    pub fn new(untouched: u32, learn: u32, review: u32) -> Self {
        let mut counts = Self {
            untouched,
            learn,
            review,
            total: 0,
        };
        counts.recompute_total();
        counts
    }

    pub fn get(&self, lesson_type: LessonType) -> u32 {
        match lesson_type {
            LessonType::Untouched => self.untouched,
            LessonType::Learn => self.learn,
            LessonType::Review => self.review,
            LessonType::Total => self.total,
        }
    }

    pub fn category(&self, category: Category) -> u32 {
        self.get(category.into())
    }

    pub fn set(&mut self, category: Category, value: u32) {
        match category {
            Category::Untouched => self.untouched = value,
            Category::Learn => self.learn = value,
            Category::Review => self.review = value,
        }
    }

    /// Count one card of `category` towards both its category and the total.
    pub fn increment(&mut self, category: Category) {
        self.set(category, self.category(category) + 1);
        self.total += 1;
    }

    pub fn recompute_total(&mut self) {
        self.total = self.untouched.saturating_add(self.learn).saturating_add(self.review);
    }

    pub fn sum(&self, other: &Counts) -> Counts {
        Counts {
            untouched: self.untouched + other.untouched,
            learn: self.learn + other.learn,
            review: self.review + other.review,
            total: self.total + other.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fallible;

    #[test]
    fn test_category_of_state() {
        assert_eq!(Category::of(CardState::New), Category::Untouched);
        assert_eq!(Category::of(CardState::Learning), Category::Learn);
        assert_eq!(Category::of(CardState::Relearning), Category::Learn);
        assert_eq!(Category::of(CardState::Review), Category::Review);
    }

    #[test]
    fn test_counts_new_sums_total() {
        let counts = Counts::new(1, 2, 3);
        assert_eq!(counts.total, 6);
        assert_eq!(counts.get(LessonType::Learn), 2);
    }

    #[test]
    fn test_increment() {
        let mut counts = Counts::default();
        counts.increment(Category::Review);
        counts.increment(Category::Review);
        counts.increment(Category::Untouched);
        assert_eq!(counts, Counts::new(1, 0, 2));
    }

    #[test]
    fn test_lesson_type_parse() -> Fallible<()> {
        for ty in [
            LessonType::Untouched,
            LessonType::Learn,
            LessonType::Review,
            LessonType::Total,
        ] {
            assert_eq!(ty.as_str().parse::<LessonType>()?, ty);
        }
        assert!("all".parse::<LessonType>().is_err());
        Ok(())
    }
}
