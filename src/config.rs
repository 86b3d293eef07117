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

//! Learning settings, stored as `koloda.toml` next to the database.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Duration;
use chrono::Local;
use chrono::NaiveTime;
use chrono::TimeZone;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;
use crate::error::fail;
use crate::types::counts::Counts;
use crate::types::timestamp::Timestamp;

pub const CONFIG_FILE_NAME: &str = "koloda.toml";

/// Per-category daily limits. Zero means no limit.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyLimits {
    pub total: u32,
    pub untouched: u32,
    pub learn: u32,
    pub review: u32,
}

impl Default for DailyLimits {
    fn default() -> Self {
        Self {
            total: 200,
            untouched: 50,
            learn: 200,
            review: 200,
        }
    }
}

impl DailyLimits {
    pub fn validate(&self) -> Fallible<()> {
        if self.total == 0 {
            return Ok(());
        }
        for (name, value) in [
            ("untouched", self.untouched),
            ("learn", self.learn),
            ("review", self.review),
        ] {
            if value > self.total {
                return fail(format!(
                    "The daily {name} limit ({value}) exceeds the total limit ({}).",
                    self.total
                ));
            }
        }
        Ok(())
    }

    pub fn as_counts(&self) -> Counts {
        Counts {
            untouched: self.untouched,
            learn: self.learn,
            review: self.review,
            total: self.total,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningSettings {
    pub daily_limits: DailyLimits,
    /// Local time, `HH:MM`, at which a new learning day begins.
    pub day_starts_at: String,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            daily_limits: DailyLimits::default(),
            day_starts_at: "05:00".to_string(),
        }
    }
}

impl LearningSettings {
    /// The settings file that belongs to the database at `db_path`.
    pub fn path_for(db_path: &Path) -> PathBuf {
        db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_FILE_NAME)
    }

    /// Load settings from `path`, falling back to the defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Fallible<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults.", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings: LearningSettings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Fallible<()> {
        self.validate()?;
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Fallible<()> {
        self.daily_limits.validate()?;
        self.day_start()?;
        Ok(())
    }

    fn day_start(&self) -> Fallible<NaiveTime> {
        let Some((hours, minutes)) = self.day_starts_at.split_once(':') else {
            return fail(format!("Invalid day start time: {}", self.day_starts_at));
        };
        let hours: u32 = hours.parse()?;
        let minutes: u32 = minutes.parse()?;
        match NaiveTime::from_hms_opt(hours, minutes, 0) {
            Some(time) => Ok(time),
            None => fail(format!("Invalid day start time: {}", self.day_starts_at)),
        }
    }

    /// The learning day containing `now`, as a half-open `[from, to)` range,
    /// in local time.
    pub fn learning_day_range(&self, now: Timestamp) -> Fallible<(Timestamp, Timestamp)> {
        self.learning_day_range_in(now, &Local)
    }

    pub fn learning_day_range_in<Tz: TimeZone>(
        &self,
        now: Timestamp,
        tz: &Tz,
    ) -> Fallible<(Timestamp, Timestamp)> {
        let start = self.day_start()?;
        let local = now.into_inner().with_timezone(tz);
        let boundary = local.date_naive().and_time(start);
        // A day start inside a DST gap has no local instant.
        let Some(boundary) = tz.from_local_datetime(&boundary).earliest() else {
            return fail(format!("Day start {} does not exist today.", self.day_starts_at));
        };
        let boundary: DateTime<Utc> = boundary.with_timezone(&Utc);
        let from = if now.into_inner() < boundary {
            boundary - Duration::days(1)
        } else {
            boundary
        };
        Ok((Timestamp::new(from), Timestamp::new(from + Duration::days(1))))
    }
}
