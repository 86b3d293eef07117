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

//! Conversion between the stored algorithm configuration and the parameter
//! set the scheduler runs on.

use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::fsrs::DEFAULT_WEIGHTS;
use crate::fsrs::Weights;
use crate::fsrs::format_weights;
use crate::fsrs::parse_weights;

const MIN_RETENTION: f64 = 70.0;
const MAX_RETENTION: f64 = 99.0;
const DEFAULT_MAXIMUM_INTERVAL: u32 = 36500;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl StepUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepUnit::Seconds => "s",
            StepUnit::Minutes => "m",
            StepUnit::Hours => "h",
            StepUnit::Days => "d",
        }
    }

    fn minutes(&self) -> f64 {
        match self {
            StepUnit::Seconds => 1.0 / 60.0,
            StepUnit::Minutes => 1.0,
            StepUnit::Hours => 60.0,
            StepUnit::Days => 1440.0,
        }
    }
}

impl FromStr for StepUnit {
    type Err = ErrorReport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(StepUnit::Seconds),
            "m" => Ok(StepUnit::Minutes),
            "h" => Ok(StepUnit::Hours),
            "d" => Ok(StepUnit::Days),
            _ => fail(format!("Invalid step unit: {s}")),
        }
    }
}

/// One learning step: a fixed delay before the card is shown again.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(try_from = "(u32, String)", into = "(u32, String)")]
pub struct Step {
    pub amount: u32,
    pub unit: StepUnit,
}

impl Step {
    pub fn new(amount: u32, unit: StepUnit) -> Self {
        Self { amount, unit }
    }

    pub fn minutes(&self) -> f64 {
        f64::from(self.amount) * self.unit.minutes()
    }
}

impl TryFrom<(u32, String)> for Step {
    type Error = ErrorReport;

    fn try_from((amount, unit): (u32, String)) -> Result<Self, Self::Error> {
        Ok(Step::new(amount, unit.parse()?))
    }
}

impl From<Step> for (u32, String) {
    fn from(step: Step) -> Self {
        (step.amount, step.unit.as_str().to_string())
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.as_str())
    }
}

impl FromStr for Step {
    type Err = ErrorReport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (amount, unit) = s.split_at(split);
        if amount.is_empty() {
            return fail(format!("Invalid step: {s:?}"));
        }
        let amount: u32 = amount.parse()?;
        Ok(Step::new(amount, unit.parse()?))
    }
}

/// Render steps as `"1m, 10m"`.
pub fn format_steps(steps: &[Step]) -> String {
    steps
        .iter()
        .map(Step::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse the output of [`format_steps`]. The empty string is the empty list.
pub fn parse_steps(s: &str) -> Fallible<Vec<Step>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(str::parse).collect()
}

/// An algorithm as the learner configures it.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Algorithm {
    /// Target retention, in percent.
    pub retention: f64,
    /// The FSRS weights, comma-separated.
    pub weights: String,
    pub is_fuzz_enabled: bool,
    pub learning_steps: Vec<Step>,
    pub relearning_steps: Vec<Step>,
    /// In days.
    pub maximum_interval: u32,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self {
            retention: 90.0,
            weights: format_weights(&DEFAULT_WEIGHTS),
            is_fuzz_enabled: false,
            learning_steps: vec![
                Step::new(1, StepUnit::Minutes),
                Step::new(10, StepUnit::Minutes),
            ],
            relearning_steps: vec![Step::new(10, StepUnit::Minutes)],
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
        }
    }
}

impl Algorithm {
    pub fn validate(&self) -> Fallible<()> {
        if !(MIN_RETENTION..=MAX_RETENTION).contains(&self.retention) {
            return fail(format!(
                "Retention must be between {MIN_RETENTION} and {MAX_RETENTION}, got {}.",
                self.retention
            ));
        }
        if self.learning_steps.iter().any(|step| step.amount == 0) {
            return fail("Learning step amounts must be positive.");
        }
        if self.relearning_steps.iter().any(|step| step.amount == 0) {
            return fail("Relearning step amounts must be positive.");
        }
        if self.maximum_interval == 0 {
            return fail("Maximum interval must be positive.");
        }
        parse_weights(&self.weights)?;
        Ok(())
    }
}

/// What the scheduler runs on.
#[derive(Clone, PartialEq, Debug)]
pub struct SchedulerParams {
    /// Target retention, as a fraction.
    pub request_retention: f64,
    pub w: Weights,
    pub enable_fuzz: bool,
    pub learning_steps: String,
    pub relearning_steps: String,
    pub maximum_interval: u32,
}

pub fn to_scheduler_params(algorithm: &Algorithm) -> Fallible<SchedulerParams> {
    Ok(SchedulerParams {
        request_retention: algorithm.retention / 100.0,
        w: parse_weights(&algorithm.weights)?,
        enable_fuzz: algorithm.is_fuzz_enabled,
        learning_steps: format_steps(&algorithm.learning_steps),
        relearning_steps: format_steps(&algorithm.relearning_steps),
        maximum_interval: algorithm.maximum_interval,
    })
}

pub fn from_scheduler_params(params: &SchedulerParams) -> Fallible<Algorithm> {
    Ok(Algorithm {
        retention: params.request_retention * 100.0,
        weights: format_weights(&params.w),
        is_fuzz_enabled: params.enable_fuzz,
        learning_steps: parse_steps(&params.learning_steps)?,
        relearning_steps: parse_steps(&params.relearning_steps)?,
        maximum_interval: params.maximum_interval,
    })
}
