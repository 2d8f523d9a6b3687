//! Core domain types for the hlog daily health log.
//!
//! This module defines the fundamental types used throughout the system:
//! - Metric entries and the fields they carry
//! - Per-user daily targets
//! - User identity and the stable per-day record key

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Metric Types
// ============================================================================

/// One user's recorded measurements for one calendar day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MetricEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub calories: Option<u32>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub workout_minutes: Option<u32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub is_manual: bool,
}

impl MetricEntry {
    /// An entry for `date` with every metric absent
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            steps: None,
            calories: None,
            protein: None,
            workout_minutes: None,
            weight: None,
            is_manual: false,
        }
    }

    /// True when no metric holds a value
    pub fn is_blank(&self) -> bool {
        MetricField::ALL.iter().all(|f| f.get(self).is_none())
    }
}

/// A metric a user can log for a day
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    Steps,
    Calories,
    Protein,
    WorkoutMinutes,
    Weight,
}

impl MetricField {
    pub const ALL: [MetricField; 5] = [
        MetricField::Steps,
        MetricField::Calories,
        MetricField::Protein,
        MetricField::WorkoutMinutes,
        MetricField::Weight,
    ];

    /// Stable machine name (matches the serialized field name)
    pub fn key(self) -> &'static str {
        match self {
            MetricField::Steps => "steps",
            MetricField::Calories => "calories",
            MetricField::Protein => "protein",
            MetricField::WorkoutMinutes => "workout_minutes",
            MetricField::Weight => "weight",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricField::Steps => "Steps",
            MetricField::Calories => "Calories",
            MetricField::Protein => "Protein",
            MetricField::WorkoutMinutes => "Workout",
            MetricField::Weight => "Weight",
        }
    }

    /// Unit suffix shown after the value while displaying or editing
    pub fn unit(self) -> &'static str {
        match self {
            MetricField::Steps => "steps",
            MetricField::Calories => "kcal",
            MetricField::Protein => "g",
            MetricField::WorkoutMinutes => "min",
            MetricField::Weight => "lbs",
        }
    }

    /// Whether the displayed value uses thousands separators.
    ///
    /// Body weight is never grouped.
    pub fn is_grouped(self) -> bool {
        !matches!(self, MetricField::Weight)
    }

    /// Whether the stored value is a whole number
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            MetricField::Steps | MetricField::Calories | MetricField::WorkoutMinutes
        )
    }

    /// Read this field from an entry
    pub fn get(self, entry: &MetricEntry) -> Option<f64> {
        match self {
            MetricField::Steps => entry.steps.map(f64::from),
            MetricField::Calories => entry.calories.map(f64::from),
            MetricField::Protein => entry.protein,
            MetricField::WorkoutMinutes => entry.workout_minutes.map(f64::from),
            MetricField::Weight => entry.weight,
        }
    }

    /// Write this field on an entry.
    ///
    /// Negative, zero and non-finite values clear the field; integral fields
    /// round, and clear when the value does not fit a `u32`.
    pub fn set(self, entry: &mut MetricEntry, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite() && *v > 0.0);
        let whole = value
            .map(f64::round)
            .filter(|v| *v <= f64::from(u32::MAX))
            .map(|v| v as u32);
        match self {
            MetricField::Steps => entry.steps = whole,
            MetricField::Calories => entry.calories = whole,
            MetricField::Protein => entry.protein = value,
            MetricField::WorkoutMinutes => entry.workout_minutes = whole,
            MetricField::Weight => entry.weight = value,
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MetricField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "steps" => Ok(MetricField::Steps),
            "calories" | "kcal" => Ok(MetricField::Calories),
            "protein" => Ok(MetricField::Protein),
            "workout_minutes" | "workout" | "workouts" => Ok(MetricField::WorkoutMinutes),
            "weight" => Ok(MetricField::Weight),
            other => Err(Error::Other(format!("Unknown metric field: {}", other))),
        }
    }
}

// ============================================================================
// Targets
// ============================================================================

/// A user's per-metric daily goals
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TargetSet {
    #[serde(default = "default_steps_target")]
    pub steps: u32,
    #[serde(default = "default_calories_target")]
    pub calories: u32,
    #[serde(default = "default_protein_target")]
    pub protein: u32,
    #[serde(default = "default_workouts_per_day")]
    pub workouts_per_day: u32,
}

impl Default for TargetSet {
    fn default() -> Self {
        Self {
            steps: default_steps_target(),
            calories: default_calories_target(),
            protein: default_protein_target(),
            workouts_per_day: default_workouts_per_day(),
        }
    }
}

fn default_steps_target() -> u32 {
    10_000
}

fn default_calories_target() -> u32 {
    1_800
}

fn default_protein_target() -> u32 {
    165
}

fn default_workouts_per_day() -> u32 {
    1
}

impl TargetSet {
    /// Goal line for a chart of `field`, if the field has one
    pub fn goal_for(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::Steps => Some(f64::from(self.steps)),
            MetricField::Calories => Some(f64::from(self.calories)),
            MetricField::Protein => Some(f64::from(self.protein)),
            MetricField::WorkoutMinutes | MetricField::Weight => None,
        }
    }
}

// ============================================================================
// Identity and Record Keys
// ============================================================================

/// Stable identifier of an authenticated user
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::Config("user id must not be empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable composite identity of a day's record: (user, calendar date).
///
/// The encoded form is `YYYY-MM-DD_<user>`. A formatted date never contains
/// `_`, so splitting at the first `_` recovers both parts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub user: UserId,
    pub date: NaiveDate,
}

impl EntryKey {
    pub fn new(user: UserId, date: NaiveDate) -> Self {
        Self { user, date }
    }

    pub fn encode(&self) -> String {
        format!("{}_{}", self.date.format("%Y-%m-%d"), self.user.as_str())
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let (date, user) = encoded
            .split_once('_')
            .ok_or_else(|| Error::InvalidKey(encoded.to_string()))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| Error::InvalidKey(format!("{}: {}", encoded, e)))?;
        let user = UserId::new(user).map_err(|_| Error::InvalidKey(encoded.to_string()))?;
        Ok(Self { user, date })
    }
}

impl Serialize for EntryKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for EntryKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        EntryKey::decode(&encoded).map_err(serde::de::Error::custom)
    }
}

/// A record as held by a store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredEntry {
    /// Opaque storage identifier; never used to address the record
    pub id: Uuid,
    pub key: EntryKey,
    pub revision: u64,
    pub entry: MetricEntry,
}
