// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly schedule models: which days an alias trains, and the ordered
//! exercise list for each of those days.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown weekday: {0}")]
pub struct UnknownWeekday(pub String);

impl FromStr for Weekday {
    type Err = UnknownWeekday;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|day| day.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownWeekday(s.to_string()))
    }
}

/// An alias trains on `day`; `order` is the display position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAssignment {
    pub username: String,
    pub day: Weekday,
    pub order: u32,
    /// Owning identity (buddy days carry the owner's id)
    pub auth_id: String,
}

/// One exercise in an alias's list for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseAssignment {
    pub username: String,
    pub day: Weekday,
    pub name: String,
    /// Contiguous from 0 within (username, day)
    pub position: u32,
}

/// Built-in exercise template for days that have one.
pub fn template_exercises(day: Weekday) -> &'static [&'static str] {
    match day {
        Weekday::Monday => &[
            "Chest Press",
            "Incline Dumbbell Press",
            "Lateral Raises",
            "Bicep Curls",
        ],
        Weekday::Wednesday => &[
            "Hip Adductor Curls",
            "Hip Inductor Curls",
            "Seated Hamstring Curls",
            "RDLs (Romanian Deadlifts)",
            "Leg Extensions",
            "Squats",
        ],
        Weekday::Thursday => &[
            "Lat Pullovers",
            "Lat Pulldowns",
            "Rows",
            "Tricep Pushdowns",
            "Dips",
            "Rear Delt Flies",
        ],
        Weekday::Saturday => &["Glute Extensions", "Hip Thrusts", "Calf Raises"],
        Weekday::Tuesday | Weekday::Friday | Weekday::Sunday => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_parse_is_case_insensitive() {
        assert_eq!("monday".parse::<Weekday>().unwrap(), Weekday::Monday);
        assert_eq!(" Sunday ".parse::<Weekday>().unwrap(), Weekday::Sunday);
        assert!("Funday".parse::<Weekday>().is_err());
    }

    #[test]
    fn test_weekday_serializes_by_name() {
        assert_eq!(
            serde_json::to_string(&Weekday::Thursday).unwrap(),
            "\"Thursday\""
        );
    }

    #[test]
    fn test_template_covers_original_days() {
        assert_eq!(template_exercises(Weekday::Monday).len(), 4);
        assert_eq!(template_exercises(Weekday::Saturday).len(), 3);
        assert!(template_exercises(Weekday::Friday).is_empty());
    }
}
