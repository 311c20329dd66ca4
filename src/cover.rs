use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Qualitative cloud cover recorded by an observer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkyCover {
    /// No recorded observation covers the instant.
    #[default]
    Unknown,
    Clear,
    Scattered,
    Overcast,
}

impl SkyCover {
    /// The short code used by the dataset configuration.
    pub fn code(&self) -> &'static str {
        match self {
            SkyCover::Unknown => "UNK",
            SkyCover::Clear => "CLR",
            SkyCover::Scattered => "SCT",
            SkyCover::Overcast => "OVC",
        }
    }
}

impl fmt::Display for SkyCover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for SkyCover {
    type Err = String;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code.trim() {
            "UNK" => Ok(SkyCover::Unknown),
            "CLR" => Ok(SkyCover::Clear),
            "SCT" => Ok(SkyCover::Scattered),
            "OVC" => Ok(SkyCover::Overcast),
            other => Err(format!("unknown sky cover code: {other:?}")),
        }
    }
}

/// A time interval over which a single [`SkyCover`] was observed.
///
/// Both bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverInterval {
    start: NaiveDateTime,
    end: NaiveDateTime,
    cover: SkyCover,
}

impl CoverInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, cover: SkyCover) -> Self {
        Self { start, end, cover }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn cover(&self) -> SkyCover {
        self.cover
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Ordered list of observed sky cover intervals for a dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkyCoverCalendar {
    intervals: Vec<CoverInterval>,
}

impl SkyCoverCalendar {
    pub fn new(intervals: Vec<CoverInterval>) -> Self {
        Self { intervals }
    }

    pub fn intervals(&self) -> &[CoverInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Returns the sky cover recorded at `instant`.
    ///
    /// The seconds of `instant` are dropped before the lookup since the
    /// calendar is recorded with minute resolution. The first interval that
    /// contains the instant wins, so overlapping intervals resolve in
    /// insertion order. Returns [`SkyCover::Unknown`] when no interval matches.
    pub fn classify(&self, instant: NaiveDateTime) -> SkyCover {
        let instant = truncate_to_minute(instant);
        self.intervals
            .iter()
            .find(|interval| interval.contains(instant))
            .map(CoverInterval::cover)
            .unwrap_or_default()
    }
}

fn truncate_to_minute(instant: NaiveDateTime) -> NaiveDateTime {
    instant
        .with_second(0)
        .and_then(|instant| instant.with_nanosecond(0))
        .unwrap_or(instant)
}
