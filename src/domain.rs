use std::fmt::{Display, Formatter};

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::Serialize;

const ID_LEN: usize = 8;

/// Parses a wall-clock time written as "HH:MM". Exactly two colon-separated
/// integer groups are accepted, hour 0-23 and minute 0-59.
pub fn parse_clock(input: &str) -> Result<NaiveTime, ScheduleError> {
    let trimmed = input.trim();
    let Some((hour_raw, minute_raw)) = trimmed.split_once(':') else {
        return Err(ScheduleError::MalformedTime(input.to_string()));
    };
    if minute_raw.contains(':') {
        return Err(ScheduleError::MalformedTime(input.to_string()));
    }

    let hour = hour_raw
        .parse::<u32>()
        .map_err(|_| ScheduleError::MalformedTime(input.to_string()))?;
    let minute = minute_raw
        .parse::<u32>()
        .map_err(|_| ScheduleError::MalformedTime(input.to_string()))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| ScheduleError::MalformedTime(input.to_string()))
}

pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Half-open interval overlap: an entry ending at 12:00 does not collide
/// with one starting at 12:00.
pub fn overlaps(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    minutes_since_midnight(a_start) < minutes_since_midnight(b_end)
        && minutes_since_midnight(b_start) < minutes_since_midnight(a_end)
}

pub fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    Once { date: NaiveDate },
    Weekly { weekday: Weekday },
}

impl Recurrence {
    /// The ISO weekday (Mon=1..Sun=7) the entry occupies: derived from the
    /// literal date for one-time entries, stored directly for weekly ones.
    pub fn effective_weekday(&self) -> Weekday {
        match self {
            Recurrence::Once { date } => date.weekday(),
            Recurrence::Weekly { weekday } => *weekday,
        }
    }

    pub fn is_weekly(&self) -> bool {
        matches!(self, Recurrence::Weekly { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    #[serde(skip)]
    pub id: String,
    pub recurrence: Recurrence,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub heading: String,
    pub content: String,
}

impl Entry {
    /// Checked constructor: trims both text fields, rejects an empty heading
    /// and an interval whose start is not strictly before its end. Direct
    /// struct construction stays possible and unguarded.
    pub fn new(
        recurrence: Recurrence,
        start: NaiveTime,
        end: NaiveTime,
        heading: &str,
        content: &str,
    ) -> Result<Self, ScheduleError> {
        let heading = heading.trim();
        if heading.is_empty() {
            return Err(ScheduleError::MissingHeading);
        }
        if minutes_since_midnight(start) >= minutes_since_midnight(end) {
            return Err(ScheduleError::InvalidInterval);
        }

        Ok(Self {
            id: generate_id(),
            recurrence,
            start,
            end,
            heading: heading.to_string(),
            content: content.trim().to_string(),
        })
    }

    pub fn time_range(&self) -> String {
        format!("{}-{}", format_clock(self.start), format_clock(self.end))
    }
}

/// A fixed daily time range during which no entry may be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Display for RestWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", format_clock(self.start), format_clock(self.end))
    }
}

#[derive(Debug, Clone)]
pub enum ScheduleError {
    MalformedTime(String),
    InvalidInterval,
    RestWindowConflict(RestWindow),
    TimeConflict(Entry),
    MissingHeading,
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::MalformedTime(input) => {
                write!(f, "malformed time '{input}', expected HH:MM")
            }
            ScheduleError::InvalidInterval => write!(f, "start time must be before end time"),
            ScheduleError::RestWindowConflict(window) => {
                write!(f, "overlaps rest period {window}")
            }
            ScheduleError::TimeConflict(entry) => {
                write!(f, "time conflict with {} | {}", entry.time_range(), entry.heading)
            }
            ScheduleError::MissingHeading => write!(f, "heading must not be empty"),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// The entry collection. Mutators do not validate or conflict-check; callers
/// run `check_entry` first and follow every mutation with a full save.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    entries: Vec<Entry>,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, entry: Entry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn replace(&mut self, index: usize, entry: Entry) -> bool {
        match self.entries.get_mut(index) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<Entry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    /// Maps an opaque entry id back to its current position. Ids are
    /// regenerated on load and never persisted; the positional index remains
    /// the collection's identity contract.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{NaiveDate, NaiveTime, Weekday};

    use super::{
        Entry, Planner, Recurrence, ScheduleError, minutes_since_midnight, overlaps, parse_clock,
    };

    fn clock(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("test time should be valid")
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date should be valid")
    }

    #[test]
    fn parses_valid_clock_times() {
        assert_eq!(parse_clock("09:30").expect("should parse"), clock(9, 30));
        assert_eq!(parse_clock("00:00").expect("should parse"), clock(0, 0));
        assert_eq!(parse_clock("23:59").expect("should parse"), clock(23, 59));
        assert_eq!(parse_clock("9:5").expect("should parse"), clock(9, 5));
    }

    #[test]
    fn rejects_malformed_clock_times() {
        for input in ["", "09", "0930", "09:60", "24:00", "09:30:00", "ab:cd", "-1:30"] {
            assert!(
                matches!(parse_clock(input), Err(ScheduleError::MalformedTime(_))),
                "input {input:?} should be rejected"
            );
        }
    }

    #[test]
    fn minute_offsets_are_injective_over_all_instants() {
        let mut seen = HashSet::new();
        for hour in 0..24 {
            for minute in 0..60 {
                let time = parse_clock(&format!("{hour:02}:{minute:02}")).expect("should parse");
                assert!(seen.insert(minutes_since_midnight(time)));
            }
        }
        assert_eq!(seen.len(), 1440);
    }

    #[test]
    fn overlap_is_half_open_and_symmetric() {
        let cases = [
            (clock(9, 0), clock(10, 0), clock(9, 30), clock(10, 30), true),
            (clock(9, 0), clock(12, 0), clock(12, 0), clock(13, 0), false),
            (clock(9, 0), clock(10, 0), clock(10, 0), clock(11, 0), false),
            (clock(8, 0), clock(20, 0), clock(9, 0), clock(10, 0), true),
        ];
        for (a_start, a_end, b_start, b_end, expected) in cases {
            assert_eq!(overlaps(a_start, a_end, b_start, b_end), expected);
            assert_eq!(
                overlaps(a_start, a_end, b_start, b_end),
                overlaps(b_start, b_end, a_start, a_end)
            );
        }
    }

    #[test]
    fn constructor_rejects_empty_heading_and_inverted_interval() {
        let once = Recurrence::Once { date: date(2024, 6, 3) };
        assert!(matches!(
            Entry::new(once, clock(9, 0), clock(10, 0), "   ", ""),
            Err(ScheduleError::MissingHeading)
        ));
        assert!(matches!(
            Entry::new(once, clock(10, 0), clock(10, 0), "Standup", ""),
            Err(ScheduleError::InvalidInterval)
        ));
        assert!(matches!(
            Entry::new(once, clock(11, 0), clock(10, 0), "Standup", ""),
            Err(ScheduleError::InvalidInterval)
        ));
    }

    #[test]
    fn constructor_trims_heading_and_content() {
        let entry = Entry::new(
            Recurrence::Weekly { weekday: Weekday::Mon },
            clock(9, 0),
            clock(10, 0),
            "  Standup ",
            " notes \n",
        )
        .expect("entry should be created");
        assert_eq!(entry.heading, "Standup");
        assert_eq!(entry.content, "notes");
        assert_eq!(entry.id.len(), 8);
    }

    #[test]
    fn planner_mutations_keep_positions_and_ids_consistent() {
        let mut planner = Planner::new();
        let first = Entry::new(
            Recurrence::Once { date: date(2024, 6, 3) },
            clock(9, 0),
            clock(10, 0),
            "First",
            "",
        )
        .expect("entry should be created");
        let second = Entry::new(
            Recurrence::Weekly { weekday: Weekday::Tue },
            clock(10, 0),
            clock(11, 0),
            "Second",
            "",
        )
        .expect("entry should be created");
        let second_id = second.id.clone();

        assert_eq!(planner.add(first), 0);
        assert_eq!(planner.add(second), 1);
        assert_eq!(planner.position_of(&second_id), Some(1));

        let removed = planner.remove(0).expect("entry should exist");
        assert_eq!(removed.heading, "First");
        assert_eq!(planner.position_of(&second_id), Some(0));
        assert!(planner.remove(5).is_none());

        let replacement = Entry::new(
            Recurrence::Weekly { weekday: Weekday::Wed },
            clock(8, 0),
            clock(9, 0),
            "Replacement",
            "",
        )
        .expect("entry should be created");
        assert!(planner.replace(0, replacement));
        assert_eq!(planner.entries()[0].heading, "Replacement");
        assert_eq!(planner.position_of(&second_id), None);
    }
}
