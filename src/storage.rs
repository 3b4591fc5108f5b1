use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use chrono::{NaiveDate, Weekday};

use crate::domain::{Entry, Planner, Recurrence, format_clock, parse_clock};

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Loads a planner from the pipe-delimited format
/// `key|HH:MM-HH:MM|heading|content|type`, where `key` is an ISO date or
/// `W` + weekday digit 1-7 and a missing 5th field means `once`. A missing
/// file is an empty planner. Malformed lines are dropped with a warning and
/// never fail the load; hand-edited files routinely contain a few.
pub fn load_planner(path: &Path) -> Result<Planner, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Planner::new()),
        Err(err) => return Err(StorageError::Io(err)),
    };

    let mut planner = Planner::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_entry_line(line) {
            Some(entry) => {
                planner.add(entry);
            }
            None => eprintln!("warning: skipping malformed planner line: {line}"),
        }
    }

    Ok(planner)
}

fn parse_entry_line(line: &str) -> Option<Entry> {
    let fields = line.splitn(5, '|').collect::<Vec<_>>();
    if fields.len() < 4 {
        return None;
    }
    let key = fields[0];
    let time_range = fields[1];
    let heading = fields[2];
    let content = fields[3];
    let kind = fields.get(4).copied().unwrap_or("once");

    let recurrence = if kind == "weekly" {
        let digit = key.strip_prefix('W')?.parse::<u8>().ok()?;
        if !(1..=7).contains(&digit) {
            return None;
        }
        let weekday = Weekday::try_from(digit - 1).ok()?;
        Recurrence::Weekly { weekday }
    } else {
        let date = NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()?;
        Recurrence::Once { date }
    };

    let (start_raw, end_raw) = time_range.split_once('-')?;
    let start = parse_clock(start_raw).ok()?;
    let end = parse_clock(end_raw).ok()?;

    // The checked path never writes inverted intervals or blank headings,
    // but hand-edited files can contain them; those records are dropped too.
    Entry::new(recurrence, start, end, heading, content).ok()
}

/// Full overwrite, one line per entry, in collection order.
pub fn save_planner(path: &Path, planner: &Planner) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }
    }

    let mut file = fs::File::create(path).map_err(StorageError::Io)?;
    for entry in planner.entries() {
        let key = entry_key(entry.recurrence);
        let kind = if entry.recurrence.is_weekly() { "weekly" } else { "once" };
        writeln!(
            file,
            "{}|{}-{}|{}|{}|{}",
            key,
            format_clock(entry.start),
            format_clock(entry.end),
            entry.heading,
            entry.content,
            kind
        )
        .map_err(StorageError::Io)?;
    }

    Ok(())
}

fn entry_key(recurrence: Recurrence) -> String {
    match recurrence {
        Recurrence::Once { date } => date.format("%Y-%m-%d").to_string(),
        Recurrence::Weekly { weekday } => format!("W{}", weekday.number_from_monday()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chrono::{NaiveDate, NaiveTime, Weekday};

    use crate::domain::{Entry, Planner, Recurrence};

    use super::{load_planner, save_planner};

    fn clock(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("test time should be valid")
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date should be valid")
    }

    #[test]
    fn round_trips_both_recurrence_kinds() {
        let mut planner = Planner::new();
        planner.add(
            Entry::new(
                Recurrence::Weekly { weekday: Weekday::Mon },
                clock(9, 0),
                clock(10, 0),
                "Standup",
                "daily sync",
            )
            .expect("entry should be created"),
        );
        planner.add(
            Entry::new(
                Recurrence::Once { date: date(2024, 6, 5) },
                clock(14, 0),
                clock(15, 30),
                "Dentist",
                "",
            )
            .expect("entry should be created"),
        );

        let path = temp_file("weekplan_storage_roundtrip.txt");
        save_planner(&path, &planner).expect("save should succeed");
        let loaded = load_planner(&path).expect("load should succeed");

        assert_eq!(loaded.len(), 2);
        for (original, reloaded) in planner.entries().iter().zip(loaded.entries()) {
            assert_eq!(reloaded.recurrence, original.recurrence);
            assert_eq!(reloaded.start, original.start);
            assert_eq!(reloaded.end, original.end);
            assert_eq!(reloaded.heading, original.heading);
            assert_eq!(reloaded.content, original.content);
        }
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_loads_an_empty_planner() {
        let path = temp_file("weekplan_storage_missing.txt");
        let _ = fs::remove_file(&path);
        let planner = load_planner(&path).expect("load should succeed");
        assert!(planner.is_empty());
    }

    #[test]
    fn missing_type_field_defaults_to_once() {
        let path = temp_file("weekplan_storage_default_once.txt");
        fs::write(&path, "2024-06-05|09:00-10:00|Dentist|bring card\n")
            .expect("write should succeed");
        let planner = load_planner(&path).expect("load should succeed");
        assert_eq!(planner.len(), 1);
        assert_eq!(
            planner.entries()[0].recurrence,
            Recurrence::Once { date: date(2024, 6, 5) }
        );
        assert_eq!(planner.entries()[0].content, "bring card");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_lines_are_dropped_without_failing_the_load() {
        let path = temp_file("weekplan_storage_skips.txt");
        let raw = concat!(
            "W1|09:00-10:00|Standup||weekly\n",
            "too|few|fields\n",
            "2024-06-05|0900 1000|No dash||once\n",
            "W9|09:00-10:00|Bad weekday||weekly\n",
            "W|09:00-10:00|No digit||weekly\n",
            "not-a-date|09:00-10:00|Bad date||once\n",
            "2024-06-05|11:00-10:00|Inverted||once\n",
            "2024-06-05|09:00-10:00| ||once\n",
            "\n",
            "2024-06-06|14:00-15:00|Survivor||once\n",
        );
        fs::write(&path, raw).expect("write should succeed");

        let planner = load_planner(&path).expect("load should succeed");
        let headings = planner
            .entries()
            .iter()
            .map(|entry| entry.heading.as_str())
            .collect::<Vec<_>>();
        assert_eq!(headings, ["Standup", "Survivor"]);
        let _ = fs::remove_file(path);
    }

    fn temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}", name, std::process::id()));
        path
    }
}
