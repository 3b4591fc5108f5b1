use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::{
    Entry, Recurrence, RestWindow, ScheduleError, minutes_since_midnight, overlaps,
};

/// An entry paired with the concrete calendar date it falls on within one
/// target week. `index` is the entry's position in the collection.
#[derive(Debug, Clone, Copy)]
pub struct Occurrence<'a> {
    pub index: usize,
    pub entry: &'a Entry,
    pub date: NaiveDate,
}

/// The Monday-first week containing `day`.
pub fn week_of(day: NaiveDate) -> [NaiveDate; 7] {
    let monday = day - Duration::days(day.weekday().number_from_monday() as i64 - 1);
    std::array::from_fn(|offset| monday + Duration::days(offset as i64))
}

/// Projects the collection onto one concrete week. Every weekly entry
/// resolves exactly once, to its weekday's date in the week; a one-time
/// entry is included only if its literal date falls inside the week.
/// Output order is unspecified; consumers sort.
pub fn resolve_week<'a>(entries: &'a [Entry], week: &[NaiveDate; 7]) -> Vec<Occurrence<'a>> {
    let mut occurrences = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match entry.recurrence {
            Recurrence::Weekly { weekday } => {
                let date = week[weekday.number_from_monday() as usize - 1];
                occurrences.push(Occurrence { index, entry, date });
            }
            Recurrence::Once { date } => {
                if week.contains(&date) {
                    occurrences.push(Occurrence { index, entry, date });
                }
            }
        }
    }
    occurrences
}

/// Entries appearing on `date`, sorted ascending by start time. Resolution is
/// scoped to *today's* week, not `date`'s: a date outside the current week
/// yields nothing, even from weekly entries.
pub fn entries_on_date<'a>(
    entries: &'a [Entry],
    date: NaiveDate,
    today: NaiveDate,
) -> Vec<Occurrence<'a>> {
    let week = week_of(today);
    let mut occurrences = resolve_week(entries, &week)
        .into_iter()
        .filter(|occurrence| occurrence.date == date)
        .collect::<Vec<_>>();
    occurrences.sort_by_key(|occurrence| {
        (minutes_since_midnight(occurrence.entry.start), occurrence.index)
    });
    occurrences
}

/// Calendar-wide presence check for month/year views: true iff a one-time
/// entry sits literally on `date`, or a weekly entry occupies its weekday.
/// Unlike `entries_on_date` this is not limited to the current week.
pub fn has_any_entry(entries: &[Entry], date: NaiveDate) -> bool {
    entries.iter().any(|entry| match entry.recurrence {
        Recurrence::Once { date: literal } => literal == date,
        Recurrence::Weekly { weekday } => weekday == date.weekday(),
    })
}

/// The next upcoming or ongoing occurrence in the current week: resolved
/// date after today, or today with an end time still ahead of `now`. The
/// winner has the smallest `(date, start)` pair; ties keep collection order.
pub fn next_occurrence<'a>(entries: &'a [Entry], now: NaiveDateTime) -> Option<Occurrence<'a>> {
    let today = now.date();
    let now_minutes = minutes_since_midnight(now.time());
    let week = week_of(today);

    resolve_week(entries, &week)
        .into_iter()
        .filter(|occurrence| {
            occurrence.date > today
                || (occurrence.date == today
                    && minutes_since_midnight(occurrence.entry.end) > now_minutes)
        })
        .min_by_key(|occurrence| (occurrence.date, minutes_since_midnight(occurrence.entry.start)))
}

/// The fixed rest windows, in checking order.
pub fn rest_windows() -> [RestWindow; 4] {
    [
        rest_window(12, 0, 13, 0),
        rest_window(17, 0, 18, 0),
        rest_window(23, 0, 23, 59),
        rest_window(0, 0, 6, 0),
    ]
}

fn rest_window(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> RestWindow {
    RestWindow {
        start: NaiveTime::from_hms_opt(start_hour, start_minute, 0)
            .expect("rest window start must be valid"),
        end: NaiveTime::from_hms_opt(end_hour, end_minute, 0)
            .expect("rest window end must be valid"),
    }
}

/// Decides whether `candidate` may be admitted next to `existing`. Rest
/// windows are checked first, in their fixed order; then each existing entry
/// in collection order (skipping `exclude` when editing in place). Two
/// one-time entries collide only on the same literal date; any pairing that
/// involves a weekly entry collides on equal effective weekdays. The first
/// hit is reported and the scan stops.
pub fn check_entry(
    existing: &[Entry],
    candidate: &Entry,
    exclude: Option<usize>,
) -> Result<(), ScheduleError> {
    for window in rest_windows() {
        if overlaps(candidate.start, candidate.end, window.start, window.end) {
            return Err(ScheduleError::RestWindowConflict(window));
        }
    }

    for (index, entry) in existing.iter().enumerate() {
        if exclude == Some(index) {
            continue;
        }
        if !overlaps(candidate.start, candidate.end, entry.start, entry.end) {
            continue;
        }

        let clashes = match (candidate.recurrence, entry.recurrence) {
            (Recurrence::Once { date: proposed }, Recurrence::Once { date: other }) => {
                proposed == other
            }
            _ => candidate.recurrence.effective_weekday() == entry.recurrence.effective_weekday(),
        };
        if clashes {
            return Err(ScheduleError::TimeConflict(entry.clone()));
        }
    }

    Ok(())
}

/// The next concrete date an entry falls on, counting today: a one-time
/// entry keeps its literal date, a weekly entry resolves to the nearest
/// matching weekday at or after `today`.
pub fn upcoming_date(recurrence: Recurrence, today: NaiveDate) -> NaiveDate {
    match recurrence {
        Recurrence::Once { date } => date,
        Recurrence::Weekly { weekday } => {
            let days_ahead = (weekday.number_from_monday() as i64
                - today.weekday().number_from_monday() as i64)
                .rem_euclid(7);
            today + Duration::days(days_ahead)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    StartsIn(Duration),
    EndsIn(Duration),
    Completed,
}

/// Classifies an entry against `now` for countdown display. The entry is
/// anchored to its upcoming date, so a weekly entry whose slot passed earlier
/// today counts down to next week's occurrence only once today's has ended.
pub fn countdown(entry: &Entry, now: NaiveDateTime) -> Countdown {
    let date = upcoming_date(entry.recurrence, now.date());
    let starts_at = date.and_time(entry.start);
    let ends_at = date.and_time(entry.end);

    if now < starts_at {
        Countdown::StartsIn(starts_at - now)
    } else if now <= ends_at {
        Countdown::EndsIn(ends_at - now)
    } else {
        Countdown::Completed
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

    use crate::domain::{Entry, Recurrence, ScheduleError};

    use super::{
        Countdown, check_entry, countdown, entries_on_date, has_any_entry, next_occurrence,
        resolve_week, upcoming_date, week_of,
    };

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date should be valid")
    }

    fn clock(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("test time should be valid")
    }

    fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
        day.and_time(clock(hour, minute))
    }

    fn once(day: NaiveDate, start: (u32, u32), end: (u32, u32), heading: &str) -> Entry {
        Entry::new(
            Recurrence::Once { date: day },
            clock(start.0, start.1),
            clock(end.0, end.1),
            heading,
            "",
        )
        .expect("entry should be created")
    }

    fn weekly(weekday: Weekday, start: (u32, u32), end: (u32, u32), heading: &str) -> Entry {
        Entry::new(
            Recurrence::Weekly { weekday },
            clock(start.0, start.1),
            clock(end.0, end.1),
            heading,
            "",
        )
        .expect("entry should be created")
    }

    // 2024-06-03 is a Monday.
    fn monday() -> NaiveDate {
        date(2024, 6, 3)
    }

    #[test]
    fn week_is_monday_first_and_consecutive() {
        for offset in 0..7 {
            let week = week_of(monday() + Duration::days(offset));
            assert_eq!(week[0], monday());
            for position in 1..7 {
                assert_eq!(week[position], week[position - 1] + Duration::days(1));
            }
        }
        assert_eq!(week_of(monday())[0], monday());
    }

    #[test]
    fn weekly_entry_resolves_exactly_once_per_week() {
        let entries = vec![weekly(Weekday::Wed, (9, 0), (10, 0), "Review")];
        let week = week_of(monday());
        let occurrences = resolve_week(&entries, &week);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].date, week[2]);
        assert_eq!(occurrences[0].index, 0);
    }

    #[test]
    fn once_entry_resolves_only_inside_its_week() {
        let inside = once(date(2024, 6, 5), (9, 0), (10, 0), "Inside");
        let outside = once(date(2024, 6, 12), (9, 0), (10, 0), "Outside");
        let entries = vec![inside, outside];
        let week = week_of(monday());
        let occurrences = resolve_week(&entries, &week);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].entry.heading, "Inside");
        assert_eq!(occurrences[0].date, date(2024, 6, 5));
    }

    #[test]
    fn entries_on_date_sorts_by_start_time() {
        let entries = vec![
            once(monday(), (11, 0), (12, 0), "Late"),
            weekly(Weekday::Mon, (9, 0), (10, 0), "Early"),
        ];
        let occurrences = entries_on_date(&entries, monday(), monday());
        let headings = occurrences
            .iter()
            .map(|occurrence| occurrence.entry.heading.as_str())
            .collect::<Vec<_>>();
        assert_eq!(headings, ["Early", "Late"]);
    }

    #[test]
    fn entries_on_date_is_scoped_to_the_current_week() {
        // Resolution happens against today's week, so a date outside it
        // reports nothing even for weekly entries.
        let entries = vec![
            weekly(Weekday::Mon, (9, 0), (10, 0), "Standup"),
            once(date(2024, 6, 10), (9, 0), (10, 0), "Next week"),
        ];
        let next_monday = date(2024, 6, 10);
        assert!(entries_on_date(&entries, next_monday, monday()).is_empty());
        assert_eq!(entries_on_date(&entries, next_monday, next_monday).len(), 2);
    }

    #[test]
    fn presence_check_is_calendar_wide() {
        let entries = vec![weekly(Weekday::Wed, (9, 0), (10, 0), "Review")];
        assert!(has_any_entry(&entries, date(2024, 6, 5)));
        assert!(has_any_entry(&entries, date(2025, 12, 3)));
        assert!(!has_any_entry(&entries, date(2024, 6, 6)));

        let entries = vec![once(date(2024, 6, 5), (9, 0), (10, 0), "Dentist")];
        assert!(has_any_entry(&entries, date(2024, 6, 5)));
        assert!(!has_any_entry(&entries, date(2024, 6, 12)));
    }

    #[test]
    fn ongoing_entry_is_still_next() {
        let entries = vec![
            once(monday(), (9, 0), (10, 0), "A"),
            once(monday(), (11, 0), (12, 0), "B"),
        ];
        let next = next_occurrence(&entries, at(monday(), 9, 45)).expect("should find next");
        assert_eq!(next.entry.heading, "A");
    }

    #[test]
    fn ended_entry_is_skipped_for_next() {
        let entries = vec![
            once(monday(), (9, 0), (10, 0), "A"),
            once(monday(), (11, 0), (12, 0), "B"),
        ];
        let next = next_occurrence(&entries, at(monday(), 10, 15)).expect("should find next");
        assert_eq!(next.entry.heading, "B");
    }

    #[test]
    fn next_prefers_earliest_date_then_start() {
        let entries = vec![
            weekly(Weekday::Fri, (8, 0), (9, 0), "Friday"),
            weekly(Weekday::Tue, (15, 0), (16, 0), "Tuesday late"),
            weekly(Weekday::Tue, (9, 0), (10, 0), "Tuesday early"),
        ];
        let next = next_occurrence(&entries, at(monday(), 12, 0)).expect("should find next");
        assert_eq!(next.entry.heading, "Tuesday early");
    }

    #[test]
    fn next_is_none_when_week_is_exhausted() {
        let entries = vec![once(monday(), (9, 0), (10, 0), "A")];
        assert!(next_occurrence(&entries, at(monday(), 10, 0)).is_none());
        assert!(next_occurrence(&entries, at(date(2024, 6, 4), 8, 0)).is_none());
    }

    #[test]
    fn weekly_conflicts_with_once_on_same_weekday() {
        let existing = vec![weekly(Weekday::Mon, (9, 0), (10, 0), "Standup")];
        let proposal = once(monday(), (9, 30), (10, 30), "Clash");
        match check_entry(&existing, &proposal, None) {
            Err(ScheduleError::TimeConflict(entry)) => assert_eq!(entry.heading, "Standup"),
            other => panic!("expected time conflict, got {other:?}"),
        }
    }

    #[test]
    fn conflict_detection_is_symmetric() {
        let standup = weekly(Weekday::Mon, (9, 0), (10, 0), "Standup");
        let clash = once(monday(), (9, 30), (10, 30), "Clash");
        assert!(matches!(
            check_entry(std::slice::from_ref(&standup), &clash, None),
            Err(ScheduleError::TimeConflict(_))
        ));
        assert!(matches!(
            check_entry(std::slice::from_ref(&clash), &standup, None),
            Err(ScheduleError::TimeConflict(_))
        ));
    }

    #[test]
    fn once_entries_on_different_dates_never_conflict() {
        // Same weekday one week apart, same time slot.
        let existing = vec![once(monday(), (9, 0), (10, 0), "This week")];
        let proposal = once(date(2024, 6, 10), (9, 0), (10, 0), "Next week");
        assert!(check_entry(&existing, &proposal, None).is_ok());
    }

    #[test]
    fn non_overlapping_times_never_conflict() {
        let existing = vec![weekly(Weekday::Mon, (9, 0), (10, 0), "Standup")];
        let proposal = weekly(Weekday::Mon, (10, 0), (11, 0), "After");
        assert!(check_entry(&existing, &proposal, None).is_ok());
    }

    #[test]
    fn rest_window_rejection_reports_first_window_hit() {
        let proposal = once(date(2024, 6, 5), (12, 30), (12, 45), "Lunch");
        match check_entry(&[], &proposal, None) {
            Err(ScheduleError::RestWindowConflict(window)) => {
                assert_eq!(window.start, clock(12, 0));
                assert_eq!(window.end, clock(13, 0));
            }
            other => panic!("expected rest window conflict, got {other:?}"),
        }
    }

    #[test]
    fn rest_window_check_runs_before_conflict_scan() {
        let existing = vec![once(date(2024, 6, 5), (11, 0), (13, 30), "Already there")];
        let proposal = once(date(2024, 6, 5), (12, 30), (13, 30), "Late lunch");
        assert!(matches!(
            check_entry(&existing, &proposal, None),
            Err(ScheduleError::RestWindowConflict(_))
        ));
    }

    #[test]
    fn early_morning_overlaps_the_night_rest_window() {
        let proposal = once(date(2024, 6, 5), (5, 30), (6, 30), "Too early");
        match check_entry(&[], &proposal, None) {
            Err(ScheduleError::RestWindowConflict(window)) => {
                assert_eq!(window.start, clock(0, 0));
                assert_eq!(window.end, clock(6, 0));
            }
            other => panic!("expected rest window conflict, got {other:?}"),
        }
    }

    #[test]
    fn editing_skips_the_entry_at_its_own_index() {
        let existing = vec![weekly(Weekday::Mon, (9, 0), (10, 0), "Standup")];
        let edited = weekly(Weekday::Mon, (9, 15), (10, 15), "Standup moved");
        assert!(matches!(
            check_entry(&existing, &edited, None),
            Err(ScheduleError::TimeConflict(_))
        ));
        assert!(check_entry(&existing, &edited, Some(0)).is_ok());
    }

    #[test]
    fn first_conflicting_entry_in_collection_order_wins() {
        let existing = vec![
            weekly(Weekday::Mon, (9, 0), (10, 0), "First"),
            weekly(Weekday::Mon, (9, 30), (10, 30), "Second"),
        ];
        let proposal = weekly(Weekday::Mon, (9, 45), (10, 45), "Proposal");
        match check_entry(&existing, &proposal, None) {
            Err(ScheduleError::TimeConflict(entry)) => assert_eq!(entry.heading, "First"),
            other => panic!("expected time conflict, got {other:?}"),
        }
    }

    #[test]
    fn weekly_upcoming_date_counts_today() {
        let wednesday = date(2024, 6, 5);
        assert_eq!(
            upcoming_date(Recurrence::Weekly { weekday: Weekday::Wed }, wednesday),
            wednesday
        );
        assert_eq!(
            upcoming_date(Recurrence::Weekly { weekday: Weekday::Tue }, wednesday),
            date(2024, 6, 11)
        );
        assert_eq!(
            upcoming_date(Recurrence::Once { date: monday() }, wednesday),
            monday()
        );
    }

    #[test]
    fn countdown_classifies_before_during_and_after() {
        let entry = once(monday(), (9, 0), (10, 0), "A");
        assert_eq!(
            countdown(&entry, at(monday(), 8, 30)),
            Countdown::StartsIn(Duration::minutes(30))
        );
        assert_eq!(
            countdown(&entry, at(monday(), 9, 40)),
            Countdown::EndsIn(Duration::minutes(20))
        );
        assert_eq!(countdown(&entry, at(monday(), 10, 1)), Countdown::Completed);
    }

    #[test]
    fn weekly_countdown_rolls_to_next_week_after_ending() {
        let entry = weekly(Weekday::Mon, (9, 0), (10, 0), "Standup");
        // Still today's occurrence while ongoing.
        assert_eq!(
            countdown(&entry, at(monday(), 9, 30)),
            Countdown::EndsIn(Duration::minutes(30))
        );
        // After today's slot the anchor stays on today, so it reads completed;
        // the next tick past midnight counts down to next Monday.
        assert_eq!(countdown(&entry, at(monday(), 11, 0)), Countdown::Completed);
        assert_eq!(
            countdown(&entry, at(date(2024, 6, 4), 9, 0)),
            Countdown::StartsIn(Duration::days(6))
        );
    }
}
