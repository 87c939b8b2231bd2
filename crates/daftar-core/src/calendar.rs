//! Working-day and Hijri calendar predicates.
//!
//! The merchant closes on Fridays and official holidays; seasonal demand
//! follows the Hijri months of Sha'ban and Ramadan. Gregorian→Hijri
//! conversion goes through `icu_calendar`'s Islamic civil calendar.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use icu_calendar::islamic::IslamicCivil;
use icu_calendar::Date;
use std::collections::HashSet;

/// Hijri month number for Sha'ban.
pub const SHAABAN: u8 = 8;
/// Hijri month number for Ramadan.
pub const RAMADAN: u8 = 9;

/// True when the merchant trades on this date: any day except Friday that is
/// not an official holiday.
#[must_use]
pub fn is_working_day(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> bool {
    date.weekday() != Weekday::Fri && !holidays.contains(&date)
}

/// Hijri month ordinal (1..=12) for a Gregorian date, or `None` when the date
/// is outside the convertible range.
#[must_use]
pub fn hijri_month(date: NaiveDate) -> Option<u8> {
    let iso = Date::try_new_iso_date(
        date.year(),
        u8::try_from(date.month()).ok()?,
        u8::try_from(date.day()).ok()?,
    )
    .ok()?;
    let hijri = iso.to_calendar(IslamicCivil::new());
    Some(hijri.month().ordinal as u8)
}

/// True when the date falls in Ramadan (Hijri month 9).
#[must_use]
pub fn is_ramadan(date: NaiveDate) -> bool {
    hijri_month(date) == Some(RAMADAN)
}

/// True when the date falls in Sha'ban (Hijri month 8).
#[must_use]
pub fn is_shaaban(date: NaiveDate) -> bool {
    hijri_month(date) == Some(SHAABAN)
}

/// Whole days from `a` to `b` (positive when `b` is later).
#[must_use]
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// All dates in `[start, end]`, inclusive on both ends.
#[must_use]
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

/// Working days in `[start, end]`, in chronological order.
#[must_use]
pub fn working_days(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &HashSet<NaiveDate>,
) -> Vec<NaiveDate> {
    date_range(start, end)
        .into_iter()
        .filter(|d| is_working_day(*d, holidays))
        .collect()
}

/// Local timestamp on `date` at `(hour, minute)`.
///
/// Hour and minute are clamped to valid ranges rather than panicking; the
/// generators only produce values inside trading hours.
#[must_use]
pub fn at_time(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0)
        .unwrap_or(NaiveTime::MIN);
    NaiveDateTime::new(date, time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fridays_are_closed() {
        let holidays = HashSet::new();
        // 2024-06-14 was a Friday
        assert!(!is_working_day(date(2024, 6, 14), &holidays));
        // 2024-06-15 was a Saturday
        assert!(is_working_day(date(2024, 6, 15), &holidays));
    }

    #[test]
    fn holidays_are_closed() {
        let mut holidays = HashSet::new();
        holidays.insert(date(2024, 6, 16));
        assert!(!is_working_day(date(2024, 6, 16), &holidays));
        assert!(is_working_day(date(2024, 6, 17), &holidays));
    }

    #[test]
    fn ramadan_1445_detected() {
        // Ramadan 1445 began around 2024-03-11 on the civil calendar
        assert!(is_ramadan(date(2024, 3, 20)));
        assert!(!is_ramadan(date(2024, 5, 1)));
    }

    #[test]
    fn shaaban_1445_detected() {
        // Sha'ban 1445 spans mid-February to early March 2024
        assert!(is_shaaban(date(2024, 2, 20)));
        assert!(!is_shaaban(date(2024, 6, 1)));
    }

    #[test]
    fn range_is_inclusive() {
        let range = date_range(date(2024, 1, 30), date(2024, 2, 2));
        assert_eq!(
            range,
            vec![
                date(2024, 1, 30),
                date(2024, 1, 31),
                date(2024, 2, 1),
                date(2024, 2, 2)
            ]
        );
        assert_eq!(days_between(date(2024, 1, 30), date(2024, 2, 2)), 3);
    }

    #[test]
    fn working_days_skip_fridays_and_holidays() {
        let mut holidays = HashSet::new();
        holidays.insert(date(2024, 6, 16));
        // 2024-06-13 Thu .. 2024-06-17 Mon; Friday 14th and holiday 16th drop out
        let days = working_days(date(2024, 6, 13), date(2024, 6, 17), &holidays);
        assert_eq!(
            days,
            vec![date(2024, 6, 13), date(2024, 6, 15), date(2024, 6, 17)]
        );
    }

    #[test]
    fn timestamps_are_constructed_in_place() {
        let ts = at_time(date(2024, 3, 12), 18, 45);
        assert_eq!(ts.to_string(), "2024-03-12 18:45:00");
    }
}
