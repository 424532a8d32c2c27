use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::{AppError, AppResult};

/// Longest recurrence accepted in one request, counted from the first session.
pub const MAX_RECURRENCE_DAYS: i64 = 366;

/// Maps ISO weekday numbers (Monday = 1 .. Sunday = 7).
pub fn weekday_from_number(number: i32) -> Option<Weekday> {
    match number {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Explicit weekdays when given, otherwise the weekday of the first session.
pub fn resolve_weekdays(first: NaiveDate, requested: Option<&[i32]>) -> AppResult<HashSet<Weekday>> {
    match requested {
        Some(numbers) if !numbers.is_empty() => numbers
            .iter()
            .map(|number| {
                weekday_from_number(*number).ok_or_else(|| {
                    AppError::validation(format!(
                        "invalid weekday {number}; expected 1 (Monday) to 7 (Sunday)"
                    ))
                })
            })
            .collect(),
        _ => Ok(HashSet::from([first.weekday()])),
    }
}

/// Every date in `[first, last]` falling on one of `weekdays`, in order.
pub fn expand_dates(
    first: NaiveDate,
    last: NaiveDate,
    weekdays: &HashSet<Weekday>,
) -> AppResult<Vec<NaiveDate>> {
    let span = (last - first).num_days();
    if span > MAX_RECURRENCE_DAYS {
        return Err(AppError::validation(format!(
            "recurrence may cover at most {MAX_RECURRENCE_DAYS} days, got {span}"
        )));
    }
    Ok(first
        .iter_days()
        .take_while(|date| *date <= last)
        .filter(|date| weekdays.contains(&date.weekday()))
        .collect())
}
