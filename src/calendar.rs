use chrono::{Datelike, NaiveDate, TimeZone, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

/// Intraday session window, not to be confused with `domain::Session`
/// (AM/PM evaluation epoch) — this tracks the full trading-day timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketPhase {
    Pre,
    Am,
    Mid,
    Pm,
    Post,
}

pub fn now() -> chrono::DateTime<Tz> {
    chrono::Utc::now().with_timezone(&New_York)
}

/// Current intraday phase for a given local-exchange-zone timestamp.
pub fn today_session(t: chrono::DateTime<Tz>) -> MarketPhase {
    let minutes = t.hour() * 60 + t.minute();
    match minutes {
        m if m < 9 * 60 + 30 => MarketPhase::Pre,
        m if m < 12 * 60 => MarketPhase::Am,
        m if m < 14 * 60 + 30 => MarketPhase::Mid,
        m if m < 16 * 60 + 30 => MarketPhase::Pm,
        _ => MarketPhase::Post,
    }
}

/// Computes the Gregorian Easter Sunday for `year` via the anonymous
/// algorithm, then returns the preceding Friday (Good Friday, an NYSE
/// holiday even though Easter itself is not a trading-calendar date).
fn good_friday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    let easter = NaiveDate::from_ymd_opt(year, month as u32, day as u32).expect("valid easter date");
    easter - chrono::Duration::days(2)
}

fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month");
    let offset = (7 + weekday.num_days_from_monday() as i64 - first.weekday().num_days_from_monday() as i64) % 7;
    first + chrono::Duration::days(offset + 7 * (n as i64 - 1))
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).expect("valid month")
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).expect("valid month")
    };
    let last_day = next_month_first - chrono::Duration::days(1);
    let offset = (7 + last_day.weekday().num_days_from_monday() as i64 - weekday.num_days_from_monday() as i64) % 7;
    last_day - chrono::Duration::days(offset)
}

/// Observed NYSE holiday dates for `year`, applying the weekend-observation
/// rule (Saturday holidays move to the prior Friday, Sunday holidays move
/// to the following Monday).
fn holidays(year: i32) -> Vec<NaiveDate> {
    let fixed = [
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(year, 6, 19).unwrap(),
        NaiveDate::from_ymd_opt(year, 7, 4).unwrap(),
        NaiveDate::from_ymd_opt(year, 12, 25).unwrap(),
    ];

    let floating = [
        nth_weekday_of_month(year, 1, Weekday::Mon, 3),
        nth_weekday_of_month(year, 2, Weekday::Mon, 3),
        good_friday(year),
        last_weekday_of_month(year, 5, Weekday::Mon),
        nth_weekday_of_month(year, 9, Weekday::Mon, 1),
        nth_weekday_of_month(year, 11, Weekday::Thu, 4),
    ];

    fixed
        .into_iter()
        .map(observe_weekend)
        .chain(floating.into_iter())
        .collect()
}

fn observe_weekend(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - chrono::Duration::days(1),
        Weekday::Sun => date + chrono::Duration::days(1),
        _ => date,
    }
}

pub fn is_market_day(date: NaiveDate) -> bool {
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    !holidays(date.year()).contains(&date)
}

/// Earliest non-holiday weekday in `date`'s ISO week.
pub fn first_market_day_of_week(date: NaiveDate) -> NaiveDate {
    let monday = date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64);
    (0..7)
        .map(|offset| monday + chrono::Duration::days(offset))
        .find(|d| is_market_day(*d))
        .unwrap_or(monday)
}

pub fn is_first_market_day_of_week(date: NaiveDate) -> bool {
    is_market_day(date) && first_market_day_of_week(date) == date
}

/// Session auto-detection for manual runs without an explicit session flag.
pub fn infer_session(t: chrono::DateTime<Tz>) -> Option<crate::domain::Session> {
    let minutes = t.hour() * 60 + t.minute();
    if (9 * 60 + 30..12 * 60).contains(&minutes) {
        Some(crate::domain::Session::Am)
    } else if (12 * 60..16 * 60 + 30).contains(&minutes) {
        Some(crate::domain::Session::Pm)
    } else {
        None
    }
}

/// Resolves the next `America/New_York` instant at which `hhmm` ("HH:MM")
/// fires on or after `from`, skipping non-market days.
pub fn next_fire(hhmm: &str, from: chrono::DateTime<Tz>) -> Option<chrono::DateTime<Tz>> {
    let (hour, minute) = hhmm.split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;

    for offset in 0..14 {
        let candidate_date = from.date_naive() + chrono::Duration::days(offset);
        if !is_market_day(candidate_date) {
            continue;
        }
        let candidate = New_York
            .from_local_datetime(&candidate_date.and_hms_opt(hour, minute, 0)?)
            .single()?;
        if candidate >= from {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_years_day_2026_is_a_thursday_and_closed() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(d.weekday(), Weekday::Thu);
        assert!(!is_market_day(d));
    }

    #[test]
    fn juneteenth_observed_on_saturday_moves_to_friday() {
        // Juneteenth 2027-06-19 falls on a Saturday; NYSE observes the prior Friday.
        let actual = NaiveDate::from_ymd_opt(2027, 6, 19).unwrap();
        assert_eq!(actual.weekday(), Weekday::Sat);
        let observed = NaiveDate::from_ymd_opt(2027, 6, 18).unwrap();
        assert!(!is_market_day(observed));
        assert!(is_market_day(NaiveDate::from_ymd_opt(2027, 6, 21).unwrap()));
    }

    #[test]
    fn good_friday_2026_matches_known_date() {
        // Easter 2026 is April 5; Good Friday is April 3.
        assert_eq!(good_friday(2026), NaiveDate::from_ymd_opt(2026, 4, 3).unwrap());
    }

    #[test]
    fn thanksgiving_is_fourth_thursday_of_november() {
        let holidays_2026 = holidays(2026);
        assert!(holidays_2026.contains(&NaiveDate::from_ymd_opt(2026, 11, 26).unwrap()));
    }

    #[test]
    fn weekend_is_never_a_market_day() {
        assert!(!is_market_day(NaiveDate::from_ymd_opt(2026, 7, 25).unwrap()));
        assert!(!is_market_day(NaiveDate::from_ymd_opt(2026, 7, 26).unwrap()));
    }

    #[test]
    fn first_market_day_of_week_skips_new_years() {
        // 2026-01-01 (Thursday) is a holiday; the week's first market day is Jan 2.
        let week_day = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        assert_eq!(first_market_day_of_week(week_day), week_day);
        assert!(is_first_market_day_of_week(week_day));
    }
}
