//! Date/time resolution for reminders.
//!
//! Turns free-form fragments ("tomorrow", "next monday", "2:30 pm",
//! "bedtime") into `YYYY-MM-DD` / `HH:MM`. Resolution never fails: anything
//! that cannot be parsed falls through to a task-aware default derived from
//! the reminder title and the current wall-clock time.
//!
//! Both entry points are pure functions of `(raw, title, now)`.

use once_cell::sync::Lazy;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Weekday};
use regex::Regex;

// ============================================================================
// Keyword tables
// ============================================================================

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

static MEDICINE: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(medicines?|medications?|meds|pills?|vitamins?|drugs?|treatment|tablets?|doses?|insulin|inhaler)\b")
});
static APPOINTMENT: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(appointments?|meetings?|doctor|dentist|visit|check-?up|clinic)\b")
});
static WORK: Lazy<Regex> = Lazy::new(|| re(r"\b(work|office)\b"));
static EXERCISE: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(workout|exercise|gym|walk|run|jog|jogging|yoga|stretch|stretching)\b")
});
static SHOPPING: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(shopping|shop|grocery|groceries|buy|errands?|store|pick up)\b")
});
static SLEEP: Lazy<Regex> = Lazy::new(|| re(r"\b(sleep|bed|bedtime)\b"));
static WAKE: Lazy<Regex> = Lazy::new(|| re(r"\b(wake|waking|get up)\b"));
static BREAKFAST: Lazy<Regex> = Lazy::new(|| re(r"\bbreakfast\b"));
static LUNCH: Lazy<Regex> = Lazy::new(|| re(r"\blunch\b"));
static DINNER: Lazy<Regex> = Lazy::new(|| re(r"\b(dinner|supper)\b"));
static EVENING_HINT: Lazy<Regex> = Lazy::new(|| re(r"\b(evening|night|tonight)\b"));
static MORNING_HINT: Lazy<Regex> = Lazy::new(|| re(r"\bmorning\b"));

// ============================================================================
// Parsing patterns
// ============================================================================

static ISO_DATE: Lazy<Regex> = Lazy::new(|| re(r"^\d{4}-\d{1,2}-\d{1,2}$"));
static DAY_AFTER_TOMORROW: Lazy<Regex> =
    Lazy::new(|| re(r"\bday after tomorrow\b"));
static TODAY: Lazy<Regex> = Lazy::new(|| re(r"\b(today|tonight)\b"));
static TOMORROW: Lazy<Regex> = Lazy::new(|| re(r"\btomorrow\b"));
static YESTERDAY: Lazy<Regex> = Lazy::new(|| re(r"\byesterday\b"));
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
});
static NEXT_WEEK: Lazy<Regex> = Lazy::new(|| re(r"\bnext week\b"));
static THIS_WEEK: Lazy<Regex> = Lazy::new(|| re(r"\bthis week\b"));
static ORDINAL: Lazy<Regex> = Lazy::new(|| re(r"(\d+)(st|nd|rd|th)\b"));
static NUMBER: Lazy<Regex> = Lazy::new(|| re(r"\d+"));

static EXACT_TIME: Lazy<Regex> = Lazy::new(|| re(r"^(\d{1,2}):(\d{2})$"));
static MERIDIEM_TIME: Lazy<Regex> =
    Lazy::new(|| re(r"\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s?m\b"));
static EMBEDDED_TIME: Lazy<Regex> = Lazy::new(|| re(r"\b(\d{1,2}):(\d{2})\b"));
static BARE_HOUR: Lazy<Regex> = Lazy::new(|| re(r"\b(\d{1,2})\b"));

/// Calendar formats tried in order. All expect the full string.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
];

/// Formats without a year; the current year is appended before parsing.
const YEARLESS_FORMATS: &[&str] = &["%m/%d", "%B %d", "%d %B"];

/// Time keywords, most specific first ("midnight" before "night").
static TIME_KEYWORDS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\bmidnight\b", "00:00"),
        (r"\b(noon|midday)\b", "12:00"),
        (r"\bbreakfast\b", "08:00"),
        (r"\blunch\b", "12:30"),
        (r"\b(dinner|supper)\b", "19:00"),
        (r"\bbed ?time\b", "22:00"),
        (r"\bmorning\b", "09:00"),
        (r"\bafternoon\b", "15:00"),
        (r"\bevening\b", "19:00"),
        (r"\b(to)?night\b", "20:00"),
    ]
    .into_iter()
    .map(|(pattern, hhmm)| (re(pattern), hhmm))
    .collect()
});

/// Bare hours in this range are read as afternoon/evening ("at 9" → 21:00).
const PM_BIAS_HOURS: std::ops::RangeInclusive<u32> = 1..=11;

/// Meal cutoffs: once the hour passes, the meal is scheduled for tomorrow.
const BREAKFAST_CUTOFF: u32 = 10;
const LUNCH_CUTOFF: u32 = 14;
const DINNER_CUTOFF: u32 = 21;

/// Upper bound on the weekend-skipping search for appointment defaults.
const BUSINESS_DAY_SEARCH_LIMIT: usize = 7;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Resolve a date fragment to `YYYY-MM-DD`.
pub fn resolve_date(raw: Option<&str>, title: &str, now: NaiveDateTime) -> String {
    raw.map(str::trim)
        .filter(|s| !is_null_like(s))
        .and_then(|s| parse_date(s, now.date()))
        .unwrap_or_else(|| default_date(title, now))
        .format("%Y-%m-%d")
        .to_string()
}

/// Resolve a time fragment to `HH:MM` (24-hour, zero padded).
pub fn resolve_time(raw: Option<&str>, title: &str, now: NaiveDateTime) -> String {
    raw.map(str::trim)
        .filter(|s| !is_null_like(s))
        .and_then(parse_time)
        .unwrap_or_else(|| default_time(title, now))
}

/// Render `HH:MM` as a 12-hour string for user-facing messages ("9:00 AM").
pub fn display_time(hhmm: &str) -> String {
    let Some((h, m)) = hhmm.split_once(':') else {
        return hhmm.to_string();
    };
    let (Ok(h), Ok(m)) = (h.parse::<u32>(), m.parse::<u32>()) else {
        return hhmm.to_string();
    };
    let meridiem = if h < 12 { "AM" } else { "PM" };
    let h12 = match h % 12 {
        0 => 12,
        other => other,
    };
    format!("{}:{:02} {}", h12, m, meridiem)
}

/// Values the model or a client may send instead of leaving a field out.
pub fn is_null_like(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || ["null", "none", "undefined", "n/a"].iter().any(|n| s.eq_ignore_ascii_case(n))
}

// ============================================================================
// Date parsing
// ============================================================================

fn parse_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = raw.to_lowercase();

    if ISO_DATE.is_match(&lower) {
        if let Ok(d) = NaiveDate::parse_from_str(&lower, "%Y-%m-%d") {
            return Some(d);
        }
    }

    if DAY_AFTER_TOMORROW.is_match(&lower) {
        return Some(today + Duration::days(2));
    }
    if TOMORROW.is_match(&lower) {
        return Some(today + Duration::days(1));
    }
    if TODAY.is_match(&lower) {
        return Some(today);
    }
    if YESTERDAY.is_match(&lower) {
        return Some(today - Duration::days(1));
    }

    if let Some(caps) = WEEKDAY.captures(&lower) {
        if let Ok(weekday) = caps[1].parse::<Weekday>() {
            return Some(next_weekday(today, weekday));
        }
    }

    if NEXT_WEEK.is_match(&lower) {
        return Some(next_weekday(today, Weekday::Mon));
    }
    if THIS_WEEK.is_match(&lower) {
        return Some(today + Duration::days(1));
    }

    let cleaned = ORDINAL.replace_all(&lower, "$1").trim().to_string();
    if let Some(d) = parse_calendar_formats(&cleaned, today.year()) {
        return Some(d);
    }

    parse_bare_numbers(&cleaned, today.year())
}

/// Next occurrence strictly after `today`; naming today's weekday means a week out.
fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let mut ahead = (wanted - current).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(ahead)
}

fn parse_calendar_formats(s: &str, year: i32) -> Option<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    let with_year = format!("{} {}", s, year);
    for fmt in YEARLESS_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&with_year, &format!("{} %Y", fmt)) {
            return Some(d);
        }
    }
    None
}

fn parse_bare_numbers(s: &str, year: i32) -> Option<NaiveDate> {
    let nums: Vec<u32> = NUMBER
        .find_iter(s)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    match nums.as_slice() {
        [month, day] => NaiveDate::from_ymd_opt(year, *month, *day),
        [month, day, y, ..] => {
            let y = if *y < 100 { 2000 + *y } else { *y };
            NaiveDate::from_ymd_opt(i32::try_from(y).ok()?, *month, *day)
        }
        _ => None,
    }
}

// ============================================================================
// Time parsing
// ============================================================================

fn parse_time(raw: &str) -> Option<String> {
    let lower = raw.to_lowercase();

    if let Some(caps) = EXACT_TIME.captures(&lower) {
        if let Some(t) = hh_mm(&caps[1], &caps[2]) {
            return Some(t);
        }
    }

    if let Some((_, t)) = TIME_KEYWORDS.iter().find(|(kw, _)| kw.is_match(&lower)) {
        return Some((*t).to_string());
    }

    if let Some(caps) = MERIDIEM_TIME.captures(&lower) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        if (1..=12).contains(&hour) && minute < 60 {
            let hour = match (&caps[3], hour) {
                ("a", 12) => 0,
                ("a", h) => h,
                ("p", 12) => 12,
                (_, h) => h + 12,
            };
            return Some(format!("{:02}:{:02}", hour, minute));
        }
    }

    if let Some(caps) = EMBEDDED_TIME.captures(&lower) {
        if let Some(t) = hh_mm(&caps[1], &caps[2]) {
            return Some(t);
        }
    }

    if let Some(caps) = BARE_HOUR.captures(&lower) {
        let hour: u32 = caps[1].parse().ok()?;
        if hour <= 23 {
            let hour = if PM_BIAS_HOURS.contains(&hour) { hour + 12 } else { hour };
            return Some(format!("{:02}:00", hour));
        }
    }

    None
}

fn hh_mm(h: &str, m: &str) -> Option<String> {
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour <= 23 && minute <= 59).then(|| format!("{:02}:{:02}", hour, minute))
}

// ============================================================================
// Task-aware defaults
// ============================================================================

fn default_date(title: &str, now: NaiveDateTime) -> NaiveDate {
    let t = title.to_lowercase();
    let hour = now.hour();
    let today = now.date();
    let tomorrow = today + Duration::days(1);
    let today_unless = |cutoff: u32| if hour >= cutoff { tomorrow } else { today };

    if MEDICINE.is_match(&t) {
        if hour >= 18 {
            return tomorrow;
        }
        return if EVENING_HINT.is_match(&t) { today } else { tomorrow };
    }
    if APPOINTMENT.is_match(&t) {
        return next_business_day(today);
    }
    if BREAKFAST.is_match(&t) {
        return today_unless(BREAKFAST_CUTOFF);
    }
    if LUNCH.is_match(&t) {
        return today_unless(LUNCH_CUTOFF);
    }
    if DINNER.is_match(&t) {
        return today_unless(DINNER_CUTOFF);
    }
    if EXERCISE.is_match(&t) {
        return today_unless(20);
    }
    if SHOPPING.is_match(&t) {
        return today_unless(19);
    }
    today_unless(18)
}

fn next_business_day(today: NaiveDate) -> NaiveDate {
    let mut day = today + Duration::days(1);
    for _ in 0..BUSINESS_DAY_SEARCH_LIMIT {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            return day;
        }
        day += Duration::days(1);
    }
    day
}

fn default_time(title: &str, now: NaiveDateTime) -> String {
    let t = title.to_lowercase();

    let canonical = if MEDICINE.is_match(&t) {
        if EVENING_HINT.is_match(&t) {
            "20:00"
        } else if MORNING_HINT.is_match(&t) {
            "08:00"
        } else {
            "09:00"
        }
    } else if BREAKFAST.is_match(&t) {
        "08:00"
    } else if LUNCH.is_match(&t) {
        "12:30"
    } else if DINNER.is_match(&t) {
        "19:00"
    } else if APPOINTMENT.is_match(&t) || WORK.is_match(&t) {
        "10:00"
    } else if EXERCISE.is_match(&t) {
        if EVENING_HINT.is_match(&t) {
            "18:00"
        } else {
            "07:00"
        }
    } else if SHOPPING.is_match(&t) {
        "14:00"
    } else if SLEEP.is_match(&t) {
        "22:00"
    } else if WAKE.is_match(&t) {
        "07:00"
    } else {
        time_of_day_bucket(now.hour())
    };
    canonical.to_string()
}

fn time_of_day_bucket(hour: u32) -> &'static str {
    match hour {
        5..=8 => "09:00",
        9..=11 => "10:00",
        12..=13 => "15:00",
        14..=16 => "16:00",
        17..=19 => "19:00",
        _ => "09:00",
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 2026-10-14 is a Wednesday.
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn date(raw: &str, title: &str, now: NaiveDateTime) -> String {
        resolve_date(Some(raw), title, now)
    }

    fn time(raw: &str) -> String {
        resolve_time(Some(raw), "", at(14, 10, 0))
    }

    // --- explicit dates ---

    #[test]
    fn test_iso_date_passes_through_normalized() {
        assert_eq!(date("2026-12-01", "", at(14, 10, 0)), "2026-12-01");
        assert_eq!(date("2026-1-5", "", at(14, 10, 0)), "2026-01-05");
    }

    #[test]
    fn test_invalid_iso_date_falls_back_to_default() {
        // Feb 30 does not exist; generic default at 10:00 is today
        assert_eq!(date("2026-02-30", "", at(14, 10, 0)), "2026-10-14");
    }

    #[test]
    fn test_relative_words() {
        let now = at(14, 10, 0);
        assert_eq!(date("today", "", now), "2026-10-14");
        assert_eq!(date("tomorrow", "", now), "2026-10-15");
        assert_eq!(date("yesterday", "", now), "2026-10-13");
        assert_eq!(date("the day after tomorrow", "", now), "2026-10-16");
        assert_eq!(date("Tomorrow Morning", "", now), "2026-10-15");
    }

    #[test]
    fn test_same_weekday_rolls_a_full_week() {
        assert_eq!(date("wednesday", "", at(14, 10, 0)), "2026-10-21");
    }

    #[test]
    fn test_weekday_names_resolve_forward() {
        let now = at(14, 10, 0);
        assert_eq!(date("friday", "", now), "2026-10-16");
        assert_eq!(date("next monday", "", now), "2026-10-19");
        assert_eq!(date("tuesday", "", now), "2026-10-20");
    }

    #[test]
    fn test_week_phrases() {
        let now = at(14, 10, 0);
        assert_eq!(date("next week", "", now), "2026-10-19");
        assert_eq!(date("sometime this week", "", now), "2026-10-15");
    }

    #[test]
    fn test_calendar_format_table() {
        let now = at(14, 10, 0);
        assert_eq!(date("12/25/2026", "", now), "2026-12-25");
        assert_eq!(date("25/12/2026", "", now), "2026-12-25");
        assert_eq!(date("11-03-2026", "", now), "2026-11-03");
        assert_eq!(date("2027/01/02", "", now), "2027-01-02");
        assert_eq!(date("December 5, 2026", "", now), "2026-12-05");
        assert_eq!(date("5th december 2026", "", now), "2026-12-05");
        assert_eq!(date("12/25", "", now), "2026-12-25");
    }

    #[test]
    fn test_bare_number_fallback() {
        let now = at(14, 10, 0);
        assert_eq!(date("on 3 4", "", now), "2026-03-04");
        assert_eq!(date("3 4 27", "", now), "2027-03-04");
    }

    // --- date defaults ---

    #[test]
    fn test_date_never_empty() {
        let now = at(14, 10, 0);
        for raw in [None, Some(""), Some("   "), Some("null"), Some("None"), Some("gibberish")] {
            let d = resolve_date(raw, "", now);
            assert_eq!(d.len(), 10, "expected YYYY-MM-DD for {:?}, got {}", raw, d);
        }
    }

    #[test]
    fn test_medicine_defaults_to_tomorrow() {
        assert_eq!(resolve_date(None, "take medicine", at(14, 19, 0)), "2026-10-15");
        assert_eq!(resolve_date(None, "take medicine", at(14, 10, 0)), "2026-10-15");
        assert_eq!(resolve_date(None, "vitamin D", at(14, 8, 0)), "2026-10-15");
    }

    #[test]
    fn test_medicine_tonight_hint_keeps_today() {
        assert_eq!(resolve_date(None, "evening pills", at(14, 10, 0)), "2026-10-14");
        assert_eq!(resolve_date(None, "pills tonight", at(14, 18, 30)), "2026-10-15");
    }

    #[test]
    fn test_appointment_skips_weekends() {
        // Friday → Monday
        assert_eq!(resolve_date(None, "doctor appointment", at(16, 9, 0)), "2026-10-19");
        // Saturday → Monday
        assert_eq!(resolve_date(None, "dentist", at(17, 9, 0)), "2026-10-19");
        // Wednesday → Thursday
        assert_eq!(resolve_date(None, "team meeting", at(14, 9, 0)), "2026-10-15");
    }

    #[test]
    fn test_meal_cutoffs() {
        assert_eq!(resolve_date(None, "breakfast", at(14, 8, 0)), "2026-10-14");
        assert_eq!(resolve_date(None, "breakfast", at(14, 10, 0)), "2026-10-15");
        assert_eq!(resolve_date(None, "lunch with Sam", at(14, 13, 0)), "2026-10-14");
        assert_eq!(resolve_date(None, "dinner", at(14, 21, 30)), "2026-10-15");
    }

    #[test]
    fn test_exercise_and_shopping_cutoffs() {
        assert_eq!(resolve_date(None, "gym", at(14, 19, 0)), "2026-10-14");
        assert_eq!(resolve_date(None, "gym", at(14, 20, 0)), "2026-10-15");
        assert_eq!(resolve_date(None, "buy groceries", at(14, 18, 0)), "2026-10-14");
        assert_eq!(resolve_date(None, "buy groceries", at(14, 19, 0)), "2026-10-15");
    }

    #[test]
    fn test_generic_evening_rollover() {
        assert_eq!(resolve_date(None, "call mom", at(14, 17, 59)), "2026-10-14");
        assert_eq!(resolve_date(None, "call mom", at(14, 18, 0)), "2026-10-15");
    }

    // --- explicit times ---

    #[test]
    fn test_exact_times_are_padded() {
        assert_eq!(time("7:05"), "07:05");
        assert_eq!(time("19:45"), "19:45");
    }

    #[test]
    fn test_meridiem_times() {
        assert_eq!(time("2:30 PM"), "14:30");
        assert_eq!(time("at 10am"), "10:00");
        assert_eq!(time("8 p.m."), "20:00");
        assert_eq!(time("12 AM"), "00:00");
        assert_eq!(time("12 pm"), "12:00");
    }

    #[test]
    fn test_time_keywords() {
        assert_eq!(time("midnight"), "00:00");
        assert_eq!(time("noon"), "12:00");
        assert_eq!(time("lunch"), "12:30");
        assert_eq!(time("tonight"), "20:00");
        assert_eq!(time("in the afternoon"), "15:00");
    }

    #[test]
    fn test_bare_hour_pm_bias() {
        assert_eq!(time("9"), "21:00");
        assert_eq!(time("at 3"), "15:00");
        assert_eq!(time("0"), "00:00");
        assert_eq!(time("13"), "13:00");
    }

    #[test]
    fn test_invalid_time_uses_task_default() {
        assert_eq!(resolve_time(Some("25:00"), "take medicine", at(14, 10, 0)), "09:00");
    }

    // --- time defaults ---

    #[test]
    fn test_canonical_task_times() {
        let now = at(14, 13, 0);
        assert_eq!(resolve_time(None, "morning medicine", now), "08:00");
        assert_eq!(resolve_time(None, "medicine", now), "09:00");
        assert_eq!(resolve_time(None, "night medication", now), "20:00");
        assert_eq!(resolve_time(None, "breakfast", now), "08:00");
        assert_eq!(resolve_time(None, "lunch", now), "12:30");
        assert_eq!(resolve_time(None, "dinner", now), "19:00");
        assert_eq!(resolve_time(None, "doctor appointment", now), "10:00");
        assert_eq!(resolve_time(None, "work", now), "10:00");
        assert_eq!(resolve_time(None, "gym", now), "07:00");
        assert_eq!(resolve_time(None, "evening walk", now), "18:00");
        assert_eq!(resolve_time(None, "grocery shopping", now), "14:00");
        assert_eq!(resolve_time(None, "go to bed", now), "22:00");
        assert_eq!(resolve_time(None, "wake up", now), "07:00");
    }

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(resolve_time(None, "call mom", at(14, 6, 0)), "09:00");
        assert_eq!(resolve_time(None, "call mom", at(14, 10, 0)), "10:00");
        assert_eq!(resolve_time(None, "call mom", at(14, 13, 0)), "15:00");
        assert_eq!(resolve_time(None, "call mom", at(14, 15, 0)), "16:00");
        assert_eq!(resolve_time(None, "call mom", at(14, 18, 0)), "19:00");
        assert_eq!(resolve_time(None, "call mom", at(14, 22, 0)), "09:00");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let now = at(14, 18, 42);
        for (raw, title) in [(Some("friday"), "pills"), (None, "lunch"), (Some("xyz"), "")] {
            assert_eq!(resolve_date(raw, title, now), resolve_date(raw, title, now));
            assert_eq!(resolve_time(raw, title, now), resolve_time(raw, title, now));
        }
    }

    #[test]
    fn test_display_time() {
        assert_eq!(display_time("00:00"), "12:00 AM");
        assert_eq!(display_time("09:05"), "9:05 AM");
        assert_eq!(display_time("12:30"), "12:30 PM");
        assert_eq!(display_time("21:00"), "9:00 PM");
        assert_eq!(display_time("bogus"), "bogus");
    }
}
