// libs/scheduling-cell/src/services/recurrence.rs
//
// Shared occurrence expansion for recurrence patterns and recurring exceptions.

use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, warn};

use crate::models::{DateRange, Recurrence, RecurrenceRule};

/// Expands `recurrence` into the ordered, deduplicated dates that fall inside
/// `range`, clipped to the recurrence's own start/end dates.
///
/// The occurrence cap is counted from the recurrence start date, so a capped
/// series yields the same dates whatever range is queried. An invalid rule
/// yields nothing; the caller decides whether to surface that.
pub fn expand(recurrence: &Recurrence, range: &DateRange) -> Vec<NaiveDate> {
    if let Err(reason) = validate_rule(&recurrence.rule) {
        warn!(
            "Skipping {} recurrence starting {}: {}",
            recurrence.rule.kind(),
            recurrence.start_date,
            reason
        );
        return Vec::new();
    }

    if recurrence.max_occurrences == Some(0) {
        warn!("Recurrence starting {} has a zero occurrence cap", recurrence.start_date);
        return Vec::new();
    }

    let lower = range.start.max(recurrence.start_date);
    let upper = match recurrence.end_date {
        Some(end) => range.end.min(end),
        None => range.end,
    };
    if lower > upper {
        return Vec::new();
    }

    // Without a cap there is nothing to count, so walking can begin at the
    // query range instead of the series start.
    let walk_from = if recurrence.max_occurrences.is_some() {
        recurrence.start_date
    } else {
        lower
    };

    let mut occurrences = Vec::new();
    let mut emitted: u32 = 0;

    for date in walk_from.iter_days().take_while(|d| *d <= upper) {
        if !matches_rule(&recurrence.rule, recurrence.start_date, date) {
            continue;
        }

        emitted += 1;
        if date >= lower {
            occurrences.push(date);
        }

        if let Some(cap) = recurrence.max_occurrences {
            if emitted >= cap {
                break;
            }
        }
    }

    debug!(
        "Expanded {} recurrence over {}..={}: {} occurrences",
        recurrence.rule.kind(),
        range.start,
        range.end,
        occurrences.len()
    );

    occurrences
}

/// Checks the rule parameters without expanding anything.
pub fn validate_rule(rule: &RecurrenceRule) -> Result<(), String> {
    match rule {
        RecurrenceRule::Daily { interval } => check_interval(*interval),
        RecurrenceRule::Weekly {
            interval,
            days_of_week,
        } => {
            check_interval(*interval)?;
            if days_of_week.is_empty() {
                return Err("weekly rule needs at least one weekday".to_string());
            }
            Ok(())
        }
        RecurrenceRule::Biweekly { days_of_week } => {
            if days_of_week.is_empty() {
                return Err("biweekly rule needs at least one weekday".to_string());
            }
            Ok(())
        }
        RecurrenceRule::Monthly {
            interval,
            days_of_month,
            months_of_year,
        } => {
            check_interval(*interval)?;
            if days_of_month.is_empty() {
                return Err("monthly rule needs at least one day of month".to_string());
            }
            if let Some(day) = days_of_month.iter().find(|d| !(1..=31).contains(*d)) {
                return Err(format!("day of month {} is out of range", day));
            }
            if let Some(month) = months_of_year.iter().find(|m| !(1..=12).contains(*m)) {
                return Err(format!("month {} is out of range", month));
            }
            Ok(())
        }
        RecurrenceRule::Custom { expression } => Err(format!(
            "custom rules are not interpreted (expression: {:?})",
            expression
        )),
    }
}

fn check_interval(interval: u32) -> Result<(), String> {
    if interval == 0 {
        return Err("interval must be at least 1".to_string());
    }
    Ok(())
}

/// Whether `date` (never before `anchor`) is an occurrence of `rule`.
fn matches_rule(rule: &RecurrenceRule, anchor: NaiveDate, date: NaiveDate) -> bool {
    match rule {
        RecurrenceRule::Daily { interval } => {
            (date - anchor).num_days() % i64::from(*interval) == 0
        }
        RecurrenceRule::Weekly {
            interval,
            days_of_week,
        } => {
            days_of_week.contains(&date.weekday())
                && weeks_between(anchor, date) % i64::from(*interval) == 0
        }
        RecurrenceRule::Biweekly { days_of_week } => {
            // Parity of the ISO week number difference. At year end the week
            // number wraps (52/53 -> 1), which can put two consecutive
            // occurrences one week apart; that behaviour is kept as-is.
            let current = i64::from(date.iso_week().week());
            let start = i64::from(anchor.iso_week().week());
            days_of_week.contains(&date.weekday()) && (current - start).rem_euclid(2) == 0
        }
        RecurrenceRule::Monthly {
            interval,
            days_of_month,
            months_of_year,
        } => {
            let months_since_start = month_index(date) - month_index(anchor);
            months_since_start % i64::from(*interval) == 0
                && (months_of_year.is_empty() || months_of_year.contains(&date.month()))
                && days_of_month.contains(&date.day())
        }
        RecurrenceRule::Custom { .. } => false,
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn weeks_between(anchor: NaiveDate, date: NaiveDate) -> i64 {
    (week_start(date) - week_start(anchor)).num_days() / 7
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn recurrence(rule: RecurrenceRule, start: NaiveDate) -> Recurrence {
        Recurrence {
            rule,
            start_date: start,
            end_date: None,
            max_occurrences: None,
        }
    }

    #[test]
    fn daily_steps_by_interval_from_start() {
        let rec = recurrence(RecurrenceRule::Daily { interval: 3 }, d(2025, 3, 1));
        let range = DateRange::new(d(2025, 3, 2), d(2025, 3, 12)).unwrap();
        assert_eq!(expand(&rec, &range), vec![d(2025, 3, 4), d(2025, 3, 7), d(2025, 3, 10)]);
    }

    #[test]
    fn weekly_interval_counts_whole_weeks() {
        // 2025-03-05 is a Wednesday.
        let rec = recurrence(
            RecurrenceRule::Weekly {
                interval: 2,
                days_of_week: vec![Weekday::Mon, Weekday::Wed],
            },
            d(2025, 3, 5),
        );
        let range = DateRange::new(d(2025, 3, 1), d(2025, 3, 31)).unwrap();
        assert_eq!(
            expand(&rec, &range),
            vec![d(2025, 3, 5), d(2025, 3, 17), d(2025, 3, 19), d(2025, 3, 31)]
        );
    }

    #[test]
    fn biweekly_uses_iso_week_parity() {
        // ISO week 10 of 2025 starts on Monday 2025-03-03.
        let rec = recurrence(
            RecurrenceRule::Biweekly {
                days_of_week: vec![Weekday::Tue],
            },
            d(2025, 3, 3),
        );
        let range = DateRange::new(d(2025, 3, 1), d(2025, 3, 31)).unwrap();
        assert_eq!(
            expand(&rec, &range),
            vec![d(2025, 3, 4), d(2025, 3, 18)]
        );
    }

    #[test]
    fn biweekly_keeps_week_number_wraparound() {
        // 2026 has 53 ISO weeks: 2026-12-29 is week 53, 2027-01-05 is week 1.
        let rec = recurrence(
            RecurrenceRule::Biweekly {
                days_of_week: vec![Weekday::Tue],
            },
            d(2026, 12, 15), // week 51
        );
        let range = DateRange::new(d(2026, 12, 15), d(2027, 1, 12)).unwrap();
        assert_eq!(
            expand(&rec, &range),
            vec![d(2026, 12, 15), d(2026, 12, 29), d(2027, 1, 5)]
        );
    }

    #[test]
    fn monthly_skips_days_missing_from_short_months() {
        let rec = recurrence(
            RecurrenceRule::Monthly {
                interval: 1,
                days_of_month: vec![15, 31],
                months_of_year: vec![],
            },
            d(2025, 1, 1),
        );
        let range = DateRange::new(d(2025, 1, 1), d(2025, 4, 30)).unwrap();
        assert_eq!(
            expand(&rec, &range),
            vec![
                d(2025, 1, 15),
                d(2025, 1, 31),
                d(2025, 2, 15),
                d(2025, 3, 15),
                d(2025, 3, 31),
                d(2025, 4, 15),
            ]
        );
    }

    #[test]
    fn monthly_interval_and_month_filter() {
        let rec = recurrence(
            RecurrenceRule::Monthly {
                interval: 2,
                days_of_month: vec![1],
                months_of_year: vec![1, 2, 3, 4, 5],
            },
            d(2025, 1, 1),
        );
        let range = DateRange::new(d(2025, 1, 1), d(2025, 12, 31)).unwrap();
        assert_eq!(expand(&rec, &range), vec![d(2025, 1, 1), d(2025, 3, 1), d(2025, 5, 1)]);
    }

    #[test]
    fn cap_counts_from_series_start() {
        let mut rec = recurrence(RecurrenceRule::Daily { interval: 1 }, d(2025, 3, 1));
        rec.max_occurrences = Some(5);
        let range = DateRange::new(d(2025, 3, 4), d(2025, 3, 31)).unwrap();
        assert_eq!(expand(&rec, &range), vec![d(2025, 3, 4), d(2025, 3, 5)]);
    }

    #[test]
    fn end_date_clips_series() {
        let mut rec = recurrence(RecurrenceRule::Daily { interval: 1 }, d(2025, 3, 1));
        rec.end_date = Some(d(2025, 3, 3));
        let range = DateRange::new(d(2025, 3, 1), d(2025, 3, 31)).unwrap();
        assert_eq!(expand(&rec, &range).len(), 3);
    }

    #[test]
    fn invalid_rules_yield_nothing() {
        let range = DateRange::new(d(2025, 3, 1), d(2025, 3, 31)).unwrap();
        let rules = vec![
            RecurrenceRule::Daily { interval: 0 },
            RecurrenceRule::Weekly {
                interval: 1,
                days_of_week: vec![],
            },
            RecurrenceRule::Monthly {
                interval: 1,
                days_of_month: vec![32],
                months_of_year: vec![],
            },
            RecurrenceRule::Custom {
                expression: Some("every full moon".to_string()),
            },
        ];
        for rule in rules {
            assert!(expand(&recurrence(rule, d(2025, 3, 1)), &range).is_empty());
        }
    }
}
