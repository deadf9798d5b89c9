use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::model::{time_record::TimeRecord, timesheet::TimesheetHeader};

/// Working days a timesheet covers.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    /// Days since the Monday that starts the week.
    pub fn offset(self) -> i64 {
        self as i64
    }

    pub fn date_in_week(self, week_start: NaiveDate) -> NaiveDate {
        week_start + Duration::days(self.offset())
    }
}

/// Worked hours per weekday as two-decimal strings; an empty string means
/// nothing was recorded for that day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DayHours {
    pub monday: String,
    pub tuesday: String,
    pub wednesday: String,
    pub thursday: String,
    pub friday: String,
}

impl DayHours {
    pub fn get(&self, day: Weekday) -> &str {
        match day {
            Weekday::Monday => &self.monday,
            Weekday::Tuesday => &self.tuesday,
            Weekday::Wednesday => &self.wednesday,
            Weekday::Thursday => &self.thursday,
            Weekday::Friday => &self.friday,
        }
    }

    /// Hours of one day as a number, `0.0` when nothing was recorded.
    pub fn value(&self, day: Weekday) -> f64 {
        self.get(day).parse().unwrap_or(0.0)
    }

    /// Row total across the week.
    pub fn total(&self) -> f64 {
        Weekday::iter().map(|day| self.value(day)).sum()
    }

    fn slot(&mut self, day: Weekday) -> &mut String {
        match day {
            Weekday::Monday => &mut self.monday,
            Weekday::Tuesday => &mut self.tuesday,
            Weekday::Wednesday => &mut self.wednesday,
            Weekday::Thursday => &mut self.thursday,
            Weekday::Friday => &mut self.friday,
        }
    }
}

/// Something about a time record that made its duration untrustworthy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HoursAnomaly {
    /// `start_time` or `end_time` is not a valid `HH:MM` clock time.
    /// The record contributes nothing to its day.
    Malformed {
        record_id: Option<u64>,
        start_time: String,
        end_time: String,
    },
    /// `end_time` precedes `start_time`. The negative duration is still
    /// counted so the submitted total is visible as-is.
    Negative { record_id: Option<u64>, hours: f64 },
    /// The record's day is not Monday to Friday.
    UnknownDay { record_id: Option<u64>, day: String },
}

/// A timesheet header merged with its time records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timesheet {
    #[serde(flatten)]
    pub header: TimesheetHeader,
    pub hours: DayHours,
    pub time_records: Vec<TimeRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<HoursAnomaly>,
}

pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Signed length of a `start`..`end` interval in hours, or `None` if either
/// end is not a clock time.
pub fn interval_hours(start: &str, end: &str) -> Option<f64> {
    let start = parse_clock(start)?;
    let end = parse_clock(end)?;
    Some((end - start).num_minutes() as f64 / 60.0)
}

pub fn format_hours(hours: f64) -> String {
    format!("{hours:.2}")
}

/// Checks a record a user is about to save: a workday and an `HH:MM`
/// interval that starts before it ends.
pub fn validate_interval(day: &str, start: &str, end: &str) -> Result<Weekday, &'static str> {
    let day = Weekday::from_str(day).map_err(|_| "Day must be Monday to Friday")?;
    let (Some(start), Some(end)) = (parse_clock(start), parse_clock(end)) else {
        return Err("Times must be HH:MM");
    };
    if start >= end {
        return Err("start_time must be before end_time");
    }
    Ok(day)
}

/// Column totals of several rows, every day formatted (`"0.00"` when no row
/// has hours on it).
pub fn day_totals<'a>(rows: impl IntoIterator<Item = &'a DayHours>) -> DayHours {
    let mut sums = [0.0; 5];
    for row in rows {
        for day in Weekday::iter() {
            sums[day.offset() as usize] += row.value(day);
        }
    }

    let mut totals = DayHours::default();
    for day in Weekday::iter() {
        *totals.slot(day) = format_hours(sums[day.offset() as usize]);
    }
    totals
}

/// Sum of every parseable interval, used as the tracked-hours figure for an
/// employee on a project.
pub fn total_hours(records: &[TimeRecord]) -> f64 {
    records
        .iter()
        .filter_map(|r| interval_hours(&r.start_time, &r.end_time))
        .sum()
}

/// Builds a [`Timesheet`] from its header and records.
///
/// Records on the same weekday are summed. Records without a `date` get the
/// date of their weekday within `start_date_of_the_week`.
pub fn assemble(header: TimesheetHeader, records: Option<Vec<TimeRecord>>) -> Timesheet {
    let mut records = records.unwrap_or_default();
    let mut totals: [Option<f64>; 5] = [None; 5];
    let mut anomalies = Vec::new();

    for record in records.iter_mut() {
        let Ok(day) = Weekday::from_str(record.day.trim()) else {
            anomalies.push(HoursAnomaly::UnknownDay {
                record_id: record.id,
                day: record.day.clone(),
            });
            continue;
        };

        if record.date.is_none() {
            record.date = Some(day.date_in_week(header.start_date_of_the_week));
        }

        match interval_hours(&record.start_time, &record.end_time) {
            Some(hours) => {
                if hours < 0.0 {
                    anomalies.push(HoursAnomaly::Negative {
                        record_id: record.id,
                        hours,
                    });
                }
                let slot = &mut totals[day.offset() as usize];
                *slot = Some(slot.unwrap_or(0.0) + hours);
            }
            None => anomalies.push(HoursAnomaly::Malformed {
                record_id: record.id,
                start_time: record.start_time.clone(),
                end_time: record.end_time.clone(),
            }),
        }
    }

    let mut hours = DayHours::default();
    for day in Weekday::iter() {
        if let Some(total) = totals[day.offset() as usize] {
            *hours.slot(day) = format_hours(total);
        }
    }

    Timesheet {
        header,
        hours,
        time_records: records,
        anomalies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> TimesheetHeader {
        TimesheetHeader {
            id: 1,
            project_id: 10,
            project_name: Some("Apollo".into()),
            employee_id: 7,
            start_date_of_the_week: NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
            submission_date: None,
            status: None,
            approved_by: None,
            approved_date: None,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        }
    }

    fn record(day: &str, start: &str, end: &str) -> TimeRecord {
        TimeRecord {
            id: None,
            timesheet_id: 1,
            day: day.into(),
            date: None,
            start_time: start.into(),
            end_time: end.into(),
        }
    }

    #[test]
    fn interval_durations() {
        assert_eq!(interval_hours("08:00", "16:00"), Some(8.0));
        assert_eq!(interval_hours("08:00", "17:30"), Some(9.5));
        assert_eq!(format_hours(8.0), "8.00");
        assert_eq!(format_hours(9.5), "9.50");
        assert_eq!(interval_hours("8:00", "nine"), None);
    }

    #[test]
    fn two_days_of_work() {
        let sheet = assemble(
            header(),
            Some(vec![
                record("Monday", "08:00", "16:00"),
                record("Tuesday", "08:00", "16:00"),
            ]),
        );

        assert_eq!(
            sheet.hours,
            DayHours {
                monday: "8.00".into(),
                tuesday: "8.00".into(),
                wednesday: String::new(),
                thursday: String::new(),
                friday: String::new(),
            }
        );
        assert!(sheet.anomalies.is_empty());
    }

    #[test]
    fn missing_records_give_empty_week() {
        let sheet = assemble(header(), None);
        assert_eq!(sheet.hours, DayHours::default());
        assert!(sheet.time_records.is_empty());
    }

    #[test]
    fn each_record_lands_on_its_weekday() {
        let sheet = assemble(
            header(),
            Some(vec![
                record("Friday", "09:00", "12:15"),
                record("Wednesday", "10:00", "11:00"),
            ]),
        );

        assert_eq!(sheet.hours.get(Weekday::Friday), "3.25");
        assert_eq!(sheet.hours.get(Weekday::Wednesday), "1.00");
        for day in [Weekday::Monday, Weekday::Tuesday, Weekday::Thursday] {
            assert_eq!(sheet.hours.get(day), "");
        }
    }

    #[test]
    fn split_day_is_summed() {
        let sheet = assemble(
            header(),
            Some(vec![
                record("Thursday", "08:00", "12:00"),
                record("Thursday", "13:00", "17:30"),
            ]),
        );
        assert_eq!(sheet.hours.thursday, "8.50");
    }

    #[test]
    fn missing_dates_follow_the_week() {
        let mut dated = record("Monday", "08:00", "09:00");
        dated.date = NaiveDate::from_ymd_opt(2026, 1, 1);

        let sheet = assemble(
            header(),
            Some(vec![record("Wednesday", "08:00", "09:00"), dated]),
        );

        assert_eq!(
            sheet.time_records[0].date,
            NaiveDate::from_ymd_opt(2026, 10, 14)
        );
        assert_eq!(sheet.time_records[1].date, NaiveDate::from_ymd_opt(2026, 1, 1));
    }

    #[test]
    fn reversed_interval_is_flagged_and_kept() {
        let sheet = assemble(header(), Some(vec![record("Monday", "17:00", "15:30")]));

        assert_eq!(sheet.hours.monday, "-1.50");
        assert_eq!(
            sheet.anomalies,
            vec![HoursAnomaly::Negative {
                record_id: None,
                hours: -1.5
            }]
        );
    }

    #[test]
    fn malformed_and_weekend_records_are_flagged() {
        let sheet = assemble(
            header(),
            Some(vec![
                record("Monday", "8am", "16:00"),
                record("Saturday", "08:00", "10:00"),
            ]),
        );

        assert_eq!(sheet.hours, DayHours::default());
        assert_eq!(sheet.anomalies.len(), 2);
        assert!(matches!(sheet.anomalies[0], HoursAnomaly::Malformed { .. }));
        assert!(matches!(
            &sheet.anomalies[1],
            HoursAnomaly::UnknownDay { day, .. } if day == "Saturday"
        ));
    }

    #[test]
    fn day_hours_wire_shape() {
        let json = serde_json::to_value(DayHours {
            monday: "8.00".into(),
            ..DayHours::default()
        })
        .unwrap();
        assert_eq!(json["Monday"], "8.00");
        assert_eq!(json["Friday"], "");
    }

    #[test]
    fn total_skips_unparseable_intervals() {
        let records = vec![
            record("Monday", "08:00", "16:00"),
            record("Tuesday", "bad", "16:00"),
            record("Tuesday", "09:00", "10:30"),
        ];
        assert_eq!(total_hours(&records), 9.5);
    }

    #[test]
    fn save_validation() {
        assert_eq!(validate_interval("Tuesday", "08:00", "16:00"), Ok(Weekday::Tuesday));
        assert_eq!(
            validate_interval("Saturday", "08:00", "16:00"),
            Err("Day must be Monday to Friday")
        );
        assert!(validate_interval("monday", "08:00", "16:00").is_err());
        assert_eq!(
            validate_interval("Monday", "16:00", "08:00"),
            Err("start_time must be before end_time")
        );
        assert!(validate_interval("Monday", "09:00", "09:00").is_err());
        assert_eq!(validate_interval("Monday", "8am", "16:00"), Err("Times must be HH:MM"));
        assert_eq!(validate_interval("Monday", "08:00", "25:00"), Err("Times must be HH:MM"));
    }

    #[test]
    fn column_totals_across_rows() {
        let a = assemble(
            header(),
            Some(vec![
                record("Monday", "08:00", "16:00"),
                record("Wednesday", "09:00", "10:30"),
            ]),
        );
        let b = assemble(header(), Some(vec![record("Monday", "08:00", "12:15")]));

        assert_eq!(a.hours.total(), 9.5);
        let totals = day_totals([&a.hours, &b.hours]);
        assert_eq!(totals.monday, "12.25");
        assert_eq!(totals.tuesday, "0.00");
        assert_eq!(totals.wednesday, "1.50");
        assert_eq!(totals.total(), 13.75);
    }
}
