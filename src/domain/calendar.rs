use crate::domain::models::CalendarDay;
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

pub const WEEKDAY_HEADER: [&str; 7] = ["월", "화", "수", "목", "금", "토", "일"];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    /// Blank cells before the first day in a Monday-first week.
    pub leading_blanks: u32,
    pub days: Vec<CalendarDay>,
}

impl MonthGrid {
    pub fn marked_count(&self) -> usize {
        self.days.iter().filter(|day| day.has_entry).count()
    }

    /// Renders the grid as text rows; days with entries carry a trailing dot.
    pub fn render(&self) -> String {
        let mut out = format!("{}년 {}월\n", self.year, self.month);
        out.push_str(
            &WEEKDAY_HEADER
                .iter()
                .map(|label| format!("{label:>3}"))
                .collect::<String>(),
        );
        out.push('\n');

        let mut column = 0;
        for _ in 0..self.leading_blanks {
            out.push_str("    ");
            column += 1;
        }
        for day in &self.days {
            let marker = if day.has_entry { '•' } else { ' ' };
            out.push_str(&format!("{:>3}{marker}", day.date.day()));
            column += 1;
            if column % 7 == 0 {
                out.push('\n');
            }
        }
        if column % 7 != 0 {
            out.push('\n');
        }
        out
    }
}

/// Local calendar date, never derived from UTC.
pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

pub fn today_iso() -> String {
    today_local().format("%Y-%m-%d").to_string()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next_first) {
        (Some(first), Some(next_first)) => (next_first - first).num_days() as u32,
        _ => 0,
    }
}

/// Builds the month containing `reference`, marking each day present in `entry_dates`.
/// Works on naive local dates so a cell never lands on a neighbouring day.
pub fn build_month_grid(reference: NaiveDate, entry_dates: &HashSet<String>) -> MonthGrid {
    let year = reference.year();
    let month = reference.month();
    let days = (1..=days_in_month(year, month))
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .map(|date| {
            let has_entry = entry_dates.contains(&date.format("%Y-%m-%d").to_string());
            CalendarDay { date, has_entry }
        })
        .collect::<Vec<_>>();
    let leading_blanks = days
        .first()
        .map(|day| day.date.weekday().num_days_from_monday())
        .unwrap_or(0);

    MonthGrid {
        year,
        month,
        leading_blanks,
        days,
    }
}

/// `yyyy-mm-dd` rendered as `M월 D일`; unparsable input is returned unchanged.
pub fn pretty_date(iso: &str) -> String {
    match NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d") {
        Ok(date) => format!("{}월 {}일", date.month(), date.day()),
        Err(_) => iso.to_string(),
    }
}
