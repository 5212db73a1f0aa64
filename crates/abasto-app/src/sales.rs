// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use time::macros::format_description;
use time::{Date, Month};

/// Column carrying the sale date in `ventasclaro` records.
pub const SALE_DATE_FIELD: &str = "Fecha Venta";

const SPANISH_MONTHS: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Accepts the date shapes found in uploaded sales files. Day-first wins
/// over month-first when both would parse. A trailing time is ignored.
pub fn parse_sale_date(raw: &str) -> Option<Date> {
    let text = raw.trim();
    let text = text.split(['T', ' ']).next().unwrap_or(text);
    Date::parse(text, format_description!("[year]-[month padding:none]-[day padding:none]"))
        .or_else(|_| {
            Date::parse(text, format_description!("[day padding:none]/[month padding:none]/[year]"))
        })
        .or_else(|_| {
            Date::parse(text, format_description!("[day padding:none]-[month padding:none]-[year]"))
        })
        .or_else(|_| {
            Date::parse(text, format_description!("[year]/[month padding:none]/[day padding:none]"))
        })
        .or_else(|_| {
            Date::parse(text, format_description!("[month padding:none]/[day padding:none]/[year]"))
        })
        .ok()
}

pub fn parse_iso_date(raw: &str) -> Result<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("date {raw:?} is not YYYY-MM-DD"))
}

pub fn sale_date(record: &Value) -> Option<Date> {
    match record.get(SALE_DATE_FIELD)? {
        Value::String(text) => parse_sale_date(text),
        _ => None,
    }
}

/// `Enero - 2025`
pub fn month_label(year: i32, month: Month) -> String {
    format!("{} - {year}", SPANISH_MONTHS[usize::from(u8::from(month)) - 1])
}

/// Distinct sale months, oldest first.
pub fn sale_months(records: &[Value]) -> Vec<String> {
    records
        .iter()
        .filter_map(sale_date)
        .map(|date| (date.year(), u8::from(date.month())))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|(year, month)| Month::try_from(month).ok().map(|m| month_label(year, m)))
        .collect()
}

/// Inclusive date window for a ranged sales delete. One side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    #[serde(rename = "start_date", serialize_with = "iso_date")]
    start: Option<Date>,
    #[serde(rename = "end_date", serialize_with = "iso_date")]
    end: Option<Date>,
}

impl DateRange {
    pub fn new(start: Option<Date>, end: Option<Date>) -> Result<Self> {
        match (start, end) {
            (None, None) => bail!("a start or end date is required -- pass --from or --to and retry"),
            (Some(start), Some(end)) if start > end => {
                bail!("start date {start} is after end date {end} -- swap them and retry")
            }
            _ => Ok(Self { start, end }),
        }
    }

    pub fn start(&self) -> Option<Date> {
        self.start
    }

    pub fn end(&self) -> Option<Date> {
        self.end
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }

    /// Records without a readable sale date never match.
    pub fn count_matching(&self, records: &[Value]) -> usize {
        records
            .iter()
            .filter_map(sale_date)
            .filter(|date| self.contains(*date))
            .count()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(start), Some(end)) => write!(f, "{start} to {end}"),
            (Some(start), None) => write!(f, "{start} onward"),
            (None, Some(end)) => write!(f, "up to {end}"),
            (None, None) => f.write_str("any date"),
        }
    }
}

fn iso_date<S: Serializer>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
    match date {
        Some(date) => serializer.collect_str(date),
        None => serializer.serialize_none(),
    }
}

/// Body of `/ventasclaro/api/months`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SalesMonths {
    #[serde(default)]
    pub months: Vec<String>,
}

/// Body of `/ventasclaro/api/delete_filtered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct DeleteFilteredSummary {
    #[serde(default)]
    pub deleted: u64,
    #[serde(default)]
    pub remaining: u64,
}

/// Materials and cost centers referenced by a resource but missing from
/// the product and point-of-sale catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PendingReport {
    #[serde(default)]
    pub missing_materials: Vec<String>,
    #[serde(default)]
    pub missing_centros: Vec<String>,
}

impl PendingReport {
    pub fn is_empty(&self) -> bool {
        self.missing_materials.is_empty() && self.missing_centros.is_empty()
    }
}
