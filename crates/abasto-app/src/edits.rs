// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use crate::ids::RowKey;

/// Pending suggested quantities keyed by row identity.
///
/// Values are kept as typed. A present key always maps to a non-empty string;
/// writing a blank value removes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditBuffer {
    entries: BTreeMap<RowKey, String>,
}

impl EditBuffer {
    pub fn edit(&mut self, key: RowKey, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, trimmed.to_owned());
        }
    }

    pub fn get(&self, key: &RowKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        !self.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn remove_keys<'a>(&mut self, keys: impl IntoIterator<Item = &'a RowKey>) -> usize {
        keys.into_iter()
            .filter(|key| self.entries.remove(*key).is_some())
            .count()
    }

    /// Sum of every numeric entry, or `None` when no entry parses.
    pub fn sum(&self) -> Option<f64> {
        self.entries
            .values()
            .filter_map(|value| parse_suggested(value))
            .fold(None, |total, value| Some(total.unwrap_or(0.0) + value))
    }

    pub fn display_sum(&self) -> String {
        match self.sum() {
            Some(total) => crate::view::format_number(total),
            None => "0".to_owned(),
        }
    }
}

/// Parses a typed quantity, accepting a comma as the decimal point.
///
/// Only the first comma is treated that way, so "1,5" parses and "1,000,5"
/// does not.
pub fn parse_suggested(raw: &str) -> Option<f64> {
    raw.trim()
        .replacen(',', ".", 1)
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
