// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::ids::RecordId;
use crate::resource::{RecordAddress, Resource};

/// Word the user types to confirm wiping every record of a resource.
pub const DELETE_ALL_KEYWORD: &str = "ELIMINAR";

/// Body the backend expects on `delete_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteAllRequest {
    pub confirmaciones: u8,
}

impl DeleteAllRequest {
    /// Only obtainable from a matching typed keyword.
    pub fn confirm(typed: &str) -> Result<Self> {
        if typed != DELETE_ALL_KEYWORD {
            bail!("delete-all not confirmed -- type {DELETE_ALL_KEYWORD} exactly and retry");
        }
        Ok(Self { confirmaciones: 3 })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginForm {
    pub user: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<()> {
        if self.user.trim().is_empty() {
            bail!("user is required -- enter a user name and retry");
        }
        if self.password.is_empty() {
            bail!("password is required -- enter the password and retry");
        }
        Ok(())
    }
}

/// A create or update payload for one resource record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordForm {
    pub resource: Resource,
    pub fields: Map<String, Value>,
}

impl RecordForm {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            fields: Map::new(),
        }
    }

    /// Parses `key=value` pairs; values that read as JSON numbers stay numeric.
    pub fn from_pairs<'a>(
        resource: Resource,
        pairs: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let mut form = Self::new(resource);
        for pair in pairs {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("field {pair:?} is not key=value -- write it as \"Material=123\""))?;
            let key = key.trim();
            if key.is_empty() {
                bail!("field name is empty in {pair:?}");
            }
            form.set(key, value);
        }
        Ok(form)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let value = value.trim();
        let parsed = value
            .parse::<serde_json::Number>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(value.to_owned()));
        self.fields.insert(key.to_owned(), parsed);
    }

    pub fn validate(&self) -> Result<()> {
        for field in self.resource.required_fields() {
            let present = match self.fields.get(*field) {
                Some(Value::String(text)) => !text.trim().is_empty(),
                Some(Value::Null) | None => false,
                Some(_) => true,
            };
            if !present {
                bail!(
                    "{} {field} is required -- set {field}=... and retry",
                    self.resource.label()
                );
            }
        }
        Ok(())
    }

    pub fn into_body(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Derives the path id of an existing record from its listed position and body.
pub fn record_id(resource: Resource, index: usize, record: &Value) -> Option<RecordId> {
    let text = |value: &Value| match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    };
    match resource.address() {
        RecordAddress::Index => i64::try_from(index).ok().map(RecordId::from),
        RecordAddress::IdField => record.get("id").and_then(text).map(RecordId::new),
        RecordAddress::Column(column) => record.get(column).and_then(text).map(RecordId::new),
    }
}

/// Divisor for a shipment column: must parse and be strictly positive.
pub fn parse_divisor(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("divisor is required -- enter a number greater than 0");
    }
    let value = trimmed
        .replacen(',', ".", 1)
        .parse::<f64>()
        .map_err(|_| anyhow!("divisor {trimmed:?} is not a number -- enter a number greater than 0"))?;
    if !value.is_finite() || value <= 0.0 {
        bail!("divisor must be greater than 0");
    }
    Ok(value)
}
