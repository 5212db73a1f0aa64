// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Deserialize;
use std::time::{Duration, Instant};

pub const DEFAULT_IMPORT_COOLDOWN: Duration = Duration::from_secs(30);

/// Success body of `{base}/import`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ImportSummary {
    #[serde(default)]
    pub added: u64,
    /// Rows merged into existing records (purchase imports).
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub total_after: u64,
    #[serde(default)]
    pub added_materials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported(ImportSummary),
    /// The backend reported an import already running (HTTP 429).
    Busy(String),
    Failed(String),
}

impl ImportOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Imported(summary) if summary.updated > 0 => format!(
                "imported {} new records, updated {}, total {}",
                summary.added, summary.updated, summary.total_after
            ),
            Self::Imported(summary) => format!(
                "imported {} new records, total {}",
                summary.added, summary.total_after
            ),
            Self::Busy(message) | Self::Failed(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportRefusal {
    InFlight,
    CoolingDown { remaining: Duration },
}

impl ImportRefusal {
    pub fn message(self) -> String {
        match self {
            Self::InFlight => "import already in progress".to_owned(),
            Self::CoolingDown { remaining } => format!(
                "import available again in {}s",
                remaining.as_secs().max(1)
            ),
        }
    }
}

/// One import at a time, then a cooldown after every attempt.
#[derive(Debug, Clone)]
pub struct ImportGate {
    cooldown: Duration,
    in_flight: bool,
    available_at: Option<Instant>,
}

impl Default for ImportGate {
    fn default() -> Self {
        Self::new(DEFAULT_IMPORT_COOLDOWN)
    }
}

impl ImportGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            in_flight: false,
            available_at: None,
        }
    }

    pub fn is_available(&self, now: Instant) -> bool {
        self.check(now).is_ok()
    }

    pub fn try_begin(&mut self, now: Instant) -> Result<(), ImportRefusal> {
        self.check(now)?;
        self.in_flight = true;
        tracing::debug!("import started");
        Ok(())
    }

    /// Ends the attempt regardless of its outcome and starts the cooldown.
    pub fn finish(&mut self, now: Instant) {
        self.in_flight = false;
        self.available_at = Some(now + self.cooldown);
    }

    fn check(&self, now: Instant) -> Result<(), ImportRefusal> {
        if self.in_flight {
            return Err(ImportRefusal::InFlight);
        }
        if let Some(available_at) = self.available_at
            && now < available_at
        {
            return Err(ImportRefusal::CoolingDown {
                remaining: available_at - now,
            });
        }
        Ok(())
    }
}
