// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::APP_NAME;
use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_ENV: &str = "ABASTO_LOG";
const DEFAULT_LEVEL: &str = "info";

/// The terminal belongs to the TUI, so logs go to a file under the data dir.
pub fn log_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("data directory is unavailable -- set XDG_DATA_HOME and retry"))?;
    Ok(data_dir.join(APP_NAME).join(format!("{APP_NAME}.log")))
}

fn env_filter(raw: Option<&str>) -> EnvFilter {
    raw.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
}

pub fn init() -> Result<PathBuf> {
    let path = log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let raw = std::env::var(LOG_ENV).ok();
    tracing_subscriber::registry()
        .with(env_filter(raw.as_deref()))
        .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        .try_init()
        .context("install log subscriber")?;
    Ok(path)
}
