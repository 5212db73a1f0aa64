// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use abasto_api::Client;
use abasto_app::{
    ExportBatch, FilterOptions, FilterSelection, ImportOutcome, PageQuery, PageResult, Resource,
    SpreadsheetWriter,
};
use abasto_export::XlsxExporter;
use abasto_tui::{ForecastRuntime, InternalEvent, send_event};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;

/// Talks to the dashboard backend over HTTP and writes exports to disk.
/// Every `spawn_*` call runs on its own worker thread.
pub struct HttpRuntime {
    client: Client,
    exporter: XlsxExporter,
}

impl HttpRuntime {
    pub fn new(client: Client, exporter: XlsxExporter) -> Self {
        Self { client, exporter }
    }
}

fn spawn_worker<F>(name: &str, tx: Sender<InternalEvent>, job: F) -> Result<()>
where
    F: FnOnce() -> InternalEvent + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            if send_event(&tx, job()).is_err() {
                tracing::debug!("forecast screen closed before worker finished");
            }
        })
        .with_context(|| format!("spawn {name} worker"))?;
    Ok(())
}

impl ForecastRuntime for HttpRuntime {
    fn fetch_options(&mut self, filters: &FilterSelection) -> Result<FilterOptions> {
        Ok(self.client.forecast_options(filters)?)
    }

    fn fetch_page(&mut self, query: &PageQuery) -> Result<PageResult> {
        Ok(self.client.forecast_page(query)?)
    }

    fn write_export(&mut self, batch: &ExportBatch) -> Result<PathBuf> {
        self.exporter.write(batch)
    }

    fn import_file(&mut self, resource: Resource, path: &Path) -> ImportOutcome {
        self.client.import_outcome(resource, path)
    }

    fn spawn_options(&mut self, filters: FilterSelection, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        spawn_worker("forecast-options", tx, move || {
            match client.forecast_options(&filters) {
                Ok(options) => InternalEvent::OptionsLoaded(options),
                Err(error) => InternalEvent::OptionsFailed(error.to_string()),
            }
        })
    }

    fn spawn_page(&mut self, query: PageQuery, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        spawn_worker("forecast-page", tx, move || match client.forecast_page(&query) {
            Ok(result) => InternalEvent::DataLoaded(result),
            Err(error) => InternalEvent::DataFailed(error.to_string()),
        })
    }

    fn spawn_export(&mut self, batch: ExportBatch, tx: Sender<InternalEvent>) -> Result<()> {
        let exporter = self.exporter.clone();
        spawn_worker("forecast-export", tx, move || {
            let keys = batch.keys().cloned().collect();
            match exporter.write(&batch) {
                Ok(path) => InternalEvent::ExportWritten {
                    location: path.display().to_string(),
                    keys,
                },
                Err(error) => InternalEvent::ExportFailed(format!("{error:#}")),
            }
        })
    }

    fn spawn_import(
        &mut self,
        resource: Resource,
        path: PathBuf,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        spawn_worker("resource-import", tx, move || {
            InternalEvent::ImportFinished(client.import_outcome(resource, &path))
        })
    }
}
