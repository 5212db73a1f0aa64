// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use abasto_app::{EXPORT_SHEET_NAME, ExportBatch, ExportValue, SpreadsheetWriter, export_headers};
use anyhow::{Context, Result, bail};
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes forecast export batches as `.xlsx` files into one directory.
#[derive(Debug, Clone)]
pub struct XlsxExporter {
    dir: PathBuf,
}

impl XlsxExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SpreadsheetWriter for XlsxExporter {
    fn write(&self, batch: &ExportBatch) -> Result<PathBuf> {
        if batch.rows.is_empty() {
            bail!("nothing to export -- enter a suggested value first");
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create export dir {}", self.dir.display()))?;
        let path = self.dir.join(&batch.file_name);
        save_batch(batch, &path)?;
        tracing::info!(path = %path.display(), rows = batch.rows.len(), "wrote forecast export");
        Ok(path)
    }
}

fn save_batch(batch: &ExportBatch, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(EXPORT_SHEET_NAME)
        .context("name export sheet")?;

    for (col, header) in export_headers().iter().enumerate() {
        let col = u16::try_from(col).context("export column index")?;
        worksheet
            .write_string_with_format(0, col, *header, &header_format)
            .with_context(|| format!("write header {header}"))?;
        let width = header.chars().count().max(10) + 2;
        worksheet
            .set_column_width(col, width as f64)
            .context("set export column width")?;
    }

    for (index, row) in batch.rows.iter().enumerate() {
        let row_number = u32::try_from(index + 1).context("export row index")?;
        for (col, value) in row.values.iter().enumerate() {
            let col = u16::try_from(col).context("export column index")?;
            match value {
                ExportValue::Text(text) => {
                    worksheet
                        .write_string(row_number, col, text)
                        .with_context(|| format!("write row {row_number}"))?;
                }
                ExportValue::Number(number) => {
                    worksheet
                        .write_number(row_number, col, *number)
                        .with_context(|| format!("write row {row_number}"))?;
                }
                ExportValue::Empty => {}
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("save {}", path.display()))?;
    Ok(())
}
