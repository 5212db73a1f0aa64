// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::path::PathBuf;
use time::macros::{format_description, offset};
use time::{OffsetDateTime, UtcOffset};

use crate::edits::{EditBuffer, parse_suggested};
use crate::ids::RowKey;
use crate::model::{ColumnId, Row};

pub const EXPORT_SHEET_NAME: &str = "Export";
pub const EXPORT_FILE_PREFIX: &str = "forecast_export_";
pub const DEFAULT_EXPORT_OFFSET: UtcOffset = offset!(-5);

pub fn export_headers() -> [&'static str; 18] {
    ColumnId::ALL.map(ColumnId::header)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportValue {
    Text(String),
    Number(f64),
    Empty,
}

impl From<Option<f64>> for ExportValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub key: RowKey,
    pub values: Vec<ExportValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportBatch {
    pub file_name: String,
    pub rows: Vec<ExportRow>,
}

impl ExportBatch {
    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.rows.iter().map(|row| &row.key)
    }
}

/// Writes a batch somewhere and reports where it landed.
pub trait SpreadsheetWriter {
    fn write(&self, batch: &ExportBatch) -> Result<PathBuf>;
}

/// Rows of the current page that carry a buffered suggestion, in page order.
///
/// Returns `None` when no row qualifies so callers can warn instead of
/// producing an empty file.
pub fn build_export(records: &[Row], edits: &EditBuffer, file_name: String) -> Option<ExportBatch> {
    let rows = records
        .iter()
        .filter_map(|record| {
            let key = record.key();
            let suggested = edits.get(&key)?;
            Some(ExportRow {
                values: export_values(record, suggested),
                key,
            })
        })
        .collect::<Vec<_>>();
    if rows.is_empty() {
        return None;
    }
    Some(ExportBatch { file_name, rows })
}

fn export_values(record: &Row, suggested: &str) -> Vec<ExportValue> {
    let text = |value: &str| ExportValue::Text(value.to_owned());
    ColumnId::ALL
        .iter()
        .map(|column| match column {
            ColumnId::CentroCostos => text(&record.cost_center),
            ColumnId::Material => text(&record.material),
            ColumnId::Producto => text(&record.product),
            ColumnId::Marca => text(&record.brand),
            ColumnId::PuntoVenta => text(&record.point_of_sale),
            ColumnId::CanalRegional => text(&record.channel),
            ColumnId::VentasActuales => record.current_sales.into(),
            ColumnId::VentasMesPasado => record.last_month_sales.into(),
            ColumnId::Promedio3Meses => record.three_month_average.into(),
            ColumnId::Maximo => ExportValue::Number(0.0),
            ColumnId::Mediana => record.median.into(),
            ColumnId::Inventario => record.inventory.into(),
            ColumnId::Transitos => record.in_transit.into(),
            ColumnId::Indicador3Meses => record.indicator_three_months.into(),
            ColumnId::IndicadorVentasMesPasado => record.indicator_last_month.into(),
            ColumnId::EnvioInventario3Meses => record.shipment_three_months.into(),
            ColumnId::EnvioVentasActuales => record.shipment_last_month.into(),
            ColumnId::Sugerido => {
                parse_suggested(suggested).map_or_else(|| text(suggested), ExportValue::Number)
            }
        })
        .collect()
}

/// `forecast_export_YYYYMMDD_HHMMSS.xlsx` in the given local offset.
pub fn export_file_name(now: OffsetDateTime, local: UtcOffset) -> Result<String> {
    let stamp = now
        .to_offset(local)
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .context("format export timestamp")?;
    Ok(format!("{EXPORT_FILE_PREFIX}{stamp}.xlsx"))
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_EXPORT_OFFSET, ExportValue, build_export, export_file_name, export_headers,
    };
    use crate::edits::EditBuffer;
    use crate::model::Row;
    use anyhow::Result;
    use time::macros::datetime;

    fn record(material: &str) -> Row {
        Row {
            cost_center: "C01".to_owned(),
            material: material.to_owned(),
            inventory: Some(4.0),
            ..Row::default()
        }
    }

    #[test]
    fn only_rows_with_suggestions_are_exported() {
        let records = vec![record("A"), record("B"), record("C")];
        let mut edits = EditBuffer::default();
        edits.edit(records[2].key(), "7,5");
        edits.edit(records[0].key(), "pending");
        edits.edit(crate::ids::RowKey::new("C99", "Z"), "3");

        let batch = build_export(&records, &edits, "out.xlsx".to_owned()).expect("batch");
        let keys = batch.keys().map(|key| key.to_string()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["C01|A", "C01|C"]);

        let first = &batch.rows[0].values;
        assert_eq!(first.len(), export_headers().len());
        assert_eq!(first[9], ExportValue::Number(0.0));
        assert_eq!(first[10], ExportValue::Empty);
        assert_eq!(first[11], ExportValue::Number(4.0));
        assert_eq!(first[17], ExportValue::Text("pending".to_owned()));
        assert_eq!(batch.rows[1].values[17], ExportValue::Number(7.5));
    }

    #[test]
    fn empty_selection_produces_no_batch() {
        let records = vec![record("A")];
        assert!(build_export(&records, &EditBuffer::default(), "x".to_owned()).is_none());
        assert!(build_export(&[], &EditBuffer::default(), "x".to_owned()).is_none());
    }

    #[test]
    fn headers_keep_fixed_order() {
        let headers = export_headers();
        assert_eq!(headers[0], "Centro Costos");
        assert_eq!(headers[2], "Producto");
        assert_eq!(headers[15], "Envío Inventario 3 meses");
        assert_eq!(headers[17], "Sugerido");
    }

    #[test]
    fn file_name_uses_local_offset() -> Result<()> {
        let now = datetime!(2025-03-01 02:04:05 UTC);
        assert_eq!(
            export_file_name(now, DEFAULT_EXPORT_OFFSET)?,
            "forecast_export_20250228_210405.xlsx"
        );
        Ok(())
    }
}
