// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use abasto_app::{
    EXPORT_SHEET_NAME, EditBuffer, ExportBatch, Row, SpreadsheetWriter, build_export,
    export_headers,
};
use abasto_export::XlsxExporter;
use anyhow::Result;
use calamine::{Data, Reader, Xlsx, open_workbook};

fn record(material: &str, inventory: Option<f64>) -> Row {
    Row {
        cost_center: "C01".to_owned(),
        material: material.to_owned(),
        product: format!("Producto {material}"),
        inventory,
        ..Row::default()
    }
}

#[test]
fn writes_headers_and_typed_cells() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let records = vec![record("A", Some(12.0)), record("B", None), record("C", None)];
    let mut edits = EditBuffer::default();
    edits.edit(records[0].key(), "3,5");
    edits.edit(records[1].key(), "revisar");

    let batch = build_export(
        &records,
        &edits,
        "forecast_export_20250101_070000.xlsx".to_owned(),
    )
    .expect("two rows qualify");
    let exporter = XlsxExporter::new(dir.path().join("exports"));
    let path = exporter.write(&batch)?;
    assert_eq!(
        path,
        dir.path()
            .join("exports")
            .join("forecast_export_20250101_070000.xlsx")
    );

    let mut workbook: Xlsx<_> = open_workbook(&path)?;
    assert_eq!(workbook.sheet_names(), vec![EXPORT_SHEET_NAME.to_owned()]);
    let range = workbook.worksheet_range(EXPORT_SHEET_NAME)?;
    let rows = range.rows().collect::<Vec<_>>();
    assert_eq!(rows.len(), 3);

    let headers = rows[0]
        .iter()
        .map(|cell| cell.to_string())
        .collect::<Vec<_>>();
    assert_eq!(headers, export_headers().map(str::to_owned).to_vec());

    assert_eq!(rows[1][1], Data::String("A".to_owned()));
    assert_eq!(rows[1][2], Data::String("Producto A".to_owned()));
    assert_eq!(rows[1][9], Data::Float(0.0));
    assert_eq!(rows[1][11], Data::Float(12.0));
    assert_eq!(rows[1][17], Data::Float(3.5));
    assert_eq!(rows[2][11], Data::Empty);
    assert_eq!(rows[2][17], Data::String("revisar".to_owned()));
    Ok(())
}

#[test]
fn empty_batch_is_refused() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let exporter = XlsxExporter::new(dir.path());
    let batch = ExportBatch {
        file_name: "empty.xlsx".to_owned(),
        rows: Vec::new(),
    };
    assert!(exporter.write(&batch).is_err());
    assert!(!dir.path().join("empty.xlsx").exists());
    Ok(())
}
