// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use abasto_api::{ApiError, Client};
use abasto_app::{
    DateRange, DeleteAllRequest, ExportFormat, FilterField, FilterSelection, ForecastCommand,
    ForecastEffect, ForecastState, ImportOutcome, LoginForm, PageQuery, PageSize, PurchaseUpdate,
    RecordForm, RecordId, Resource, filter_purchases, parse_iso_date,
};
use abasto_testkit::{DEMO_PASSWORD, DEMO_USER, MockBackend, demo_dataset, fixture_rows};
use anyhow::Result;
use serde_json::json;
use std::time::Duration;

fn client(backend: &MockBackend) -> Result<Client> {
    Client::new(backend.base_url(), Duration::from_secs(5))
}

#[test]
fn options_narrow_with_active_filters() -> Result<()> {
    let backend = MockBackend::start(fixture_rows())?;
    let client = client(&backend)?;

    let all = client.forecast_options(&FilterSelection::default())?;
    assert_eq!(all.centros, vec!["C100", "C101", "C104", "C111"]);

    let mut filters = FilterSelection::default();
    filters.set(FilterField::Marca, ["samsung"]);
    let narrowed = client.forecast_options(&filters)?;
    assert_eq!(narrowed.centros, vec!["C100", "C101"]);
    assert_eq!(narrowed.marcas, vec!["Apple", "Motorola", "Samsung", "Xiaomi"]);
    Ok(())
}

#[test]
fn selected_centro_keeps_other_centros_offered() -> Result<()> {
    let backend = MockBackend::start(fixture_rows())?;
    let client = client(&backend)?;
    let mut state = ForecastState::default();

    state.dispatch(ForecastCommand::SetFilter(
        FilterField::Centro,
        vec!["C100".to_owned()],
    ));
    let effects = state.dispatch(ForecastCommand::ApplyFiltersNow);
    let filters = effects
        .iter()
        .find_map(|effect| match effect {
            ForecastEffect::FetchOptions(filters) => Some(filters.clone()),
            _ => None,
        })
        .expect("apply fetches options");
    let options = client.forecast_options(&filters)?;
    state.dispatch(ForecastCommand::OptionsLoaded(options));

    assert_eq!(state.options.centros, vec!["C100", "C101", "C104", "C111"]);
    assert_eq!(state.options.puntos, vec!["Unicentro"]);
    assert!(state.applied_filters.is_selected(FilterField::Centro, "C100"));

    state.dispatch(ForecastCommand::SetFilter(
        FilterField::Centro,
        vec!["C100".to_owned(), "C104".to_owned()],
    ));
    state.dispatch(ForecastCommand::ApplyFiltersNow);
    let options = client.forecast_options(&state.applied_filters)?;
    state.dispatch(ForecastCommand::OptionsLoaded(options));
    assert!(state.applied_filters.is_selected(FilterField::Centro, "C104"));
    assert_eq!(state.options.puntos, vec!["Chipichape", "Unicentro"]);
    Ok(())
}

#[test]
fn material_selection_is_not_sent_to_options() -> Result<()> {
    let backend = MockBackend::start(fixture_rows())?;
    let client = client(&backend)?;
    let mut filters = FilterSelection::default();
    filters.set(FilterField::Material, ["7000100"]);

    let options = client.forecast_options(&filters)?;
    assert_eq!(options.materials.len(), 4);
    assert_eq!(backend.requests(), vec!["GET /forecast/options".to_owned()]);
    Ok(())
}

#[test]
fn data_pages_and_clamps() -> Result<()> {
    let rows = demo_dataset();
    let total = rows.len();
    let backend = MockBackend::start(rows)?;
    let client = client(&backend)?;

    let first = client.forecast_page(&PageQuery {
        filters: FilterSelection::default(),
        page: 1,
        page_size: PageSize::DEFAULT,
    })?;
    assert_eq!(first.records.len(), 50);
    assert_eq!(first.total, total as u64);
    assert_eq!(first.total_pages as usize, total.div_ceil(50));

    let beyond = client.forecast_page(&PageQuery {
        filters: FilterSelection::default(),
        page: 999,
        page_size: PageSize::DEFAULT,
    })?;
    assert_eq!(beyond.page, beyond.total_pages);
    assert!(!beyond.records.is_empty());
    Ok(())
}

#[test]
fn login_accepts_demo_credentials_only() -> Result<()> {
    let backend = MockBackend::start(Vec::new())?;
    let client = client(&backend)?;

    let welcome = client.login(&LoginForm {
        user: DEMO_USER.to_owned(),
        password: DEMO_PASSWORD.to_owned(),
    })?;
    assert!(welcome.contains(DEMO_USER));

    let error = client
        .login(&LoginForm {
            user: DEMO_USER.to_owned(),
            password: "nope".to_owned(),
        })
        .expect_err("wrong password");
    assert_eq!(error.status(), Some(401));
    Ok(())
}

#[test]
fn resource_crud_round_trip() -> Result<()> {
    let backend = MockBackend::start(Vec::new())?;
    let client = client(&backend)?;

    client.create(RecordForm::from_pairs(
        Resource::Claro,
        ["Material=100", "Producto=Galaxy A15"],
    )?)?;
    let listed = client.list(Resource::Claro)?;
    assert_eq!(listed.len(), 1);
    let id = abasto_app::record_id(Resource::Claro, 0, &listed[0]).expect("server assigns id");

    client.update(
        &id,
        RecordForm::from_pairs(Resource::Claro, ["Material=100", "Producto=Galaxy A25"])?,
    )?;
    assert_eq!(backend.records(Resource::Claro)[0]["Producto"], json!("Galaxy A25"));

    client.delete(Resource::Claro, &id)?;
    assert!(client.list(Resource::Claro)?.is_empty());

    let missing = client
        .delete(Resource::Claro, &RecordId::new("404"))
        .expect_err("unknown id");
    assert_eq!(missing.status(), Some(404));
    Ok(())
}

#[test]
fn import_busy_then_success_and_delete_all() -> Result<()> {
    let backend = MockBackend::start(Vec::new())?;
    let client = client(&backend)?;
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("metas.json");
    std::fs::write(&file, r#"[{"Material":"M1"},{"Material":"M2"}]"#)?;

    backend.set_import_busy(true);
    assert!(matches!(
        client.import_outcome(Resource::Metas, &file),
        ImportOutcome::Busy(_)
    ));

    backend.set_import_busy(false);
    let summary = client.import(Resource::Metas, &file)?;
    assert_eq!(summary.added, 2);
    assert_eq!(summary.added_materials, vec!["M1", "M2"]);

    let path = client.export(Resource::Metas, ExportFormat::Excel, dir.path())?;
    assert_eq!(path.file_name().and_then(|name| name.to_str()), Some("metas.xlsx"));
    assert!(std::fs::metadata(&path)?.len() > 0);

    client.delete_all(Resource::Metas, DeleteAllRequest::confirm("ELIMINAR")?)?;
    assert!(backend.records(Resource::Metas).is_empty());
    Ok(())
}

#[test]
fn create_without_required_field_is_rejected_by_backend() -> Result<()> {
    let backend = MockBackend::start(Vec::new())?;
    let client = client(&backend)?;
    let error = client
        .create(RecordForm::from_pairs(Resource::OpsPuntos, ["Punto de Venta=Andino"])?)
        .expect_err("centro costos missing");
    assert!(matches!(error, ApiError::Server { status: 400, .. }));
    assert!(error.to_string().contains("Centro Costos"));
    assert_eq!(backend.requests(), vec!["POST /opspuntos/api/puntos".to_owned()]);
    Ok(())
}

#[test]
fn pending_lists_codes_missing_from_catalogs() -> Result<()> {
    let backend = MockBackend::start(Vec::new())?;
    let client = client(&backend)?;
    backend.seed_resource(Resource::OpsProductos, vec![json!({"Material": 7000100})]);
    backend.seed_resource(Resource::OpsPuntos, vec![json!({"Centro Costos": "C100"})]);
    backend.seed_resource(
        Resource::Inventario,
        vec![
            json!({"Material": "7000100", "Centro Costos": "C100"}),
            json!({"Material": "7000999", "Centro Costos": "C100"}),
            json!({"Material": "7000555", "Centro Costos": "C900"}),
        ],
    );

    let report = client.pending(Resource::Inventario)?;
    assert_eq!(report.missing_materials, vec!["7000555", "7000999"]);
    assert_eq!(report.missing_centros, vec!["C900"]);
    assert!(client.pending(Resource::Metas)?.is_empty());

    let error = client.pending(Resource::Claro).expect_err("no pending view");
    assert_eq!(error.status(), Some(404));
    Ok(())
}

#[test]
fn sales_months_and_ranged_delete() -> Result<()> {
    let backend = MockBackend::start(Vec::new())?;
    let client = client(&backend)?;
    backend.seed_resource(
        Resource::VentasClaro,
        vec![
            json!({"Centro Costos": "C100", "Material": "1", "Fecha Venta": "2025-01-05"}),
            json!({"Centro Costos": "C100", "Material": "2", "Fecha Venta": "31/01/2025"}),
            json!({"Centro Costos": "C101", "Material": "1", "Fecha Venta": "2025-02-03"}),
            json!({"Centro Costos": "C101", "Material": "3", "Fecha Venta": "sin fecha"}),
        ],
    );

    assert_eq!(client.sales_months()?, vec!["Enero - 2025", "Febrero - 2025"]);

    let january = DateRange::new(
        Some(parse_iso_date("2025-01-01")?),
        Some(parse_iso_date("2025-01-31")?),
    )?;
    let summary = client.delete_sales_in_range(&january)?;
    assert_eq!((summary.deleted, summary.remaining), (2, 2));
    assert_eq!(client.sales_months()?, vec!["Febrero - 2025"]);

    let open_ended = DateRange::new(Some(parse_iso_date("2025-03-01")?), None)?;
    let summary = client.delete_sales_in_range(&open_ended)?;
    assert_eq!((summary.deleted, summary.remaining), (0, 2));
    assert_eq!(backend.records(Resource::VentasClaro).len(), 2);
    Ok(())
}

#[test]
fn purchase_suggestions_update_import_and_export() -> Result<()> {
    let backend = MockBackend::start(Vec::new())?;
    let client = client(&backend)?;
    backend.seed_purchases(vec![
        json!({"Material": "7000100", "Producto": "Galaxy A15", "Marca": "Samsung", "Sugerido": 10, "Confirmar": false, "Observacion": ""}),
        json!({"Material": "7000103", "Producto": "iPhone 15", "Marca": "Apple", "Sugerido": 4, "Confirmar": false, "Observacion": ""}),
    ]);

    client.update_purchase(&PurchaseUpdate::approve("7000100", true)?)?;
    client.update_purchase(&PurchaseUpdate::note("7000103", "esperar precio")?)?;
    let missing = client
        .update_purchase(&PurchaseUpdate::approve("1234", true)?)
        .expect_err("unknown material");
    assert_eq!(missing.status(), Some(404));

    let items = client.purchases()?;
    assert!(items[0].approved);
    assert_eq!(items[1].note, "esperar precio");
    assert_eq!(filter_purchases(&items, "apple").len(), 1);

    let dir = tempfile::tempdir()?;
    let file = dir.path().join("compras.json");
    std::fs::write(
        &file,
        r#"[{"Material":"7000100","Sugerido":5},{"Material":"7000109","Producto":"Moto G54","Marca":"Motorola","Sugerido":"3"},{"Producto":"sin material"}]"#,
    )?;
    let summary = client.import_purchases(&file)?;
    assert_eq!((summary.added, summary.updated, summary.total_after), (1, 1, 3));
    let items = client.purchases()?;
    assert_eq!(items[0].suggested, Some(15.0));
    assert!(items[0].approved);
    assert_eq!(items[2].material, "7000109");
    assert!(!items[2].approved);

    let path = client.export_purchases(dir.path())?;
    assert_eq!(path.file_name().and_then(|name| name.to_str()), Some("compras.xlsx"));
    assert!(std::fs::metadata(&path)?.len() > 0);
    Ok(())
}

#[test]
fn purchase_import_without_material_column_is_rejected() -> Result<()> {
    let backend = MockBackend::start(Vec::new())?;
    let client = client(&backend)?;
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("compras.json");
    std::fs::write(&file, r#"[{"Producto":"Galaxy A15","Sugerido":2}]"#)?;

    let error = client.import_purchases(&file).expect_err("no material column");
    assert!(matches!(error, ApiError::Server { status: 400, .. }));
    assert!(error.to_string().contains("Material"));
    assert!(backend.purchases().is_empty());
    Ok(())
}
