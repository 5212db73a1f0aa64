// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use abasto_app::{
    DateRange, FilterField, PURCHASES_BASE, PURCHASES_EXPORT_NAME, Resource, Row, parse_iso_date,
    record_id, sale_date, sale_months,
};
use anyhow::{Result, anyhow};
use rust_xlsxwriter::Workbook;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Method, Request, Response, Server};

const POINTS_OF_SALE: [(&str, &str); 12] = [
    ("Unicentro", "Retail Bogota"),
    ("Andino", "Retail Bogota"),
    ("Titan Plaza", "Retail Bogota"),
    ("Santafe", "Retail Bogota"),
    ("Chipichape", "Regional Occidente"),
    ("Unicentro Cali", "Regional Occidente"),
    ("El Tesoro", "Regional Antioquia"),
    ("Mayorca", "Regional Antioquia"),
    ("Buenavista", "Regional Costa"),
    ("Viva Barranquilla", "Regional Costa"),
    ("Cacique", "Regional Oriente"),
    ("Distribuidor Mayorista", "Mayoristas"),
];

const PRODUCTS: [(&str, &str); 16] = [
    ("Samsung", "Galaxy A15"),
    ("Samsung", "Galaxy A25"),
    ("Samsung", "Galaxy S24"),
    ("Apple", "iPhone 15"),
    ("Apple", "iPhone 15 Pro"),
    ("Apple", "iPhone 13"),
    ("Xiaomi", "Redmi Note 13"),
    ("Xiaomi", "Redmi 13C"),
    ("Xiaomi", "Poco X6"),
    ("Motorola", "Moto G54"),
    ("Motorola", "Edge 40"),
    ("Honor", "X8b"),
    ("Honor", "Magic 6 Lite"),
    ("Oppo", "A79"),
    ("Oppo", "Reno 11"),
    ("Tecno", "Spark 20"),
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: u64) -> u64 {
        if n <= 1 {
            return 0;
        }
        self.next_u64() % n
    }

    fn chance(&mut self, percent: u64) -> bool {
        self.int_n(100) < percent
    }
}

/// Generates plausible forecast rows from a fixed seed.
#[derive(Debug, Clone)]
pub struct ForecastFaker {
    rng: DeterministicRng,
}

impl ForecastFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    /// Every point of sale carries a seeded subset of the catalog.
    pub fn dataset(&mut self) -> Vec<Row> {
        let mut rows = Vec::new();
        for (point_index, (point, channel)) in POINTS_OF_SALE.iter().enumerate() {
            let cost_center = format!("C{:03}", 100 + point_index);
            for (product_index, (brand, product)) in PRODUCTS.iter().enumerate() {
                if !self.rng.chance(70) {
                    continue;
                }
                let material = format!("{}", 7_000_100 + product_index);
                rows.push(self.row(&cost_center, point, channel, &material, brand, product));
            }
        }
        rows
    }

    pub fn row(
        &mut self,
        cost_center: &str,
        point_of_sale: &str,
        channel: &str,
        material: &str,
        brand: &str,
        product: &str,
    ) -> Row {
        let current = self.quantity(40);
        let last_month = self.quantity(60);
        let older = [self.quantity(60), self.quantity(60)];
        let average = round2((last_month + older[0] + older[1]) / 3.0);
        let mut sorted = [last_month, older[0], older[1]];
        sorted.sort_by(f64::total_cmp);
        let inventory = self.quantity(80);
        let in_transit = self.quantity(20);
        let ratio = |sales: f64| (sales > 0.0).then(|| round4(inventory / sales));

        Row {
            cost_center: cost_center.to_owned(),
            material: material.to_owned(),
            product: product.to_owned(),
            brand: brand.to_owned(),
            point_of_sale: point_of_sale.to_owned(),
            channel: channel.to_owned(),
            current_sales: Some(current),
            last_month_sales: Some(last_month),
            three_month_average: Some(average),
            median: Some(sorted[1]),
            inventory: Some(inventory),
            in_transit: (!self.rng.chance(15)).then_some(in_transit),
            indicator_three_months: ratio(average),
            indicator_last_month: ratio(last_month),
            shipment_three_months: Some(round2(average - inventory - in_transit)),
            shipment_last_month: Some(round2(last_month - inventory - in_transit)),
        }
    }

    fn quantity(&mut self, max: u64) -> f64 {
        self.rng.int_n(max + 1) as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub fn demo_dataset() -> Vec<Row> {
    ForecastFaker::new(42).dataset()
}

/// A few rows with hand-picked values for assertions.
pub fn fixture_rows() -> Vec<Row> {
    let mut faker = ForecastFaker::new(7);
    let mut rows = vec![
        faker.row("C100", "Unicentro", "Retail Bogota", "7000100", "Samsung", "Galaxy A15"),
        faker.row("C100", "Unicentro", "Retail Bogota", "7000103", "Apple", "iPhone 15"),
        faker.row("C101", "Andino", "Retail Bogota", "7000100", "Samsung", "Galaxy A15"),
        faker.row("C104", "Chipichape", "Regional Occidente", "7000106", "Xiaomi", "Redmi Note 13"),
        faker.row("C111", "Distribuidor Mayorista", "Mayoristas", "7000109", "Motorola", "Moto G54"),
    ];
    rows[0].shipment_three_months = Some(-12.0);
    rows[1].shipment_three_months = Some(0.0);
    rows[2].shipment_three_months = Some(25.0);
    rows[3].shipment_three_months = None;
    rows
}

pub const DEMO_USER: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo";

#[derive(Debug, Default)]
struct BackendState {
    forecast: Vec<Row>,
    resources: BTreeMap<Resource, Vec<Value>>,
    purchases: Vec<Value>,
    credentials: BTreeMap<String, String>,
    import_busy: bool,
    next_id: u64,
    requests: Vec<String>,
}

/// In-process HTTP server that speaks the dashboard backend contract.
pub struct MockBackend {
    base_url: String,
    state: Arc<Mutex<BackendState>>,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl MockBackend {
    pub fn start(forecast: Vec<Row>) -> Result<Self> {
        let server = Server::http("127.0.0.1:0")
            .map_err(|error| anyhow!("start mock backend: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());
        let server = Arc::new(server);
        let state = Arc::new(Mutex::new(BackendState {
            forecast,
            credentials: BTreeMap::from([(DEMO_USER.to_owned(), DEMO_PASSWORD.to_owned())]),
            ..BackendState::default()
        }));

        let handle = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    serve(&state, request);
                }
            })
        };
        tracing::debug!(%base_url, "mock backend listening");

        Ok(Self {
            base_url,
            state,
            server,
            handle: Some(handle),
        })
    }

    pub fn demo() -> Result<Self> {
        let backend = Self::start(demo_dataset())?;
        backend.seed_resource(
            Resource::OpsProductos,
            PRODUCTS
                .iter()
                .enumerate()
                .map(|(index, (brand, product))| {
                    json!({"Material": format!("{}", 7_000_100 + index), "Producto": product, "Marca": brand})
                })
                .collect(),
        );
        backend.seed_resource(
            Resource::OpsPuntos,
            POINTS_OF_SALE
                .iter()
                .enumerate()
                .map(|(index, (point, channel))| {
                    json!({"Centro Costos": format!("C{:03}", 100 + index), "Punto de Venta": point, "Canal o Regional": channel})
                })
                .collect(),
        );
        backend.seed_purchases(
            PRODUCTS
                .iter()
                .enumerate()
                .step_by(3)
                .map(|(index, (brand, product))| {
                    json!({
                        "Material": format!("{}", 7_000_100 + index),
                        "Producto": product,
                        "Marca": brand,
                        "Sugerido": 5 + index * 2,
                        "Confirmar": false,
                        "Observacion": "",
                    })
                })
                .collect(),
        );
        Ok(backend)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_import_busy(&self, busy: bool) {
        lock(&self.state).import_busy = busy;
    }

    pub fn seed_resource(&self, resource: Resource, records: Vec<Value>) {
        lock(&self.state).resources.insert(resource, records);
    }

    pub fn seed_purchases(&self, purchases: Vec<Value>) {
        lock(&self.state).purchases = purchases;
    }

    pub fn purchases(&self) -> Vec<Value> {
        lock(&self.state).purchases.clone()
    }

    pub fn records(&self, resource: Resource) -> Vec<Value> {
        lock(&self.state)
            .resources
            .get(&resource)
            .cloned()
            .unwrap_or_default()
    }

    /// `"METHOD /path?query"` for every request served so far.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn lock(state: &Mutex<BackendState>) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

type MockResponse = Response<Cursor<Vec<u8>>>;

fn serve(state: &Mutex<BackendState>, mut request: Request) {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let mut body = Vec::new();
    let _ = request.as_reader().read_to_end(&mut body);

    let response = {
        let mut state = lock(state);
        state.requests.push(format!("{method} {url}"));
        route(&mut state, &method, &url, &body)
    };
    if let Err(error) = request.respond(response) {
        tracing::warn!(%error, "mock backend failed to respond");
    }
}

fn route(state: &mut BackendState, method: &Method, url: &str, body: &[u8]) -> MockResponse {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let params = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect::<BTreeMap<String, String>>();

    match (method, path) {
        (Method::Get, "/forecast/options") => forecast_options(state, &params),
        (Method::Get, "/forecast/data") => forecast_data(state, &params),
        (Method::Post, "/api/login") => login(state, body),
        _ if path.starts_with(PURCHASES_BASE) => {
            purchases_route(state, method, &path[PURCHASES_BASE.len()..], body)
        }
        _ => match Resource::ALL
            .iter()
            .find(|resource| path.starts_with(resource.base_path()))
        {
            Some(resource) => resource_route(state, *resource, method, path, &params, body),
            None => json_response(404, &json!({"error": "not found"})),
        },
    }
}

fn json_response(status: u16, body: &Value) -> MockResponse {
    Response::from_data(body.to_string().into_bytes())
        .with_status_code(status)
        .with_header(content_type("application/json"))
}

fn header(name: &str, value: &str) -> Header {
    Header::from_bytes(name, value).expect("mock headers are ASCII")
}

fn content_type(value: &str) -> Header {
    header("Content-Type", value)
}

type Filters = BTreeMap<FilterField, BTreeSet<String>>;

fn parse_filters(params: &BTreeMap<String, String>) -> Filters {
    FilterField::ALL
        .iter()
        .filter_map(|field| {
            let values = params
                .get(field.param())?
                .split(',')
                .map(|part| part.trim().to_lowercase())
                .filter(|part| !part.is_empty())
                .collect::<BTreeSet<_>>();
            (!values.is_empty()).then_some((*field, values))
        })
        .collect()
}

fn field_value(row: &Row, field: FilterField) -> &str {
    match field {
        FilterField::Centro => &row.cost_center,
        FilterField::Punto => &row.point_of_sale,
        FilterField::Canal => &row.channel,
        FilterField::Material => &row.material,
        FilterField::Producto => &row.product,
        FilterField::Marca => &row.brand,
    }
}

fn matches(row: &Row, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(field, values)| values.contains(&field_value(row, *field).to_lowercase()))
}

/// Each list comes from the rows matching every filter except its own field.
fn forecast_options(state: &BackendState, params: &BTreeMap<String, String>) -> MockResponse {
    let filters = parse_filters(params);
    let list = |field: FilterField| {
        let others = filters
            .iter()
            .filter(|(other, _)| **other != field)
            .map(|(other, values)| (*other, values.clone()))
            .collect::<Filters>();
        state
            .forecast
            .iter()
            .filter(|row| matches(row, &others))
            .map(|row| field_value(row, field))
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .collect::<BTreeSet<_>>()
    };
    json_response(
        200,
        &json!({
            "centros": list(FilterField::Centro),
            "puntos": list(FilterField::Punto),
            "canales": list(FilterField::Canal),
            "materials": list(FilterField::Material),
            "productos": list(FilterField::Producto),
            "marcas": list(FilterField::Marca),
        }),
    )
}

fn forecast_data(state: &BackendState, params: &BTreeMap<String, String>) -> MockResponse {
    let filters = parse_filters(params);
    let page = params
        .get("page")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let page_size = params
        .get("page_size")
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(50)
        .min(1000);

    let matching = state
        .forecast
        .iter()
        .filter(|row| matches(row, &filters))
        .collect::<Vec<_>>();
    let total = matching.len();
    let total_pages = total.div_ceil(page_size).max(1);
    let page = page.min(total_pages);
    let records = matching
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect::<Vec<_>>();

    json_response(
        200,
        &json!({
            "records": records,
            "total": total,
            "page": page,
            "page_size": page_size,
            "total_pages": total_pages,
        }),
    )
}

fn login(state: &BackendState, body: &[u8]) -> MockResponse {
    let parsed = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);
    let user = parsed.get("user").and_then(Value::as_str).unwrap_or_default();
    let password = parsed
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if user.is_empty() || password.is_empty() {
        return json_response(400, &json!({"msg": "Usuario y contraseña son obligatorios"}));
    }
    if state.credentials.get(user).map(String::as_str) != Some(password) {
        return json_response(401, &json!({"msg": "Usuario o contraseña incorrectos"}));
    }
    json_response(200, &json!({"msg": format!("Bienvenido {user}")}))
        .with_header(header("Set-Cookie", "session=mock; Path=/"))
}

fn resource_route(
    state: &mut BackendState,
    resource: Resource,
    method: &Method,
    path: &str,
    params: &BTreeMap<String, String>,
    body: &[u8],
) -> MockResponse {
    let rest = &path[resource.base_path().len()..];
    let collection = format!("/{}", resource.collection());

    match (method, rest) {
        (Method::Get, rest) if rest == collection => {
            let records = state.resources.get(&resource).cloned().unwrap_or_default();
            json_response(200, &Value::Array(records))
        }
        (Method::Post, rest) if rest == collection => create_record(state, resource, body),
        (Method::Put | Method::Delete, rest) if rest.starts_with(&format!("{collection}/")) => {
            let id = decode_segment(&rest[collection.len() + 1..]);
            mutate_record(state, resource, method, &id, body)
        }
        (Method::Post, "/delete_all") => {
            let confirmations = serde_json::from_slice::<Value>(body)
                .ok()
                .and_then(|value| value.get("confirmaciones").and_then(Value::as_u64));
            if confirmations != Some(3) {
                return json_response(400, &json!({"error": "Se requieren 3 confirmaciones"}));
            }
            state.resources.remove(&resource);
            json_response(200, &json!({"ok": true}))
        }
        (Method::Post, "/import") => import_records(state, resource, body),
        (Method::Get, "/export") => export_records(state, resource, params),
        (Method::Get, "/pending") if resource.has_pending_view() => pending(state, resource),
        (Method::Get, "/months") if resource == Resource::VentasClaro => {
            let records = state.resources.get(&resource).cloned().unwrap_or_default();
            json_response(200, &json!({"months": sale_months(&records)}))
        }
        (Method::Post, "/delete_filtered") if resource == Resource::VentasClaro => {
            delete_sales_in_range(state, body)
        }
        _ => json_response(404, &json!({"error": "not found"})),
    }
}

fn catalog_keys(state: &BackendState, resource: Resource, field: &str) -> BTreeSet<String> {
    state
        .resources
        .get(&resource)
        .into_iter()
        .flatten()
        .filter_map(|record| record.get(field).map(value_text))
        .map(|value| value.trim().to_owned())
        .collect()
}

/// Materials and centers used by `resource` that the catalogs do not know.
fn pending(state: &BackendState, resource: Resource) -> MockResponse {
    let products = catalog_keys(state, Resource::OpsProductos, "Material");
    let points = catalog_keys(state, Resource::OpsPuntos, "Centro Costos");
    let used = |field: &str, known: &BTreeSet<String>| {
        catalog_keys(state, resource, field)
            .into_iter()
            .filter(|value| !value.is_empty() && !known.contains(value))
            .collect::<Vec<_>>()
    };
    json_response(
        200,
        &json!({
            "missing_materials": used("Material", &products),
            "missing_centros": used("Centro Costos", &points),
        }),
    )
}

fn delete_sales_in_range(state: &mut BackendState, body: &[u8]) -> MockResponse {
    let parsed = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);
    let bound = |key: &str| {
        parsed
            .get(key)
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(parse_iso_date)
            .transpose()
    };
    let (start, end) = match (bound("start_date"), bound("end_date")) {
        (Ok(start), Ok(end)) => (start, end),
        _ => return json_response(400, &json!({"error": "Formato de fecha inválido"})),
    };
    if start.is_none() && end.is_none() {
        return json_response(
            400,
            &json!({"error": "Se requiere al menos start_date o end_date"}),
        );
    }
    let Ok(range) = DateRange::new(start, end) else {
        return json_response(400, &json!({"error": "Rango de fechas inválido"}));
    };

    let records = state.resources.entry(Resource::VentasClaro).or_default();
    let before = records.len();
    records.retain(|record| !sale_date(record).is_some_and(|date| range.contains(date)));
    json_response(
        200,
        &json!({"ok": true, "deleted": before - records.len(), "remaining": records.len()}),
    )
}

fn purchases_route(state: &mut BackendState, method: &Method, rest: &str, body: &[u8]) -> MockResponse {
    match (method, rest) {
        (Method::Get, "/compras") => json_response(200, &Value::Array(state.purchases.clone())),
        (Method::Post, "/update") => update_purchase(state, body),
        (Method::Post, "/import") => import_purchases(state, body),
        (Method::Get, "/export_excel") => match purchases_workbook(&state.purchases) {
            Ok(bytes) => Response::from_data(bytes)
                .with_status_code(200)
                .with_header(content_type(
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ))
                .with_header(header(
                    "Content-Disposition",
                    &format!("attachment; filename=\"{PURCHASES_EXPORT_NAME}\""),
                )),
            Err(error) => json_response(500, &json!({"error": error.to_string()})),
        },
        _ => json_response(404, &json!({"error": "not found"})),
    }
}

fn material_of(record: &Value) -> Option<String> {
    record
        .get("Material")
        .filter(|value| !value.is_null())
        .map(value_text)
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

fn update_purchase(state: &mut BackendState, body: &[u8]) -> MockResponse {
    let update = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);
    let Some(material) = material_of(&update) else {
        return json_response(400, &json!({"error": "Se requiere el campo 'Material'"}));
    };
    let Some(target) = state
        .purchases
        .iter_mut()
        .find(|record| material_of(record).as_deref() == Some(material.as_str()))
        .and_then(Value::as_object_mut)
    else {
        return json_response(404, &json!({"error": "Registro no encontrado para actualizar"}));
    };
    for field in ["Confirmar", "Observacion", "Producto", "Marca"] {
        if let Some(value) = update.get(field) {
            target.insert(field.to_owned(), value.clone());
        }
    }
    json_response(200, &json!({"ok": true, "updated": 1}))
}

/// Rows for a known material add to its `Sugerido`; the rest are appended.
fn import_purchases(state: &mut BackendState, body: &[u8]) -> MockResponse {
    if state.import_busy {
        return busy_response();
    }
    let Some(incoming) = uploaded_records(body) else {
        return unsupported_upload();
    };
    if !incoming.iter().any(|record| material_of(record).is_some()) {
        return json_response(
            400,
            &json!({"error": "El archivo debe contener la columna 'Material'"}),
        );
    }

    let (mut added, mut updated) = (0, 0);
    for record in incoming {
        let Some(material) = material_of(&record) else {
            continue;
        };
        let suggested = record.get("Sugerido").and_then(number_of).unwrap_or_default();
        let existing = state
            .purchases
            .iter_mut()
            .find(|known| material_of(known).as_deref() == Some(material.as_str()))
            .and_then(Value::as_object_mut);
        if let Some(known) = existing {
            let total = known.get("Sugerido").and_then(number_of).unwrap_or_default() + suggested;
            known.insert("Sugerido".to_owned(), json!(total));
            updated += 1;
        } else {
            state.purchases.push(json!({
                "Material": material,
                "Producto": record.get("Producto").map(value_text).unwrap_or_default(),
                "Marca": record.get("Marca").map(value_text).unwrap_or_default(),
                "Sugerido": suggested,
                "Confirmar": false,
                "Observacion": "",
            }));
            added += 1;
        }
    }
    json_response(
        200,
        &json!({
            "ok": true,
            "added": added,
            "updated": updated,
            "total_after": state.purchases.len(),
        }),
    )
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn purchases_workbook(purchases: &[Value]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Compras")?;
    let headers = ["Material", "Producto", "Marca", "Sugerido", "Estado", "Observacion"];
    for (col, title) in headers.iter().enumerate() {
        worksheet.write_string(0, u16::try_from(col)?, *title)?;
    }
    for (index, record) in purchases.iter().enumerate() {
        let row = u32::try_from(index + 1)?;
        let text = |field: &str| record.get(field).filter(|v| !v.is_null()).map(value_text);
        worksheet.write_string(row, 0, text("Material").unwrap_or_default())?;
        worksheet.write_string(row, 1, text("Producto").unwrap_or_default())?;
        worksheet.write_string(row, 2, text("Marca").unwrap_or_default())?;
        worksheet.write_number(
            row,
            3,
            record.get("Sugerido").and_then(number_of).unwrap_or_default(),
        )?;
        let approved = record.get("Confirmar").and_then(Value::as_bool).unwrap_or(false);
        worksheet.write_string(row, 4, if approved { "Aprobado" } else { "No aprobado" })?;
        worksheet.write_string(row, 5, text("Observacion").unwrap_or_default())?;
    }
    Ok(workbook.save_to_buffer()?)
}

fn missing_required(resource: Resource, record: &Value) -> Option<&'static str> {
    resource.required_fields().iter().copied().find(|field| {
        match record.get(*field) {
            Some(Value::String(text)) => text.trim().is_empty(),
            Some(Value::Null) | None => true,
            Some(_) => false,
        }
    })
}

fn create_record(state: &mut BackendState, resource: Resource, body: &[u8]) -> MockResponse {
    let Ok(mut record) = serde_json::from_slice::<Value>(body) else {
        return json_response(400, &json!({"error": "JSON inválido"}));
    };
    if let Some(field) = missing_required(resource, &record) {
        return json_response(400, &json!({"error": format!("El {field} es obligatorio")}));
    }
    if resource.address() == abasto_app::RecordAddress::IdField
        && let Some(object) = record.as_object_mut()
        && !object.contains_key("id")
    {
        state.next_id += 1;
        object.insert("id".to_owned(), Value::String(state.next_id.to_string()));
    }
    state.resources.entry(resource).or_default().push(record);
    json_response(201, &json!({"ok": true}))
}

fn mutate_record(
    state: &mut BackendState,
    resource: Resource,
    method: &Method,
    id: &str,
    body: &[u8],
) -> MockResponse {
    let records = state.resources.entry(resource).or_default();
    let position = records.iter().enumerate().position(|(index, record)| {
        record_id(resource, index, record).is_some_and(|candidate| candidate.as_str() == id)
    });
    let Some(position) = position else {
        return json_response(404, &json!({"error": "Registro no encontrado"}));
    };

    if *method == Method::Delete {
        records.remove(position);
        return json_response(200, &json!({"ok": true}));
    }

    let Ok(update) = serde_json::from_slice::<Value>(body) else {
        return json_response(400, &json!({"error": "JSON inválido"}));
    };
    if let Some(field) = missing_required(resource, &update) {
        return json_response(400, &json!({"error": format!("El {field} es obligatorio")}));
    }
    if let (Some(target), Value::Object(fields)) = (records[position].as_object_mut(), update) {
        target.extend(fields);
    }
    json_response(200, &json!({"ok": true}))
}

fn busy_response() -> MockResponse {
    json_response(
        429,
        &json!({"error": "Ya hay una importación en curso, espere antes de intentar nuevamente"}),
    )
}

fn unsupported_upload() -> MockResponse {
    json_response(
        400,
        &json!({"error": "Archivo no soportado", "detail": "expected a JSON array"}),
    )
}

/// The file part of a multipart upload, read as a JSON array of records.
fn uploaded_records(body: &[u8]) -> Option<Vec<Value>> {
    let text = String::from_utf8_lossy(body);
    text.find('[')
        .zip(text.rfind(']'))
        .and_then(|(start, end)| serde_json::from_str::<Vec<Value>>(&text[start..=end]).ok())
}

fn import_records(state: &mut BackendState, resource: Resource, body: &[u8]) -> MockResponse {
    if state.import_busy {
        return busy_response();
    }
    let Some(incoming) = uploaded_records(body) else {
        return unsupported_upload();
    };

    let added_materials = incoming
        .iter()
        .filter_map(|record| record.get("Material").map(value_text))
        .collect::<Vec<_>>();
    let records = state.resources.entry(resource).or_default();
    let added = incoming.len();
    records.extend(incoming);
    json_response(
        200,
        &json!({
            "added": added,
            "total_after": records.len(),
            "added_materials": added_materials,
        }),
    )
}

fn export_records(
    state: &BackendState,
    resource: Resource,
    params: &BTreeMap<String, String>,
) -> MockResponse {
    let records = state.resources.get(&resource).cloned().unwrap_or_default();
    let disposition =
        |file: String| header("Content-Disposition", &format!("attachment; filename=\"{file}\""));

    match params.get("format").map(String::as_str) {
        Some("json") => json_response(200, &Value::Array(records))
            .with_header(disposition(format!("{}.json", resource.name()))),
        Some("excel") => match records_workbook(&records) {
            Ok(bytes) => Response::from_data(bytes)
                .with_status_code(200)
                .with_header(content_type(
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ))
                .with_header(disposition(format!("{}.xlsx", resource.name()))),
            Err(error) => json_response(500, &json!({"error": error.to_string()})),
        },
        _ => json_response(400, &json!({"error": "formato no soportado"})),
    }
}

fn records_workbook(records: &[Value]) -> Result<Vec<u8>> {
    let headers = records
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|object| object.keys().cloned())
        .collect::<BTreeSet<_>>();
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        let col = u16::try_from(col)?;
        worksheet.write_string(0, col, header)?;
        for (index, record) in records.iter().enumerate() {
            let row = u32::try_from(index + 1)?;
            match record.get(header) {
                Some(Value::Number(number)) => {
                    worksheet.write_number(row, col, number.as_f64().unwrap_or_default())?;
                }
                Some(Value::Null) | None => {}
                Some(other) => {
                    worksheet.write_string(row, col, value_text(other))?;
                }
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn decode_segment(segment: &str) -> String {
    let query = format!("id={}", segment.replace('+', "%2B"));
    url::form_urlencoded::parse(query.as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}
