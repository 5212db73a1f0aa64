// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::RowKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterField {
    Centro,
    Punto,
    Canal,
    Material,
    Producto,
    Marca,
}

impl FilterField {
    pub const ALL: [Self; 6] = [
        Self::Centro,
        Self::Punto,
        Self::Canal,
        Self::Material,
        Self::Producto,
        Self::Marca,
    ];

    /// Query-string parameter name understood by the backend.
    pub const fn param(self) -> &'static str {
        match self {
            Self::Centro => "centro",
            Self::Punto => "punto",
            Self::Canal => "canal",
            Self::Material => "material",
            Self::Producto => "producto",
            Self::Marca => "marca",
        }
    }

    /// Whether the options endpoint narrows the other lists by this field.
    /// Material and producto are too fine-grained to condition on.
    pub const fn conditions_options(self) -> bool {
        !matches!(self, Self::Material | Self::Producto)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Centro => "centro costos",
            Self::Punto => "punto de venta",
            Self::Canal => "canal o regional",
            Self::Material => "material",
            Self::Producto => "producto",
            Self::Marca => "marca",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "centro" => Some(Self::Centro),
            "punto" => Some(Self::Punto),
            "canal" => Some(Self::Canal),
            "material" => Some(Self::Material),
            "producto" => Some(Self::Producto),
            "marca" => Some(Self::Marca),
            _ => None,
        }
    }
}

/// Selected values per filter field. An empty or absent set means "all".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSelection {
    values: BTreeMap<FilterField, BTreeSet<String>>,
}

impl FilterSelection {
    pub fn get(&self, field: FilterField) -> Option<&BTreeSet<String>> {
        self.values.get(&field).filter(|values| !values.is_empty())
    }

    pub fn is_selected(&self, field: FilterField, value: &str) -> bool {
        self.get(field).is_some_and(|values| values.contains(value))
    }

    pub fn set<I, S>(&mut self, field: FilterField, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(Into::into)
            .filter(|value| !value.is_empty())
            .collect::<BTreeSet<String>>();
        if values.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, values);
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(BTreeSet::is_empty)
    }

    /// One pair per non-empty field, values comma-joined in sorted order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        self.pairs_for(|_| true)
    }

    /// The subset of `query_pairs` sent to the options endpoint.
    pub fn options_query_pairs(&self) -> Vec<(&'static str, String)> {
        self.pairs_for(FilterField::conditions_options)
    }

    fn pairs_for(&self, include: impl Fn(FilterField) -> bool) -> Vec<(&'static str, String)> {
        FilterField::ALL
            .iter()
            .filter(|field| include(**field))
            .filter_map(|field| {
                self.get(*field).map(|values| {
                    (
                        field.param(),
                        values.iter().cloned().collect::<Vec<_>>().join(","),
                    )
                })
            })
            .collect()
    }

    /// Drops selected values the backend no longer offers and returns them.
    pub fn retain_offered(&mut self, options: &FilterOptions) -> Vec<(FilterField, String)> {
        let mut dropped = Vec::new();
        for (field, values) in &mut self.values {
            let offered = options.values(*field);
            values.retain(|value| {
                let keep = offered.iter().any(|candidate| candidate == value);
                if !keep {
                    dropped.push((*field, value.clone()));
                }
                keep
            });
        }
        self.values.retain(|_, values| !values.is_empty());
        dropped
    }
}

/// Valid values for each filter field. Each list is conditioned on the
/// other active filters, never on the field's own selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub centros: Vec<String>,
    #[serde(default)]
    pub puntos: Vec<String>,
    #[serde(default)]
    pub canales: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub productos: Vec<String>,
    #[serde(default)]
    pub marcas: Vec<String>,
}

impl FilterOptions {
    pub fn values(&self, field: FilterField) -> &[String] {
        match field {
            FilterField::Centro => &self.centros,
            FilterField::Punto => &self.puntos,
            FilterField::Canal => &self.canales,
            FilterField::Material => &self.materials,
            FilterField::Producto => &self.productos,
            FilterField::Marca => &self.marcas,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageSize(u32);

impl PageSize {
    pub const ALLOWED: [u32; 5] = [25, 50, 100, 200, 500];
    pub const DEFAULT: Self = Self(50);

    pub fn new(value: u32) -> Option<Self> {
        Self::ALLOWED.contains(&value).then_some(Self(value))
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Next larger allowed size, saturating at the largest.
    pub fn larger(self) -> Self {
        Self::ALLOWED
            .iter()
            .copied()
            .find(|size| *size > self.0)
            .map_or(self, Self)
    }

    /// Next smaller allowed size, saturating at the smallest.
    pub fn smaller(self) -> Self {
        Self::ALLOWED
            .iter()
            .rev()
            .copied()
            .find(|size| *size < self.0)
            .map_or(self, Self)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Everything needed to issue the next data fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub filters: FilterSelection,
    pub page: u32,
    pub page_size: PageSize,
}

impl PageQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.filters.query_pairs();
        pairs.push(("page", self.page.max(1).to_string()));
        pairs.push(("page_size", self.page_size.get().to_string()));
        pairs
    }
}

/// Raw `/forecast/data` body. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PagePayload {
    #[serde(default)]
    pub records: Vec<Row>,
    #[serde(default)]
    pub total: u64,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub records: Vec<Row>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl PageResult {
    /// Fills wire defaults and clamps `page` into `[1, total_pages]`.
    pub fn from_payload(payload: PagePayload, requested: PageSize) -> Self {
        let total_pages = payload.total_pages.unwrap_or(1).max(1);
        let page = payload.page.unwrap_or(1).clamp(1, total_pages);
        Self {
            records: payload.records,
            total: payload.total,
            page,
            page_size: payload.page_size.unwrap_or(requested.get()),
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "Centro Costos", default, deserialize_with = "text_field")]
    pub cost_center: String,
    #[serde(rename = "Material", default, deserialize_with = "text_field")]
    pub material: String,
    #[serde(rename = "Productos", default, deserialize_with = "text_field")]
    pub product: String,
    #[serde(rename = "Marca", default, deserialize_with = "text_field")]
    pub brand: String,
    #[serde(rename = "Punto de Venta", default, deserialize_with = "text_field")]
    pub point_of_sale: String,
    #[serde(rename = "Canal o Regional", default, deserialize_with = "text_field")]
    pub channel: String,
    #[serde(rename = "Ventas_Mes_Actual", default, deserialize_with = "number_field")]
    pub current_sales: Option<f64>,
    #[serde(rename = "Ventas_Mes_Pasado", default, deserialize_with = "number_field")]
    pub last_month_sales: Option<f64>,
    #[serde(
        rename = "Ventas_Promedio_3_Meses",
        default,
        deserialize_with = "number_field"
    )]
    pub three_month_average: Option<f64>,
    #[serde(rename = "Mediana", default, deserialize_with = "number_field")]
    pub median: Option<f64>,
    #[serde(rename = "Inventario", default, deserialize_with = "number_field")]
    pub inventory: Option<f64>,
    #[serde(rename = "Transitos", default, deserialize_with = "number_field")]
    pub in_transit: Option<f64>,
    #[serde(rename = "Indicador_3_Meses", default, deserialize_with = "number_field")]
    pub indicator_three_months: Option<f64>,
    #[serde(
        rename = "Indicador_Mes_Pasado",
        default,
        deserialize_with = "number_field"
    )]
    pub indicator_last_month: Option<f64>,
    #[serde(rename = "Envio_3_Meses", default, deserialize_with = "number_field")]
    pub shipment_three_months: Option<f64>,
    #[serde(rename = "Envio_Pasadas", default, deserialize_with = "number_field")]
    pub shipment_last_month: Option<f64>,
}

impl Row {
    pub fn key(&self) -> RowKey {
        RowKey::new(&self.cost_center, &self.material)
    }
}

pub(crate) fn text_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        Some(other) => other.to_string(),
    })
}

pub(crate) fn number_field<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Indicator,
    Suggested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColumnId {
    CentroCostos,
    Material,
    Producto,
    Marca,
    PuntoVenta,
    CanalRegional,
    VentasActuales,
    VentasMesPasado,
    Promedio3Meses,
    Maximo,
    Mediana,
    Inventario,
    Transitos,
    Indicador3Meses,
    IndicadorVentasMesPasado,
    EnvioInventario3Meses,
    EnvioVentasActuales,
    Sugerido,
}

impl ColumnId {
    pub const ALL: [Self; 18] = [
        Self::CentroCostos,
        Self::Material,
        Self::Producto,
        Self::Marca,
        Self::PuntoVenta,
        Self::CanalRegional,
        Self::VentasActuales,
        Self::VentasMesPasado,
        Self::Promedio3Meses,
        Self::Maximo,
        Self::Mediana,
        Self::Inventario,
        Self::Transitos,
        Self::Indicador3Meses,
        Self::IndicadorVentasMesPasado,
        Self::EnvioInventario3Meses,
        Self::EnvioVentasActuales,
        Self::Sugerido,
    ];

    pub const SHIPMENTS: [Self; 2] = [Self::EnvioInventario3Meses, Self::EnvioVentasActuales];

    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|column| *column == self)
            .unwrap_or(0)
    }

    pub const fn slug(self) -> &'static str {
        match self {
            Self::CentroCostos => "centro-costos",
            Self::Material => "material",
            Self::Producto => "producto",
            Self::Marca => "marca",
            Self::PuntoVenta => "punto-venta",
            Self::CanalRegional => "canal-regional",
            Self::VentasActuales => "ventas-actuales",
            Self::VentasMesPasado => "ventas-mes-pasado",
            Self::Promedio3Meses => "promedio-3-meses",
            Self::Maximo => "maximo",
            Self::Mediana => "mediana",
            Self::Inventario => "inventario",
            Self::Transitos => "transitos",
            Self::Indicador3Meses => "indicador-3-meses",
            Self::IndicadorVentasMesPasado => "indicador-ventas-mes-pasado",
            Self::EnvioInventario3Meses => "envio-inventario-3-meses",
            Self::EnvioVentasActuales => "envio-ventas-actuales",
            Self::Sugerido => "sugerido",
        }
    }

    /// Header text, shared by the table and the spreadsheet export.
    pub const fn header(self) -> &'static str {
        match self {
            Self::CentroCostos => "Centro Costos",
            Self::Material => "Material",
            Self::Producto => "Producto",
            Self::Marca => "Marca",
            Self::PuntoVenta => "Punto de Venta",
            Self::CanalRegional => "Canal o Regional",
            Self::VentasActuales => "Ventas Actuales",
            Self::VentasMesPasado => "Ventas Mes pasado",
            Self::Promedio3Meses => "Promedio 3 Meses",
            Self::Maximo => "Maximo",
            Self::Mediana => "Mediana",
            Self::Inventario => "Inventario",
            Self::Transitos => "Transitos",
            Self::Indicador3Meses => "Indicador 3 Meses",
            Self::IndicadorVentasMesPasado => "Indicador Ventas Mes Pasado",
            Self::EnvioInventario3Meses => "Envío Inventario 3 meses",
            Self::EnvioVentasActuales => "Envío Ventas Actuales",
            Self::Sugerido => "Sugerido",
        }
    }

    pub const fn kind(self) -> ColumnKind {
        match self {
            Self::CentroCostos
            | Self::Material
            | Self::Producto
            | Self::Marca
            | Self::PuntoVenta
            | Self::CanalRegional => ColumnKind::Text,
            Self::Indicador3Meses | Self::IndicadorVentasMesPasado => ColumnKind::Indicator,
            Self::Sugerido => ColumnKind::Suggested,
            _ => ColumnKind::Number,
        }
    }

    pub const fn default_visible(self) -> bool {
        !matches!(
            self,
            Self::Marca | Self::CanalRegional | Self::Maximo | Self::Mediana
        )
    }

    pub const fn default_width(self) -> u16 {
        match self.kind() {
            ColumnKind::Text => 14,
            ColumnKind::Number | ColumnKind::Indicator => 10,
            ColumnKind::Suggested => 9,
        }
    }

    pub const fn is_shipment(self) -> bool {
        matches!(self, Self::EnvioInventario3Meses | Self::EnvioVentasActuales)
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|column| column.slug() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnVisibility {
    visible: BTreeMap<ColumnId, bool>,
}

impl Default for ColumnVisibility {
    fn default() -> Self {
        Self {
            visible: ColumnId::ALL
                .iter()
                .map(|column| (*column, column.default_visible()))
                .collect(),
        }
    }
}

impl ColumnVisibility {
    pub fn is_visible(&self, column: ColumnId) -> bool {
        self.visible.get(&column).copied().unwrap_or(true)
    }

    pub fn set(&mut self, column: ColumnId, visible: bool) {
        self.visible.insert(column, visible);
    }

    pub fn toggle(&mut self, column: ColumnId) -> bool {
        let next = !self.is_visible(column);
        self.set(column, next);
        next
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn visible_columns(&self) -> Vec<ColumnId> {
        ColumnId::ALL
            .iter()
            .copied()
            .filter(|column| self.is_visible(*column))
            .collect()
    }
}

pub const MIN_COLUMN_WIDTH: u16 = 5;
pub const MAX_COLUMN_WIDTH: u16 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnWidths {
    overrides: BTreeMap<ColumnId, u16>,
}

impl ColumnWidths {
    pub fn width(&self, column: ColumnId) -> u16 {
        self.overrides
            .get(&column)
            .copied()
            .unwrap_or_else(|| column.default_width())
    }

    /// Grows or shrinks a column and returns the width actually applied.
    pub fn resize(&mut self, column: ColumnId, delta: i32) -> u16 {
        let next = (i32::from(self.width(column)) + delta)
            .clamp(i32::from(MIN_COLUMN_WIDTH), i32::from(MAX_COLUMN_WIDTH));
        let next = u16::try_from(next).unwrap_or(MIN_COLUMN_WIDTH);
        self.overrides.insert(column, next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ColumnId, ColumnVisibility, ColumnWidths, FilterField, FilterOptions, FilterSelection,
        MIN_COLUMN_WIDTH, PagePayload, PageQuery, PageResult, PageSize, Row,
    };
    use anyhow::Result;

    #[test]
    fn query_pairs_join_values_and_skip_empty_fields() {
        let mut filters = FilterSelection::default();
        filters.set(FilterField::Marca, ["Samsung", "Apple"]);
        filters.set(FilterField::Centro, ["C01"]);
        filters.set(FilterField::Punto, Vec::<String>::new());

        assert_eq!(
            filters.query_pairs(),
            vec![
                ("centro", "C01".to_owned()),
                ("marca", "Apple,Samsung".to_owned()),
            ]
        );
    }

    #[test]
    fn options_query_leaves_out_material_and_producto() {
        let mut filters = FilterSelection::default();
        filters.set(FilterField::Material, ["7000100"]);
        filters.set(FilterField::Producto, ["Galaxy A15"]);
        filters.set(FilterField::Canal, ["Retail"]);
        filters.set(FilterField::Centro, ["C01"]);

        assert_eq!(
            filters.options_query_pairs(),
            vec![("centro", "C01".to_owned()), ("canal", "Retail".to_owned())]
        );
        assert_eq!(filters.query_pairs().len(), 4);
    }

    #[test]
    fn empty_strings_mean_all() {
        let mut filters = FilterSelection::default();
        filters.set(FilterField::Canal, [""]);
        assert!(filters.is_empty());
        assert!(filters.get(FilterField::Canal).is_none());
    }

    #[test]
    fn retain_offered_drops_values_no_longer_listed() {
        let mut filters = FilterSelection::default();
        filters.set(FilterField::Centro, ["C01", "C02"]);
        filters.set(FilterField::Marca, ["Nokia"]);
        let options = FilterOptions {
            centros: vec!["C01".to_owned()],
            marcas: vec!["Apple".to_owned()],
            ..FilterOptions::default()
        };

        let dropped = filters.retain_offered(&options);
        assert_eq!(
            dropped,
            vec![
                (FilterField::Centro, "C02".to_owned()),
                (FilterField::Marca, "Nokia".to_owned()),
            ]
        );
        assert!(filters.is_selected(FilterField::Centro, "C01"));
        assert!(filters.get(FilterField::Marca).is_none());
    }

    #[test]
    fn page_size_only_accepts_allowed_values() {
        assert!(PageSize::new(50).is_some());
        assert!(PageSize::new(42).is_none());
        assert_eq!(PageSize::DEFAULT.larger().get(), 100);
        assert_eq!(PageSize::DEFAULT.smaller().get(), 25);
        assert_eq!(PageSize::new(500).map(PageSize::larger).map(PageSize::get), Some(500));
    }

    #[test]
    fn page_query_appends_paging_params() {
        let query = PageQuery {
            filters: FilterSelection::default(),
            page: 3,
            page_size: PageSize::DEFAULT,
        };
        assert_eq!(
            query.query_pairs(),
            vec![("page", "3".to_owned()), ("page_size", "50".to_owned())]
        );
    }

    #[test]
    fn page_result_fills_defaults_and_clamps_page() -> Result<()> {
        let payload: PagePayload = serde_json::from_str(r#"{"records":[],"page":9,"total_pages":2}"#)?;
        let result = PageResult::from_payload(payload, PageSize::DEFAULT);
        assert_eq!(result.page, 2);
        assert_eq!(result.page_size, 50);
        assert_eq!(result.total, 0);
        assert_eq!(result.total_pages, 2);

        let empty: PagePayload = serde_json::from_str("{}")?;
        let result = PageResult::from_payload(empty, PageSize::DEFAULT);
        assert_eq!((result.page, result.total_pages), (1, 1));
        Ok(())
    }

    #[test]
    fn row_decoding_accepts_numbers_strings_and_nulls() -> Result<()> {
        let row: Row = serde_json::from_str(
            r#"{"Centro Costos": 1001, "Material": "M-1", "Inventario": "12.5",
                "Transitos": null, "Envio_Pasadas": -3, "Indicador_3_Meses": "n/a"}"#,
        )?;
        assert_eq!(row.cost_center, "1001");
        assert_eq!(row.inventory, Some(12.5));
        assert_eq!(row.in_transit, None);
        assert_eq!(row.shipment_last_month, Some(-3.0));
        assert_eq!(row.indicator_three_months, None);
        assert_eq!(row.key().as_str(), "1001|M-1");
        Ok(())
    }

    #[test]
    fn column_visibility_defaults_and_reset() {
        let mut visibility = ColumnVisibility::default();
        assert!(!visibility.is_visible(ColumnId::Marca));
        assert!(visibility.is_visible(ColumnId::Sugerido));
        assert_eq!(visibility.visible_columns().len(), 14);

        visibility.toggle(ColumnId::Marca);
        assert!(visibility.is_visible(ColumnId::Marca));
        visibility.reset();
        assert!(!visibility.is_visible(ColumnId::Marca));
    }

    #[test]
    fn column_slugs_round_trip() {
        for column in ColumnId::ALL {
            assert_eq!(ColumnId::from_slug(column.slug()), Some(column));
        }
        assert_eq!(ColumnId::Sugerido.index(), 17);
    }

    #[test]
    fn column_resize_respects_minimum() {
        let mut widths = ColumnWidths::default();
        assert_eq!(widths.resize(ColumnId::Material, -100), MIN_COLUMN_WIDTH);
        assert_eq!(widths.resize(ColumnId::Material, 3), MIN_COLUMN_WIDTH + 3);
    }
}
