// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;

use crate::edits::EditBuffer;
use crate::ids::RowKey;
use crate::model::{ColumnId, ColumnKind, Row};

pub const MISSING: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub const fn marker(self) -> &'static str {
        match self {
            Self::Asc => "^",
            Self::Desc => "v",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: ColumnId,
    pub direction: SortDirection,
}

impl SortState {
    /// First activation of a column sorts descending; repeats toggle.
    pub fn next(current: Option<Self>, column: ColumnId) -> Self {
        match current {
            Some(state) if state.column == column => Self {
                column,
                direction: state.direction.toggled(),
            },
            _ => Self {
                column,
                direction: SortDirection::Desc,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentClass {
    Negative,
    Zero,
    Positive,
}

impl ShipmentClass {
    pub fn classify(value: f64) -> Self {
        if value < 0.0 {
            Self::Negative
        } else if value > 0.0 {
            Self::Positive
        } else {
            Self::Zero
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub key: RowKey,
    pub cells: Vec<String>,
}

impl ViewRow {
    pub fn cell(&self, column: ColumnId) -> &str {
        self.cells
            .get(column.index())
            .map_or(MISSING, String::as_str)
    }
}

/// The rendered page: display text per row and column, plus the local order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageView {
    rows: Vec<ViewRow>,
    order: Vec<usize>,
}

impl PageView {
    pub fn from_records(records: &[Row]) -> Self {
        let rows = records
            .iter()
            .map(|record| ViewRow {
                key: record.key(),
                cells: ColumnId::ALL
                    .iter()
                    .map(|column| display_cell(record, *column))
                    .collect(),
            })
            .collect::<Vec<_>>();
        let order = (0..rows.len()).collect();
        Self { rows, order }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in display order.
    pub fn rows(&self) -> impl Iterator<Item = &ViewRow> {
        self.order.iter().filter_map(|index| self.rows.get(*index))
    }

    pub fn row(&self, position: usize) -> Option<&ViewRow> {
        self.order
            .get(position)
            .and_then(|index| self.rows.get(*index))
    }

    /// Reorders the page by the numeric value of `column`.
    ///
    /// The ascending order is a stable sort over fetch order, and descending
    /// is exactly its reverse. The suggested column sorts by buffered values.
    pub fn sort(&mut self, column: ColumnId, direction: SortDirection, edits: &EditBuffer) {
        let keys = self
            .rows
            .iter()
            .map(|row| {
                if column == ColumnId::Sugerido {
                    coerce_numeric(edits.get(&row.key).unwrap_or_default())
                } else {
                    coerce_numeric(row.cell(column))
                }
            })
            .collect::<Vec<_>>();
        let mut order = (0..self.rows.len()).collect::<Vec<_>>();
        order.sort_by(|left, right| {
            keys[*left]
                .partial_cmp(&keys[*right])
                .unwrap_or(Ordering::Equal)
        });
        if direction == SortDirection::Desc {
            order.reverse();
        }
        self.order = order;
    }

    /// Divides every numeric cell of `column` in place and returns how many
    /// cells changed. Missing cells are left alone.
    pub fn divide_column(&mut self, column: ColumnId, divisor: f64) -> usize {
        let index = column.index();
        let mut modified = 0;
        for row in &mut self.rows {
            let Some(cell) = row.cells.get_mut(index) else {
                continue;
            };
            if cell == MISSING {
                continue;
            }
            if let Some(value) = parse_displayed(cell) {
                *cell = format_number(value / divisor);
                modified += 1;
            }
        }
        modified
    }

    pub fn shipment_class(&self, row: &ViewRow, column: ColumnId) -> Option<ShipmentClass> {
        if !column.is_shipment() {
            return None;
        }
        parse_displayed(row.cell(column)).map(ShipmentClass::classify)
    }
}

fn display_cell(record: &Row, column: ColumnId) -> String {
    let number = |value: Option<f64>| value.map_or_else(|| MISSING.to_owned(), format_number);
    let indicator = |value: Option<f64>| value.map_or_else(|| MISSING.to_owned(), format_indicator);
    match column {
        ColumnId::CentroCostos => record.cost_center.clone(),
        ColumnId::Material => record.material.clone(),
        ColumnId::Producto => record.product.clone(),
        ColumnId::Marca => record.brand.clone(),
        ColumnId::PuntoVenta => record.point_of_sale.clone(),
        ColumnId::CanalRegional => record.channel.clone(),
        ColumnId::VentasActuales => number(record.current_sales),
        ColumnId::VentasMesPasado => number(record.last_month_sales),
        ColumnId::Promedio3Meses => number(record.three_month_average),
        ColumnId::Maximo => format_number(0.0),
        ColumnId::Mediana => number(record.median),
        ColumnId::Inventario => number(record.inventory),
        ColumnId::Transitos => number(record.in_transit),
        ColumnId::Indicador3Meses => indicator(record.indicator_three_months),
        ColumnId::IndicadorVentasMesPasado => indicator(record.indicator_last_month),
        ColumnId::EnvioInventario3Meses => number(record.shipment_three_months),
        ColumnId::EnvioVentasActuales => number(record.shipment_last_month),
        ColumnId::Sugerido => String::new(),
    }
}

/// At most two decimals, trailing zeros dropped, `,` thousands separator.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return MISSING.to_owned();
    }
    let fixed = format!("{:.2}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');
    let negative = value < 0.0 && fixed.bytes().any(|byte| byte.is_ascii_digit() && byte != b'0');

    let mut out = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

pub fn format_indicator(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.4}")
    } else {
        MISSING.to_owned()
    }
}

/// Reads a displayed number back, ignoring grouping and any other decoration.
/// Only the longest leading number counts, so `15-128` reads as 15.
pub fn parse_displayed(text: &str) -> Option<f64> {
    let stripped = text
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == '-')
        .collect::<String>();
    let bytes = stripped.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    let mut digits = 0;
    let mut seen_dot = false;
    while let Some(&byte) = bytes.get(end) {
        match byte {
            b'0'..=b'9' => digits += 1,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if digits == 0 {
        return None;
    }
    stripped[..end].parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Sort key for a displayed cell: `-` and unparseable text count as zero.
pub fn coerce_numeric(text: &str) -> f64 {
    if text == MISSING {
        return 0.0;
    }
    parse_displayed(text).unwrap_or(0.0)
}
