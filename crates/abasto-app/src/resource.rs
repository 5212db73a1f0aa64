// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// How a resource addresses one record in update/delete paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAddress {
    /// Position in the stored list.
    Index,
    /// Server-assigned `id` field.
    IdField,
    /// The value of a natural key column.
    Column(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Inventario,
    Metas,
    Claro,
    Coltrade,
    OpsProductos,
    OpsPuntos,
    VentasClaro,
}

impl Resource {
    pub const ALL: [Self; 7] = [
        Self::Inventario,
        Self::Metas,
        Self::Claro,
        Self::Coltrade,
        Self::OpsProductos,
        Self::OpsPuntos,
        Self::VentasClaro,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Inventario => "inventario",
            Self::Metas => "metas",
            Self::Claro => "claro",
            Self::Coltrade => "coltrade",
            Self::OpsProductos => "opsproductos",
            Self::OpsPuntos => "opspuntos",
            Self::VentasClaro => "ventasclaro",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Inventario => "inventory",
            Self::Metas => "goals",
            Self::Claro => "claro",
            Self::Coltrade => "coltrade",
            Self::OpsProductos => "products",
            Self::OpsPuntos => "points of sale",
            Self::VentasClaro => "sales",
        }
    }

    pub const fn base_path(self) -> &'static str {
        match self {
            Self::Inventario => "/inventario/api",
            Self::Metas => "/metas/api",
            Self::Claro => "/claro/api",
            Self::Coltrade => "/coltrade/api",
            Self::OpsProductos => "/opsproductos/api",
            Self::OpsPuntos => "/opspuntos/api",
            Self::VentasClaro => "/ventasclaro/api",
        }
    }

    pub const fn collection(self) -> &'static str {
        match self {
            Self::Inventario | Self::Metas | Self::Claro | Self::Coltrade => "items",
            Self::OpsProductos => "products",
            Self::OpsPuntos => "puntos",
            Self::VentasClaro => "ventas",
        }
    }

    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::OpsPuntos => &["Centro Costos"],
            Self::VentasClaro => &["Centro Costos", "Material"],
            _ => &["Material"],
        }
    }

    pub const fn address(self) -> RecordAddress {
        match self {
            Self::Inventario | Self::Metas | Self::VentasClaro => RecordAddress::Index,
            Self::Claro | Self::Coltrade => RecordAddress::IdField,
            Self::OpsProductos => RecordAddress::Column("Material"),
            Self::OpsPuntos => RecordAddress::Column("Centro Costos"),
        }
    }

    /// Whether `{base}/pending` lists materials and centers missing from
    /// the product and point-of-sale catalogs.
    pub const fn has_pending_view(self) -> bool {
        matches!(self, Self::Inventario | Self::Metas | Self::VentasClaro)
    }

    pub fn collection_path(self) -> String {
        format!("{}/{}", self.base_path(), self.collection())
    }

    pub fn parse(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|resource| resource.name() == normalized)
            .ok_or_else(|| {
                if normalized == "compras" {
                    return anyhow!(
                        "compras is not a record resource -- use `abasto purchases` instead"
                    );
                }
                let known = Self::ALL.map(Self::name).join(", ");
                anyhow!("unknown resource {value:?} -- use one of: {known}")
            })
    }
}

/// Download format accepted by `{base}/export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Excel,
    Json,
}

impl ExportFormat {
    pub const fn param(self) -> &'static str {
        match self {
            Self::Excel => "excel",
            Self::Json => "json",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Excel => "xlsx",
            Self::Json => "json",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "excel" | "xlsx" => Ok(Self::Excel),
            "json" => Ok(Self::Json),
            other => Err(anyhow!(
                "unknown export format {other:?} -- use excel or json"
            )),
        }
    }
}
