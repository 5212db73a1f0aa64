// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::model::{number_field, text_field};

pub const PURCHASES_BASE: &str = "/compras/api";
pub const PURCHASES_EXPORT_NAME: &str = "compras.xlsx";

/// One row of `/compras/api/compras`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PurchaseSuggestion {
    #[serde(rename = "Material", default, deserialize_with = "text_field")]
    pub material: String,
    #[serde(rename = "Producto", default, deserialize_with = "text_field")]
    pub product: String,
    #[serde(rename = "Marca", default, deserialize_with = "text_field")]
    pub brand: String,
    #[serde(rename = "Sugerido", default, deserialize_with = "number_field")]
    pub suggested: Option<f64>,
    #[serde(rename = "Confirmar", default, deserialize_with = "flag_field")]
    pub approved: bool,
    #[serde(rename = "Observacion", default, deserialize_with = "text_field")]
    pub note: String,
}

impl PurchaseSuggestion {
    /// The label the backend writes into the `Estado` export column.
    pub const fn status(&self) -> &'static str {
        if self.approved { "Aprobado" } else { "No aprobado" }
    }

    /// Case-insensitive match on material, product or brand.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        needle.is_empty()
            || [&self.material, &self.product, &self.brand]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
    }
}

pub fn filter_purchases<'a>(
    items: &'a [PurchaseSuggestion],
    query: &str,
) -> Vec<&'a PurchaseSuggestion> {
    items.iter().filter(|item| item.matches(query)).collect()
}

/// Body of `/compras/api/update`. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseUpdate {
    #[serde(rename = "Material")]
    material: String,
    #[serde(rename = "Confirmar", skip_serializing_if = "Option::is_none")]
    approved: Option<bool>,
    #[serde(rename = "Observacion", skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

impl PurchaseUpdate {
    pub fn approve(material: &str, approved: bool) -> Result<Self> {
        Ok(Self {
            material: required_material(material)?,
            approved: Some(approved),
            note: None,
        })
    }

    pub fn note(material: &str, text: &str) -> Result<Self> {
        Ok(Self {
            material: required_material(material)?,
            approved: None,
            note: Some(text.trim().to_owned()),
        })
    }

    pub fn material(&self) -> &str {
        &self.material
    }
}

fn required_material(material: &str) -> Result<String> {
    let material = material.trim();
    if material.is_empty() {
        bail!("Material is required -- pass the material code and retry");
    }
    Ok(material.to_owned())
}

fn flag_field<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => matches!(
            text.trim().to_lowercase().as_str(),
            "true" | "1" | "si" | "sí" | "aprobado"
        ),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::{PurchaseSuggestion, PurchaseUpdate, filter_purchases};
    use serde_json::json;

    fn suggestions() -> Vec<PurchaseSuggestion> {
        serde_json::from_value(json!([
            {"Material": 7000100, "Producto": "Galaxy A15", "Marca": "Samsung", "Sugerido": "12", "Confirmar": true, "Observacion": null},
            {"Material": "7000103", "Producto": "iPhone 15", "Marca": "Apple", "Sugerido": 4.5, "Confirmar": "false"},
            {"Material": "7000109", "Producto": "Moto G54", "Marca": "Motorola"}
        ]))
        .expect("suggestions")
    }

    #[test]
    fn suggestions_decode_loose_values() {
        let items = suggestions();
        assert_eq!(items[0].material, "7000100");
        assert_eq!(items[0].suggested, Some(12.0));
        assert!(items[0].approved);
        assert_eq!(items[0].status(), "Aprobado");
        assert_eq!(items[0].note, "");
        assert!(!items[1].approved);
        assert_eq!(items[1].status(), "No aprobado");
        assert_eq!(items[2].suggested, None);
    }

    #[test]
    fn search_covers_material_product_and_brand() {
        let items = suggestions();
        let found = |query: &str| {
            filter_purchases(&items, query)
                .iter()
                .map(|item| item.material.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(found("apple"), vec!["7000103"]);
        assert_eq!(found("MOTO"), vec!["7000109"]);
        assert_eq!(found("70001"), vec!["7000100", "7000103", "7000109"]);
        assert_eq!(found("  ").len(), 3);
        assert!(found("huawei").is_empty());
    }

    #[test]
    fn update_bodies_carry_only_what_changed() {
        let approve = PurchaseUpdate::approve(" 7000100 ", true).expect("material");
        assert_eq!(
            serde_json::to_value(&approve).expect("json"),
            json!({"Material": "7000100", "Confirmar": true})
        );

        let note = PurchaseUpdate::note("7000103", " llega en junio ").expect("material");
        assert_eq!(
            serde_json::to_value(&note).expect("json"),
            json!({"Material": "7000103", "Observacion": "llega en junio"})
        );

        let error = PurchaseUpdate::approve("  ", false).expect_err("blank material");
        assert!(error.to_string().contains("Material is required"));
    }
}
