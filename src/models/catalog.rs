// src/models/catalog.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---
// 1. Valores brutos do ERP
// ---
// O driver do ERP devolve flags como bit, inteiro ou texto ("Y", "1", "true"...).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawFlag {
    Bool(bool),
    Number(f64),
    Text(String),
}

// NUMERIC pode chegar como número JSON ou como texto.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(serde_json::Number),
    Text(String),
}

// ---
// 2. Linhas brutas (schema fixo validado na fronteira do SourceReader)
// ---
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawGroupRow {
    #[serde(rename = "ITM_GROUP_CODE", default)]
    pub group_code: Option<String>,
    #[serde(rename = "ITM_GROUP_NAME", default)]
    pub group_name: Option<String>,
    #[serde(rename = "PARENT_GROUP_CODE", default)]
    pub parent_group_code: Option<String>,
    #[serde(rename = "GROUP_ORDER", default)]
    pub group_order: Option<RawNumber>,
    #[serde(rename = "SHOW_IN_WEBSITE", default)]
    pub show_in_website: Option<RawFlag>,
    #[serde(rename = "SALEABLE", default)]
    pub saleable: Option<RawFlag>,
    #[serde(rename = "WEBSITE_NAME_EN", default)]
    pub website_name_en: Option<String>,
    #[serde(rename = "WEBSITE_NAME_AR", default)]
    pub website_name_ar: Option<String>,
    #[serde(rename = "WEBSITE_DESCRIPTION_EN", default)]
    pub website_description_en: Option<String>,
    #[serde(rename = "WEBSITE_DESCRIPTION_AR", default)]
    pub website_description_ar: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawItemRow {
    #[serde(rename = "ITEM_CODE", default)]
    pub item_code: Option<String>,
    #[serde(rename = "ITEM_NAME", default)]
    pub item_name: Option<String>,
    #[serde(rename = "ITM_GROUP_CODE", default)]
    pub group_code: Option<String>,
    #[serde(rename = "MENU_ORDER", default)]
    pub menu_order: Option<RawNumber>,
    #[serde(rename = "SALES_PRICE", default)]
    pub sales_price: Option<RawNumber>,
    #[serde(rename = "ITEM_PIC", default)]
    pub photo: Option<String>,
    #[serde(rename = "SHOW_IN_WEBSITE", default)]
    pub show_in_website: Option<RawFlag>,
    #[serde(rename = "SALEABLE", default)]
    pub saleable: Option<RawFlag>,
    #[serde(rename = "WEBSITE_NAME_EN", default)]
    pub website_name_en: Option<String>,
    #[serde(rename = "WEBSITE_NAME_AR", default)]
    pub website_name_ar: Option<String>,
    #[serde(rename = "WEBSITE_DESCRIPTION_EN", default)]
    pub website_description_en: Option<String>,
    #[serde(rename = "WEBSITE_DESCRIPTION_AR", default)]
    pub website_description_ar: Option<String>,
    #[serde(rename = "FASTING", default)]
    pub fasting: Option<RawFlag>,
    #[serde(rename = "VEGETARIAN", default)]
    pub vegetarian: Option<RawFlag>,
    #[serde(rename = "HEALTHY_CHOICE", default)]
    pub healthy_choice: Option<RawFlag>,
    #[serde(rename = "SIGNATURE_DISH", default)]
    pub signature_dish: Option<RawFlag>,
    #[serde(rename = "SPICY", default)]
    pub spicy: Option<RawFlag>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawBranchRow {
    #[serde(rename = "BRANCH_CODE", default)]
    pub branch_code: Option<String>,
    #[serde(rename = "BRANCH_NAME", default)]
    pub branch_name: Option<String>,
}

/// Filial a sincronizar: código da partição + nome para relatórios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRef {
    pub code: String,
    pub name: String,
}

// ---
// 3. Registros do destino
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CatalogGroup {
    pub itm_group_code: String,
    pub branch_code: String,
    pub itm_group_name: String,
    pub order_group: Option<i32>,
    pub show_in_website: Option<bool>,
    pub saleable: Option<bool>,
    pub website_name_en: String,
    pub website_name_ar: String,
    pub website_description_en: String,
    pub website_description_ar: String,
    pub parent_group_code: String,
    pub nested_level: i32,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub itm_code: String,
    pub branch_code: String,
    pub itm_name: String,
    pub item_order: Option<i32>,
    // Só preenchido quando o grupo existe no conjunto validado da filial.
    pub itm_group_code: Option<String>,
    pub photo_url: Option<String>,
    pub sales_price: Option<Decimal>,
    pub show_in_website: Option<bool>,
    pub saleable: Option<bool>,
    pub website_name_en: String,
    pub website_name_ar: String,
    pub website_description_en: String,
    pub website_description_ar: String,
    pub fasting: Option<bool>,
    pub vegetarian: Option<bool>,
    pub healthy_choice: Option<bool>,
    pub signature_dish: Option<bool>,
    pub spicy: Option<bool>,
}

/// Espelho leve da filial no destino (tabela `restaurant_branches`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchMirror {
    pub branch_code: String,
    pub branch_name: String,
}

impl From<&BranchRef> for BranchMirror {
    fn from(branch: &BranchRef) -> Self {
        Self {
            branch_code: branch.code.clone(),
            branch_name: branch.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub name: String,
    pub address: String,
    pub city: String,
    pub map_link: String,
    pub working_hours: Option<String>,
}

// ---
// 4. Visões de leitura do cardápio
// ---
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemView {
    pub id: String,
    pub name: String,
    pub name_ar: String,
    pub order: Option<i32>,
    pub description: String,
    pub description_ar: String,
    pub price: String,
    pub category: Option<String>,
    pub photo_url: Option<String>,
    pub show_in_website: Option<bool>,
    pub saleable: Option<bool>,
}

impl From<CatalogItem> for MenuItemView {
    fn from(item: CatalogItem) -> Self {
        let name = if item.website_name_en.is_empty() {
            item.itm_name
        } else {
            item.website_name_en
        };
        Self {
            id: item.itm_code,
            name,
            name_ar: item.website_name_ar,
            order: item.item_order,
            description: item.website_description_en,
            description_ar: item.website_description_ar,
            price: item
                .sales_price
                .map(|price| format!("${:.2}", price))
                .unwrap_or_default(),
            category: item.itm_group_code,
            photo_url: item.photo_url,
            show_in_website: item.show_in_website,
            saleable: item.saleable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuCategoryView {
    pub id: String,
    pub name: String,
    pub name_ar: String,
    pub order_group: Option<i32>,
    pub nested_level: i32,
    pub parent_group_code: String,
    pub path: String,
}

impl From<CatalogGroup> for MenuCategoryView {
    fn from(group: CatalogGroup) -> Self {
        let name = if group.website_name_en.is_empty() {
            group.itm_group_name
        } else {
            group.website_name_en
        };
        Self {
            id: group.itm_group_code,
            name,
            name_ar: group.website_name_ar,
            order_group: group.order_group,
            nested_level: group.nested_level,
            parent_group_code: group.parent_group_code,
            path: group.path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn raw_item_row_accepts_mixed_driver_types() {
        let row: RawItemRow = serde_json::from_value(json!({
            "ITEM_CODE": " I1 ",
            "ITM_GROUP_CODE": "G2",
            "MENU_ORDER": "3",
            "SALES_PRICE": 12.5,
            "SALEABLE": true,
            "SPICY": 0,
            "FASTING": "Y",
            "VEGETARIAN": null,
            "BRANCH": "01"
        }))
        .unwrap();

        assert_eq!(row.item_code.as_deref(), Some(" I1 "));
        assert_eq!(row.menu_order, Some(RawNumber::Text("3".into())));
        assert_eq!(row.saleable, Some(RawFlag::Bool(true)));
        assert_eq!(row.spicy, Some(RawFlag::Number(0.0)));
        assert_eq!(row.fasting, Some(RawFlag::Text("Y".into())));
        assert_eq!(row.vegetarian, None);
        assert_eq!(row.photo, None);
    }

    #[test]
    fn menu_item_view_prefers_website_name_and_formats_price() {
        let item = CatalogItem {
            itm_code: "I1".into(),
            branch_code: "01".into(),
            itm_name: "Internal".into(),
            item_order: Some(1),
            itm_group_code: Some("G2".into()),
            photo_url: None,
            sales_price: Some(Decimal::new(35, 1)),
            show_in_website: Some(true),
            saleable: Some(true),
            website_name_en: "Falafel".into(),
            website_name_ar: "فلافل".into(),
            website_description_en: String::new(),
            website_description_ar: String::new(),
            fasting: None,
            vegetarian: None,
            healthy_choice: None,
            signature_dish: None,
            spicy: None,
        };

        let view = MenuItemView::from(item);
        assert_eq!(view.name, "Falafel");
        assert_eq!(view.price, "$3.50");
        assert_eq!(view.category.as_deref(), Some("G2"));
    }
}
