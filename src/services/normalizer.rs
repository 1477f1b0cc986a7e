// src/services/normalizer.rs

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::{
    common::error::SyncError,
    models::catalog::{CatalogGroup, CatalogItem, RawFlag, RawGroupRow, RawItemRow, RawNumber},
    services::hierarchy::ResolvedHierarchy,
};

const TRUE_TOKENS: [&str; 5] = ["1", "true", "t", "y", "yes"];
const FALSE_TOKENS: [&str; 5] = ["0", "false", "f", "n", "no"];

/// Booleano de três estados: `None` quando a origem não informou.
pub fn coerce_flag(value: Option<&RawFlag>) -> Option<bool> {
    match value? {
        RawFlag::Bool(b) => Some(*b),
        RawFlag::Number(n) => Some(*n != 0.0),
        RawFlag::Text(text) => {
            let token = text.trim().to_ascii_lowercase();
            if TRUE_TOKENS.contains(&token.as_str()) {
                Some(true)
            } else if FALSE_TOKENS.contains(&token.as_str()) {
                Some(false)
            } else {
                // Qualquer outro texto: verdadeiro se não for vazio.
                Some(!token.is_empty())
            }
        }
    }
}

fn text(value: Option<&String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn code(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_order(
    record: &'static str,
    owner: &str,
    field: &'static str,
    value: Option<&RawNumber>,
) -> Result<Option<i32>, SyncError> {
    let invalid = |raw: &dyn std::fmt::Display| {
        SyncError::normalization(record, owner, field, format!("'{raw}' is not a whole number"))
    };
    match value {
        None => Ok(None),
        Some(RawNumber::Number(n)) => {
            let whole = match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Some(i),
                (None, Some(f)) if f.fract() == 0.0 => Some(f as i64),
                _ => None,
            };
            whole
                .and_then(|i| i32::try_from(i).ok())
                .map(Some)
                .ok_or_else(|| invalid(n))
        }
        Some(RawNumber::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawNumber::Text(s)) => s.trim().parse::<i32>().map(Some).map_err(|_| invalid(s)),
    }
}

fn parse_price(owner: &str, value: Option<&RawNumber>) -> Result<Option<Decimal>, SyncError> {
    let invalid = |raw: &dyn std::fmt::Display| {
        SyncError::normalization("item", owner, "SALES_PRICE", format!("'{raw}' is not a number"))
    };
    match value {
        None => Ok(None),
        Some(RawNumber::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Some(Decimal::from(i))),
            (None, Some(f)) => Decimal::try_from(f).map(Some).map_err(|_| invalid(n)),
            _ => Err(invalid(n)),
        },
        Some(RawNumber::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawNumber::Text(s)) => s.trim().parse::<Decimal>().map(Some).map_err(|_| invalid(s)),
    }
}

/// Converte uma linha de grupo já com a hierarquia resolvida.
pub fn normalize_group(
    row: &RawGroupRow,
    hierarchy: ResolvedHierarchy,
    branch_code: &str,
) -> Result<CatalogGroup, SyncError> {
    let group_code = code(row.group_code.as_ref())
        .ok_or_else(|| SyncError::normalization("group", "", "ITM_GROUP_CODE", "missing group code"))?;

    Ok(CatalogGroup {
        order_group: parse_order("group", &group_code, "GROUP_ORDER", row.group_order.as_ref())?,
        itm_group_name: text(row.group_name.as_ref()),
        show_in_website: coerce_flag(row.show_in_website.as_ref()),
        saleable: coerce_flag(row.saleable.as_ref()),
        website_name_en: text(row.website_name_en.as_ref()),
        website_name_ar: text(row.website_name_ar.as_ref()),
        website_description_en: text(row.website_description_en.as_ref()),
        website_description_ar: text(row.website_description_ar.as_ref()),
        branch_code: branch_code.to_string(),
        parent_group_code: hierarchy.parent_group_code,
        nested_level: hierarchy.nested_level,
        path: hierarchy.path,
        itm_group_code: group_code,
    })
}

/// Converte uma linha de item. A referência ao grupo só é mantida se o grupo
/// estiver no conjunto validado da filial; caso contrário fica nula.
pub fn normalize_item(
    row: &RawItemRow,
    valid_groups: &HashSet<String>,
    branch_code: &str,
) -> Result<CatalogItem, SyncError> {
    let item_code = code(row.item_code.as_ref())
        .ok_or_else(|| SyncError::normalization("item", "", "ITEM_CODE", "missing item code"))?;

    Ok(CatalogItem {
        itm_name: text(row.item_name.as_ref()),
        item_order: parse_order("item", &item_code, "MENU_ORDER", row.menu_order.as_ref())?,
        itm_group_code: code(row.group_code.as_ref()).filter(|group| valid_groups.contains(group)),
        photo_url: code(row.photo.as_ref()),
        sales_price: parse_price(&item_code, row.sales_price.as_ref())?,
        show_in_website: coerce_flag(row.show_in_website.as_ref()),
        saleable: coerce_flag(row.saleable.as_ref()),
        website_name_en: text(row.website_name_en.as_ref()),
        website_name_ar: text(row.website_name_ar.as_ref()),
        website_description_en: text(row.website_description_en.as_ref()),
        website_description_ar: text(row.website_description_ar.as_ref()),
        branch_code: branch_code.to_string(),
        fasting: coerce_flag(row.fasting.as_ref()),
        vegetarian: coerce_flag(row.vegetarian.as_ref()),
        healthy_choice: coerce_flag(row.healthy_choice.as_ref()),
        signature_dish: coerce_flag(row.signature_dish.as_ref()),
        spicy: coerce_flag(row.spicy.as_ref()),
        itm_code: item_code,
    })
}
