// canteen-server/src/models/menu_item.rs

use crate::models::money::{self, Cents};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
  pub id: i64,
  pub name: String,
  #[serde(rename = "price", with = "money::decimal")]
  pub price_cents: Cents,
  pub category: String,
  pub description: Option<String>,
  pub image_url: Option<String>,
  pub available: bool,
}

/// Groups items by category, keeping each category's input order.
pub fn group_by_category(items: Vec<MenuItem>) -> BTreeMap<String, Vec<MenuItem>> {
  let mut grouped: BTreeMap<String, Vec<MenuItem>> = BTreeMap::new();
  for item in items {
    grouped.entry(item.category.clone()).or_default().push(item);
  }
  grouped
}
