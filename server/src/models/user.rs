// canteen-server/src/models/user.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profile row. The id is the identity provider's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub id: Uuid,
  pub name: String,
  pub student_id: String,
}

impl UserProfile {
  /// First and last name for the payment gateway's billing data. A single-word
  /// name is used for both.
  pub fn billing_names(&self) -> (String, String) {
    split_name(&self.name)
  }
}

pub fn split_name(full_name: &str) -> (String, String) {
  let trimmed = full_name.trim();
  match trimmed.split_once(char::is_whitespace) {
    Some((first, rest)) if !rest.trim().is_empty() => (first.to_string(), rest.trim().to_string()),
    _ => (trimmed.to_string(), trimmed.to_string()),
  }
}
