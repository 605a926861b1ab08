//! Accounts: the identities that write feedback and file reports.
//!
//! The same record shape lives in two stores, active and restricted. An
//! account moves between them wholesale; its id never changes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  User,
  Admin,
}

/// A persisted account record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
  pub account_id:    Uuid,
  pub first_name:    String,
  pub last_name:     String,
  pub user_name:     String,
  pub email:         String,
  pub password_hash: String,
  pub role:          Role,
  /// Dietary restrictions declared by the account holder.
  pub restrictions:  BTreeSet<String>,
  /// Denormalized ids of the feedback entries this account wrote, in
  /// submission order.
  pub feedback_ids:  Vec<Uuid>,
  /// Denormalized ids of the reports this account filed, in submission order.
  pub report_ids:    Vec<Uuid>,
}

impl Account {
  /// Build a fresh record from registration input.
  pub fn from_new(input: NewAccount) -> Self {
    Self {
      account_id:    Uuid::new_v4(),
      first_name:    input.first_name,
      last_name:     input.last_name,
      user_name:     input.user_name,
      email:         input.email,
      password_hash: input.password_hash,
      role:          input.role,
      restrictions:  input.restrictions,
      feedback_ids:  Vec::new(),
      report_ids:    Vec::new(),
    }
  }

  /// Overwrite the profile fields, keeping id and back-references.
  pub fn apply(&mut self, update: AccountUpdate) {
    self.first_name = update.first_name;
    self.last_name = update.last_name;
    self.user_name = update.user_name;
    self.email = update.email;
    if let Some(hash) = update.password_hash {
      self.password_hash = hash;
    }
    self.role = update.role;
    self.restrictions = update.restrictions;
  }
}

/// Registration input. The password arrives already hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
  pub first_name:    String,
  pub last_name:     String,
  pub user_name:     String,
  pub email:         String,
  pub password_hash: String,
  #[serde(default)]
  pub role:          Role,
  #[serde(default)]
  pub restrictions:  BTreeSet<String>,
}

/// Profile update input. `password_hash: None` keeps the stored hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUpdate {
  pub first_name:    String,
  pub last_name:     String,
  pub user_name:     String,
  pub email:         String,
  pub password_hash: Option<String>,
  pub role:          Role,
  pub restrictions:  BTreeSet<String>,
}

/// Append `id` unless it is already present. Returns whether the list grew.
pub fn append_unique(ids: &mut Vec<Uuid>, id: Uuid) -> bool {
  if ids.contains(&id) {
    return false;
  }
  ids.push(id);
  true
}

#[cfg(test)]
mod tests {
  use super::*;

  fn new_account() -> NewAccount {
    NewAccount {
      first_name:    "Ada".into(),
      last_name:     "Byron".into(),
      user_name:     "ada".into(),
      email:         "ada@example.com".into(),
      password_hash: "$argon2id$stub".into(),
      role:          Role::User,
      restrictions:  BTreeSet::from(["vegan".to_owned()]),
    }
  }

  #[test]
  fn from_new_starts_with_empty_back_references() {
    let account = Account::from_new(new_account());
    assert!(account.feedback_ids.is_empty());
    assert!(account.report_ids.is_empty());
    assert_eq!(account.user_name, "ada");
  }

  #[test]
  fn apply_keeps_hash_when_none_and_preserves_ids() {
    let mut account = Account::from_new(new_account());
    let feedback = Uuid::new_v4();
    account.feedback_ids.push(feedback);

    account.apply(AccountUpdate {
      first_name:    "Augusta".into(),
      last_name:     "King".into(),
      user_name:     "aking".into(),
      email:         "aking@example.com".into(),
      password_hash: None,
      role:          Role::Admin,
      restrictions:  BTreeSet::new(),
    });

    assert_eq!(account.password_hash, "$argon2id$stub");
    assert_eq!(account.feedback_ids, vec![feedback]);
    assert_eq!(account.role, Role::Admin);
    assert_eq!(account.email, "aking@example.com");
  }

  #[test]
  fn append_unique_skips_present_ids() {
    let id = Uuid::new_v4();
    let mut ids = Vec::new();
    assert!(append_unique(&mut ids, id));
    assert!(!append_unique(&mut ids, id));
    assert_eq!(ids.len(), 1);
  }
}
