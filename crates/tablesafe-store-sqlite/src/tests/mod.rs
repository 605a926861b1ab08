//! Tests for the SQLite stores and for the coordinator running on top of
//! them, all against in-memory databases.

use std::collections::BTreeSet;

use tablesafe_core::{
  account::{Account, NewAccount, Role},
  store::{AccountStore, SubjectStore},
  subject::{NewSubject, Subject},
};

use crate::SqliteStore;

mod stores;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_account(user_name: &str) -> NewAccount {
  NewAccount {
    first_name:    "Ada".into(),
    last_name:     "Lovelace".into(),
    user_name:     user_name.into(),
    email:         format!("{user_name}@example.com"),
    password_hash: "$argon2id$stub".into(),
    role:          Role::User,
    restrictions:  BTreeSet::new(),
  }
}

fn new_subject(name: &str, tags: &[&str]) -> NewSubject {
  NewSubject {
    name:      name.into(),
    address:   "1 Harbour St".into(),
    category:  "restaurant".into(),
    diet_tags: tags.iter().map(|t| t.to_string()).collect(),
  }
}

async fn account(accounts: &impl AccountStore, user_name: &str) -> Account {
  accounts
    .create(new_account(user_name))
    .await
    .expect("create account")
}

async fn subject(subjects: &impl SubjectStore, name: &str) -> Subject {
  subjects
    .create(new_subject(name, &[]))
    .await
    .expect("create subject")
}
