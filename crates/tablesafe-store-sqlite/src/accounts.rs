//! [`SqliteAccounts`]: active and restricted accounts.
//!
//! Both key spaces live in sibling tables of identical shape. Every method
//! touches a single account row inside one SQLite transaction; moves between
//! the tables are composed by the caller.

use rusqlite::OptionalExtension as _;
use tablesafe_core::{
  Error as DomainError, RecordKind,
  account::{Account, AccountUpdate, NewAccount},
  store::AccountStore,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{ACCOUNT_COLUMNS, RawAccount, decode_json, encode_json, encode_uuid},
  error::in_call,
};

const ACTIVE: &str = "accounts";
const RESTRICTED: &str = "restricted_accounts";

/// Outcome of a write that is guarded by a uniqueness or existence check.
enum Guarded<T> {
  Done(T),
  Held(&'static str),
  Missing,
}

#[derive(Clone)]
pub struct SqliteAccounts {
  conn: tokio_rusqlite::Connection,
}

impl SqliteAccounts {
  pub(crate) fn new(conn: tokio_rusqlite::Connection) -> Self { Self { conn } }

  async fn find_one(
    &self,
    table: &'static str,
    column: &'static str,
    value: String,
  ) -> Result<Option<Account>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_one(conn, table, column, &value)?))
      .await?;
    raw.map(RawAccount::into_account).transpose()
  }

  async fn list_table(&self, table: &'static str) -> Result<Vec<Account>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM {table} ORDER BY rowid"))?;
        let rows = stmt
          .query_map([], RawAccount::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAccount::into_account).collect()
  }

  /// Append `value` to the JSON id list in `column` unless present.
  ///
  /// Returns `None` if the account does not exist.
  async fn append_id(
    &self,
    id: Uuid,
    column: &'static str,
    value: Uuid,
  ) -> Result<Option<bool>> {
    let id_str = encode_uuid(id);

    let appended = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<String> = tx
          .query_row(
            &format!("SELECT {column} FROM {ACTIVE} WHERE account_id = ?1"),
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(current) = current else {
          return Ok(None);
        };

        let mut ids: Vec<Uuid> = decode_json(&current).map_err(in_call)?;
        if !tablesafe_core::account::append_unique(&mut ids, value) {
          return Ok(Some(false));
        }
        let encoded = encode_json(&ids).map_err(in_call)?;
        tx.execute(
          &format!("UPDATE {ACTIVE} SET {column} = ?2 WHERE account_id = ?1"),
          rusqlite::params![id_str, encoded],
        )?;
        tx.commit()?;
        Ok(Some(true))
      })
      .await?;

    Ok(appended)
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn select_one(
  conn: &rusqlite::Connection,
  table: &str,
  column: &str,
  value: &str,
) -> rusqlite::Result<Option<RawAccount>> {
  conn
    .query_row(
      &format!("SELECT {ACCOUNT_COLUMNS} FROM {table} WHERE {column} = ?1"),
      rusqlite::params![value],
      RawAccount::from_row,
    )
    .optional()
}

/// The first of `keys` held in `table` by an account other than `except`.
fn held_key(
  conn: &rusqlite::Connection,
  table: &str,
  keys: &[(&'static str, &str)],
  except: Option<&str>,
) -> rusqlite::Result<Option<&'static str>> {
  for &(field, value) in keys {
    let held = conn
      .query_row(
        &format!(
          "SELECT 1 FROM {table} WHERE {field} = ?1 AND (?2 IS NULL OR account_id <> ?2)"
        ),
        rusqlite::params![value, except],
        |_| Ok(()),
      )
      .optional()?
      .is_some();
    if held {
      return Ok(Some(field));
    }
  }
  Ok(None)
}

fn insert_row(
  conn: &rusqlite::Connection,
  table: &str,
  raw: &RawAccount,
  replace: bool,
) -> rusqlite::Result<()> {
  let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
  conn.execute(
    &format!(
      "{verb} INTO {table} ({ACCOUNT_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
    ),
    rusqlite::params![
      raw.account_id,
      raw.first_name,
      raw.last_name,
      raw.user_name,
      raw.email,
      raw.password_hash,
      raw.role,
      raw.restrictions,
      raw.feedback_ids,
      raw.report_ids,
    ],
  )?;
  Ok(())
}

fn key_value(account: &Account, field: &str) -> String {
  match field {
    "email" => account.email.clone(),
    _ => account.user_name.clone(),
  }
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteAccounts {
  // ── Active accounts ───────────────────────────────────────────────────────

  async fn create(&self, input: NewAccount) -> tablesafe_core::Result<Account> {
    let account = Account::from_new(input);
    let raw = RawAccount::from_account(&account)?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let keys = [("email", raw.email.as_str()), ("user_name", raw.user_name.as_str())];
        for table in [ACTIVE, RESTRICTED] {
          if let Some(field) = held_key(&tx, table, &keys, None)? {
            return Ok(Guarded::Held(field));
          }
        }
        insert_row(&tx, ACTIVE, &raw, false)?;
        tx.commit()?;
        Ok(Guarded::Done(()))
      })
      .await
      .map_err(Error::from)?;

    match outcome {
      Guarded::Done(()) => Ok(account),
      Guarded::Held(field) => Err(DomainError::DuplicateKey {
        kind: RecordKind::Account,
        field,
        value: key_value(&account, field),
      }),
      Guarded::Missing => Err(DomainError::not_found(RecordKind::Account, account.account_id)),
    }
  }

  async fn find_by_id(&self, id: Uuid) -> tablesafe_core::Result<Option<Account>> {
    Ok(self.find_one(ACTIVE, "account_id", encode_uuid(id)).await?)
  }

  async fn find_by_email(&self, email: String) -> tablesafe_core::Result<Option<Account>> {
    Ok(self.find_one(ACTIVE, "email", email).await?)
  }

  async fn find_by_user_name(
    &self,
    user_name: String,
  ) -> tablesafe_core::Result<Option<Account>> {
    Ok(self.find_one(ACTIVE, "user_name", user_name).await?)
  }

  async fn list(&self) -> tablesafe_core::Result<Vec<Account>> {
    Ok(self.list_table(ACTIVE).await?)
  }

  async fn update(
    &self,
    id: Uuid,
    update: AccountUpdate,
  ) -> tablesafe_core::Result<Account> {
    let Some(mut account) = self.find_one(ACTIVE, "account_id", encode_uuid(id)).await? else {
      return Err(DomainError::not_found(RecordKind::Account, id));
    };
    account.apply(update);
    let raw = RawAccount::from_account(&account)?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let except = Some(raw.account_id.as_str());
        let keys = [("email", raw.email.as_str()), ("user_name", raw.user_name.as_str())];
        if let Some(field) = held_key(&tx, ACTIVE, &keys, except)? {
          return Ok(Guarded::Held(field));
        }
        // Against profile updates a restricted account reserves only its
        // email. Its user name may be taken, which then blocks unrestricting
        // it with a conflict.
        if let Some(field) = held_key(&tx, RESTRICTED, &keys[..1], except)? {
          return Ok(Guarded::Held(field));
        }

        // Back-reference columns are left alone so concurrent appends survive.
        let changed = tx.execute(
          &format!(
            "UPDATE {ACTIVE}
             SET first_name = ?2, last_name = ?3, user_name = ?4, email = ?5,
                 password_hash = ?6, role = ?7, restrictions = ?8
             WHERE account_id = ?1"
          ),
          rusqlite::params![
            raw.account_id,
            raw.first_name,
            raw.last_name,
            raw.user_name,
            raw.email,
            raw.password_hash,
            raw.role,
            raw.restrictions,
          ],
        )?;
        if changed == 0 {
          return Ok(Guarded::Missing);
        }
        let fresh = select_one(&tx, ACTIVE, "account_id", &raw.account_id)?;
        tx.commit()?;
        Ok(fresh.map_or(Guarded::Missing, Guarded::Done))
      })
      .await
      .map_err(Error::from)?;

    match outcome {
      Guarded::Done(raw) => Ok(raw.into_account()?),
      Guarded::Held(field) => Err(DomainError::Conflict {
        kind: RecordKind::Account,
        id,
        field,
        value: key_value(&account, field),
      }),
      Guarded::Missing => Err(DomainError::not_found(RecordKind::Account, id)),
    }
  }

  async fn delete(&self, id: Uuid) -> tablesafe_core::Result<Account> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(raw) = select_one(&tx, ACTIVE, "account_id", &id_str)? else {
          return Ok(None);
        };
        tx.execute(
          &format!("DELETE FROM {ACTIVE} WHERE account_id = ?1"),
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await
      .map_err(Error::from)?;

    match raw {
      Some(raw) => Ok(raw.into_account()?),
      None => Err(DomainError::not_found(RecordKind::Account, id)),
    }
  }

  async fn append_feedback_id(
    &self,
    id: Uuid,
    feedback_id: Uuid,
  ) -> tablesafe_core::Result<bool> {
    self
      .append_id(id, "feedback_ids", feedback_id)
      .await?
      .ok_or(DomainError::not_found(RecordKind::Account, id))
  }

  async fn append_report_id(&self, id: Uuid, report_id: Uuid) -> tablesafe_core::Result<bool> {
    self
      .append_id(id, "report_ids", report_id)
      .await?
      .ok_or(DomainError::not_found(RecordKind::Account, id))
  }

  async fn insert_active(&self, account: Account) -> tablesafe_core::Result<()> {
    let raw = RawAccount::from_account(&account)?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if select_one(&tx, ACTIVE, "account_id", &raw.account_id)?.is_some() {
          return Ok(Guarded::Done(false));
        }
        let keys = [("email", raw.email.as_str()), ("user_name", raw.user_name.as_str())];
        if let Some(field) = held_key(&tx, ACTIVE, &keys, Some(raw.account_id.as_str()))? {
          return Ok(Guarded::Held(field));
        }
        insert_row(&tx, ACTIVE, &raw, false)?;
        tx.commit()?;
        Ok(Guarded::Done(true))
      })
      .await
      .map_err(Error::from)?;

    match outcome {
      Guarded::Done(inserted) => {
        debug!(account_id = %account.account_id, inserted, "account active");
        Ok(())
      }
      Guarded::Held(field) => Err(DomainError::Conflict {
        kind: RecordKind::RestrictedAccount,
        id: account.account_id,
        field,
        value: key_value(&account, field),
      }),
      Guarded::Missing => Err(DomainError::not_found(RecordKind::Account, account.account_id)),
    }
  }

  // ── Restricted accounts ───────────────────────────────────────────────────

  async fn find_restricted_by_id(&self, id: Uuid) -> tablesafe_core::Result<Option<Account>> {
    Ok(self.find_one(RESTRICTED, "account_id", encode_uuid(id)).await?)
  }

  async fn list_restricted(&self) -> tablesafe_core::Result<Vec<Account>> {
    Ok(self.list_table(RESTRICTED).await?)
  }

  async fn insert_restricted(&self, account: Account) -> tablesafe_core::Result<()> {
    let raw = RawAccount::from_account(&account)?;

    self
      .conn
      .call(move |conn| Ok(insert_row(conn, RESTRICTED, &raw, true)?))
      .await
      .map_err(Error::from)?;

    debug!(account_id = %account.account_id, "account restricted copy written");
    Ok(())
  }

  async fn delete_restricted(&self, id: Uuid) -> tablesafe_core::Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          &format!("DELETE FROM {RESTRICTED} WHERE account_id = ?1"),
          rusqlite::params![id_str],
        )?;
        Ok(n > 0)
      })
      .await
      .map_err(Error::from)?;

    Ok(removed)
  }
}
