//! Store traits, one per record type.
//!
//! Each trait is implemented by a storage backend (e.g.
//! `tablesafe-store-sqlite`). Every method is atomic for the single record it
//! touches and nothing more: stores never look into each other, and no
//! method spans two records except the provided move operations, which are
//! sequences of single-record steps.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Error, Result,
  account::{Account, AccountUpdate, NewAccount},
  error::RecordKind,
  feedback::FeedbackEntry,
  report::{Report, ReportStatus},
  subject::{DietFilter, NewSubject, RatingMeans, RatingSample, Subject, SubjectUpdate},
};

// ─── Accounts ────────────────────────────────────────────────────────────────

/// Active and restricted account records.
///
/// The two key spaces are disjoint: an id lives in one of them, except
/// transiently while a move is in flight.
pub trait AccountStore: Send + Sync {
  // ── Active accounts ───────────────────────────────────────────────────

  /// Register a new active account.
  ///
  /// Fails with [`Error::DuplicateKey`] if the email or user name is held by
  /// an active or a restricted account.
  fn create(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Account>> + Send + '_;

  fn find_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Account>>> + Send + '_;

  fn find_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Account>>> + Send + '_;

  fn find_by_user_name(
    &self,
    user_name: String,
  ) -> impl Future<Output = Result<Option<Account>>> + Send + '_;

  fn list(&self) -> impl Future<Output = Result<Vec<Account>>> + Send + '_;

  /// Replace the profile fields of an active account.
  ///
  /// Fails with [`Error::Conflict`] if the new email or user name belongs to
  /// another active account, or the new email to a restricted one.
  fn update(
    &self,
    id: Uuid,
    update: AccountUpdate,
  ) -> impl Future<Output = Result<Account>> + Send + '_;

  /// Remove an active account and return the removed record.
  fn delete(&self, id: Uuid) -> impl Future<Output = Result<Account>> + Send + '_;

  /// Append a feedback id to the account's back-references. Returns `false`
  /// if the id was already present.
  fn append_feedback_id(
    &self,
    id: Uuid,
    feedback_id: Uuid,
  ) -> impl Future<Output = Result<bool>> + Send + '_;

  /// Append a report id to the account's back-references. Returns `false` if
  /// the id was already present.
  fn append_report_id(
    &self,
    id: Uuid,
    report_id: Uuid,
  ) -> impl Future<Output = Result<bool>> + Send + '_;

  /// Insert a full record into the active key space, keeping its id.
  ///
  /// Uniqueness is checked against other active accounts
  /// ([`Error::Conflict`]). If the same id is already active this is a no-op.
  fn insert_active(
    &self,
    account: Account,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Restricted accounts ───────────────────────────────────────────────

  fn find_restricted_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Account>>> + Send + '_;

  fn list_restricted(&self) -> impl Future<Output = Result<Vec<Account>>> + Send + '_;

  /// Insert or replace a record in the restricted key space.
  fn insert_restricted(
    &self,
    account: Account,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Remove a restricted record. Returns `false` if it was not there.
  fn delete_restricted(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool>> + Send + '_;

  // ── Moves ─────────────────────────────────────────────────────────────

  /// Move an account from the active to the restricted key space: insert the
  /// restricted copy, then delete the active one.
  ///
  /// Calling this again after an interrupted move, or on an account that is
  /// already restricted, succeeds without further changes.
  fn move_to_restricted(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send + '_ {
    async move {
      let Some(account) = self.find_by_id(id).await? else {
        if self.find_restricted_by_id(id).await?.is_some() {
          return Ok(());
        }
        return Err(Error::not_found(RecordKind::Account, id));
      };
      self.insert_restricted(account).await?;
      self.delete(id).await?;
      Ok(())
    }
  }

  /// Move an account from the restricted back to the active key space.
  ///
  /// Fails with [`Error::Conflict`] if its email or user name was claimed
  /// while it was restricted; the restricted copy is left untouched.
  fn move_to_active(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send + '_ {
    async move {
      let Some(account) = self.find_restricted_by_id(id).await? else {
        if self.find_by_id(id).await?.is_some() {
          return Ok(());
        }
        return Err(Error::not_found(RecordKind::RestrictedAccount, id));
      };
      self.insert_active(account).await?;
      self.delete_restricted(id).await?;
      Ok(())
    }
  }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

pub trait SubjectStore: Send + Sync {
  /// Fails with [`Error::DuplicateKey`] when name and address both match an
  /// existing subject.
  fn create(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject>> + Send + '_;

  fn find_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>>> + Send + '_;

  fn find_all(
    &self,
    filter: DietFilter,
  ) -> impl Future<Output = Result<Vec<Subject>>> + Send + '_;

  /// Replace descriptive fields. Fails with [`Error::Conflict`] when the new
  /// name and address match a different subject.
  fn update(
    &self,
    id: Uuid,
    update: SubjectUpdate,
  ) -> impl Future<Output = Result<Subject>> + Send + '_;

  fn delete(&self, id: Uuid) -> impl Future<Output = Result<Subject>> + Send + '_;

  /// Append one value per dimension and persist the recomputed means in the
  /// same write.
  fn append_rating_sample(
    &self,
    id: Uuid,
    sample: RatingSample,
  ) -> impl Future<Output = Result<RatingMeans>> + Send + '_;

  /// Copy a feedback comment into the subject. Returns `false` if text from
  /// `source_id` is already present.
  fn append_feedback_text(
    &self,
    id: Uuid,
    source_id: Uuid,
    text: String,
  ) -> impl Future<Output = Result<bool>> + Send + '_;

  /// Copy an incident description into the subject and persist the
  /// recomputed incident count, which is returned.
  fn increment_incident(
    &self,
    id: Uuid,
    source_id: Uuid,
    description: String,
  ) -> impl Future<Output = Result<u64>> + Send + '_;
}

// ─── Feedback ────────────────────────────────────────────────────────────────

pub trait FeedbackStore: Send + Sync {
  /// Persist an entry built with [`FeedbackEntry::from_new`]. Referenced
  /// ids are not checked here.
  ///
  /// Writing an id that is already stored changes nothing and returns the
  /// stored entry, so a create whose outcome is unknown can be repeated.
  fn create(
    &self,
    entry: FeedbackEntry,
  ) -> impl Future<Output = Result<FeedbackEntry>> + Send + '_;

  fn find_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<FeedbackEntry>>> + Send + '_;

  fn find_by_subject(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FeedbackEntry>>> + Send + '_;

  fn find_by_author(
    &self,
    author_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FeedbackEntry>>> + Send + '_;

  fn find_all(&self) -> impl Future<Output = Result<Vec<FeedbackEntry>>> + Send + '_;
}

// ─── Reports ─────────────────────────────────────────────────────────────────

pub trait ReportStore: Send + Sync {
  /// Persist a report built with [`Report::from_new`]. Like
  /// [`FeedbackStore::create`], an id that is already stored is left as is
  /// and the stored report is returned.
  fn create(&self, report: Report) -> impl Future<Output = Result<Report>> + Send + '_;

  fn find_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Report>>> + Send + '_;

  fn find_by_subject(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Report>>> + Send + '_;

  fn find_by_reporter(
    &self,
    reporter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Report>>> + Send + '_;

  fn find_all(&self) -> impl Future<Output = Result<Vec<Report>>> + Send + '_;

  /// Move a report forward in its lifecycle. Fails with
  /// [`Error::InvalidTransition`] unless `status` is strictly later.
  fn update_status(
    &self,
    id: Uuid,
    status: ReportStatus,
  ) -> impl Future<Output = Result<Report>> + Send + '_;
}
