use tablesafe_core::{
  Error, RecordKind,
  account::{AccountUpdate, Role},
  feedback::{FeedbackEntry, NewFeedback},
  report::{NewReport, Report, ReportStatus, Severity},
  store::{AccountStore, FeedbackStore, ReportStore, SubjectStore},
  subject::{DietFilter, RatingSample, SubjectUpdate},
};
use uuid::Uuid;

use super::{account, new_account, new_subject, store, subject};

fn profile(user_name: &str, email: &str) -> AccountUpdate {
  AccountUpdate {
    first_name:    "Grace".into(),
    last_name:     "Hopper".into(),
    user_name:     user_name.into(),
    email:         email.into(),
    password_hash: None,
    role:          Role::Admin,
    restrictions:  ["no-reports".to_string()].into(),
  }
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_find_account() {
  let s = store().await;
  let accounts = s.accounts();

  let ada = account(&accounts, "ada").await;
  assert!(ada.feedback_ids.is_empty());

  let by_id = accounts.find_by_id(ada.account_id).await.unwrap().unwrap();
  assert_eq!(by_id, ada);
  let by_email = accounts.find_by_email("ada@example.com".into()).await.unwrap();
  assert_eq!(by_email.map(|a| a.account_id), Some(ada.account_id));
  let by_name = accounts.find_by_user_name("ada".into()).await.unwrap();
  assert_eq!(by_name.map(|a| a.account_id), Some(ada.account_id));

  assert!(accounts.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_rejected() {
  let s = store().await;
  let accounts = s.accounts();
  account(&accounts, "ada").await;

  let mut twin = new_account("ada2");
  twin.email = "ada@example.com".into();
  let err = accounts.create(twin).await.unwrap_err();
  assert!(matches!(
    err,
    Error::DuplicateKey { kind: RecordKind::Account, field: "email", .. }
  ));
  assert_eq!(accounts.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn restricted_keys_block_registration() {
  let s = store().await;
  let accounts = s.accounts();
  let ada = account(&accounts, "ada").await;
  accounts.move_to_restricted(ada.account_id).await.unwrap();

  let mut imposter = new_account("ada");
  imposter.email = "other@example.com".into();
  let err = accounts.create(imposter).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateKey { field: "user_name", .. }));

  let mut imposter = new_account("ada2");
  imposter.email = "ada@example.com".into();
  let err = accounts.create(imposter).await.unwrap_err();
  assert!(matches!(
    err,
    Error::DuplicateKey { kind: RecordKind::Account, field: "email", .. }
  ));
  assert!(accounts.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn restricted_email_blocks_profile_update() {
  let s = store().await;
  let accounts = s.accounts();
  let ada = account(&accounts, "ada").await;
  let bob = account(&accounts, "bob").await;
  accounts.move_to_restricted(ada.account_id).await.unwrap();

  let err = accounts
    .update(bob.account_id, profile("bob", "ada@example.com"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict { field: "email", id, .. } if id == bob.account_id));
  let stored = accounts.find_by_id(bob.account_id).await.unwrap().unwrap();
  assert_eq!(stored.email, "bob@example.com");
}

#[tokio::test]
async fn update_replaces_profile_and_keeps_links() {
  let s = store().await;
  let accounts = s.accounts();
  let ada = account(&accounts, "ada").await;
  let fid = Uuid::new_v4();
  accounts.append_feedback_id(ada.account_id, fid).await.unwrap();

  let updated = accounts
    .update(ada.account_id, profile("grace", "grace@example.com"))
    .await
    .unwrap();
  assert_eq!(updated.user_name, "grace");
  assert_eq!(updated.role, Role::Admin);
  assert_eq!(updated.password_hash, ada.password_hash);
  assert_eq!(updated.feedback_ids, vec![fid]);
  assert!(updated.restrictions.contains("no-reports"));
}

#[tokio::test]
async fn update_to_taken_email_conflicts() {
  let s = store().await;
  let accounts = s.accounts();
  let ada = account(&accounts, "ada").await;
  account(&accounts, "bob").await;

  let err = accounts
    .update(ada.account_id, profile("ada", "bob@example.com"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict { field: "email", id, .. } if id == ada.account_id));

  let err = accounts
    .update(Uuid::new_v4(), profile("x", "x@example.com"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { kind: RecordKind::Account, .. }));
}

#[tokio::test]
async fn append_ids_are_idempotent() {
  let s = store().await;
  let accounts = s.accounts();
  let ada = account(&accounts, "ada").await;
  let rid = Uuid::new_v4();

  assert!(accounts.append_report_id(ada.account_id, rid).await.unwrap());
  assert!(!accounts.append_report_id(ada.account_id, rid).await.unwrap());

  let ada = accounts.find_by_id(ada.account_id).await.unwrap().unwrap();
  assert_eq!(ada.report_ids, vec![rid]);

  let err = accounts
    .append_feedback_id(Uuid::new_v4(), Uuid::new_v4())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn moves_round_trip_and_repeat_safely() {
  let s = store().await;
  let accounts = s.accounts();
  let ada = account(&accounts, "ada").await;
  let id = ada.account_id;

  accounts.move_to_restricted(id).await.unwrap();
  accounts.move_to_restricted(id).await.unwrap();
  assert!(accounts.find_by_id(id).await.unwrap().is_none());
  assert_eq!(accounts.find_restricted_by_id(id).await.unwrap(), Some(ada.clone()));
  assert_eq!(accounts.list_restricted().await.unwrap().len(), 1);

  accounts.move_to_active(id).await.unwrap();
  accounts.move_to_active(id).await.unwrap();
  assert_eq!(accounts.find_by_id(id).await.unwrap(), Some(ada));
  assert!(accounts.list_restricted().await.unwrap().is_empty());

  let err = accounts.move_to_active(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { kind: RecordKind::RestrictedAccount, .. }));
}

#[tokio::test]
async fn insert_active_rejects_claimed_user_name() {
  let s = store().await;
  let accounts = s.accounts();
  let ada = account(&accounts, "ada").await;
  accounts.move_to_restricted(ada.account_id).await.unwrap();

  let bob = account(&accounts, "bob").await;
  accounts
    .update(bob.account_id, profile("ada", "bob@example.com"))
    .await
    .unwrap();

  let err = accounts.move_to_active(ada.account_id).await.unwrap_err();
  assert!(matches!(err, Error::Conflict { field: "user_name", .. }));
  assert!(accounts.find_restricted_by_id(ada.account_id).await.unwrap().is_some());
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_name_and_address_rejected() {
  let s = store().await;
  let subjects = s.subjects();
  subject(&subjects, "Luigi's").await;

  let err = subjects.create(new_subject("Luigi's", &[])).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateKey { kind: RecordKind::Subject, .. }));

  let mut elsewhere = new_subject("Luigi's", &[]);
  elsewhere.address = "9 Dock Rd".into();
  subjects.create(elsewhere).await.unwrap();
}

#[tokio::test]
async fn find_all_applies_diet_filter() {
  let s = store().await;
  let subjects = s.subjects();
  subjects.create(new_subject("Green", &["Vegan", "gluten-free"])).await.unwrap();
  subjects.create(new_subject("Grill", &[])).await.unwrap();

  let vegan = subjects.find_all(DietFilter::new(Some("vegan"))).await.unwrap();
  assert_eq!(vegan.len(), 1);
  assert_eq!(vegan[0].name, "Green");

  assert_eq!(subjects.find_all(DietFilter::new(Some("none"))).await.unwrap().len(), 2);
  assert_eq!(subjects.find_all(DietFilter::new(None)).await.unwrap().len(), 2);
  assert!(subjects.find_all(DietFilter::new(Some("halal"))).await.unwrap().is_empty());
}

#[tokio::test]
async fn rating_means_persist() {
  let s = store().await;
  let subjects = s.subjects();
  let green = subject(&subjects, "Green").await;

  let sample = |v| RatingSample { quality: v, safety: v, accessibility: v };
  subjects.append_rating_sample(green.subject_id, sample(4.0)).await.unwrap();
  let means = subjects
    .append_rating_sample(green.subject_id, sample(2.0))
    .await
    .unwrap();
  assert_eq!(means.quality, 3.0);

  let stored = subjects.find_by_id(green.subject_id).await.unwrap().unwrap();
  assert_eq!(stored.ratings.safety.running_values, vec![4.0, 2.0]);
  assert_eq!(stored.ratings.means(), means);
}

#[tokio::test]
async fn text_entries_deduplicate_by_source() {
  let s = store().await;
  let subjects = s.subjects();
  let green = subject(&subjects, "Green").await;
  let source = Uuid::new_v4();

  assert!(subjects.append_feedback_text(green.subject_id, source, "nice".into()).await.unwrap());
  assert!(!subjects.append_feedback_text(green.subject_id, source, "nice".into()).await.unwrap());

  assert_eq!(subjects.increment_incident(green.subject_id, source, "spill".into()).await.unwrap(), 1);
  assert_eq!(subjects.increment_incident(green.subject_id, source, "spill".into()).await.unwrap(), 1);

  let stored = subjects.find_by_id(green.subject_id).await.unwrap().unwrap();
  assert_eq!(stored.feedback_text.len(), 1);
  assert_eq!(stored.incident_text.len(), 1);
}

#[tokio::test]
async fn update_and_delete_subject() {
  let s = store().await;
  let subjects = s.subjects();
  let green = subject(&subjects, "Green").await;
  subject(&subjects, "Grill").await;

  let clash = SubjectUpdate {
    name:      "Grill".into(),
    address:   green.address.clone(),
    category:  "cafe".into(),
    diet_tags: Default::default(),
  };
  let err = subjects.update(green.subject_id, clash).await.unwrap_err();
  assert!(matches!(err, Error::Conflict { kind: RecordKind::Subject, .. }));

  let rename = SubjectUpdate {
    name:      "Greener".into(),
    address:   green.address.clone(),
    category:  "cafe".into(),
    diet_tags: ["vegan".to_string()].into(),
  };
  let updated = subjects.update(green.subject_id, rename).await.unwrap();
  assert_eq!(updated.name, "Greener");
  assert!(updated.has_diet_tag("VEGAN"));

  let removed = subjects.delete(green.subject_id).await.unwrap();
  assert_eq!(removed.name, "Greener");
  let err = subjects.delete(green.subject_id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

// ─── Feedback ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn feedback_queries() {
  let s = store().await;
  let feedback = s.feedback();
  let (author, other, place) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

  let first = feedback
    .create(FeedbackEntry::from_new(NewFeedback {
      author_id:  author,
      subject_id: place,
      comment:    "good".into(),
    }))
    .await
    .unwrap();
  feedback
    .create(FeedbackEntry::from_new(NewFeedback {
      author_id:  other,
      subject_id: place,
      comment:    "bad".into(),
    }))
    .await
    .unwrap();

  assert_eq!(feedback.find_by_id(first.feedback_id).await.unwrap(), Some(first.clone()));
  let about = feedback.find_by_subject(place).await.unwrap();
  assert_eq!(about.iter().map(|f| f.comment.as_str()).collect::<Vec<_>>(), ["good", "bad"]);
  assert_eq!(feedback.find_by_author(author).await.unwrap(), vec![first]);
  assert_eq!(feedback.find_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn feedback_create_is_idempotent_on_id() {
  let s = store().await;
  let feedback = s.feedback();
  let entry = FeedbackEntry::from_new(NewFeedback {
    author_id:  Uuid::new_v4(),
    subject_id: Uuid::new_v4(),
    comment:    "good".into(),
  });

  let stored = feedback.create(entry.clone()).await.unwrap();
  let mut replay = entry.clone();
  replay.comment = "edited".into();
  let again = feedback.create(replay).await.unwrap();

  assert_eq!(again, stored);
  assert_eq!(again.comment, "good");
  assert_eq!(feedback.find_all().await.unwrap().len(), 1);
}

// ─── Reports ─────────────────────────────────────────────────────────────────

fn new_report(reporter_id: Uuid, subject_id: Option<Uuid>) -> Report {
  Report::from_new(NewReport {
    reporter_id,
    subject_id,
    location: "back door".into(),
    description: "blocked fire exit".into(),
    severity: Severity::Critical,
  })
}

#[tokio::test]
async fn report_status_moves_forward_only() {
  let s = store().await;
  let reports = s.reports();
  let report = reports.create(new_report(Uuid::new_v4(), None)).await.unwrap();
  assert_eq!(report.status, ReportStatus::Reported);

  let err = reports
    .update_status(report.report_id, ReportStatus::Reported)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidTransition { from: ReportStatus::Reported, to: ReportStatus::Reported, .. }
  ));

  let reviewing = reports
    .update_status(report.report_id, ReportStatus::Reviewing)
    .await
    .unwrap();
  assert_eq!(reviewing.status, ReportStatus::Reviewing);
  reports
    .update_status(report.report_id, ReportStatus::Resolved)
    .await
    .unwrap();

  let err = reports
    .update_status(report.report_id, ReportStatus::Reviewing)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidTransition { from: ReportStatus::Resolved, .. }));

  let stored = reports.find_by_id(report.report_id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReportStatus::Resolved);
  assert_eq!(stored.severity, Severity::Critical);

  let err = reports
    .update_status(Uuid::new_v4(), ReportStatus::Resolved)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { kind: RecordKind::Report, .. }));
}

#[tokio::test]
async fn report_queries() {
  let s = store().await;
  let reports = s.reports();
  let (reporter, place) = (Uuid::new_v4(), Uuid::new_v4());

  let bound = reports.create(new_report(reporter, Some(place))).await.unwrap();
  let unbound = reports.create(new_report(reporter, None)).await.unwrap();
  reports.create(new_report(Uuid::new_v4(), None)).await.unwrap();

  assert_eq!(reports.find_by_subject(place).await.unwrap(), vec![bound.clone()]);
  assert_eq!(reports.find_by_reporter(reporter).await.unwrap(), vec![bound, unbound.clone()]);
  assert_eq!(reports.find_all().await.unwrap().len(), 3);
  assert_eq!(
    reports.find_by_id(unbound.report_id).await.unwrap().and_then(|r| r.subject_id),
    None
  );
}

#[tokio::test]
async fn report_create_keeps_stored_status() {
  let s = store().await;
  let reports = s.reports();
  let report = new_report(Uuid::new_v4(), None);
  reports.create(report.clone()).await.unwrap();
  reports
    .update_status(report.report_id, ReportStatus::Reviewing)
    .await
    .unwrap();

  let again = reports.create(report).await.unwrap();
  assert_eq!(again.status, ReportStatus::Reviewing);
  assert_eq!(reports.find_all().await.unwrap().len(), 1);
}
