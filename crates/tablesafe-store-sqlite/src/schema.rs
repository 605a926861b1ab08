//! SQL schema for the tablesafe SQLite store.
//!
//! Each store owns its own table. There are no foreign keys:
//! tables only hold each other's ids, and dangling ids are allowed.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS accounts (
    account_id    TEXT PRIMARY KEY,
    first_name    TEXT NOT NULL,
    last_name     TEXT NOT NULL,
    user_name     TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL,           -- 'user' | 'admin'
    restrictions  TEXT NOT NULL DEFAULT '[]',
    feedback_ids  TEXT NOT NULL DEFAULT '[]',
    report_ids    TEXT NOT NULL DEFAULT '[]'
);

-- Same shape as `accounts`; the key spaces are disjoint.
CREATE TABLE IF NOT EXISTS restricted_accounts (
    account_id    TEXT PRIMARY KEY,
    first_name    TEXT NOT NULL,
    last_name     TEXT NOT NULL,
    user_name     TEXT NOT NULL,
    email         TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL,
    restrictions  TEXT NOT NULL DEFAULT '[]',
    feedback_ids  TEXT NOT NULL DEFAULT '[]',
    report_ids    TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS subjects (
    subject_id     TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    address        TEXT NOT NULL,
    category       TEXT NOT NULL,
    diet_tags      TEXT NOT NULL DEFAULT '[]',
    ratings        TEXT NOT NULL,          -- JSON: three {running_values, mean}
    incident_count INTEGER NOT NULL DEFAULT 0,
    feedback_text  TEXT NOT NULL DEFAULT '[]',
    incident_text  TEXT NOT NULL DEFAULT '[]',
    UNIQUE (name, address)
);

-- Feedback entries are never updated.
CREATE TABLE IF NOT EXISTS feedback (
    feedback_id TEXT PRIMARY KEY,
    author_id   TEXT NOT NULL,
    subject_id  TEXT NOT NULL,
    comment     TEXT NOT NULL,
    created_at  TEXT NOT NULL             -- RFC 3339 UTC; store-assigned
);

CREATE TABLE IF NOT EXISTS reports (
    report_id   TEXT PRIMARY KEY,
    reporter_id TEXT NOT NULL,
    subject_id  TEXT,
    location    TEXT NOT NULL,
    description TEXT NOT NULL,
    severity    TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'Reported',
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS restricted_email_idx ON restricted_accounts(email);
CREATE INDEX IF NOT EXISTS restricted_user_idx  ON restricted_accounts(user_name);
CREATE INDEX IF NOT EXISTS feedback_subject_idx ON feedback(subject_id);
CREATE INDEX IF NOT EXISTS feedback_author_idx  ON feedback(author_id);
CREATE INDEX IF NOT EXISTS reports_subject_idx  ON reports(subject_id);
CREATE INDEX IF NOT EXISTS reports_reporter_idx ON reports(reporter_id);

PRAGMA user_version = 1;
";
