//! SQL schema for the checker SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS pools (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    chain_id     INTEGER NOT NULL,
    allo_pool_id TEXT    NOT NULL,
    created_at   TEXT    NOT NULL,
    UNIQUE (chain_id, allo_pool_id)
);

CREATE TABLE IF NOT EXISTS profiles (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id TEXT    NOT NULL UNIQUE
);

-- Applications are immutable once inserted; re-syncs skip existing rows.
CREATE TABLE IF NOT EXISTS applications (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    chain_id            INTEGER NOT NULL,
    allo_application_id TEXT    NOT NULL,
    pool_id             INTEGER NOT NULL REFERENCES pools(id) ON DELETE CASCADE,
    profile_id          INTEGER NOT NULL REFERENCES profiles(id),
    UNIQUE (allo_application_id, pool_id, chain_id)
);

-- Replaced wholesale on rubric regeneration, never updated in place.
CREATE TABLE IF NOT EXISTS evaluation_questions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    pool_id        INTEGER NOT NULL REFERENCES pools(id) ON DELETE CASCADE,
    question_index INTEGER NOT NULL,
    question       TEXT    NOT NULL,
    UNIQUE (pool_id, question_index)
);

-- At most one evaluation per (evaluator, application).
CREATE TABLE IF NOT EXISTS evaluations (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    application_id    INTEGER NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    evaluator         TEXT    NOT NULL,
    evaluator_type    TEXT    NOT NULL,   -- 'human' | 'llm'
    summary           TEXT    NOT NULL,
    evaluator_score   INTEGER NOT NULL CHECK (evaluator_score BETWEEN 0 AND 100),
    evaluation_status TEXT    NOT NULL,   -- 'approved' | 'rejected' | 'uncertain'
    metadata_cid      TEXT    NOT NULL,
    created_at        TEXT    NOT NULL,
    UNIQUE (evaluator, application_id)
);

CREATE TABLE IF NOT EXISTS evaluation_answers (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    evaluation_id          INTEGER NOT NULL REFERENCES evaluations(id) ON DELETE CASCADE,
    evaluation_question_id INTEGER NOT NULL REFERENCES evaluation_questions(id) ON DELETE CASCADE,
    answer                 TEXT    NOT NULL,   -- 'yes' | 'no' | 'uncertain'
    UNIQUE (evaluation_id, evaluation_question_id)
);

CREATE INDEX IF NOT EXISTS applications_pool_idx     ON applications(pool_id, chain_id);
CREATE INDEX IF NOT EXISTS evaluations_type_idx      ON evaluations(evaluator, evaluator_type);
CREATE INDEX IF NOT EXISTS evaluations_app_idx       ON evaluations(application_id);
CREATE INDEX IF NOT EXISTS evaluations_status_idx    ON evaluations(evaluation_status);
CREATE INDEX IF NOT EXISTS evaluation_answers_q_idx  ON evaluation_answers(evaluation_question_id);

PRAGMA user_version = 1;
";
