//! SQL schema for the scry SQLite ledger.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS documents (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    content     TEXT NOT NULL,
    author      TEXT,
    category    TEXT,
    created_at  TEXT NOT NULL    -- ISO 8601 UTC; server-assigned
);

-- One row per distinct (term, user, ip) triple. search_count is bumped on
-- every final search for the triple; rows are deleted by the prune pass.
CREATE TABLE IF NOT EXISTS search_queries (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    term             TEXT NOT NULL,
    user_identifier  TEXT NOT NULL,
    ip_address       TEXT NOT NULL,
    search_count     INTEGER NOT NULL DEFAULT 0,
    results_count    INTEGER NOT NULL DEFAULT 0,
    last_searched_at TEXT,
    created_at       TEXT NOT NULL,
    UNIQUE (term, user_identifier, ip_address)
);

-- One row, ever, per (document, final query) pair. view_count stays at 1;
-- the appearance count per document is the number of rows, not a sum.
CREATE TABLE IF NOT EXISTS appearances (
    document_id     INTEGER NOT NULL REFERENCES documents(id)      ON DELETE CASCADE,
    search_query_id INTEGER NOT NULL REFERENCES search_queries(id) ON DELETE CASCADE,
    view_count      INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (document_id, search_query_id)
);

CREATE INDEX IF NOT EXISTS documents_title_idx      ON documents(title);
CREATE INDEX IF NOT EXISTS documents_category_idx   ON documents(category);
CREATE INDEX IF NOT EXISTS search_queries_user_idx  ON search_queries(user_identifier);
CREATE INDEX IF NOT EXISTS search_queries_ip_idx    ON search_queries(ip_address);
CREATE INDEX IF NOT EXISTS search_queries_term_idx  ON search_queries(term);
CREATE INDEX IF NOT EXISTS appearances_query_idx    ON appearances(search_query_id);

PRAGMA user_version = 1;
";
