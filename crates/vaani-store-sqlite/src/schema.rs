//! SQL schema for the Vaani SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS identities (
    identity_id  TEXT PRIMARY KEY,
    external_key TEXT NOT NULL UNIQUE,   -- normalised 10-digit mobile number
    verified     INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- Score columns are written only by the vote transaction.
CREATE TABLE IF NOT EXISTS concerns (
    concern_id          TEXT PRIMARY KEY,
    author_id           TEXT REFERENCES identities(identity_id),
    author_name         TEXT,
    text                TEXT NOT NULL,
    geographic_level    TEXT NOT NULL,   -- 'REGION' | 'VILLAGE' | ... | 'COUNTRY'
    location_identifier TEXT NOT NULL,
    upvotes             INTEGER NOT NULL DEFAULT 0,
    downvotes           INTEGER NOT NULL DEFAULT 0,
    net_votes           INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,   -- fixed-width RFC 3339, sortable as text
    updated_at          TEXT NOT NULL,
    CHECK (upvotes >= 0 AND downvotes >= 0),
    CHECK (net_votes = upvotes - downvotes)
);

-- One live vote per (voter, concern), regardless of direction.
CREATE TABLE IF NOT EXISTS votes (
    vote_id    TEXT PRIMARY KEY,
    voter_id   TEXT NOT NULL REFERENCES identities(identity_id),
    concern_id TEXT NOT NULL REFERENCES concerns(concern_id),
    vote_type  TEXT NOT NULL CHECK (vote_type IN ('UP', 'DOWN')),
    cast_at    TEXT NOT NULL,
    UNIQUE (voter_id, concern_id)
);

CREATE INDEX IF NOT EXISTS concerns_rank_idx
    ON concerns(geographic_level, location_identifier, net_votes DESC, created_at ASC);
CREATE INDEX IF NOT EXISTS votes_concern_idx ON votes(concern_id);

PRAGMA user_version = 1;
";
