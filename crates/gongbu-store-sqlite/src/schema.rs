//! SQL schema for the Gongbu SQLite store.
//!
//! Executed once at connection startup. The unique constraints here are part
//! of the store's contract: every pipeline writer relies on them to turn a
//! concurrent duplicate into `ON CONFLICT` reuse of the winner's row.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Snapshots are immutable once written and never deleted.
CREATE TABLE IF NOT EXISTS snapshots (
    asset_id    TEXT PRIMARY KEY,
    owner       TEXT NOT NULL,
    blob_key    TEXT NOT NULL UNIQUE,
    mime        TEXT NOT NULL,
    size        INTEGER NOT NULL,
    sha256      TEXT NOT NULL,
    title       TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    document_id   TEXT PRIMARY KEY,
    owner         TEXT NOT NULL,
    asset_id      TEXT NOT NULL REFERENCES snapshots(asset_id),
    source_kind   TEXT NOT NULL,   -- 'google_doc' | 'pdf' | 'text' | 'manual' | 'other'
    source_uri    TEXT NOT NULL,
    title         TEXT,
    ingest_status TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    UNIQUE (owner, source_kind, source_uri)
);

CREATE TABLE IF NOT EXISTS learner_profiles (
    owner       TEXT PRIMARY KEY,
    cefr_level  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Canonical grammar patterns (read-only to the pipeline).
CREATE TABLE IF NOT EXISTS grammar_patterns (
    id            TEXT PRIMARY KEY,
    display_name  TEXT NOT NULL,
    active        INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS grammar_pattern_aliases (
    alias_raw           TEXT NOT NULL,
    alias_norm          TEXT NOT NULL,   -- alias_raw with all whitespace removed
    grammar_pattern_id  TEXT NOT NULL REFERENCES grammar_patterns(id),
    UNIQUE (alias_norm, grammar_pattern_id)
);

-- part_of_speech is '' rather than NULL so the uniqueness constraint holds.
CREATE TABLE IF NOT EXISTS teaching_vocab (
    id              TEXT PRIMARY KEY,
    lemma           TEXT NOT NULL,
    part_of_speech  TEXT NOT NULL DEFAULT '',
    status          TEXT NOT NULL DEFAULT 'curated',   -- 'curated' | 'provisional'
    created_at      TEXT NOT NULL,
    UNIQUE (lemma, part_of_speech)
);

CREATE TABLE IF NOT EXISTS content_items (
    content_item_id     TEXT PRIMARY KEY,
    owner               TEXT NOT NULL,
    content_type        TEXT NOT NULL,   -- 'sentence' | 'pattern'
    text                TEXT NOT NULL,
    language            TEXT NOT NULL DEFAULT 'ko',
    notes               TEXT,
    cefr_level          TEXT,
    topic               TEXT,
    politeness          TEXT,
    tense               TEXT,
    naturalness_score   REAL,
    grammar_pattern_id  TEXT REFERENCES grammar_patterns(id),
    created_at          TEXT NOT NULL,
    UNIQUE (owner, content_type, text)
);

CREATE TABLE IF NOT EXISTS library_registry_items (
    id                  TEXT PRIMARY KEY,
    content_type        TEXT NOT NULL,
    content_id          TEXT NOT NULL REFERENCES content_items(content_item_id),
    owner               TEXT NOT NULL,
    audience            TEXT NOT NULL,   -- 'personal' | 'global'
    operational_status  TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    UNIQUE (content_type, content_id)
);

CREATE TABLE IF NOT EXISTS document_content_item_links (
    document_id      TEXT NOT NULL REFERENCES documents(document_id),
    content_item_id  TEXT NOT NULL REFERENCES content_items(content_item_id),
    link_kind        TEXT NOT NULL,
    session_date     TEXT,            -- YYYY-MM-DD; merged as the latest
    created_at       TEXT NOT NULL,
    UNIQUE (document_id, content_item_id, link_kind)
);

CREATE TABLE IF NOT EXISTS document_vocab_links (
    document_id   TEXT NOT NULL REFERENCES documents(document_id),
    owner         TEXT NOT NULL,
    lemma         TEXT NOT NULL,
    session_date  TEXT,
    created_at    TEXT NOT NULL,
    UNIQUE (document_id, owner, lemma)
);

CREATE TABLE IF NOT EXISTS user_vocab_items (
    owner          TEXT NOT NULL,
    lemma          TEXT NOT NULL,
    vocab_id       TEXT REFERENCES teaching_vocab(id),
    first_seen_at  TEXT NOT NULL,
    last_seen_at   TEXT NOT NULL,
    UNIQUE (owner, lemma)
);

CREATE TABLE IF NOT EXISTS sentence_vocab_links (
    sentence_content_item_id  TEXT NOT NULL REFERENCES content_items(content_item_id),
    teaching_vocab_id         TEXT NOT NULL REFERENCES teaching_vocab(id),
    UNIQUE (sentence_content_item_id, teaching_vocab_id)
);

CREATE TABLE IF NOT EXISTS content_item_grammar_links (
    content_item_id     TEXT NOT NULL REFERENCES content_items(content_item_id),
    grammar_pattern_id  TEXT NOT NULL REFERENCES grammar_patterns(id),
    role                TEXT NOT NULL,   -- 'primary' | 'component'
    UNIQUE (content_item_id, grammar_pattern_id, role)
);

CREATE TABLE IF NOT EXISTS document_fragments (
    fragment_id   TEXT PRIMARY KEY,
    document_id   TEXT NOT NULL REFERENCES documents(document_id),
    owner         TEXT NOT NULL,
    session_date  TEXT,
    text          TEXT NOT NULL,
    label         TEXT,
    created_at    TEXT NOT NULL,
    UNIQUE (document_id, text)
);

CREATE TABLE IF NOT EXISTS lists (
    list_id             TEXT PRIMARY KEY,
    owner               TEXT NOT NULL,
    name                TEXT NOT NULL,
    description         TEXT,
    global_weight       INTEGER NOT NULL CHECK (global_weight BETWEEN 1 AND 5),
    is_active           INTEGER NOT NULL DEFAULT 1,
    source_kind         TEXT,
    source_document_id  TEXT REFERENCES documents(document_id),
    created_at          TEXT NOT NULL
);

-- Positions are sparse (gap 100) so items can be reordered without
-- renumbering.
CREATE TABLE IF NOT EXISTS list_items (
    id         TEXT PRIMARY KEY,
    list_id    TEXT NOT NULL REFERENCES lists(list_id),
    item_type  TEXT NOT NULL,   -- 'sentence' | 'pattern' | 'vocabulary'
    item_id    TEXT NOT NULL,
    position   INTEGER NOT NULL,
    UNIQUE (list_id, position)
);

-- Best-effort side channel: surfaces the pattern registry did not recognise.
-- Writers touch it only under a savepoint, so the table may be absent.
CREATE TABLE IF NOT EXISTS unmatched_grammar_staging (
    owner          TEXT NOT NULL,
    surface_form   TEXT NOT NULL,
    alias_norm     TEXT NOT NULL,
    context_span   TEXT,
    count          INTEGER NOT NULL DEFAULT 1,
    first_seen_at  TEXT NOT NULL,
    last_seen_at   TEXT NOT NULL,
    UNIQUE (owner, alias_norm)
);

CREATE INDEX IF NOT EXISTS aliases_norm_idx        ON grammar_pattern_aliases(alias_norm);
CREATE INDEX IF NOT EXISTS teaching_vocab_lemma_idx ON teaching_vocab(lemma);
CREATE INDEX IF NOT EXISTS lists_owner_source_idx  ON lists(owner, source_kind);
CREATE INDEX IF NOT EXISTS list_items_list_idx     ON list_items(list_id, position);

PRAGMA user_version = 1;
";
