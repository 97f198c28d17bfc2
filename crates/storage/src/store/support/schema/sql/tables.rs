#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS metadata_store (
          dbid TEXT NOT NULL,
          db_version INTEGER NOT NULL
        );

        -- One row per non-local document; `json` holds the serialized revision tree.
        CREATE TABLE IF NOT EXISTS document_store (
          id TEXT NOT NULL UNIQUE,
          rev TEXT NOT NULL,
          json TEXT NOT NULL,
          winningseq INTEGER NOT NULL,
          max_seq INTEGER NOT NULL UNIQUE
        );

        -- Append-only revision bodies. AUTOINCREMENT keeps sequences from being
        -- reused after compaction deletes the newest rows.
        CREATE TABLE IF NOT EXISTS by_sequence (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          json TEXT NOT NULL,
          deleted INTEGER NOT NULL DEFAULT 0,
          doc_id TEXT NOT NULL,
          rev TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS attach_store (
          digest TEXT NOT NULL UNIQUE,
          escaped INTEGER NOT NULL DEFAULT 0,
          body BLOB NOT NULL
        );

        CREATE TABLE IF NOT EXISTS local_store (
          id TEXT NOT NULL UNIQUE,
          rev TEXT NOT NULL,
          json TEXT NOT NULL
        );
"#;

pub(in crate::store::support::schema) const ATTACH_SEQ_TABLE: &str = r#"

        -- Many-to-many links between attachment bodies and revisions.
        CREATE TABLE IF NOT EXISTS attach_seq_store (
          digest TEXT NOT NULL,
          seq INTEGER NOT NULL
        );
"#;
