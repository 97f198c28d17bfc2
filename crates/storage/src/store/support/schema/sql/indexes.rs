#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE UNIQUE INDEX IF NOT EXISTS "by-seq-doc-id-rev"
          ON by_sequence(doc_id, rev);

        CREATE INDEX IF NOT EXISTS "doc-winningseq-idx"
          ON document_store(winningseq);
"#;

pub(in crate::store::support::schema) const BY_SEQ_DELETED_INDEX: &str = r#"

        CREATE INDEX IF NOT EXISTS "by-seq-deleted-idx"
          ON by_sequence(seq, deleted);
"#;

pub(in crate::store::support::schema) const ATTACH_SEQ_INDEXES: &str = r#"

        CREATE INDEX IF NOT EXISTS "attach-seq-seq-idx"
          ON attach_seq_store(seq);

        CREATE UNIQUE INDEX IF NOT EXISTS "attach-seq-digest-idx"
          ON attach_seq_store(digest, seq);
"#;
