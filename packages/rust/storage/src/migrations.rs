//! Schema migrations for the local graph database.
//!
//! Applied in version order when the store is opened.

/// A versioned block of SQL.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Graph schema: nodes, edges",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per distinct entity; id is sha256(identity)
CREATE TABLE IF NOT EXISTS nodes (
    id              TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,
    identity        TEXT NOT NULL,
    properties_json TEXT NOT NULL,
    first_seen      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);

CREATE TABLE IF NOT EXISTS edges (
    kind            TEXT NOT NULL,
    from_id         TEXT NOT NULL REFERENCES nodes(id),
    to_id           TEXT NOT NULL REFERENCES nodes(id),
    properties_json TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    PRIMARY KEY (kind, from_id, to_id)
);

CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
