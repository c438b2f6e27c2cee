//! Canonical SQLite schema for the assignment store.
//!
//! The schema is normalized for queryability:
//! - `assignments` keeps the current variant per visitor per split
//! - `previous_assignments` preserves supersession history (append-only,
//!   cascaded on assignment delete)
//! - `splits` + `split_variants` hold each experiment's current registry
//! - `bulk_assignments` and `visitor_supersessions` record assignment
//!   provenance
//! - `store_meta` tracks schema bookkeeping

/// Migration v1: core normalized tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS visitors (
    visitor_id TEXT PRIMARY KEY CHECK (length(trim(visitor_id)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS splits (
    split_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS split_variants (
    split_id INTEGER NOT NULL REFERENCES splits(split_id) ON DELETE CASCADE,
    variant TEXT NOT NULL CHECK (length(trim(variant)) > 0),
    weight INTEGER NOT NULL DEFAULT 0 CHECK (weight >= 0),
    PRIMARY KEY (split_id, variant)
);

CREATE TABLE IF NOT EXISTS bulk_assignments (
    bulk_assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    split_id INTEGER NOT NULL REFERENCES splits(split_id),
    variant TEXT NOT NULL CHECK (length(trim(variant)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS visitor_supersessions (
    visitor_supersession_id INTEGER PRIMARY KEY AUTOINCREMENT,
    superseded_visitor_id TEXT NOT NULL REFERENCES visitors(visitor_id),
    superseding_visitor_id TEXT NOT NULL REFERENCES visitors(visitor_id),
    created_at_us INTEGER NOT NULL,
    CHECK (superseded_visitor_id <> superseding_visitor_id)
);

CREATE TABLE IF NOT EXISTS assignments (
    assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    visitor_id TEXT NOT NULL REFERENCES visitors(visitor_id),
    split_id INTEGER NOT NULL REFERENCES splits(split_id),
    variant TEXT NOT NULL CHECK (length(trim(variant)) > 0),
    bulk_assignment_id INTEGER REFERENCES bulk_assignments(bulk_assignment_id),
    visitor_supersession_id INTEGER REFERENCES visitor_supersessions(visitor_supersession_id),
    individually_overridden INTEGER NOT NULL DEFAULT 0 CHECK (individually_overridden IN (0, 1)),
    context TEXT,
    mixpanel_result TEXT CHECK (mixpanel_result IS NULL OR mixpanel_result IN ('success', 'failure')),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    UNIQUE (visitor_id, split_id)
);

CREATE TABLE IF NOT EXISTS previous_assignments (
    previous_assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    assignment_id INTEGER NOT NULL REFERENCES assignments(assignment_id) ON DELETE CASCADE,
    variant TEXT NOT NULL CHECK (length(trim(variant)) > 0),
    bulk_assignment_id INTEGER REFERENCES bulk_assignments(bulk_assignment_id),
    individually_overridden INTEGER NOT NULL DEFAULT 0 CHECK (individually_overridden IN (0, 1)),
    visitor_supersession_id INTEGER REFERENCES visitor_supersessions(visitor_supersession_id),
    context TEXT,
    created_at_us INTEGER NOT NULL,
    superseded_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
"#;

/// Migration v2: read-path indexes, including the partial index backing the
/// unsynced-to-Mixpanel scope so the sync job's queue pull never scans the
/// full table.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_assignments_unsynced
    ON assignments(assignment_id)
    WHERE mixpanel_result = 'failure' OR mixpanel_result IS NULL;

CREATE INDEX IF NOT EXISTS idx_assignments_split
    ON assignments(split_id, assignment_id);

CREATE INDEX IF NOT EXISTS idx_previous_assignments_assignment
    ON previous_assignments(assignment_id, superseded_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_visitor_supersessions_superseding
    ON visitor_supersessions(superseding_visitor_id);

UPDATE store_meta SET schema_version = 2 WHERE id = 1;
"#;

/// Indexes expected by the queue/listing/history query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_assignments_unsynced",
    "idx_assignments_split",
    "idx_previous_assignments_assignment",
    "idx_visitor_supersessions_superseding",
];

#[cfg(test)]
mod tests {
    use crate::db::migrations;
    use rusqlite::{Connection, params};

    fn seeded_conn() -> rusqlite::Result<Connection> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn)?;

        conn.execute(
            "INSERT INTO splits (name, created_at_us, updated_at_us)
             VALUES ('checkout_flow', 1, 1)",
            [],
        )?;
        conn.execute(
            "INSERT INTO split_variants (split_id, variant, weight)
             VALUES (1, 'control', 50), (1, 'streamlined', 50)",
            [],
        )?;

        for idx in 0..40_u32 {
            let visitor_id = format!("visitor-{idx:03}");
            conn.execute(
                "INSERT INTO visitors (visitor_id, created_at_us) VALUES (?1, ?2)",
                params![visitor_id, i64::from(idx)],
            )?;

            let result: Option<&str> = match idx % 3 {
                0 => Some("success"),
                1 => Some("failure"),
                _ => None,
            };
            conn.execute(
                "INSERT INTO assignments (
                    visitor_id,
                    split_id,
                    variant,
                    individually_overridden,
                    mixpanel_result,
                    created_at_us,
                    updated_at_us
                 ) VALUES (?1, 1, 'control', 0, ?2, ?3, ?4)",
                params![
                    format!("visitor-{idx:03}"),
                    result,
                    i64::from(idx),
                    i64::from(idx) + 1_000
                ],
            )?;
        }

        conn.execute(
            "INSERT INTO previous_assignments (
                assignment_id, variant, individually_overridden,
                created_at_us, superseded_at_us
             ) VALUES (1, 'streamlined', 0, 10, 20)",
            [],
        )?;

        conn.execute_batch("ANALYZE")?;

        Ok(conn)
    }

    fn query_plan_details(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))?;
        stmt.query_map([], |row| row.get::<_, String>(3))?
            .collect::<Result<Vec<_>, _>>()
    }

    #[test]
    fn query_plan_uses_unsynced_partial_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT assignment_id
             FROM assignments
             WHERE mixpanel_result = 'failure' OR mixpanel_result IS NULL
             ORDER BY assignment_id",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_assignments_unsynced")),
            "expected unsynced partial index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn query_plan_uses_split_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT assignment_id
             FROM assignments
             WHERE split_id = 1
             ORDER BY assignment_id",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_assignments_split")),
            "expected split index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn query_plan_uses_history_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT previous_assignment_id
             FROM previous_assignments
             WHERE assignment_id = 1
             ORDER BY superseded_at_us DESC",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_previous_assignments_assignment")),
            "expected history index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn mixpanel_result_check_rejects_unknown_values() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let result = conn.execute(
            "UPDATE assignments SET mixpanel_result = 'pending' WHERE assignment_id = 1",
            [],
        );
        assert!(result.is_err(), "CHECK constraint should reject 'pending'");
        Ok(())
    }

    #[test]
    fn duplicate_visitor_split_pair_is_rejected() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let result = conn.execute(
            "INSERT INTO assignments (
                visitor_id, split_id, variant, individually_overridden,
                created_at_us, updated_at_us
             ) VALUES ('visitor-000', 1, 'control', 0, 5, 5)",
            [],
        );
        assert!(result.is_err(), "UNIQUE(visitor_id, split_id) should reject");
        Ok(())
    }

    #[test]
    fn deleting_assignment_cascades_to_history() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let before: i64 = conn.query_row(
            "SELECT COUNT(*) FROM previous_assignments WHERE assignment_id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(before, 1);

        conn.execute("DELETE FROM assignments WHERE assignment_id = 1", [])?;

        let after: i64 = conn.query_row(
            "SELECT COUNT(*) FROM previous_assignments WHERE assignment_id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(after, 0);
        Ok(())
    }
}
