use intact_lookup_core::db::migrations::latest_version;
use intact_lookup_core::db::{open_db, open_db_in_memory, DbError};
use intact_lookup_core::model::schema::{Cardinality, Schema};
use intact_lookup_core::{RepoError, SqliteLookupRepository};
use rusqlite::Connection;

#[test]
fn in_memory_database_is_migrated_to_latest() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_eq!(latest_version(), 3);
}

#[test]
fn migrated_tables_cover_every_schema_mapping() {
    let conn = open_db_in_memory().unwrap();
    let schema = Schema::intact();

    for entity in schema.entities() {
        let columns = table_columns(&conn, entity.table);
        assert!(
            columns.iter().any(|column| column == entity.key_column),
            "{} lacks key column",
            entity.table
        );
        for field in entity.fields {
            assert!(
                columns.iter().any(|column| column == field.column),
                "{}.{} is not mapped",
                entity.table,
                field.column
            );
        }
        for relation in entity.relations {
            let owner_table = match relation.cardinality {
                Cardinality::One => entity.table,
                Cardinality::Many => schema.entity(relation.target).unwrap().table,
            };
            assert!(
                table_columns(&conn, owner_table)
                    .iter()
                    .any(|column| column == relation.column),
                "{}.{} has no column {} in {}",
                entity.name,
                relation.name,
                relation.column,
                owner_table
            );
        }
    }
}

#[test]
fn reopening_file_database_keeps_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intact.db");

    let first = open_db(&path).unwrap();
    first
        .execute(
            "INSERT INTO cv_term (ac, shortlabel) VALUES ('EBI-1', 'psi-mi');",
            [],
        )
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    let rows: i64 = second
        .query_row("SELECT COUNT(*) FROM cv_term;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lookup_repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteLookupRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection must be rejected"),
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();

    let err = conn
        .execute(
            "INSERT INTO interactor (ac, shortlabel, interactor_type_ac)
             VALUES ('EBI-9', 'p53', 'missing');",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}
