use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 1;

type Migration = fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version = Self::get_version(conn)?;

        for version in (current_version + 1)..=CURRENT_VERSION {
            log::debug!("Applying schema migration v{}", version);
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, Migration> {
    let mut migrations: HashMap<u32, Migration> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations
}

/// Migration v1: Initial schema
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE companies (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE dealers (
            id INTEGER PRIMARY KEY,
            company_id INTEGER NOT NULL REFERENCES companies(id),
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NULL,
            address TEXT NULL,
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL,
            UNIQUE(company_id, name)
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_dealers_company_id ON dealers(company_id)",
        [],
    )?;

    tx.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            dealer_id INTEGER NULL REFERENCES dealers(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NULL,
            role TEXT NOT NULL CHECK(role IN ('user','admin')),
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;

    // Stage names are validated on read as well; the CHECK keeps writers honest.
    tx.execute(
        "CREATE TABLE lots (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            lot_code TEXT NOT NULL UNIQUE,
            company_id INTEGER NOT NULL REFERENCES companies(id),
            dealer_id INTEGER NOT NULL REFERENCES dealers(id),
            stage TEXT NOT NULL CHECK(stage IN (
                'REQUEST','SECURITY_CHECK','WAREHOUSE','INCINERATION',
                'VAULT','PRODUCTION','DISPATCH','REQUEST_COMPLETE'
            )),
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_lots_company_id ON lots(company_id)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_lots_dealer_id ON lots(dealer_id)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_lots_stage ON lots(stage)",
        [],
    )?;

    // One row per lot and stage; fields_json stores {"fieldName": value, ...}
    tx.execute(
        "CREATE TABLE lot_stages (
            lot_id INTEGER NOT NULL REFERENCES lots(id) ON DELETE CASCADE,
            stage TEXT NOT NULL,
            fields_json TEXT NOT NULL DEFAULT '{}',
            created_ts INTEGER NOT NULL,
            updated_ts INTEGER NOT NULL,
            PRIMARY KEY(lot_id, stage)
        )",
        [],
    )?;

    Ok(())
}
