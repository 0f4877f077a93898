use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::Company;
use crate::utils::fuzzy;
use anyhow::{Context, Result};

/// Company repository for database operations
///
/// # Example
///
/// ```no_run
/// use lotledger::db::DbConnection;
/// use lotledger::repo::CompanyRepo;
///
/// let conn = DbConnection::connect().unwrap();
/// let company = CompanyRepo::create(&conn, "Acme Metals").unwrap();
/// ```
pub struct CompanyRepo;

fn company_from_row(row: &Row) -> rusqlite::Result<Company> {
    Ok(Company {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        created_ts: row.get(2)?,
        modified_ts: row.get(3)?,
    })
}

impl CompanyRepo {
    /// Create a new company
    pub fn create(conn: &Connection, name: &str) -> Result<Company> {
        let company = Company::new(name.to_string());

        conn.execute(
            "INSERT INTO companies (name, created_ts, modified_ts) VALUES (?1, ?2, ?3)",
            rusqlite::params![company.name, company.created_ts, company.modified_ts],
        )
        .with_context(|| format!("Failed to create company: {}", name))?;

        let id = conn.last_insert_rowid();
        log::debug!("Created company {} (id {})", name, id);
        Ok(Company {
            id: Some(id),
            ..company
        })
    }

    /// Get company by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Company>> {
        let company = conn
            .query_row(
                "SELECT id, name, created_ts, modified_ts FROM companies WHERE id = ?1",
                [id],
                company_from_row,
            )
            .optional()?;
        Ok(company)
    }

    /// Get company by name (exact match)
    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<Company>> {
        let company = conn
            .query_row(
                "SELECT id, name, created_ts, modified_ts FROM companies WHERE name = ?1",
                [name],
                company_from_row,
            )
            .optional()?;
        Ok(company)
    }

    /// List companies ordered by name, optionally narrowed by a case-insensitive search term
    pub fn list(conn: &Connection, search: Option<&str>) -> Result<Vec<Company>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, created_ts, modified_ts FROM companies ORDER BY name"
        )?;
        let rows = stmt.query_map([], company_from_row)?;

        let mut companies = Vec::new();
        for row in rows {
            let company = row?;
            if search.map_or(true, |term| fuzzy::is_substring_match(&company.name, term)) {
                companies.push(company);
            }
        }
        Ok(companies)
    }

    /// Rename a company
    pub fn rename(conn: &Connection, id: i64, new_name: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let updated = conn
            .execute(
                "UPDATE companies SET name = ?1, modified_ts = ?2 WHERE id = ?3",
                rusqlite::params![new_name, now, id],
            )
            .with_context(|| format!("Failed to rename company {} to {}", id, new_name))?;

        if updated == 0 {
            anyhow::bail!("No company found with id={}", id);
        }
        Ok(())
    }

    /// Number of dealers and lots that reference a company
    pub fn reference_counts(conn: &Connection, id: i64) -> Result<(i64, i64)> {
        let dealers: i64 = conn.query_row(
            "SELECT COUNT(*) FROM dealers WHERE company_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        let lots: i64 = conn.query_row(
            "SELECT COUNT(*) FROM lots WHERE company_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok((dealers, lots))
    }

    /// Delete a company. Refused while dealers or lots still reference it.
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let (dealers, lots) = Self::reference_counts(conn, id)?;
        if dealers > 0 || lots > 0 {
            anyhow::bail!(
                "Company {} is still referenced by {} dealer(s) and {} lot(s)",
                id, dealers, lots
            );
        }

        let deleted = conn
            .execute("DELETE FROM companies WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete company {}", id))?;
        if deleted == 0 {
            anyhow::bail!("No company found with id={}", id);
        }
        Ok(())
    }
}
