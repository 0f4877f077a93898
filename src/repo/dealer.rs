use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::Dealer;
use crate::utils::fuzzy;
use anyhow::{Context, Result};

/// Dealer repository for database operations
pub struct DealerRepo;

/// Field changes for [`DealerRepo::update`]; `None` leaves a field untouched
#[derive(Debug, Default, Clone)]
pub struct DealerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub address: Option<Option<String>>,
}

const DEALER_COLUMNS: &str =
    "id, company_id, name, email, phone, address, created_ts, modified_ts";

fn dealer_from_row(row: &Row) -> rusqlite::Result<Dealer> {
    Ok(Dealer {
        id: Some(row.get(0)?),
        company_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        created_ts: row.get(6)?,
        modified_ts: row.get(7)?,
    })
}

impl DealerRepo {
    /// Create a new dealer under a company
    pub fn create(
        conn: &Connection,
        company_id: i64,
        name: &str,
        email: &str,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<Dealer> {
        let mut dealer = Dealer::new(company_id, name.to_string(), email.to_string());
        dealer.phone = phone.map(|s| s.to_string());
        dealer.address = address.map(|s| s.to_string());

        conn.execute(
            "INSERT INTO dealers (company_id, name, email, phone, address, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                dealer.company_id,
                dealer.name,
                dealer.email,
                dealer.phone,
                dealer.address,
                dealer.created_ts,
                dealer.modified_ts,
            ],
        )
        .with_context(|| format!("Failed to create dealer: {}", name))?;

        let id = conn.last_insert_rowid();
        log::debug!("Created dealer {} (id {}) for company {}", name, id, company_id);
        Ok(Dealer {
            id: Some(id),
            ..dealer
        })
    }

    /// Get dealer by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Dealer>> {
        let sql = format!("SELECT {} FROM dealers WHERE id = ?1", DEALER_COLUMNS);
        let dealer = conn.query_row(&sql, [id], dealer_from_row).optional()?;
        Ok(dealer)
    }

    /// Find dealers with an exact name, optionally within one company
    pub fn find_by_name(conn: &Connection, name: &str, company_id: Option<i64>) -> Result<Vec<Dealer>> {
        let sql = format!(
            "SELECT {} FROM dealers WHERE name = ?1 AND (?2 IS NULL OR company_id = ?2) ORDER BY id",
            DEALER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![name, company_id], dealer_from_row)?;

        let mut dealers = Vec::new();
        for row in rows {
            dealers.push(row?);
        }
        Ok(dealers)
    }

    /// List dealers ordered by name
    pub fn list(conn: &Connection, company_id: Option<i64>, search: Option<&str>) -> Result<Vec<Dealer>> {
        let sql = format!(
            "SELECT {} FROM dealers WHERE (?1 IS NULL OR company_id = ?1) ORDER BY name, id",
            DEALER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([company_id], dealer_from_row)?;

        let mut dealers = Vec::new();
        for row in rows {
            let dealer = row?;
            let matches = search.map_or(true, |term| {
                fuzzy::is_substring_match(&dealer.name, term)
                    || fuzzy::is_substring_match(&dealer.email, term)
            });
            if matches {
                dealers.push(dealer);
            }
        }
        Ok(dealers)
    }

    /// Update dealer fields
    pub fn update(conn: &Connection, id: i64, update: &DealerUpdate) -> Result<()> {
        let mut sets = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(name) = &update.name {
            let dealer = Self::get_by_id(conn, id)?
                .with_context(|| format!("Dealer {} not found", id))?;
            let taken = Self::find_by_name(conn, name, Some(dealer.company_id))?
                .iter()
                .any(|other| other.id != Some(id));
            if taken {
                anyhow::bail!("Dealer '{}' already exists in company {}", name, dealer.company_id);
            }
            sets.push("name = ?");
            params.push(Box::new(name.clone()));
        }
        if let Some(email) = &update.email {
            sets.push("email = ?");
            params.push(Box::new(email.clone()));
        }
        if let Some(phone) = &update.phone {
            sets.push("phone = ?");
            params.push(Box::new(phone.clone()));
        }
        if let Some(address) = &update.address {
            sets.push("address = ?");
            params.push(Box::new(address.clone()));
        }

        if sets.is_empty() {
            return Ok(());
        }

        sets.push("modified_ts = ?");
        params.push(Box::new(chrono::Utc::now().timestamp()));

        // Number the parameters
        let numbered_sets: Vec<String> = sets
            .iter()
            .enumerate()
            .map(|(i, set)| set.replace('?', &format!("?{}", i + 1)))
            .collect();
        let sql = format!(
            "UPDATE dealers SET {} WHERE id = ?{}",
            numbered_sets.join(", "),
            params.len() + 1
        );
        params.push(Box::new(id));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let updated = conn
            .execute(&sql, param_refs.as_slice())
            .with_context(|| format!("Failed to update dealer id={}", id))?;

        if updated == 0 {
            anyhow::bail!("No dealer found with id={}", id);
        }
        Ok(())
    }

    /// Number of lots owned by a dealer
    pub fn lot_count(conn: &Connection, id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM lots WHERE dealer_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete a dealer. Refused while lots still reference it; users are detached.
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let lots = Self::lot_count(conn, id)?;
        if lots > 0 {
            anyhow::bail!("Dealer {} still owns {} lot(s)", id, lots);
        }

        let deleted = conn
            .execute("DELETE FROM dealers WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete dealer {}", id))?;
        if deleted == 0 {
            anyhow::bail!("No dealer found with id={}", id);
        }
        Ok(())
    }
}
