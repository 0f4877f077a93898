use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use crate::models::{Lot, Stage, StagePayload};
use crate::repo::DealerRepo;
use anyhow::{Context, Result};

impl ToSql for Stage {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Stage {
    /// A stored stage name outside the enumeration surfaces as `UnknownStage`.
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse::<Stage>()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Selection criteria for [`LotRepo::list`]
#[derive(Debug, Default, Clone)]
pub struct LotFilter {
    pub stage: Option<Stage>,
    pub company_id: Option<i64>,
    pub dealer_id: Option<i64>,
}

/// Lot repository for database operations
///
/// Lots carry one `lot_stages` row per stage they have data for. Loading a
/// lot always loads its full payload so the stage projections in
/// [`Lot`] can run without further queries.
///
/// # Example
///
/// ```no_run
/// use lotledger::db::DbConnection;
/// use lotledger::repo::LotRepo;
///
/// let conn = DbConnection::connect().unwrap();
/// let lot = LotRepo::get_by_code(&conn, "LOT001").unwrap().unwrap();
/// let progress = lot.completion_status();
/// ```
pub struct LotRepo;

const LOT_COLUMNS: &str =
    "id, uuid, lot_code, company_id, dealer_id, stage, created_ts, modified_ts";

fn lot_from_row(row: &Row) -> rusqlite::Result<Lot> {
    Ok(Lot {
        id: Some(row.get(0)?),
        uuid: row.get(1)?,
        lot_code: row.get(2)?,
        company_id: row.get(3)?,
        dealer_id: row.get(4)?,
        stage: row.get(5)?,
        payload: BTreeMap::new(),
        created_ts: row.get(6)?,
        modified_ts: row.get(7)?,
    })
}

/// Default lot code for a row id (LOT001, LOT002, ...)
pub fn default_lot_code(id: i64) -> String {
    format!("LOT{:03}", id)
}

impl LotRepo {
    /// Create a new lot at the first stage.
    ///
    /// The dealer must belong to the company. `request_entries` are raw
    /// `(field, value)` pairs for the first stage. Without an explicit code
    /// the lot is named after its row id, moving past any `LOTnnn` code a
    /// user already claimed. A taken explicit code is refused.
    pub fn create(
        conn: &Connection,
        lot_code: Option<&str>,
        company_id: i64,
        dealer_id: i64,
        request_entries: &[(String, String)],
    ) -> Result<Lot> {
        let dealer = DealerRepo::get_by_id(conn, dealer_id)?
            .with_context(|| format!("Dealer {} not found", dealer_id))?;
        if dealer.company_id != company_id {
            anyhow::bail!(
                "Dealer '{}' does not belong to company {}",
                dealer.name, company_id
            );
        }

        let mut lot = Lot::new(lot_code.unwrap_or_default().to_string(), company_id, dealer_id);
        let request_values = lot.prepare_record(Stage::FIRST, request_entries)?;
        if let Some(request) = lot.payload.get_mut(&Stage::FIRST) {
            request.values = request_values;
        }

        if let Some(code) = lot_code {
            if Self::code_exists(conn, code)? {
                anyhow::bail!("Lot '{}' already exists", code);
            }
        }

        let tx = conn.unchecked_transaction()?;
        // The uuid stands in for the code until the row id is known
        let initial_code = lot_code.unwrap_or(lot.uuid.as_str()).to_string();
        tx.execute(
            "INSERT INTO lots (uuid, lot_code, company_id, dealer_id, stage, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                lot.uuid,
                initial_code,
                lot.company_id,
                lot.dealer_id,
                lot.stage,
                lot.created_ts,
                lot.modified_ts,
            ],
        )
        .with_context(|| format!("Failed to create lot: {}", initial_code))?;

        let id = tx.last_insert_rowid();
        lot.id = Some(id);
        lot.lot_code = match lot_code {
            Some(code) => code.to_string(),
            None => {
                let mut seq = id;
                while Self::code_exists(&tx, &default_lot_code(seq))? {
                    seq += 1;
                }
                let code = default_lot_code(seq);
                tx.execute(
                    "UPDATE lots SET lot_code = ?1 WHERE id = ?2",
                    rusqlite::params![code, id],
                )
                .with_context(|| format!("Failed to assign lot code {}", code))?;
                code
            }
        };

        for (stage, payload) in &lot.payload {
            Self::write_stage(&tx, id, *stage, payload)?;
        }
        tx.commit()?;

        log::debug!("Created lot {} (id {})", lot.lot_code, id);
        Ok(lot)
    }

    fn code_exists(conn: &Connection, lot_code: &str) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM lots WHERE lot_code = ?1",
                [lot_code],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("Failed to look up lot code {}", lot_code))?;
        Ok(found.is_some())
    }

    fn write_stage(conn: &Connection, lot_id: i64, stage: Stage, payload: &StagePayload) -> Result<()> {
        let fields_json = serde_json::to_string(&payload.values)?;
        conn.execute(
            "INSERT INTO lot_stages (lot_id, stage, fields_json, created_ts, updated_ts)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(lot_id, stage) DO UPDATE SET
                fields_json = excluded.fields_json,
                updated_ts = excluded.updated_ts",
            rusqlite::params![lot_id, stage, fields_json, payload.created_ts, payload.updated_ts],
        )
        .with_context(|| format!("Failed to write {} data for lot {}", stage, lot_id))?;
        Ok(())
    }

    fn load_payload(conn: &Connection, lot: &mut Lot) -> Result<()> {
        let lot_id = lot.id.context("Lot has no id")?;
        let mut stmt = conn.prepare(
            "SELECT stage, fields_json, created_ts, updated_ts
             FROM lot_stages WHERE lot_id = ?1"
        )?;
        let rows = stmt.query_map([lot_id], |row| {
            Ok((
                row.get::<_, Stage>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut payload = BTreeMap::new();
        for row in rows {
            let (stage, fields_json, created_ts, updated_ts) =
                row.with_context(|| format!("Corrupt stage record for lot {}", lot.lot_code))?;
            let values = serde_json::from_str(&fields_json)
                .with_context(|| format!("Corrupt {} data for lot {}", stage, lot.lot_code))?;
            payload.insert(stage, StagePayload { values, created_ts, updated_ts });
        }
        lot.payload = payload;
        Ok(())
    }

    /// Get lot by ID, including its stage data
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Lot>> {
        let sql = format!("SELECT {} FROM lots WHERE id = ?1", LOT_COLUMNS);
        let lot = conn
            .query_row(&sql, [id], lot_from_row)
            .optional()
            .with_context(|| format!("Failed to load lot {}", id))?;
        match lot {
            Some(mut lot) => {
                Self::load_payload(conn, &mut lot)?;
                Ok(Some(lot))
            }
            None => Ok(None),
        }
    }

    /// Get lot by its code, including its stage data
    pub fn get_by_code(conn: &Connection, lot_code: &str) -> Result<Option<Lot>> {
        let sql = format!("SELECT {} FROM lots WHERE lot_code = ?1", LOT_COLUMNS);
        let lot = conn
            .query_row(&sql, [lot_code], lot_from_row)
            .optional()
            .with_context(|| format!("Failed to load lot {}", lot_code))?;
        match lot {
            Some(mut lot) => {
                Self::load_payload(conn, &mut lot)?;
                Ok(Some(lot))
            }
            None => Ok(None),
        }
    }

    /// All lot codes (for suggestions)
    pub fn codes(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT lot_code FROM lots ORDER BY lot_code")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut codes = Vec::new();
        for row in rows {
            codes.push(row?);
        }
        Ok(codes)
    }

    /// List lots ordered by id
    pub fn list(conn: &Connection, filter: &LotFilter) -> Result<Vec<Lot>> {
        let sql = format!(
            "SELECT {} FROM lots
             WHERE (?1 IS NULL OR stage = ?1)
               AND (?2 IS NULL OR company_id = ?2)
               AND (?3 IS NULL OR dealer_id = ?3)
             ORDER BY id",
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![filter.stage, filter.company_id, filter.dealer_id],
            lot_from_row,
        )?;

        let mut lots = Vec::new();
        for row in rows {
            let mut lot = row.context("Failed to read lot")?;
            Self::load_payload(conn, &mut lot)?;
            lots.push(lot);
        }
        Ok(lots)
    }

    /// Record field values for one stage of a lot.
    ///
    /// Entries are raw `(field, value)` pairs; validation happens in
    /// [`Lot::prepare_record`]. Existing values for other fields are kept.
    pub fn record(conn: &Connection, lot_id: i64, stage: Stage, entries: &[(String, String)]) -> Result<Lot> {
        let mut lot = Self::get_by_id(conn, lot_id)?
            .with_context(|| format!("Lot {} not found", lot_id))?;
        let values = lot.prepare_record(stage, entries)?;

        let now = chrono::Utc::now().timestamp();
        let payload = lot.payload.entry(stage).or_insert_with(|| StagePayload::new(now));
        payload.values.extend(values);
        payload.updated_ts = now;
        let payload = payload.clone();

        let tx = conn.unchecked_transaction()?;
        Self::write_stage(&tx, lot_id, stage, &payload)?;
        tx.execute(
            "UPDATE lots SET modified_ts = ?1 WHERE id = ?2",
            rusqlite::params![now, lot_id],
        )?;
        tx.commit()?;

        log::debug!("Recorded {} field(s) on {} for lot {}", entries.len(), stage, lot.lot_code);
        lot.modified_ts = now;
        Ok(lot)
    }

    /// Move a lot forward. See [`Lot::advance_target`] for the rules.
    pub fn advance(conn: &Connection, lot_id: i64, target: Option<Stage>) -> Result<Lot> {
        let mut lot = Self::get_by_id(conn, lot_id)?
            .with_context(|| format!("Lot {} not found", lot_id))?;
        let from = lot.stage;
        let to = lot.advance_target(target)?;

        let now = chrono::Utc::now().timestamp();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE lots SET stage = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![to, now, lot_id],
        )
        .with_context(|| format!("Failed to advance lot {}", lot.lot_code))?;
        if !lot.payload.contains_key(&to) {
            let payload = StagePayload::new(now);
            Self::write_stage(&tx, lot_id, to, &payload)?;
            lot.payload.insert(to, payload);
        }
        tx.commit()?;

        log::info!("Lot {} advanced from {} to {}", lot.lot_code, from, to);
        lot.stage = to;
        lot.modified_ts = now;
        Ok(lot)
    }

    /// Number of lots at each stage, every stage present
    pub fn stage_counts(conn: &Connection) -> Result<BTreeMap<Stage, usize>> {
        let mut counts: BTreeMap<Stage, usize> = Stage::ALL.iter().map(|s| (*s, 0)).collect();
        let mut stmt = conn.prepare("SELECT stage, COUNT(*) FROM lots GROUP BY stage")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, Stage>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (stage, count) = row.context("Failed to count lots by stage")?;
            counts.insert(stage, count as usize);
        }
        Ok(counts)
    }

    /// Delete a lot and its stage data
    pub fn delete(conn: &Connection, lot_id: i64) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM lot_stages WHERE lot_id = ?1", [lot_id])?;
        let deleted = tx
            .execute("DELETE FROM lots WHERE id = ?1", [lot_id])
            .with_context(|| format!("Failed to delete lot {}", lot_id))?;
        if deleted == 0 {
            anyhow::bail!("No lot found with id={}", lot_id);
        }
        tx.commit()?;
        Ok(())
    }
}
