use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::{Role, User};
use crate::utils::fuzzy;
use anyhow::{Context, Result};

/// User repository for database operations
pub struct UserRepo;

/// Field changes for [`UserRepo::update`]; `None` leaves a field untouched
#[derive(Debug, Default, Clone)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub dealer_id: Option<Option<i64>>,
    pub role: Option<Role>,
}

const USER_COLUMNS: &str =
    "id, dealer_id, name, email, phone, role, created_ts, modified_ts";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let role_str: String = row.get(5)?;
    Ok(User {
        id: Some(row.get(0)?),
        dealer_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        role: Role::from_str(&role_str).unwrap_or_default(),
        created_ts: row.get(6)?,
        modified_ts: row.get(7)?,
    })
}

impl UserRepo {
    /// Create a new user
    pub fn create(
        conn: &Connection,
        name: &str,
        email: &str,
        phone: Option<&str>,
        dealer_id: Option<i64>,
        role: Role,
    ) -> Result<User> {
        let mut user = User::new(name.to_string(), email.to_string(), role);
        user.phone = phone.map(|s| s.to_string());
        user.dealer_id = dealer_id;

        conn.execute(
            "INSERT INTO users (dealer_id, name, email, phone, role, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                user.dealer_id,
                user.name,
                user.email,
                user.phone,
                user.role.as_str(),
                user.created_ts,
                user.modified_ts,
            ],
        )
        .with_context(|| format!("Failed to create user: {}", email))?;

        let id = conn.last_insert_rowid();
        Ok(User {
            id: Some(id),
            ..user
        })
    }

    /// Get user by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = conn.query_row(&sql, [id], user_from_row).optional()?;
        Ok(user)
    }

    /// Get user by email
    pub fn get_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        let user = conn.query_row(&sql, [email], user_from_row).optional()?;
        Ok(user)
    }

    /// List users ordered by name, optionally narrowed by name/email search
    pub fn list(conn: &Connection, search: Option<&str>) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY name, id", USER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], user_from_row)?;

        let mut users = Vec::new();
        for row in rows {
            let user = row?;
            let matches = search.map_or(true, |term| {
                fuzzy::is_substring_match(&user.name, term)
                    || fuzzy::is_substring_match(&user.email, term)
            });
            if matches {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Update user fields
    pub fn update(conn: &Connection, id: i64, update: &UserUpdate) -> Result<()> {
        let mut sets = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(name) = &update.name {
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
        if let Some(dealer_id) = update.dealer_id {
            sets.push("dealer_id = ?");
            params.push(Box::new(dealer_id));
        }
        if let Some(role) = update.role {
            sets.push("role = ?");
            params.push(Box::new(role.as_str()));
        }

        if sets.is_empty() {
            return Ok(());
        }

        sets.push("modified_ts = ?");
        params.push(Box::new(chrono::Utc::now().timestamp()));

        let numbered_sets: Vec<String> = sets
            .iter()
            .enumerate()
            .map(|(i, set)| set.replace('?', &format!("?{}", i + 1)))
            .collect();
        let sql = format!(
            "UPDATE users SET {} WHERE id = ?{}",
            numbered_sets.join(", "),
            params.len() + 1
        );
        params.push(Box::new(id));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let updated = conn
            .execute(&sql, param_refs.as_slice())
            .with_context(|| format!("Failed to update user id={}", id))?;

        if updated == 0 {
            anyhow::bail!("No user found with id={}", id);
        }
        Ok(())
    }

    /// Delete a user
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let deleted = conn
            .execute("DELETE FROM users WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete user {}", id))?;
        if deleted == 0 {
            anyhow::bail!("No user found with id={}", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;

    #[test]
    fn test_create_and_lookup() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let user = UserRepo::create(&conn, "Ana", "ana@acme.test", None, None, Role::Admin).unwrap();

        let found = UserRepo::get_by_email(&conn, "ana@acme.test").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Admin);
        assert!(UserRepo::create(&conn, "Ana 2", "ana@acme.test", None, None, Role::User).is_err());
    }

    #[test]
    fn test_update_role_and_delete() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let id = UserRepo::create(&conn, "Bo", "bo@x", Some("123"), None, Role::User)
            .unwrap()
            .id
            .unwrap();

        let update = UserUpdate {
            role: Some(Role::Admin),
            phone: Some(None),
            ..Default::default()
        };
        UserRepo::update(&conn, id, &update).unwrap();
        let user = UserRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.phone, None);

        UserRepo::delete(&conn, id).unwrap();
        assert!(UserRepo::get_by_id(&conn, id).unwrap().is_none());
    }

    #[test]
    fn test_list_search() {
        let conn = DbConnection::connect_in_memory().unwrap();
        UserRepo::create(&conn, "Ana", "ana@acme.test", None, None, Role::User).unwrap();
        UserRepo::create(&conn, "Bo", "bo@borealis.test", None, None, Role::User).unwrap();
        assert_eq!(UserRepo::list(&conn, Some("ACME")).unwrap().len(), 1);
        assert_eq!(UserRepo::list(&conn, None).unwrap().len(), 2);
    }
}
