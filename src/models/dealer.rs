use serde::{Deserialize, Serialize};

/// Dealer model
///
/// Dealers belong to exactly one company and own lots and users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dealer {
    pub id: Option<i64>,
    pub company_id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Dealer {
    pub fn new(company_id: i64, name: String, email: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            company_id,
            name,
            email,
            phone: None,
            address: None,
            created_ts: now,
            modified_ts: now,
        }
    }
}
