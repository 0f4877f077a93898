use serde::{Deserialize, Serialize};

/// Company model (top-level tenant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Option<i64>,
    pub name: String,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Company {
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            name,
            created_ts: now,
            modified_ts: now,
        }
    }
}
