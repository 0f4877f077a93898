use serde::{Deserialize, Serialize};

/// Access role
///
/// `User` is the lowest privilege and the fallback whenever a role is
/// missing or unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Navigable section of the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Dashboard,
    Request,
    User,
    Dealer,
    Company,
}

impl Section {
    /// Sections in menu order
    pub const ALL: [Section; 5] = [
        Section::Dashboard,
        Section::Request,
        Section::User,
        Section::Dealer,
        Section::Company,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Section::Dashboard => "Dashboard",
            Section::Request => "Request",
            Section::User => "User",
            Section::Dealer => "Dealer",
            Section::Company => "Company",
        }
    }

    /// CLI command that opens the section
    pub fn command(&self) -> &'static str {
        match self {
            Section::Dashboard => "dashboard",
            Section::Request => "lots",
            Section::User => "users",
            Section::Dealer => "dealers",
            Section::Company => "companies",
        }
    }

    pub fn roles(&self) -> &'static [Role] {
        match self {
            Section::Dashboard | Section::Request | Section::Dealer => &[Role::User, Role::Admin],
            Section::User | Section::Company => &[Role::Admin],
        }
    }

    pub fn is_visible_to(&self, role: Role) -> bool {
        self.roles().contains(&role)
    }

    /// Sections a role may see, in menu order
    pub fn visible_to(role: Role) -> Vec<Section> {
        Section::ALL.iter().copied().filter(|s| s.is_visible_to(role)).collect()
    }
}

/// User model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub dealer_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl User {
    pub fn new(name: String, email: String, role: Role) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            dealer_id: None,
            name,
            email,
            phone: None,
            role,
            created_ts: now,
            modified_ts: now,
        }
    }
}
