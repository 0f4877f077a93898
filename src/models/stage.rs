use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::LotError;

/// Pipeline stage of a lot
///
/// The declaration order is the processing order. `Ord` is derived, so
/// comparing two stages compares their pipeline positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Request,
    SecurityCheck,
    Warehouse,
    Incineration,
    Vault,
    Production,
    Dispatch,
    RequestComplete,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 8] = [
        Stage::Request,
        Stage::SecurityCheck,
        Stage::Warehouse,
        Stage::Incineration,
        Stage::Vault,
        Stage::Production,
        Stage::Dispatch,
        Stage::RequestComplete,
    ];

    pub const FIRST: Stage = Stage::Request;
    pub const LAST: Stage = Stage::RequestComplete;

    /// Zero-based position in the pipeline
    pub fn index(self) -> usize {
        match self {
            Stage::Request => 0,
            Stage::SecurityCheck => 1,
            Stage::Warehouse => 2,
            Stage::Incineration => 3,
            Stage::Vault => 4,
            Stage::Production => 5,
            Stage::Dispatch => 6,
            Stage::RequestComplete => 7,
        }
    }

    /// Canonical name, as stored in the database and emitted in JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Request => "REQUEST",
            Stage::SecurityCheck => "SECURITY_CHECK",
            Stage::Warehouse => "WAREHOUSE",
            Stage::Incineration => "INCINERATION",
            Stage::Vault => "VAULT",
            Stage::Production => "PRODUCTION",
            Stage::Dispatch => "DISPATCH",
            Stage::RequestComplete => "REQUEST_COMPLETE",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Request => "Request",
            Stage::SecurityCheck => "Security Check",
            Stage::Warehouse => "Warehouse",
            Stage::Incineration => "Incineration",
            Stage::Vault => "Vault",
            Stage::Production => "Production",
            Stage::Dispatch => "Dispatch",
            Stage::RequestComplete => "Request Complete",
        }
    }

    /// Field names relevant at this stage, in display order
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Stage::Request => &[
                "lotWeightKg",
                "catalystName",
                "catalystPercent",
                "catalystWeight",
                "notes",
                "createdAt",
            ],
            Stage::SecurityCheck => &["notes", "updatedAt"],
            Stage::Warehouse => &["lotWeightKg", "clientApproved", "notes", "updatedAt"],
            Stage::Incineration => &["catalystWeight", "custApproved", "clientApproved", "notes"],
            Stage::Vault => &["status", "notes"],
            Stage::Production => &["status", "lossPercent", "notes", "updatedAt"],
            Stage::Dispatch => &["lotWeightKg", "status", "dispatchNo", "notes", "updatedAt"],
            Stage::RequestComplete => &[
                "status",
                "notes",
                "updatedAt",
                "clientAcknowledged",
                "paymentStatus",
            ],
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields().contains(&field)
    }

    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }

    pub fn is_terminal(&self) -> bool {
        *self == Stage::LAST
    }

    /// Parse loosely formatted user input.
    ///
    /// Accepts the canonical name in any case, with `-` or spaces in place of
    /// `_` (e.g. `security-check`, `Security Check`).
    pub fn from_user_input(input: &str) -> Result<Stage, LotError> {
        let normalized: String = input
            .trim()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        normalized
            .parse()
            .map_err(|_| LotError::UnknownStage(input.to_string()))
    }
}

impl FromStr for Stage {
    type Err = LotError;

    /// Strict parse of the canonical name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .find(|stage| stage.as_str() == s)
            .copied()
            .ok_or_else(|| LotError::UnknownStage(s.to_string()))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a stage given by its canonical name.
///
/// A name outside the enumeration is a data-integrity fault and is reported
/// as `UnknownStage`; there is no default position.
pub fn stage_index(name: &str) -> Result<usize, LotError> {
    name.parse::<Stage>().map(Stage::index)
}

/// Field names relevant at a stage, in display order
pub fn fields_for(stage: Stage) -> &'static [&'static str] {
    stage.fields()
}

/// How a field's value is entered and rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Bool,
    Text,
    /// Maintained from the stage record timestamps; never written directly
    Timestamp,
}

impl FieldKind {
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Number => "a number",
            FieldKind::Bool => "yes/no",
            FieldKind::Text => "text",
            FieldKind::Timestamp => "a timestamp",
        }
    }
}

/// Value kind of a known field name
pub fn field_kind(field: &str) -> Option<FieldKind> {
    let kind = match field {
        "lotWeightKg" | "catalystPercent" | "catalystWeight" | "lossPercent" => FieldKind::Number,
        "clientApproved" | "custApproved" | "clientAcknowledged" => FieldKind::Bool,
        "catalystName" | "notes" | "status" | "dispatchNo" | "paymentStatus" => FieldKind::Text,
        "createdAt" | "updatedAt" => FieldKind::Timestamp,
        _ => return None,
    };
    Some(kind)
}
