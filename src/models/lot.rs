use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::error::LotError;
use crate::models::stage::{field_kind, FieldKind, Stage};

/// A single recorded field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Timestamp(i64),
}

impl FieldValue {
    /// Parse raw user input for `field` of `stage` according to the field's kind.
    pub fn parse(stage: Stage, field: &str, raw: &str) -> Result<FieldValue, LotError> {
        let kind = field_kind(field)
            .filter(|_| stage.has_field(field))
            .ok_or_else(|| LotError::UnknownField {
                stage: stage.to_string(),
                field: field.to_string(),
            })?;
        let invalid = || LotError::InvalidFieldValue {
            field: field.to_string(),
            value: raw.to_string(),
            expected: kind.describe(),
        };

        match kind {
            FieldKind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FieldValue::Number)
                .ok_or_else(invalid),
            FieldKind::Bool => match raw.trim().to_lowercase().as_str() {
                "yes" | "y" | "true" | "1" => Ok(FieldValue::Bool(true)),
                "no" | "n" | "false" | "0" => Ok(FieldValue::Bool(false)),
                _ => Err(invalid()),
            },
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Timestamp => Err(LotError::ReadOnlyField(field.to_string())),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(true) => f.write_str("Yes"),
            FieldValue::Bool(false) => f.write_str("No"),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Timestamp(ts) => {
                use chrono::{Local, TimeZone};
                match Local.timestamp_opt(*ts, 0).single() {
                    Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
                    None => write!(f, "{}", ts),
                }
            }
        }
    }
}

/// Value shown for a field in a stage projection
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDisplay {
    Value(FieldValue),
    /// The field was never captured for this lot
    NotApplicable,
}

impl FieldDisplay {
    pub fn value(&self) -> Option<&FieldValue> {
        match self {
            FieldDisplay::Value(v) => Some(v),
            FieldDisplay::NotApplicable => None,
        }
    }
}

impl fmt::Display for FieldDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDisplay::Value(v) => v.fmt(f),
            FieldDisplay::NotApplicable => f.write_str("N/A"),
        }
    }
}

/// Data captured while a lot was at one stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StagePayload {
    pub values: BTreeMap<String, FieldValue>,
    pub created_ts: i64,
    pub updated_ts: i64,
}

impl StagePayload {
    pub fn new(now: i64) -> Self {
        Self {
            values: BTreeMap::new(),
            created_ts: now,
            updated_ts: now,
        }
    }

    /// Resolve a field, including the record timestamps
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        match field {
            "createdAt" => Some(FieldValue::Timestamp(self.created_ts)),
            "updatedAt" => Some(FieldValue::Timestamp(self.updated_ts)),
            _ => self.values.get(field).cloned(),
        }
    }
}

/// Lot status as shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotStatus {
    Processing,
    Completed,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Processing => "PROCESSING",
            LotStatus::Completed => "COMPLETED",
        }
    }
}

/// Lot model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: Option<i64>,
    pub uuid: String,
    pub lot_code: String,
    pub company_id: i64,
    pub dealer_id: i64,
    pub stage: Stage,
    pub payload: BTreeMap<Stage, StagePayload>,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Lot {
    /// Create a new lot at the first stage
    pub fn new(lot_code: String, company_id: i64, dealer_id: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        let mut payload = BTreeMap::new();
        payload.insert(Stage::FIRST, StagePayload::new(now));
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            lot_code,
            company_id,
            dealer_id,
            stage: Stage::FIRST,
            payload,
            created_ts: now,
            modified_ts: now,
        }
    }

    pub fn status(&self) -> LotStatus {
        if self.stage.is_terminal() {
            LotStatus::Completed
        } else {
            LotStatus::Processing
        }
    }

    /// Completion flag for every stage.
    ///
    /// A stage is complete when it lies strictly before the current stage;
    /// the current stage itself is still in progress.
    pub fn completion_status(&self) -> BTreeMap<Stage, bool> {
        let current = self.stage.index();
        Stage::ALL
            .iter()
            .map(|stage| (*stage, stage.index() < current))
            .collect()
    }

    /// Whether `stage` is complete or current, i.e. may be inspected or written
    pub fn has_reached(&self, stage: Stage) -> bool {
        stage <= self.stage
    }

    /// Fields of `stage` with their recorded values, in display order.
    ///
    /// Missing values come back as `NotApplicable`. Stages ahead of the
    /// current one are rejected with `StageNotReached`.
    pub fn visible_fields(&self, stage: Stage) -> Result<Vec<(&'static str, FieldDisplay)>, LotError> {
        if !self.has_reached(stage) {
            return Err(LotError::StageNotReached {
                requested: stage.to_string(),
                current: self.stage.to_string(),
            });
        }

        let record = self.payload.get(&stage);
        let fields = stage
            .fields()
            .iter()
            .map(|field| {
                let display = record
                    .and_then(|p| p.get(field))
                    .map(FieldDisplay::Value)
                    .unwrap_or(FieldDisplay::NotApplicable);
                (*field, display)
            })
            .collect();
        Ok(fields)
    }

    /// Validate raw `field=value` entries for a stage write.
    ///
    /// The stage must be complete or current, every field must belong to the
    /// stage, and values must parse for the field's kind.
    pub fn prepare_record(
        &self,
        stage: Stage,
        entries: &[(String, String)],
    ) -> Result<BTreeMap<String, FieldValue>, LotError> {
        if !self.has_reached(stage) {
            return Err(LotError::StageNotReached {
                requested: stage.to_string(),
                current: self.stage.to_string(),
            });
        }

        let mut values = BTreeMap::new();
        for (field, raw) in entries {
            values.insert(field.clone(), FieldValue::parse(stage, field, raw)?);
        }
        Ok(values)
    }

    /// Resolve the stage an advance should move to.
    ///
    /// Without a target the lot moves to the next stage. An explicit target
    /// must lie strictly after the current stage.
    pub fn advance_target(&self, target: Option<Stage>) -> Result<Stage, LotError> {
        if self.stage.is_terminal() {
            return Err(LotError::PipelineComplete(self.stage.to_string()));
        }
        match target {
            None => self
                .stage
                .next()
                .ok_or_else(|| LotError::PipelineComplete(self.stage.to_string())),
            Some(target) if target > self.stage => Ok(target),
            Some(target) => Err(LotError::StageRegression {
                current: self.stage.to_string(),
                target: target.to_string(),
            }),
        }
    }
}

/// Completion flags for every stage of `lot`
pub fn completion_status(lot: &Lot) -> BTreeMap<Stage, bool> {
    lot.completion_status()
}

/// Fields of `stage` for `lot`, see [`Lot::visible_fields`]
pub fn visible_fields(lot: &Lot, stage: Stage) -> Result<Vec<(&'static str, FieldDisplay)>, LotError> {
    lot.visible_fields(stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot_at(stage: Stage) -> Lot {
        let mut lot = Lot::new("LOT001".to_string(), 1, 1);
        lot.stage = stage;
        lot
    }

    #[test]
    fn test_new_lot_starts_at_request() {
        let lot = Lot::new("LOT001".to_string(), 3, 4);
        assert_eq!(lot.stage, Stage::Request);
        assert_eq!(lot.status(), LotStatus::Processing);
        assert!(lot.payload.contains_key(&Stage::Request));
        assert!(!lot.uuid.is_empty());
    }

    #[test]
    fn test_completion_at_warehouse() {
        let status = lot_at(Stage::Warehouse).completion_status();
        let expected: BTreeMap<Stage, bool> = [
            (Stage::Request, true),
            (Stage::SecurityCheck, true),
            (Stage::Warehouse, false),
            (Stage::Incineration, false),
            (Stage::Vault, false),
            (Stage::Production, false),
            (Stage::Dispatch, false),
            (Stage::RequestComplete, false),
        ]
        .into_iter()
        .collect();
        assert_eq!(status, expected);
    }

    #[test]
    fn test_completion_at_first_stage() {
        let status = lot_at(Stage::Request).completion_status();
        assert_eq!(status.len(), 8);
        assert!(status.values().all(|done| !done));
    }

    #[test]
    fn test_completion_at_last_stage() {
        let status = lot_at(Stage::RequestComplete).completion_status();
        for (stage, done) in &status {
            assert_eq!(*done, *stage != Stage::RequestComplete);
        }
        assert_eq!(status.values().filter(|d| **d).count(), 7);
    }

    #[test]
    fn test_completion_is_idempotent() {
        let lot = lot_at(Stage::Production);
        assert_eq!(completion_status(&lot), completion_status(&lot));
    }

    #[test]
    fn test_visible_fields_ahead_of_current() {
        for current in Stage::ALL {
            let lot = lot_at(current);
            for stage in Stage::ALL.iter().filter(|s| **s > current) {
                assert_eq!(
                    visible_fields(&lot, *stage),
                    Err(LotError::StageNotReached {
                        requested: stage.to_string(),
                        current: current.to_string(),
                    })
                );
            }
        }
    }

    #[test]
    fn test_visible_fields_with_missing_values() {
        let mut lot = lot_at(Stage::Warehouse);
        lot.payload
            .get_mut(&Stage::Request)
            .unwrap()
            .values
            .insert("lotWeightKg".to_string(), FieldValue::Number(120.5));

        let fields = lot.visible_fields(Stage::Request).unwrap();
        let names: Vec<&str> = fields.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, Stage::Request.fields());
        assert_eq!(fields[0].1, FieldDisplay::Value(FieldValue::Number(120.5)));
        assert_eq!(fields[1].1, FieldDisplay::NotApplicable);
        assert_eq!(fields[5].1, FieldDisplay::Value(FieldValue::Timestamp(lot.created_ts)));

        // Completed stage with no record at all
        let fields = lot.visible_fields(Stage::SecurityCheck).unwrap();
        assert!(fields.iter().all(|(_, v)| *v == FieldDisplay::NotApplicable));

        // The current stage is inspectable
        assert!(lot.visible_fields(Stage::Warehouse).is_ok());
    }

    #[test]
    fn test_prepare_record() {
        let lot = lot_at(Stage::Warehouse);
        let entries = vec![
            ("lotWeightKg".to_string(), "98.2".to_string()),
            ("clientApproved".to_string(), "yes".to_string()),
        ];
        let values = lot.prepare_record(Stage::Warehouse, &entries).unwrap();
        assert_eq!(values.get("lotWeightKg"), Some(&FieldValue::Number(98.2)));
        assert_eq!(values.get("clientApproved"), Some(&FieldValue::Bool(true)));

        let bad_field = vec![("dispatchNo".to_string(), "D-1".to_string())];
        assert_eq!(
            lot.prepare_record(Stage::Warehouse, &bad_field),
            Err(LotError::UnknownField {
                stage: "WAREHOUSE".to_string(),
                field: "dispatchNo".to_string(),
            })
        );

        let ahead = vec![("status".to_string(), "sealed".to_string())];
        assert!(matches!(
            lot.prepare_record(Stage::Vault, &ahead),
            Err(LotError::StageNotReached { .. })
        ));

        let read_only = vec![("updatedAt".to_string(), "now".to_string())];
        assert_eq!(
            lot.prepare_record(Stage::Warehouse, &read_only),
            Err(LotError::ReadOnlyField("updatedAt".to_string()))
        );
    }

    #[test]
    fn test_advance_target() {
        let lot = lot_at(Stage::Warehouse);
        assert_eq!(lot.advance_target(None), Ok(Stage::Incineration));
        assert_eq!(lot.advance_target(Some(Stage::Dispatch)), Ok(Stage::Dispatch));
        assert!(matches!(
            lot.advance_target(Some(Stage::Warehouse)),
            Err(LotError::StageRegression { .. })
        ));
        assert!(matches!(
            lot.advance_target(Some(Stage::Request)),
            Err(LotError::StageRegression { .. })
        ));

        let done = lot_at(Stage::RequestComplete);
        assert_eq!(
            done.advance_target(None),
            Err(LotError::PipelineComplete("REQUEST_COMPLETE".to_string()))
        );
        assert_eq!(done.status(), LotStatus::Completed);
    }

    #[test]
    fn test_parse_field_values() {
        assert_eq!(FieldValue::parse(Stage::Request, "lotWeightKg", "12.5"), Ok(FieldValue::Number(12.5)));
        assert_eq!(FieldValue::parse(Stage::Warehouse, "clientApproved", "Yes"), Ok(FieldValue::Bool(true)));
        assert_eq!(FieldValue::parse(Stage::Incineration, "custApproved", "no"), Ok(FieldValue::Bool(false)));
        assert_eq!(FieldValue::parse(Stage::Vault, "notes", "wet"), Ok(FieldValue::Text("wet".to_string())));
        assert!(matches!(
            FieldValue::parse(Stage::Request, "lotWeightKg", "heavy"),
            Err(LotError::InvalidFieldValue { .. })
        ));
        assert!(matches!(
            FieldValue::parse(Stage::Request, "lotWeightKg", "NaN"),
            Err(LotError::InvalidFieldValue { .. })
        ));
        assert_eq!(
            FieldValue::parse(Stage::Warehouse, "updatedAt", "now"),
            Err(LotError::ReadOnlyField("updatedAt".to_string()))
        );
    }

    #[test]
    fn test_parse_reports_the_stage_for_foreign_fields() {
        assert_eq!(
            FieldValue::parse(Stage::Vault, "dispatchNo", "D-1"),
            Err(LotError::UnknownField {
                stage: "VAULT".to_string(),
                field: "dispatchNo".to_string(),
            })
        );
        assert_eq!(
            FieldValue::parse(Stage::Request, "colour", "red"),
            Err(LotError::UnknownField {
                stage: "REQUEST".to_string(),
                field: "colour".to_string(),
            })
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldDisplay::NotApplicable.to_string(), "N/A");
        assert_eq!(FieldValue::Bool(true).to_string(), "Yes");
        assert_eq!(FieldValue::Number(3.0).to_string(), "3");
        assert_eq!(FieldValue::Number(2.25).to_string(), "2.25");
    }

    #[test]
    fn test_payload_json_round_trip() {
        let mut payload = StagePayload::new(100);
        payload.values.insert("clientApproved".to_string(), FieldValue::Bool(true));
        payload.values.insert("lotWeightKg".to_string(), FieldValue::Number(7.0));
        payload.values.insert("notes".to_string(), FieldValue::Text("ok".to_string()));
        let json = serde_json::to_string(&payload.values).unwrap();
        let back: BTreeMap<String, FieldValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload.values);
    }
}
