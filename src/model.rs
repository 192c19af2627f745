use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiant fort pour Employee
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployeeId(String);

impl EmployeeId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Employé, fourni en lecture seule par la source externe.
///
/// Sans poste, l'employé reste valide mais n'entre dans aucun pool d'affectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
}

impl Employee {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            id: EmployeeId::random(),
            name: name.into(),
            position: None,
            email: None,
            hourly_rate: None,
        }
    }

    pub fn with_position<P: Into<String>>(mut self, position: P) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn with_email<E: Into<String>>(mut self, email: E) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Adresse exploitable (non vide), le cas échéant.
    pub fn contact_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
    }
}

/// Identifiant fort pour ShiftSlot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(String);

impl SlotId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Une unité de besoin : un poste dans une instance de shift (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftSlot {
    pub id: SlotId,
    pub shift_type: String,
    pub position: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub employee: Option<EmployeeId>,
}

impl ShiftSlot {
    /// Crée un slot non assigné en validant que `end > start`.
    pub fn new(
        shift_type: &str,
        position: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, String> {
        if end <= start {
            return Err("end must be strictly after start".to_string());
        }
        Ok(Self {
            id: SlotId::random(),
            shift_type: shift_type.to_string(),
            position: position.to_string(),
            start,
            end,
            employee: None,
        })
    }

    pub fn is_assigned(&self) -> bool {
        self.employee.is_some()
    }

    /// Durée en minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Observation historique (date, valeur observée).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalObservation {
    pub date: NaiveDate,
    pub value: f64,
}

impl HistoricalObservation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Point de prévision ; `lower <= predicted <= upper`.
///
/// Sérialisé avec les noms de colonnes habituels (`ds`, `yhat`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(rename = "ds")]
    pub date: NaiveDate,
    #[serde(rename = "yhat")]
    pub predicted: f64,
    #[serde(rename = "yhat_lower")]
    pub lower: f64,
    #[serde(rename = "yhat_upper")]
    pub upper: f64,
}

impl ForecastPoint {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn is_finite(&self) -> bool {
        self.predicted.is_finite() && self.lower.is_finite() && self.upper.is_finite()
    }
}

/// Besoin dérivé pour un (type de shift, poste). Jamais persisté.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffingRequirement {
    pub shift_type: String,
    pub position: String,
    pub headcount: u32,
}

/// Lot de notification : les slots affectés à un employé pendant un run.
#[derive(Debug, Clone)]
pub struct NotificationBatch {
    pub employee: EmployeeId,
    pub slots: Vec<ShiftSlot>,
}
