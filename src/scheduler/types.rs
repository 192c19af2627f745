use crate::calendar::TargetMonth;
use crate::forecast::ForecastError;
use crate::model::{EmployeeId, NotificationBatch, ShiftSlot};
use crate::notification::NotificationSummary;
use crate::storage::StorageError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("forecast unavailable: {0}")]
    ForecastUnavailable(#[from] ForecastError),
    #[error("persistence failed, run rolled back: {0}")]
    Persistence(#[from] StorageError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Options d'un run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Jours de prévision ajoutés au-delà de la fin du mois.
    pub forecast_buffer_days: u32,
    /// Refuse un candidat déjà affecté à un shift qui chevauche.
    pub prevent_overlap: bool,
    /// Plafond d'heures par employé et par semaine (dimanche → samedi, UTC).
    pub weekly_hour_limit: Option<u32>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            forecast_buffer_days: 7,
            prevent_overlap: false,
            weekly_hour_limit: None,
        }
    }
}

/// Charge de travail accumulée pendant un run, par employé.
///
/// Ne voit que les affectations du run en cours.
#[derive(Debug, Default)]
pub struct WorkloadTracker {
    booked: HashMap<EmployeeId, Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    weekly_minutes: HashMap<(EmployeeId, NaiveDate), i64>,
}

impl WorkloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` si l'employé peut prendre `slot` sans enfreindre les options.
    pub fn allows(&self, employee: &EmployeeId, slot: &ShiftSlot, opts: &GenerateOptions) -> bool {
        if opts.prevent_overlap {
            let overlaps = self.booked.get(employee).is_some_and(|taken| {
                taken
                    .iter()
                    .any(|(start, end)| slot.start < *end && slot.end > *start)
            });
            if overlaps {
                return false;
            }
        }
        if let Some(limit) = opts.weekly_hour_limit {
            let key = (employee.clone(), week_start(slot));
            let done = self.weekly_minutes.get(&key).copied().unwrap_or(0);
            if done + slot.duration_minutes() > i64::from(limit) * 60 {
                return false;
            }
        }
        true
    }

    pub fn book(&mut self, employee: &EmployeeId, slot: &ShiftSlot) {
        self.booked
            .entry(employee.clone())
            .or_default()
            .push((slot.start, slot.end));
        *self
            .weekly_minutes
            .entry((employee.clone(), week_start(slot)))
            .or_insert(0) += slot.duration_minutes();
    }
}

/// Dimanche (UTC) de la semaine où commence le slot.
pub fn week_start(slot: &ShiftSlot) -> NaiveDate {
    let date = slot.start.date_naive();
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Accumulateur des affectations d'un run, par employé.
#[derive(Debug, Default)]
pub struct AssignmentLedger {
    by_employee: BTreeMap<EmployeeId, Vec<ShiftSlot>>,
}

impl AssignmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, employee: &EmployeeId, slot: &ShiftSlot) {
        self.by_employee
            .entry(employee.clone())
            .or_default()
            .push(slot.clone());
    }

    pub fn employees(&self) -> usize {
        self.by_employee.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_employee.is_empty()
    }

    /// Vide l'accumulateur en lots triés par heure de début.
    pub fn drain(self) -> Vec<NotificationBatch> {
        self.by_employee
            .into_iter()
            .map(|(employee, mut slots)| {
                slots.sort_by_key(|s| s.start);
                NotificationBatch { employee, slots }
            })
            .collect()
    }
}

/// Résultat de la phase de planification (rien n'est encore persisté).
#[derive(Debug)]
pub struct MonthPlan {
    pub month: TargetMonth,
    pub slots: Vec<ShiftSlot>,
    pub ledger: AssignmentLedger,
}

impl MonthPlan {
    pub fn unassigned(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_assigned()).count()
    }
}

/// Bilan d'un run réussi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub month: TargetMonth,
    /// Shifts préexistants remplacés.
    pub cleared: usize,
    pub created: usize,
    pub unassigned: usize,
    pub notifications: NotificationSummary,
}
