#![forbid(unsafe_code)]
//! Shiftcast : planification mensuelle des équipes à partir d'une prévision de demande.
//!
//! - Prévision journalière (tendance + saisonnalités) avec intervalle.
//! - Politique d'effectifs par type de shift, renfort en forte demande.
//! - Affectation gloutonne aléatoire (RNG injecté), postes vacants sinon.
//! - Remplacement transactionnel du mois, notifications hors transaction.
//! - Tout en UTC ; stockage fichiers (JSON/CSV).

pub mod calendar;
pub mod config;
pub mod forecast;
pub mod io;
pub mod model;
pub mod notification;
pub mod policy;
pub mod scheduler;
pub mod storage;

pub use calendar::TargetMonth;
pub use config::{load_config, AppConfig, NotificationConfig};
pub use forecast::{forecast, DemandModel, ForecastError, ForecastOptions};
pub use model::{
    Employee, EmployeeId, ForecastPoint, HistoricalObservation, NotificationBatch, ShiftSlot,
    SlotId, StaffingRequirement,
};
pub use notification::{
    prepare_notice, Dispatcher, NotificationError, NotificationSummary, OutboxTransport,
    ScheduleNotice, ScheduleRenderer, TextSchedule, Transport,
};
pub use policy::{load_policy_from_file, ShiftType, StaffingPolicy};
pub use scheduler::{
    AssignmentLedger, GenerateOptions, GenerationReport, MonthPlan, SchedError, ScheduleGenerator,
    WorkloadTracker,
};
pub use storage::{JsonShiftStore, MemoryShiftStore, ShiftStore, StorageError};
