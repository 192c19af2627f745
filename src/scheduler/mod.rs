mod assignment;
mod commit;
mod types;

pub use types::{
    week_start, AssignmentLedger, GenerateOptions, GenerationReport, MonthPlan, SchedError,
    WorkloadTracker,
};

use crate::calendar::{days_between, TargetMonth};
use crate::forecast::{forecast, ForecastOptions};
use crate::model::{Employee, ForecastPoint, HistoricalObservation};
use crate::notification::Dispatcher;
use crate::policy::StaffingPolicy;
use crate::storage::ShiftStore;
use rand::Rng;
use tracing::{info, warn};

/// Générateur de planning : encapsule la politique d'effectifs et les options de run.
#[derive(Debug, Clone, Default)]
pub struct ScheduleGenerator {
    policy: StaffingPolicy,
    forecast_opts: ForecastOptions,
    opts: GenerateOptions,
}

impl ScheduleGenerator {
    pub fn new(policy: StaffingPolicy) -> Self {
        Self {
            policy,
            forecast_opts: ForecastOptions::default(),
            opts: GenerateOptions::default(),
        }
    }

    pub fn with_forecast_options(mut self, forecast_opts: ForecastOptions) -> Self {
        self.forecast_opts = forecast_opts;
        self
    }

    pub fn with_options(mut self, opts: GenerateOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn policy(&self) -> &StaffingPolicy {
        &self.policy
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.opts
    }

    /// Prépare tous les slots du mois en mémoire, sans rien persister.
    pub fn plan_month<R: Rng + ?Sized>(
        &self,
        month: TargetMonth,
        employees: &[Employee],
        forecast: &[ForecastPoint],
        rng: &mut R,
    ) -> Result<MonthPlan, SchedError> {
        assignment::plan_month(&self.policy, month, employees, forecast, &self.opts, rng)
    }

    /// Run complet à partir d'une prévision déjà calculée : planification,
    /// remplacement transactionnel du mois, puis notifications hors transaction.
    pub fn generate_schedule<S, R>(
        &self,
        month: TargetMonth,
        employees: &[Employee],
        forecast: &[ForecastPoint],
        store: &mut S,
        dispatcher: &Dispatcher<'_>,
        rng: &mut R,
    ) -> Result<GenerationReport, SchedError>
    where
        S: ShiftStore + ?Sized,
        R: Rng + ?Sized,
    {
        info!(%month, employees = employees.len(), "starting schedule generation");

        let plan = self.plan_month(month, employees, forecast, rng)?;
        let created = plan.slots.len();
        let unassigned = plan.unassigned();
        if created == 0 {
            warn!(%month, "no shifts required, month will be left empty");
        }

        let cleared = commit::commit_plan(store, &plan)?;

        let batches = plan.ledger.drain();
        info!(%month, recipients = batches.len(), "dispatching schedule notices");
        let notifications = dispatcher.dispatch(batches, employees);
        info!(
            %month,
            sent = notifications.sent,
            failed = notifications.failed,
            "notifications finished"
        );

        Ok(GenerationReport {
            month,
            cleared,
            created,
            unassigned,
            notifications,
        })
    }

    /// Comme [`generate_schedule`](Self::generate_schedule), en calculant
    /// d'abord la prévision ; un échec de prévision n'altère rien.
    pub fn run<S, R>(
        &self,
        month: TargetMonth,
        employees: &[Employee],
        history: &[HistoricalObservation],
        store: &mut S,
        dispatcher: &Dispatcher<'_>,
        rng: &mut R,
    ) -> Result<GenerationReport, SchedError>
    where
        S: ShiftStore + ?Sized,
        R: Rng + ?Sized,
    {
        let horizon = self.horizon_for(month, history);
        info!(%month, horizon, "forecasting demand");
        let points = forecast(history, horizon, &self.forecast_opts)?;
        self.generate_schedule(month, employees, &points, store, dispatcher, rng)
    }

    /// Jours de prévision nécessaires pour couvrir le mois depuis la dernière
    /// observation, plus la marge configurée (au moins 1).
    pub fn horizon_for(&self, month: TargetMonth, history: &[HistoricalObservation]) -> u32 {
        let to_month_end = history
            .last()
            .map(|last| days_between(last.date, month.last_day()))
            .unwrap_or(0)
            .max(0);
        let horizon = to_month_end.saturating_add(i64::from(self.opts.forecast_buffer_days));
        u32::try_from(horizon).unwrap_or(u32::MAX).max(1)
    }
}
