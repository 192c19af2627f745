use super::types::{AssignmentLedger, GenerateOptions, MonthPlan, SchedError, WorkloadTracker};
use crate::calendar::{shift_datetimes, TargetMonth};
use crate::model::{Employee, EmployeeId, ForecastPoint, ShiftSlot};
use crate::policy::StaffingPolicy;
use chrono::{DateTime, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Regroupe les employés par poste ; ceux sans poste sont exclus.
pub(super) fn pools_by_position(employees: &[Employee]) -> BTreeMap<&str, Vec<&Employee>> {
    let mut pools: BTreeMap<&str, Vec<&Employee>> = BTreeMap::new();
    for employee in employees {
        let Some(position) = employee.position.as_deref().map(str::trim) else {
            continue;
        };
        if position.is_empty() {
            continue;
        }
        pools.entry(position).or_default().push(employee);
    }
    pools
}

pub(super) fn plan_month<R: Rng + ?Sized>(
    policy: &StaffingPolicy,
    month: TargetMonth,
    employees: &[Employee],
    forecast: &[ForecastPoint],
    opts: &GenerateOptions,
    rng: &mut R,
) -> Result<MonthPlan, SchedError> {
    let pools = pools_by_position(employees);
    let demand: HashMap<NaiveDate, f64> = forecast.iter().map(|p| (p.date, p.predicted)).collect();

    let mut slots = Vec::new();
    let mut ledger = AssignmentLedger::new();
    let mut workload = WorkloadTracker::new();

    for date in month.days() {
        let predicted = demand.get(&date).copied().unwrap_or(0.0);
        debug!(%date, predicted, high = policy.is_high_demand(predicted), "planning day");

        for shift_type in &policy.shift_types {
            let (start, end) = shift_datetimes(date, shift_type.start_time, shift_type.end_time);
            for req in policy.requirements(&shift_type.name, predicted) {
                let pool = pools.get(req.position.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                let instance = ShiftInstance {
                    shift_type: &shift_type.name,
                    position: &req.position,
                    start,
                    end,
                };
                let mut seats = Seats {
                    slots: &mut slots,
                    ledger: &mut ledger,
                    workload: &mut workload,
                };
                fill_position(&instance, req.headcount, pool, opts, rng, &mut seats)?;
            }
        }
    }

    Ok(MonthPlan {
        month,
        slots,
        ledger,
    })
}

/// Accumulateurs du run alimentés par chaque place remplie.
struct Seats<'s> {
    slots: &'s mut Vec<ShiftSlot>,
    ledger: &'s mut AssignmentLedger,
    workload: &'s mut WorkloadTracker,
}

struct ShiftInstance<'a> {
    shift_type: &'a str,
    position: &'a str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Remplit `headcount` places d'un poste pour une instance de shift.
///
/// Une seule permutation du pool par instance ; un employé occupe au plus une
/// place, les places restantes restent vacantes. Un candidat refusé par
/// `opts` (chevauchement, plafond hebdomadaire) est indisponible pour l'instance.
fn fill_position<R: Rng + ?Sized>(
    instance: &ShiftInstance<'_>,
    headcount: u32,
    pool: &[&Employee],
    opts: &GenerateOptions,
    rng: &mut R,
    seats: &mut Seats<'_>,
) -> Result<(), SchedError> {
    if pool.is_empty() {
        warn!(
            position = instance.position,
            shift = instance.shift_type,
            start = %instance.start,
            headcount,
            "no employees for position, creating unassigned slots"
        );
    }

    let mut order: Vec<&Employee> = pool.to_vec();
    order.shuffle(rng);
    let mut candidates = order.into_iter();
    let mut used: HashSet<&EmployeeId> = HashSet::new();

    for seat in 0..headcount {
        let mut slot = ShiftSlot::new(instance.shift_type, instance.position, instance.start, instance.end)
            .map_err(anyhow::Error::msg)?;
        let workload = &*seats.workload;
        let found = candidates.by_ref().find(|&employee| {
            !used.contains(&employee.id) && workload.allows(&employee.id, &slot, opts)
        });
        match found {
            Some(employee) => {
                used.insert(&employee.id);
                slot.employee = Some(employee.id.clone());
                seats.workload.book(&employee.id, &slot);
                seats.ledger.record(&employee.id, &slot);
            }
            None if !pool.is_empty() => {
                warn!(
                    position = instance.position,
                    shift = instance.shift_type,
                    start = %instance.start,
                    seat = seat + 1,
                    headcount,
                    "no available employee left, slot left unassigned"
                );
            }
            None => {}
        }
        seats.slots.push(slot);
    }
    Ok(())
}
