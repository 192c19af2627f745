#![forbid(unsafe_code)]
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shiftcast::scheduler::week_start;
use shiftcast::{
    load_config, AppConfig, Dispatcher, Employee, EmployeeId, ForecastError, ForecastPoint,
    GenerateOptions, HistoricalObservation, MemoryShiftStore, NotificationError, SchedError,
    ScheduleGenerator, ShiftSlot, ShiftStore, ShiftType, StaffingPolicy, StorageError,
    TargetMonth, TextSchedule, Transport,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Default)]
struct RecordingTransport {
    failing: Vec<String>,
    sent: RefCell<Vec<(String, String, String)>>,
}

impl Transport for RecordingTransport {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        if self.failing.iter().any(|addr| addr == to) {
            return Err(NotificationError::Transport("smtp relay refused".into()));
        }
        self.sent
            .borrow_mut()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// Stockage dont le commit échoue toujours.
struct FailingCommitStore {
    inner: MemoryShiftStore,
}

impl ShiftStore for FailingCommitStore {
    fn shifts_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ShiftSlot>, StorageError> {
        self.inner.shifts_in_range(start, end)
    }
    fn begin(&mut self) -> Result<(), StorageError> {
        self.inner.begin()
    }
    fn delete_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<usize, StorageError> {
        self.inner.delete_range(start, end)
    }
    fn insert(&mut self, slots: &[ShiftSlot]) -> Result<(), StorageError> {
        self.inner.insert(slots)
    }
    fn commit(&mut self) -> Result<(), StorageError> {
        Err(StorageError::Backend("disk full".into()))
    }
    fn rollback(&mut self) {
        self.inner.rollback()
    }
}

fn month(raw: &str) -> TargetMonth {
    raw.parse().unwrap()
}

fn staff(name: &str, position: &str) -> Employee {
    Employee::new(name)
        .with_position(position)
        .with_email(format!("{}@example.com", name.to_lowercase()))
}

fn flat_forecast(month: TargetMonth, demand: f64) -> Vec<ForecastPoint> {
    month
        .days()
        .map(|date| ForecastPoint {
            date,
            predicted: demand,
            lower: demand,
            upper: demand,
        })
        .collect()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Politique minimale : un seul service avec trois postes.
fn three_post_policy() -> StaffingPolicy {
    let mut base = BTreeMap::new();
    base.insert(
        "Day".to_string(),
        [("Manager", 1), ("Server", 1), ("Cook", 1)]
            .into_iter()
            .map(|(p, c)| (p.to_string(), c))
            .collect(),
    );
    StaffingPolicy {
        demand_threshold: 175.0,
        shift_types: vec![ShiftType::new("Day", hm(10, 0), hm(18, 0))],
        base_needs: base,
        high_demand_extra: BTreeMap::new(),
    }
}

fn slot_at(start: DateTime<Utc>, position: &str) -> ShiftSlot {
    ShiftSlot::new("Day", position, start, start + Duration::hours(8)).unwrap()
}

#[test]
fn month_of_thirty_days_generates_sum_of_headcounts() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let mut store = MemoryShiftStore::new();
    let transport = RecordingTransport::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);
    let mut rng = StdRng::seed_from_u64(7);

    let report = generator
        .generate_schedule(june, &[], &flat_forecast(june, 100.0), &mut store, &dispatcher, &mut rng)
        .unwrap();

    // Day = 9 postes, Eve = 15 postes
    assert_eq!(report.created, 30 * (9 + 15));
    assert_eq!(report.unassigned, report.created);
    assert_eq!(report.cleared, 0);
    assert_eq!(report.notifications.sent + report.notifications.failed, 0);
    assert_eq!(store.all().len(), 720);
    assert!(transport.sent.borrow().is_empty());
}

#[test]
fn high_demand_days_add_evening_staff() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let mut forecast = flat_forecast(june, 100.0);
    forecast[13].predicted = 175.0;
    forecast[20].predicted = 260.0;

    let mut rng = StdRng::seed_from_u64(1);
    let plan = generator.plan_month(june, &[], &forecast, &mut rng).unwrap();
    assert_eq!(plan.slots.len(), 30 * 24 + 2 * 4);

    let busy = Utc.with_ymd_and_hms(2025, 6, 14, 16, 0, 0).unwrap();
    let servers = plan
        .slots
        .iter()
        .filter(|s| s.start == busy && s.position == "Server")
        .count();
    assert_eq!(servers, 5);
}

#[test]
fn missing_forecast_days_count_as_zero_demand() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let mut rng = StdRng::seed_from_u64(3);
    let plan = generator
        .plan_month(month("2024-02"), &[], &[], &mut rng)
        .unwrap();
    assert_eq!(plan.slots.len(), 29 * 24);
}

#[test]
fn single_server_fills_one_of_three_evening_seats() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let server = staff("Sam", "Server");
    let mut rng = StdRng::seed_from_u64(11);
    let plan = generator
        .plan_month(june, std::slice::from_ref(&server), &flat_forecast(june, 50.0), &mut rng)
        .unwrap();

    let mut evenings: BTreeMap<DateTime<Utc>, Vec<&ShiftSlot>> = BTreeMap::new();
    for slot in plan.slots.iter().filter(|s| s.shift_type == "Eve" && s.position == "Server") {
        evenings.entry(slot.start).or_default().push(slot);
    }
    assert_eq!(evenings.len(), 30);
    for seats in evenings.values() {
        assert_eq!(seats.len(), 3);
        let assigned: Vec<_> = seats.iter().filter_map(|s| s.employee.as_ref()).collect();
        assert_eq!(assigned, vec![&server.id]);
    }
}

#[test]
fn no_employee_fills_two_seats_of_the_same_instance() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let roster = vec![
        staff("Ana", "Cook"),
        staff("Ben", "Cook"),
        staff("Cid", "Server"),
        staff("Dee", "Server"),
        staff("Eve", "Server"),
        staff("Fay", "Server"),
    ];
    let mut rng = StdRng::seed_from_u64(99);
    let plan = generator
        .plan_month(june, &roster, &flat_forecast(june, 200.0), &mut rng)
        .unwrap();

    let mut instances: HashMap<(DateTime<Utc>, &str), Vec<&ShiftSlot>> = HashMap::new();
    for slot in &plan.slots {
        instances
            .entry((slot.start, slot.position.as_str()))
            .or_default()
            .push(slot);
    }
    for ((_, position), seats) in &instances {
        let ids: Vec<&EmployeeId> = seats.iter().filter_map(|s| s.employee.as_ref()).collect();
        let unique: HashSet<&EmployeeId> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len(), "duplicate employee for {position}");
    }

    // forte demande : 6 cuisiniers requis le soir pour 2 disponibles
    let eve_cooks: Vec<_> = plan
        .slots
        .iter()
        .filter(|s| s.shift_type == "Eve" && s.position == "Cook")
        .collect();
    assert_eq!(eve_cooks.len(), 30 * 6);
    assert_eq!(eve_cooks.iter().filter(|s| s.is_assigned()).count(), 30 * 2);
}

#[test]
fn empty_pool_leaves_every_seat_vacant() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let roster = vec![staff("Ana", "Cook"), Employee::new("Nopos").with_email("nopos@example.com")];
    let mut rng = StdRng::seed_from_u64(5);
    let plan = generator
        .plan_month(june, &roster, &flat_forecast(june, 10.0), &mut rng)
        .unwrap();

    let managers: Vec<_> = plan.slots.iter().filter(|s| s.position == "Manager").collect();
    assert_eq!(managers.len(), 60);
    assert!(managers.iter().all(|s| !s.is_assigned()));

    // l'employé sans poste n'est jamais affecté
    let nopos = &roster[1].id;
    assert!(plan.slots.iter().all(|s| s.employee.as_ref() != Some(nopos)));
}

#[test]
fn repeated_runs_have_identical_counts() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let roster = vec![
        staff("Ana", "Cook"),
        staff("Ben", "Cook"),
        staff("Cid", "Server"),
        staff("Moe", "Manager"),
    ];
    let mut forecast = flat_forecast(june, 120.0);
    forecast[5].predicted = 300.0;

    let mut store = MemoryShiftStore::new();
    let transport = RecordingTransport::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);

    let first = generator
        .generate_schedule(june, &roster, &forecast, &mut store, &dispatcher, &mut StdRng::seed_from_u64(1))
        .unwrap();
    let second = generator
        .generate_schedule(june, &roster, &forecast, &mut store, &dispatcher, &mut StdRng::seed_from_u64(2))
        .unwrap();

    assert_eq!(first.created, second.created);
    assert_eq!(first.unassigned, second.unassigned);
    assert_eq!(second.cleared, first.created);
    assert_eq!(store.all().len(), second.created);
}

#[test]
fn same_seed_gives_same_assignments() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let roster: Vec<Employee> = ["A", "B", "C", "D", "E"]
        .iter()
        .map(|n| staff(n, "Server"))
        .collect();
    let forecast = flat_forecast(june, 100.0);

    let a = generator
        .plan_month(june, &roster, &forecast, &mut StdRng::seed_from_u64(42))
        .unwrap();
    let b = generator
        .plan_month(june, &roster, &forecast, &mut StdRng::seed_from_u64(42))
        .unwrap();
    let who = |plan: &shiftcast::MonthPlan| -> Vec<Option<EmployeeId>> {
        plan.slots.iter().map(|s| s.employee.clone()).collect()
    };
    assert_eq!(who(&a), who(&b));
}

#[test]
fn evening_shift_rolls_over_midnight() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let mut rng = StdRng::seed_from_u64(0);
    let plan = generator
        .plan_month(june, &[], &flat_forecast(june, 0.0), &mut rng)
        .unwrap();

    let last_eve = plan
        .slots
        .iter()
        .filter(|s| s.shift_type == "Eve")
        .max_by_key(|s| s.start)
        .unwrap();
    assert_eq!(last_eve.start, Utc.with_ymd_and_hms(2025, 6, 30, 16, 0, 0).unwrap());
    assert_eq!(last_eve.end, Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap());
    assert_eq!(last_eve.duration_minutes(), 8 * 60);
}

#[test]
fn regeneration_only_replaces_the_target_month() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let may_last = slot_at(Utc.with_ymd_and_hms(2025, 5, 31, 16, 0, 0).unwrap(), "Cook");
    let june_old = slot_at(Utc.with_ymd_and_hms(2025, 6, 10, 10, 0, 0).unwrap(), "Cook");
    let july_first = slot_at(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(), "Cook");
    let mut store = MemoryShiftStore::with_shifts(vec![may_last.clone(), june_old.clone(), july_first.clone()]);

    let transport = RecordingTransport::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);
    let report = generator
        .generate_schedule(june, &[], &flat_forecast(june, 0.0), &mut store, &dispatcher, &mut StdRng::seed_from_u64(9))
        .unwrap();

    assert_eq!(report.cleared, 1);
    let ids: HashSet<_> = store.all().iter().map(|s| s.id.clone()).collect();
    assert!(ids.contains(&may_last.id));
    assert!(ids.contains(&july_first.id));
    assert!(!ids.contains(&june_old.id));
    assert_eq!(store.all().len(), 2 + report.created);
}

#[test]
fn commit_failure_rolls_back_and_skips_notifications() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let existing = slot_at(Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(), "Server");
    let mut store = FailingCommitStore {
        inner: MemoryShiftStore::with_shifts(vec![existing.clone()]),
    };
    let transport = RecordingTransport::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);

    let err = generator
        .generate_schedule(
            june,
            &[staff("Sam", "Server")],
            &flat_forecast(june, 100.0),
            &mut store,
            &dispatcher,
            &mut StdRng::seed_from_u64(4),
        )
        .unwrap_err();

    assert!(matches!(err, SchedError::Persistence(StorageError::Backend(_))));
    assert!(!store.inner.in_transaction());
    assert_eq!(store.inner.all(), std::slice::from_ref(&existing));
    assert!(transport.sent.borrow().is_empty());
}

#[test]
fn forecast_failure_aborts_before_any_mutation() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let existing = slot_at(Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(), "Server");
    let mut store = MemoryShiftStore::with_shifts(vec![existing.clone()]);
    let transport = RecordingTransport::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);
    let history = vec![HistoricalObservation::new(
        NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
        120.0,
    )];

    let err = generator
        .run(month("2025-06"), &[], &history, &mut store, &dispatcher, &mut StdRng::seed_from_u64(4))
        .unwrap_err();

    assert!(matches!(
        err,
        SchedError::ForecastUnavailable(ForecastError::InsufficientData { found: 1 })
    ));
    assert!(!store.in_transaction());
    assert_eq!(store.all(), std::slice::from_ref(&existing));
}

#[test]
fn one_failed_notice_does_not_affect_the_others() {
    let generator = ScheduleGenerator::new(three_post_policy());
    let feb = month("2024-02");
    let roster = vec![staff("Max", "Manager"), staff("Sue", "Server"), staff("Cal", "Cook")];
    let transport = RecordingTransport {
        failing: vec!["sue@example.com".to_string()],
        ..RecordingTransport::default()
    };
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);
    let mut store = MemoryShiftStore::new();

    let report = generator
        .generate_schedule(feb, &roster, &[], &mut store, &dispatcher, &mut StdRng::seed_from_u64(8))
        .unwrap();

    assert_eq!(report.created, 29 * 3);
    assert_eq!(report.unassigned, 0);
    assert_eq!(report.notifications.sent, 2);
    assert_eq!(report.notifications.failed, 1);
    assert_eq!(store.all().len(), 87);

    let sent = transport.sent.borrow();
    assert_eq!(sent.len(), 2);
    let (_, subject, body) = sent
        .iter()
        .find(|(to, _, _)| to == "max@example.com")
        .unwrap();
    assert_eq!(subject, "Your schedule: Feb 01 - Feb 29, 2024");
    assert_eq!(body.matches("\n- ").count(), 29);
}

#[test]
fn employees_without_email_count_as_failed() {
    let generator = ScheduleGenerator::new(three_post_policy());
    let feb = month("2024-02");
    let roster = vec![
        staff("Max", "Manager"),
        Employee::new("Nomail").with_position("Cook"),
    ];
    let transport = RecordingTransport::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);
    let mut store = MemoryShiftStore::new();

    let report = generator
        .generate_schedule(feb, &roster, &[], &mut store, &dispatcher, &mut StdRng::seed_from_u64(8))
        .unwrap();
    assert_eq!(report.notifications.sent, 1);
    assert_eq!(report.notifications.failed, 1);
    assert_eq!(report.unassigned, 29);
}

#[test]
fn month_without_requirements_is_cleared_and_succeeds() {
    let mut policy = three_post_policy();
    policy.base_needs.clear();
    let generator = ScheduleGenerator::new(policy);
    let june = month("2025-06");
    let mut store = MemoryShiftStore::with_shifts(vec![
        slot_at(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(), "Cook"),
        slot_at(Utc.with_ymd_and_hms(2025, 6, 30, 10, 0, 0).unwrap(), "Cook"),
    ]);
    let transport = RecordingTransport::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);

    let report = generator
        .generate_schedule(june, &[staff("Ana", "Cook")], &[], &mut store, &dispatcher, &mut StdRng::seed_from_u64(0))
        .unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.cleared, 2);
    let (start, end) = june.range();
    assert!(store.shifts_in_range(start, end).unwrap().is_empty());
}

#[test]
fn ledger_batches_are_sorted_by_start() {
    let generator = ScheduleGenerator::new(three_post_policy());
    let june = month("2025-06");
    let roster = vec![staff("Max", "Manager"), staff("Cal", "Cook")];
    let plan = generator
        .plan_month(june, &roster, &[], &mut StdRng::seed_from_u64(12))
        .unwrap();
    assert_eq!(plan.ledger.employees(), 2);

    let batches = plan.ledger.drain();
    assert_eq!(batches.len(), 2);
    for batch in &batches {
        assert_eq!(batch.slots.len(), 30);
        assert!(batch.slots.windows(2).all(|w| w[0].start <= w[1].start));
        assert!(batch.slots.iter().all(|s| s.employee.as_ref() == Some(&batch.employee)));
    }
}

#[test]
fn run_forecasts_then_schedules() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant());
    let june = month("2025-06");
    let first = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
    let history: Vec<_> = (0..30)
        .map(|i| HistoricalObservation::new(first + Duration::days(i), 100.0))
        .collect();
    assert_eq!(generator.horizon_for(june, &history), 30 + 7);

    let roster = vec![staff("Sam", "Server"), staff("Moe", "Manager")];
    let transport = RecordingTransport::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);
    let mut store = MemoryShiftStore::new();

    let report = generator
        .run(june, &roster, &history, &mut store, &dispatcher, &mut StdRng::seed_from_u64(21))
        .unwrap();
    assert_eq!(report.created, 720);
    assert_eq!(report.notifications.sent, 2);
    // Sam : 1 place le jour + 1 le soir, chaque jour
    assert_eq!(
        store
            .all()
            .iter()
            .filter(|s| s.employee.as_ref() == Some(&roster[0].id))
            .count(),
        60
    );
}

#[test]
fn overlap_guard_keeps_one_of_two_overlapping_instances() {
    let generator = ScheduleGenerator::new(StaffingPolicy::restaurant()).with_options(GenerateOptions {
        prevent_overlap: true,
        ..GenerateOptions::default()
    });
    let june = month("2025-06");
    let moe = staff("Moe", "Manager");
    let plan = generator
        .plan_month(june, std::slice::from_ref(&moe), &flat_forecast(june, 100.0), &mut StdRng::seed_from_u64(3))
        .unwrap();

    let managers: Vec<_> = plan.slots.iter().filter(|s| s.position == "Manager").collect();
    assert_eq!(managers.len(), 60);
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for slot in managers.iter().filter(|s| s.is_assigned()) {
        assert_eq!(slot.employee.as_ref(), Some(&moe.id));
        *per_day.entry(slot.start.date_naive()).or_insert(0) += 1;
    }
    assert_eq!(per_day.len(), 30);
    assert!(per_day.values().all(|&n| n == 1));

    let mut taken: Vec<_> = managers.iter().filter(|s| s.is_assigned()).collect();
    taken.sort_by_key(|s| s.start);
    assert!(taken.windows(2).all(|w| w[0].end <= w[1].start));
}

#[test]
fn weekly_hour_limit_caps_each_sunday_week() {
    let generator = ScheduleGenerator::new(three_post_policy()).with_options(GenerateOptions {
        weekly_hour_limit: Some(40),
        ..GenerateOptions::default()
    });
    // 2025-06-01 est un dimanche
    let june = month("2025-06");
    let max = staff("Max", "Manager");
    let plan = generator
        .plan_month(june, std::slice::from_ref(&max), &[], &mut StdRng::seed_from_u64(3))
        .unwrap();

    let mut minutes: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for slot in plan.slots.iter().filter(|s| s.employee.as_ref() == Some(&max.id)) {
        *minutes.entry(week_start(slot)).or_insert(0) += slot.duration_minutes();
    }
    assert!(minutes.values().all(|&m| m <= 40 * 60), "{minutes:?}");
    // 4 semaines pleines à 5 shifts, puis les 29 et 30
    assert_eq!(minutes.values().sum::<i64>(), 22 * 8 * 60);
    let managers = plan.slots.iter().filter(|s| s.position == "Manager").count();
    assert_eq!(managers, 30);
}

#[test]
fn workload_options_come_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"prevent_overlap": true, "weekly_hour_limit": 40}"#).unwrap();

    let config = load_config(&path).unwrap();
    let opts = *config.generator().options();
    assert!(opts.prevent_overlap);
    assert_eq!(opts.weekly_hour_limit, Some(40));
    assert_eq!(opts.forecast_buffer_days, 7);

    let defaults = *AppConfig::default().generator().options();
    assert_eq!(defaults, GenerateOptions::default());
}
