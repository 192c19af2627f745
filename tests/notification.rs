#![forbid(unsafe_code)]
use chrono::{Duration, TimeZone, Utc};
use shiftcast::{
    prepare_notice, Dispatcher, Employee, EmployeeId, NotificationBatch, NotificationError,
    OutboxTransport, ScheduleRenderer, ShiftSlot, TextSchedule, Transport,
};
use std::cell::RefCell;
use std::fs;
use tempfile::tempdir;

#[derive(Default)]
struct Collect {
    sent: RefCell<Vec<String>>,
}

impl Transport for Collect {
    fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<(), NotificationError> {
        self.sent.borrow_mut().push(to.to_string());
        Ok(())
    }
}

fn slot(day: u32, hour: u32, position: &str, shift: &str, employee: &Employee) -> ShiftSlot {
    let start = Utc.with_ymd_and_hms(2025, 5, day, hour, 0, 0).unwrap();
    let mut s = ShiftSlot::new(shift, position, start, start + Duration::hours(8)).unwrap();
    s.employee = Some(employee.id.clone());
    s
}

fn alice() -> Employee {
    let mut e = Employee::new("Alice")
        .with_position("Server")
        .with_email("alice@example.com");
    e.id = EmployeeId::new("emp-alice");
    e
}

#[test]
fn subject_spans_first_and_last_day() {
    let a = alice();
    let slots = vec![slot(3, 10, "Server", "Day", &a), slot(17, 16, "Server", "Eve", &a)];
    let subject = TextSchedule::default().subject(&a, &slots);
    insta::assert_snapshot!(subject, @"Your schedule: May 03 - May 17, 2025");
}

#[test]
fn body_lists_every_shift() {
    let a = alice();
    let slots = vec![slot(3, 10, "Server", "Day", &a), slot(17, 16, "Server", "Eve", &a)];
    let body = TextSchedule::default().body(&a, &slots);

    assert!(body.starts_with("Hi Alice,\n"));
    assert!(body.contains("- Sat 2025-05-03 10:00 - 18:00  Server (Day)\n"));
    assert!(body.contains("- Sat 2025-05-17 16:00 - 00:00  Server (Eve)\n"));
    assert!(body.ends_with("2 shift(s) in total.\n"));
}

#[test]
fn custom_prefix_is_used() {
    let a = alice();
    let renderer = TextSchedule {
        subject_prefix: "Planning".to_string(),
    };
    let notice = prepare_notice(&a, &[slot(5, 10, "Server", "Day", &a)], &renderer).unwrap();
    assert_eq!(notice.to, "alice@example.com");
    assert_eq!(notice.subject, "Planning: May 05 - May 05, 2025");
}

#[test]
fn empty_batch_is_a_no_op() {
    let transport = Collect::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);
    assert!(dispatcher.notify(&alice(), &[]));
    assert!(transport.sent.borrow().is_empty());
}

#[test]
fn missing_or_blank_address_fails() {
    let transport = Collect::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);

    let mut nomail = alice();
    nomail.email = None;
    let s = slot(3, 10, "Server", "Day", &nomail);
    assert!(!dispatcher.notify(&nomail, std::slice::from_ref(&s)));

    nomail.email = Some("   ".to_string());
    assert!(matches!(
        prepare_notice(&nomail, std::slice::from_ref(&s), &renderer),
        Err(NotificationError::MissingAddress(_))
    ));
    assert!(transport.sent.borrow().is_empty());
}

#[test]
fn dispatch_counts_unknown_employees_as_failed() {
    let transport = Collect::default();
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);
    let a = alice();
    let ghost = Employee::new("Ghost").with_email("ghost@example.com");

    let batches = vec![
        NotificationBatch {
            employee: a.id.clone(),
            slots: vec![slot(9, 16, "Server", "Eve", &a), slot(2, 10, "Server", "Day", &a)],
        },
        NotificationBatch {
            employee: ghost.id.clone(),
            slots: vec![slot(4, 10, "Cook", "Day", &ghost)],
        },
    ];
    let summary = dispatcher.dispatch(batches, std::slice::from_ref(&a));
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(*transport.sent.borrow(), vec!["alice@example.com".to_string()]);
}

#[test]
fn outbox_writes_one_file_per_recipient() {
    let dir = tempdir().unwrap();
    let outbox = dir.path().join("outbox");
    let transport = OutboxTransport::new(&outbox).with_sender("No Reply <noreply@example.com>");
    let renderer = TextSchedule::default();
    let dispatcher = Dispatcher::new(&transport, &renderer);

    let a = alice();
    assert!(dispatcher.notify(&a, &[slot(3, 10, "Server", "Day", &a)]));

    let path = transport.message_path("alice@example.com");
    assert_eq!(path, outbox.join("alice%40example.com.txt"));
    let content = fs::read_to_string(path).unwrap();
    assert!(content.starts_with("From: No Reply <noreply@example.com>\nTo: alice@example.com\n"));
    assert!(content.contains("Subject: Your schedule: May 03 - May 03, 2025\n\nHi Alice,"));
}

#[test]
fn outbox_keeps_similar_addresses_apart() {
    let dir = tempdir().unwrap();
    let transport = OutboxTransport::new(dir.path());
    assert_ne!(
        transport.message_path("a+b@x.com"),
        transport.message_path("a_b@x.com")
    );

    transport.send("a+b@x.com", "first", "one").unwrap();
    transport.send("a_b@x.com", "second", "two").unwrap();
    let files = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(files, 2);
    let first = fs::read_to_string(transport.message_path("a+b@x.com")).unwrap();
    assert!(first.contains("Subject: first"));
}

#[test]
fn outbox_failure_is_a_transport_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    let transport = OutboxTransport::new(&blocker);
    let err = transport.send("bob@example.com", "s", "b").unwrap_err();
    assert!(matches!(err, NotificationError::Transport(_)));
}
