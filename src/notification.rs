use crate::model::{Employee, EmployeeId, NotificationBatch, ShiftSlot};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("employee {0} has no usable contact address")]
    MissingAddress(String),
    #[error("transport unavailable: {0}")]
    Transport(String),
}

/// Canal d'envoi : un message (adresse, sujet, corps) par appel.
pub trait Transport {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError>;
}

/// Message consolidé pour un employé.
#[derive(Debug, Clone)]
pub struct ScheduleNotice {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Permet de customiser le rendu du message (mail, SMS, etc.).
pub trait ScheduleRenderer {
    fn subject(&self, employee: &Employee, slots: &[ShiftSlot]) -> String;
    fn body(&self, employee: &Employee, slots: &[ShiftSlot]) -> String;
}

/// Gabarit texte simple.
#[derive(Debug, Clone)]
pub struct TextSchedule {
    pub subject_prefix: String,
}

impl Default for TextSchedule {
    fn default() -> Self {
        Self {
            subject_prefix: "Your schedule".to_string(),
        }
    }
}

impl ScheduleRenderer for TextSchedule {
    fn subject(&self, _employee: &Employee, slots: &[ShiftSlot]) -> String {
        match date_span(slots) {
            Some((first, last)) => format!(
                "{}: {} - {}",
                self.subject_prefix,
                first.format("%b %d"),
                last.format("%b %d, %Y")
            ),
            None => format!("{}: upcoming period", self.subject_prefix),
        }
    }

    fn body(&self, employee: &Employee, slots: &[ShiftSlot]) -> String {
        let mut out = format!("Hi {},\n\nHere are your upcoming shifts:\n\n", employee.name);
        for slot in slots {
            out.push_str(&format!(
                "- {} {} - {}  {} ({})\n",
                slot.start.format("%a %Y-%m-%d"),
                slot.start.format("%H:%M"),
                slot.end.format("%H:%M"),
                slot.position,
                slot.shift_type
            ));
        }
        out.push_str(&format!("\n{} shift(s) in total.\n", slots.len()));
        out
    }
}

/// Prépare le message d'un lot ; échoue si l'employé n'a pas d'adresse.
pub fn prepare_notice(
    employee: &Employee,
    slots: &[ShiftSlot],
    renderer: &dyn ScheduleRenderer,
) -> Result<ScheduleNotice, NotificationError> {
    let to = employee
        .contact_address()
        .ok_or_else(|| NotificationError::MissingAddress(employee.name.clone()))?;
    Ok(ScheduleNotice {
        to: to.to_string(),
        subject: renderer.subject(employee, slots),
        body: renderer.body(employee, slots),
    })
}

/// Bilan agrégé des envois d'un run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Envoie un message consolidé par employé.
pub struct Dispatcher<'a> {
    transport: &'a dyn Transport,
    renderer: &'a dyn ScheduleRenderer,
}

impl<'a> Dispatcher<'a> {
    pub fn new(transport: &'a dyn Transport, renderer: &'a dyn ScheduleRenderer) -> Self {
        Self {
            transport,
            renderer,
        }
    }

    /// `true` si le message est parti (ou s'il n'y avait rien à envoyer).
    /// Les erreurs sont journalisées, jamais propagées.
    pub fn notify(&self, employee: &Employee, ordered_slots: &[ShiftSlot]) -> bool {
        if ordered_slots.is_empty() {
            return true;
        }
        let result = prepare_notice(employee, ordered_slots, self.renderer).and_then(|notice| {
            self.transport
                .send(&notice.to, &notice.subject, &notice.body)
                .map(|()| notice)
        });
        match result {
            Ok(notice) => {
                info!(employee = %employee.name, to = %notice.to, shifts = ordered_slots.len(), "schedule notice sent");
                true
            }
            Err(err) => {
                warn!(employee = %employee.name, error = %err, "schedule notice failed");
                false
            }
        }
    }

    /// Envoie chaque lot indépendamment et agrège les résultats.
    pub fn dispatch(
        &self,
        batches: Vec<NotificationBatch>,
        employees: &[Employee],
    ) -> NotificationSummary {
        let by_id: HashMap<&EmployeeId, &Employee> = employees.iter().map(|e| (&e.id, e)).collect();
        let mut summary = NotificationSummary::default();
        for mut batch in batches {
            batch.slots.sort_by_key(|s| s.start);
            let delivered = match by_id.get(&batch.employee) {
                Some(employee) => self.notify(employee, &batch.slots),
                None => {
                    warn!(employee_id = batch.employee.as_str(), "unknown employee in notification batch");
                    false
                }
            };
            if delivered {
                summary.sent += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary
    }
}

/// Transport fichier : chaque message est écrit dans `<dir>/<adresse encodée>.txt`.
#[derive(Debug, Clone)]
pub struct OutboxTransport {
    dir: PathBuf,
    sender: Option<String>,
}

impl OutboxTransport {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            sender: None,
        }
    }

    pub fn with_sender<S: Into<String>>(mut self, sender: S) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Nom de fichier injectif : l'adresse est percent-encodée.
    pub fn message_path(&self, to: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", urlencoding::encode(to)))
    }
}

impl Transport for OutboxTransport {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            NotificationError::Transport(format!("creating outbox {}: {err}", self.dir.display()))
        })?;
        let path = self.message_path(to);
        let mut content = String::new();
        if let Some(sender) = &self.sender {
            content.push_str(&format!("From: {sender}\n"));
        }
        content.push_str(&format!("To: {to}\nSubject: {subject}\n\n{body}"));
        fs::write(&path, content).map_err(|err| {
            NotificationError::Transport(format!("writing {}: {err}", path.display()))
        })
    }
}

fn date_span(slots: &[ShiftSlot]) -> Option<(NaiveDate, NaiveDate)> {
    let first = slots.iter().map(|s| s.start.date_naive()).min()?;
    let last = slots.iter().map(|s| s.start.date_naive()).max()?;
    Some((first, last))
}
