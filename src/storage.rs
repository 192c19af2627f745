use crate::model::ShiftSlot;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid shift data: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no transaction in progress")]
    NoTransaction,
    #[error("a transaction is already in progress")]
    TransactionActive,
    #[error("{0}")]
    Backend(String),
}

/// Fournisseur de persistance des shifts.
///
/// `delete_range` et `insert` n'ont d'effet visible qu'après `commit` ;
/// `rollback` abandonne tout ce qui a été fait depuis `begin`.
pub trait ShiftStore {
    /// Shifts committés dont le début tombe dans `[start, end)`.
    fn shifts_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ShiftSlot>, StorageError>;
    fn begin(&mut self) -> Result<(), StorageError>;
    /// Supprime les shifts dont le début tombe dans `[start, end)` ; renvoie le nombre supprimé.
    fn delete_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<usize, StorageError>;
    fn insert(&mut self, slots: &[ShiftSlot]) -> Result<(), StorageError>;
    fn commit(&mut self) -> Result<(), StorageError>;
    fn rollback(&mut self);
}

/// Copie de travail d'une transaction.
#[derive(Debug, Default)]
struct Staged {
    pending: Option<Vec<ShiftSlot>>,
}

impl Staged {
    fn begin(&mut self, committed: &[ShiftSlot]) -> Result<(), StorageError> {
        if self.pending.is_some() {
            return Err(StorageError::TransactionActive);
        }
        self.pending = Some(committed.to_vec());
        Ok(())
    }

    fn working(&mut self) -> Result<&mut Vec<ShiftSlot>, StorageError> {
        self.pending.as_mut().ok_or(StorageError::NoTransaction)
    }

    fn delete_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<usize, StorageError> {
        let working = self.working()?;
        let before = working.len();
        working.retain(|s| !in_range(s, start, end));
        Ok(before - working.len())
    }

    fn insert(&mut self, slots: &[ShiftSlot]) -> Result<(), StorageError> {
        self.working()?.extend_from_slice(slots);
        Ok(())
    }

    fn take(&mut self) -> Result<Vec<ShiftSlot>, StorageError> {
        self.pending.take().ok_or(StorageError::NoTransaction)
    }
}

/// Stockage en mémoire (tests, intégrations embarquées).
#[derive(Debug, Default)]
pub struct MemoryShiftStore {
    committed: Vec<ShiftSlot>,
    staged: Staged,
}

impl MemoryShiftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shifts(shifts: Vec<ShiftSlot>) -> Self {
        Self {
            committed: shifts,
            staged: Staged::default(),
        }
    }

    pub fn all(&self) -> &[ShiftSlot] {
        &self.committed
    }

    pub fn in_transaction(&self) -> bool {
        self.staged.pending.is_some()
    }
}

impl ShiftStore for MemoryShiftStore {
    fn shifts_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ShiftSlot>, StorageError> {
        Ok(select_range(&self.committed, start, end))
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        self.staged.begin(&self.committed)
    }

    fn delete_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<usize, StorageError> {
        self.staged.delete_range(start, end)
    }

    fn insert(&mut self, slots: &[ShiftSlot]) -> Result<(), StorageError> {
        self.staged.insert(slots)
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.committed = self.staged.take()?;
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.pending = None;
    }
}

/// Stockage fichier JSON ; le commit est une écriture atomique (fichier
/// temporaire + rename).
pub struct JsonShiftStore {
    path: PathBuf,
    staged: Staged,
}

impl JsonShiftStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            staged: Staged::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Charge tous les shifts ; un fichier absent vaut un stockage vide.
    pub fn load(&self) -> Result<Vec<ShiftSlot>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read(&self.path).map_err(|source| self.io_error(source))?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn save(&self, shifts: &[ShiftSlot]) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(shifts)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| self.io_error(source))?;
        tmp.write_all(&json).map_err(|source| self.io_error(source))?;
        tmp.flush().map_err(|source| self.io_error(source))?;
        tmp.as_file()
            .sync_all()
            .map_err(|source| self.io_error(source))?;
        tmp.persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl ShiftStore for JsonShiftStore {
    fn shifts_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ShiftSlot>, StorageError> {
        Ok(select_range(&self.load()?, start, end))
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        let committed = self.load()?;
        self.staged.begin(&committed)
    }

    fn delete_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<usize, StorageError> {
        self.staged.delete_range(start, end)
    }

    fn insert(&mut self, slots: &[ShiftSlot]) -> Result<(), StorageError> {
        self.staged.insert(slots)
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let mut shifts = self.staged.take()?;
        shifts.sort_by_key(|s| s.start);
        self.save(&shifts)
    }

    fn rollback(&mut self) {
        self.staged.pending = None;
    }
}

fn in_range(slot: &ShiftSlot, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    slot.start >= start && slot.start < end
}

fn select_range(shifts: &[ShiftSlot], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<ShiftSlot> {
    let mut out: Vec<ShiftSlot> = shifts
        .iter()
        .filter(|s| in_range(s, start, end))
        .cloned()
        .collect();
    out.sort_by_key(|s| s.start);
    out
}
