//! Persistence for cycles and dose status overrides.
//!
//! [`ScheduleStore`] is the boundary the engine talks to. [`JsonStore`] keeps
//! everything under one data directory:
//! - `cycles.json`: every cycle, replaced atomically on save
//! - `doses.wal`: dose records as JSON lines, append-only
//! - `store.lock`: sidecar lock serializing every read and write of the two
//!
//! Dose records are never rewritten in place. The latest line for an id wins,
//! which makes repeated log/skip/delete calls idempotent overwrites.
//!
//! The data files themselves are replaced by rename, so locks are never taken
//! on them: a process blocked on the old inode would write into an unlinked
//! file. The sidecar lock file is never replaced.

use crate::reconcile::latest_records;
use crate::{Cycle, DoseId, DoseRecord, DoseStatus, Error, RecordStatus, Result};
use chrono::{NaiveDate, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

const CYCLES_FILE: &str = "cycles.json";
const DOSES_FILE: &str = "doses.wal";
const LOCK_FILE: &str = "store.lock";

/// Persistence collaborator for the schedule engine
pub trait ScheduleStore {
    fn load_cycles(&self) -> Result<Vec<Cycle>>;

    fn save_cycles(&mut self, cycles: &[Cycle]) -> Result<()>;

    /// Load, mutate and save the cycle list as one step.
    ///
    /// No other writer can interleave between the load and the save. An error
    /// from `f` leaves the stored cycles untouched.
    fn update_cycles<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Cycle>) -> Result<T>;

    /// Latest record per id for doses dated within `[start, end]`
    fn load_dose_records(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DoseRecord>>;

    fn update_dose_status(&mut self, id: &DoseId, status: DoseStatus) -> Result<DoseRecord>;

    /// Tombstone a dose so it never shows again
    fn delete_dose_record(&mut self, id: &DoseId) -> Result<DoseRecord>;

    /// Remove every cycle together with all dose records
    fn delete_all_cycles(&mut self) -> Result<()>;
}

/// Shared or exclusive hold on the store's lock file, released on drop
struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release store lock: {}", e);
        }
    }
}

/// File-backed store rooted at a data directory
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cycles_path(&self) -> PathBuf {
        self.dir.join(CYCLES_FILE)
    }

    pub fn doses_path(&self) -> PathBuf {
        self.dir.join(DOSES_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn lock(&self, exclusive: bool) -> Result<StoreLock> {
        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        if exclusive {
            file.lock_exclusive()?;
        } else {
            file.lock_shared()?;
        }
        Ok(StoreLock { file })
    }

    fn lock_exclusive(&self) -> Result<StoreLock> {
        self.lock(true)
    }

    /// Shared lock for readers, or `None` when nothing has been written yet
    fn lock_shared(&self) -> Result<Option<StoreLock>> {
        if !self.dir.exists() {
            return Ok(None);
        }
        self.lock(false).map(Some)
    }

    fn append_record(&self, record: &DoseRecord) -> Result<()> {
        let _lock = self.lock_exclusive()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.doses_path())?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::debug!("Recorded dose {} as {:?}", record.id, record.status);
        Ok(())
    }

    fn write_record(&mut self, id: &DoseId, status: RecordStatus) -> Result<DoseRecord> {
        let record = DoseRecord::new(id.clone(), status, Utc::now())?;
        self.append_record(&record)?;
        Ok(record)
    }

    /// Every record line in append order. Unparseable lines are skipped.
    pub fn read_all_records(&self) -> Result<Vec<DoseRecord>> {
        let Some(_lock) = self.lock_shared()? else {
            return Ok(Vec::new());
        };
        self.read_records_unlocked()
    }

    /// Rewrite the dose log with one line per id.
    ///
    /// Returns (lines before, lines after). Appends from other processes wait
    /// on the store lock and land in the rewritten log.
    pub fn compact(&mut self) -> Result<(usize, usize)> {
        let path = self.doses_path();
        if !path.exists() {
            return Ok((0, 0));
        }

        let _lock = self.lock_exclusive()?;

        let records = self.read_records_unlocked()?;
        let before = records.len();
        let mut latest: Vec<&DoseRecord> = latest_records(&records).into_values().collect();
        latest.sort_by(|a, b| (a.date, a.time, &a.id).cmp(&(b.date, b.time, &b.id)));

        let temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            for record in &latest {
                let line = serde_json::to_string(record)?;
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Compacted dose log: {} -> {} records", before, latest.len());
        Ok((before, latest.len()))
    }

    fn read_records_unlocked(&self) -> Result<Vec<DoseRecord>> {
        let path = self.doses_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<DoseRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping dose record at line {}: {}", line_num + 1, e);
                }
            }
        }

        tracing::debug!("Read {} dose records", records.len());
        Ok(records)
    }

    fn read_cycles_unlocked(&self) -> Result<Vec<Cycle>> {
        let path = self.cycles_path();
        if !path.exists() {
            tracing::info!("No cycles file at {:?}, starting empty", path);
            return Ok(Vec::new());
        }

        let mut contents = String::new();
        BufReader::new(File::open(&path)?).read_to_string(&mut contents)?;

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        // A corrupt cycle file is surfaced rather than replaced with an empty
        // list, so the next save cannot wipe the user's cycles.
        let cycles: Vec<Cycle> = serde_json::from_str(&contents)
            .map_err(|e| Error::Store(format!("cycles file {:?} is unreadable: {}", path, e)))?;

        tracing::debug!("Loaded {} cycles from {:?}", cycles.len(), path);
        Ok(cycles)
    }

    fn write_cycles_unlocked(&self, cycles: &[Cycle]) -> Result<()> {
        // Temp file in the same directory so the rename is atomic
        let temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(cycles)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(self.cycles_path())
            .map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} cycles", cycles.len());
        Ok(())
    }
}

impl ScheduleStore for JsonStore {
    fn load_cycles(&self) -> Result<Vec<Cycle>> {
        let Some(_lock) = self.lock_shared()? else {
            return Ok(Vec::new());
        };
        self.read_cycles_unlocked()
    }

    fn save_cycles(&mut self, cycles: &[Cycle]) -> Result<()> {
        let _lock = self.lock_exclusive()?;
        self.write_cycles_unlocked(cycles)
    }

    fn update_cycles<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Cycle>) -> Result<T>,
    {
        let _lock = self.lock_exclusive()?;
        let mut cycles = self.read_cycles_unlocked()?;
        let value = f(&mut cycles)?;
        self.write_cycles_unlocked(&cycles)?;
        Ok(value)
    }

    fn load_dose_records(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DoseRecord>> {
        let all = self.read_all_records()?;
        let mut records: Vec<DoseRecord> = latest_records(&all)
            .into_values()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect();
        records.sort_by(|a, b| (a.date, a.time, &a.id).cmp(&(b.date, b.time, &b.id)));
        Ok(records)
    }

    fn update_dose_status(&mut self, id: &DoseId, status: DoseStatus) -> Result<DoseRecord> {
        self.write_record(id, status.into())
    }

    fn delete_dose_record(&mut self, id: &DoseId) -> Result<DoseRecord> {
        self.write_record(id, RecordStatus::Deleted)
    }

    fn delete_all_cycles(&mut self) -> Result<()> {
        let _lock = self.lock_exclusive()?;
        self.write_cycles_unlocked(&[])?;

        let path = self.doses_path();
        if path.exists() {
            OpenOptions::new().write(true).open(&path)?.set_len(0)?;
        }

        tracing::info!("Deleted all cycles and dose records in {:?}", self.dir);
        Ok(())
    }
}
