//! Ledger Mirror
//!
//! Flat CSV duplicate of the record store, kept for auditors who want a
//! file they can open in a spreadsheet. The store is authoritative; the
//! mirror is derived and never read back by business logic. All writes go
//! through one mutex because the file format is not safe for concurrent
//! writers, and rewrites land via a temp file + rename so a crash never
//! leaves a half-written mirror.
//!
//! The header must stay aligned with the write code below; there is no
//! schema beyond this constant.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::path::PathBuf;

use crate::store::Registrant;

const HEADER: [&str; 11] = [
    "Name",
    "Email",
    "Semester",
    "Mobile No",
    "Party Size",
    "Total Amount",
    "Unique ID",
    "UPI Ref",
    "Payment ID",
    "Payment Status",
    "Attendance",
];

const COL_UID: usize = 6;
const COL_STATUS: usize = 9;
const COL_ATTENDANCE: usize = 10;

pub struct LedgerMirror {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LedgerMirror {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating ledger directory for {path:?}"))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Append one registrant row, writing the header first on a fresh file.
    pub fn append(&self, reg: &Registrant) -> Result<()> {
        let _guard = self.lock.lock();
        let exists = self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if !exists {
            writer.write_record(HEADER)?;
        }
        writer.write_record(&[
            reg.name.as_str(),
            reg.email.as_str(),
            &reg.semester.to_string(),
            reg.phone.as_str(),
            &reg.party_size.to_string(),
            &reg.amount().to_string(),
            reg.uid.as_str(),
            reg.upi_ref.as_deref().unwrap_or(""),
            reg.payment_id.as_deref().unwrap_or(""),
            reg.payment_status.as_str(),
            if reg.attended { "Present" } else { "Absent" },
        ])?;
        writer.flush()?;
        Ok(())
    }

    /// Mirror a successful attendance transition.
    pub fn mark_present(&self, uid: &str) -> Result<()> {
        self.update_row(uid, |row| row[COL_ATTENDANCE] = "Present".to_string())
    }

    /// Mirror a payment-status change (e.g. a refund).
    pub fn update_status(&self, uid: &str, status: &str) -> Result<()> {
        let status = status.to_string();
        self.update_row(uid, move |row| row[COL_STATUS] = status.clone())
    }

    fn update_row(&self, uid: &str, apply: impl Fn(&mut Vec<String>)) -> Result<()> {
        let _guard = self.lock.lock();
        if !self.path.exists() {
            // Nothing mirrored yet; the store stays authoritative
            return Ok(());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;
        let header = reader.headers()?.clone();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.get(COL_UID).map(String::as_str) == Some(uid) {
                apply(&mut row);
            }
            rows.push(row);
        }

        let dir = self
            .path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            writer.write_record(&header)?;
            for row in &rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        tmp.persist(&self.path)
            .with_context(|| format!("replacing ledger at {:?}", self.path))?;
        Ok(())
    }
}
