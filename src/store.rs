//! Registrant Record Store
//!
//! The authoritative store: one SQLite table, one row per registrant.
//! Uniqueness of identifier, email and phone is enforced by the schema.
//! The monotonic flags (attended, refunded) only ever flip through
//! conditional UPDATEs, so a lost race shows up as zero affected rows
//! instead of a double transition.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS registrants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT NOT NULL UNIQUE,
    semester INTEGER NOT NULL,
    party_size INTEGER NOT NULL DEFAULT 0,
    amount_minor INTEGER NOT NULL,
    attended INTEGER NOT NULL DEFAULT 0,
    upi_ref TEXT,
    payment_id TEXT,
    order_id TEXT,
    payment_status TEXT NOT NULL DEFAULT 'pending',
    refund_id TEXT,
    refunded INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_registrants_semester ON registrants(semester);
"#;

const COLUMNS: &str = "uid, name, email, phone, semester, party_size, amount_minor, \
                       attended, upi_ref, payment_id, order_id, payment_status, \
                       refund_id, refunded, created_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email or phone number already registered")]
    DuplicateContact,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Payment lifecycle of a registrant. Transitions are one-directional:
/// pending -> paid -> refunded, with failed as a terminal side branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "refunded" => Some(Self::Refunded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One registered attendee (plus optional dependents).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registrant {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub semester: u8,
    pub party_size: u8,
    /// Total fee in minor units (paise)
    pub amount_minor: u64,
    pub attended: bool,
    pub upi_ref: Option<String>,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub refund_id: Option<String>,
    pub refunded: bool,
    pub created_at: i64,
}

impl Registrant {
    /// Total fee in whole rupees.
    pub fn amount(&self) -> u64 {
        self.amount_minor / 100
    }
}

/// Fields needed to persist a new registrant.
#[derive(Debug, Clone)]
pub struct NewRegistrant {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub semester: u8,
    pub party_size: u8,
    pub amount_minor: u64,
    pub upi_ref: Option<String>,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub payment_status: PaymentStatus,
}

/// Result of an attendance verification scan.
#[derive(Debug, Clone)]
pub enum AttendanceOutcome {
    /// First scan: the flag transitioned
    Marked(Registrant),
    /// Repeat scan: no mutation
    AlreadyAttended(Registrant),
    /// Identifier was never issued
    Unknown,
}

/// Aggregate counts and monetary totals for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardTotals {
    pub total_registrants: u64,
    pub paid_not_refunded: u64,
    pub refunded_count: u64,
    /// Rupees collected from paid, unrefunded registrations
    pub total_amount_collected: u64,
    /// Rupees returned through refunds
    pub total_amount_refunded: u64,
    /// Registrations per semester, keyed "Sem1".."Sem6"
    pub sem_counts: BTreeMap<String, u64>,
}

/// Present/absent split for one semester.
#[derive(Debug, Clone, Serialize)]
pub struct SemesterAttendance {
    pub semester: u8,
    pub present: u64,
    pub absent: u64,
}

/// Registrants and dependents per semester, for the chart endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SemesterBreakdown {
    pub semester: u8,
    pub registrants: u64,
    pub dependents: u64,
}

/// SQLite-backed registrant store. Cloning shares the underlying
/// connection; the mutex serializes every read-check-write sequence.
#[derive(Clone)]
pub struct RegistrantStore {
    conn: Arc<Mutex<Connection>>,
}

impl RegistrantStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!("record store opened at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Persist a new registrant. Duplicate email/phone/uid surfaces as
    /// `StoreError::DuplicateContact`.
    pub fn insert(&self, new: &NewRegistrant) -> Result<Registrant, StoreError> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO registrants (uid, name, email, phone, semester, party_size, \
             amount_minor, upi_ref, payment_id, order_id, payment_status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                new.uid,
                new.name,
                new.email,
                new.phone,
                new.semester,
                new.party_size,
                new.amount_minor as i64,
                new.upi_ref,
                new.payment_id,
                new.order_id,
                new.payment_status.as_str(),
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateContact);
            }
            Err(e) => return Err(e.into()),
        }
        get_by_uid(&conn, &new.uid)?.ok_or_else(|| StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Attendance transition, registered -> attended, at most once.
    ///
    /// A single conditional UPDATE is the compare-and-set: concurrent scans
    /// of the same identifier race on `attended = 0` and exactly one wins.
    pub fn mark_attended(&self, uid: &str) -> Result<AttendanceOutcome, StoreError> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE registrants SET attended = 1 WHERE uid = ?1 AND attended = 0",
            params![uid],
        )?;
        if rows == 1 {
            let reg = get_by_uid(&conn, uid)?
                .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
            return Ok(AttendanceOutcome::Marked(reg));
        }
        match get_by_uid(&conn, uid)? {
            Some(reg) => Ok(AttendanceOutcome::AlreadyAttended(reg)),
            None => Ok(AttendanceOutcome::Unknown),
        }
    }

    /// Refund transition, paid -> refunded, at most once. Returns whether
    /// this call performed the transition.
    pub fn mark_refunded(&self, uid: &str, refund_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE registrants SET refunded = 1, payment_status = 'refunded', refund_id = ?2 \
             WHERE uid = ?1 AND refunded = 0 AND payment_status = 'paid'",
            params![uid, refund_id],
        )?;
        Ok(rows == 1)
    }

    /// Explicit admin removal. Returns whether a row was deleted.
    pub fn delete(&self, uid: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM registrants WHERE uid = ?1", params![uid])?;
        Ok(rows == 1)
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn get(&self, uid: &str) -> Result<Option<Registrant>, StoreError> {
        let conn = self.conn.lock();
        get_by_uid(&conn, uid)
    }

    /// Pre-check used by the registration workflow to reject duplicates
    /// before any gateway order is created.
    pub fn contact_in_use(&self, email: &str, phone: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM registrants WHERE email = ?1 OR phone = ?2",
            params![email, phone],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All registrants, newest first.
    pub fn list_all(&self) -> Result<Vec<Registrant>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM registrants ORDER BY id DESC"
        ))?;
        let rows = stmt
            .query_map([], row_to_registrant)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_by_semester(&self, semester: u8) -> Result<Vec<Registrant>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM registrants WHERE semester = ?1 ORDER BY id DESC"
        ))?;
        let rows = stmt
            .query_map(params![semester], row_to_registrant)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ========================================================================
    // AGGREGATES
    // ========================================================================

    pub fn dashboard_totals(&self) -> Result<DashboardTotals, StoreError> {
        let conn = self.conn.lock();
        let total_registrants: i64 =
            conn.query_row("SELECT COUNT(*) FROM registrants", [], |r| r.get(0))?;
        let paid_not_refunded: i64 = conn.query_row(
            "SELECT COUNT(*) FROM registrants WHERE payment_status = 'paid' AND refunded = 0",
            [],
            |r| r.get(0),
        )?;
        let refunded_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM registrants WHERE refunded = 1",
            [],
            |r| r.get(0),
        )?;
        let collected_minor: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount_minor), 0) FROM registrants \
             WHERE payment_status = 'paid' AND refunded = 0",
            [],
            |r| r.get(0),
        )?;
        let refunded_minor: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount_minor), 0) FROM registrants WHERE refunded = 1",
            [],
            |r| r.get(0),
        )?;

        let mut sem_counts = BTreeMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT semester, COUNT(*) FROM registrants GROUP BY semester",
            )?;
            let counted: Vec<(i64, i64)> = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            for sem in 1..=crate::fees::MAX_SEMESTER {
                let count = counted
                    .iter()
                    .find(|(s, _)| *s == i64::from(sem))
                    .map(|(_, c)| *c)
                    .unwrap_or(0);
                sem_counts.insert(format!("Sem{sem}"), count as u64);
            }
        }

        Ok(DashboardTotals {
            total_registrants: total_registrants as u64,
            paid_not_refunded: paid_not_refunded as u64,
            refunded_count: refunded_count as u64,
            total_amount_collected: (collected_minor as u64) / 100,
            total_amount_refunded: (refunded_minor as u64) / 100,
            sem_counts,
        })
    }

    /// Present/absent split per semester (1..=MAX_SEMESTER, zero-filled).
    pub fn attendance_by_semester(&self) -> Result<Vec<SemesterAttendance>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT semester, \
                    SUM(CASE WHEN attended = 1 THEN 1 ELSE 0 END), \
                    SUM(CASE WHEN attended = 0 THEN 1 ELSE 0 END) \
             FROM registrants GROUP BY semester",
        )?;
        let counted: Vec<(i64, i64, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(crate::fees::MAX_SEMESTER as usize);
        for sem in 1..=crate::fees::MAX_SEMESTER {
            let (present, absent) = counted
                .iter()
                .find(|(s, _, _)| *s == i64::from(sem))
                .map(|(_, p, a)| (*p as u64, *a as u64))
                .unwrap_or((0, 0));
            out.push(SemesterAttendance {
                semester: sem,
                present,
                absent,
            });
        }
        Ok(out)
    }

    /// Registrants and dependents per semester with at least one row.
    pub fn semester_breakdown(&self) -> Result<Vec<SemesterBreakdown>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT semester, COUNT(*), COALESCE(SUM(party_size), 0) \
             FROM registrants GROUP BY semester ORDER BY semester",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SemesterBreakdown {
                    semester: row.get::<_, i64>(0)? as u8,
                    registrants: row.get::<_, i64>(1)? as u64,
                    dependents: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn get_by_uid(conn: &Connection, uid: &str) -> Result<Option<Registrant>, StoreError> {
    let reg = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM registrants WHERE uid = ?1"),
            params![uid],
            row_to_registrant,
        )
        .optional()?;
    Ok(reg)
}

fn row_to_registrant(row: &Row) -> rusqlite::Result<Registrant> {
    let status: String = row.get(11)?;
    let payment_status = PaymentStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            11,
            rusqlite::types::Type::Text,
            format!("unknown payment status: {status}").into(),
        )
    })?;
    Ok(Registrant {
        uid: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        semester: row.get::<_, i64>(4)? as u8,
        party_size: row.get::<_, i64>(5)? as u8,
        amount_minor: row.get::<_, i64>(6)? as u64,
        attended: row.get::<_, i64>(7)? != 0,
        upi_ref: row.get(8)?,
        payment_id: row.get(9)?,
        order_id: row.get(10)?,
        payment_status,
        refund_id: row.get(12)?,
        refunded: row.get::<_, i64>(13)? != 0,
        created_at: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(uid: &str, email: &str, phone: &str) -> NewRegistrant {
        NewRegistrant {
            uid: uid.to_string(),
            name: "Asha".to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            semester: 3,
            party_size: 2,
            amount_minor: 30_000,
            upi_ref: None,
            payment_id: Some("pay_1".to_string()),
            order_id: Some("order_1".to_string()),
            payment_status: PaymentStatus::Paid,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = RegistrantStore::in_memory().unwrap();
        let reg = store
            .insert(&sample("FEST-1", "asha@example.com", "9000000001"))
            .unwrap();
        assert_eq!(reg.uid, "FEST-1");
        assert_eq!(reg.amount(), 300);
        assert!(!reg.attended);
        assert_eq!(reg.payment_status, PaymentStatus::Paid);

        let fetched = store.get("FEST-1").unwrap().unwrap();
        assert_eq!(fetched.email, "asha@example.com");
        assert!(store.get("FEST-404").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_contact_rejected() {
        let store = RegistrantStore::in_memory().unwrap();
        store
            .insert(&sample("FEST-1", "asha@example.com", "9000000001"))
            .unwrap();

        // Same email, different phone
        let err = store
            .insert(&sample("FEST-2", "asha@example.com", "9000000002"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateContact));

        // Same phone, different email
        let err = store
            .insert(&sample("FEST-3", "other@example.com", "9000000001"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateContact));

        assert!(store
            .contact_in_use("asha@example.com", "9999999999")
            .unwrap());
        assert!(!store
            .contact_in_use("other@example.com", "9999999999")
            .unwrap());
    }

    #[test]
    fn test_attendance_marked_once() {
        let store = RegistrantStore::in_memory().unwrap();
        store
            .insert(&sample("FEST-1", "asha@example.com", "9000000001"))
            .unwrap();

        match store.mark_attended("FEST-1").unwrap() {
            AttendanceOutcome::Marked(reg) => assert!(reg.attended),
            other => panic!("expected Marked, got {other:?}"),
        }
        match store.mark_attended("FEST-1").unwrap() {
            AttendanceOutcome::AlreadyAttended(reg) => assert!(reg.attended),
            other => panic!("expected AlreadyAttended, got {other:?}"),
        }
        assert!(matches!(
            store.mark_attended("FEST-404").unwrap(),
            AttendanceOutcome::Unknown
        ));
    }

    #[test]
    fn test_concurrent_attendance_single_winner() {
        let store = RegistrantStore::in_memory().unwrap();
        store
            .insert(&sample("FEST-1", "asha@example.com", "9000000001"))
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                matches!(
                    store.mark_attended("FEST-1").unwrap(),
                    AttendanceOutcome::Marked(_)
                )
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_refund_transition_once() {
        let store = RegistrantStore::in_memory().unwrap();
        store
            .insert(&sample("FEST-1", "asha@example.com", "9000000001"))
            .unwrap();

        assert!(store.mark_refunded("FEST-1", "rfnd_1").unwrap());
        let reg = store.get("FEST-1").unwrap().unwrap();
        assert!(reg.refunded);
        assert_eq!(reg.payment_status, PaymentStatus::Refunded);
        assert_eq!(reg.refund_id.as_deref(), Some("rfnd_1"));

        // Second transition is a no-op
        assert!(!store.mark_refunded("FEST-1", "rfnd_2").unwrap());
        let reg = store.get("FEST-1").unwrap().unwrap();
        assert_eq!(reg.refund_id.as_deref(), Some("rfnd_1"));
    }

    #[test]
    fn test_refund_requires_paid_status() {
        let store = RegistrantStore::in_memory().unwrap();
        let mut pending = sample("FEST-1", "asha@example.com", "9000000001");
        pending.payment_status = PaymentStatus::Pending;
        store.insert(&pending).unwrap();

        assert!(!store.mark_refunded("FEST-1", "rfnd_1").unwrap());
        let reg = store.get("FEST-1").unwrap().unwrap();
        assert!(!reg.refunded);
        assert_eq!(reg.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_delete() {
        let store = RegistrantStore::in_memory().unwrap();
        store
            .insert(&sample("FEST-1", "asha@example.com", "9000000001"))
            .unwrap();
        assert!(store.delete("FEST-1").unwrap());
        assert!(!store.delete("FEST-1").unwrap());
        assert!(store.get("FEST-1").unwrap().is_none());
    }

    #[test]
    fn test_dashboard_totals() {
        let store = RegistrantStore::in_memory().unwrap();
        store
            .insert(&sample("FEST-1", "a@example.com", "9000000001"))
            .unwrap();
        let mut second = sample("FEST-2", "b@example.com", "9000000002");
        second.semester = 1;
        second.party_size = 0;
        second.amount_minor = 10_000;
        store.insert(&second).unwrap();
        store.mark_refunded("FEST-2", "rfnd_1").unwrap();

        let totals = store.dashboard_totals().unwrap();
        assert_eq!(totals.total_registrants, 2);
        assert_eq!(totals.paid_not_refunded, 1);
        assert_eq!(totals.refunded_count, 1);
        assert_eq!(totals.total_amount_collected, 300);
        assert_eq!(totals.total_amount_refunded, 100);
        assert_eq!(totals.sem_counts["Sem1"], 1);
        assert_eq!(totals.sem_counts["Sem3"], 1);
        assert_eq!(totals.sem_counts["Sem6"], 0);
    }

    #[test]
    fn test_semester_aggregates() {
        let store = RegistrantStore::in_memory().unwrap();
        store
            .insert(&sample("FEST-1", "a@example.com", "9000000001"))
            .unwrap();
        let mut second = sample("FEST-2", "b@example.com", "9000000002");
        second.semester = 3;
        second.party_size = 1;
        store.insert(&second).unwrap();
        store.mark_attended("FEST-1").unwrap();

        let attendance = store.attendance_by_semester().unwrap();
        assert_eq!(attendance.len(), crate::fees::MAX_SEMESTER as usize);
        let sem3 = &attendance[2];
        assert_eq!(sem3.semester, 3);
        assert_eq!(sem3.present, 1);
        assert_eq!(sem3.absent, 1);

        let breakdown = store.semester_breakdown().unwrap();
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].registrants, 2);
        assert_eq!(breakdown[0].dependents, 3);
    }
}
