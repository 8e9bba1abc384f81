use std::path::Path;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use crate::LicenseStatus;

#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("license for '{email}' cannot transition {from} -> {to}")]
    Transition { email: String, from: LicenseStatus, to: LicenseStatus },
    #[error("stored license row is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

/// A persisted license row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRecord {
    pub user_email: String,
    pub status: LicenseStatus,
    pub plan: Option<String>,
    pub updated_at: String,
}

/// SQLite-backed store for the `licenses` table.
pub struct LicenseStore {
    db: Mutex<Connection>,
}

impl LicenseStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS licenses (
            user_email TEXT PRIMARY KEY,
            status     TEXT NOT NULL DEFAULT 'none'
                       CHECK (status IN ('active','expired','none')),
            plan       TEXT,
            updated_at TEXT NOT NULL
        );
    ";

    /// Open or create the license database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LicenseError> {
        Self::initialize(Connection::open(path)?)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, LicenseError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(db: Connection) -> Result<Self, LicenseError> {
        db.execute_batch(Self::SCHEMA)?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Current status for a user; `none` when no row exists.
    pub fn status(&self, email: &str) -> Result<LicenseStatus, LicenseError> {
        Ok(self.get(email)?.map(|record| record.status).unwrap_or(LicenseStatus::None))
    }

    /// Fetch the full row for a user, if any.
    pub fn get(&self, email: &str) -> Result<Option<LicenseRecord>, LicenseError> {
        let db = self.db.lock().expect("license store mutex poisoned");
        let row = db
            .query_row(
                "SELECT user_email, status, plan, updated_at FROM licenses WHERE user_email = ?1",
                params![email],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(user_email, status, plan, updated_at)| {
            let status = status.parse().map_err(LicenseError::Corrupt)?;
            Ok(LicenseRecord { user_email, status, plan, updated_at })
        })
        .transpose()
    }

    /// Record a billing event: upsert the row and stamp `updated_at`.
    /// The transition table is enforced here; a forbidden transition leaves
    /// the row untouched.
    pub fn record(
        &self,
        email: &str,
        status: LicenseStatus,
        plan: Option<&str>,
    ) -> Result<LicenseRecord, LicenseError> {
        let current = self.status(email)?;
        if !current.can_transition_to(status) {
            return Err(LicenseError::Transition {
                email: email.to_owned(),
                from: current,
                to: status,
            });
        }
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        {
            let db = self.db.lock().expect("license store mutex poisoned");
            db.execute(
                "INSERT INTO licenses (user_email, status, plan, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_email) DO UPDATE SET
                     status = excluded.status,
                     plan = COALESCE(excluded.plan, licenses.plan),
                     updated_at = excluded.updated_at",
                params![email, status.as_str(), plan, updated_at],
            )?;
        }
        Ok(self.get(email)?.expect("row exists after upsert"))
    }

    /// All rows, for admin listings.
    pub fn list(&self) -> Result<Vec<LicenseRecord>, LicenseError> {
        let db = self.db.lock().expect("license store mutex poisoned");
        let mut statement = db.prepare(
            "SELECT user_email, status, plan, updated_at FROM licenses ORDER BY user_email",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (user_email, status, plan, updated_at) = row?;
            let status = status.parse().map_err(LicenseError::Corrupt)?;
            records.push(LicenseRecord { user_email, status, plan, updated_at });
        }
        Ok(records)
    }
}
