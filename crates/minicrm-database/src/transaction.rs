//! Explicit transaction guard over a pooled connection.

use crate::error::{DatabaseError, Result};
use crate::pool::PooledConnection;
use rusqlite::Connection;
use std::ops::Deref;
use tracing::{debug, warn};

/// An open `BEGIN` on a checked-out connection.
///
/// Call [`commit`](Self::commit) to keep the work. Dropping the guard, or
/// calling [`rollback`](Self::rollback), undoes it. The connection goes back
/// to the pool either way.
pub struct DatabaseTransaction<'a> {
    conn: PooledConnection<'a>,
    finished: bool,
}

impl<'a> DatabaseTransaction<'a> {
    pub(crate) fn begin(conn: PooledConnection<'a>) -> Result<Self> {
        conn.execute_batch("BEGIN")?;
        debug!("transaction started");
        Ok(Self {
            conn,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            // a failed COMMIT can leave the transaction open
            self.discard_open_transaction();
            return Err(e.into());
        }
        debug!("transaction committed");
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            self.conn.mark_broken();
            return Err(e.into());
        }
        debug!("transaction rolled back");
        Ok(())
    }

    /// Roll back because `cause` happened, and return the error to surface.
    pub(crate) fn abort(mut self, cause: DatabaseError) -> DatabaseError {
        self.finished = true;
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => {
                debug!(error = %cause, "transaction rolled back");
                cause
            }
            Err(source) => {
                self.conn.mark_broken();
                DatabaseError::Rollback {
                    cause: Box::new(cause),
                    source,
                }
            }
        }
    }

    fn discard_open_transaction(&mut self) {
        if !self.conn.is_autocommit() && self.conn.execute_batch("ROLLBACK").is_err() {
            self.conn.mark_broken();
        }
    }
}

impl Deref for DatabaseTransaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for DatabaseTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "rollback on drop failed; discarding connection");
            self.conn.mark_broken();
        }
    }
}
