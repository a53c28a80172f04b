//! Bounded, blocking connection pool.
//!
//! The pool never has more than `max_connections` live connections. Idle
//! connections sit in a channel that doubles as the blocking hand-off for
//! callers waiting on a full pool; a mutex guards the counters.

use crate::error::{DatabaseError, Result};
use crate::sqlite_config::SqliteConfig;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Opens, probes and closes the connections a pool hands out.
pub trait ConnectionManager: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Open a new connection.
    fn connect(&self) -> Result<Self::Connection>;

    /// Cheap liveness probe run whenever a connection is returned.
    fn is_valid(&self, conn: &mut Self::Connection) -> bool;

    /// Release the underlying resources of a connection leaving the pool.
    fn close(&self, conn: Self::Connection);
}

/// Opens SQLite files and applies [`SqliteConfig`] to every new connection.
#[derive(Debug, Clone)]
pub struct SqliteConnectionManager {
    path: PathBuf,
    flags: OpenFlags,
    sqlite: SqliteConfig,
}

impl SqliteConnectionManager {
    pub fn new(path: impl Into<PathBuf>, sqlite: SqliteConfig) -> Self {
        Self {
            path: path.into(),
            flags: OpenFlags::default(),
            sqlite,
        }
    }

    /// Same manager without `SQLITE_OPEN_CREATE`.
    pub fn existing_only(mut self) -> Self {
        self.flags.remove(OpenFlags::SQLITE_OPEN_CREATE);
        self
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ConnectionManager for SqliteConnectionManager {
    type Connection = Connection;

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            DatabaseError::Connect {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        self.sqlite.apply(&conn)?;
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> bool {
        // a transaction left open by the previous holder must not leak into the next one
        if !conn.is_autocommit() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "failed to roll back abandoned transaction");
                return false;
            }
            debug!("rolled back transaction left open on returned connection");
        }
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok()
    }

    fn close(&self, conn: Connection) {
        if let Err((_, e)) = conn.close() {
            warn!(error = %e, "failed to close connection cleanly");
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Path to SQLite database file
    pub database_path: PathBuf,
    /// Maximum number of live connections
    pub max_connections: u32,
    /// How long a checkout waits for a connection before failing
    pub acquire_timeout: Duration,
    /// Pragmas applied to every new connection
    pub sqlite: SqliteConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("minicrm.db"),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            sqlite: SqliteConfig::default(),
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(DatabaseError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        if self.acquire_timeout.is_zero() {
            return Err(DatabaseError::Config(
                "acquire_timeout must be greater than zero".to_string(),
            ));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(DatabaseError::Config(
                "database_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = path.into();
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    pub fn sqlite(mut self, sqlite: SqliteConfig) -> Self {
        self.config.sqlite = sqlite;
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

struct IdleConnection<C> {
    conn: C,
    generation: u64,
}

#[derive(Debug, Default)]
struct PoolState {
    /// Live connections created by this pool, idle or checked out.
    open: u32,
    /// Connections currently held by callers.
    in_use: u32,
    /// Bumped by `close_all`; connections from an older generation are
    /// closed instead of being re-queued.
    generation: u64,
    /// Set by `close`; checkouts fail from then on.
    closed: bool,
}

pub struct ConnectionPool<M: ConnectionManager = SqliteConnectionManager> {
    manager: M,
    max_connections: u32,
    acquire_timeout: Duration,
    idle_tx: Sender<IdleConnection<M::Connection>>,
    idle_rx: Receiver<IdleConnection<M::Connection>>,
    /// Wakes a waiter when a slot frees up. Holds at most one token.
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    state: Mutex<PoolState>,
}

impl ConnectionPool<SqliteConnectionManager> {
    /// Build a SQLite pool and verify the database can be opened.
    pub fn open(config: &PoolConfig) -> Result<Self> {
        config.validate()?;

        let manager = SqliteConnectionManager::new(&config.database_path, config.sqlite.clone());
        let pool = Self::with_manager(manager, config.max_connections, config.acquire_timeout)?;
        pool.health_check()?;

        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            "database pool created"
        );
        Ok(pool)
    }
}

impl<M: ConnectionManager> ConnectionPool<M> {
    pub fn with_manager(manager: M, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        if max_connections == 0 {
            return Err(DatabaseError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let (idle_tx, idle_rx) = crossbeam_channel::unbounded();
        let (slot_tx, slot_rx) = crossbeam_channel::bounded(1);

        Ok(Self {
            manager,
            max_connections,
            acquire_timeout,
            idle_tx,
            idle_rx,
            slot_tx,
            slot_rx,
            state: Mutex::new(PoolState::default()),
        })
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    /// Check out a connection.
    ///
    /// Reuses an idle connection when one is queued, opens a new one while
    /// below `max_connections`, and otherwise blocks until another caller
    /// returns one or the acquire timeout elapses.
    pub fn get_connection(&self) -> Result<PooledConnection<'_, M>> {
        let deadline = Instant::now() + self.acquire_timeout;

        loop {
            if self.state.lock().closed {
                return Err(DatabaseError::PoolClosed);
            }

            if let Ok(idle) = self.idle_rx.try_recv() {
                match self.claim(idle) {
                    Some(conn) => return Ok(conn),
                    None => continue,
                }
            }

            if let Some(generation) = self.reserve_slot() {
                return match self.manager.connect() {
                    Ok(conn) => {
                        debug!(generation, "opened new pooled connection");
                        Ok(PooledConnection::new(self, conn, generation))
                    }
                    Err(e) => {
                        self.release_slot(generation);
                        Err(e)
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DatabaseError::PoolExhausted(self.acquire_timeout));
            }

            crossbeam_channel::select! {
                recv(self.idle_rx) -> idle => {
                    if let Ok(idle) = idle {
                        if let Some(conn) = self.claim(idle) {
                            return Ok(conn);
                        }
                    }
                }
                recv(self.slot_rx) -> _ => {}
                default(deadline - now) => {
                    return Err(DatabaseError::PoolExhausted(self.acquire_timeout));
                }
            }
        }
    }

    /// Hand a connection back. Equivalent to dropping the guard.
    pub fn return_connection(&self, conn: PooledConnection<'_, M>) {
        drop(conn);
    }

    /// Close every idle connection and reset the pool's counters.
    ///
    /// Connections still checked out are closed when they come back.
    pub fn close_all(&self) {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.open = 0;
            state.in_use = 0;
            self.idle_rx.try_iter().collect()
        };

        let count = drained.len();
        for idle in drained {
            self.manager.close(idle.conn);
        }
        info!(closed = count, "closed all idle pooled connections");
    }

    /// Close every connection and refuse further checkouts.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.close_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Check out a connection and probe it.
    pub fn health_check(&self) -> Result<()> {
        let mut conn = self.get_connection()?;
        if self.manager.is_valid(&mut conn) {
            Ok(())
        } else {
            conn.mark_broken();
            Err(DatabaseError::HealthCheck(
                "connection failed liveness probe".to_string(),
            ))
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            open: state.open,
            in_use: state.in_use,
            idle: self.idle_rx.len(),
            max_connections: self.max_connections,
        }
    }

    fn reserve_slot(&self) -> Option<u64> {
        let mut state = self.state.lock();
        if state.open < self.max_connections {
            state.open += 1;
            state.in_use += 1;
            if state.open < self.max_connections {
                // pass the wake-up on to the next waiter
                self.notify_slot();
            }
            Some(state.generation)
        } else {
            None
        }
    }

    fn release_slot(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.generation == generation {
                state.open = state.open.saturating_sub(1);
                state.in_use = state.in_use.saturating_sub(1);
            }
        }
        self.notify_slot();
    }

    fn notify_slot(&self) {
        let _ = self.slot_tx.try_send(());
    }

    fn claim(&self, idle: IdleConnection<M::Connection>) -> Option<PooledConnection<'_, M>> {
        {
            let mut state = self.state.lock();
            if state.generation == idle.generation {
                state.in_use += 1;
                return Some(PooledConnection::new(self, idle.conn, idle.generation));
            }
        }
        self.manager.close(idle.conn);
        None
    }

    fn put_back(&self, mut conn: M::Connection, generation: u64, broken: bool) {
        let healthy = !broken && self.manager.is_valid(&mut conn);

        let mut state = self.state.lock();
        if state.generation != generation {
            drop(state);
            self.manager.close(conn);
            return;
        }

        state.in_use = state.in_use.saturating_sub(1);
        if healthy {
            let _ = self.idle_tx.send(IdleConnection { conn, generation });
            return;
        }

        state.open = state.open.saturating_sub(1);
        drop(state);

        warn!("discarding broken pooled connection");
        self.manager.close(conn);
        self.notify_slot();
    }
}

impl<M: ConnectionManager> Drop for ConnectionPool<M> {
    fn drop(&mut self) {
        for idle in self.idle_rx.try_iter() {
            self.manager.close(idle.conn);
        }
    }
}

/// A checked-out connection; goes back to the pool when dropped.
pub struct PooledConnection<'a, M: ConnectionManager = SqliteConnectionManager> {
    pool: &'a ConnectionPool<M>,
    conn: Option<M::Connection>,
    generation: u64,
    broken: bool,
}

impl<'a, M: ConnectionManager> PooledConnection<'a, M> {
    fn new(pool: &'a ConnectionPool<M>, conn: M::Connection, generation: u64) -> Self {
        Self {
            pool,
            conn: Some(conn),
            generation,
            broken: false,
        }
    }

    /// Close this connection on release instead of returning it.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl<M: ConnectionManager> Deref for PooledConnection<'_, M> {
    type Target = M::Connection;

    fn deref(&self) -> &M::Connection {
        // only taken in drop
        self.conn.as_ref().expect("connection already released")
    }
}

impl<M: ConnectionManager> DerefMut for PooledConnection<'_, M> {
    fn deref_mut(&mut self) -> &mut M::Connection {
        self.conn.as_mut().expect("connection already released")
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<'_, M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn, self.generation, self.broken);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub open: u32,
    pub in_use: u32,
    pub idle: usize,
    pub max_connections: u32,
}

impl PoolStats {
    pub fn utilization(&self) -> f64 {
        if self.max_connections == 0 {
            return 0.0;
        }
        self.in_use as f64 / self.max_connections as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FakeConn {
        healthy: bool,
    }

    #[derive(Default)]
    struct FakeManager {
        created: AtomicU32,
        closed: AtomicU32,
    }

    impl ConnectionManager for Arc<FakeManager> {
        type Connection = FakeConn;

        fn connect(&self) -> Result<FakeConn> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConn { healthy: true })
        }

        fn is_valid(&self, conn: &mut FakeConn) -> bool {
            conn.healthy
        }

        fn close(&self, _conn: FakeConn) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fake_pool(max: u32, timeout: Duration) -> (Arc<FakeManager>, ConnectionPool<Arc<FakeManager>>) {
        let manager = Arc::new(FakeManager::default());
        let pool = ConnectionPool::with_manager(manager.clone(), max, timeout).unwrap();
        (manager, pool)
    }

    #[test]
    fn test_idle_connection_is_reused() {
        let (manager, pool) = fake_pool(3, Duration::from_millis(50));

        drop(pool.get_connection().unwrap());
        drop(pool.get_connection().unwrap());

        assert_eq!(manager.created.load(Ordering::SeqCst), 1);
        assert_eq!(
            pool.stats(),
            PoolStats { open: 1, in_use: 0, idle: 1, max_connections: 3 }
        );
    }

    #[test]
    fn test_exhausted_pool_times_out() {
        let (_manager, pool) = fake_pool(1, Duration::from_millis(20));
        let _held = pool.get_connection().unwrap();

        let started = Instant::now();
        let err = pool.get_connection().err().unwrap();
        assert!(matches!(err, DatabaseError::PoolExhausted(_)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_broken_connection_is_discarded() {
        let (manager, pool) = fake_pool(2, Duration::from_millis(20));

        let mut conn = pool.get_connection().unwrap();
        conn.healthy = false;
        pool.return_connection(conn);

        let stats = pool.stats();
        assert_eq!(stats.open, 0);
        assert_eq!(stats.idle, 0);
        assert_eq!(manager.closed.load(Ordering::SeqCst), 1);

        // the freed slot is usable again
        let _conn = pool.get_connection().unwrap();
        assert_eq!(manager.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_mark_broken_skips_probe() {
        let (_manager, pool) = fake_pool(1, Duration::from_millis(20));
        let mut conn = pool.get_connection().unwrap();
        conn.mark_broken();
        drop(conn);
        assert_eq!(pool.stats().open, 0);
    }

    #[test]
    fn test_close_all_resets_and_discards_stragglers() {
        let (manager, pool) = fake_pool(2, Duration::from_millis(20));

        let straggler = pool.get_connection().unwrap();
        drop(pool.get_connection().unwrap());
        assert_eq!(pool.stats().idle, 1);

        pool.close_all();
        assert_eq!(
            pool.stats(),
            PoolStats { open: 0, in_use: 0, idle: 0, max_connections: 2 }
        );
        assert_eq!(manager.closed.load(Ordering::SeqCst), 1);

        drop(straggler);
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(manager.closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_closed_pool_refuses_checkout() {
        let (manager, pool) = fake_pool(2, Duration::from_millis(20));
        drop(pool.get_connection().unwrap());

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(manager.closed.load(Ordering::SeqCst), 1);
        assert!(matches!(pool.get_connection(), Err(DatabaseError::PoolClosed)));
    }

    #[test]
    fn test_waiter_wakes_when_broken_connection_frees_slot() {
        let (_manager, pool) = fake_pool(1, Duration::from_secs(5));
        let mut held = pool.get_connection().unwrap();
        held.healthy = false;

        std::thread::scope(|s| {
            let pool = &pool;
            let waiter = s.spawn(move || pool.get_connection().map(|_| ()));
            std::thread::sleep(Duration::from_millis(50));
            drop(held);
            waiter.join().unwrap().unwrap();
        });
    }

    #[test]
    fn test_third_caller_blocks_until_a_return() {
        let (_manager, pool) = fake_pool(2, Duration::from_secs(5));
        let (acquired_tx, acquired_rx) = crossbeam_channel::unbounded::<usize>();
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();

        std::thread::scope(|s| {
            for id in 0..3 {
                let pool = &pool;
                let acquired_tx = acquired_tx.clone();
                let release_rx = release_rx.clone();
                s.spawn(move || {
                    let _conn = pool.get_connection().unwrap();
                    acquired_tx.send(id).unwrap();
                    release_rx.recv().unwrap();
                });
            }

            acquired_rx.recv_timeout(Duration::from_secs(1)).unwrap();
            acquired_rx.recv_timeout(Duration::from_secs(1)).unwrap();
            assert!(acquired_rx.recv_timeout(Duration::from_millis(150)).is_err());
            assert_eq!(pool.stats().in_use, 2);

            release_tx.send(()).unwrap();
            acquired_rx.recv_timeout(Duration::from_secs(2)).unwrap();

            release_tx.send(()).unwrap();
            release_tx.send(()).unwrap();
        });

        assert_eq!(pool.stats().in_use, 0);
        assert!(pool.stats().open <= 2);
    }

    #[test]
    fn test_freed_slots_leave_at_most_one_wakeup() {
        let (_manager, pool) = fake_pool(4, Duration::from_millis(20));

        for _ in 0..10 {
            let mut conn = pool.get_connection().unwrap();
            conn.healthy = false;
            drop(conn);
        }

        assert!(pool.slot_rx.len() <= 1);
        assert_eq!(pool.stats().open, 0);
    }

    #[test]
    fn test_two_waiters_both_wake_when_two_slots_free() {
        let (_manager, pool) = fake_pool(2, Duration::from_secs(5));
        let mut first = pool.get_connection().unwrap();
        let mut second = pool.get_connection().unwrap();
        first.healthy = false;
        second.healthy = false;

        std::thread::scope(|s| {
            let pool = &pool;
            let waiters: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(move || {
                        let conn = pool.get_connection()?;
                        std::thread::sleep(Duration::from_millis(50));
                        drop(conn);
                        Ok::<_, DatabaseError>(())
                    })
                })
                .collect();
            std::thread::sleep(Duration::from_millis(50));
            drop(first);
            drop(second);

            for waiter in waiters {
                waiter.join().unwrap().unwrap();
            }
        });
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = ConnectionPool::with_manager(Arc::new(FakeManager::default()), 0, Duration::from_secs(1));
        assert!(matches!(result, Err(DatabaseError::Config(_))));
    }

    #[test]
    fn test_config_validation() {
        assert!(PoolConfig::builder().max_connections(0).build().is_err());
        assert!(PoolConfig::builder().acquire_timeout(Duration::ZERO).build().is_err());

        let config = PoolConfig::builder()
            .database_path("crm.db")
            .max_connections(2)
            .build()
            .unwrap();
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_sqlite_pool_round_trip() {
        let (_dir, path) = minicrm_test_utils::temp_db_path("pool");
        let config = PoolConfig::builder()
            .database_path(&path)
            .max_connections(2)
            .sqlite(SqliteConfig::testing())
            .build()
            .unwrap();
        let pool = ConnectionPool::open(&config).unwrap();

        {
            let conn = pool.get_connection().unwrap();
            conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (7);").unwrap();
        }

        let conn = pool.get_connection().unwrap();
        let v: i64 = conn.query_row("SELECT v FROM t", [], |row| row.get(0)).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn test_open_transaction_is_rolled_back_on_return() {
        let (_dir, path) = minicrm_test_utils::temp_db_path("pool");
        let config = PoolConfig::builder()
            .database_path(&path)
            .max_connections(1)
            .sqlite(SqliteConfig::testing())
            .build()
            .unwrap();
        let pool = ConnectionPool::open(&config).unwrap();

        pool.get_connection().unwrap().execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        {
            let conn = pool.get_connection().unwrap();
            conn.execute_batch("BEGIN; INSERT INTO t VALUES (1);").unwrap();
        }

        let conn = pool.get_connection().unwrap();
        assert!(conn.is_autocommit());
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
        assert_eq!(pool.stats().open, 1);
    }

    #[test]
    fn test_open_missing_file_without_create_fails() {
        let dir = minicrm_test_utils::temp_dir();
        let manager = SqliteConnectionManager::new(dir.path().join("absent.db"), SqliteConfig::testing())
            .existing_only();
        let pool = ConnectionPool::with_manager(manager, 1, Duration::from_millis(10)).unwrap();

        let err = pool.get_connection().err().unwrap();
        assert!(matches!(err, DatabaseError::Connect { .. }));
        assert_eq!(pool.stats().open, 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Get,
        Return { index: usize, healthy: bool },
        CloseAll,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => Just(Op::Get),
            4 => (any::<usize>(), prop::bool::weighted(0.8))
                .prop_map(|(index, healthy)| Op::Return { index, healthy }),
            1 => Just(Op::CloseAll),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_open_connections_never_exceed_max(
            max in 1u32..4,
            ops in prop::collection::vec(op_strategy(), 1..40),
        ) {
            let (_manager, pool) = fake_pool(max, Duration::from_millis(1));
            let mut held = Vec::new();

            for op in ops {
                match op {
                    Op::Get => match pool.get_connection() {
                        Ok(conn) => held.push(conn),
                        Err(e) => {
                            prop_assert!(matches!(e, DatabaseError::PoolExhausted(_)));
                            prop_assert_eq!(pool.stats().open, max);
                        }
                    },
                    Op::Return { index, healthy } => {
                        if !held.is_empty() {
                            let mut conn = held.swap_remove(index % held.len());
                            conn.healthy = healthy;
                            drop(conn);
                        }
                    }
                    Op::CloseAll => {
                        // stragglers from the old generation no longer count
                        pool.close_all();
                        held.clear();
                    }
                }

                let stats = pool.stats();
                prop_assert!(stats.open <= max);
                prop_assert!(stats.in_use as usize + stats.idle <= max as usize);
                prop_assert_eq!(stats.in_use as usize, held.len());
            }
        }
    }
}
