//! Before/after interceptors around insert, update and delete.
//!
//! Before-hooks run in registration order and may rewrite the statement,
//! its parameters or the target table; an error from any of them aborts the
//! operation. After-hooks observe the outcome; their errors are logged and
//! dropped so a committed write is never reported as failed.

use crate::error::{DatabaseError, Result, ValidationError};
use parking_lot::RwLock;
use rusqlite::types::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookOperation {
    Insert,
    Update,
    Delete,
}

impl HookOperation {
    pub const ALL: [HookOperation; 3] = [Self::Insert, Self::Update, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for HookOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookTiming {
    Before,
    After,
}

/// The statement a write operation is about to run.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    pub operation: HookOperation,
    pub table_name: String,
    pub sql: String,
    pub params: Vec<Value>,
}

impl HookContext {
    pub fn new(
        operation: HookOperation,
        table_name: impl Into<String>,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Self {
        Self {
            operation,
            table_name: table_name.into(),
            sql: sql.into(),
            params,
        }
    }

    fn merge(&mut self, overrides: HookOverrides) {
        if let Some(sql) = overrides.sql {
            self.sql = sql;
        }
        if let Some(params) = overrides.params {
            self.params = params;
        }
        if let Some(table_name) = overrides.table_name {
            self.table_name = table_name;
        }
    }
}

/// Replacement values a before-hook hands back. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookOverrides {
    pub sql: Option<String>,
    pub params: Option<Vec<Value>>,
    pub table_name: Option<String>,
}

impl HookOverrides {
    pub fn sql(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            ..Default::default()
        }
    }

    pub fn params(params: Vec<Value>) -> Self {
        Self {
            params: Some(params),
            ..Default::default()
        }
    }
}

/// What a completed write produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Row id of an insert.
    Inserted(i64),
    /// Rows touched by an update or delete.
    Affected(usize),
}

pub trait BeforeHook: Send + Sync {
    fn before(&self, ctx: &HookContext) -> Result<Option<HookOverrides>>;
}

pub trait AfterHook: Send + Sync {
    fn after(&self, ctx: &HookContext, outcome: &OperationOutcome) -> Result<()>;
}

impl<F> BeforeHook for F
where
    F: Fn(&HookContext) -> Result<Option<HookOverrides>> + Send + Sync,
{
    fn before(&self, ctx: &HookContext) -> Result<Option<HookOverrides>> {
        self(ctx)
    }
}

impl<F> AfterHook for F
where
    F: Fn(&HookContext, &OperationOutcome) -> Result<()> + Send + Sync,
{
    fn after(&self, ctx: &HookContext, outcome: &OperationOutcome) -> Result<()> {
        self(ctx, outcome)
    }
}

/// A hook together with when it runs.
#[derive(Clone)]
pub enum Hook {
    Before(Arc<dyn BeforeHook>),
    After(Arc<dyn AfterHook>),
}

impl Hook {
    pub fn before(hook: impl BeforeHook + 'static) -> Self {
        Self::Before(Arc::new(hook))
    }

    pub fn after(hook: impl AfterHook + 'static) -> Self {
        Self::After(Arc::new(hook))
    }

    pub fn timing(&self) -> HookTiming {
        match self {
            Self::Before(_) => HookTiming::Before,
            Self::After(_) => HookTiming::After,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook::{:?}", self.timing())
    }
}

/// Hook registry keyed by operation.
#[derive(Default)]
pub struct DatabaseHooks {
    before: RwLock<HashMap<HookOperation, Vec<Arc<dyn BeforeHook>>>>,
    after: RwLock<HashMap<HookOperation, Vec<Arc<dyn AfterHook>>>>,
}

impl DatabaseHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_before_hook(&self, operation: HookOperation, hook: impl BeforeHook + 'static) {
        self.register(operation, Hook::before(hook));
    }

    pub fn register_after_hook(&self, operation: HookOperation, hook: impl AfterHook + 'static) {
        self.register(operation, Hook::after(hook));
    }

    pub fn register(&self, operation: HookOperation, hook: Hook) {
        debug!(%operation, timing = ?hook.timing(), "registering hook");
        match hook {
            Hook::Before(h) => self.before.write().entry(operation).or_default().push(h),
            Hook::After(h) => self.after.write().entry(operation).or_default().push(h),
        }
    }

    pub fn count(&self, operation: HookOperation, timing: HookTiming) -> usize {
        match timing {
            HookTiming::Before => self.before.read().get(&operation).map_or(0, Vec::len),
            HookTiming::After => self.after.read().get(&operation).map_or(0, Vec::len),
        }
    }

    /// Run the before-hooks for `ctx.operation`, folding their overrides into
    /// `ctx`. Stops at the first error.
    pub fn execute_before_hooks(&self, ctx: &mut HookContext) -> Result<()> {
        let hooks = self.before.read().get(&ctx.operation).cloned().unwrap_or_default();

        for hook in hooks {
            if let Some(overrides) = hook.before(ctx)? {
                ctx.merge(overrides);
            }
        }
        Ok(())
    }

    /// Run every after-hook for `ctx.operation`. Failures are logged, never
    /// returned.
    pub fn execute_after_hooks(&self, ctx: &HookContext, outcome: &OperationOutcome) {
        let hooks = self.after.read().get(&ctx.operation).cloned().unwrap_or_default();

        for hook in hooks {
            if let Err(e) = hook.after(ctx, outcome) {
                warn!(
                    operation = %ctx.operation,
                    table = %ctx.table_name,
                    error = %e,
                    "after-hook failed"
                );
            }
        }
    }
}

impl fmt::Debug for DatabaseHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let before: usize = self.before.read().values().map(Vec::len).sum();
        let after: usize = self.after.read().values().map(Vec::len).sum();
        f.debug_struct("DatabaseHooks")
            .field("before", &before)
            .field("after", &after)
            .finish()
    }
}

/// Rejects statements that do not look like the operation they claim to be.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatementValidationHook;

impl StatementValidationHook {
    fn is_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn leading_keyword(sql: &str) -> String {
        sql.trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase()
    }
}

impl BeforeHook for StatementValidationHook {
    fn before(&self, ctx: &HookContext) -> Result<Option<HookOverrides>> {
        if !Self::is_identifier(&ctx.table_name) {
            return Err(ValidationError::for_field(
                "table_name",
                format!("{:?} is not a plain SQL identifier", ctx.table_name),
            )
            .into());
        }

        if ctx.sql.trim().is_empty() {
            return Err(ValidationError::for_field("sql", "cannot be empty").into());
        }

        let keyword = Self::leading_keyword(&ctx.sql);
        let allowed: &[&str] = match ctx.operation {
            HookOperation::Insert => &["INSERT", "REPLACE"],
            HookOperation::Update => &["UPDATE"],
            HookOperation::Delete => &["DELETE"],
        };
        if !allowed.contains(&keyword.as_str()) {
            return Err(DatabaseError::from(ValidationError::for_field(
                "sql",
                format!("{} statement must start with {}", ctx.operation, allowed.join(" or ")),
            )));
        }

        Ok(None)
    }
}

/// Logs every completed write and counts them per operation.
#[derive(Debug, Default)]
pub struct AuditHook {
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

impl AuditHook {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, operation: HookOperation) -> &AtomicU64 {
        match operation {
            HookOperation::Insert => &self.inserts,
            HookOperation::Update => &self.updates,
            HookOperation::Delete => &self.deletes,
        }
    }

    pub fn count(&self, operation: HookOperation) -> u64 {
        self.counter(operation).load(Ordering::Relaxed)
    }

    pub fn counts(&self) -> AuditCounts {
        AuditCounts {
            inserts: self.count(HookOperation::Insert),
            updates: self.count(HookOperation::Update),
            deletes: self.count(HookOperation::Delete),
        }
    }
}

impl AfterHook for AuditHook {
    fn after(&self, ctx: &HookContext, outcome: &OperationOutcome) -> Result<()> {
        self.counter(ctx.operation).fetch_add(1, Ordering::Relaxed);
        match outcome {
            OperationOutcome::Inserted(id) => {
                info!(operation = %ctx.operation, table = %ctx.table_name, row_id = id, "audit")
            }
            OperationOutcome::Affected(rows) => {
                info!(operation = %ctx.operation, table = %ctx.table_name, rows, "audit")
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditCounts {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}
