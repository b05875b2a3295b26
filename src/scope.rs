//! Scoped Aggregation
//!
//! Narrows engine-wide rows (sessions, requests) to one virtual database.
//!
//! # Matching Rules
//! A row that carries the virtual-database name field belongs to the scope
//! when the name equals the scope's name. The version is not compared on
//! this path: rows of every deployed version of a VDB count toward each of
//! them, which is the long-standing behavior consoles rely on.
//!
//! Some request rows carry no name field. Those are attributed through their
//! session identifier: the row counts when a session of the scope has the
//! same identifier. This indirect path only contributes to counts, never to
//! filtered row lists, so `count_by_scope >= filter_by_scope().len()`.
//!
//! The aggregator itself does no I/O. Callers that need the indirect path
//! fetch the scope's session list once (see
//! [`ScopedAggregator::needs_session_correlation`]) and pass it in. Session
//! rows always carry the name field, so that fetch never recurses.

use serde_json::Value;

use crate::catalog::FieldNames;
use crate::client::Row;
use crate::params::ScopeFilter;

/// Filters and counts rows per virtual database
#[derive(Debug, Clone, Copy)]
pub struct ScopedAggregator<'a> {
    fields: &'a FieldNames,
}

impl<'a> ScopedAggregator<'a> {
    #[must_use]
    pub const fn new(fields: &'a FieldNames) -> Self {
        Self { fields }
    }

    fn direct_name<'r>(&self, row: &'r Row) -> Option<&'r Value> {
        row.get(&self.fields.vdb_name)
            .filter(|value| !value.is_null())
    }

    fn session_id<'r>(&self, row: &'r Row) -> Option<&'r Value> {
        row.get(&self.fields.session_id)
            .filter(|value| !value.is_null())
    }

    fn matches_directly(&self, row: &Row, scope: &ScopeFilter) -> bool {
        matches!(self.direct_name(row), Some(Value::String(name)) if *name == scope.vdb_name)
    }

    /// Rows whose name field equals the scope's name, in input order
    #[must_use]
    pub fn filter_by_scope(&self, rows: &[Row], scope: &ScopeFilter) -> Vec<Row> {
        rows.iter()
            .filter(|row| self.matches_directly(row, scope))
            .cloned()
            .collect()
    }

    fn needs_session(&self, row: &Row) -> bool {
        self.direct_name(row).is_none() && self.session_id(row).is_some()
    }

    /// Whether any row can only be attributed through its session
    #[must_use]
    pub fn needs_session_correlation(&self, rows: &[Row]) -> bool {
        rows.iter().any(|row| self.needs_session(row))
    }

    /// Count rows belonging to the scope, directly or through `scoped_sessions`
    ///
    /// `scoped_sessions` is the scope's own session list, i.e. the result of
    /// [`Self::filter_by_scope`] over the engine-wide session listing. It is
    /// only consulted for rows without a name field.
    #[must_use]
    pub fn count_by_scope(
        &self,
        rows: &[Row],
        scope: &ScopeFilter,
        scoped_sessions: &[Row],
    ) -> usize {
        let in_scoped_session = |id: &Value| {
            scoped_sessions
                .iter()
                .any(|session| self.session_id(session) == Some(id))
        };
        rows.iter()
            .filter(|row| match self.direct_name(row) {
                Some(_) => self.matches_directly(row, scope),
                None => self.session_id(row).is_some_and(in_scoped_session),
            })
            .count()
    }
}
