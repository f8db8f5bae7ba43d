// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Batches of statements executed as one logical call.

use crate::error::ClientError;
use crate::options::ExecutionOptions;
use crate::statement::{PreparedStatement, Statement};

/// The atomicity mode of a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchKind {
    /// Atomic all-or-nothing, via the server's batch log.
    #[default]
    Logged,
    /// Best-effort grouped execution; no atomicity guarantee.
    Unlogged,
    /// Restricted to counter-column mutations.
    Counter,
}

/// One member of a batch.
#[derive(Clone, Debug)]
pub enum BatchStatement {
    Query(Statement),
    Prepared(PreparedStatement),
}

impl BatchStatement {
    /// The member's query text.
    pub fn text(&self) -> &str {
        match self {
            BatchStatement::Query(stmt) => stmt.text(),
            BatchStatement::Prepared(stmt) => stmt.text(),
        }
    }
}

impl From<&str> for BatchStatement {
    fn from(text: &str) -> BatchStatement {
        BatchStatement::Query(Statement::new(text))
    }
}

impl From<String> for BatchStatement {
    fn from(text: String) -> BatchStatement {
        BatchStatement::Query(Statement::new(text))
    }
}

impl From<Statement> for BatchStatement {
    fn from(stmt: Statement) -> BatchStatement {
        BatchStatement::Query(stmt)
    }
}

impl From<PreparedStatement> for BatchStatement {
    fn from(stmt: PreparedStatement) -> BatchStatement {
        BatchStatement::Prepared(stmt)
    }
}

/// An ordered sequence of statements executed as one logical call, with one
/// value set per member, positionally aligned.
///
/// The batch's attached options apply uniformly to all members. In
/// particular, idempotency comes only from the batch's own explicit flag,
/// never from the member statements, since statement text alone cannot
/// safely determine it.
///
/// [`Batch::append`] performs no validation; member/value-set count
/// alignment is checked at submission, and counter-batch restrictions at
/// [`Batch::finish`].
#[derive(Clone, Debug, Default)]
pub struct Batch {
    kind: BatchKind,
    statements: Vec<BatchStatement>,
    options: ExecutionOptions,
}

impl Batch {
    /// Constructs an empty batch of the given kind.
    pub fn new(kind: BatchKind) -> Batch {
        Batch {
            kind,
            statements: Vec::new(),
            options: ExecutionOptions::default(),
        }
    }

    /// Appends a member statement. Never fails; misconfiguration surfaces at
    /// finalize or submission time.
    pub fn append<S: Into<BatchStatement>>(&mut self, statement: S) {
        self.statements.push(statement.into());
    }

    /// Returns a copy with the given attached options.
    pub fn with_options(mut self, options: ExecutionOptions) -> Batch {
        self.options = options;
        self
    }

    /// Finalizes the batch, validating kind restrictions.
    ///
    /// A `Counter` batch may only contain counter mutations; a member that
    /// is not one is a configuration error here rather than a server error
    /// at execution time.
    pub fn finish(self) -> Result<Batch, ClientError> {
        self.validate()?;
        Ok(self)
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.kind == BatchKind::Counter {
            for stmt in &self.statements {
                if !is_counter_mutation(stmt.text()) {
                    return Err(ClientError::Config(format!(
                        "counter batch may only contain counter mutations: {}",
                        stmt.text()
                    )));
                }
            }
        }
        Ok(())
    }

    /// The batch kind.
    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    /// The member statements, in append order.
    pub fn statements(&self) -> &[BatchStatement] {
        &self.statements
    }

    /// The number of member statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Reports whether the batch has no members.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The attached options.
    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }
}

/// Best-effort textual gate for counter batches. Counter mutations are
/// always `UPDATE` statements; the server remains authoritative about
/// whether the touched columns are in fact counters.
fn is_counter_mutation(text: &str) -> bool {
    text.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("UPDATE"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_batch_rejects_non_counter_members() {
        let mut batch = Batch::new(BatchKind::Counter);
        batch.append("UPDATE counters SET hits = hits + 1 WHERE id = ?");
        batch.append("INSERT INTO t (id) VALUES (?)");
        let err = batch.finish().unwrap_err();
        assert!(matches!(err, ClientError::Config(_)), "{err}");
    }

    #[test]
    fn test_counter_batch_accepts_updates() {
        let mut batch = Batch::new(BatchKind::Counter);
        batch.append("  update counters SET hits = hits + 1 WHERE id = ?");
        assert_eq!(batch.finish().unwrap().len(), 1);
    }

    #[test]
    fn test_append_never_validates() {
        // Misconfiguration is detected at finalize, not at append.
        let mut batch = Batch::new(BatchKind::Counter);
        batch.append("DELETE FROM t WHERE id = ?");
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_logged_batch_accepts_anything() {
        let mut batch = Batch::new(BatchKind::Logged);
        batch.append("INSERT INTO t (id) VALUES (?)");
        batch.append("DELETE FROM t WHERE id = ?");
        assert!(batch.finish().is_ok());
    }
}
