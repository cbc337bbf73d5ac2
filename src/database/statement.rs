//! Statement description and read/write classification

use super::types::{DatabaseError, Value};
use regex::Regex;
use std::sync::LazyLock;

/// Leading keyword test for read statements.
///
/// This is a textual heuristic, not a parser: anything that does not literally start with
/// `SELECT` (after optional whitespace) is treated as a write.
static READ_STATEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT").expect("read statement pattern"));

/// Statement kind, decided from the leading keyword only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    pub fn classify(sql: &str) -> Self {
        if READ_STATEMENT.is_match(sql) {
            StatementKind::Read
        } else {
            StatementKind::Write
        }
    }
}

/// Bind parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// One execution with one parameter set
    Single(Vec<Value>),
    /// One execution per parameter set
    Many(Vec<Vec<Value>>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Single(Vec::new())
    }
}

/// A statement plus its bind parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    sql: String,
    params: Params,
    one: bool,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::default(),
            one: false,
        }
    }

    /// Single execution with these parameters
    pub fn bind<I, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.params = Params::Single(params.into_iter().map(Into::into).collect());
        self
    }

    /// Batched execution, once per parameter set
    pub fn many<I, R, V>(mut self, batches: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.params = Params::Many(
            batches
                .into_iter()
                .map(|set| set.into_iter().map(Into::into).collect())
                .collect(),
        );
        self
    }

    /// Ask for the first row only (read statements)
    pub fn one(mut self) -> Self {
        self.one = true;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn wants_one(&self) -> bool {
        self.one
    }

    pub fn kind(&self) -> StatementKind {
        StatementKind::classify(&self.sql)
    }

    /// Parameter sets in execution order
    pub fn param_sets(&self) -> Vec<&[Value]> {
        match &self.params {
            Params::Single(values) => vec![values.as_slice()],
            Params::Many(sets) => sets.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Rejects an empty statement before any connection is made
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.sql.is_empty() {
            return Err(DatabaseError::ValidationError(
                "The query string cannot be empty.".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Query::new(sql)
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Query::new(sql)
    }
}
