//! Type-safe SQL query builder
//!
//! Provides a fluent API for building SQL statements with automatic parameter binding.
//! Every value, including `LIMIT` and `OFFSET`, is bound through a positional
//! placeholder (`$1`, `$2`, ...); only table and column names supplied by code are
//! written into the statement text.

use super::database_types::DatabaseType;
use super::value::DatabaseValue;

/// SQL comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal to (=)
    Eq,
    /// Case-insensitive pattern matching (`ILIKE`, or `LIKE` where the dialect lacks it)
    ILike,
}

impl Operator {
    fn as_sql(&self, dialect: DatabaseType) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::ILike => dialect.case_insensitive_like(),
        }
    }
}

/// WHERE clause condition
#[derive(Debug, Clone)]
pub struct Condition {
    column: String,
    operator: Operator,
    value: DatabaseValue,
}

impl Condition {
    fn new(column: &str, operator: Operator, value: DatabaseValue) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value,
        }
    }
}

/// A finished statement: SQL text plus the values for its placeholders, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `$n` placeholders
    pub sql: String,
    /// Values for `$1..$n`
    pub params: Vec<DatabaseValue>,
}

/// Hands out `$n` placeholders in order of first appearance
#[derive(Debug, Default)]
struct Placeholders {
    next: usize,
}

impl Placeholders {
    fn next(&mut self) -> String {
        self.next += 1;
        format!("${}", self.next)
    }
}

/// Render `cond1 AND cond2 ...`, consuming one placeholder per condition
fn render_conditions(
    conditions: &[Condition],
    dialect: DatabaseType,
    placeholders: &mut Placeholders,
) -> String {
    conditions
        .iter()
        .map(|cond| {
            format!(
                "{} {} {}",
                cond.column,
                cond.operator.as_sql(dialect),
                placeholders.next()
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn condition_values(conditions: &[Condition]) -> impl Iterator<Item = DatabaseValue> + '_ {
    conditions.iter().map(|cond| cond.value.clone())
}

/// SELECT query builder
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<String>,
    count_alias: Option<String>,
    where_conditions: Vec<Condition>,
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    dialect: DatabaseType,
}

impl SelectBuilder {
    /// Create a new SELECT query builder
    ///
    /// # Example
    ///
    /// ```
    /// use student_records::core::query_builder::SelectBuilder;
    ///
    /// let query = SelectBuilder::new("students")
    ///     .columns(&["student_id", "student_name"])
    ///     .build();
    /// assert_eq!(query, "SELECT student_id, student_name FROM students");
    /// ```
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec!["*".to_string()],
            count_alias: None,
            where_conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            dialect: DatabaseType::default(),
        }
    }

    /// Render dialect-specific operators for the given backend
    #[must_use]
    pub fn dialect(mut self, dialect: DatabaseType) -> Self {
        self.dialect = dialect;
        self
    }

    /// Select specific columns
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Prepend a `(SELECT COUNT(*) ...) AS alias` column
    ///
    /// The sub-select counts rows of the same table under the same WHERE
    /// conditions as the outer query, so the count always describes the filtered
    /// set regardless of LIMIT/OFFSET. The conditions' values are bound once and
    /// shared by both clauses.
    #[must_use]
    pub fn count_column(mut self, alias: &str) -> Self {
        self.count_alias = Some(alias.to_string());
        self
    }

    /// Add a WHERE condition
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.where_conditions
            .push(Condition::new(column, Operator::Eq, value.into()));
        self
    }

    /// Add a case-insensitive WHERE column ILIKE pattern condition
    #[must_use]
    pub fn where_ilike(mut self, column: &str, pattern: &str) -> Self {
        self.where_conditions.push(Condition::new(
            column,
            Operator::ILike,
            DatabaseValue::String(pattern.to_string()),
        ));
        self
    }

    /// Add ORDER BY ASC
    #[must_use]
    pub fn order_by_asc(mut self, column: &str) -> Self {
        self.order_by.push(column.to_string());
        self
    }

    /// Add a bound LIMIT clause
    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a bound OFFSET clause
    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Build the SQL query string
    pub fn build(&self) -> String {
        let mut placeholders = Placeholders::default();

        let where_clause = if self.where_conditions.is_empty() {
            String::new()
        } else {
            format!(
                " WHERE {}",
                render_conditions(&self.where_conditions, self.dialect, &mut placeholders)
            )
        };

        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        if let Some(alias) = &self.count_alias {
            columns.push(format!(
                "(SELECT COUNT(*) FROM {}{}) AS {}",
                self.table, where_clause, alias
            ));
        }
        columns.extend(self.columns.iter().cloned());

        let mut sql = format!(
            "SELECT {} FROM {}{}",
            columns.join(", "),
            self.table,
            where_clause
        );

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|col| format!("{} ASC", col))
                .collect();
            sql.push_str(&order_clauses.join(", "));
        }

        if self.limit.is_some() {
            sql.push_str(&format!(" LIMIT {}", placeholders.next()));
        }

        if self.offset.is_some() {
            sql.push_str(&format!(" OFFSET {}", placeholders.next()));
        }

        sql
    }

    /// Get the parameter values for parameterized queries
    pub fn params(&self) -> Vec<DatabaseValue> {
        condition_values(&self.where_conditions)
            .chain(self.limit.map(DatabaseValue::Long))
            .chain(self.offset.map(DatabaseValue::Long))
            .collect()
    }

    /// Build the statement text and its parameters together
    pub fn to_statement(&self) -> Statement {
        Statement {
            sql: self.build(),
            params: self.params(),
        }
    }
}

/// INSERT query builder
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
    returning: bool,
}

impl InsertBuilder {
    /// Create a new INSERT query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            returning: false,
        }
    }

    /// Add a column-value pair
    #[must_use]
    pub fn value(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.columns.push(column.to_string());
        self.values.push(value.into());
        self
    }

    /// Return the stored row, including server-assigned columns
    #[must_use]
    pub fn returning_all(mut self) -> Self {
        self.returning = true;
        self
    }

    /// Build the SQL query string
    pub fn build(&self) -> String {
        let mut placeholders = Placeholders::default();
        let slots: Vec<String> = self.values.iter().map(|_| placeholders.next()).collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            slots.join(", ")
        );
        if self.returning {
            sql.push_str(" RETURNING *");
        }
        sql
    }

    /// Get the parameter values
    pub fn params(&self) -> Vec<DatabaseValue> {
        self.values.clone()
    }

    /// Build the statement text and its parameters together
    pub fn to_statement(&self) -> Statement {
        Statement {
            sql: self.build(),
            params: self.params(),
        }
    }
}

/// UPDATE query builder
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    set_columns: Vec<String>,
    set_values: Vec<DatabaseValue>,
    where_conditions: Vec<Condition>,
    returning: bool,
}

impl UpdateBuilder {
    /// Create a new UPDATE query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set_columns: Vec::new(),
            set_values: Vec::new(),
            where_conditions: Vec::new(),
            returning: false,
        }
    }

    /// Set a column value
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.set_columns.push(column.to_string());
        self.set_values.push(value.into());
        self
    }

    /// Add a WHERE condition
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.where_conditions
            .push(Condition::new(column, Operator::Eq, value.into()));
        self
    }

    /// Return the updated rows
    #[must_use]
    pub fn returning_all(mut self) -> Self {
        self.returning = true;
        self
    }

    /// Build the SQL query string
    pub fn build(&self) -> String {
        let mut placeholders = Placeholders::default();
        let set_clauses: Vec<String> = self
            .set_columns
            .iter()
            .map(|col| format!("{} = {}", col, placeholders.next()))
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.table, set_clauses.join(", "));

        if !self.where_conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&render_conditions(
                &self.where_conditions,
                DatabaseType::default(),
                &mut placeholders,
            ));
        }

        if self.returning {
            sql.push_str(" RETURNING *");
        }

        sql
    }

    /// Get the parameter values (SET values followed by WHERE values)
    pub fn params(&self) -> Vec<DatabaseValue> {
        self.set_values
            .iter()
            .cloned()
            .chain(condition_values(&self.where_conditions))
            .collect()
    }

    /// Build the statement text and its parameters together
    pub fn to_statement(&self) -> Statement {
        Statement {
            sql: self.build(),
            params: self.params(),
        }
    }
}

/// DELETE query builder
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    where_conditions: Vec<Condition>,
    returning: bool,
}

impl DeleteBuilder {
    /// Create a new DELETE query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_conditions: Vec::new(),
            returning: false,
        }
    }

    /// Add a WHERE condition
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.where_conditions
            .push(Condition::new(column, Operator::Eq, value.into()));
        self
    }

    /// Return the deleted rows
    #[must_use]
    pub fn returning_all(mut self) -> Self {
        self.returning = true;
        self
    }

    /// Build the SQL query string
    pub fn build(&self) -> String {
        let mut placeholders = Placeholders::default();
        let mut sql = format!("DELETE FROM {}", self.table);

        if !self.where_conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&render_conditions(
                &self.where_conditions,
                DatabaseType::default(),
                &mut placeholders,
            ));
        }

        if self.returning {
            sql.push_str(" RETURNING *");
        }

        sql
    }

    /// Get the parameter values
    pub fn params(&self) -> Vec<DatabaseValue> {
        condition_values(&self.where_conditions).collect()
    }

    /// Build the statement text and its parameters together
    pub fn to_statement(&self) -> Statement {
        Statement {
            sql: self.build(),
            params: self.params(),
        }
    }
}
