//! Statement construction.
//!
//! Every builder returns a [`Statement`]: SQL text with `?` placeholders and
//! the parameters to bind, in placeholder order. Values always travel as
//! parameters; only [`RawSql`] fragments are inlined. Table and column names
//! are checked against `^[A-Za-z_][A-Za-z0-9_]*$` (per dot-separated segment)
//! before they are interpolated.

use crate::pagination::Pagination;
use crate::value::{ColumnValue, RawSql, SqlValue};
use crate::{DbError, DbResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Check a possibly qualified identifier (`table`, `t.column`).
pub fn validate_identifier(name: &str) -> DbResult<()> {
    if !name.is_empty() && name.split('.').all(|segment| IDENTIFIER.is_match(segment)) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

fn ident(name: &str) -> DbResult<&str> {
    validate_identifier(name)?;
    Ok(name)
}

/// SQL text plus the parameters for its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

// ============================================================================
// WHERE clause nodes
// ============================================================================

/// Comparison operators for [`Condition::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    NotLike,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "=" => Some(CompareOp::Eq),
            "!=" | "<>" => Some(CompareOp::NotEq),
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            ">=" => Some(CompareOp::Gte),
            "<=" => Some(CompareOp::Lte),
            "LIKE" => Some(CompareOp::Like),
            "NOT LIKE" => Some(CompareOp::NotLike),
            _ => None,
        }
    }
}

/// `column op ?`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub column: String,
    pub op: CompareOp,
    pub value: SqlValue,
}

impl Comparison {
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<SqlValue>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    fn render(&self, params: &mut Vec<SqlValue>) -> DbResult<String> {
        let column = ident(&self.column)?;
        params.push(self.value.clone());
        Ok(format!("{} {} ?", column, self.op.as_str()))
    }
}

/// One AND-level term of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = ?`
    Equals { column: String, value: SqlValue },
    /// `column op ?`
    Compare(Comparison),
    /// `(a op ? OR b op ? ...)`
    Or(Vec<Comparison>),
    /// `column <expr>` with `expr` inlined, e.g. `= NOW()` or `IS NULL`.
    Raw { column: String, expr: RawSql },
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Condition::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<SqlValue>) -> Self {
        Condition::Compare(Comparison::new(column, op, value))
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<SqlValue>) -> Self {
        Self::compare(column, CompareOp::Like, pattern)
    }

    pub fn or(comparisons: Vec<Comparison>) -> Self {
        Condition::Or(comparisons)
    }

    pub fn raw(column: impl Into<String>, expr: impl Into<RawSql>) -> Self {
        Condition::Raw {
            column: column.into(),
            expr: expr.into(),
        }
    }

    /// Render the term, or `None` for an empty OR group.
    fn render(&self, params: &mut Vec<SqlValue>) -> DbResult<Option<String>> {
        match self {
            Condition::Equals { column, value } => {
                let column = ident(column)?;
                params.push(value.clone());
                Ok(Some(format!("{} = ?", column)))
            }
            Condition::Compare(cmp) => cmp.render(params).map(Some),
            Condition::Or(list) if list.is_empty() => Ok(None),
            Condition::Or(list) => {
                let parts = list
                    .iter()
                    .map(|cmp| cmp.render(params))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(Some(format!("({})", parts.join(" OR "))))
            }
            Condition::Raw { column, expr } => {
                let column = ident(column)?;
                Ok(Some(format!("{} {}", column, expr)))
            }
        }
    }
}

/// Render `WHERE ...` (with a leading space) or an empty string.
fn render_where(conditions: &[Condition], params: &mut Vec<SqlValue>) -> DbResult<String> {
    let mut terms = Vec::with_capacity(conditions.len());
    for condition in conditions {
        if let Some(term) = condition.render(params)? {
            terms.push(term);
        }
    }
    if terms.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", terms.join(" AND ")))
    }
}

// ============================================================================
// Column values for INSERT / UPDATE
// ============================================================================

/// Column values in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    entries: Vec<(String, ColumnValue)>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn set(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column; a repeated column keeps its first position.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<ColumnValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<ColumnValue>> FromIterator<(K, V)> for Values {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Values::new();
        for (k, v) in iter {
            values.insert(k, v);
        }
        values
    }
}

fn render_value(value: &ColumnValue, params: &mut Vec<SqlValue>) -> String {
    match value {
        ColumnValue::Param(v) => {
            params.push(v.clone());
            "?".to_string()
        }
        ColumnValue::Raw(raw) => raw.to_string(),
    }
}

// ============================================================================
// SELECT options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// `<kind> JOIN table [alias] ON <on>`
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub alias: Option<String>,
    pub on: RawSql,
}

impl Join {
    pub fn new(kind: JoinKind, table: impl Into<String>, on: impl Into<RawSql>) -> Self {
        Self {
            kind,
            table: table.into(),
            alias: None,
            on: on.into(),
        }
    }

    pub fn inner(table: impl Into<String>, on: impl Into<RawSql>) -> Self {
        Self::new(JoinKind::Inner, table, on)
    }

    pub fn left(table: impl Into<String>, on: impl Into<RawSql>) -> Self {
        Self::new(JoinKind::Left, table, on)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn render(&self) -> DbResult<String> {
        let table = ident(&self.table)?;
        match &self.alias {
            Some(alias) => Ok(format!(
                " {} {} {} ON {}",
                self.kind.as_str(),
                table,
                ident(alias)?,
                self.on
            )),
            None => Ok(format!(" {} {} ON {}", self.kind.as_str(), table, self.on)),
        }
    }
}

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// `"desc"` (any case) is descending, everything else ascending.
    pub fn parse_lenient(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }
}

/// HAVING clause text with its own bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Having {
    pub clause: RawSql,
    pub params: Vec<SqlValue>,
}

impl Having {
    pub fn new(clause: impl Into<RawSql>, params: Vec<SqlValue>) -> Self {
        Self {
            clause: clause.into(),
            params,
        }
    }
}

/// A selected column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// `*`
    All,
    /// Plain or qualified name; `t.*` is accepted.
    Ident(String),
    /// `name AS alias`
    As(String, String),
    /// Inlined expression such as `COUNT(*) AS total`.
    Raw(RawSql),
}

impl Column {
    pub fn ident(name: impl Into<String>) -> Self {
        Column::Ident(name.into())
    }

    pub fn raw(sql: impl Into<RawSql>) -> Self {
        Column::Raw(sql.into())
    }

    fn render(&self) -> DbResult<String> {
        match self {
            Column::All => Ok("*".to_string()),
            Column::Ident(name) => match name.strip_suffix(".*") {
                Some(table) => Ok(format!("{}.*", ident(table)?)),
                None => Ok(ident(name)?.to_string()),
            },
            Column::As(name, alias) => Ok(format!("{} AS {}", ident(name)?, ident(alias)?)),
            Column::Raw(sql) => Ok(sql.to_string()),
        }
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        if name == "*" {
            Column::All
        } else {
            Column::Ident(name.to_string())
        }
    }
}

/// Everything after the WHERE clause of a SELECT, plus joins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    pub joins: Vec<Join>,
    pub group_by: Vec<String>,
    pub having: Option<Having>,
    pub order_by: Vec<(String, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    pub fn having(mut self, having: Having) -> Self {
        self.having = Some(having);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Apply `LIMIT per_page OFFSET (page - 1) * per_page`.
    pub fn paginate(mut self, pagination: &Pagination) -> Self {
        self.limit = Some(pagination.limit());
        self.offset = Some(pagination.offset());
        self
    }
}

// ============================================================================
// Statement builders
// ============================================================================

/// `SELECT cols FROM table [joins] [WHERE] [GROUP BY] [HAVING] [ORDER BY] [LIMIT [OFFSET]]`
///
/// An empty column list selects `*`.
pub fn select(
    table: &str,
    conditions: &[Condition],
    columns: &[Column],
    options: &SelectOptions,
) -> DbResult<Statement> {
    let mut params = Vec::new();

    let cols = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(Column::render)
            .collect::<DbResult<Vec<_>>>()?
            .join(", ")
    };

    let mut sql = format!("SELECT {} FROM {}", cols, ident(table)?);
    render_from_tail(&mut sql, &mut params, conditions, options)?;

    if !options.order_by.is_empty() {
        let parts = options
            .order_by
            .iter()
            .map(|(col, order)| -> DbResult<String> {
                Ok(format!("{} {}", ident(col)?, order.as_str()))
            })
            .collect::<DbResult<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&parts.join(", "));
    }

    // SQLite takes signed 64-bit LIMIT/OFFSET values
    let limit = options.limit.map(sql_int);
    let offset = options.offset.map(sql_int);
    match (limit, offset) {
        (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
        // OFFSET needs a LIMIT; -1 means unbounded
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
        (None, None) => {}
    }

    Ok(Statement { sql, params })
}

fn sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Joins, WHERE, GROUP BY and HAVING, shared by SELECT and COUNT.
fn render_from_tail(
    sql: &mut String,
    params: &mut Vec<SqlValue>,
    conditions: &[Condition],
    options: &SelectOptions,
) -> DbResult<()> {
    for join in &options.joins {
        sql.push_str(&join.render()?);
    }

    sql.push_str(&render_where(conditions, params)?);

    if !options.group_by.is_empty() {
        let cols = options
            .group_by
            .iter()
            .map(|c| ident(c.as_str()))
            .collect::<DbResult<Vec<_>>>()?;
        sql.push_str(" GROUP BY ");
        sql.push_str(&cols.join(", "));
    }

    if let Some(having) = &options.having {
        sql.push_str(" HAVING ");
        sql.push_str(having.clause.as_str());
        params.extend(having.params.iter().cloned());
    }

    Ok(())
}

/// `SELECT COUNT(*) AS total ...` over the same joins and filters.
///
/// Grouped queries are counted as a subquery so the result is the number of
/// groups.
pub fn count(table: &str, conditions: &[Condition], options: &SelectOptions) -> DbResult<Statement> {
    let mut params = Vec::new();
    let grouped = !options.group_by.is_empty();

    let mut inner = if grouped {
        format!("SELECT 1 FROM {}", ident(table)?)
    } else {
        format!("SELECT COUNT(*) AS total FROM {}", ident(table)?)
    };
    render_from_tail(&mut inner, &mut params, conditions, options)?;

    let sql = if grouped {
        format!("SELECT COUNT(*) AS total FROM ({}) AS grouped", inner)
    } else {
        inner
    };
    Ok(Statement { sql, params })
}

/// `INSERT INTO table (cols) VALUES (...)`; fails on empty `values`.
pub fn insert(table: &str, values: &Values) -> DbResult<Statement> {
    if values.is_empty() {
        return Err(DbError::EmptyData("INSERT"));
    }

    let mut params = Vec::new();
    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (column, value) in values.iter() {
        columns.push(ident(column)?);
        placeholders.push(render_value(value, &mut params));
    }

    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            ident(table)?,
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    })
}

/// `UPDATE table SET ... WHERE ...`; fails on empty `values` or an empty
/// WHERE clause.
pub fn update(table: &str, values: &Values, conditions: &[Condition]) -> DbResult<Statement> {
    if values.is_empty() {
        return Err(DbError::EmptyData("UPDATE"));
    }

    let mut params = Vec::new();
    let mut assignments = Vec::with_capacity(values.len());
    for (column, value) in values.iter() {
        let column = ident(column)?;
        assignments.push(format!("{} = {}", column, render_value(value, &mut params)));
    }

    let where_sql = render_where(conditions, &mut params)?;
    if where_sql.is_empty() {
        return Err(DbError::MissingWhere("UPDATE"));
    }

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {}{}",
            ident(table)?,
            assignments.join(", "),
            where_sql
        ),
        params,
    })
}

/// `DELETE FROM table WHERE ...`; fails on an empty WHERE clause.
pub fn delete(table: &str, conditions: &[Condition]) -> DbResult<Statement> {
    let mut params = Vec::new();
    let where_sql = render_where(conditions, &mut params)?;
    if where_sql.is_empty() {
        return Err(DbError::MissingWhere("DELETE"));
    }

    Ok(Statement {
        sql: format!("DELETE FROM {}{}", ident(table)?, where_sql),
        params,
    })
}

// ============================================================================
// Query spec
// ============================================================================

/// A SELECT described as data, rendered on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub table: String,
    pub columns: Vec<Column>,
    pub conditions: Vec<Condition>,
    pub options: SelectOptions,
}

impl QuerySpec {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            options: SelectOptions::default(),
        }
    }

    pub fn columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn column(mut self, column: impl Into<Column>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.options = self.options.join(join);
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.options = self.options.group_by(column);
        self
    }

    pub fn having(mut self, having: Having) -> Self {
        self.options = self.options.having(having);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.options = self.options.order_by(column, order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.options = self.options.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.options = self.options.offset(offset);
        self
    }

    pub fn paginate(mut self, pagination: &Pagination) -> Self {
        self.options = self.options.paginate(pagination);
        self
    }

    pub fn to_statement(&self) -> DbResult<Statement> {
        select(&self.table, &self.conditions, &self.columns, &self.options)
    }

    /// COUNT over the same table, joins, filters and grouping.
    pub fn to_count_statement(&self) -> DbResult<Statement> {
        count(&self.table, &self.conditions, &self.options)
    }
}
