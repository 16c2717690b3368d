use std::fmt;
use std::marker::PhantomData;

use rusqlite::Row;
use rusqlite::types::Value;

use crate::config::DEFAULT_PER_PAGE;
use crate::error::CredoError;
use crate::page::Page;
use crate::store::Database;

pub trait Column: Copy + fmt::Debug {
    fn name(self) -> &'static str;
}

/// A table the façade can query. `COLUMNS` fixes both the select list and
/// the index order `from_row` reads.
pub trait Entity: Sized {
    type Column: Column + 'static;

    const TABLE: &'static str;
    const PRIMARY_KEY: Self::Column;
    const COLUMNS: &'static [Self::Column];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn operator(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<C: Column> {
    Compare {
        column: C,
        op: Comparison,
        value: Value,
    },
    IsNull(C),
    IsNotNull(C),
    In {
        column: C,
        values: Vec<Value>,
    },
    Like {
        column: C,
        pattern: String,
    },
    StartsWith {
        column: C,
        prefix: String,
    },
}

impl<C: Column> Predicate<C> {
    pub fn compare(column: C, op: Comparison, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column,
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: C, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Eq, value)
    }

    pub fn ne(column: C, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Ne, value)
    }

    pub fn lt(column: C, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Lt, value)
    }

    pub fn le(column: C, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Le, value)
    }

    pub fn gt(column: C, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Gt, value)
    }

    pub fn ge(column: C, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Ge, value)
    }

    pub fn is_in<V: Into<Value>>(column: C, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn like(column: C, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            column,
            pattern: pattern.into(),
        }
    }

    pub fn starts_with(column: C, prefix: impl Into<String>) -> Self {
        Predicate::StartsWith {
            column,
            prefix: prefix.into(),
        }
    }

    fn write_sql(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Predicate::Compare { column, op, value } => {
                sql.push_str(&format!("t.{} {} ?", column.name(), op.operator()));
                params.push(value.clone());
            }
            Predicate::IsNull(column) => {
                sql.push_str(&format!("t.{} IS NULL", column.name()));
            }
            Predicate::IsNotNull(column) => {
                sql.push_str(&format!("t.{} IS NOT NULL", column.name()));
            }
            Predicate::In { column, values } => {
                // `IN ()` is not valid SQL; an empty set matches nothing.
                if values.is_empty() {
                    sql.push('0');
                    return;
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!("t.{} IN ({placeholders})", column.name()));
                params.extend(values.iter().cloned());
            }
            Predicate::Like { column, pattern } => {
                sql.push_str(&format!("t.{} LIKE ?", column.name()));
                params.push(Value::Text(pattern.clone()));
            }
            Predicate::StartsWith { column, prefix } => {
                sql.push_str(&format!("instr(t.{}, ?) = 1", column.name()));
                params.push(Value::Text(prefix.clone()));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order<C: Column> {
    pub column: C,
    pub direction: Direction,
}

impl<C: Column> Order<C> {
    pub fn asc(column: C) -> Self {
        Self {
            column,
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: C) -> Self {
        Self {
            column,
            direction: Direction::Desc,
        }
    }

    fn sql(&self) -> String {
        let direction = match self.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        format!("t.{} {direction}", self.column.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOption {
    Distinct,
    Limit(u64),
}

#[derive(Debug, Clone)]
struct Fragment {
    sql: &'static str,
    params: Vec<Value>,
}

/// A deferred query against one entity.
///
/// Scope fragments are crate-owned SQL that refer to the outer table as `t`;
/// everything a caller adds is a typed predicate bound as a parameter.
pub struct Query<E: Entity> {
    with: Option<Fragment>,
    scopes: Vec<Fragment>,
    predicates: Vec<Predicate<E::Column>>,
    order_by: Vec<Order<E::Column>>,
    options: Vec<QueryOption>,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            with: self.with.clone(),
            scopes: self.scopes.clone(),
            predicates: self.predicates.clone(),
            order_by: self.order_by.clone(),
            options: self.options.clone(),
            entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &E::TABLE)
            .field("select", &self.select_sql())
            .finish()
    }
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::table()
    }
}

impl<E: Entity> Query<E> {
    pub fn table() -> Self {
        Self {
            with: None,
            scopes: Vec::new(),
            predicates: Vec::new(),
            order_by: Vec::new(),
            options: Vec::new(),
            entity: PhantomData,
        }
    }

    pub(crate) fn with_recursive(sql: &'static str, params: Vec<Value>) -> Self {
        let mut query = Self::table();
        query.with = Some(Fragment { sql, params });
        query
    }

    pub(crate) fn scoped(mut self, sql: &'static str, params: Vec<Value>) -> Self {
        self.scopes.push(Fragment { sql, params });
        self
    }

    pub fn filter(mut self, predicate: Predicate<E::Column>) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, order: Order<E::Column>) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn option(mut self, option: QueryOption) -> Self {
        self.options.push(option);
        self
    }

    fn distinct(&self) -> bool {
        self.options.contains(&QueryOption::Distinct)
    }

    // The tightest cap wins when several limits are given.
    fn limit(&self) -> Option<u64> {
        self.options
            .iter()
            .filter_map(|option| match option {
                QueryOption::Limit(limit) => Some(*limit),
                QueryOption::Distinct => None,
            })
            .min()
    }

    fn prefix(&self, sql: &mut String, params: &mut Vec<Value>) {
        if let Some(with) = &self.with {
            sql.push_str(with.sql.trim());
            sql.push(' ');
            params.extend(with.params.iter().cloned());
        }
    }

    fn body(&self, sql: &mut String, params: &mut Vec<Value>) {
        let columns = E::COLUMNS
            .iter()
            .map(|column| format!("t.{}", column.name()))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str("SELECT ");
        if self.distinct() {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&format!("{columns} FROM {} AS t", E::TABLE));

        let mut first = true;
        let mut open_condition = |sql: &mut String| {
            sql.push_str(if first { " WHERE " } else { " AND " });
            first = false;
        };
        for scope in &self.scopes {
            open_condition(sql);
            sql.push('(');
            sql.push_str(scope.sql.trim());
            sql.push(')');
            params.extend(scope.params.iter().cloned());
        }
        for predicate in &self.predicates {
            open_condition(sql);
            sql.push('(');
            predicate.write_sql(sql, params);
            sql.push(')');
        }

        sql.push_str(" ORDER BY ");
        if self.order_by.is_empty() {
            sql.push_str(&Order::asc(E::PRIMARY_KEY).sql());
        } else {
            let order = self
                .order_by
                .iter()
                .map(Order::sql)
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&order);
        }

        if let Some(limit) = self.limit() {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(clamp_i64(limit)));
        }
    }

    pub fn select_sql(&self) -> Statement {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.prefix(&mut sql, &mut params);
        self.body(&mut sql, &mut params);
        Statement { sql, params }
    }

    pub fn count_sql(&self) -> Statement {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.prefix(&mut sql, &mut params);
        sql.push_str("SELECT COUNT(*) FROM (");
        self.body(&mut sql, &mut params);
        sql.push(')');
        Statement { sql, params }
    }

    pub fn window_sql(&self, limit: usize, offset: usize) -> Statement {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.prefix(&mut sql, &mut params);
        if self.limit().is_some() {
            sql.push_str("SELECT * FROM (");
            self.body(&mut sql, &mut params);
            sql.push(')');
        } else {
            self.body(&mut sql, &mut params);
        }
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(Value::Integer(clamp_i64(limit as u64)));
        params.push(Value::Integer(clamp_i64(offset as u64)));
        Statement { sql, params }
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    List,
    Paginated,
    Deferred,
}

#[derive(Debug, Clone)]
pub struct AdaptorOptions {
    pub paginate: bool,
    pub dynamic: bool,
    pub per_page: usize,
    pub options: Vec<QueryOption>,
}

impl Default for AdaptorOptions {
    fn default() -> Self {
        Self {
            paginate: false,
            dynamic: false,
            per_page: DEFAULT_PER_PAGE,
            options: Vec::new(),
        }
    }
}

impl AdaptorOptions {
    pub fn paginated(per_page: usize) -> Self {
        Self {
            paginate: true,
            per_page,
            ..Self::default()
        }
    }

    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> OutputMode {
        if self.dynamic {
            OutputMode::Deferred
        } else if self.paginate {
            OutputMode::Paginated
        } else {
            OutputMode::List
        }
    }
}

#[derive(Debug)]
pub enum Output<'db, E: Entity> {
    List(Vec<E>),
    Page(Page<'db, E>),
    Deferred(Query<E>),
}

impl<'db, E: Entity> Output<'db, E> {
    pub fn into_list(self) -> Option<Vec<E>> {
        match self {
            Output::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_page(self) -> Option<Page<'db, E>> {
        match self {
            Output::Page(page) => Some(page),
            _ => None,
        }
    }

    pub fn into_query(self) -> Option<Query<E>> {
        match self {
            Output::Deferred(query) => Some(query),
            _ => None,
        }
    }
}

/// Fluent wrapper around a [`Query`] bound to a store handle.
///
/// `list`, `page` and `query` pick the output explicitly; `fetch` follows the
/// mode of the adaptor the builder came from.
pub struct QueryBuilder<'db, E: Entity> {
    db: &'db Database,
    query: Query<E>,
    mode: OutputMode,
    per_page: usize,
    page: usize,
}

impl<E: Entity> fmt::Debug for QueryBuilder<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("query", &self.query)
            .field("mode", &self.mode)
            .field("per_page", &self.per_page)
            .field("page", &self.page)
            .finish()
    }
}

impl<'db, E: Entity> QueryBuilder<'db, E> {
    pub fn new(db: &'db Database, query: Query<E>, options: &AdaptorOptions) -> Self {
        let query = options
            .options
            .iter()
            .fold(query, |query, option| query.option(*option));
        Self {
            db,
            query,
            mode: options.mode(),
            per_page: options.per_page,
            page: 1,
        }
    }

    pub fn filter(mut self, predicate: Predicate<E::Column>) -> Self {
        self.query = self.query.filter(predicate);
        self
    }

    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate<E::Column>>) -> Self {
        for predicate in predicates {
            self.query = self.query.filter(predicate);
        }
        self
    }

    pub fn order_by(mut self, order: Order<E::Column>) -> Self {
        self.query = self.query.order_by(order);
        self
    }

    pub fn orderby(mut self, orders: impl IntoIterator<Item = Order<E::Column>>) -> Self {
        for order in orders {
            self.query = self.query.order_by(order);
        }
        self
    }

    pub fn option(mut self, option: QueryOption) -> Self {
        self.query = self.query.option(option);
        self
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn at_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn list(self) -> Result<Vec<E>, CredoError> {
        self.db.fetch_all(&self.query.select_sql())
    }

    pub fn first(self) -> Result<Option<E>, CredoError> {
        let query = self.query.option(QueryOption::Limit(1));
        Ok(self.db.fetch_all(&query.select_sql())?.into_iter().next())
    }

    pub fn count(&self) -> Result<usize, CredoError> {
        self.db.count(&self.query.count_sql())
    }

    pub fn page(self, page: usize) -> Result<Page<'db, E>, CredoError> {
        Page::fetch(self.db, self.query, page, self.per_page)
    }

    pub fn query(self) -> Query<E> {
        self.query
    }

    pub fn fetch(self) -> Result<Output<'db, E>, CredoError> {
        match self.mode {
            OutputMode::Deferred => Ok(Output::Deferred(self.query)),
            OutputMode::Paginated => {
                let page = self.page;
                Ok(Output::Page(self.page(page)?))
            }
            OutputMode::List => Ok(Output::List(self.list()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    enum ProbeColumn {
        Id,
        Name,
    }

    impl Column for ProbeColumn {
        fn name(self) -> &'static str {
            match self {
                ProbeColumn::Id => "id",
                ProbeColumn::Name => "name",
            }
        }
    }

    #[derive(Debug)]
    struct Probe;

    impl Entity for Probe {
        type Column = ProbeColumn;

        const TABLE: &'static str = "probes";
        const PRIMARY_KEY: ProbeColumn = ProbeColumn::Id;
        const COLUMNS: &'static [ProbeColumn] = &[ProbeColumn::Id, ProbeColumn::Name];

        fn from_row(_row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Probe)
        }
    }

    #[test]
    fn select_orders_by_primary_key_by_default() {
        let statement = Query::<Probe>::table().select_sql();
        assert_eq!(
            statement.sql,
            "SELECT t.id, t.name FROM probes AS t ORDER BY t.id ASC"
        );
        assert!(statement.params.is_empty());
    }

    #[test]
    fn predicates_bind_values_in_order() {
        let statement = Query::<Probe>::table()
            .scoped("t.id IN (SELECT id FROM walk)", vec![Value::Integer(3)])
            .filter(Predicate::eq(ProbeColumn::Name, "ATP".to_string()))
            .filter(Predicate::is_in(ProbeColumn::Id, [1i64, 2]))
            .order_by(Order::desc(ProbeColumn::Name))
            .select_sql();

        assert_eq!(
            statement.sql,
            "SELECT t.id, t.name FROM probes AS t WHERE (t.id IN (SELECT id FROM walk)) \
             AND (t.name = ?) AND (t.id IN (?, ?)) ORDER BY t.name DESC"
        );
        assert_eq!(
            statement.params,
            vec![
                Value::Integer(3),
                Value::Text("ATP".to_string()),
                Value::Integer(1),
                Value::Integer(2),
            ]
        );
    }

    #[test]
    fn empty_in_matches_nothing() {
        let statement = Query::<Probe>::table()
            .filter(Predicate::is_in(ProbeColumn::Id, Vec::<i64>::new()))
            .select_sql();
        assert!(statement.sql.contains("WHERE (0)"));
    }

    #[test]
    fn window_nests_when_limited() {
        let plain = Query::<Probe>::table().window_sql(10, 20);
        assert!(plain.sql.ends_with("ORDER BY t.id ASC LIMIT ? OFFSET ?"));
        assert_eq!(plain.params, vec![Value::Integer(10), Value::Integer(20)]);

        let limited = Query::<Probe>::table()
            .option(QueryOption::Limit(5))
            .option(QueryOption::Distinct)
            .window_sql(10, 0);
        assert!(limited.sql.starts_with("SELECT * FROM (SELECT DISTINCT t.id"));
        assert_eq!(
            limited.params,
            vec![Value::Integer(5), Value::Integer(10), Value::Integer(0)]
        );
    }

    #[test]
    fn recursive_prefix_precedes_count() {
        let statement = Query::<Probe>::with_recursive(
            "WITH RECURSIVE walk(id) AS (SELECT ?)",
            vec![Value::Integer(9)],
        )
        .count_sql();
        assert!(
            statement
                .sql
                .starts_with("WITH RECURSIVE walk(id) AS (SELECT ?) SELECT COUNT(*) FROM (SELECT")
        );
        assert_eq!(statement.params, vec![Value::Integer(9)]);
    }

    #[test]
    fn mode_precedence() {
        let mut options = AdaptorOptions::paginated(10);
        assert_eq!(options.mode(), OutputMode::Paginated);
        options.dynamic = true;
        assert_eq!(options.mode(), OutputMode::Deferred);
        assert_eq!(AdaptorOptions::default().mode(), OutputMode::List);
        assert_eq!(AdaptorOptions::default().per_page, 100);
    }
}
