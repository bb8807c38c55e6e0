//! Turns a [`QueryState`] into SQL text plus bound parameters.
//!
//! Every value reaches the statement through [`Compiler::bind`], which
//! records the parameter and emits the dialect placeholder. Identifiers are
//! validated and quoted; they never come from values.

use serde_json::Value;
use tabula_sql::{validate_identifier, Dialect, SqlValue};

use super::clause::{Operation, Operator, QueryState, WhereValue};
use crate::error::{OrmError, Result};

/// A rendered statement and its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    sql: String,
    params: Vec<SqlValue>,
}

impl CompiledStatement {
    /// Wraps already-rendered SQL.
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Returns the SQL text with placeholders.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bound parameters.
    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Renders the statement with every parameter escaped inline.
    ///
    /// For logs and error reports only.
    #[must_use]
    pub fn to_inline_sql(&self, dialect: &dyn Dialect) -> String {
        let placeholder = dialect.parameter_placeholder();
        let mut params = self.params.iter();
        let mut out = String::with_capacity(self.sql.len());
        let mut rest = self.sql.as_str();

        while let Some(pos) = rest.find(placeholder) {
            out.push_str(&rest[..pos]);
            match params.next() {
                Some(value) => out.push_str(&dialect.escape(value)),
                None => out.push_str(placeholder),
            }
            rest = &rest[pos + placeholder.len()..];
        }
        out.push_str(rest);
        out
    }
}

/// Compiles query state against a table.
///
/// # Errors
///
/// Fails on unsafe identifiers, list values paired with a scalar-only
/// operator, an UPDATE without fields, or payload values that cannot be
/// serialized.
pub fn compile(
    table: &str,
    state: &QueryState,
    dialect: &dyn Dialect,
) -> Result<CompiledStatement> {
    let mut compiler = Compiler::new(dialect);
    let table = compiler.ident(table)?;

    let sql = match state.operation {
        Operation::Delete => {
            let sql_where = compiler.where_clause(state)?;
            format!("DELETE FROM {table}{sql_where}")
        }
        Operation::Create => {
            if state.data.is_empty() {
                format!("INSERT INTO {table} DEFAULT VALUES")
            } else {
                let mut columns = Vec::with_capacity(state.data.len());
                let mut values = Vec::with_capacity(state.data.len());
                for (column, value) in &state.data {
                    columns.push(compiler.ident(column)?);
                    let value = json_to_sql(value)?;
                    values.push(compiler.bind(value));
                }
                format!(
                    "INSERT INTO {table} ({}) VALUES ({})",
                    columns.join(", "),
                    values.join(", ")
                )
            }
        }
        Operation::Update => {
            if state.data.is_empty() {
                return Err(OrmError::EmptyPayload);
            }
            let mut assignments = Vec::with_capacity(state.data.len());
            for (column, value) in &state.data {
                let column = compiler.ident(column)?;
                let value = json_to_sql(value)?;
                assignments.push(format!("{column} = {}", compiler.bind(value)));
            }
            let sql_where = compiler.where_clause(state)?;
            format!("UPDATE {table} SET {}{sql_where}", assignments.join(", "))
        }
        Operation::Count => {
            let sql_where = compiler.where_clause(state)?;
            let sql_order = compiler.order_clause(state)?;
            let sql_limit = compiler.limit_clause(state);
            format!("SELECT COUNT(*) FROM {table}{sql_where}{sql_order}{sql_limit}")
        }
        Operation::Select => {
            let columns = compiler.select_columns(state)?;
            let sql_where = compiler.where_clause(state)?;
            let sql_order = compiler.order_clause(state)?;
            let sql_limit = compiler.limit_clause(state);
            format!("SELECT {columns} FROM {table}{sql_where}{sql_order}{sql_limit}")
        }
    };

    Ok(CompiledStatement::new(sql, compiler.params))
}

/// Converts a payload value to a bindable scalar.
///
/// Arrays and objects are stored as JSON text.
pub fn json_to_sql(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Int)
            .or_else(|| n.as_f64().map(SqlValue::Float))
            .unwrap_or_else(|| SqlValue::Text(n.to_string())),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(serde_json::to_string(value)?),
    })
}

struct Compiler<'a> {
    dialect: &'a dyn Dialect,
    params: Vec<SqlValue>,
}

impl<'a> Compiler<'a> {
    fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    /// Records a parameter and returns its placeholder.
    fn bind(&mut self, value: SqlValue) -> &'static str {
        self.params.push(value);
        self.dialect.parameter_placeholder()
    }

    fn ident(&self, name: &str) -> Result<String> {
        let name = validate_identifier(name)?;
        Ok(self.dialect.quote_identifier(name))
    }

    fn where_clause(&mut self, state: &QueryState) -> Result<String> {
        let mut sql = String::new();

        for clause in &state.wheres {
            let column = self.ident(&clause.column)?;
            let condition = match (&clause.value, clause.operator) {
                (WhereValue::List(values), Operator::Eq | Operator::In) => {
                    self.set_condition(&column, "IN", values)
                }
                (WhereValue::List(values), Operator::Ne | Operator::NotIn) => {
                    self.set_condition(&column, "NOT IN", values)
                }
                (WhereValue::List(_), operator) => {
                    return Err(OrmError::InvalidOperator(format!(
                        "{operator} cannot compare against a list"
                    )));
                }
                (WhereValue::Scalar(SqlValue::Null), Operator::Eq) => {
                    format!("{column} IS NULL")
                }
                (WhereValue::Scalar(SqlValue::Null), Operator::Ne) => {
                    format!("{column} IS NOT NULL")
                }
                (WhereValue::Scalar(value), Operator::In | Operator::NotIn) => {
                    let placeholder = self.bind(value.clone());
                    format!("{column} {} ({placeholder})", clause.operator)
                }
                (WhereValue::Scalar(value), operator) => {
                    let placeholder = self.bind(value.clone());
                    format!("{column} {operator} {placeholder}")
                }
            };
            sql.push(' ');
            sql.push_str(clause.keyword());
            sql.push(' ');
            sql.push_str(&condition);
        }

        Ok(sql)
    }

    fn set_condition(&mut self, column: &str, keyword: &str, values: &[SqlValue]) -> String {
        if values.is_empty() {
            // `IN ()` is not valid SQL; an empty set matches nothing.
            return if keyword == "IN" {
                String::from("1 = 0")
            } else {
                String::from("1 = 1")
            };
        }
        let placeholders: Vec<&str> = values.iter().map(|v| self.bind(v.clone())).collect();
        format!("{column} {keyword} ({})", placeholders.join(", "))
    }

    fn select_columns(&self, state: &QueryState) -> Result<String> {
        match &state.select {
            Some(columns) if !columns.is_empty() => {
                let quoted = columns
                    .iter()
                    .map(|c| self.ident(c))
                    .collect::<Result<Vec<_>>>()?;
                Ok(quoted.join(", "))
            }
            _ => Ok(String::from("*")),
        }
    }

    fn order_clause(&self, state: &QueryState) -> Result<String> {
        match &state.order_by {
            Some(order) => Ok(format!(
                " ORDER BY {} {}",
                self.ident(&order.column)?,
                order.direction.as_sql()
            )),
            None => Ok(String::new()),
        }
    }

    fn limit_clause(&mut self, state: &QueryState) -> String {
        match state.take {
            Some(take) => {
                let limit = self.bind(SqlValue::Int(i64::try_from(take.limit).unwrap_or(i64::MAX)));
                let offset =
                    self.bind(SqlValue::Int(i64::try_from(take.offset).unwrap_or(i64::MAX)));
                format!(" LIMIT {limit} OFFSET {offset}")
            }
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::clause::{Join, OrderBy, OrderDirection, Take, WhereClause};
    use serde_json::json;
    use tabula_sql::{MySqlDialect, SqliteDialect};

    fn clause(join: Option<Join>, column: &str, operator: Operator, value: WhereValue) -> WhereClause {
        WhereClause {
            join,
            column: column.to_string(),
            operator,
            value,
        }
    }

    fn sqlite(state: &QueryState) -> CompiledStatement {
        compile("posts", state, &SqliteDialect::new()).unwrap()
    }

    #[test]
    fn test_select_all() {
        let stmt = sqlite(&QueryState::default());
        assert_eq!(stmt.sql(), r#"SELECT * FROM "posts""#);
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_select_full_shape() {
        let state = QueryState {
            wheres: vec![
                clause(None, "status", Operator::Eq, "publish".into()),
                clause(Some(Join::Or), "views", Operator::Gt, 10.into()),
            ],
            order_by: Some(OrderBy {
                column: "id".into(),
                direction: OrderDirection::Desc,
            }),
            take: Some(Take {
                limit: 5,
                offset: 10,
            }),
            select: Some(vec!["id".into(), "title".into()]),
            ..QueryState::default()
        };
        let stmt = sqlite(&state);
        assert_eq!(
            stmt.sql(),
            r#"SELECT "id", "title" FROM "posts" WHERE "status" = ? OR "views" > ? ORDER BY "id" DESC LIMIT ? OFFSET ?"#
        );
        assert_eq!(
            stmt.params(),
            &[
                SqlValue::Text("publish".into()),
                SqlValue::Int(10),
                SqlValue::Int(5),
                SqlValue::Int(10),
            ]
        );
    }

    #[test]
    fn test_list_compiles_to_in() {
        let state = QueryState {
            wheres: vec![clause(None, "id", Operator::In, vec![1, 2, 3].into())],
            ..QueryState::default()
        };
        let stmt = sqlite(&state);
        assert_eq!(stmt.sql(), r#"SELECT * FROM "posts" WHERE "id" IN (?, ?, ?)"#);
        assert_eq!(
            stmt.params(),
            &[SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
        );

        let state = QueryState {
            wheres: vec![clause(None, "id", Operator::Eq, vec![4].into())],
            ..QueryState::default()
        };
        assert_eq!(sqlite(&state).sql(), r#"SELECT * FROM "posts" WHERE "id" IN (?)"#);
    }

    #[test]
    fn test_empty_lists() {
        let state = QueryState {
            wheres: vec![
                clause(None, "id", Operator::In, Vec::<i64>::new().into()),
                clause(Some(Join::And), "id", Operator::NotIn, Vec::<i64>::new().into()),
            ],
            ..QueryState::default()
        };
        assert_eq!(
            sqlite(&state).sql(),
            r#"SELECT * FROM "posts" WHERE 1 = 0 AND 1 = 1"#
        );
    }

    #[test]
    fn test_list_with_scalar_operator_is_rejected() {
        let state = QueryState {
            wheres: vec![clause(None, "id", Operator::Gt, vec![1, 2].into())],
            ..QueryState::default()
        };
        let err = compile("posts", &state, &SqliteDialect::new()).unwrap_err();
        assert!(matches!(err, OrmError::InvalidOperator(_)));
    }

    #[test]
    fn test_null_comparisons() {
        let state = QueryState {
            wheres: vec![
                clause(None, "deleted_at", Operator::Eq, None::<i64>.into()),
                clause(Some(Join::And), "parent", Operator::Ne, SqlValue::Null.into()),
            ],
            ..QueryState::default()
        };
        let stmt = sqlite(&state);
        assert_eq!(
            stmt.sql(),
            r#"SELECT * FROM "posts" WHERE "deleted_at" IS NULL AND "parent" IS NOT NULL"#
        );
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_insert_serializes_compound_values() {
        let mut state = QueryState::default();
        state.set_operation(Operation::Create);
        state.data = json!({"title": "Hi", "meta": {"color": "red"}, "tags": [1, 2]})
            .as_object()
            .cloned()
            .unwrap();
        let stmt = sqlite(&state);
        assert_eq!(
            stmt.sql(),
            r#"INSERT INTO "posts" ("title", "meta", "tags") VALUES (?, ?, ?)"#
        );
        assert_eq!(
            stmt.params(),
            &[
                SqlValue::Text("Hi".into()),
                SqlValue::Text(r#"{"color":"red"}"#.into()),
                SqlValue::Text("[1,2]".into()),
            ]
        );
    }

    #[test]
    fn test_insert_without_fields() {
        let mut state = QueryState::default();
        state.set_operation(Operation::Create);
        assert_eq!(sqlite(&state).sql(), r#"INSERT INTO "posts" DEFAULT VALUES"#);
    }

    #[test]
    fn test_update_binds_set_before_where() {
        let mut state = QueryState {
            wheres: vec![clause(None, "id", Operator::Eq, 7.into())],
            select: Some(vec!["id".into()]),
            ..QueryState::default()
        };
        state.set_operation(Operation::Update);
        state.data = json!({"title": "y", "views": 3}).as_object().cloned().unwrap();

        let stmt = sqlite(&state);
        assert_eq!(
            stmt.sql(),
            r#"UPDATE "posts" SET "title" = ?, "views" = ? WHERE "id" = ?"#
        );
        assert_eq!(
            stmt.params(),
            &[SqlValue::Text("y".into()), SqlValue::Int(3), SqlValue::Int(7)]
        );
    }

    #[test]
    fn test_update_without_fields() {
        let mut state = QueryState::default();
        state.set_operation(Operation::Update);
        let err = compile("posts", &state, &SqliteDialect::new()).unwrap_err();
        assert!(matches!(err, OrmError::EmptyPayload));
    }

    #[test]
    fn test_delete_and_count() {
        let mut state = QueryState {
            wheres: vec![clause(None, "id", Operator::In, vec![7].into())],
            ..QueryState::default()
        };
        state.set_operation(Operation::Delete);
        assert_eq!(sqlite(&state).sql(), r#"DELETE FROM "posts" WHERE "id" IN (?)"#);

        state.set_operation(Operation::Count);
        state.take = Some(Take { limit: 1, offset: 0 });
        assert_eq!(
            sqlite(&state).sql(),
            r#"SELECT COUNT(*) FROM "posts" WHERE "id" IN (?) LIMIT ? OFFSET ?"#
        );
    }

    #[test]
    fn test_unsafe_identifiers_are_rejected() {
        let state = QueryState {
            wheres: vec![clause(None, "id = 1 OR 1", Operator::Eq, 1.into())],
            ..QueryState::default()
        };
        let err = compile("posts", &state, &SqliteDialect::new()).unwrap_err();
        assert!(matches!(err, OrmError::UnsafeIdentifier(_)));

        let err = compile("posts; --", &QueryState::default(), &SqliteDialect::new()).unwrap_err();
        assert!(matches!(err, OrmError::UnsafeIdentifier(_)));

        let state = QueryState {
            order_by: Some(OrderBy {
                column: "id DESC, (SELECT 1)".into(),
                direction: OrderDirection::Asc,
            }),
            ..QueryState::default()
        };
        assert!(compile("posts", &state, &SqliteDialect::new()).is_err());
    }

    #[test]
    fn test_mysql_quoting_and_inline() {
        let state = QueryState {
            wheres: vec![clause(None, "name", Operator::Eq, "O'Brien".into())],
            ..QueryState::default()
        };
        let dialect = MySqlDialect::new();
        let stmt = compile("users", &state, &dialect).unwrap();
        assert_eq!(stmt.sql(), "SELECT * FROM `users` WHERE `name` = ?");
        assert_eq!(
            stmt.to_inline_sql(&dialect),
            "SELECT * FROM `users` WHERE `name` = 'O''Brien'"
        );
    }

    #[test]
    fn test_json_to_sql() {
        assert_eq!(json_to_sql(&json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(json_to_sql(&json!(3)).unwrap(), SqlValue::Int(3));
        assert_eq!(json_to_sql(&json!(1.5)).unwrap(), SqlValue::Float(1.5));
        assert_eq!(json_to_sql(&json!("s")).unwrap(), SqlValue::Text("s".into()));
        assert_eq!(json_to_sql(&json!(true)).unwrap(), SqlValue::Bool(true));
        assert_eq!(
            json_to_sql(&json!(["a"])).unwrap(),
            SqlValue::Text(r#"["a"]"#.into())
        );
    }
}
