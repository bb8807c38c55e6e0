//! The pieces a [`Query`](super::Query) accumulates before compilation.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use tabula_sql::{SqlValue, ToSqlValue};

use crate::error::OrmError;

/// Comparison operators accepted in where clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// Pattern match (LIKE)
    Like,
    /// Negated pattern match (NOT LIKE)
    NotLike,
    /// Set membership (IN)
    In,
    /// Negated set membership (NOT IN)
    NotIn,
}

impl Operator {
    /// Returns the SQL keyword or symbol.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            "LIKE" => Ok(Self::Like),
            "NOT LIKE" => Ok(Self::NotLike),
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            _ => Err(OrmError::InvalidOperator(s.to_string())),
        }
    }
}

/// The keyword joining a where clause to the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Join {
    /// AND
    #[default]
    And,
    /// OR
    Or,
}

impl Join {
    /// Returns the uppercase SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl FromStr for Join {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(OrmError::InvalidOperator(s.to_string())),
        }
    }
}

/// The right-hand side of a where clause: one scalar or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereValue {
    /// A single value.
    Scalar(SqlValue),
    /// A list of values, compiled to a parenthesized set.
    List(Vec<SqlValue>),
}

macro_rules! scalar_where_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for WhereValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(value.to_sql_value())
                }
            }
        )*
    };
}

scalar_where_value!(SqlValue, bool, i16, i32, i64, u8, u16, u32, f32, f64, String, &str, &String);

impl<T: ToSqlValue> From<Option<T>> for WhereValue {
    fn from(value: Option<T>) -> Self {
        Self::Scalar(value.to_sql_value())
    }
}

impl<T: ToSqlValue> From<Vec<T>> for WhereValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(ToSqlValue::to_sql_value).collect())
    }
}

impl<T: ToSqlValue, const N: usize> From<[T; N]> for WhereValue {
    fn from(values: [T; N]) -> Self {
        Self::List(values.into_iter().map(ToSqlValue::to_sql_value).collect())
    }
}

impl<T: ToSqlValue + Clone> From<&[T]> for WhereValue {
    fn from(values: &[T]) -> Self {
        Self::List(values.iter().cloned().map(ToSqlValue::to_sql_value).collect())
    }
}

/// One accumulated where clause.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// `None` for the first clause, which always renders as `WHERE`.
    pub join: Option<Join>,
    /// Column name, validated at compile time.
    pub column: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Right-hand side.
    pub value: WhereValue,
}

impl WhereClause {
    /// Returns the leading keyword for this clause.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        self.join.map_or("WHERE", Join::as_sql)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Ascending order (ASC)
    #[default]
    Asc,
    /// Descending order (DESC)
    Desc,
}

impl OrderDirection {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Exactly `"ASC"` sorts ascending; any other string sorts descending.
impl From<&str> for OrderDirection {
    fn from(direction: &str) -> Self {
        if direction == "ASC" {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// An ordering specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to order by
    pub column: String,
    /// Order direction
    pub direction: OrderDirection,
}

/// A pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Take {
    /// Maximum number of rows.
    pub limit: u64,
    /// Rows to skip.
    pub offset: u64,
}

/// What the compiled statement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    /// `SELECT cols`
    #[default]
    Select,
    /// `INSERT`
    Create,
    /// `UPDATE`
    Update,
    /// `DELETE`
    Delete,
    /// `SELECT COUNT(*)`
    Count,
}

/// Everything a query has accumulated since its last execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    /// Where clauses in call order.
    pub wheres: Vec<WhereClause>,
    /// At most one ordering; the last call wins.
    pub order_by: Option<OrderBy>,
    /// At most one pagination window; the last call wins.
    pub take: Option<Take>,
    /// Projected columns; `None` selects `*`.
    pub select: Option<Vec<String>>,
    /// Statement kind.
    pub operation: Operation,
    /// Column values for create and update.
    pub data: Map<String, Value>,
}

impl QueryState {
    /// Switches to a write or count mode. Write modes drop any projection.
    pub fn set_operation(&mut self, operation: Operation) {
        if matches!(
            operation,
            Operation::Create | Operation::Update | Operation::Delete
        ) {
            self.select = None;
        }
        self.operation = operation;
    }
}
