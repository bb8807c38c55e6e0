//! MySQL dialect implementation.

use super::Dialect;
use crate::value::SqlValue;

/// MySQL / MariaDB dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn escape(&self, value: &SqlValue) -> String {
        match value {
            // Backslash is an escape character in MySQL string literals.
            SqlValue::Text(s) => {
                let escaped = s.replace('\\', "\\\\").replace('\'', "''");
                format!("'{escaped}'")
            }
            SqlValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
            other => other.to_sql_inline(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_dialect() {
        let dialect = MySqlDialect::new();
        assert_eq!(dialect.name(), "mysql");
        assert_eq!(dialect.quote_identifier("key"), "`key`");
        assert_eq!(dialect.parameter_placeholder(), "?");
    }

    #[test]
    fn test_mysql_escape() {
        let dialect = MySqlDialect::new();
        assert_eq!(
            dialect.escape(&SqlValue::Text(r"a\'b".to_string())),
            r"'a\\''b'"
        );
        assert_eq!(dialect.escape(&SqlValue::Bool(false)), "0");
        assert_eq!(dialect.escape(&SqlValue::Int(3)), "3");
    }
}
