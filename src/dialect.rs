//! SQL dialect abstraction
//!
//! The only statement shape this crate emits is a single-row positional
//! `INSERT INTO <table> VALUES (...)`, which every supported engine accepts
//! without column lists or identifier quoting. What differs per engine is
//! the parameter placeholder syntax, so that is the whole dialect surface.
//!
//! - PostgreSQL: `$1, $2, ...`
//! - MySQL and SQLite: `?`
//! - SQL Server: `@P1, @P2, ...`

/// SQL dialect for vendor-specific placeholder rendering
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Get the placeholder for a parameter (1-based index)
    fn placeholder(&self, index: usize) -> String;

    /// Render a single-row positional INSERT for `arity` parameters.
    ///
    /// The table name must already be validated by
    /// [`security::validate_sql_identifier`](crate::security::validate_sql_identifier);
    /// identifiers that pass it need no quoting in any supported engine.
    fn insert_sql(&self, table: &str, arity: usize) -> String {
        let placeholders: Vec<String> = (1..=arity).map(|i| self.placeholder(i)).collect();
        format!("INSERT INTO {} VALUES ({});\n", table, placeholders.join(", "))
    }
}

/// PostgreSQL dialect
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

/// MySQL dialect
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
}

/// SQLite dialect
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
}

/// SQL Server dialect
#[derive(Debug, Clone, Default)]
pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "SQL Server"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }
}
