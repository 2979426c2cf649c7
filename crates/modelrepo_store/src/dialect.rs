//! SQL dialect differences for the supported database engines.

use std::fmt;

/// A database engine the repository schema can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQLite, including in-process embedded files.
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// MySQL and compatible servers.
    Mysql,
}

/// Abstract column types used by the repository schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 16-byte object identifier.
    Id,
    /// 32-bit integer (versions, ranks, codes, coordinates).
    Integer,
    /// 64-bit integer (timestamps).
    BigInt,
    /// Unbounded text.
    Text,
    /// Raw bytes (image payloads).
    Blob,
}

impl Dialect {
    /// The SQL type name for an abstract column type.
    #[must_use]
    pub fn column_type(&self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (Dialect::Sqlite, ColumnType::Id) => "BLOB",
            (Dialect::Postgres, ColumnType::Id) => "BYTEA",
            (Dialect::Mysql, ColumnType::Id) => "BINARY(16)",
            (Dialect::Mysql, ColumnType::Integer) => "INT",
            (_, ColumnType::Integer) => "INTEGER",
            (_, ColumnType::BigInt) => "BIGINT",
            (Dialect::Mysql, ColumnType::Text) => "LONGTEXT",
            (_, ColumnType::Text) => "TEXT",
            (Dialect::Sqlite, ColumnType::Blob) => "BLOB",
            (Dialect::Postgres, ColumnType::Blob) => "BYTEA",
            (Dialect::Mysql, ColumnType::Blob) => "LONGBLOB",
        }
    }

    /// Renders an `ALTER TABLE ... ADD COLUMN` statement.
    #[must_use]
    pub fn add_column(&self, table: &str, column: &str, ty: ColumnType) -> String {
        format!(
            "ALTER TABLE {table} ADD COLUMN {column} {}",
            self.column_type(ty)
        )
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_columns_are_binary_everywhere() {
        assert_eq!(Dialect::Sqlite.column_type(ColumnType::Id), "BLOB");
        assert_eq!(Dialect::Postgres.column_type(ColumnType::Id), "BYTEA");
        assert_eq!(Dialect::Mysql.column_type(ColumnType::Id), "BINARY(16)");
    }

    #[test]
    fn add_column_uses_dialect_types() {
        assert_eq!(
            Dialect::Postgres.add_column("views", "container_checksum", ColumnType::Text),
            "ALTER TABLE views ADD COLUMN container_checksum TEXT"
        );
        assert_eq!(
            Dialect::Mysql.add_column("views", "container_checksum", ColumnType::Text),
            "ALTER TABLE views ADD COLUMN container_checksum LONGTEXT"
        );
    }
}
