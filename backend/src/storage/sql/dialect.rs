//! SQL text for each engine
//!
//! Every SQL-backed store uses the same two-column table: the identifier
//! (primary key) and a `data` column holding the whole record as JSON. Only
//! the statement text differs per engine. Table and identifier-column names
//! are developer configuration and are interpolated directly; record values
//! are always bound as parameters.

/// Name of the payload column
pub const DATA_COLUMN: &str = "data";

/// SQL flavor of a storage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    /// MySQL and MariaDB share syntax
    MySql,
    MsSql,
    Oracle,
}

impl Dialect {
    /// Bind placeholder for the 1-based parameter `n`
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite | Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${}", n),
            Dialect::MsSql => format!("@P{}", n),
            Dialect::Oracle => format!(":{}", n),
        }
    }

    /// Statement creating the table when it is missing.
    ///
    /// For Oracle this is a plain `CREATE TABLE`; run it only after
    /// [`Dialect::oracle_table_exists`] reports the table absent.
    pub fn create_table(&self, table: &str, id_field: &str) -> String {
        match self {
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {table} ({id_field} TEXT PRIMARY KEY, {DATA_COLUMN} TEXT NOT NULL)"
            ),
            Dialect::Postgres => format!(
                "CREATE TABLE IF NOT EXISTS {table} ({id_field} TEXT PRIMARY KEY, {DATA_COLUMN} JSONB NOT NULL)"
            ),
            Dialect::MySql => format!(
                "CREATE TABLE IF NOT EXISTS {table} ({id_field} VARCHAR(255) PRIMARY KEY, {DATA_COLUMN} JSON NOT NULL)"
            ),
            Dialect::MsSql => format!(
                "IF NOT EXISTS (SELECT * FROM sysobjects WHERE name='{table}' AND xtype='U') \
                 CREATE TABLE {table} ({id_field} NVARCHAR(255) PRIMARY KEY, {DATA_COLUMN} NVARCHAR(MAX) NOT NULL)"
            ),
            Dialect::Oracle => format!(
                "CREATE TABLE {table} ({id_field} VARCHAR2(255) PRIMARY KEY, {DATA_COLUMN} CLOB NOT NULL)"
            ),
        }
    }

    /// Oracle has no `IF NOT EXISTS`; count matching user tables instead.
    /// Binds the upper-cased table name as `:1`.
    pub fn oracle_table_exists() -> &'static str {
        "SELECT COUNT(*) FROM user_tables WHERE table_name = :1"
    }

    /// Single-statement insert-or-replace keyed by the identifier.
    /// Binds the identifier first and the JSON payload second.
    pub fn upsert(&self, table: &str, id_field: &str) -> String {
        let (p1, p2) = (self.placeholder(1), self.placeholder(2));
        match self {
            Dialect::Sqlite => format!(
                "INSERT OR REPLACE INTO {table} ({id_field}, {DATA_COLUMN}) VALUES ({p1}, {p2})"
            ),
            Dialect::Postgres => format!(
                "INSERT INTO {table} ({id_field}, {DATA_COLUMN}) VALUES ({p1}, {p2}) \
                 ON CONFLICT ({id_field}) DO UPDATE SET {DATA_COLUMN} = EXCLUDED.{DATA_COLUMN}"
            ),
            Dialect::MySql => format!(
                "INSERT INTO {table} ({id_field}, {DATA_COLUMN}) VALUES ({p1}, {p2}) \
                 ON DUPLICATE KEY UPDATE {DATA_COLUMN} = VALUES({DATA_COLUMN})"
            ),
            Dialect::MsSql => format!(
                "MERGE {table} AS t USING (SELECT {p1} AS {id_field}, {p2} AS {DATA_COLUMN}) AS s \
                 ON t.{id_field} = s.{id_field} \
                 WHEN MATCHED THEN UPDATE SET {DATA_COLUMN} = s.{DATA_COLUMN} \
                 WHEN NOT MATCHED THEN INSERT ({id_field}, {DATA_COLUMN}) VALUES (s.{id_field}, s.{DATA_COLUMN});"
            ),
            Dialect::Oracle => format!(
                "MERGE INTO {table} t USING (SELECT {p1} AS {id_field}, {p2} AS {DATA_COLUMN} FROM dual) s \
                 ON (t.{id_field} = s.{id_field}) \
                 WHEN MATCHED THEN UPDATE SET {DATA_COLUMN} = s.{DATA_COLUMN} \
                 WHEN NOT MATCHED THEN INSERT ({id_field}, {DATA_COLUMN}) VALUES (s.{id_field}, s.{DATA_COLUMN})"
            ),
        }
    }

    /// Fetch the payload of one record; binds the identifier
    pub fn select_one(&self, table: &str, id_field: &str) -> String {
        format!(
            "SELECT {DATA_COLUMN} FROM {table} WHERE {id_field} = {}",
            self.placeholder(1)
        )
    }

    /// Fetch every payload, for in-process backups
    pub fn select_all(&self, table: &str) -> String {
        format!("SELECT {DATA_COLUMN} FROM {table}")
    }

    /// Remove one record; binds the identifier
    pub fn delete_one(&self, table: &str, id_field: &str) -> String {
        format!("DELETE FROM {table} WHERE {id_field} = {}", self.placeholder(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Sqlite.placeholder(2), "?");
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::MsSql.placeholder(1), "@P1");
        assert_eq!(Dialect::Oracle.placeholder(1), ":1");
    }

    #[test]
    fn test_sqlite_statements() {
        let d = Dialect::Sqlite;
        assert_eq!(
            d.create_table("records", "id"),
            "CREATE TABLE IF NOT EXISTS records (id TEXT PRIMARY KEY, data TEXT NOT NULL)"
        );
        assert_eq!(
            d.upsert("records", "id"),
            "INSERT OR REPLACE INTO records (id, data) VALUES (?, ?)"
        );
        assert_eq!(d.select_one("records", "id"), "SELECT data FROM records WHERE id = ?");
        assert_eq!(d.delete_one("records", "id"), "DELETE FROM records WHERE id = ?");
    }

    #[test]
    fn test_postgres_upsert_uses_on_conflict() {
        let sql = Dialect::Postgres.upsert("items", "item_id");
        assert!(sql.starts_with("INSERT INTO items (item_id, data) VALUES ($1, $2)"));
        assert!(sql.ends_with("ON CONFLICT (item_id) DO UPDATE SET data = EXCLUDED.data"));
        assert!(Dialect::Postgres.create_table("items", "item_id").contains("JSONB"));
    }

    #[test]
    fn test_mysql_upsert_uses_duplicate_key() {
        let sql = Dialect::MySql.upsert("records", "id");
        assert!(sql.ends_with("ON DUPLICATE KEY UPDATE data = VALUES(data)"));
        assert!(Dialect::MySql.create_table("records", "id").contains("VARCHAR(255) PRIMARY KEY"));
    }

    #[test]
    fn test_merge_dialects() {
        let mssql = Dialect::MsSql.upsert("records", "id");
        assert!(mssql.starts_with("MERGE records AS t USING (SELECT @P1 AS id, @P2 AS data) AS s"));
        assert!(mssql.ends_with(';'));

        let oracle = Dialect::Oracle.upsert("records", "id");
        assert!(oracle.contains("FROM dual"));
        assert!(!oracle.ends_with(';'));
        assert!(Dialect::Oracle.create_table("records", "id").contains("CLOB"));
        assert!(Dialect::MsSql.create_table("records", "id").starts_with("IF NOT EXISTS"));
    }

    #[test]
    fn test_select_all() {
        assert_eq!(Dialect::Postgres.select_all("records"), "SELECT data FROM records");
    }
}
