use anyhow::{bail, Result};

/// Explicit description of where readings live, handed to
/// `ReadingsStore::new` at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingsSchema {
    table: String,
}

impl ReadingsSchema {
    pub const DEFAULT_TABLE: &'static str = "temperature";

    /// Column list shared by every `SELECT` and `RETURNING` clause.
    pub const COLUMNS: &'static str = r#"id, temperature, humidity, location, "timestamp""#;

    /// The table name is interpolated into SQL, so only plain identifiers
    /// (`[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes) are accepted.
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let mut chars = table.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid_start || !valid_rest || table.len() > 63 {
            bail!("invalid table name {table:?}: expected a plain SQL identifier");
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn insert_sql(&self) -> String {
        format!(
            r#"INSERT INTO {} (temperature, humidity, location, "timestamp")
               VALUES ($1, $2, $3, $4)
               RETURNING {}"#,
            self.table,
            Self::COLUMNS
        )
    }

    pub(crate) fn select_by_id_sql(&self) -> String {
        format!("SELECT {} FROM {} WHERE id = $1", Self::COLUMNS, self.table)
    }

    pub(crate) fn latest_per_location_sql(&self) -> String {
        format!(
            r#"SELECT DISTINCT ON (location) {}
               FROM {}
               ORDER BY location ASC NULLS LAST, "timestamp" DESC, id DESC"#,
            Self::COLUMNS,
            self.table
        )
    }
}

impl Default for ReadingsSchema {
    fn default() -> Self {
        Self {
            table: Self::DEFAULT_TABLE.to_owned(),
        }
    }
}
