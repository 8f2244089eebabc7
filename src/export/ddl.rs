//! DDL export
//!
//! Writes `ddl:table` nodes as CREATE TABLE statements and `ddl:statement`
//! nodes verbatim. All identifiers are quoted and escaped.

use super::{ExportError, Exporter};
use crate::import::ddl::{
    COLUMN_TYPE, DATA_TYPE, DEFAULT, NULLABLE, PRIMARY_KEY, SCHEMA, SQL, STATEMENT_TYPE, TABLE_TYPE,
    UNIQUE,
};
use crate::models::{Model, ModelObject, PropertyValue};
use crate::storage::Session;
use std::io::Write;

/// DDL Exporter - writes CREATE TABLE statements
#[derive(Debug, Clone)]
pub struct DdlExporter {
    /// SQL dialect used for identifier quoting
    pub dialect: String,
}

impl Default for DdlExporter {
    fn default() -> Self {
        Self {
            dialect: "standard".to_string(),
        }
    }
}

impl DdlExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exporter quoting identifiers for the given dialect
    pub fn with_dialect(dialect: &str) -> Self {
        Self {
            dialect: dialect.to_string(),
        }
    }

    /// Render one table node as a CREATE TABLE statement
    pub fn export_table(&self, table: &ModelObject) -> String {
        let mut name = String::new();
        if let Some(schema) = table.property(SCHEMA).and_then(PropertyValue::as_str) {
            for part in schema.split('.') {
                name.push_str(&self.quote_identifier(part));
                name.push('.');
            }
        }
        name.push_str(&self.quote_identifier(&table.name));

        let flag = |column: &ModelObject, key: &str| {
            column.property(key).and_then(PropertyValue::as_bool)
        };
        let mut column_defs = Vec::new();
        for column in table.children.iter().filter(|c| c.primary_type == COLUMN_TYPE) {
            let mut col_def = format!("  {}", self.quote_identifier(&column.name));
            if let Some(data_type) = column.property(DATA_TYPE) {
                col_def.push(' ');
                col_def.push_str(&data_type.to_string());
            }
            if let Some(default) = column.property(DEFAULT) {
                col_def.push_str(&format!(" DEFAULT {}", default));
            }
            if flag(column, NULLABLE) == Some(false) {
                col_def.push_str(" NOT NULL");
            }
            if flag(column, PRIMARY_KEY) == Some(true) {
                col_def.push_str(" PRIMARY KEY");
            } else if flag(column, UNIQUE) == Some(true) {
                col_def.push_str(" UNIQUE");
            }
            column_defs.push(col_def);
        }

        format!("CREATE TABLE {} (\n{}\n);\n", name, column_defs.join(",\n"))
    }

    /// Quote an identifier for the configured dialect, doubling embedded quotes
    fn quote_identifier(&self, identifier: &str) -> String {
        match self.dialect.as_str() {
            "mysql" => format!("`{}`", identifier.replace('`', "``")),
            "sqlserver" | "mssql" => format!("[{}]", identifier.replace(']', "]]")),
            _ => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }
}

impl Exporter for DdlExporter {
    fn name(&self) -> &str {
        "ddl"
    }

    fn metamodel_id(&self) -> &str {
        "ddl"
    }

    fn supports(&self, mime_type: &str) -> bool {
        matches!(mime_type, "application/sql" | "text/x-sql")
    }

    fn execute(
        &self,
        session: &Session<'_>,
        model: &Model,
        out: &mut dyn Write,
    ) -> Result<(), ExportError> {
        let mut sql = String::new();
        for object in model.content(session)? {
            match object.primary_type.as_str() {
                TABLE_TYPE => sql.push_str(&self.export_table(&object)),
                STATEMENT_TYPE => {
                    let statement = object.property(SQL).ok_or_else(|| {
                        ExportError::SerializationError(format!(
                            "statement node {} has no {}",
                            object.id, SQL
                        ))
                    })?;
                    sql.push_str(&format!("{};\n", statement));
                }
                other => {
                    return Err(ExportError::SerializationError(format!(
                        "unexpected {} node '{}'",
                        other, object.name
                    )));
                }
            }
        }
        out.write_all(sql.as_bytes())?;
        Ok(())
    }
}
