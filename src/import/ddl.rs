//! DDL import
//!
//! Parses SQL scripts with `sqlparser` (generic dialect). Each CREATE TABLE
//! becomes a `ddl:table` node with one `ddl:column` child per column; other
//! statements are kept verbatim as `ddl:statement` nodes so the script can be
//! written back in order.

use super::{ImportError, Importer, decode_utf8};
use crate::registry::ArtifactProbe;
use crate::storage::{NodeId, Session};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::{ColumnDef, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::{debug, trace};

pub const TABLE_TYPE: &str = "ddl:table";
pub const COLUMN_TYPE: &str = "ddl:column";
pub const STATEMENT_TYPE: &str = "ddl:statement";
pub const SCHEMA: &str = "ddl:schema";
pub const DATA_TYPE: &str = "ddl:dataType";
pub const NULLABLE: &str = "ddl:nullable";
pub const PRIMARY_KEY: &str = "ddl:primaryKey";
pub const UNIQUE: &str = "ddl:unique";
pub const DEFAULT: &str = "ddl:default";
pub const SQL: &str = "ddl:sql";

static PRIMARY_KEY_CONSTRAINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:CONSTRAINT\s+\S+\s+)?PRIMARY\s+KEY\s*(?:\S+\s*)?\(([^)]*)\)")
        .expect("valid primary key pattern")
});

/// DDL Importer - parses CREATE TABLE statements
#[derive(Debug, Default, Clone, Copy)]
pub struct DdlImporter;

impl DdlImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Importer for DdlImporter {
    fn name(&self) -> &str {
        "ddl"
    }

    fn applicable(&self, probe: &ArtifactProbe) -> bool {
        probe.looks_like_sql() || probe.has_extension("ddl")
    }

    fn import_into(
        &self,
        content: &[u8],
        session: &mut Session<'_>,
        target: NodeId,
    ) -> Result<(), ImportError> {
        let sql = decode_utf8(content)?;
        let dialect = GenericDialect {};
        let statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| ImportError::Parse(format!("SQL parsing failed: {}", e)))?;
        if statements.is_empty() {
            return Err(ImportError::Parse("script contains no statements".to_string()));
        }

        let mut tables = 0usize;
        for statement in &statements {
            match statement {
                Statement::CreateTable(create) => {
                    let (schema, name) = split_object_name(&create.name.to_string());
                    let table = session.add_child(target, &name, TABLE_TYPE)?;
                    if let Some(schema) = schema {
                        session.set_property(table, SCHEMA, schema)?;
                    }

                    let mut key_columns = Vec::new();
                    for constraint in &create.constraints {
                        let text = constraint.to_string();
                        if let Some(captures) = PRIMARY_KEY_CONSTRAINT.captures(&text) {
                            key_columns.extend(
                                captures[1]
                                    .split(',')
                                    .map(|c| unquote(c.trim()).to_string()),
                            );
                        } else {
                            trace!(constraint = %text, "Ignoring table constraint");
                        }
                    }

                    for column in &create.columns {
                        import_column(session, table, column, &key_columns)?;
                    }
                    tables += 1;
                }
                other => {
                    let node = session.add_child(target, STATEMENT_TYPE, STATEMENT_TYPE)?;
                    session.set_property(node, SQL, other.to_string())?;
                }
            }
        }

        debug!(statements = statements.len(), tables, "Imported DDL script");
        Ok(())
    }
}

fn import_column(
    session: &mut Session<'_>,
    table: NodeId,
    column: &ColumnDef,
    key_columns: &[String],
) -> Result<(), ImportError> {
    let name = column.name.value.clone();
    let mut nullable = true;
    let mut primary_key = key_columns.iter().any(|k| k.eq_ignore_ascii_case(&name));
    let mut unique = false;
    let mut default = None;

    for option in &column.options {
        let text = option.option.to_string();
        let upper = text.to_ascii_uppercase();
        if upper == "NOT NULL" {
            nullable = false;
        } else if upper == "NULL" {
            nullable = true;
        } else if upper.starts_with("PRIMARY KEY") {
            primary_key = true;
        } else if upper.starts_with("UNIQUE") {
            unique = true;
        } else if upper.starts_with("DEFAULT ") {
            default = Some(text["DEFAULT ".len()..].to_string());
        } else {
            trace!(column = %name, option = %text, "Ignoring column option");
        }
    }

    let node = session.add_child(table, &name, COLUMN_TYPE)?;
    session.set_property(node, DATA_TYPE, column.data_type.to_string())?;
    session.set_property(node, NULLABLE, nullable)?;
    session.set_property(node, PRIMARY_KEY, primary_key)?;
    if unique {
        session.set_property(node, UNIQUE, true)?;
    }
    if let Some(default) = default {
        session.set_property(node, DEFAULT, default)?;
    }
    Ok(())
}

/// Split `schema.table` into its schema part and the bare table name
fn split_object_name(name: &str) -> (Option<String>, String) {
    let parts: Vec<&str> = name.split('.').map(unquote).collect();
    match parts.split_last() {
        Some((table, schema)) if !schema.is_empty() => (Some(schema.join(".")), table.to_string()),
        Some((table, _)) => (None, table.to_string()),
        None => (None, name.to_string()),
    }
}

fn unquote(identifier: &str) -> &str {
    let bytes = identifier.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"')
            || (first == b'`' && last == b'`')
            || (first == b'[' && last == b']')
        {
            return &identifier[1..identifier.len() - 1];
        }
    }
    identifier
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelObject;
    use crate::models::value::PropertyValue;
    use crate::storage::{MemoryTreeStore, TreeStore};

    fn import(sql: &str) -> Result<ModelObject, ImportError> {
        let store = MemoryTreeStore::new();
        let mut session = store.open_session()?;
        let root = session.root();
        let target = session.add_child(root, "schema.sql", "mm:model")?;
        DdlImporter::new().import_into(sql.as_bytes(), &mut session, target)?;
        Ok(ModelObject::load(&session, target)?)
    }

    #[test]
    fn test_create_table_columns() {
        let model = import(
            "CREATE TABLE sales.orders (
                id INT NOT NULL,
                customer VARCHAR(40) UNIQUE,
                status VARCHAR(10) DEFAULT 'new',
                CONSTRAINT pk_orders PRIMARY KEY (id)
            );",
        )
        .unwrap();

        let table = &model.children()[0];
        assert_eq!(table.name, "orders");
        assert_eq!(table.primary_type, TABLE_TYPE);
        assert_eq!(table.property(SCHEMA), Some(&PropertyValue::from("sales")));

        let id = table.child("id", 1).unwrap();
        assert_eq!(id.property(NULLABLE), Some(&PropertyValue::Boolean(false)));
        assert_eq!(id.property(PRIMARY_KEY), Some(&PropertyValue::Boolean(true)));
        assert_eq!(id.property(DATA_TYPE), Some(&PropertyValue::from("INT")));

        let customer = table.child("customer", 1).unwrap();
        assert_eq!(customer.property(UNIQUE), Some(&PropertyValue::Boolean(true)));
        assert_eq!(customer.property(PRIMARY_KEY), Some(&PropertyValue::Boolean(false)));

        let status = table.child("status", 1).unwrap();
        assert_eq!(status.property(DEFAULT), Some(&PropertyValue::from("'new'")));
    }

    #[test]
    fn test_other_statements_are_kept() {
        let model = import("CREATE TABLE a (id INT); DROP TABLE b;").unwrap();
        let names: Vec<&str> = model.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", STATEMENT_TYPE]);
        assert!(
            model.children()[1]
                .property(SQL)
                .and_then(PropertyValue::as_str)
                .is_some_and(|s| s.starts_with("DROP TABLE"))
        );
    }

    #[test]
    fn test_malformed_sql_fails() {
        assert!(matches!(import("CREATE TABLE (;"), Err(ImportError::Parse(_))));
        assert!(matches!(import("   "), Err(ImportError::Parse(_))));
    }

    #[test]
    fn test_split_object_name() {
        assert_eq!(split_object_name("\"users\""), (None, "users".to_string()));
        assert_eq!(
            split_object_name("db.sales.orders"),
            (Some("db.sales".to_string()), "orders".to_string())
        );
    }
}
