//! Table DDL reconstruction
//!
//! Rebuilds a `CREATE TABLE` script from catalog metadata: columns, then
//! the primary key, outgoing foreign keys, secondary indexes and comments.
//! Every identifier is validated and quoted; comment text is emitted as a
//! string literal.
//!
//! DB2 and PostgreSQL get constraints as `ALTER TABLE` statements. SQLite
//! cannot add constraints after the fact, so there they are written inline
//! as table constraints.

use crate::catalog::names;
use crate::context::table::{fetch_columns, fetch_indexes, fetch_relationships, table_params};
use crate::db::Provider;
use crate::error::{ContextError, Result};
use crate::metadata::{
    ColumnMetadata, IndexInfo, MetadataProvider, ObjectIdentifier, RelationshipEdge, UniqueRule,
};
use crate::sql::ident::quote_literal;
use crate::sql::{qualified_name, quote_identifier};

/// Generates DDL scripts from catalog metadata
#[derive(Clone)]
pub struct DdlGenerator {
    metadata: MetadataProvider,
}

/// Table attributes the script needs beyond columns and keys
#[derive(Debug, Default)]
struct TableAttributes {
    tablespace: Option<String>,
    data_capture: Option<String>,
    remarks: Option<String>,
}

/// Primary key name and columns in key order
#[derive(Debug)]
struct PrimaryKey {
    name: String,
    columns: Vec<String>,
}

impl DdlGenerator {
    pub fn new(metadata: MetadataProvider) -> Self {
        Self { metadata }
    }

    /// DDL script for one table
    ///
    /// # Errors
    /// `ObjectNotFound` when the table has no columns; `InvalidIdentifier`
    /// when a catalog name cannot be quoted.
    pub async fn generate_table_ddl(&self, schema: &str, table: &str) -> Result<String> {
        let target = ObjectIdentifier::new(schema, table);
        let columns = fetch_columns(&self.metadata, &target).await?;
        if columns.is_empty() {
            return Err(ContextError::ObjectNotFound(format!("table {}", target)));
        }

        let meta = self
            .metadata
            .execute_metadata_query(names::GET_TABLE_METADATA, &table_params(&target))
            .await?;
        let attributes = meta
            .first()
            .map(|row| TableAttributes {
                tablespace: row.text("TBSPACE"),
                data_capture: row.text("DATACAPTURE"),
                remarks: row.text("REMARKS"),
            })
            .unwrap_or_default();

        let pk_rows = self
            .metadata
            .execute_metadata_query(names::GET_TABLE_PRIMARY_KEY, &table_params(&target))
            .await?;
        let primary_key = pk_rows.first().and_then(|first| {
            Some(PrimaryKey {
                name: first.text("CONSTNAME")?,
                columns: pk_rows.iter().filter_map(|r| r.text("COLNAME")).collect(),
            })
        });

        let foreign_keys: Vec<RelationshipEdge> = fetch_relationships(&self.metadata, &target)
            .await?
            .into_iter()
            .filter(|e| e.from == target)
            .collect();
        let indexes = fetch_indexes(&self.metadata, &target).await?;

        let script = TableScript {
            provider: self.metadata.provider(),
            table: &target,
            columns: &columns,
            attributes: &attributes,
            primary_key: primary_key.as_ref(),
            foreign_keys: &foreign_keys,
            indexes: &indexes,
        }
        .render()?;

        tracing::info!(
            table = %target,
            columns = columns.len(),
            foreign_keys = foreign_keys.len(),
            indexes = indexes.len(),
            "table DDL generated"
        );
        Ok(script)
    }
}

/// Everything needed to print one table's script
struct TableScript<'a> {
    provider: Provider,
    table: &'a ObjectIdentifier,
    columns: &'a [ColumnMetadata],
    attributes: &'a TableAttributes,
    primary_key: Option<&'a PrimaryKey>,
    foreign_keys: &'a [RelationshipEdge],
    indexes: &'a [IndexInfo],
}

impl TableScript<'_> {
    fn render(&self) -> Result<String> {
        let table = qualified_name(&self.table.schema, &self.table.name)?;
        let inline_constraints = self.provider == Provider::Sqlite;

        let mut body: Vec<String> = self
            .columns
            .iter()
            .map(|c| self.column_clause(c))
            .collect::<Result<_>>()?;
        if inline_constraints {
            if let Some(pk) = self.primary_key {
                body.push(format!("PRIMARY KEY ({})", quote_list(&pk.columns)?));
            }
            for fk in self.foreign_keys {
                body.push(self.foreign_key_clause(fk)?);
            }
        }

        let mut out = format!("CREATE TABLE {} (\n    {}\n)", table, body.join(",\n    "));
        if self.provider == Provider::Db2 {
            if let Some(ts) = &self.attributes.tablespace {
                out.push_str(&format!("\nIN {}", quote_identifier(ts)?));
            }
            if matches!(self.attributes.data_capture.as_deref(), Some("Y" | "L")) {
                out.push_str("\nDATA CAPTURE CHANGES");
            }
        }
        out.push_str(";\n");

        if !inline_constraints {
            if let Some(pk) = self.primary_key {
                out.push_str(&format!(
                    "\nALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({});\n",
                    table,
                    quote_identifier(&pk.name)?,
                    quote_list(&pk.columns)?
                ));
            }
            for fk in self.foreign_keys {
                out.push_str(&format!(
                    "\nALTER TABLE {} ADD {};\n",
                    table,
                    self.foreign_key_clause(fk)?
                ));
            }
        }

        for index in self.indexes {
            if let Some(stmt) = self.index_statement(index)? {
                out.push('\n');
                out.push_str(&stmt);
            }
        }

        if self.provider != Provider::Sqlite {
            out.push_str(&self.comments(&table)?);
        }
        Ok(out)
    }

    fn column_clause(&self, column: &ColumnMetadata) -> Result<String> {
        let mut clause = format!("{} {}", quote_identifier(&column.name)?, column.display_type());
        if !column.nullable {
            clause.push_str(" NOT NULL");
        }
        if column.identity && self.provider != Provider::Sqlite {
            clause.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        } else if let Some(default) = &column.default {
            match self.provider {
                Provider::Db2 => clause.push_str(&format!(" WITH DEFAULT {}", default)),
                Provider::Postgresql | Provider::Sqlite => {
                    clause.push_str(&format!(" DEFAULT {}", default))
                }
            }
        }
        Ok(clause)
    }

    fn foreign_key_clause(&self, fk: &RelationshipEdge) -> Result<String> {
        let parent = if self.provider == Provider::Sqlite {
            quote_identifier(&fk.to.name)?
        } else {
            qualified_name(&fk.to.schema, &fk.to.name)?
        };
        let mut clause = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}",
            quote_identifier(&fk.constraint_name)?,
            quote_list(&fk.from_columns)?,
            parent
        );
        // no column list means the parent's primary key
        if !fk.to_columns.is_empty() {
            clause.push_str(&format!(" ({})", quote_list(&fk.to_columns)?));
        }
        if let Some(rule) = &fk.delete_rule {
            clause.push_str(&format!(" ON DELETE {}", rule));
        }
        Ok(clause)
    }

    /// `CREATE [UNIQUE] INDEX`; primary key indexes come with the constraint
    fn index_statement(&self, index: &IndexInfo) -> Result<Option<String>> {
        if index.unique_rule == UniqueRule::Primary
            || index.columns.is_empty()
            || index.name.starts_with("sqlite_autoindex_")
        {
            return Ok(None);
        }
        let unique = if index.unique_rule == UniqueRule::Unique {
            "UNIQUE "
        } else {
            ""
        };
        let schema = index.schema.as_deref().unwrap_or(&self.table.schema);
        let on = if self.provider == Provider::Sqlite {
            quote_identifier(&self.table.name)?
        } else {
            qualified_name(&self.table.schema, &self.table.name)?
        };
        let name = if self.provider == Provider::Postgresql {
            // index names are schema-implied in PostgreSQL
            quote_identifier(&index.name)?
        } else {
            qualified_name(schema, &index.name)?
        };
        let columns = index
            .columns
            .iter()
            .map(|c| {
                let quoted = quote_identifier(&c.name)?;
                Ok(if c.descending {
                    format!("{} DESC", quoted)
                } else {
                    quoted
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(format!(
            "CREATE {}INDEX {} ON {} ({});\n",
            unique,
            name,
            on,
            columns.join(", ")
        )))
    }

    fn comments(&self, table: &str) -> Result<String> {
        let mut out = String::new();
        if let Some(remarks) = &self.attributes.remarks {
            out.push_str(&format!(
                "\nCOMMENT ON TABLE {} IS {};\n",
                table,
                quote_literal(remarks)
            ));
        }
        for column in self.columns {
            if let Some(remarks) = &column.remarks {
                out.push_str(&format!(
                    "COMMENT ON COLUMN {}.{} IS {};\n",
                    table,
                    quote_identifier(&column.name)?,
                    quote_literal(remarks)
                ));
            }
        }
        Ok(out)
    }
}

fn quote_list(names: &[String]) -> Result<String> {
    Ok(names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Result<Vec<_>>>()?
        .join(", "))
}
