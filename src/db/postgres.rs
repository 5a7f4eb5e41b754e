use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use sqlx::PgPool;
use tracing::{debug, info};

use super::{
    models::{FieldValue, Row},
    Sink,
};

const SETUP_SQL: &str = include_str!("../../sql/setup.sql");
const RESET_SQL: &str = include_str!("../../sql/reset.sql");

/// Writes each category to its own table, `<schema>.<category lowercased>`.
///
/// A table is created the first time its category is saved in this process;
/// its columns follow the fields of that first row. Later rows only insert
/// their non-null fields, so a field that was null at creation time stays a
/// `TEXT` column.
pub struct PgSink {
    pool: PgPool,
    schema: String,
    created: CreatedTables,
}

/// Tables this process has already issued `CREATE TABLE` for.
///
/// A table is only marked once its DDL succeeded, so a failed create is
/// retried on the next save.
#[derive(Debug, Default)]
struct CreatedTables(HashSet<String>);

impl CreatedTables {
    fn needs_create(&self, table: &str) -> bool {
        !self.0.contains(table)
    }

    fn mark(&mut self, table: &str) {
        self.0.insert(table.to_owned());
    }
}

impl PgSink {
    /// Run the schema scripts (`reset` first if asked) and return a sink
    /// writing into `schema`.
    pub async fn connect(pool: PgPool, schema: &str, reset: bool) -> Result<Self> {
        validate_identifier(schema).context("invalid database schema name")?;

        if reset {
            info!(schema = %schema, "Resetting database schema");
            run_script(&pool, "reset", RESET_SQL, schema).await?;
        }
        run_script(&pool, "setup", SETUP_SQL, schema).await?;
        info!(schema = %schema, "Database ready");

        Ok(Self {
            pool,
            schema: schema.to_owned(),
            created: CreatedTables::default(),
        })
    }
}

impl Sink for PgSink {
    async fn save(&mut self, category: &str, row: &Row) -> Result<()> {
        let table = category.to_ascii_lowercase();
        validate_identifier(&table).context("invalid category")?;
        for name in row.names() {
            validate_identifier(name)
                .with_context(|| format!("invalid column in {category} row"))?;
        }

        if self.created.needs_create(&table) {
            let ddl = create_table_sql(&self.schema, &table, row);
            debug!(sql = %ddl, "Creating category table");
            sqlx::query(&ddl)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to create table for {category}"))?;
            self.created.mark(&table);
        }

        let sql = insert_sql(&self.schema, &table, row);
        let mut query = sqlx::query(&sql);
        for (_, value) in row.fields() {
            query = match value {
                FieldValue::Null => query,
                FieldValue::Bool(b) => query.bind(*b),
                FieldValue::Integer(i) => query.bind(*i),
                FieldValue::Float(x) => query.bind(*x),
                FieldValue::Text(s) => query.bind(s.clone()),
            };
        }

        query
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to insert {category} row"))?;
        Ok(())
    }
}

async fn run_script(pool: &PgPool, name: &str, template: &str, schema: &str) -> Result<()> {
    for statement in render_script(template, schema)? {
        debug!(script = %name, sql = %statement, "Executing schema statement");
        sqlx::raw_sql(&statement)
            .execute(pool)
            .await
            .with_context(|| format!("{name} script failed at: {statement}"))?;
    }
    Ok(())
}

/// Substitute `{schema_name}` and split into statements on `;`.
///
/// `--` comment lines are dropped before splitting.
pub fn render_script(template: &str, schema: &str) -> Result<Vec<String>> {
    validate_identifier(schema)?;

    let rendered = template
        .lines()
        .filter(|l| !l.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .replace("{schema_name}", &quote(schema));

    Ok(rendered
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Plain SQL identifier: ASCII letter or `_`, then letters, digits or `_`,
/// at most 63 bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start
        || name.len() > 63
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        bail!("not a valid SQL identifier: {name:?}");
    }
    Ok(())
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

fn create_table_sql(schema: &str, table: &str, row: &Row) -> String {
    let mut columns = vec![
        "id BIGSERIAL PRIMARY KEY".to_owned(),
        "recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()".to_owned(),
    ];
    columns.extend(
        row.fields()
            .iter()
            .map(|(name, value)| format!("{} {}", quote(name), value.sql_type())),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} ({})",
        quote(schema),
        quote(table),
        columns.join(", ")
    )
}

fn insert_sql(schema: &str, table: &str, row: &Row) -> String {
    let names: Vec<_> = row
        .fields()
        .iter()
        .filter(|(_, v)| !matches!(v, FieldValue::Null))
        .map(|(n, _)| quote(n))
        .collect();

    if names.is_empty() {
        return format!("INSERT INTO {}.{} DEFAULT VALUES", quote(schema), quote(table));
    }

    let params: Vec<_> = (1..=names.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {}.{} ({}) VALUES ({})",
        quote(schema),
        quote(table),
        names.join(", "),
        params.join(", ")
    )
}
