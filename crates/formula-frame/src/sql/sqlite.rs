use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use formula_vector::{parse_date, DataType, Value, Vector, DEFAULT_DATE_FORMATS};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};

use super::Dialect;
use crate::{FrameError, FrameResult};

/// [`Dialect`] over a SQLite connection.
///
/// Dates are stored as `YYYY-MM-DD` text. `pow`, `exp`, `ln` and `sqrt` are registered as
/// scalar functions on open so they work regardless of how SQLite was compiled; `ln` and `sqrt`
/// return `NULL` outside their domain, which surfaces as an error when values are fetched.
#[derive(Debug)]
pub struct SqliteDialect {
    conn: Mutex<Connection>,
}

impl SqliteDialect {
    pub fn new(conn: Connection) -> FrameResult<Self> {
        register_functions(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> FrameResult<Self> {
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> FrameResult<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Run raw statements, e.g. to seed tables.
    pub fn execute_batch(&self, sql: &str) -> FrameResult<()> {
        log::trace!("sqlite: {sql}");
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn conn(&self) -> FrameResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FrameError::Database("sqlite connection lock poisoned".to_string()))
    }

    fn execute(&self, sql: &str) -> FrameResult<()> {
        log::trace!("sqlite: {sql}");
        self.conn()?.execute(sql, [])?;
        Ok(())
    }
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_scalar_function("pow", 2, flags, |ctx| {
        let base: f64 = ctx.get(0)?;
        let exponent: f64 = ctx.get(1)?;
        Ok(base.powf(exponent))
    })?;
    conn.create_scalar_function("exp", 1, flags, |ctx| Ok(ctx.get::<f64>(0)?.exp()))?;
    conn.create_scalar_function("ln", 1, flags, |ctx| {
        let x: f64 = ctx.get(0)?;
        Ok((x > 0.0).then(|| x.ln()))
    })?;
    conn.create_scalar_function("sqrt", 1, flags, |ctx| {
        let x: f64 = ctx.get(0)?;
        Ok((x >= 0.0).then(|| x.sqrt()))
    })?;
    Ok(())
}

fn declared_type(decl: &str) -> Option<DataType> {
    let decl = decl.to_ascii_uppercase();
    if decl.contains("DATE") {
        Some(DataType::Date)
    } else if decl.contains("INT") {
        Some(DataType::Integer)
    } else if ["REAL", "FLOA", "DOUB", "NUMERIC"]
        .iter()
        .any(|t| decl.contains(t))
    {
        Some(DataType::Float)
    } else if ["TEXT", "CHAR", "CLOB"].iter().any(|t| decl.contains(t)) {
        Some(DataType::String)
    } else {
        None
    }
}

fn sniffed_type(value: ValueRef<'_>) -> DataType {
    match value {
        ValueRef::Integer(_) => DataType::Integer,
        ValueRef::Real(_) => DataType::Float,
        ValueRef::Null | ValueRef::Text(_) | ValueRef::Blob(_) => DataType::String,
    }
}

fn read_value(value: ValueRef<'_>, data_type: DataType) -> Result<Value, String> {
    Ok(match (value, data_type.storage()) {
        (ValueRef::Null, _) => return Err("unexpected NULL".to_string()),
        (ValueRef::Integer(v), DataType::Integer) => Value::Integer(v),
        (ValueRef::Integer(v), DataType::Float) => Value::Float(v as f64),
        (ValueRef::Real(v), DataType::Float) => Value::Float(v),
        (ValueRef::Text(bytes), DataType::String) => {
            Value::String(std::str::from_utf8(bytes).map_err(|e| e.to_string())?.to_string())
        }
        (ValueRef::Text(bytes), DataType::Date) => {
            let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
            Value::Date(
                parse_date(text, DEFAULT_DATE_FORMATS)
                    .ok_or_else(|| format!("{text:?} is not a date"))?,
            )
        }
        (other, expected) => {
            return Err(format!("cannot read {:?} as {expected}", other.data_type()))
        }
    })
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn type_name(&self, data_type: DataType) -> FrameResult<&'static str> {
        Ok(match data_type {
            DataType::Integer | DataType::Categorical => "INTEGER",
            DataType::Float => "REAL",
            DataType::String => "TEXT",
            DataType::Date => "DATE",
            other => return Err(self.unsupported(&format!("{other} columns"))),
        })
    }

    fn cast_field(&self, expr: &str, from: DataType, to: DataType) -> FrameResult<String> {
        use DataType::{Date, Float, Integer, String};

        Ok(match (from.storage(), to.storage()) {
            (from, to) if from == to => expr.to_string(),
            (Integer | String, Float) => format!("CAST({expr} AS REAL)"),
            (Float | String, Integer) => format!("CAST({expr} AS INTEGER)"),
            (Integer | Float, String) => format!("CAST({expr} AS TEXT)"),
            (Date, String) => expr.to_string(),
            (String, Date) => format!("date({expr})"),
            (Date, Integer) => format!("CAST(strftime('%Y%m%d', {expr}) AS INTEGER)"),
            (Date, Float) => format!("CAST(strftime('%Y%m%d', {expr}) AS REAL)"),
            (Integer | Float, Date) => {
                let ymd = format!("CAST({expr} AS INTEGER)");
                format!("printf('%04d-%02d-%02d', {ymd} / 10000, ({ymd} / 100) % 100, {ymd} % 100)")
            }
            (from, to) => return Err(self.unsupported(&format!("casts from {from} to {to}"))),
        })
    }

    fn quantile(&self, _expr: &str, _level: f64) -> FrameResult<String> {
        Err(self.unsupported("quantile"))
    }

    fn same(&self, left: &str, right: &str) -> String {
        format!("({left} IS {right})")
    }

    fn row_count(&self, query: &str) -> FrameResult<usize> {
        let sql = format!("SELECT count(*) FROM ({query})");
        log::trace!("sqlite: {sql}");
        let count: i64 = self.conn()?.query_row(&sql, [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| FrameError::Database(format!("bad row count {count}")))
    }

    fn types(&self, query: &str) -> FrameResult<Vec<(String, DataType)>> {
        log::trace!("sqlite: {query}");
        let conn = self.conn()?;
        let mut stmt = conn.prepare(query)?;
        let declared: Vec<(String, Option<DataType>)> = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.decl_type().and_then(declared_type)))
            .collect();
        if declared.iter().all(|(_, t)| t.is_some()) {
            return Ok(declared
                .into_iter()
                .filter_map(|(name, t)| t.map(|t| (name, t)))
                .collect());
        }

        // Expression columns have no declared type; look at the first row instead.
        let mut rows = stmt.query([])?;
        let first = rows.next()?;
        let mut out = Vec::with_capacity(declared.len());
        for (idx, (name, declared)) in declared.into_iter().enumerate() {
            let data_type = match (declared, first) {
                (Some(t), _) => t,
                (None, Some(row)) => sniffed_type(row.get_ref(idx)?),
                (None, None) => DataType::String,
            };
            out.push((name, data_type));
        }
        Ok(out)
    }

    fn fetch(&self, query: &str, types: &[DataType]) -> FrameResult<Vec<Vector>> {
        log::trace!("sqlite: {query}");
        let conn = self.conn()?;
        let mut stmt = conn.prepare(query)?;
        if stmt.column_count() != types.len() {
            return Err(FrameError::Database(format!(
                "query returns {} columns, expected {}",
                stmt.column_count(),
                types.len()
            )));
        }
        let mut out = types
            .iter()
            .map(|t| Vector::empty(*t))
            .collect::<Result<Vec<_>, _>>()?;
        let mut rows = stmt.query([])?;
        let mut row_idx = 0;
        while let Some(row) = rows.next()? {
            for (idx, (vector, data_type)) in out.iter_mut().zip(types).enumerate() {
                let value = read_value(row.get_ref(idx)?, *data_type).map_err(|message| {
                    FrameError::Database(format!("row {row_idx}, column {idx}: {message}"))
                })?;
                vector.push(value)?;
            }
            row_idx += 1;
        }
        Ok(out)
    }

    fn exists(&self, table: &str) -> FrameResult<bool> {
        let count: i64 = self.conn()?.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn create(
        &self,
        table: &str,
        fields: &[(String, DataType)],
        overwrite: bool,
    ) -> FrameResult<()> {
        if self.exists(table)? {
            if !overwrite {
                return Err(FrameError::Database(format!("table {table} already exists")));
            }
            self.drop_table(table)?;
        }
        let columns = fields
            .iter()
            .map(|(name, t)| Ok(format!("{} {}", self.quote_ident(name), self.type_name(*t)?)))
            .collect::<FrameResult<Vec<_>>>()?;
        self.execute(&format!(
            "CREATE TABLE {} ({})",
            self.quote_ident(table),
            columns.join(", ")
        ))
    }

    fn drop_table(&self, table: &str) -> FrameResult<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {}", self.quote_ident(table)))
    }

    fn insert(&self, table: &str, query: &str, fields: &[String]) -> FrameResult<()> {
        let columns = fields
            .iter()
            .map(|f| self.quote_ident(f))
            .collect::<Vec<_>>()
            .join(", ");
        self.execute(&format!(
            "INSERT INTO {} ({columns}) {query}",
            self.quote_ident(table)
        ))
    }
}
