//! SQL-compiling backend.
//!
//! A [`SqlColumn`] is a SQL fragment over one source query. Operations only compose text; the
//! database sees a statement when a row count, values, or a materialized frame are requested.
//! Every statement has the shape `WITH <alias> AS (<source>) SELECT ... FROM <alias>`. Sorting
//! and grouping wrap the current statement as the source of a new, deeper alias.
use std::collections::HashMap;
use std::sync::Arc;

use formula_vector::{CategoryMap, DataType, Value, Vector, VectorError, OTHER_CODE};

use crate::eval::Evaluator;
use crate::ops::{self, Resolved};
use crate::parser::Expr;
use crate::{Column, Frame, FrameError, FrameOptions, FrameResult, MemColumn, MemFrame, Scope};

mod dialect;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use dialect::{Dialect, Select};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDialect;

#[derive(Debug)]
struct SqlSource {
    dialect: Arc<dyn Dialect>,
    query: String,
    alias: String,
    depth: usize,
    /// Ordering of this source's rows, in terms of its own output columns.
    order_by: Option<String>,
    options: FrameOptions,
}

impl SqlSource {
    fn select(&self, fields: &[String], group_by: &[String]) -> String {
        self.dialect.select(&Select {
            alias: &self.alias,
            source: &self.query,
            fields,
            group_by,
            order_by: if group_by.is_empty() {
                self.order_by.as_deref()
            } else {
                None
            },
        })
    }

    fn derive(&self, query: String, order_by: Option<String>) -> Arc<SqlSource> {
        let depth = self.depth + 1;
        Arc::new(SqlSource {
            dialect: Arc::clone(&self.dialect),
            query,
            alias: format!("{}{depth}", self.options.temp_alias),
            depth,
            order_by,
            options: self.options.clone(),
        })
    }
}

/// How a column's fragment is spelled as the operand of an enclosing aggregate.
///
/// Databases reject an aggregate directly inside another, so any aggregate in the fragment is
/// rewritten as a subquery over the source.
#[derive(Clone, Debug)]
enum Nesting {
    /// No aggregate inside: the fragment nests unchanged.
    Plain,
    Rewritten(String),
    /// A correlated subquery cannot be built; holds the reason.
    Unavailable(String),
}

#[derive(Clone, Debug)]
pub struct SqlColumn {
    name: String,
    data_type: DataType,
    fragment: String,
    categories: Option<Arc<CategoryMap>>,
    constant: Option<Value>,
    /// Whether the fragment yields one value per group inside a `GROUP BY`.
    grouped: bool,
    nesting: Nesting,
    source: Arc<SqlSource>,
}

impl SqlColumn {
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// The statement selecting just this column.
    pub fn query(&self) -> String {
        let field = self.source.dialect.field(&self.fragment, &self.name);
        self.source.select(&[field], &[])
    }
}

impl Column for SqlColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn categories(&self) -> Option<&Arc<CategoryMap>> {
        self.categories.as_ref()
    }

    fn constant(&self) -> Option<&Value> {
        self.constant.as_ref()
    }

    fn len(&self) -> FrameResult<usize> {
        if self.constant.is_some() {
            return Ok(1);
        }
        self.source.dialect.row_count(&self.query())
    }

    fn element(&self, row: usize) -> FrameResult<Value> {
        let values = self.values()?;
        values.element(row).ok_or_else(|| {
            VectorError::OutOfBounds {
                row,
                len: values.len(),
            }
            .into()
        })
    }

    fn values(&self) -> FrameResult<Vector> {
        if let Some(value) = &self.constant {
            return Ok(Vector::scalar(value.clone())?);
        }
        self.source
            .dialect
            .fetch(&self.query(), &[self.data_type.storage()])?
            .pop()
            .ok_or_else(|| FrameError::Database(format!("no values returned for {}", self.name)))
    }
}

/// A dataframe whose columns are fragments of one composed query.
#[derive(Clone, Debug)]
pub struct SqlFrame {
    source: Arc<SqlSource>,
    columns: Vec<SqlColumn>,
    column_index: HashMap<String, usize>,
    /// Keys of the `by()` whose formulas are being compiled against this frame.
    group_keys: Option<Vec<String>>,
}

type FieldSpec = (String, DataType, Option<Arc<CategoryMap>>);

impl SqlFrame {
    /// A frame over every column of `query`.
    pub fn from_query(
        dialect: Arc<dyn Dialect>,
        query: &str,
        options: FrameOptions,
    ) -> FrameResult<Self> {
        let fields = dialect
            .types(query)?
            .into_iter()
            .map(|(name, data_type)| (name, data_type, None))
            .collect();
        let source = Arc::new(SqlSource {
            alias: format!("{}0", options.temp_alias),
            dialect,
            query: query.to_string(),
            depth: 0,
            order_by: None,
            options,
        });
        Ok(Self::over(source, fields))
    }

    pub fn from_table(
        dialect: Arc<dyn Dialect>,
        table: &str,
        options: FrameOptions,
    ) -> FrameResult<Self> {
        let query = dialect.table_query(table);
        Self::from_query(dialect, &query, options)
    }

    fn over(source: Arc<SqlSource>, fields: Vec<FieldSpec>) -> Self {
        let mut columns = Vec::with_capacity(fields.len());
        let mut column_index = HashMap::with_capacity(fields.len());
        for (name, data_type, categories) in fields {
            column_index.insert(name.clone(), columns.len());
            columns.push(SqlColumn {
                fragment: source.dialect.quote_ident(&name),
                name,
                data_type,
                categories,
                constant: None,
                grouped: false,
                nesting: Nesting::Plain,
                source: Arc::clone(&source),
            });
        }
        Self {
            source,
            columns,
            column_index,
            group_keys: None,
        }
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.source.dialect
    }

    pub fn columns(&self) -> &[SqlColumn] {
        &self.columns
    }

    fn fields(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| self.source.dialect.field(&c.fragment, &c.name))
            .collect()
    }

    /// The statement producing every column of the frame.
    pub fn query(&self) -> String {
        self.source.select(&self.fields(), &[])
    }

    /// Run the composed query and hold the result in memory.
    pub fn materialize(&self) -> FrameResult<MemFrame> {
        let mut frame = MemFrame::with_options(self.source.options.clone());
        if self.columns.is_empty() {
            return Ok(frame);
        }
        let types: Vec<DataType> = self.columns.iter().map(|c| c.data_type.storage()).collect();
        let vectors = self.source.dialect.fetch(&self.query(), &types)?;
        for (column, data) in self.columns.iter().zip(vectors) {
            let column = match &column.categories {
                Some(map) => MemColumn::categorical(&column.name, data, Arc::clone(map))?,
                None => MemColumn::new(&column.name, data),
            };
            frame.append_column(column)?;
        }
        Ok(frame)
    }

    /// Write the frame's rows into `table`, replacing any existing table of that name.
    pub fn save(&self, table: &str) -> FrameResult<()> {
        let dialect = &self.source.dialect;
        let fields: Vec<(String, DataType)> = self
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.data_type))
            .collect();
        dialect.create(table, &fields, true)?;
        let names: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        dialect.insert(table, &self.query(), &names)
    }

    fn check_source(&self, column: &SqlColumn) -> FrameResult<()> {
        if Arc::ptr_eq(&column.source, &self.source) {
            Ok(())
        } else {
            Err(FrameError::Type(format!(
                "column {} belongs to a different query",
                column.name
            )))
        }
    }

    /// `CASE` mapping each coded raw value to its code.
    fn encode(&self, expr: &str, map: &CategoryMap, default_code: i64) -> FrameResult<String> {
        let dialect = &self.source.dialect;
        let mut whens = Vec::new();
        let mut thens = Vec::new();
        for (value, code) in map.entries() {
            if code == OTHER_CODE {
                continue;
            }
            whens.push(dialect.compare("eq", expr, &dialect.literal(value)?)?);
            thens.push(code.to_string());
        }
        Ok(dialect.case(&whens, &thens, &default_code.to_string()))
    }

    /// Build `op` over `frags`, the spelling of each of `args` at this position.
    fn fragment_for(
        &self,
        op: &Resolved,
        args: &[&SqlColumn],
        frags: &[String],
    ) -> FrameResult<(String, DataType, Option<Arc<CategoryMap>>)> {
        let dialect = &self.source.dialect;
        let name = op.name();
        let arg = |idx: usize| {
            args.get(idx)
                .ok_or_else(|| FrameError::execution(name, format!("missing operand {idx}")))
        };
        let frag = |idx: usize| {
            frags
                .get(idx)
                .ok_or_else(|| FrameError::execution(name, format!("missing operand {idx}")))
        };

        let fragment = match name {
            "cast" => {
                let to = ops::cast_target(arg(1)?.constant())?;
                let fragment = dialect.cast_field(frag(0)?, arg(0)?.data_type, to)?;
                return Ok((fragment, to, None));
            }
            "row_number" => dialect.row_number(self.source.order_by.as_deref()),
            "cat" => {
                let (raw, extra) = args
                    .split_first()
                    .ok_or_else(|| FrameError::execution(name, "missing operand"))?;
                let fuzz = match extra {
                    [] => self.source.options.category_fuzz,
                    [fuzz] => Some(ops::fuzz_threshold(fuzz.constant())?),
                    _ => {
                        return Err(FrameError::execution(
                            name,
                            "takes at most one fuzz threshold",
                        ))
                    }
                };
                let (map, _) = CategoryMap::build(&raw.values()?, fuzz)?;
                let fragment = self.encode(frag(0)?, &map, OTHER_CODE)?;
                return Ok((fragment, DataType::Categorical, Some(Arc::new(map))));
            }
            "applyCat" => {
                let (raw, categorical) = (arg(0)?, arg(1)?);
                let map = categorical.categories().ok_or_else(|| {
                    FrameError::Type(format!("{} is not a categorical column", categorical.name))
                })?;
                if raw.data_type != map.raw_type() {
                    return Err(VectorError::TypeMismatch {
                        expected: map.raw_type(),
                        actual: raw.data_type,
                    }
                    .into());
                }
                let default = arg(2)?.constant().ok_or_else(|| {
                    FrameError::execution(name, "default level must be a constant")
                })?;
                let fragment = self.encode(frag(0)?, map, map.default_code(default)?)?;
                return Ok((fragment, DataType::Categorical, Some(Arc::clone(map))));
            }
            "divide" | "pow" => {
                let floats = args
                    .iter()
                    .zip(frags)
                    .map(|(c, frag)| dialect.cast_field(frag, c.data_type, DataType::Float))
                    .collect::<FrameResult<Vec<_>>>()?;
                dialect.function(name, &floats)?
            }
            "add" if op.output() == DataType::String => dialect.function("concat", frags)?,
            "eq" | "ne" | "ge" | "gt" | "le" | "lt" => dialect.compare(name, frag(0)?, frag(1)?)?,
            "if" => {
                let truthy = dialect.compare("ne", frag(0)?, "0")?;
                dialect.case(&[truthy], &[frag(1)?.clone()], frag(2)?)
            }
            "quantile" => {
                let level = ops::quantile_level(arg(1)?.constant())?;
                dialect.quantile(frag(0)?, level)?
            }
            _ => dialect.function(name, frags)?,
        };
        Ok((fragment, op.output(), None))
    }

    /// `aggregate` as a subquery: over every source row, or inside `by()` over the rows sharing
    /// the current row's keys.
    fn nest_aggregate(&self, aggregate: &str) -> Nesting {
        let dialect = &self.source.dialect;
        let alias = &self.source.alias;
        let Some(keys) = &self.group_keys else {
            return Nesting::Rewritten(dialect.scalar_subquery(aggregate, alias));
        };
        let mut quoted = Vec::with_capacity(keys.len());
        for key in keys {
            let ident = dialect.quote_ident(key);
            match self.column(key) {
                Some(column) if column.fragment == ident => quoted.push(ident),
                _ => {
                    return Nesting::Unavailable(format!(
                        "nested aggregates grouped by computed column {key}"
                    ))
                }
            }
        }
        Nesting::Rewritten(dialect.group_subquery(aggregate, alias, &quoted))
    }
}

/// Operand fragments as spelled inside an enclosing aggregate; `Ok(None)` when every operand
/// nests unchanged.
fn nested_operands(args: &[&SqlColumn]) -> Result<Option<Vec<String>>, String> {
    if args.iter().all(|c| matches!(c.nesting, Nesting::Plain)) {
        return Ok(None);
    }
    args.iter()
        .map(|c| match &c.nesting {
            Nesting::Plain => Ok(c.fragment.clone()),
            Nesting::Rewritten(fragment) => Ok(fragment.clone()),
            Nesting::Unavailable(reason) => Err(reason.clone()),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

impl Frame for SqlFrame {
    type Column = SqlColumn;

    fn options(&self) -> &FrameOptions {
        &self.source.options
    }

    fn column(&self, name: &str) -> Option<&SqlColumn> {
        self.column_index.get(name).map(|&idx| &self.columns[idx])
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn row_count(&self) -> FrameResult<usize> {
        self.source.dialect.row_count(&self.query())
    }

    fn append_column(&mut self, mut column: SqlColumn) -> FrameResult<()> {
        self.check_source(&column)?;
        if self.column_index.contains_key(&column.name) {
            return Err(FrameError::DuplicateName(column.name));
        }
        column.constant = None;
        self.column_index
            .insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    fn drop_column(&mut self, name: &str) -> FrameResult<SqlColumn> {
        let idx = self
            .column_index
            .remove(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))?;
        let column = self.columns.remove(idx);
        for slot in self.column_index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Ok(column)
    }

    fn literal(&self, value: Value) -> FrameResult<SqlColumn> {
        let data_type = value.data_type();
        if !data_type.is_vector_type() {
            return Err(VectorError::NotConcrete(data_type).into());
        }
        Ok(SqlColumn {
            name: value.to_string(),
            data_type,
            fragment: self.source.dialect.literal(&value)?,
            categories: None,
            constant: Some(value),
            grouped: true,
            nesting: Nesting::Plain,
            source: Arc::clone(&self.source),
        })
    }

    fn execute(&self, op: &Resolved, args: &[&SqlColumn], scope: Scope) -> FrameResult<SqlColumn> {
        for arg in args {
            self.check_source(arg)?;
        }
        let plain: Vec<String> = args.iter().map(|c| c.fragment.clone()).collect();
        let nested = nested_operands(args);

        let (fragment, data_type, categories, grouped, nesting) = if op.is_scalar() {
            let operands = match nested {
                Ok(Some(operands)) => operands,
                Ok(None) => plain,
                Err(reason) => return Err(self.source.dialect.unsupported(&reason)),
            };
            let (aggregate, data_type, categories) = self.fragment_for(op, args, &operands)?;
            let nesting = self.nest_aggregate(&aggregate);
            let fragment = match scope {
                Scope::Rows => self.source.dialect.broadcast(&aggregate),
                Scope::Groups => aggregate,
            };
            (fragment, data_type, categories, true, nesting)
        } else {
            let (fragment, data_type, categories) = self.fragment_for(op, args, &plain)?;
            let nesting = match nested {
                Ok(None) => Nesting::Plain,
                Ok(Some(operands)) => Nesting::Rewritten(self.fragment_for(op, args, &operands)?.0),
                Err(reason) => Nesting::Unavailable(reason),
            };
            let grouped = op.name() != "row_number" && args.iter().all(|c| c.grouped);
            (fragment, data_type, categories, grouped, nesting)
        };
        log::trace!("{} -> {fragment}", op.name());
        Ok(SqlColumn {
            name: op.name().to_string(),
            data_type,
            fragment,
            categories,
            constant: None,
            grouped,
            nesting,
            source: Arc::clone(&self.source),
        })
    }

    fn sort(&self, ascending: bool, keys: &[&str]) -> FrameResult<Self> {
        let dialect = &self.source.dialect;
        let mut quoted = Vec::with_capacity(keys.len());
        for key in keys {
            if self.column(key).is_none() {
                return Err(FrameError::UnknownColumn(key.to_string()));
            }
            quoted.push(dialect.quote_ident(key));
        }
        let source = self
            .source
            .derive(self.query(), Some(dialect.order_by(&quoted, ascending)));
        let fields = self
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.data_type, c.categories.clone()))
            .collect();
        Ok(Self::over(source, fields))
    }

    fn by(&self, keys: &[&str], formulas: &[(&str, &Expr)]) -> FrameResult<Self> {
        let dialect = &self.source.dialect;
        let mut fields = Vec::new();
        let mut group_by = Vec::new();
        let mut specs: Vec<FieldSpec> = Vec::new();

        for key in keys {
            let column = self
                .column(key)
                .ok_or_else(|| FrameError::UnknownColumn(key.to_string()))?;
            group_by.push(column.fragment.clone());
            fields.push(dialect.field(&column.fragment, key));
            specs.push((key.to_string(), column.data_type, column.categories.clone()));
        }
        let grouped = Self {
            group_keys: Some(keys.iter().map(|key| key.to_string()).collect()),
            ..self.clone()
        };
        for (name, expr) in formulas {
            if specs.iter().any(|(existing, _, _)| existing.as_str() == *name) {
                return Err(FrameError::DuplicateName(name.to_string()));
            }
            let column = Evaluator::new(&grouped, self, Scope::Groups).column(expr)?;
            if !column.grouped {
                return Err(FrameError::Type(format!(
                    "{name} := {expr} does not reduce to one value per group"
                )));
            }
            fields.push(dialect.field(&column.fragment, name));
            specs.push((name.to_string(), column.data_type, column.categories));
        }

        let query = self.source.select(&fields, &group_by);
        log::debug!("by({}) composed {query}", keys.join(", "));
        Ok(Self::over(self.source.derive(query, None), specs))
    }

    fn globalize(&self, mut column: SqlColumn) -> FrameResult<SqlColumn> {
        self.check_source(&column)?;
        if !column.grouped {
            return Err(FrameError::Type(format!(
                "global() expects an aggregate, got {}",
                column.name
            )));
        }
        if column.constant.is_none() {
            column.fragment = self
                .source
                .dialect
                .scalar_subquery(&column.fragment, &self.source.alias);
            column.nesting = Nesting::Plain;
        }
        Ok(column)
    }
}

/// Write `frame` into `table` (replacing it) and return a SQL frame over the new table.
///
/// Rows are inserted as batches of literal `SELECT`s joined with `UNION ALL`. Category maps
/// are carried over to the returned frame, the table itself stores only the codes.
pub fn load_frame(
    dialect: Arc<dyn Dialect>,
    table: &str,
    frame: &MemFrame,
) -> FrameResult<SqlFrame> {
    let fields: Vec<(String, DataType)> = frame
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), c.data_type()))
        .collect();
    dialect.create(table, &fields, true)?;

    let names: Vec<String> = fields.iter().map(|(name, _)| name.clone()).collect();
    let rows = frame.rows();
    let batch = frame.options().insert_batch_rows.max(1);
    for start in (0..rows).step_by(batch) {
        let selects = (start..rows.min(start + batch))
            .map(|row| {
                let literals = frame
                    .columns()
                    .iter()
                    .map(|c| Ok(dialect.field(&dialect.literal(&c.element(row)?)?, c.name())))
                    .collect::<FrameResult<Vec<_>>>()?;
                Ok(dialect.select_values(&literals))
            })
            .collect::<FrameResult<Vec<_>>>()?;
        dialect.insert(table, &dialect.union_all(&selects), &names)?;
    }
    log::debug!("loaded {rows} rows into {table}");

    let mut sql = SqlFrame::from_table(dialect, table, frame.options().clone())?;
    for column in frame.columns() {
        let (Some(map), Some(&idx)) = (column.categories(), sql.column_index.get(column.name()))
        else {
            continue;
        };
        let target = &mut sql.columns[idx];
        target.data_type = DataType::Categorical;
        target.categories = Some(Arc::clone(map));
    }
    Ok(sql)
}
