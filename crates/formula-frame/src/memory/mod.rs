//! In-process backend: columns own materialized vectors and operations compute row by row.
use std::collections::HashMap;
use std::sync::Arc;

use formula_vector::{CategoryMap, DataType, Value, Vector, VectorError};

use crate::ops::Resolved;
use crate::parser::Expr;
use crate::{Column, Frame, FrameError, FrameOptions, FrameResult, Scope};

mod group;
mod kernels;
mod sort;

#[derive(Clone, Debug, PartialEq)]
pub struct MemColumn {
    name: String,
    data_type: DataType,
    data: Vector,
    categories: Option<Arc<CategoryMap>>,
    constant: Option<Value>,
}

impl MemColumn {
    pub fn new(name: impl Into<String>, data: impl Into<Vector>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            data_type: data.data_type(),
            data,
            categories: None,
            constant: None,
        }
    }

    /// A categorical column: integer `codes` encoded with `map`.
    pub fn categorical(
        name: impl Into<String>,
        codes: Vector,
        map: Arc<CategoryMap>,
    ) -> FrameResult<Self> {
        if codes.data_type() != DataType::Integer {
            return Err(VectorError::TypeMismatch {
                expected: DataType::Integer,
                actual: codes.data_type(),
            }
            .into());
        }
        Ok(Self {
            name: name.into(),
            data_type: DataType::Categorical,
            data: codes,
            categories: Some(map),
            constant: None,
        })
    }

    /// A length-1 literal column named after its value.
    pub fn literal(value: Value) -> FrameResult<Self> {
        let data = Vector::scalar(value.clone())?;
        Ok(Self {
            name: value.to_string(),
            data_type: data.data_type(),
            data,
            categories: None,
            constant: Some(value),
        })
    }

    pub fn data(&self) -> &Vector {
        &self.data
    }
}

impl Column for MemColumn {
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
        Ok(self.data.len())
    }

    fn element(&self, row: usize) -> FrameResult<Value> {
        self.data.element(row).ok_or_else(|| {
            VectorError::OutOfBounds {
                row,
                len: self.data.len(),
            }
            .into()
        })
    }

    fn values(&self) -> FrameResult<Vector> {
        Ok(self.data.clone())
    }
}

/// A dataframe of materialized columns, all of the same length.
#[derive(Clone, Debug, Default)]
pub struct MemFrame {
    columns: Vec<MemColumn>,
    column_index: HashMap<String, usize>,
    options: FrameOptions,
}

impl MemFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FrameOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn from_columns(columns: impl IntoIterator<Item = MemColumn>) -> FrameResult<Self> {
        let mut frame = Self::new();
        for column in columns {
            frame.append_column(column)?;
        }
        Ok(frame)
    }

    /// Append a plain column built from `data`.
    pub fn add_column(&mut self, name: &str, data: impl Into<Vector>) -> FrameResult<()> {
        self.append_column(MemColumn::new(name, data))
    }

    pub fn set_options(&mut self, options: FrameOptions) {
        self.options = options;
    }

    pub fn columns(&self) -> &[MemColumn] {
        &self.columns
    }

    pub fn column_values(&self, name: &str) -> FrameResult<&Vector> {
        self.column(name)
            .map(MemColumn::data)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    /// A new frame holding the given rows of every column, in that order.
    pub fn take(&self, rows: &[usize]) -> FrameResult<MemFrame> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            columns.push(MemColumn {
                data: column.data.take(rows)?,
                ..column.clone()
            });
        }
        Ok(Self {
            columns,
            column_index: self.column_index.clone(),
            options: self.options.clone(),
        })
    }
}

impl Frame for MemFrame {
    type Column = MemColumn;

    fn options(&self) -> &FrameOptions {
        &self.options
    }

    fn column(&self, name: &str) -> Option<&MemColumn> {
        self.column_index.get(name).map(|&idx| &self.columns[idx])
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn row_count(&self) -> FrameResult<usize> {
        Ok(self.rows())
    }

    fn append_column(&mut self, mut column: MemColumn) -> FrameResult<()> {
        if self.column_index.contains_key(&column.name) {
            return Err(FrameError::DuplicateName(column.name));
        }
        if !self.columns.is_empty() {
            let rows = self.rows();
            match column.data.len() {
                len if len == rows => {}
                1 => column.data = column.data.broadcast_to(rows)?,
                len => {
                    return Err(FrameError::LengthMismatch {
                        column: column.name,
                        expected: rows,
                        actual: len,
                    })
                }
            }
        }
        column.constant = None;
        self.column_index
            .insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    fn drop_column(&mut self, name: &str) -> FrameResult<MemColumn> {
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

    fn literal(&self, value: Value) -> FrameResult<MemColumn> {
        MemColumn::literal(value)
    }

    fn execute(&self, op: &Resolved, args: &[&MemColumn], _scope: Scope) -> FrameResult<MemColumn> {
        kernels::execute(self, op, args)
    }

    fn sort(&self, ascending: bool, keys: &[&str]) -> FrameResult<Self> {
        let mut sorted = self.clone();
        sorted.sort_in_place(ascending, keys)?;
        Ok(sorted)
    }

    fn by(&self, keys: &[&str], formulas: &[(&str, &Expr)]) -> FrameResult<Self> {
        group::by(self, keys, formulas)
    }

    fn globalize(&self, column: MemColumn) -> FrameResult<MemColumn> {
        if column.data.len() != 1 {
            return Err(FrameError::Type(format!(
                "global() expects an aggregate, got {}",
                column.name
            )));
        }
        Ok(column)
    }
}
