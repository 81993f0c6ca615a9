use std::collections::BTreeSet;
use std::fmt;

use formula_vector::{DataType, Value, Vector};

use crate::eval::Evaluator;
use crate::ops::Resolved;
use crate::parser::{self, Expr};
use crate::{Column, FrameError, FrameOptions, FrameResult};

/// How aggregates are expected to behave while evaluating a formula.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Ordinary evaluation: an aggregate stands for its value repeated on every row.
    Rows,
    /// Evaluation inside `by()`: an aggregate reduces each group to one value.
    Groups,
}

/// Two materialized series handed to an external renderer by `plot(x, y)`.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotData {
    pub x_label: String,
    pub y_label: String,
    pub x: Vector,
    pub y: Vector,
}

/// The result of evaluating a formula.
#[derive(Debug)]
pub enum Parsed<F: Frame> {
    Frame(F),
    Column(F::Column),
    Plot(PlotData),
}

impl<F: Frame> Parsed<F> {
    pub fn data_type(&self) -> DataType {
        match self {
            Parsed::Frame(_) => DataType::DataFrame,
            Parsed::Column(column) => column.data_type(),
            Parsed::Plot(_) => DataType::Unknown,
        }
    }

    pub fn column(&self) -> Option<&F::Column> {
        match self {
            Parsed::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn into_column(self) -> Option<F::Column> {
        match self {
            Parsed::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn into_frame(self) -> Option<F> {
        match self {
            Parsed::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn into_plot(self) -> Option<PlotData> {
        match self {
            Parsed::Plot(plot) => Some(plot),
            _ => None,
        }
    }
}

/// A formula's result together with the source columns it read.
#[derive(Debug)]
pub struct Evaluation<F: Frame> {
    pub result: Parsed<F>,
    pub dependencies: BTreeSet<String>,
}

/// A dataframe backend: an ordered list of named columns plus the operations the evaluator
/// delegates to it.
pub trait Frame: Sized + fmt::Debug {
    type Column: Column;

    fn options(&self) -> &FrameOptions;

    fn column(&self, name: &str) -> Option<&Self::Column>;

    fn column_names(&self) -> Vec<String>;

    fn row_count(&self) -> FrameResult<usize>;

    /// Add `column` under its current name. A length-1 column is repeated to the frame's length.
    fn append_column(&mut self, column: Self::Column) -> FrameResult<()>;

    fn drop_column(&mut self, name: &str) -> FrameResult<Self::Column>;

    /// A length-1 column holding `value`.
    fn literal(&self, value: Value) -> FrameResult<Self::Column>;

    /// Run a resolved operation over columns of this frame.
    fn execute(
        &self,
        op: &Resolved,
        args: &[&Self::Column],
        scope: Scope,
    ) -> FrameResult<Self::Column>;

    /// Stable sort on `keys`: ties on one key fall through to the next.
    fn sort(&self, ascending: bool, keys: &[&str]) -> FrameResult<Self>;

    /// One row per distinct tuple of `keys`, with each `(name, formula)` reduced per group.
    fn by(&self, keys: &[&str], formulas: &[(&str, &Expr)]) -> FrameResult<Self>;

    /// Turn an aggregate evaluated over the whole frame into a value usable in any scope.
    fn globalize(&self, column: Self::Column) -> FrameResult<Self::Column>;

    /// Evaluate `formula` without modifying the frame.
    ///
    /// A `name :=` prefix only renames the resulting column.
    fn evaluate(&self, formula: &str) -> FrameResult<Evaluation<Self>> {
        let formula = parser::parse(formula)?;
        let mut evaluation = Evaluator::new(self, self, Scope::Rows).run(&formula.expr)?;
        if let (Some(name), Parsed::Column(column)) = (&formula.target, &mut evaluation.result) {
            column.set_name(name);
        }
        Ok(evaluation)
    }

    /// Evaluate `formula`; with a `name :=` prefix the result is appended as a new column and
    /// `None` is returned.
    ///
    /// Nothing is appended when parsing, dispatch or execution fails.
    fn parse(&mut self, formula: &str) -> FrameResult<Option<Evaluation<Self>>> {
        let formula = parser::parse(formula)?;
        let evaluation = Evaluator::new(&*self, &*self, Scope::Rows).run(&formula.expr)?;
        let Some(name) = formula.target else {
            return Ok(Some(evaluation));
        };
        let Parsed::Column(mut column) = evaluation.result else {
            return Err(FrameError::Type(format!(
                "only a column can be assigned to {name}"
            )));
        };
        column.set_name(&name);
        self.append_column(column)?;
        Ok(None)
    }
}
