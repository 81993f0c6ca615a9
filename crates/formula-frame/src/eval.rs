use std::collections::BTreeSet;

use formula_vector::{parse_date, DataType, Value};

use crate::frame::{Evaluation, Frame, Parsed, PlotData, Scope};
use crate::ops::{self, Resolved};
use crate::parser::Expr;
use crate::{Column, FrameError, FrameResult};

/// Post-order walk of an [`Expr`] against one frame.
///
/// `whole` is the frame `global()` escapes to; outside `by()` it is the frame itself.
pub(crate) struct Evaluator<'a, F: Frame> {
    frame: &'a F,
    whole: &'a F,
    scope: Scope,
    dependencies: BTreeSet<String>,
}

impl<'a, F: Frame> Evaluator<'a, F> {
    pub(crate) fn new(frame: &'a F, whole: &'a F, scope: Scope) -> Self {
        Self {
            frame,
            whole,
            scope,
            dependencies: BTreeSet::new(),
        }
    }

    pub(crate) fn run(mut self, expr: &Expr) -> FrameResult<Evaluation<F>> {
        let result = self.eval(expr)?;
        Ok(Evaluation {
            result,
            dependencies: self.dependencies,
        })
    }

    /// Evaluate `expr`, which must produce a column.
    pub(crate) fn column(&mut self, expr: &Expr) -> FrameResult<F::Column> {
        match self.eval(expr)? {
            Parsed::Column(column) => Ok(column),
            Parsed::Frame(_) => Err(FrameError::Type(format!(
                "{expr} produces a dataframe, not a column"
            ))),
            Parsed::Plot(_) => Err(FrameError::Type(format!(
                "{expr} produces a plot, not a column"
            ))),
        }
    }

    /// Type of the column `expr` evaluates to, found by resolving signatures without running
    /// any operation.
    pub(crate) fn column_type(&mut self, expr: &Expr) -> FrameResult<DataType> {
        match expr {
            Expr::Text(text) => Ok(self.text(text).data_type()),
            Expr::Leaf(token) => match self.frame.column(token) {
                Some(column) => Ok(column.data_type()),
                None => self
                    .constant(token)
                    .map(|value| value.data_type())
                    .ok_or_else(|| FrameError::UnknownColumn(token.to_string())),
            },
            Expr::Binary { op, left, right } => {
                self.resolved_type(op.op_name(), &[left.as_ref(), right.as_ref()])
            }
            Expr::Call { name, args } => match name.as_str() {
                "global" => {
                    let [inner] = args.as_slice() else {
                        return Err(arity("global", "1", args.len()));
                    };
                    Evaluator::new(self.whole, self.whole, Scope::Groups).column_type(inner)
                }
                "by" | "sort" | "plot" => Err(FrameError::Type(format!(
                    "{expr} does not produce a column"
                ))),
                "cast" => {
                    let target = match args.get(1) {
                        Some(Expr::Text(target)) => Some(Value::String(target.clone())),
                        _ => None,
                    };
                    self.resolved_type(name, &args.iter().collect::<Vec<_>>())?;
                    ops::cast_target(target.as_ref())
                }
                _ => self.resolved_type(name, &args.iter().collect::<Vec<_>>()),
            },
            Expr::Assign { name, .. } => Err(FrameError::Parse(format!(
                "assignment to {name} is only allowed inside by()"
            ))),
        }
    }

    fn resolved_type(&mut self, name: &str, operands: &[&Expr]) -> FrameResult<DataType> {
        let types = operands
            .iter()
            .map(|operand| self.column_type(operand))
            .collect::<FrameResult<Vec<_>>>()?;
        let (resolved, _) = resolve(name, operands, &types)?;
        Ok(resolved.output())
    }

    fn text(&self, text: &str) -> Value {
        match parse_date(text, &self.frame.options().date_formats) {
            Some(date) => Value::Date(date),
            None => Value::String(text.to_string()),
        }
    }

    fn eval(&mut self, expr: &Expr) -> FrameResult<Parsed<F>> {
        match expr {
            Expr::Text(text) => Ok(Parsed::Column(self.frame.literal(self.text(text))?)),
            Expr::Leaf(token) => self.leaf(token).map(Parsed::Column),
            Expr::Binary { op, left, right } => self
                .apply(op.op_name(), &[left.as_ref(), right.as_ref()], expr)
                .map(Parsed::Column),
            Expr::Call { name, args } => self.call(name, args, expr),
            Expr::Assign { name, .. } => Err(FrameError::Parse(format!(
                "assignment to {name} is only allowed inside by()"
            ))),
        }
    }

    fn leaf(&mut self, token: &str) -> FrameResult<F::Column> {
        if let Some(column) = self.frame.column(token) {
            self.dependencies.insert(token.to_string());
            return Ok(column.clone());
        }
        let value = self
            .constant(token)
            .ok_or_else(|| FrameError::UnknownColumn(token.to_string()))?;
        self.frame.literal(value)
    }

    /// Bare tokens that are not columns are tried as a date, an integer, then a float.
    fn constant(&self, token: &str) -> Option<Value> {
        if let Some(date) = parse_date(token, &self.frame.options().date_formats) {
            return Some(Value::Date(date));
        }
        if let Ok(v) = token.parse::<i64>() {
            return Some(Value::Integer(v));
        }
        // `f64::from_str` also accepts "inf" and "nan", which would shadow missing columns.
        let numeric = token.starts_with(|c: char| c.is_ascii_digit() || c == '.');
        match token.parse::<f64>() {
            Ok(v) if numeric => Some(Value::Float(v)),
            _ => None,
        }
    }

    fn apply(&mut self, name: &str, operands: &[&Expr], expr: &Expr) -> FrameResult<F::Column> {
        let mut args = operands
            .iter()
            .map(|operand| self.column(operand))
            .collect::<FrameResult<Vec<_>>>()?;
        let types: Vec<DataType> = args.iter().map(Column::data_type).collect();
        let (resolved, as_text) = resolve(name, operands, &types)?;
        for ((arg, operand), retry) in args.iter_mut().zip(operands).zip(as_text) {
            if let (true, Expr::Text(text)) = (retry, operand) {
                *arg = self.frame.literal(Value::String(text.clone()))?;
            }
        }
        let refs: Vec<&F::Column> = args.iter().collect();
        let mut column = self.frame.execute(&resolved, &refs, self.scope)?;
        column.set_name(&expr.to_string());
        Ok(column)
    }

    fn call(&mut self, name: &str, args: &[Expr], expr: &Expr) -> FrameResult<Parsed<F>> {
        match name {
            "by" => self.by(args),
            "global" => self.global(args, expr).map(Parsed::Column),
            "sort" => self.sort(args),
            "plot" => self.plot(args),
            _ => {
                let operands: Vec<&Expr> = args.iter().collect();
                self.apply(name, &operands, expr).map(Parsed::Column)
            }
        }
    }

    fn key<'e>(&mut self, op: &str, arg: &'e Expr) -> FrameResult<&'e str> {
        let Expr::Leaf(name) = arg else {
            return Err(FrameError::Parse(format!(
                "{op}() expects a column name, got {arg}"
            )));
        };
        if self.frame.column(name).is_none() {
            return Err(FrameError::UnknownColumn(name.clone()));
        }
        self.dependencies.insert(name.clone());
        Ok(name)
    }

    fn by(&mut self, args: &[Expr]) -> FrameResult<Parsed<F>> {
        let mut keys = Vec::new();
        let mut formulas = Vec::new();
        for arg in args {
            match arg {
                Expr::Assign { name, expr } => {
                    self.collect_dependencies(expr);
                    formulas.push((name.as_str(), expr.as_ref()));
                }
                other => keys.push(self.key("by", other)?),
            }
        }
        if keys.is_empty() {
            return Err(FrameError::Parse(
                "by() needs at least one key column".to_string(),
            ));
        }
        Ok(Parsed::Frame(self.frame.by(&keys, &formulas)?))
    }

    fn collect_dependencies(&mut self, expr: &Expr) {
        match expr {
            Expr::Leaf(name) if self.frame.column(name).is_some() => {
                self.dependencies.insert(name.clone());
            }
            Expr::Leaf(_) | Expr::Text(_) => {}
            Expr::Binary { left, right, .. } => {
                self.collect_dependencies(left);
                self.collect_dependencies(right);
            }
            Expr::Call { args, .. } => args.iter().for_each(|arg| self.collect_dependencies(arg)),
            Expr::Assign { expr, .. } => self.collect_dependencies(expr),
        }
    }

    fn global(&mut self, args: &[Expr], expr: &Expr) -> FrameResult<F::Column> {
        let [inner] = args else {
            return Err(arity("global", "1", args.len()));
        };
        let mut whole = Evaluator::new(self.whole, self.whole, Scope::Groups);
        let column = whole.column(inner)?;
        self.dependencies.extend(whole.dependencies);
        let mut column = self.whole.globalize(column)?;
        column.set_name(&expr.to_string());
        Ok(column)
    }

    fn sort(&mut self, args: &[Expr]) -> FrameResult<Parsed<F>> {
        let Some((order, keys)) = args.split_first().filter(|(_, keys)| !keys.is_empty()) else {
            return Err(arity("sort", "at least 2", args.len()));
        };
        let ascending = match order {
            Expr::Text(text) | Expr::Leaf(text) => match text.to_ascii_lowercase().as_str() {
                "asc" => true,
                "desc" => false,
                _ => {
                    return Err(FrameError::Parse(format!(
                        "sort order must be 'asc' or 'desc', got {text:?}"
                    )))
                }
            },
            other => {
                return Err(FrameError::Parse(format!(
                    "sort order must be 'asc' or 'desc', got {other}"
                )))
            }
        };
        let keys = keys
            .iter()
            .map(|key| self.key("sort", key))
            .collect::<FrameResult<Vec<_>>>()?;
        Ok(Parsed::Frame(self.frame.sort(ascending, &keys)?))
    }

    fn plot(&mut self, args: &[Expr]) -> FrameResult<Parsed<F>> {
        let [x, y] = args else {
            return Err(arity("plot", "2", args.len()));
        };
        let x = self.column(x)?;
        let y = self.column(y)?;
        Ok(Parsed::Plot(PlotData {
            x_label: x.name().to_string(),
            y_label: y.name().to_string(),
            x: x.values()?,
            y: y.values()?,
        }))
    }
}

/// Resolve `name` against operand `types`.
///
/// When no signature matches, quoted operands that were read as dates are retried as strings.
/// The returned flags mark the operands that must be re-read as text.
fn resolve(
    name: &str,
    operands: &[&Expr],
    types: &[DataType],
) -> FrameResult<(Resolved, Vec<bool>)> {
    let err = match ops::resolve(name, types) {
        Ok(resolved) => return Ok((resolved, vec![false; types.len()])),
        Err(err @ FrameError::NoMatchingSignature { .. }) => err,
        Err(err) => return Err(err),
    };
    let as_text: Vec<bool> = operands
        .iter()
        .zip(types)
        .map(|(operand, ty)| matches!(operand, Expr::Text(_)) && *ty == DataType::Date)
        .collect();
    if !as_text.contains(&true) {
        return Err(err);
    }
    let retyped: Vec<DataType> = types
        .iter()
        .zip(&as_text)
        .map(|(ty, text)| if *text { DataType::String } else { *ty })
        .collect();
    match ops::resolve(name, &retyped) {
        Ok(resolved) => Ok((resolved, as_text)),
        Err(_) => Err(err),
    }
}

fn arity(op: &str, expected: &str, actual: usize) -> FrameError {
    FrameError::Arity {
        op: op.to_string(),
        expected: expected.to_string(),
        actual,
    }
}
