//! Per-operation compute for the in-memory backend.
//!
//! Row-wise operations pick one kernel per call from [`row_kernel`], keyed on the operation and
//! the output type of the resolved signature, then run it over every broadcast row.
use std::cmp::Ordering;
use std::sync::Arc;

use formula_vector::{CategoryMap, DataType, Value, Vector};
use ordered_float::OrderedFloat;

use super::{MemColumn, MemFrame};
use crate::ops::{self, Resolved};
use crate::{Column, Frame, FrameError, FrameResult};

type RowFn = fn(&[Value]) -> Result<Value, String>;

pub(super) fn execute(
    frame: &MemFrame,
    op: &Resolved,
    args: &[&MemColumn],
) -> FrameResult<MemColumn> {
    match op.name() {
        "cast" => cast(frame, args),
        "row_number" => {
            let rows = i64::try_from(frame.rows())
                .map_err(|_| FrameError::execution("row_number", "too many rows"))?;
            Ok(MemColumn::new("row_number", (0..rows).collect::<Vec<_>>()))
        }
        "cat" => categorize(frame, args),
        "applyCat" => apply_categories(args),
        _ if op.is_scalar() => aggregate(op, args),
        _ => row_wise(op, args),
    }
}

fn row_wise(op: &Resolved, args: &[&MemColumn]) -> FrameResult<MemColumn> {
    let name = op.name();
    let kernel = row_kernel(name, op.output())
        .ok_or_else(|| FrameError::execution(name, "no in-memory implementation"))?;
    let lens: Vec<usize> = args.iter().map(|arg| arg.data().len()).collect();
    let rows = ops::broadcast_len(name, &lens)?;

    let mut out = Vector::empty(op.output())?;
    let mut row_args = Vec::with_capacity(args.len());
    for row in 0..rows {
        row_args.clear();
        for arg in args {
            let value = arg
                .data()
                .element_mod(row)
                .ok_or_else(|| FrameError::execution(name, "empty operand"))?;
            row_args.push(value);
        }
        let value = kernel(&row_args)
            .map_err(|message| FrameError::execution(name, format!("row {row}: {message}")))?;
        out.push(value)?;
    }
    Ok(MemColumn::new(name, out))
}

fn row_kernel(name: &str, output: DataType) -> Option<RowFn> {
    use DataType::{Float, Integer, String};

    let kernel: RowFn = match (name, output) {
        ("add", Integer) => |a| int2(a, i64::checked_add),
        ("add", Float) => |a| float2(a, |x, y| x + y),
        ("add", String) | ("concat", String) => concat,
        ("subtract", Integer) => |a| int2(a, i64::checked_sub),
        ("subtract", Float) => |a| float2(a, |x, y| x - y),
        ("multiply", Integer) => |a| int2(a, i64::checked_mul),
        ("multiply", Float) => |a| float2(a, |x, y| x * y),
        ("divide", Float) => divide,
        ("pow", Float) => |a| float2(a, f64::powf),
        ("negate", Integer) => |a| Ok(Value::Integer(int(a, 0)?.checked_neg().ok_or(OVERFLOW)?)),
        ("negate", Float) => |a| Ok(Value::Float(-float(a, 0)?)),
        ("abs", Integer) => |a| Ok(Value::Integer(int(a, 0)?.checked_abs().ok_or(OVERFLOW)?)),
        ("abs", Float) => |a| Ok(Value::Float(float(a, 0)?.abs())),
        ("exp", Float) => |a| Ok(Value::Float(float(a, 0)?.exp())),
        ("log", Float) => log,
        ("sqrt", Float) => sqrt,
        ("eq", Integer) => |a| compare(a, Ordering::is_eq),
        ("ne", Integer) => |a| compare(a, Ordering::is_ne),
        ("ge", Integer) => |a| compare(a, Ordering::is_ge),
        ("gt", Integer) => |a| compare(a, Ordering::is_gt),
        ("le", Integer) => |a| compare(a, Ordering::is_le),
        ("lt", Integer) => |a| compare(a, Ordering::is_lt),
        ("and", Integer) => |a| Ok(flag(int(a, 0)? != 0 && int(a, 1)? != 0)),
        ("or", Integer) => |a| Ok(flag(int(a, 0)? != 0 || int(a, 1)? != 0)),
        ("not", Integer) => |a| Ok(flag(int(a, 0)? == 0)),
        ("if", _) => choose,
        _ => return None,
    };
    Some(kernel)
}

const OVERFLOW: &str = "integer overflow";

fn operand(args: &[Value], idx: usize) -> Result<&Value, String> {
    args.get(idx)
        .ok_or_else(|| format!("missing operand {idx}"))
}

fn int(args: &[Value], idx: usize) -> Result<i64, String> {
    let value = operand(args, idx)?;
    value
        .as_i64()
        .ok_or_else(|| format!("expected an integer, got {value}"))
}

fn float(args: &[Value], idx: usize) -> Result<f64, String> {
    let value = operand(args, idx)?;
    value
        .as_f64()
        .ok_or_else(|| format!("expected a number, got {value}"))
}

fn flag(b: bool) -> Value {
    Value::Integer(i64::from(b))
}

fn int2(args: &[Value], f: fn(i64, i64) -> Option<i64>) -> Result<Value, String> {
    f(int(args, 0)?, int(args, 1)?)
        .map(Value::Integer)
        .ok_or_else(|| OVERFLOW.to_string())
}

fn float2(args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, String> {
    Ok(Value::Float(f(float(args, 0)?, float(args, 1)?)))
}

fn divide(args: &[Value]) -> Result<Value, String> {
    let divisor = float(args, 1)?;
    if divisor == 0.0 {
        return Err("division by zero".to_string());
    }
    Ok(Value::Float(float(args, 0)? / divisor))
}

fn log(args: &[Value]) -> Result<Value, String> {
    let x = float(args, 0)?;
    if x <= 0.0 {
        return Err(format!("log of non-positive value {x}"));
    }
    Ok(Value::Float(x.ln()))
}

fn sqrt(args: &[Value]) -> Result<Value, String> {
    let x = float(args, 0)?;
    if x < 0.0 {
        return Err(format!("square root of negative value {x}"));
    }
    Ok(Value::Float(x.sqrt()))
}

// NaN compares unequal to everything, so only `ne` holds for it.
fn compare(args: &[Value], test: fn(Ordering) -> bool) -> Result<Value, String> {
    let (a, b) = (operand(args, 0)?, operand(args, 1)?);
    Ok(flag(match a.compare_numeric(b) {
        Some(ord) => test(ord),
        None => test(Ordering::Less) && test(Ordering::Greater),
    }))
}

fn concat(args: &[Value]) -> Result<Value, String> {
    let mut out = String::new();
    for value in args {
        let text = value
            .as_str()
            .ok_or_else(|| format!("expected a string, got {value}"))?;
        out.push_str(text);
    }
    Ok(Value::String(out))
}

fn choose(args: &[Value]) -> Result<Value, String> {
    let branch = if int(args, 0)? != 0 { 1 } else { 2 };
    operand(args, branch).cloned()
}

fn aggregate(op: &Resolved, args: &[&MemColumn]) -> FrameResult<MemColumn> {
    let name = op.name();
    let data = args
        .first()
        .map(|arg| arg.data())
        .ok_or_else(|| FrameError::execution(name, "missing operand"))?;

    let value = match (name, data) {
        ("count", data) => Value::Integer(data.len() as i64),
        ("sum", Vector::Integer(v)) => Value::Integer(
            v.iter()
                .try_fold(0_i64, |acc, x| acc.checked_add(*x))
                .ok_or_else(|| FrameError::execution(name, OVERFLOW))?,
        ),
        ("sum", Vector::Float(v)) => Value::Float(v.iter().sum()),
        ("mean", data) => {
            let total: f64 = data.iter().filter_map(|v| v.as_f64()).sum();
            if data.is_empty() {
                return Err(FrameError::execution(name, "mean of an empty column"));
            }
            Value::Float(total / data.len() as f64)
        }
        ("min", data) => data
            .iter()
            .min()
            .ok_or_else(|| FrameError::execution(name, "min of an empty column"))?,
        ("max", data) => data
            .iter()
            .max()
            .ok_or_else(|| FrameError::execution(name, "max of an empty column"))?,
        ("quantile", data) => {
            let level = ops::quantile_level(args.get(1).and_then(|arg| arg.constant()))?;
            Value::Float(quantile(data, level).ok_or_else(|| {
                FrameError::execution(name, "quantile of an empty column")
            })?)
        }
        _ => {
            return Err(FrameError::execution(
                name,
                format!("no in-memory implementation for {}", data.data_type()),
            ))
        }
    };
    Ok(MemColumn::new(name, Vector::scalar(value)?))
}

/// Linear interpolation between the two order statistics around `level * (n - 1)`.
fn quantile(data: &Vector, level: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = data.iter().filter_map(|v| v.as_f64()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by_key(|x| OrderedFloat(*x));
    let pos = level * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let (a, b) = (sorted[lo], sorted[hi]);
    Some(a + (b - a) * (pos - lo as f64))
}

fn cast(frame: &MemFrame, args: &[&MemColumn]) -> FrameResult<MemColumn> {
    let [value, target] = args else {
        return Err(FrameError::execution("cast", "expected a value and a target type"));
    };
    let to = ops::cast_target(target.constant())?;
    let data = value.data().cast(to, &frame.options().date_formats)?;
    Ok(MemColumn::new("cast", data))
}

fn categorize(frame: &MemFrame, args: &[&MemColumn]) -> FrameResult<MemColumn> {
    let (raw, extra) = args
        .split_first()
        .ok_or_else(|| FrameError::execution("cat", "missing operand"))?;
    let fuzz = match extra {
        [] => frame.options().category_fuzz,
        [fuzz] => Some(ops::fuzz_threshold(fuzz.constant())?),
        _ => {
            return Err(FrameError::execution(
                "cat",
                "takes at most one fuzz threshold",
            ))
        }
    };
    let (map, codes) = CategoryMap::build(raw.data(), fuzz)?;
    MemColumn::categorical("cat", codes, Arc::new(map))
}

fn apply_categories(args: &[&MemColumn]) -> FrameResult<MemColumn> {
    let [raw, categorical, default] = args else {
        return Err(FrameError::execution("applyCat", "expected three operands"));
    };
    let map = categorical.categories().ok_or_else(|| {
        FrameError::Type(format!("{} is not a categorical column", categorical.name()))
    })?;
    let default = default.constant().ok_or_else(|| {
        FrameError::execution("applyCat", "default level must be a constant")
    })?;
    let codes = map.encode(raw.data(), map.default_code(default)?)?;
    MemColumn::categorical("applyCat", codes, Arc::clone(map))
}
