use std::collections::HashMap;

use formula_vector::{Value, Vector};

use super::{MemColumn, MemFrame};
use crate::eval::Evaluator;
use crate::parser::Expr;
use crate::{Column, Frame, FrameError, FrameResult, Scope};

/// Row indices of each distinct key tuple, in order of first appearance.
fn partition(frame: &MemFrame, keys: &[&MemColumn]) -> FrameResult<Vec<Vec<usize>>> {
    let mut slots: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in 0..frame.rows() {
        let tuple = keys
            .iter()
            .map(|key| key.element(row))
            .collect::<FrameResult<Vec<_>>>()?;
        let slot = *slots.entry(tuple).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }
    Ok(groups)
}

pub(super) fn by(
    frame: &MemFrame,
    keys: &[&str],
    formulas: &[(&str, &Expr)],
) -> FrameResult<MemFrame> {
    let key_columns = keys
        .iter()
        .map(|key| {
            frame
                .column(key)
                .ok_or_else(|| FrameError::UnknownColumn(key.to_string()))
        })
        .collect::<FrameResult<Vec<_>>>()?;
    let groups = partition(frame, &key_columns)?;
    log::debug!(
        "by({}) split {} rows into {} groups",
        keys.join(", "),
        frame.rows(),
        groups.len()
    );

    let mut out = MemFrame::with_options(frame.options().clone());
    let firsts: Vec<usize> = groups.iter().filter_map(|rows| rows.first().copied()).collect();
    for key in &key_columns {
        out.append_column(MemColumn {
            data: key.data.take(&firsts)?,
            ..(*key).clone()
        })?;
    }

    for (name, expr) in formulas {
        out.append_column(reduce(frame, &groups, name, expr)?)?;
    }
    Ok(out)
}

/// Evaluate `expr` once per group; each evaluation must yield exactly one value.
fn reduce(
    frame: &MemFrame,
    groups: &[Vec<usize>],
    name: &str,
    expr: &Expr,
) -> FrameResult<MemColumn> {
    let mut values = Vec::with_capacity(groups.len());
    let mut template: Option<MemColumn> = None;
    for rows in groups {
        let subset = frame.take(rows)?;
        let column = Evaluator::new(&subset, frame, Scope::Groups).column(expr)?;
        if column.data.len() != 1 {
            return Err(FrameError::Type(format!(
                "{name} := {expr} does not reduce to one value per group"
            )));
        }
        values.push(column.element(0)?);
        template.get_or_insert(column);
    }

    // Without groups nothing runs; the result type comes from signature resolution alone.
    let template = match template {
        Some(column) => column,
        None => {
            let data_type = Evaluator::new(frame, frame, Scope::Groups).column_type(expr)?;
            MemColumn {
                name: name.to_string(),
                data_type,
                data: Vector::empty(data_type)?,
                categories: None,
                constant: None,
            }
        }
    };
    Ok(MemColumn {
        name: name.to_string(),
        data: Vector::from_values(template.data_type, values)?,
        constant: None,
        ..template
    })
}
