//! Named operations and signature resolution.
//!
//! Every operation is registered once (via `inventory`) with its ordered list of accepted input
//! signatures. Resolution walks that list in declaration order and takes the first signature
//! whose slots accept the operand types, so the order of the `signatures!` entries is part of
//! each operation's contract. Backends supply the actual computation for a resolved operation.
use std::collections::HashMap;
use std::sync::OnceLock;

use formula_vector::{DataType, Value};

use crate::{FrameError, FrameResult};

/// Build a `&'static [Signature]` from `(inputs) -> output` pairs.
macro_rules! signatures {
    ($( ($($input:expr),*) -> $output:expr ),* $(,)?) => {
        &[$( $crate::ops::Signature { inputs: &[$($input),*], output: $output } ),*]
    };
}
pub(crate) use signatures;

mod aggregate;
mod arithmetic;
mod logical;
mod text;

/// One accepted input tuple and the output type it produces.
#[derive(Debug, PartialEq, Eq)]
pub struct Signature {
    pub inputs: &'static [DataType],
    pub output: DataType,
}

impl Signature {
    fn accepts(&self, types: &[DataType], variadic: Option<DataType>) -> bool {
        if types.len() < self.inputs.len() {
            return false;
        }
        let fixed = self
            .inputs
            .iter()
            .zip(types)
            .all(|(declared, actual)| declared.accepts(*actual));
        let extra = &types[self.inputs.len()..];
        fixed
            && match variadic {
                Some(element) => extra.iter().all(|actual| element.accepts(*actual)),
                None => extra.is_empty(),
            }
    }
}

/// Probe-mode description of an operation.
#[derive(Debug)]
pub struct OpSpec {
    pub name: &'static str,
    pub signatures: &'static [Signature],
    /// Element type of arguments past a signature's fixed inputs, for variable-arity operations.
    pub variadic: Option<DataType>,
    /// Scalar operations consume whole operand vectors and produce a single value.
    pub scalar: bool,
}

inventory::collect!(OpSpec);

/// Names handled by the evaluator itself; their arguments are sub-trees rather than values.
pub const SPECIAL_FORMS: &[&str] = &["by", "global", "sort", "plot"];

fn registry() -> &'static HashMap<&'static str, &'static OpSpec> {
    static REGISTRY: OnceLock<HashMap<&'static str, &'static OpSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        for spec in inventory::iter::<OpSpec> {
            map.insert(spec.name, spec);
        }
        map
    })
}

/// Probe an operation by name.
pub fn probe(name: &str) -> Option<&'static OpSpec> {
    registry().get(name).copied()
}

/// Every registered operation, sorted by name.
pub fn operations() -> Vec<&'static OpSpec> {
    let mut ops: Vec<_> = registry().values().copied().collect();
    ops.sort_by_key(|spec| spec.name);
    ops
}

pub fn is_function_name(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name) || probe(name).is_some()
}

/// An operation bound to the signature that accepted a concrete operand list.
#[derive(Clone, Copy, Debug)]
pub struct Resolved {
    pub spec: &'static OpSpec,
    pub signature: &'static Signature,
}

impl Resolved {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn output(&self) -> DataType {
        self.signature.output
    }

    pub fn is_scalar(&self) -> bool {
        self.spec.scalar
    }
}

/// Resolve `name` against operand `types`, first matching signature wins.
pub fn resolve(name: &str, types: &[DataType]) -> FrameResult<Resolved> {
    let spec = probe(name).ok_or_else(|| FrameError::UnknownOperation(name.to_string()))?;

    let arity_ok = |sig: &Signature| match spec.variadic {
        Some(_) => types.len() >= sig.inputs.len(),
        None => types.len() == sig.inputs.len(),
    };
    if !spec.signatures.iter().any(arity_ok) {
        return Err(FrameError::Arity {
            op: name.to_string(),
            expected: expected_arity(spec),
            actual: types.len(),
        });
    }

    let signature = spec
        .signatures
        .iter()
        .find(|sig| sig.accepts(types, spec.variadic))
        .ok_or_else(|| FrameError::NoMatchingSignature {
            op: name.to_string(),
            types: types.to_vec(),
        })?;
    log::debug!("resolved {name}{types:?} to {:?} -> {}", signature.inputs, signature.output);
    Ok(Resolved { spec, signature })
}

fn expected_arity(spec: &OpSpec) -> String {
    let mut counts: Vec<usize> = spec.signatures.iter().map(|sig| sig.inputs.len()).collect();
    counts.sort_unstable();
    counts.dedup();
    let listed = counts
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(" or ");
    match spec.variadic {
        Some(_) => format!("at least {listed}"),
        None => listed,
    }
}

/// Number of rows a row-wise operation produces for operands of the given lengths.
///
/// A length-1 operand is a scalar and broadcasts to any row count, zero included. Every other
/// operand must share one length. Operand `i` is then read at `row % lens[i]`.
pub fn broadcast_len(op: &str, lens: &[usize]) -> FrameResult<usize> {
    let mut rows = None;
    for &len in lens.iter().filter(|&&len| len != 1) {
        match rows {
            None => rows = Some(len),
            Some(expected) if expected == len => {}
            Some(expected) => {
                return Err(FrameError::execution(
                    op,
                    format!("operand of length {len} cannot broadcast to {expected} rows"),
                ))
            }
        }
    }
    Ok(rows.unwrap_or(1))
}

/// Target type named by the constant second operand of `cast`.
pub(crate) fn cast_target(target: Option<&Value>) -> FrameResult<DataType> {
    let name = target
        .and_then(Value::as_str)
        .ok_or_else(|| FrameError::execution("cast", "target type must be a constant string"))?;
    let to: DataType = name.parse()?;
    if !to.is_vector_type() {
        return Err(FrameError::execution("cast", format!("cannot cast to {to}")));
    }
    Ok(to)
}

/// Minimum occurrence count passed as the optional second operand of `cat`.
pub(crate) fn fuzz_threshold(value: Option<&Value>) -> FrameResult<usize> {
    value
        .and_then(Value::as_i64)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            FrameError::execution("cat", "fuzz threshold must be a non-negative integer constant")
        })
}

pub(crate) fn quantile_level(value: Option<&Value>) -> FrameResult<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|q| (0.0..=1.0).contains(q))
        .ok_or_else(|| FrameError::execution("quantile", "level must be a constant in [0, 1]"))
}
