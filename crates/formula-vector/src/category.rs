use std::collections::HashMap;

use crate::{DataType, Value, Vector, VectorError, VectorResult};

/// Code given to levels collapsed by the fuzz threshold.
pub const OTHER_CODE: i64 = -1;

/// Mapping from raw values to small non-negative integer codes.
///
/// Codes are assigned in encounter order. When a fuzz threshold is set, raw values seen fewer
/// than `fuzz` times are all mapped to [`OTHER_CODE`] instead of receiving their own code.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryMap {
    raw_type: DataType,
    fuzz: Option<usize>,
    codes: HashMap<Value, i64>,
    // Every raw value in encounter order, including collapsed ones.
    order: Vec<Value>,
    levels: Vec<Value>,
}

impl CategoryMap {
    /// Build a map from `raw` and return it together with the coded vector.
    pub fn build(raw: &Vector, fuzz: Option<usize>) -> VectorResult<(Self, Vector)> {
        let raw_type = raw.data_type();
        if !matches!(
            raw_type,
            DataType::String | DataType::Integer | DataType::Date
        ) {
            return Err(VectorError::NotCategorical(raw_type));
        }

        let mut counts: HashMap<Value, usize> = HashMap::new();
        let mut order = Vec::new();
        for value in raw.iter() {
            let count = counts.entry(value.clone()).or_insert(0);
            if *count == 0 {
                order.push(value);
            }
            *count += 1;
        }

        let mut codes = HashMap::with_capacity(order.len());
        let mut levels = Vec::new();
        for value in &order {
            let rare = fuzz.is_some_and(|min| counts.get(value).copied().unwrap_or(0) < min);
            let code = if rare {
                OTHER_CODE
            } else {
                levels.push(value.clone());
                levels.len() as i64 - 1
            };
            codes.insert(value.clone(), code);
        }

        let collapsed = order.len() - levels.len();
        if collapsed > 0 {
            log::warn!(
                "category fuzz {fuzz:?} collapsed {collapsed} of {} levels into code {OTHER_CODE}",
                order.len()
            );
        }

        let map = Self {
            raw_type,
            fuzz,
            codes,
            order,
            levels,
        };
        let coded = map.encode(raw, OTHER_CODE)?;
        Ok((map, coded))
    }

    /// Type of the raw values this map was built from.
    pub fn raw_type(&self) -> DataType {
        self.raw_type
    }

    pub fn fuzz(&self) -> Option<usize> {
        self.fuzz
    }

    pub fn code(&self, value: &Value) -> Option<i64> {
        self.codes.get(value).copied()
    }

    /// Raw value for a non-collapsed code.
    pub fn level(&self, code: i64) -> Option<&Value> {
        usize::try_from(code).ok().and_then(|idx| self.levels.get(idx))
    }

    /// Levels that received their own code, indexed by code.
    pub fn levels(&self) -> &[Value] {
        &self.levels
    }

    /// Every known raw value with its code, in encounter order.
    pub fn entries(&self) -> impl Iterator<Item = (&Value, i64)> + '_ {
        self.order
            .iter()
            .map(|value| (value, self.codes.get(value).copied().unwrap_or(OTHER_CODE)))
    }

    pub fn has_other(&self) -> bool {
        self.levels.len() < self.order.len()
    }

    /// Code used for raw values absent from the map when `default` is the designated default.
    pub fn default_code(&self, default: &Value) -> VectorResult<i64> {
        self.code(default)
            .ok_or_else(|| VectorError::UnknownLevel(default.to_string()))
    }

    /// Encode `raw` against this map, assigning `default_code` to unseen values.
    pub fn encode(&self, raw: &Vector, default_code: i64) -> VectorResult<Vector> {
        if raw.data_type() != self.raw_type {
            return Err(VectorError::TypeMismatch {
                expected: self.raw_type,
                actual: raw.data_type(),
            });
        }
        Ok(Vector::Integer(
            raw.iter()
                .map(|value| self.code(&value).unwrap_or(default_code))
                .collect(),
        ))
    }
}
