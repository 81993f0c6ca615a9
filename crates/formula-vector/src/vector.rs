use chrono::NaiveDate;

use crate::{DataType, Value, VectorError, VectorResult};

/// A homogeneous run of values of one concrete [`DataType`].
///
/// The length only changes through [`Vector::append`]. A length-1 vector stands in for a scalar
/// and is broadcast by row-wise operations (see [`Vector::element_mod`]).
#[derive(Clone, Debug, PartialEq)]
pub enum Vector {
    Integer(Vec<i64>),
    Float(Vec<f64>),
    String(Vec<String>),
    Date(Vec<NaiveDate>),
}

impl Vector {
    pub fn empty(data_type: DataType) -> VectorResult<Self> {
        Ok(match data_type.storage() {
            DataType::Integer => Vector::Integer(Vec::new()),
            DataType::Float => Vector::Float(Vec::new()),
            DataType::String => Vector::String(Vec::new()),
            DataType::Date => Vector::Date(Vec::new()),
            other => return Err(VectorError::NotConcrete(other)),
        })
    }

    /// Build a vector of `data_type` from loose values.
    ///
    /// Integers widen into float vectors; every other mismatch (and `Null`) is an error.
    pub fn from_values(
        data_type: DataType,
        values: impl IntoIterator<Item = Value>,
    ) -> VectorResult<Self> {
        let mut out = Vector::empty(data_type)?;
        for value in values {
            out.push(value)?;
        }
        Ok(out)
    }

    /// A length-1 vector holding `value`.
    pub fn scalar(value: Value) -> VectorResult<Self> {
        Vector::from_values(value.data_type(), [value])
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Vector::Integer(_) => DataType::Integer,
            Vector::Float(_) => DataType::Float,
            Vector::String(_) => DataType::String,
            Vector::Date(_) => DataType::Date,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Vector::Integer(v) => v.len(),
            Vector::Float(v) => v.len(),
            Vector::String(v) => v.len(),
            Vector::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element(&self, row: usize) -> Option<Value> {
        Some(match self {
            Vector::Integer(v) => Value::Integer(*v.get(row)?),
            Vector::Float(v) => Value::Float(*v.get(row)?),
            Vector::String(v) => Value::String(v.get(row)?.clone()),
            Vector::Date(v) => Value::Date(*v.get(row)?),
        })
    }

    /// Broadcast read: row `row` of a longer iteration maps onto `row % self.len()`.
    ///
    /// Returns `None` for an empty vector.
    pub fn element_mod(&self, row: usize) -> Option<Value> {
        match self.len() {
            0 => None,
            len => self.element(row % len),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).filter_map(move |row| self.element(row))
    }

    pub fn push(&mut self, value: Value) -> VectorResult<()> {
        let expected = self.data_type();
        match (self, value) {
            (Vector::Integer(v), Value::Integer(x)) => v.push(x),
            (Vector::Float(v), Value::Float(x)) => v.push(x),
            (Vector::Float(v), Value::Integer(x)) => v.push(x as f64),
            (Vector::String(v), Value::String(x)) => v.push(x),
            (Vector::Date(v), Value::Date(x)) => v.push(x),
            (_, Value::Null) => return Err(VectorError::Null(expected)),
            (_, other) => {
                return Err(VectorError::TypeMismatch {
                    expected,
                    actual: other.data_type(),
                })
            }
        }
        Ok(())
    }

    /// Append every element of `other`; both vectors must share a type.
    pub fn append(&mut self, other: &Vector) -> VectorResult<()> {
        match (self, other) {
            (Vector::Integer(a), Vector::Integer(b)) => a.extend_from_slice(b),
            (Vector::Float(a), Vector::Float(b)) => a.extend_from_slice(b),
            (Vector::String(a), Vector::String(b)) => a.extend_from_slice(b),
            (Vector::Date(a), Vector::Date(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(VectorError::TypeMismatch {
                    expected: a.data_type(),
                    actual: b.data_type(),
                })
            }
        }
        Ok(())
    }

    /// Gather the rows named by `rows`, in that order.
    pub fn take(&self, rows: &[usize]) -> VectorResult<Vector> {
        fn gather<T: Clone>(src: &[T], rows: &[usize]) -> VectorResult<Vec<T>> {
            rows.iter()
                .map(|&row| {
                    src.get(row).cloned().ok_or(VectorError::OutOfBounds {
                        row,
                        len: src.len(),
                    })
                })
                .collect()
        }

        Ok(match self {
            Vector::Integer(v) => Vector::Integer(gather(v, rows)?),
            Vector::Float(v) => Vector::Float(gather(v, rows)?),
            Vector::String(v) => Vector::String(gather(v, rows)?),
            Vector::Date(v) => Vector::Date(gather(v, rows)?),
        })
    }

    /// Repeat the contents cyclically until the vector holds `len` elements.
    pub fn broadcast_to(&self, len: usize) -> VectorResult<Vector> {
        if self.is_empty() && len > 0 {
            return Err(VectorError::OutOfBounds { row: 0, len: 0 });
        }
        let rows: Vec<usize> = (0..len).map(|row| row % self.len().max(1)).collect();
        self.take(&rows)
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        match self {
            Vector::Integer(v) => v.swap(a, b),
            Vector::Float(v) => v.swap(a, b),
            Vector::String(v) => v.swap(a, b),
            Vector::Date(v) => v.swap(a, b),
        }
    }

    /// Convert every element to `to` (see [`Value::cast`]).
    pub fn cast<S: AsRef<str>>(&self, to: DataType, date_formats: &[S]) -> VectorResult<Vector> {
        let to = to.storage();
        if to == self.data_type() {
            return Ok(self.clone());
        }
        let mut out = Vector::empty(to)?;
        for value in self.iter() {
            out.push(value.cast(to, date_formats)?)?;
        }
        Ok(out)
    }
}

impl From<Vec<i64>> for Vector {
    fn from(values: Vec<i64>) -> Self {
        Vector::Integer(values)
    }
}

impl From<Vec<f64>> for Vector {
    fn from(values: Vec<f64>) -> Self {
        Vector::Float(values)
    }
}

impl From<Vec<String>> for Vector {
    fn from(values: Vec<String>) -> Self {
        Vector::String(values)
    }
}

impl From<Vec<&str>> for Vector {
    fn from(values: Vec<&str>) -> Self {
        Vector::String(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<NaiveDate>> for Vector {
    fn from(values: Vec<NaiveDate>) -> Self {
        Vector::Date(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_DATE_FORMATS;

    #[test]
    fn element_mod_wraps_short_vectors() {
        let scalar = Vector::from(vec![10_i64]);
        assert_eq!(scalar.element_mod(0), Some(Value::Integer(10)));
        assert_eq!(scalar.element_mod(7), Some(Value::Integer(10)));

        let pair = Vector::from(vec![1_i64, 2]);
        assert_eq!(pair.element_mod(3), Some(Value::Integer(2)));

        let empty = Vector::from(Vec::<i64>::new());
        assert_eq!(empty.element_mod(0), None);
    }

    #[test]
    fn push_widens_integers_into_float_vectors() {
        let v = Vector::from_values(DataType::Float, [Value::Integer(1), Value::Float(2.5)]);
        assert_eq!(v.unwrap(), Vector::from(vec![1.0, 2.5]));

        let err = Vector::from_values(DataType::Integer, [Value::Float(2.5)]).unwrap_err();
        assert!(matches!(err, VectorError::TypeMismatch { .. }));
    }

    #[test]
    fn append_requires_matching_types() {
        let mut v = Vector::from(vec![1_i64]);
        v.append(&Vector::from(vec![2_i64, 3])).unwrap();
        assert_eq!(v.len(), 3);
        assert!(v.append(&Vector::from(vec![1.0])).is_err());
    }

    #[test]
    fn take_and_broadcast() {
        let v = Vector::from(vec!["a", "b", "c"]);
        assert_eq!(v.take(&[2, 0]).unwrap(), Vector::from(vec!["c", "a"]));
        assert!(v.take(&[3]).is_err());

        let s = Vector::from(vec![4.0]);
        assert_eq!(s.broadcast_to(3).unwrap(), Vector::from(vec![4.0, 4.0, 4.0]));
        assert!(Vector::from(Vec::<f64>::new()).broadcast_to(2).is_err());
    }

    #[test]
    fn cast_to_categorical_storage_is_integer() {
        let v = Vector::from(vec!["1", "2"]);
        let out = v.cast(DataType::Categorical, DEFAULT_DATE_FORMATS).unwrap();
        assert_eq!(out, Vector::from(vec![1_i64, 2]));
    }
}
