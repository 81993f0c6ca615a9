use std::fmt;
use std::sync::Arc;

use formula_vector::{CategoryMap, DataType, Value, Vector};

use crate::FrameResult;

/// One named, typed series of a frame.
///
/// In-memory columns answer every method from their backing [`Vector`]. SQL columns hold a query
/// fragment, so [`Column::len`], [`Column::element`] and [`Column::values`] run a query.
/// `Clone` is a deep copy as far as the frame is concerned: renaming or appending a clone never
/// affects the original.
pub trait Column: Clone + fmt::Debug {
    fn name(&self) -> &str;

    fn set_name(&mut self, name: &str);

    fn data_type(&self) -> DataType;

    /// The map a categorical column was encoded with.
    fn categories(&self) -> Option<&Arc<CategoryMap>>;

    /// Pre-encoding type of a categorical column.
    fn raw_type(&self) -> Option<DataType> {
        self.categories().map(|map| map.raw_type())
    }

    /// The value of a literal column, e.g. `10` or `'desc'` in a formula.
    fn constant(&self) -> Option<&Value>;

    fn len(&self) -> FrameResult<usize>;

    fn is_empty(&self) -> FrameResult<bool> {
        Ok(self.len()? == 0)
    }

    fn element(&self, row: usize) -> FrameResult<Value>;

    fn values(&self) -> FrameResult<Vector>;
}
