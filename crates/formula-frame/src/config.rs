use formula_vector::DEFAULT_DATE_FORMATS;
use serde::{Deserialize, Serialize};

use crate::FrameResult;

/// Options shared by every frame of a pipeline.
///
/// All fields have defaults, so a partial JSON document (or `{}`) is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameOptions {
    /// chrono formats tried, in order, when a quoted literal or a string cast may be a date.
    pub date_formats: Vec<String>,
    /// Default fuzz threshold for `cat()` when the formula does not pass one.
    pub category_fuzz: Option<usize>,
    /// Prefix of the CTE alias wrapping each accumulated SQL source.
    pub temp_alias: String,
    /// Rows per `INSERT` statement when writing an in-memory frame to a database table.
    pub insert_batch_rows: usize,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            category_fuzz: None,
            temp_alias: "_src".to_string(),
            insert_batch_rows: 500,
        }
    }
}

impl FrameOptions {
    pub fn from_json(json: &str) -> FrameResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
