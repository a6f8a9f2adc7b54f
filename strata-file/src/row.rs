use std::fmt::{Display, Formatter};

use itertools::Itertools;
use strata_dtype::{FromValue, Value, cast};
use strata_error::{StrataResult, strata_err};

/// The values of one row, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// A row holding `values`.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value of `column`.
    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }

    /// The value of `column` as `T`, converted if the column is of another type.
    pub fn typed<T: FromValue>(&self, column: usize) -> StrataResult<T> {
        let value = self
            .values
            .get(column)
            .ok_or_else(|| strata_err!(OutOfBounds: column, 0, self.values.len()))?;
        T::from_value(cast(value.clone(), T::LOGICAL_TYPE)?)
    }

    /// Every value.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.values.iter().join(", "))
    }
}
