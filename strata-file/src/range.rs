use strata_buffer::ByteCursor;
use strata_dtype::LogicalType;
use strata_error::{StrataResult, strata_bail, strata_err};

/// A fixed-width pointer into a shared pool, stored inline in the data region.
///
/// `start` and `count` are measured in pool elements. Tensor shapes append their extents after
/// `count` in the order columns, rows, depth, outer; extents a shape does not have are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeDescriptor {
    /// First pool element.
    pub start: u32,
    /// Number of pool elements.
    pub count: u32,
    /// Innermost extent of a matrix or tensor.
    pub columns: u32,
    /// Row extent of a matrix or tensor.
    pub rows: u32,
    /// Depth extent of a three- or four-dimensional tensor.
    pub depth: u32,
    /// Outermost extent of a four-dimensional tensor.
    pub outer: u32,
}

impl RangeDescriptor {
    /// A descriptor with no shape.
    pub fn new(start: u32, count: u32) -> Self {
        Self {
            start,
            count,
            ..Default::default()
        }
    }

    /// Number of `u32` fields `logical_type` stores.
    fn field_count(logical_type: LogicalType) -> StrataResult<usize> {
        Ok(match logical_type {
            LogicalType::Binary
            | LogicalType::IndexList
            | LogicalType::WeightedIndexList
            | LogicalType::Vector => 2,
            LogicalType::Matrix => 4,
            LogicalType::Tensor3 => 5,
            LogicalType::Tensor4 => 6,
            other => strata_bail!(Internal: "{other} values are not addressed by range"),
        })
    }

    /// Append the `logical_type` encoding of this descriptor.
    pub fn write(&self, logical_type: LogicalType, out: &mut Vec<u8>) -> StrataResult<()> {
        let fields = [
            self.start,
            self.count,
            self.columns,
            self.rows,
            self.depth,
            self.outer,
        ];
        for field in &fields[..Self::field_count(logical_type)?] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        Ok(())
    }

    /// Read the `logical_type` encoding of a descriptor.
    pub fn read(logical_type: LogicalType, cursor: &mut ByteCursor<'_>) -> StrataResult<Self> {
        let mut fields = [0u32; 6];
        for field in fields.iter_mut().take(Self::field_count(logical_type)?) {
            *field = cursor.u32()?;
        }
        let [start, count, columns, rows, depth, outer] = fields;
        Ok(Self {
            start,
            count,
            columns,
            rows,
            depth,
            outer,
        })
    }

    /// The pool element range, checked against a pool of `pool_len` elements.
    pub fn checked_range(&self, pool_len: usize) -> StrataResult<std::ops::Range<usize>> {
        let start = self.start as usize;
        let end = start + self.count as usize;
        if end > pool_len {
            strata_bail!(
                Malformed: "range {start}+{} exceeds a pool of {pool_len} elements",
                self.count
            );
        }
        Ok(start..end)
    }

    /// Check `count` equals the product of `shape`.
    pub fn check_shape(&self, shape: &[u32]) -> StrataResult<()> {
        let cells = shape
            .iter()
            .try_fold(1u64, |acc, dim| acc.checked_mul(u64::from(*dim)))
            .ok_or_else(|| strata_err!(Malformed: "tensor shape overflows"))?;
        if cells != u64::from(self.count) {
            strata_bail!(
                Malformed: "tensor range holds {} values but its shape needs {cells}",
                self.count
            );
        }
        Ok(())
    }
}
