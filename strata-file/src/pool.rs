use std::sync::Arc;

use bytes::Bytes;
use strata_buffer::{
    ByteCursor, decode_fixed, put_string_record, read_string_record, string_lengths,
};
use strata_dtype::{LogicalType, WeightedIndex};
use strata_error::{StrataError, StrataResult, strata_bail, strata_err};

use crate::{RangeDescriptor, Region};

/// The pool holding the payloads of `logical_type`, if its values are not stored inline.
pub fn pool_region(logical_type: LogicalType) -> Option<Region> {
    match logical_type {
        LogicalType::Utf8 => Some(Region::StringPool),
        LogicalType::Binary => Some(Region::BinaryPool),
        LogicalType::IndexList => Some(Region::IndexPool),
        LogicalType::WeightedIndexList => Some(Region::WeightedIndexPool),
        LogicalType::Vector | LogicalType::Matrix | LogicalType::Tensor3 | LogicalType::Tensor4 => {
            Some(Region::FloatPool)
        }
        _ => None,
    }
}

/// Bytes of one pool under construction, with the number of elements appended so far.
#[derive(Debug, Default)]
struct PoolBuffer {
    bytes: Vec<u8>,
    len: u64,
    used: bool,
}

impl PoolBuffer {
    /// Reserve `count` elements, returning the index of the first.
    fn reserve(&mut self, count: usize) -> StrataResult<(u32, u32)> {
        self.used = true;
        let start = u32::try_from(self.len)
            .map_err(|_| strata_err!("pool exceeds {} elements", u32::MAX))?;
        let count = u32::try_from(count)?;
        self.len += u64::from(count);
        Ok((start, count))
    }
}

/// Accumulates the shared pools while a table is written.
#[derive(Debug, Default)]
pub struct PoolWriter {
    strings: PoolBuffer,
    floats: PoolBuffer,
    binary: PoolBuffer,
    indices: PoolBuffer,
    weighted: PoolBuffer,
}

impl PoolWriter {
    /// Append a string record, returning its code.
    pub fn push_string(&mut self, value: &str) -> StrataResult<u32> {
        string_lengths(value)?;
        let (code, _) = self.strings.reserve(1)?;
        put_string_record(value, &mut self.strings.bytes)?;
        Ok(code)
    }

    /// Append `f32` values.
    pub fn push_floats(&mut self, values: &[f32]) -> StrataResult<RangeDescriptor> {
        let (start, count) = self.floats.reserve(values.len())?;
        values
            .iter()
            .for_each(|v| self.floats.bytes.extend_from_slice(&v.to_le_bytes()));
        Ok(RangeDescriptor::new(start, count))
    }

    /// Append raw bytes.
    pub fn push_binary(&mut self, value: &[u8]) -> StrataResult<RangeDescriptor> {
        let (start, count) = self.binary.reserve(value.len())?;
        self.binary.bytes.extend_from_slice(value);
        Ok(RangeDescriptor::new(start, count))
    }

    /// Append index values.
    pub fn push_indices(&mut self, values: &[u32]) -> StrataResult<RangeDescriptor> {
        let (start, count) = self.indices.reserve(values.len())?;
        values
            .iter()
            .for_each(|v| self.indices.bytes.extend_from_slice(&v.to_le_bytes()));
        Ok(RangeDescriptor::new(start, count))
    }

    /// Append weighted index pairs.
    pub fn push_weighted(&mut self, values: &[WeightedIndex]) -> StrataResult<RangeDescriptor> {
        let (start, count) = self.weighted.reserve(values.len())?;
        for WeightedIndex { index, weight } in values {
            self.weighted.bytes.extend_from_slice(&index.to_le_bytes());
            self.weighted.bytes.extend_from_slice(&weight.to_le_bytes());
        }
        Ok(RangeDescriptor::new(start, count))
    }

    /// The encoded pools that were used, in file order.
    pub fn finish(self) -> StrataResult<Vec<(Region, Vec<u8>)>> {
        let mut regions = Vec::new();
        if self.strings.used {
            let count = u32::try_from(self.strings.len)?;
            let mut bytes = Vec::with_capacity(4 + self.strings.bytes.len());
            bytes.extend_from_slice(&count.to_le_bytes());
            bytes.extend_from_slice(&self.strings.bytes);
            regions.push((Region::StringPool, bytes));
        }
        for (region, pool) in [
            (Region::FloatPool, self.floats),
            (Region::BinaryPool, self.binary),
            (Region::IndexPool, self.indices),
            (Region::WeightedIndexPool, self.weighted),
        ] {
            if pool.used {
                regions.push((region, pool.bytes));
            }
        }
        Ok(regions)
    }
}

/// The decoded string pool of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringPool(Vec<Arc<str>>);

impl StringPool {
    /// Parse `u32 count | (u16 utf16Len | u16 utf8Len | utf8)*`.
    pub fn parse(bytes: &[u8]) -> StrataResult<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let count = cursor.u32()?;
        let strings = (0..count)
            .map(|_| read_string_record(&mut cursor))
            .collect::<StrataResult<Vec<_>>>()?;
        if !cursor.is_empty() {
            strata_bail!(Malformed: "{} trailing bytes in string pool", cursor.remaining());
        }
        Ok(Self(strings))
    }

    /// The string with `code`.
    pub fn get(&self, code: u32) -> StrataResult<Arc<str>> {
        self.0
            .get(code as usize)
            .cloned()
            .ok_or_else(|| {
                strata_err!(Malformed: "string code {code} exceeds a pool of {}", self.0.len())
            })
    }

    /// Number of strings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the pool holds no strings.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every string, in code order.
    pub fn strings(&self) -> &[Arc<str>] {
        &self.0
    }
}

/// A decoded shared pool, cheap to clone.
#[derive(Debug, Clone)]
pub enum Pool {
    /// String records addressed by code.
    Strings(Arc<StringPool>),
    /// Values of vectors and tensors.
    Floats(Arc<[f32]>),
    /// Raw bytes of binary values.
    Binary(Bytes),
    /// Values of index lists.
    Indices(Arc<[u32]>),
    /// Pairs of weighted index lists.
    Weighted(Arc<[WeightedIndex]>),
}

impl Pool {
    /// Decode the bytes of `region`.
    pub fn parse(region: Region, bytes: Bytes) -> StrataResult<Self> {
        Ok(match region {
            Region::StringPool => Pool::Strings(Arc::new(StringPool::parse(&bytes)?)),
            Region::FloatPool => Pool::Floats(decode_fixed::<f32>(&bytes)?.into()),
            Region::BinaryPool => Pool::Binary(bytes),
            Region::IndexPool => Pool::Indices(decode_fixed::<u32>(&bytes)?.into()),
            Region::WeightedIndexPool => {
                if bytes.len() % 8 != 0 {
                    strata_bail!(Malformed: "weighted index pool of {} bytes", bytes.len());
                }
                let mut cursor = ByteCursor::new(&bytes);
                let pairs = (0..bytes.len() / 8)
                    .map(|_| Ok::<_, StrataError>(WeightedIndex::new(cursor.u32()?, cursor.f32()?)))
                    .collect::<StrataResult<Vec<_>>>()?;
                Pool::Weighted(pairs.into())
            }
            Region::Descriptors | Region::Data | Region::Metadata => {
                strata_bail!(Internal: "{region} is not a pool")
            }
        })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Pool::Strings(pool) => pool.len(),
            Pool::Floats(values) => values.len(),
            Pool::Binary(bytes) => bytes.len(),
            Pool::Indices(values) => values.len(),
            Pool::Weighted(values) => values.len(),
        }
    }

    /// Whether the pool holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use strata_dtype::WeightedIndex;

    use crate::{Pool, PoolWriter, RangeDescriptor, Region, StringPool};

    #[test]
    fn untouched_pools_are_absent() {
        let mut pools = PoolWriter::default();
        pools.push_indices(&[4, 5]).unwrap();
        let regions = pools.finish().unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].0, Region::IndexPool);
        assert_eq!(regions[0].1, vec![4, 0, 0, 0, 5, 0, 0, 0]);
    }

    #[test]
    fn empty_lists_still_mark_the_pool_used() {
        let mut pools = PoolWriter::default();
        assert_eq!(pools.push_floats(&[]).unwrap(), RangeDescriptor::new(0, 0));
        let regions = pools.finish().unwrap();
        assert_eq!(regions, vec![(Region::FloatPool, vec![])]);
    }

    #[test]
    fn strings_are_counted_and_coded() {
        let mut pools = PoolWriter::default();
        assert_eq!(pools.push_string("a").unwrap(), 0);
        assert_eq!(pools.push_string("bb").unwrap(), 1);
        let (region, bytes) = pools.finish().unwrap().remove(0);
        assert_eq!(region, Region::StringPool);

        let parsed = StringPool::parse(&bytes).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get(1).unwrap().as_ref(), "bb");
        assert!(parsed.get(2).unwrap_err().is_malformed());
    }

    #[test]
    fn ranges_advance_in_elements() {
        let mut pools = PoolWriter::default();
        pools
            .push_weighted(&[WeightedIndex::new(1, 0.5)])
            .unwrap();
        let second = pools
            .push_weighted(&[WeightedIndex::new(2, 1.0), WeightedIndex::new(3, 2.0)])
            .unwrap();
        assert_eq!(second, RangeDescriptor::new(1, 2));

        let (region, bytes) = pools.finish().unwrap().remove(0);
        let Pool::Weighted(pairs) = Pool::parse(region, Bytes::from(bytes)).unwrap() else {
            unreachable!()
        };
        assert_eq!(pairs[2], WeightedIndex::new(3, 2.0));
    }

    #[test]
    fn misaligned_pool_is_malformed() {
        assert!(
            Pool::parse(Region::FloatPool, Bytes::from_static(&[0, 0, 0]))
                .unwrap_err()
                .is_malformed()
        );
    }
}
