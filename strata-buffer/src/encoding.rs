use std::hash::Hash;
use std::sync::Arc;

use strata_dtype::{Matrix, Tensor3, Tensor4, WeightedIndex};
use strata_error::{StrataError, StrataResult, strata_bail, strata_err};

use crate::ByteCursor;

/// Longest string, in UTF-16 code units, that fits the 16-bit length prefixes of a string
/// record. A UTF-16 unit expands to at most three UTF-8 bytes, so the byte count cannot overflow.
pub const MAX_STRING_UTF16_LEN: usize = u16::MAX as usize / 3;

/// An element type that can be stored in a [`CompositeBuffer`](crate::CompositeBuffer).
///
/// Each implementation fixes how a whole block is encoded when it is spilled and how values are
/// keyed for distinct tracking. Fixed-width values are copied back to back with no framing,
/// variable-length values use `u32 totalBytes | (u32 len | payload)*` and strings use
/// `u32 blockBytes | u32 count | (u16 utf16Len | u16 utf8Len | utf8)*`.
pub trait BlockElement: Clone + Send + Sync + 'static {
    /// Hashable identity of a value for distinct tracking.
    type Key: Hash + Eq + Send + Sync;

    /// The distinct-tracking key of this value. Floats are keyed by bit pattern.
    fn distinct_key(&self) -> Self::Key;

    /// Reject values that cannot be encoded. Called before a value changes any buffer state.
    fn validate(&self) -> StrataResult<()> {
        Ok(())
    }

    /// Append the encoding of `items` to `out`.
    fn encode_block(items: &[Self], out: &mut Vec<u8>) -> StrataResult<()>;

    /// Decode a block previously produced by [`BlockElement::encode_block`].
    fn decode_block(bytes: &[u8]) -> StrataResult<Vec<Self>>;
}

/// A value with a fixed little-endian width.
pub trait FixedWidth: Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Append the little-endian encoding of this value.
    fn put_le(&self, out: &mut Vec<u8>);

    /// Read one value.
    fn read_le(cursor: &mut ByteCursor<'_>) -> StrataResult<Self>;
}

/// Decode back-to-back fixed-width values.
pub fn decode_fixed<T: FixedWidth>(bytes: &[u8]) -> StrataResult<Vec<T>> {
    if bytes.len() % T::WIDTH != 0 {
        strata_bail!(
            Malformed: "{} bytes is not a whole number of {}-byte values",
            bytes.len(),
            T::WIDTH
        );
    }
    let mut cursor = ByteCursor::new(bytes);
    (0..bytes.len() / T::WIDTH)
        .map(|_| T::read_le(&mut cursor))
        .collect()
}

impl FixedWidth for bool {
    const WIDTH: usize = 1;

    fn put_le(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn read_le(cursor: &mut ByteCursor<'_>) -> StrataResult<Self> {
        match cursor.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(strata_err!(Malformed: "invalid boolean byte {other}")),
        }
    }
}

macro_rules! fixed_width {
    ($($T:ty),+) => {
        $(
            impl FixedWidth for $T {
                const WIDTH: usize = size_of::<$T>();

                fn put_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(cursor: &mut ByteCursor<'_>) -> StrataResult<Self> {
                    Ok(<$T>::from_le_bytes(cursor.array()?))
                }
            }
        )+
    };
}

fixed_width!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

macro_rules! unmanaged_element {
    ($T:ty, $Key:ty, |$v:ident| $key:expr) => {
        impl BlockElement for $T {
            type Key = $Key;

            fn distinct_key(&self) -> $Key {
                let $v = *self;
                $key
            }

            fn encode_block(items: &[Self], out: &mut Vec<u8>) -> StrataResult<()> {
                out.reserve(items.len() * <$T as FixedWidth>::WIDTH);
                items.iter().for_each(|item| item.put_le(out));
                Ok(())
            }

            fn decode_block(bytes: &[u8]) -> StrataResult<Vec<Self>> {
                decode_fixed(bytes)
            }
        }
    };
}

unmanaged_element!(bool, bool, |v| v);
unmanaged_element!(i8, i8, |v| v);
unmanaged_element!(i16, i16, |v| v);
unmanaged_element!(i32, i32, |v| v);
unmanaged_element!(i64, i64, |v| v);
unmanaged_element!(u8, u8, |v| v);
unmanaged_element!(u16, u16, |v| v);
unmanaged_element!(u32, u32, |v| v);
unmanaged_element!(u64, u64, |v| v);
unmanaged_element!(f32, u32, |v| v.to_bits());
unmanaged_element!(f64, u64, |v| v.to_bits());

/// A variable-length value that produces its own payload bytes.
trait ManagedElement: Sized {
    fn payload_len(&self) -> usize;

    fn encode_payload(&self, out: &mut Vec<u8>);

    fn decode_payload(payload: &[u8]) -> StrataResult<Self>;
}

fn encode_managed_block<T: ManagedElement>(items: &[T], out: &mut Vec<u8>) -> StrataResult<()> {
    let prefix_at = out.len();
    out.extend_from_slice(&[0; 4]);
    for item in items {
        let len = u32::try_from(item.payload_len())?;
        out.extend_from_slice(&len.to_le_bytes());
        item.encode_payload(out);
    }
    let total = u32::try_from(out.len() - prefix_at - 4)?;
    out[prefix_at..prefix_at + 4].copy_from_slice(&total.to_le_bytes());
    Ok(())
}

fn decode_managed_block<T: ManagedElement>(bytes: &[u8]) -> StrataResult<Vec<T>> {
    let mut cursor = ByteCursor::new(bytes);
    let total = cursor.u32()? as usize;
    if total != cursor.remaining() {
        strata_bail!(
            Malformed: "managed block declares {total} bytes but holds {}",
            cursor.remaining()
        );
    }
    let mut items = Vec::new();
    while !cursor.is_empty() {
        let len = cursor.u32()? as usize;
        items.push(T::decode_payload(cursor.take(len)?)?);
    }
    Ok(items)
}

macro_rules! managed_element {
    ($($T:ty),+) => {
        $(
            impl BlockElement for $T {
                type Key = Vec<u8>;

                fn distinct_key(&self) -> Vec<u8> {
                    let mut key = Vec::with_capacity(self.payload_len());
                    self.encode_payload(&mut key);
                    key
                }

                fn validate(&self) -> StrataResult<()> {
                    u32::try_from(self.payload_len())?;
                    Ok(())
                }

                fn encode_block(items: &[Self], out: &mut Vec<u8>) -> StrataResult<()> {
                    encode_managed_block(items, out)
                }

                fn decode_block(bytes: &[u8]) -> StrataResult<Vec<Self>> {
                    decode_managed_block(bytes)
                }
            }
        )+
    };
}

managed_element!(Vec<u8>, Vec<u32>, Vec<f32>, Vec<WeightedIndex>, Matrix, Tensor3, Tensor4);

impl ManagedElement for Vec<u8> {
    fn payload_len(&self) -> usize {
        self.len()
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode_payload(payload: &[u8]) -> StrataResult<Self> {
        Ok(payload.to_vec())
    }
}

macro_rules! fixed_list_payload {
    ($($T:ty),+) => {
        $(
            impl ManagedElement for Vec<$T> {
                fn payload_len(&self) -> usize {
                    self.len() * <$T as FixedWidth>::WIDTH
                }

                fn encode_payload(&self, out: &mut Vec<u8>) {
                    self.iter().for_each(|v| v.put_le(out));
                }

                fn decode_payload(payload: &[u8]) -> StrataResult<Self> {
                    decode_fixed(payload)
                }
            }
        )+
    };
}

fixed_list_payload!(u32, f32);

impl ManagedElement for Vec<WeightedIndex> {
    fn payload_len(&self) -> usize {
        self.len() * 8
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        for WeightedIndex { index, weight } in self {
            out.extend_from_slice(&index.to_le_bytes());
            out.extend_from_slice(&weight.to_le_bytes());
        }
    }

    fn decode_payload(payload: &[u8]) -> StrataResult<Self> {
        if payload.len() % 8 != 0 {
            strata_bail!(Malformed: "weighted index payload of {} bytes", payload.len());
        }
        let mut cursor = ByteCursor::new(payload);
        (0..payload.len() / 8)
            .map(|_| Ok::<_, StrataError>(WeightedIndex::new(cursor.u32()?, cursor.f32()?)))
            .collect()
    }
}

macro_rules! tensor_payload {
    ($T:ident { $($dim:ident),+ }) => {
        impl ManagedElement for $T {
            fn payload_len(&self) -> usize {
                self.shape().len() * 4 + self.data().len() * 4
            }

            fn encode_payload(&self, out: &mut Vec<u8>) {
                $(out.extend_from_slice(&self.$dim().to_le_bytes());)+
                self.data().iter().for_each(|v| v.put_le(out));
            }

            fn decode_payload(payload: &[u8]) -> StrataResult<Self> {
                let mut cursor = ByteCursor::new(payload);
                $(let $dim = cursor.u32()?;)+
                let data = decode_fixed::<f32>(cursor.take(cursor.remaining())?)?;
                $T::try_new($($dim,)+ data)
                    .map_err(|err| err.with_context(concat!("decoding ", stringify!($T))))
            }
        }
    };
}

tensor_payload!(Matrix { rows, columns });
tensor_payload!(Tensor3 { depth, rows, columns });
tensor_payload!(Tensor4 { outer, depth, rows, columns });

/// The UTF-16 length and UTF-8 length of a string, failing if it is too long for a string
/// record.
pub fn string_lengths(value: &str) -> StrataResult<(u16, u16)> {
    let utf16 = value.encode_utf16().count();
    if utf16 > MAX_STRING_UTF16_LEN {
        strata_bail!(OutOfBounds: utf16, 0, MAX_STRING_UTF16_LEN);
    }
    Ok((u16::try_from(utf16)?, u16::try_from(value.len())?))
}

/// Append a `u16 utf16Len | u16 utf8Len | utf8` record.
pub fn put_string_record(value: &str, out: &mut Vec<u8>) -> StrataResult<()> {
    let (utf16, utf8) = string_lengths(value)?;
    out.extend_from_slice(&utf16.to_le_bytes());
    out.extend_from_slice(&utf8.to_le_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Read one record written by [`put_string_record`].
pub fn read_string_record(cursor: &mut ByteCursor<'_>) -> StrataResult<Arc<str>> {
    let utf16 = cursor.u16()? as usize;
    let utf8 = cursor.u16()? as usize;
    let value = std::str::from_utf8(cursor.take(utf8)?)
        .map_err(|err| strata_err!(Malformed: "string record is not UTF-8: {err}"))?;
    let actual = value.encode_utf16().count();
    if actual != utf16 {
        strata_bail!(Malformed: "string record declares {utf16} UTF-16 units but holds {actual}");
    }
    Ok(Arc::from(value))
}

impl BlockElement for Arc<str> {
    type Key = Arc<str>;

    fn distinct_key(&self) -> Arc<str> {
        self.clone()
    }

    fn validate(&self) -> StrataResult<()> {
        string_lengths(self).map(|_| ())
    }

    fn encode_block(items: &[Self], out: &mut Vec<u8>) -> StrataResult<()> {
        let prefix_at = out.len();
        out.extend_from_slice(&[0; 8]);
        for item in items {
            put_string_record(item, out)?;
        }
        let block_bytes = u32::try_from(out.len() - prefix_at - 8)?;
        let count = u32::try_from(items.len())?;
        out[prefix_at..prefix_at + 4].copy_from_slice(&block_bytes.to_le_bytes());
        out[prefix_at + 4..prefix_at + 8].copy_from_slice(&count.to_le_bytes());
        Ok(())
    }

    fn decode_block(bytes: &[u8]) -> StrataResult<Vec<Self>> {
        let mut cursor = ByteCursor::new(bytes);
        let block_bytes = cursor.u32()? as usize;
        let count = cursor.u32()? as usize;
        if block_bytes != cursor.remaining() {
            strata_bail!(
                Malformed: "string block declares {block_bytes} bytes but holds {}",
                cursor.remaining()
            );
        }
        let items = (0..count)
            .map(|_| read_string_record(&mut cursor))
            .collect::<StrataResult<Vec<_>>>()?;
        if !cursor.is_empty() {
            strata_bail!(Malformed: "{} trailing bytes after {count} strings", cursor.remaining());
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;
    use strata_dtype::{Matrix, Tensor3, WeightedIndex};

    use crate::{BlockElement, MAX_STRING_UTF16_LEN, put_string_record, string_lengths};

    fn encode<T: BlockElement>(items: &[T]) -> Vec<u8> {
        let mut out = Vec::new();
        T::encode_block(items, &mut out).unwrap();
        out
    }

    #[test]
    fn unmanaged_is_raw_little_endian() {
        assert_eq!(encode(&[1i32, -1]), vec![1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(encode(&[true, false]), vec![1, 0]);
        assert_eq!(i32::decode_block(&encode(&[7i32, 8, 9])).unwrap(), vec![7, 8, 9]);
        assert!(i32::decode_block(&[0, 0, 0]).unwrap_err().is_malformed());
        assert!(bool::decode_block(&[2]).unwrap_err().is_malformed());
    }

    #[test]
    fn managed_block_layout() {
        let bytes = encode(&[vec![1u8, 2], vec![3u8]]);
        assert_eq!(bytes, vec![11, 0, 0, 0, 2, 0, 0, 0, 1, 2, 1, 0, 0, 0, 3]);
        assert_eq!(
            Vec::<u8>::decode_block(&bytes).unwrap(),
            vec![vec![1u8, 2], vec![3u8]]
        );
    }

    #[test]
    fn tensor_payload_leads_with_shape() {
        let matrix = Matrix::try_new(1, 2, vec![0.5, 1.5]).unwrap();
        let bytes = encode(std::slice::from_ref(&matrix));
        // total, element length, rows, columns
        assert_eq!(&bytes[0..4], &20u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &16u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2u32.to_le_bytes());
        assert_eq!(Matrix::decode_block(&bytes).unwrap(), vec![matrix]);

        let tensor = Tensor3::try_new(2, 1, 1, vec![1.0, 2.0]).unwrap();
        assert_eq!(
            Tensor3::decode_block(&encode(std::slice::from_ref(&tensor))).unwrap(),
            vec![tensor]
        );
    }

    #[test]
    fn weighted_indices() {
        let items = vec![vec![WeightedIndex::new(3, 0.25), WeightedIndex::new(9, 2.0)], vec![]];
        assert_eq!(Vec::<WeightedIndex>::decode_block(&encode(&items)).unwrap(), items);
    }

    #[test]
    fn truncated_managed_block_is_malformed() {
        let mut bytes = encode(&[vec![1u32, 2, 3]]);
        bytes.pop();
        assert!(Vec::<u32>::decode_block(&bytes).unwrap_err().is_malformed());
    }

    #[test]
    fn string_block_layout() {
        let items: Vec<Arc<str>> = vec!["a".into(), "é".into()];
        let bytes = encode(&items);
        // 8-byte prefix, then (1, 1, 'a') and (1, 2, 0xc3 0xa9)
        assert_eq!(&bytes[0..4], &11u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..13], &[1, 0, 1, 0, b'a']);
        assert_eq!(&bytes[13..17], &[1, 0, 2, 0]);
        assert_eq!(Arc::<str>::decode_block(&bytes).unwrap(), items);
    }

    #[rstest]
    #[case::ascii("x", 1, 1)]
    #[case::two_byte("ü", 1, 2)]
    #[case::three_byte("€", 1, 3)]
    #[case::surrogate_pair("𝄞", 2, 4)]
    fn dual_length_prefix(#[case] value: &str, #[case] utf16: u16, #[case] utf8: u16) {
        assert_eq!(string_lengths(value).unwrap(), (utf16, utf8));
    }

    #[test]
    fn string_length_bound() {
        let at_bound = "€".repeat(MAX_STRING_UTF16_LEN);
        assert_eq!(
            string_lengths(&at_bound).unwrap(),
            (21845, u16::MAX)
        );
        let mut out = Vec::new();
        put_string_record(&at_bound, &mut out).unwrap();

        let over = "a".repeat(MAX_STRING_UTF16_LEN + 1);
        assert!(string_lengths(&over).unwrap_err().is_out_of_bounds());
    }
}
