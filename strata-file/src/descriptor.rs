use strata_buffer::ByteCursor;
use strata_dtype::LogicalType;
use strata_error::{StrataResult, strata_bail};

use crate::DESCRIPTOR_SIZE;

/// Declares the logical type and on-disk element width of one column.
///
/// ```text
/// u8 tag | 3 reserved bytes | u32 elementSize
/// ```
///
/// A column's offset within the data region is not stored; it is the running sum of
/// `element_size * row_count` over the preceding columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    logical_type: LogicalType,
    element_size: u32,
}

impl ColumnDescriptor {
    /// The descriptor of a column of `logical_type`.
    pub fn new(logical_type: LogicalType) -> Self {
        Self {
            logical_type,
            element_size: logical_type.on_disk_width(),
        }
    }

    /// Logical type of the column.
    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    /// Bytes per element in the data region.
    pub fn element_size(&self) -> u32 {
        self.element_size
    }

    /// Encode the descriptor.
    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut bytes = [0u8; DESCRIPTOR_SIZE];
        bytes[0] = self.logical_type.tag();
        bytes[4..8].copy_from_slice(&self.element_size.to_le_bytes());
        bytes
    }

    /// Read one descriptor, rejecting unknown tags and widths that disagree with the tag.
    pub fn read(cursor: &mut ByteCursor<'_>) -> StrataResult<Self> {
        let logical_type = LogicalType::from_tag(cursor.u8()?)?;
        let _reserved: [u8; 3] = cursor.array()?;
        let element_size = cursor.u32()?;
        if element_size != logical_type.on_disk_width() {
            strata_bail!(
                Malformed: "{logical_type} column declares {element_size}-byte elements, expected {}",
                logical_type.on_disk_width()
            );
        }
        Ok(Self {
            logical_type,
            element_size,
        })
    }

    /// Parse the descriptor array of a table with `column_count` columns.
    pub fn parse_all(bytes: &[u8], column_count: u32) -> StrataResult<Vec<Self>> {
        let expected = column_count as usize * DESCRIPTOR_SIZE;
        if bytes.len() != expected {
            strata_bail!(
                Malformed: "descriptor region holds {} bytes, expected {expected} for {column_count} columns",
                bytes.len()
            );
        }
        let mut cursor = ByteCursor::new(bytes);
        (0..column_count).map(|_| Self::read(&mut cursor)).collect()
    }
}

#[cfg(test)]
mod tests {
    use strata_dtype::LogicalType;

    use crate::ColumnDescriptor;

    #[test]
    fn round_trip_every_type() {
        let bytes = LogicalType::ALL
            .iter()
            .flat_map(|ty| ColumnDescriptor::new(*ty).to_bytes())
            .collect::<Vec<_>>();
        let parsed = ColumnDescriptor::parse_all(&bytes, LogicalType::ALL.len() as u32).unwrap();
        assert_eq!(
            parsed.iter().map(|d| d.logical_type()).collect::<Vec<_>>(),
            LogicalType::ALL.to_vec()
        );
        assert_eq!(parsed[0].element_size(), 1);
    }

    #[test]
    fn width_must_match_tag() {
        let mut bytes = ColumnDescriptor::new(LogicalType::I32).to_bytes();
        bytes[4] = 8;
        assert!(
            ColumnDescriptor::parse_all(&bytes, 1)
                .unwrap_err()
                .is_malformed()
        );
    }

    #[test]
    fn unknown_tag() {
        let mut bytes = ColumnDescriptor::new(LogicalType::I32).to_bytes();
        bytes[0] = 200;
        assert!(
            ColumnDescriptor::parse_all(&bytes, 1)
                .unwrap_err()
                .is_malformed()
        );
    }

    #[test]
    fn region_size_must_match_column_count() {
        let bytes = ColumnDescriptor::new(LogicalType::U8).to_bytes();
        assert!(ColumnDescriptor::parse_all(&bytes, 2).is_err());
    }
}
