use std::fmt::{Display, Formatter};
use std::ops::Range;

use strata_buffer::ByteCursor;
use strata_error::{StrataResult, strata_bail, strata_err};

use crate::{HEADER_SIZE, MAGIC_BYTES, ORIENTATION_COLUMNS, VERSION};

/// The regions of a table file whose location is recorded in the header, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// The column descriptor array.
    Descriptors,
    /// The column-major data region.
    Data,
    /// String records.
    StringPool,
    /// `f32` values of vectors and tensors.
    FloatPool,
    /// Raw bytes of binary values.
    BinaryPool,
    /// `u32` values of index lists.
    IndexPool,
    /// `(u32, f32)` pairs of weighted index lists.
    WeightedIndexPool,
    /// Table and column metadata records.
    Metadata,
}

impl Region {
    /// Every region, in header order.
    pub const ALL: [Region; 8] = [
        Region::Descriptors,
        Region::Data,
        Region::StringPool,
        Region::FloatPool,
        Region::BinaryPool,
        Region::IndexPool,
        Region::WeightedIndexPool,
        Region::Metadata,
    ];

    /// Whether the region is one of the shared pools, which may be absent.
    pub fn is_pool(&self) -> bool {
        !matches!(self, Region::Descriptors | Region::Data | Region::Metadata)
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Region::Descriptors => "column descriptors",
            Region::Data => "column data",
            Region::StringPool => "string pool",
            Region::FloatPool => "float pool",
            Region::BinaryPool => "binary pool",
            Region::IndexPool => "index pool",
            Region::WeightedIndexPool => "weighted index pool",
            Region::Metadata => "metadata",
        };
        write!(f, "{name}")
    }
}

/// An absolute `(offset, size)` span of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    /// Absolute offset from the start of the file.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
}

impl ByteRange {
    /// A span of `size` bytes starting at `offset`.
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// The `(0, 0)` span marking an absent pool.
    pub fn is_absent(&self) -> bool {
        self.offset == 0 && self.size == 0
    }

    /// One past the last byte, failing on overflow.
    pub fn end(&self) -> StrataResult<u64> {
        self.offset
            .checked_add(self.size)
            .ok_or_else(|| strata_err!(Malformed: "byte range {self} overflows"))
    }

    /// The span as a `Range`.
    pub fn as_range(&self) -> Range<u64> {
        self.offset..self.offset + self.size
    }
}

impl Display for ByteRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, +{})", self.offset, self.size)
    }
}

/// The fixed-size header at the start of a table file.
///
/// ```text
/// magic[4] | u16 version | u8 orientation | u8 reserved | u32 columnCount | u64 rowCount
///          | 8 x (u64 offset, u64 size)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    column_count: u32,
    row_count: u64,
    regions: [ByteRange; 8],
}

impl TableHeader {
    /// A header with every region still unplaced.
    pub fn new(column_count: u32, row_count: u64) -> Self {
        Self {
            column_count,
            row_count,
            regions: [ByteRange::default(); 8],
        }
    }

    /// Number of columns.
    pub fn column_count(&self) -> u32 {
        self.column_count
    }

    /// Number of rows shared by every column.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Location of `region`.
    pub fn region(&self, region: Region) -> ByteRange {
        self.regions[region as usize]
    }

    /// Record the location of `region`.
    pub fn set_region(&mut self, region: Region, range: ByteRange) {
        self.regions[region as usize] = range;
    }

    /// Encode the header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend_from_slice(&MAGIC_BYTES);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.push(ORIENTATION_COLUMNS);
        out.push(0);
        out.extend_from_slice(&self.column_count.to_le_bytes());
        out.extend_from_slice(&self.row_count.to_le_bytes());
        for range in &self.regions {
            out.extend_from_slice(&range.offset.to_le_bytes());
            out.extend_from_slice(&range.size.to_le_bytes());
        }
        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(&out);
        bytes
    }

    /// Parse and validate a header.
    ///
    /// Fails as malformed on a wrong magic number, an unknown version, an orientation other
    /// than column-major, or a zero column or row count.
    pub fn parse(bytes: &[u8]) -> StrataResult<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let magic: [u8; 4] = cursor.array()?;
        if magic != MAGIC_BYTES {
            strata_bail!(Malformed: "not a table file: bad magic number");
        }
        let version = cursor.u16()?;
        if version != VERSION {
            strata_bail!(Malformed: "unsupported table version {version}, expected {VERSION}");
        }
        let orientation = cursor.u8()?;
        if orientation != ORIENTATION_COLUMNS {
            strata_bail!(Malformed: "table orientation {orientation} is not column-oriented");
        }
        let _reserved = cursor.u8()?;
        let column_count = cursor.u32()?;
        let row_count = cursor.u64()?;
        if column_count == 0 {
            strata_bail!(Malformed: "table has no columns");
        }
        if row_count == 0 {
            strata_bail!(Malformed: "table has no rows");
        }

        let mut header = Self::new(column_count, row_count);
        for region in Region::ALL {
            let offset = cursor.u64()?;
            let size = cursor.u64()?;
            header.set_region(region, ByteRange::new(offset, size));
        }
        Ok(header)
    }

    /// Check every region lies within a file of `file_size` bytes, after the header, and that
    /// the mandatory regions are present.
    pub fn validate(&self, file_size: u64) -> StrataResult<()> {
        for region in Region::ALL {
            let range = self.region(region);
            if range.is_absent() {
                if region.is_pool() {
                    continue;
                }
                strata_bail!(Malformed: "the {region} region is missing");
            }
            if range.offset < HEADER_SIZE as u64 || range.end()? > file_size {
                strata_bail!(
                    Malformed: "{region} region {range} lies outside the {file_size} byte file"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ByteRange, HEADER_SIZE, Region, TableHeader};

    fn header() -> TableHeader {
        let mut header = TableHeader::new(2, 10);
        header.set_region(Region::Descriptors, ByteRange::new(148, 16));
        header.set_region(Region::Data, ByteRange::new(164, 80));
        header.set_region(Region::Metadata, ByteRange::new(244, 12));
        header
    }

    #[test]
    fn layout() {
        let bytes = header().to_bytes();
        assert_eq!(&bytes[0..4], b"STRT");
        assert_eq!(&bytes[4..6], &1u16.to_le_bytes());
        assert_eq!(bytes[6], 1);
        assert_eq!(&bytes[8..12], &2u32.to_le_bytes());
        assert_eq!(&bytes[12..20], &10u64.to_le_bytes());
        // descriptors, then data
        assert_eq!(&bytes[20..28], &148u64.to_le_bytes());
        assert_eq!(&bytes[36..44], &164u64.to_le_bytes());
        // metadata is the last pair
        assert_eq!(&bytes[HEADER_SIZE - 16..HEADER_SIZE - 8], &244u64.to_le_bytes());
        assert_eq!(TableHeader::parse(&bytes).unwrap(), header());
    }

    #[rstest]
    #[case::magic(0, b'X')]
    #[case::version(4, 9)]
    #[case::orientation(6, 2)]
    #[case::no_columns(8, 0)]
    #[case::no_rows(12, 0)]
    fn malformed(#[case] at: usize, #[case] byte: u8) {
        let mut bytes = header().to_bytes();
        bytes[at] = byte;
        assert!(TableHeader::parse(&bytes).unwrap_err().is_malformed());
    }

    #[test]
    fn truncated_header() {
        let bytes = header().to_bytes();
        assert!(TableHeader::parse(&bytes[..100]).unwrap_err().is_malformed());
    }

    #[test]
    fn regions_must_fit_the_file() {
        let header = header();
        header.validate(256).unwrap();
        assert!(header.validate(255).unwrap_err().is_malformed());

        let mut missing_data = header.clone();
        missing_data.set_region(Region::Data, ByteRange::default());
        assert!(missing_data.validate(256).unwrap_err().is_malformed());
    }
}
