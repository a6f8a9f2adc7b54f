use strata_buffer::{ByteCursor, Metadata};
use strata_error::{StrataResult, strata_bail};

/// Table metadata followed by one record per column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMetadata {
    /// Table-level record.
    pub table: Metadata,
    /// One record per column, in column order.
    pub columns: Vec<Metadata>,
}

impl TableMetadata {
    /// Encode as `1 + columns.len()` records of `u32 len | JSON object`.
    pub fn to_bytes(&self) -> StrataResult<Vec<u8>> {
        let mut out = Vec::new();
        for record in std::iter::once(&self.table).chain(&self.columns) {
            let json = serde_json::to_vec(record)?;
            out.extend_from_slice(&u32::try_from(json.len())?.to_le_bytes());
            out.extend_from_slice(&json);
        }
        Ok(out)
    }

    /// Parse the region of a table with `column_count` columns.
    ///
    /// Trailing zero bytes are padding left by an in-place update that shrank the region.
    pub fn parse(bytes: &[u8], column_count: u32) -> StrataResult<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let mut read_record = || -> StrataResult<Metadata> {
            let len = cursor.u32()? as usize;
            Ok(serde_json::from_slice(cursor.take(len)?)?)
        };
        let table = read_record()?;
        let columns = (0..column_count)
            .map(|_| read_record())
            .collect::<StrataResult<Vec<_>>>()?;

        let padding = &bytes[cursor.position()..];
        if padding.iter().any(|b| *b != 0) {
            strata_bail!(Malformed: "unexpected bytes after {} metadata records", column_count + 1);
        }
        Ok(Self { table, columns })
    }
}

#[cfg(test)]
mod tests {
    use strata_buffer::Metadata;

    use crate::TableMetadata;

    fn metadata() -> TableMetadata {
        TableMetadata {
            table: Metadata::new().with("name", "events"),
            columns: vec![Metadata::new(), Metadata::new().with("unit", "ms")],
        }
    }

    #[test]
    fn records_are_length_prefixed_json() {
        let bytes = metadata().to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &17u32.to_le_bytes());
        assert_eq!(&bytes[4..21], br#"{"name":"events"}"#);
        assert_eq!(&bytes[21..25], &2u32.to_le_bytes());
        assert_eq!(&bytes[25..27], b"{}");
        assert_eq!(TableMetadata::parse(&bytes, 2).unwrap(), metadata());
    }

    #[test]
    fn zero_padding_is_ignored() {
        let mut bytes = metadata().to_bytes().unwrap();
        bytes.extend_from_slice(&[0; 9]);
        assert_eq!(TableMetadata::parse(&bytes, 2).unwrap(), metadata());

        bytes.push(1);
        assert!(TableMetadata::parse(&bytes, 2).unwrap_err().is_malformed());
    }

    #[test]
    fn missing_column_record() {
        let bytes = metadata().to_bytes().unwrap();
        assert!(TableMetadata::parse(&bytes, 3).unwrap_err().is_malformed());
    }

    #[test]
    fn invalid_json() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{]");
        assert!(TableMetadata::parse(&bytes, 0).is_err());
    }
}
