use std::collections::BTreeMap;
use std::io::Read;

use super::normalizer::clean_text;
use super::ImportError;

/// One CSV data row keyed by its raw header text. This is the untyped
/// boundary; validation turns it into a typed lead or a row failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLeadRow {
    pub fields: BTreeMap<String, String>,
    /// 1-based data record number in the source file, when parsed from one.
    pub record: Option<usize>,
}

impl RawLeadRow {
    pub fn new<K, V, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            record: None,
        }
    }
}

/// Read CSV text into raw rows, refusing files with more than `max_rows`
/// data rows. Ragged rows are allowed; missing trailing cells read as empty.
///
/// Records whose cells are all empty are dropped but keep their place in the
/// numbering, so `RawLeadRow::record` matches the data record in the file.
/// Completely empty lines are not records and are not counted.
pub fn parse_rows<R: Read>(reader: R, max_rows: usize) -> Result<Vec<RawLeadRow>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(clean_text)
        .collect();

    let mut rows = Vec::new();
    let mut found = 0;
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        found += 1;
        if found > max_rows {
            continue;
        }

        let fields = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !header.is_empty())
            .map(|(column, header)| {
                let value = record.get(column).map(clean_text).unwrap_or_default();
                (header.clone(), value)
            })
            .collect();
        rows.push(RawLeadRow {
            fields,
            record: Some(index + 1),
        });
    }

    if found > max_rows {
        return Err(ImportError::TooManyRows {
            limit: max_rows,
            found,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_rows_keyed_by_header() {
        let csv = "First Name,Last Name,Phone\nPat,Doe,515-555-0134\n";
        let rows = parse_rows(Cursor::new(csv), 10).expect("parse");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields["First Name"], "Pat");
        assert_eq!(rows[0].fields["Phone"], "515-555-0134");
    }

    #[test]
    fn short_rows_fill_missing_cells_with_empty_strings() {
        let csv = "first_name,last_name,email\nPat\n";
        let rows = parse_rows(Cursor::new(csv), 10).expect("parse");
        assert_eq!(rows[0].fields["email"], "");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let csv = "first_name,last_name\nPat,Doe\n,\nSam,Roe\n";
        let rows = parse_rows(Cursor::new(csv), 10).expect("parse");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn empty_records_keep_their_place_in_the_numbering() {
        let csv = "first_name,last_name\nPat,Doe\n,\n\nSam,Roe\n";
        let rows = parse_rows(Cursor::new(csv), 10).expect("parse");
        let records: Vec<_> = rows.iter().map(|row| row.record).collect();
        assert_eq!(records, vec![Some(1), Some(3)]);
    }

    #[test]
    fn refuses_files_over_the_row_limit() {
        let csv = "first_name\nA\nB\nC\n";
        match parse_rows(Cursor::new(csv), 2) {
            Err(ImportError::TooManyRows { limit, found }) => {
                assert_eq!(limit, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected row limit error, got {other:?}"),
        }
    }
}
