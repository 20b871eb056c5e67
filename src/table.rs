use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use camino::Utf8Path;
use flate2::read::GzDecoder;
use serde::Serialize;

use crate::error::KiraError;
use crate::store::Store;

/// A header plus rows of string cells, read from and written to TSV.
///
/// Cells are escaped on write (`\\`, `\t`, `\n`, `\r`) and unescaped on read,
/// so any string value survives a write/read cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    /// 1-based source line of each row.
    #[serde(skip)]
    lines: Vec<usize>,
}

/// Source line numbers are bookkeeping and do not take part in equality.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.rows == other.rows
    }
}

impl Eq for Table {}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn with_columns(columns: &[&str]) -> Self {
        Self::new(columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Line of row `index` in the file it was read from. Rows built in memory
    /// get the line they would have in `to_tsv` output.
    pub fn line(&self, index: usize) -> usize {
        self.lines.get(index).copied().unwrap_or(index + 2)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), KiraError> {
        if row.len() != self.columns.len() {
            return Err(KiraError::SchemaMismatch {
                path: "<memory>".to_string(),
                message: format!(
                    "row has {} cells but table has {} columns",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        self.append(row, self.rows.len() + 2);
        Ok(())
    }

    fn append(&mut self, row: Vec<String>, line: usize) {
        self.rows.push(row);
        self.lines.push(line);
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.columns
            .iter()
            .position(|column| column.trim().to_lowercase() == wanted)
    }

    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    /// Reads a TSV file; a `.gz` extension selects gzip decoding.
    pub fn read_path(path: &Utf8Path) -> Result<Self, KiraError> {
        let file = File::open(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("open {path}: {err}")))?;
        let reader: Box<dyn Read> = if path.extension() == Some("gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Self::from_reader(BufReader::new(reader), path.as_str())
    }

    /// Blank lines are skipped anywhere; `#` comment lines only before the
    /// header.
    pub fn from_reader<R: BufRead>(reader: R, label: &str) -> Result<Self, KiraError> {
        let mut lines = reader.lines().enumerate();
        let columns = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line.map_err(|err| KiraError::Filesystem(err.to_string()))?;
                    let line = line.trim_end_matches('\r');
                    if line.trim().is_empty() || line.trim_start().starts_with('#') {
                        continue;
                    }
                    break split_line(line);
                }
                None => {
                    return Err(KiraError::TableParse {
                        path: label.to_string(),
                        line: 0,
                        message: "missing header".to_string(),
                    });
                }
            }
        };

        let mut table = Self::new(columns);
        for (index, line) in lines {
            let line = line.map_err(|err| KiraError::Filesystem(err.to_string()))?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let cells = split_line(line);
            if cells.len() != table.columns.len() {
                return Err(KiraError::TableParse {
                    path: label.to_string(),
                    line: index + 1,
                    message: format!(
                        "expected {} cells, found {}",
                        table.columns.len(),
                        cells.len()
                    ),
                });
            }
            table.append(cells, index + 1);
        }
        Ok(table)
    }

    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        push_line(&mut out, &self.columns);
        for row in &self.rows {
            push_line(&mut out, row);
        }
        out
    }

    pub fn write_path(&self, path: &Utf8Path) -> Result<(), KiraError> {
        Store::write_bytes_atomic(path, self.to_tsv().as_bytes())
    }

    /// Concatenates tables that all begin with `required` columns, in order.
    ///
    /// Columns past the required prefix are unioned in first-seen order; cells
    /// a table does not have are left empty.
    pub fn concat(tables: &[(String, Table)], required: &[&str]) -> Result<Table, KiraError> {
        let mut columns: Vec<String> = required.iter().map(|c| c.to_string()).collect();
        for (label, table) in tables {
            let prefix = table.columns.iter().take(required.len());
            let matches = table.columns.len() >= required.len()
                && prefix.zip(required).all(|(have, want)| have == want);
            if !matches {
                return Err(KiraError::SchemaMismatch {
                    path: label.clone(),
                    message: format!(
                        "expected leading columns [{}], found [{}]",
                        required.join(", "),
                        table.columns.join(", ")
                    ),
                });
            }
            for column in &table.columns[required.len()..] {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut combined = Table::new(columns);
        for (_, table) in tables {
            let positions: Vec<Option<usize>> = combined
                .columns
                .iter()
                .map(|column| table.columns.iter().position(|c| c == column))
                .collect();
            for row in &table.rows {
                let cells = positions
                    .iter()
                    .map(|pos| pos.map(|i| row[i].clone()).unwrap_or_default())
                    .collect();
                let line = combined.rows.len() + 2;
                combined.append(cells, line);
            }
        }
        Ok(combined)
    }
}

fn push_line(out: &mut String, cells: &[String]) {
    let escaped: Vec<String> = cells.iter().map(|cell| escape(cell)).collect();
    out.push_str(&escaped.join("\t"));
    out.push('\n');
}

fn split_line(line: &str) -> Vec<String> {
    line.split('\t').map(unescape).collect()
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn escaped_cells_survive_reading() {
        let mut table = Table::with_columns(&["a", "b"]);
        table
            .push_row(vec!["tab\there".to_string(), "back\\slash".to_string()])
            .unwrap();
        let text = table.to_tsv();
        let read = Table::from_reader(text.as_bytes(), "memory").unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Table::from_reader("a\tb\n1\n".as_bytes(), "memory").unwrap_err();
        assert_matches!(err, KiraError::TableParse { line: 2, .. });
    }

    #[test]
    fn rows_remember_their_source_line() {
        let text = "# exported by hand\n\na\tb\n1\t2\n\n\n3\t4\n";
        let table = Table::from_reader(text.as_bytes(), "memory").unwrap();
        assert_eq!(table.columns(), &["a", "b"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.line(0), 4);
        assert_eq!(table.line(1), 7);
    }

    #[test]
    fn concat_unions_extra_columns() {
        let mut left = Table::with_columns(&["id", "x"]);
        left.push_row(vec!["1".into(), "a".into()]).unwrap();
        let mut right = Table::with_columns(&["id", "y"]);
        right.push_row(vec!["2".into(), "b".into()]).unwrap();

        let combined = Table::concat(
            &[("left".to_string(), left), ("right".to_string(), right)],
            &["id"],
        )
        .unwrap();
        assert_eq!(combined.columns(), &["id", "x", "y"]);
        assert_eq!(combined.rows()[0], vec!["1", "a", ""]);
        assert_eq!(combined.rows()[1], vec!["2", "", "b"]);
    }

    #[test]
    fn concat_rejects_foreign_prefix() {
        let other = Table::with_columns(&["name", "id"]);
        let err = Table::concat(&[("other".to_string(), other)], &["id"]).unwrap_err();
        assert_matches!(err, KiraError::SchemaMismatch { .. });
    }
}
