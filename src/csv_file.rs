use anyhow::{Context, Result};
use std::path::Path;

fn delimiter_byte(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character, got {:?}", delimiter);
    }
    Ok(delimiter as u8)
}

/// Read every row of a delimited file as raw string fields, header included,
/// each paired with the 1-based line it starts on.
///
/// Blank lines are skipped. No schema validation happens here: rows may have
/// any number of fields.
pub fn read_numbered_rows(path: &Path, delimiter: char) -> Result<Vec<(usize, Vec<String>)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.with_context(|| format!("failed to read {}", path.display()))?;
        let line = record
            .position()
            .map_or(rows.len() + 1, |p| p.line() as usize);
        rows.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok(rows)
}

/// Like [`read_numbered_rows`], without the line numbers.
pub fn read_rows(path: &Path, delimiter: char) -> Result<Vec<Vec<String>>> {
    Ok(read_numbered_rows(path, delimiter)?
        .into_iter()
        .map(|(_, row)| row)
        .collect())
}

/// Write rows to `path`, one per line, replacing any existing file.
pub fn write_rows<I, R>(path: &Path, rows: I, delimiter: char) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for row in rows {
        wtr.write_record(row)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_rows_including_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "a;b;c\n1;;x y\n2;z\n").unwrap();

        let rows = read_rows(&path, ';').unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["a", "b", "c"],
                vec!["1", "", "x y"],
                vec!["2", "z"],
            ]
        );
    }

    #[test]
    fn quoted_fields_may_contain_the_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "1;\"Calle 1; piso 2\"\n").unwrap();

        let rows = read_rows(&path, ';').unwrap();
        assert_eq!(rows, vec![vec!["1", "Calle 1; piso 2"]]);
    }

    #[test]
    fn blank_lines_are_skipped_and_lines_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "a;b\n\n1;\"two\nlines\"\n2;z\n").unwrap();

        let rows = read_numbered_rows(&path, ';').unwrap();
        assert_eq!(
            rows,
            vec![
                (1, vec!["a".to_string(), "b".to_string()]),
                (3, vec!["1".to_string(), "two\nlines".to_string()]),
                (5, vec!["2".to_string(), "z".to_string()]),
            ]
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_rows(&dir.path().join("missing.csv"), ';').unwrap_err();
        assert!(format!("{:#}", err).contains("failed to open"));
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_rows(&dir.path().join("o.csv"), Vec::<Vec<String>>::new(), '¦').is_err());
    }

    #[test]
    fn writes_one_row_per_line_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "stale contents\nmore\nand more\n").unwrap();

        write_rows(&path, vec![vec!["Hotel"], vec!["Hostel; B&B"]], ';').unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Hotel\n\"Hostel; B&B\"\n");

        let back = read_rows(&path, ';').unwrap();
        assert_eq!(back, vec![vec!["Hotel"], vec!["Hostel; B&B"]]);
    }
}
