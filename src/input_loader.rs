use std::fs::File;
use std::path::Path;
use log::{info, warn};
use calamine::{open_workbook_auto, Reader};

use crate::error::InputError;

/// Loads the ordered query list from a spreadsheet or CSV file.
///
/// `column` is matched case-insensitively against the header row. Cells are
/// trimmed and blanks skipped; duplicates are kept in input order.
pub fn load_queries<P: AsRef<Path>>(filename: P, column: &str) -> Result<Vec<String>, InputError> {
    let path = filename.as_ref();

    if !path.exists() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }

    let is_spreadsheet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| matches!(ext.to_lowercase().as_str(), "xlsx" | "xlsm" | "xls" | "ods"));

    let queries = if is_spreadsheet {
        load_spreadsheet(path, column)?
    } else {
        load_csv(path, column)?
    };

    if queries.is_empty() {
        return Err(InputError::Empty(path.to_path_buf()));
    }
    info!("Loaded {} queries from {:?}", queries.len(), path);
    Ok(queries)
}

fn column_index<'a, I>(headers: I, column: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    headers
        .into_iter()
        .position(|h| h.trim().eq_ignore_ascii_case(column.trim()))
}

fn load_csv(path: &Path, column: &str) -> Result<Vec<String>, InputError> {
    let csv_err = |source| InputError::Csv { path: path.to_path_buf(), source };

    let file = File::open(path).map_err(|e| csv_err(csv::Error::from(e)))?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let idx = column_index(headers.iter(), column).ok_or_else(|| InputError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
    })?;

    let mut queries = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        match result {
            Ok(row) => {
                if let Some(q) = row.get(idx).filter(|q| !q.is_empty()) {
                    queries.push(q.to_string());
                }
            }
            Err(e) => warn!("Skipping unreadable CSV row {}: {}", line + 2, e),
        }
    }
    Ok(queries)
}

fn load_spreadsheet(path: &Path, column: &str) -> Result<Vec<String>, InputError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| InputError::Workbook {
        path: path.to_path_buf(),
        source,
    })?;

    let worksheets = workbook.worksheets();
    let (_name, range) = worksheets
        .first()
        .ok_or_else(|| InputError::NoWorksheet(path.to_path_buf()))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    let idx = column_index(header.iter().map(String::as_str), column).ok_or_else(|| {
        InputError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        }
    })?;

    Ok(rows
        .filter_map(|row| row.get(idx))
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|q| !q.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_query_column_in_order_with_duplicates() {
        let file = csv_file("Id,Queries\n1,  Luka Doncic Prizm \n2,\n3,Wembanyama\n4,Luka Doncic Prizm\n");
        let queries = load_queries(file.path(), "Queries").unwrap();
        assert_eq!(queries, vec!["Luka Doncic Prizm", "Wembanyama", "Luka Doncic Prizm"]);
    }

    #[test]
    fn header_match_ignores_case() {
        let file = csv_file("queries\nA\n");
        assert_eq!(load_queries(file.path(), "Queries").unwrap(), vec!["A"]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let file = csv_file("Name\nA\n");
        let err = load_queries(file.path(), "Queries").unwrap_err();
        assert!(matches!(err, InputError::MissingColumn { .. }));
    }

    #[test]
    fn empty_list_is_an_error() {
        let file = csv_file("Queries\n\n");
        assert!(matches!(load_queries(file.path(), "Queries"), Err(InputError::Empty(_))));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_queries("/definitely/not/here.xlsx", "Queries").unwrap_err();
        assert!(matches!(err, InputError::NotFound(_)));
    }
}
