use crate::solver::matrix::builder::MatrixBuilder;
use crate::solver::matrix::csc::CscMatrix;
use crate::solver::matrix::error::{MatrixError, MatrixMarketError};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MmField {
    Integer,
    Real,
}

/// Load a sparse matrix from a MatrixMarket `.mtx` file (coordinate format) into a canonical CSC.
///
/// Supports:
/// - banner: `%%MatrixMarket matrix coordinate {integer|real} general`
/// - 1-based indices in the file, converted to 0-based indices internally.
///
/// Explicit zeros are kept so the pattern matches what was stored in the file.
pub fn load_matrix_market_csc_file(path: impl AsRef<Path>) -> Result<CscMatrix, MatrixError> {
    let f = File::open(path.as_ref()).map_err(MatrixMarketError::from)?;
    load_matrix_market_csc_from_reader(BufReader::new(f))
}

/// Next line that is neither empty nor a `%` comment, with its 1-based line number.
fn next_content_line<I>(lines: &mut I) -> Result<Option<(usize, String)>, MatrixMarketError>
where
    I: Iterator<Item = (usize, std::io::Result<String>)>,
{
    for (i, line) in lines {
        let line = line?;
        let t = line.trim();
        if t.is_empty() || t.starts_with('%') {
            continue;
        }
        return Ok(Some((i + 1, t.to_string())));
    }
    Ok(None)
}

fn parse_size(token: &str, what: &str, line_no: usize) -> Result<usize, MatrixMarketError> {
    token.parse().map_err(|e| {
        MatrixMarketError::InvalidSizeLine(format!("bad {what} '{token}' at line {line_no} ({e})"))
    })
}

/// Same as [`load_matrix_market_csc_file`], but reads from any buffered reader (useful for tests).
pub fn load_matrix_market_csc_from_reader<R: BufRead>(reader: R) -> Result<CscMatrix, MatrixError> {
    let mut lines = reader.lines().enumerate();

    // banner is the first non-empty line; it starts with `%%` so it is read by hand
    let (header_line_no, header) = loop {
        match lines.next() {
            None => return Err(MatrixMarketError::InvalidBanner("empty input".to_string()).into()),
            Some((i, line)) => {
                let line = line.map_err(MatrixMarketError::from)?;
                let t = line.trim().trim_start_matches('\u{feff}');
                if !t.is_empty() {
                    break (i + 1, t.to_string());
                }
            }
        }
    };

    let tokens: Vec<&str> = header.split_whitespace().collect();
    if tokens.len() != 5 || tokens[0] != "%%MatrixMarket" {
        return Err(MatrixMarketError::InvalidBanner(format!(
            "expected '%%MatrixMarket matrix coordinate <field> <symmetry>' at line {header_line_no}: {header}"
        ))
        .into());
    }

    let object = tokens[1].to_ascii_lowercase();
    let format = tokens[2].to_ascii_lowercase();
    if object != "matrix" || format != "coordinate" {
        return Err(MatrixMarketError::UnsupportedType(format!(
            "only 'matrix coordinate' is supported, got '{}' '{}'",
            tokens[1], tokens[2]
        ))
        .into());
    }
    if tokens[4].to_ascii_lowercase() != "general" {
        return Err(MatrixMarketError::UnsupportedType(format!(
            "only 'general' symmetry is supported, got '{}'",
            tokens[4]
        ))
        .into());
    }
    let field = match tokens[3].to_ascii_lowercase().as_str() {
        "integer" => MmField::Integer,
        "real" => MmField::Real,
        other => {
            return Err(MatrixMarketError::UnsupportedType(format!(
                "only 'integer' and 'real' fields are supported, got '{other}'"
            ))
            .into());
        }
    };

    let (size_line_no, size_line) = next_content_line(&mut lines)?
        .ok_or_else(|| MatrixMarketError::InvalidSizeLine("missing size line".to_string()))?;
    let parts: Vec<&str> = size_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(MatrixMarketError::InvalidSizeLine(format!(
            "expected 3 integers at line {size_line_no}: {size_line}"
        ))
        .into());
    }
    let nrows = parse_size(parts[0], "nrows", size_line_no)?;
    let ncols = parse_size(parts[1], "ncols", size_line_no)?;
    let nnz = parse_size(parts[2], "nnz", size_line_no)?;

    let mut b = MatrixBuilder::new(nrows, ncols);
    b.reserve(nnz);

    let mut read_entries = 0usize;
    while let Some((line_no, t)) = next_content_line(&mut lines)? {
        if read_entries >= nnz {
            return Err(MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: format!("found more than nnz={nnz} entries"),
            }
            .into());
        }

        let parts: Vec<&str> = t.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: format!("expected 3 tokens 'row col val', got: {t}"),
            }
            .into());
        }

        let index = |token: &str| -> Result<usize, MatrixMarketError> {
            let i: usize = token.parse().map_err(|e| MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: format!("bad index '{token}': {e}"),
            })?;
            i.checked_sub(1).ok_or_else(|| MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: "MatrixMarket indices are 1-based; found 0".to_string(),
            })
        };
        let row = index(parts[0])?;
        let col = index(parts[1])?;

        let val = match field {
            MmField::Integer => {
                let v: i64 = parts[2].parse().map_err(|e| MatrixMarketError::InvalidEntry {
                    line: line_no,
                    msg: format!("bad integer value '{}': {}", parts[2], e),
                })?;
                v as f64
            }
            MmField::Real => parts[2].parse().map_err(|e| MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: format!("bad real value '{}': {}", parts[2], e),
            })?,
        };

        // MatrixBuilder expects (column, row, value)
        b.push(col, row, val)?;
        read_entries += 1;
    }

    if read_entries != nnz {
        return Err(MatrixMarketError::EntryCountMismatch {
            expected: nnz,
            actual: read_entries,
        }
        .into());
    }

    Ok(b.build_csc()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_small_integer_coordinate_general() {
        // 3x3 with duplicates in same position (1,1), an explicit zero and a comment line.
        let mtx = r#"
%%MatrixMarket matrix coordinate integer general
% a comment
3 3 5
1 1 2
1 1 3
3 1 4
2 3 5
2 2 0
"#;

        let a = load_matrix_market_csc_from_reader(Cursor::new(mtx)).unwrap();
        assert!(a.check_invariants().is_ok());

        assert_eq!(a.dim.nrows, 3);
        assert_eq!(a.dim.ncols, 3);
        assert_eq!(a.nnz(), 4);

        let (r0, v0) = a.col(0);
        assert_eq!(r0, &[0, 2]);
        assert_eq!(v0, &[5.0, 4.0]);

        let (r1, v1) = a.col(1);
        assert_eq!(r1, &[1]);
        assert_eq!(v1, &[0.0]);
    }

    #[test]
    fn rejects_non_general_symmetry() {
        let mtx = r#"%%MatrixMarket matrix coordinate integer symmetric
2 2 1
1 1 1
"#;
        let err = load_matrix_market_csc_from_reader(Cursor::new(mtx)).unwrap_err();
        assert!(format!("{err}").contains("only 'general' symmetry is supported"));
    }

    #[test]
    fn rejects_zero_based_index() {
        let mtx = "%%MatrixMarket matrix coordinate real general\n2 2 1\n0 1 1.5\n";
        let err = load_matrix_market_csc_from_reader(Cursor::new(mtx)).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"invalid entry at line 3: MatrixMarket indices are 1-based; found 0");
    }

    #[test]
    fn rejects_short_entry_list() {
        let mtx = "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.5\n";
        let err = load_matrix_market_csc_from_reader(Cursor::new(mtx)).unwrap_err();
        assert!(matches!(
            err,
            MatrixError::MatrixMarket(MatrixMarketError::EntryCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }
}
