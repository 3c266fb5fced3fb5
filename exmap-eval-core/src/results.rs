//! Parser of the result block the renderer prints at the end of an evaluation run.
//!
//! ```text
//! ...log output of the renderer...
//! -----EVALUATION RESULTS-----
//! samples time
//! 1 12.3
//! 2 13.0
//! ```

use tracing::warn;

pub const SENTINEL: &str = "-----EVALUATION RESULTS-----";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum OutputError {
    #[error("renderer output does not contain the line `-----EVALUATION RESULTS-----`")]
    MissingSentinel,
    #[error("renderer output has no result rows after the header")]
    NoRows,
    #[error("result row at line {line} has {found} fields, expected at least {expected}")]
    TooFewFields {
        line: usize,
        found: usize,
        expected: usize,
    },
    #[error("result row at line {line}: `{field}` is not a number")]
    NotANumber { line: usize, field: String },
}

/// rows of numbers following the sentinel and its header line
pub fn parse_rows(stdout: &str) -> Result<Vec<Vec<f64>>, OutputError> {
    let lines: Vec<&str> = stdout.lines().map(|l| l.trim_end()).collect();
    let i_sentinel = lines
        .iter()
        .position(|&l| l == SENTINEL)
        .ok_or(OutputError::MissingSentinel)?;
    let mut rows = vec![];
    // i_sentinel + 1 is the header
    for (i_line, line) in lines.iter().enumerate().skip(i_sentinel + 2) {
        if line.trim().is_empty() {
            break;
        }
        let mut row = vec![];
        for field in line.split_whitespace() {
            let v = field.parse::<f64>().map_err(|_| OutputError::NotANumber {
                line: i_line + 1,
                field: field.to_string(),
            })?;
            row.push(v);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(OutputError::NoRows);
    }
    Ok(rows)
}

/// `(index, value)` taken from the first two fields of every row
pub fn parse_pairs(stdout: &str) -> Result<Vec<(f64, f64)>, OutputError> {
    let rows = parse_rows(stdout)?;
    let mut pairs = Vec::with_capacity(rows.len());
    for (i_row, row) in rows.iter().enumerate() {
        if row.len() < 2 {
            return Err(OutputError::TooFewFields {
                line: i_row + 1,
                found: row.len(),
                expected: 2,
            });
        }
        if row.len() > 2 {
            warn!("ignoring {} extra fields in result row {}", row.len() - 2, i_row + 1);
        }
        pairs.push((row[0], row[1]));
    }
    Ok(pairs)
}

/// first field of the first row
pub fn parse_scalar(stdout: &str) -> Result<f64, OutputError> {
    let rows = parse_rows(stdout)?;
    rows[0].first().copied().ok_or(OutputError::TooFewFields {
        line: 1,
        found: 0,
        expected: 1,
    })
}

#[test]
fn test_parse_pairs() {
    let stdout = "loading scene\n\
        d\n\
        -----EVALUATION RESULTS-----\n\
        samples time\n\
        1 10.04\n\
        32 14.5\n\
        64 20\n";
    let pairs = parse_pairs(stdout).unwrap();
    assert_eq!(pairs, vec![(1., 10.04), (32., 14.5), (64., 20.)]);
}

#[test]
fn test_parse_crlf_and_trailing_text() {
    let stdout = "-----EVALUATION RESULTS-----\r\nviews time\r\n12 33.3\r\n\r\nshutting down\r\n";
    assert_eq!(parse_pairs(stdout).unwrap(), vec![(12., 33.3)]);
    assert_eq!(parse_scalar(stdout).unwrap(), 12.);
}

#[test]
fn test_parse_errors() {
    assert_eq!(parse_rows("1 2\n3 4\n"), Err(OutputError::MissingSentinel));
    assert_eq!(
        parse_rows("-----EVALUATION RESULTS-----\nheader\n"),
        Err(OutputError::NoRows)
    );
    assert_eq!(
        parse_rows("-----EVALUATION RESULTS-----\nheader\n1 abc\n"),
        Err(OutputError::NotANumber {
            line: 3,
            field: "abc".to_string()
        })
    );
    assert!(matches!(
        parse_pairs("-----EVALUATION RESULTS-----\nheader\n5\n"),
        Err(OutputError::TooFewFields { found: 1, .. })
    ));
}

#[test]
fn test_parse_scalar_gt() {
    let stdout = "-----EVALUATION RESULTS-----\nground truth\n131.25\n";
    assert_eq!(parse_scalar(stdout).unwrap(), 131.25);
}
