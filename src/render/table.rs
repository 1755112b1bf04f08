//! Column alignment shared by the policy backend and search output.

const TAB_WIDTH: usize = 8;
const MIN_PADDING: usize = 1;

/// A table cell: display text plus the width it occupies on screen.
///
/// Styled text carries ANSI escapes, so its byte length is not its width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    text: String,
    width: usize,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        let width = text.chars().count();
        Self { text, width }
    }

    pub fn styled(text: impl Into<String>, width: usize) -> Self {
        Self { text: text.into(), width }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Self::plain(text)
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Self::plain(text)
    }
}

/// Align columns on tab stops. Every column but the last is padded with
/// tabs up to the stop after its widest cell, so terminals and `column -t`
/// line the output up and lines carry no trailing whitespace.
pub fn align(rows: &[Vec<Cell>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.width);
        }
    }
    let stops: Vec<usize> =
        widths.iter().map(|w| (w + MIN_PADDING).next_multiple_of(TAB_WIDTH)).collect();

    let mut out = String::new();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            out.push_str(&cell.text);
            if i + 1 < row.len() {
                let tabs = (stops[i] - cell.width).div_ceil(TAB_WIDTH);
                out.push_str(&"\t".repeat(tabs));
            }
        }
        out.push('\n');
    }
    out
}
