//! Plain-text tables for the listing commands.

use std::borrow::Cow;
use std::fmt::Write as _;

/// Cells wider than this are cut and marked with `…`.
pub const MAX_CELL_WIDTH: usize = 48;

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let cells = rows
        .iter()
        .map(|row| {
            (0..headers.len())
                .map(|idx| clip(row.get(idx).map(String::as_str).unwrap_or("")))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| h.chars().count().max(3)).collect::<Vec<_>>();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let numeric = (0..headers.len())
        .map(|idx| {
            cells.iter().any(|row| !row[idx].is_empty())
                && cells
                    .iter()
                    .all(|row| row[idx].is_empty() || row[idx].parse::<f64>().is_ok())
        })
        .collect::<Vec<_>>();

    let mut output = String::new();
    let header_cells = headers.iter().map(|h| Cow::Borrowed(*h)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&header_cells, &widths, &[]));
    let rule = widths.iter().map(|w| Cow::Owned("-".repeat(*w))).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &[]));
    for row in &cells {
        let _ = writeln!(output, "{}", format_row(row, &widths, &numeric));
    }
    output
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(cells: &[Cow<'_, str>], widths: &[usize], right_align: &[bool]) -> String {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        if right_align.get(idx).copied().unwrap_or(false) {
            let _ = write!(line, "{cell:>width$}");
        } else {
            let _ = write!(line, "{cell:<width$}");
        }
    }
    line.truncate(line.trim_end().len());
    line
}

fn clip(value: &str) -> Cow<'_, str> {
    let flat: Cow<'_, str> = if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    };
    if flat.chars().count() <= MAX_CELL_WIDTH {
        return flat;
    }
    let mut clipped = flat.chars().take(MAX_CELL_WIDTH - 1).collect::<String>();
    clipped.push('…');
    Cow::Owned(clipped)
}
