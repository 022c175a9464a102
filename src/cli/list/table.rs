use std::fmt::{self, Write};

use crate::color::{MaybePaint, HEADER};

pub(crate) struct Row {
    cells: Vec<String>,
}

impl Row {
    fn is_awk_safe(&self) -> bool {
        self.cells
            .iter()
            .all(|cell| !cell.is_empty() && !cell.contains(char::is_whitespace))
    }

    fn columns(&self) -> usize {
        self.cells.len()
    }
}

impl From<Vec<String>> for Row {
    fn from(value: Vec<String>) -> Self {
        Row { cells: value }
    }
}

impl From<Vec<&str>> for Row {
    fn from(value: Vec<&str>) -> Self {
        Row {
            cells: value.into_iter().map(str::to_owned).collect(),
        }
    }
}

/// Whitespace-aligned columns. Header cells never contain whitespace so the
/// output splits cleanly with `awk` or `cut`.
pub(crate) struct Table {
    header: Row,
    body: Vec<Row>,
    print_header: bool,
}

impl Table {
    pub(crate) fn new(header: impl Into<Row>) -> Table {
        let header = header.into();

        debug_assert!(header.is_awk_safe(), "table header contains whitespace");

        Table {
            header,
            body: Vec::new(),
            print_header: true,
        }
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    /// Appends a row. Missing cells print as `-`; extra cells are dropped.
    pub(crate) fn add_row(&mut self, row: impl Into<Row>) {
        let mut row = row.into();

        row.cells.resize_with(self.header.columns(), || "-".to_string());

        self.body.push(row);
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.header.cells.iter().map(|c| c.chars().count()).collect();

        for row in &self.body {
            for (width, cell) in widths.iter_mut().zip(&row.cells) {
                *width = (*width).max(cell.chars().count());
            }
        }

        widths
    }
}

fn write_row(
    f: &mut fmt::Formatter<'_>,
    row: &Row,
    widths: &[usize],
    paint: impl Fn(&str) -> String,
) -> fmt::Result {
    let last = row.cells.len().saturating_sub(1);

    for (i, (cell, width)) in row.cells.iter().zip(widths).enumerate() {
        // Pad before painting so escape codes do not count towards the width.
        let padded = if i == last {
            cell.clone()
        } else {
            format!("{:<width$}  ", cell, width = *width)
        };

        f.write_str(&paint(&padded))?;
    }

    f.write_char('\n')
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();

        if self.print_header {
            write_row(f, &self.header, &widths, |s| HEADER.maybe_paint(s).to_string())?;
        }

        for row in &self.body {
            write_row(f, row, &widths, str::to_string)?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}
