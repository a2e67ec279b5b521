//! Box-drawing table rendering.

use std::iter;

/// Blocks used in progress bars, from empty to full in 1/8 steps.
const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Renders a progress bar with the specified length in chars. The fraction is clamped to `0.0..=1.0`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)] // fine for reporting
pub(crate) fn progress_bar(fraction: f64, length: usize) -> String {
    if length == 0 {
        return String::new();
    }
    if fraction.is_nan() || fraction <= 0.0 {
        return " ".repeat(length);
    }
    if fraction >= 1.0 {
        return BLOCKS[8].to_string().repeat(length);
    }

    let scaled = fraction * length as f64;
    let full = scaled.floor();
    let partial = ((scaled - full) * 8.0).round() as usize;
    let full = full as usize;

    let mut bar: String = iter::repeat(BLOCKS[8]).take(full).collect();
    bar.push(BLOCKS[partial.min(8)]);
    let padding = length.saturating_sub(full + 1);
    bar.extend(iter::repeat(' ').take(padding));
    bar
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Header cell, possibly spanning multiple body columns.
#[derive(Debug)]
pub(crate) struct HeaderCell {
    pub text: String,
    pub span: usize,
}

impl HeaderCell {
    pub fn new(text: impl Into<String>, span: usize) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }
}

/// Table with a title, a single header row, body rows and footer notes.
#[derive(Debug)]
pub(crate) struct Table {
    pub title: String,
    pub header: Vec<HeaderCell>,
    pub body: Vec<Vec<String>>,
    pub notes: Vec<String>,
}

impl Table {
    /// Computes widths of body columns and header cells (both include 1-char padding on each side).
    fn widths(&self) -> (Vec<usize>, Vec<usize>) {
        let column_count: usize = self.header.iter().map(|cell| cell.span).sum();
        let mut body_widths = vec![2; column_count];
        for row in &self.body {
            for (width, cell) in body_widths.iter_mut().zip(row) {
                *width = (*width).max(char_len(cell) + 2);
            }
        }

        let mut header_widths = Vec::with_capacity(self.header.len());
        let mut start = 0;
        for cell in &self.header {
            let columns = &mut body_widths[start..start + cell.span];
            let header_width = char_len(&cell.text) + 2;
            let spanned_width = columns.iter().sum::<usize>() + cell.span - 1;
            if header_width > spanned_width {
                // Distribute the extra width among the spanned columns, leftmost ones first.
                let extra = header_width - spanned_width;
                let (quotient, remainder) = (extra / cell.span, extra % cell.span);
                for (i, width) in columns.iter_mut().enumerate() {
                    *width += quotient + usize::from(i < remainder);
                }
            }
            header_widths.push(header_width.max(spanned_width));
            start += cell.span;
        }
        (body_widths, header_widths)
    }

    pub fn render(&self) -> String {
        let (body_widths, header_widths) = self.widths();
        let table_width = header_widths.iter().sum::<usize>() + header_widths.len() + 1;
        let other_width = iter::once(&self.title)
            .chain(&self.notes)
            .map(|s| char_len(s))
            .max()
            .unwrap_or(0);
        let (left, right) = if other_width > table_width {
            let extra = other_width - table_width;
            (" ".repeat(extra / 2), " ".repeat(extra - extra / 2))
        } else {
            (String::new(), String::new())
        };
        let full_width = table_width.max(other_width);

        let mut lines = vec![format!("{:^full_width$}", self.title)];
        let top = join_with(header_widths.iter().map(|&w| "─".repeat(w)), "┬");
        lines.push(format!("{left}╭{top}╮{right}"));

        let header = join_with(
            self.header
                .iter()
                .zip(&header_widths)
                .map(|(cell, &width)| format!("{:^width$}", cell.text)),
            "│",
        );
        lines.push(format!("{left}│{header}│{right}"));

        let mut start = 0;
        let split = join_with(
            self.header.iter().map(|cell| {
                let columns = &body_widths[start..start + cell.span];
                start += cell.span;
                join_with(columns.iter().map(|&w| "─".repeat(w)), "┬")
            }),
            "┼",
        );
        lines.push(format!("{left}├{split}┤{right}"));

        for row in &self.body {
            let cells = body_widths.iter().enumerate().map(|(i, &width)| {
                let cell = row.get(i).map_or("", String::as_str);
                format!("{cell:^width$}")
            });
            let row = join_with(cells, "│");
            lines.push(format!("{left}│{row}│{right}"));
        }

        let bottom = join_with(body_widths.iter().map(|&w| "─".repeat(w)), "┴");
        lines.push(format!("{left}╰{bottom}╯{right}"));
        lines.extend(self.notes.iter().cloned());

        let lines: Vec<_> = lines.iter().map(|line| line.trim_end()).collect();
        lines.join("\n")
    }
}

fn join_with(parts: impl Iterator<Item = String>, separator: &str) -> String {
    parts.collect::<Vec<_>>().join(separator)
}
