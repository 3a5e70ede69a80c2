//! Plain-text rendering of tabular data.

/// Renders rows as left-aligned columns separated by two spaces.
///
/// Ragged rows are allowed; missing cells render as blanks. Trailing
/// whitespace is stripped from every line.
pub fn render_rows(rows: &[Vec<String>]) -> String {
    let column_count = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if column_count == 0 {
        return String::new();
    }

    let mut widths = vec![0usize; column_count];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            let mut line = String::new();
            for (i, width) in widths.iter().enumerate() {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                if i > 0 {
                    line.push_str("  ");
                }
                line.push_str(cell);
                let pad = width.saturating_sub(cell.chars().count());
                line.extend(std::iter::repeat(' ').take(pad));
            }
            line.trim_end().to_string()
        })
        .collect();

    lines.join("\n")
}
