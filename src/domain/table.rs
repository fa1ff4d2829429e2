//! Plain-text table and paragraph layout used by the printed reports.

/// Truncates to `max` characters, ending with "..." when anything was cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Renders rows as an aligned table with a leading index column. Column
/// widths adapt to the content but never exceed `max_col_width`.
pub fn render_table(columns: &[String], rows: &[Vec<String>], max_col_width: usize) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }
    for width in &mut widths {
        *width = (*width).min(max_col_width);
    }
    let index_width = rows.len().to_string().chars().count().max(1);

    let mut out = String::new();
    out.push_str(&" ".repeat(index_width + 2));
    for (idx, col) in columns.iter().enumerate() {
        let cell = truncate(col, widths[idx]);
        out.push_str(&format!("{:<width$}  ", cell, width = widths[idx]));
    }
    out.push('\n');

    out.push_str(&" ".repeat(index_width + 2));
    for width in &widths {
        out.push_str(&"-".repeat(*width));
        out.push_str("  ");
    }
    out.push('\n');

    for (row_idx, row) in rows.iter().enumerate() {
        out.push_str(&format!("{:>width$}  ", row_idx, width = index_width));
        for (idx, cell) in row.iter().enumerate() {
            let cell = truncate(cell, widths[idx]);
            out.push_str(&format!("{:<width$}  ", cell, width = widths[idx]));
        }
        out.push('\n');
    }
    out
}

/// Greedy word wrap. The first line spans the full `width`; subsequent lines
/// are indented by `subsequent_indent` spaces. A word longer than the line is
/// placed on its own line rather than split.
pub fn fill(text: &str, width: usize, subsequent_indent: usize) -> String {
    let indent = " ".repeat(subsequent_indent);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_width = width;

    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if !current.is_empty() && candidate_len > current_width {
            lines.push(current);
            current = String::new();
            current_width = width.saturating_sub(subsequent_indent).max(1);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            if idx == 0 {
                line.clone()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
