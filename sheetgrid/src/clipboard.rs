//! FILENAME: sheetgrid/src/clipboard.rs
//! PURPOSE: Clipboard grid parsing (TSV and HTML tables) and copy output.
//! CONTEXT: A paste payload may carry HTML, TSV and plain text. HTML is
//! preferred only when its table has no merged cells - any rowspan/colspan
//! greater than one makes the HTML parse return None and the TSV fallback
//! kick in. TSV splits on tabs and both line-ending flavors.

use serde::{Deserialize, Serialize};

/// What the host hands us from a paste event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClipboardPayload {
    pub html: Option<String>,
    pub tsv: Option<String>,
    pub text: Option<String>,
}

/// A rectangular grid of cell strings.
pub type Grid = Vec<Vec<String>>;

/// Parse the payload, preferring HTML unless it contains merged cells.
pub fn parse_payload(payload: &ClipboardPayload) -> Option<Grid> {
    if let Some(html) = &payload.html {
        if let Some(grid) = parse_html_table(html) {
            return Some(grid);
        }
    }
    if let Some(tsv) = &payload.tsv {
        return Some(parse_tsv(tsv));
    }
    payload.text.as_ref().map(|text| parse_tsv(text))
}

/// Split TSV on `\t` cells and `\r\n` / `\n` line endings. A single
/// trailing newline does not produce an empty row.
pub fn parse_tsv(tsv: &str) -> Grid {
    let normalized = tsv.replace("\r\n", "\n");
    let trimmed = normalized.strip_suffix('\n').unwrap_or(&normalized);
    trimmed
        .split('\n')
        .map(|line| line.split('\t').map(|cell| cell.to_string()).collect())
        .collect()
}

/// Parse the first <table> in an HTML fragment into a grid. Returns None
/// when there is no table or when any cell spans more than one row or
/// column (merged cells cannot map onto a plain grid).
pub fn parse_html_table(html: &str) -> Option<Grid> {
    let lower = html.to_lowercase();
    let table_start = lower.find("<table")?;
    let table_end = lower[table_start..].find("</table>")? + table_start;
    let table = &html[table_start..table_end];
    let table_lower = &lower[table_start..table_end];

    let mut grid: Grid = Vec::new();
    let mut cursor = 0;

    while let Some(tr_offset) = table_lower[cursor..].find("<tr") {
        let row_start = cursor + tr_offset;
        let row_body_start = table[row_start..].find('>')? + row_start + 1;
        let row_end = match table_lower[row_body_start..].find("</tr>") {
            Some(offset) => row_body_start + offset,
            None => table.len(),
        };

        let row_html = &table[row_body_start..row_end];
        let row_lower = &table_lower[row_body_start..row_end];
        let mut cells: Vec<String> = Vec::new();
        let mut cell_cursor = 0;

        loop {
            let td = row_lower[cell_cursor..].find("<td");
            let th = row_lower[cell_cursor..].find("<th");
            let cell_offset = match (td, th) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => break,
            };
            let cell_start = cell_cursor + cell_offset;
            let tag_end = row_html[cell_start..].find('>')? + cell_start;
            let open_tag = &row_lower[cell_start..tag_end];

            if span_exceeds_one(open_tag, "rowspan") || span_exceeds_one(open_tag, "colspan") {
                return None;
            }

            let content_start = tag_end + 1;
            let close = row_lower[content_start..]
                .find("</td>")
                .or_else(|| row_lower[content_start..].find("</th>"));
            let content_end = match close {
                Some(offset) => content_start + offset,
                None => row_html.len(),
            };

            cells.push(clean_cell_text(&row_html[content_start..content_end]));
            cell_cursor = content_end;
        }

        if !cells.is_empty() {
            grid.push(cells);
        }
        cursor = row_end;
    }

    if grid.is_empty() {
        None
    } else {
        Some(grid)
    }
}

/// True when the open tag carries span="N" with N > 1.
fn span_exceeds_one(open_tag: &str, attribute: &str) -> bool {
    if let Some(pos) = open_tag.find(attribute) {
        let rest = &open_tag[pos + attribute.len()..];
        let digits: String = rest
            .chars()
            .skip_while(|c| *c == '=' || *c == '"' || *c == '\'' || c.is_whitespace())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(span) = digits.parse::<u32>() {
            return span > 1;
        }
    }
    false
}

/// Strip nested tags and decode the common entities.
fn clean_cell_text(cell_html: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    for c in cell_html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// Serialize a grid of display strings to TSV for the copy path.
pub fn to_tsv(grid: &[Vec<String>]) -> String {
    grid.iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}
