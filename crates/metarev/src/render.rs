//! Two-column text diff tables.
//!
//! [`TableRenderer`] diffs two strings line by line (longest common
//! subsequence) and lays the result out as an HTML table: two columns in
//! split view, one unified column otherwise.

use std::fmt::Write as _;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub split_view: bool,
    pub title_left: Option<String>,
    pub title_right: Option<String>,
}

pub trait DiffRenderer: Send + Sync {
    /// Render the change from `left` to `right`. Equal inputs render as `""`.
    fn render(&self, left: &str, right: &str, options: &RenderOptions) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOp {
    Equal,
    Delete,
    Insert,
}

/// Largest LCS table (in cells) built for the changed middle of two texts.
/// Beyond it the middle is emitted as all deletions followed by all insertions.
pub const MAX_LCS_CELLS: usize = 4_000_000;

/// Line-level edit script turning `left` into `right`.
pub fn line_diff<'a>(left: &'a str, right: &'a str) -> Vec<(LineOp, &'a str)> {
    let a: Vec<&str> = left.lines().collect();
    let b: Vec<&str> = right.lines().collect();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let mut ops = Vec::with_capacity(a.len() + b.len());
    ops.extend(a[..prefix].iter().map(|l| (LineOp::Equal, *l)));
    ops.extend(middle_diff(a_mid, b_mid));
    ops.extend(a[a.len() - suffix..].iter().map(|l| (LineOp::Equal, *l)));
    ops
}

fn middle_diff<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<(LineOp, &'a str)> {
    let (n, m) = (a.len(), b.len());
    let cells = (n + 1).saturating_mul(m + 1);
    if cells > MAX_LCS_CELLS {
        tracing::debug!(left = n, right = m, "diff too large for LCS; replacing wholesale");
        return a
            .iter()
            .map(|l| (LineOp::Delete, *l))
            .chain(b.iter().map(|l| (LineOp::Insert, *l)))
            .collect();
    }

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push((LineOp::Equal, a[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push((LineOp::Delete, a[i]));
            i += 1;
        } else {
            ops.push((LineOp::Insert, b[j]));
            j += 1;
        }
    }
    ops.extend(a[i..].iter().map(|l| (LineOp::Delete, *l)));
    ops.extend(b[j..].iter().map(|l| (LineOp::Insert, *l)));
    ops
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TableRenderer;

impl DiffRenderer for TableRenderer {
    fn render(&self, left: &str, right: &str, options: &RenderOptions) -> String {
        if left == right {
            return String::new();
        }
        let ops = line_diff(left, right);

        let mut html = String::from("<table class=\"diff\">\n");
        if options.title_left.is_some() || options.title_right.is_some() {
            let l = escape_html(options.title_left.as_deref().unwrap_or(""));
            let r = escape_html(options.title_right.as_deref().unwrap_or(""));
            if options.split_view {
                let _ = writeln!(html, "<thead><tr><th>{l}</th><th>{r}</th></tr></thead>");
            } else {
                let _ = writeln!(html, "<thead><tr><th>{l} &rarr; {r}</th></tr></thead>");
            }
        }
        html.push_str("<tbody>\n");
        if options.split_view {
            split_rows(&mut html, &ops);
        } else {
            unified_rows(&mut html, &ops);
        }
        html.push_str("</tbody>\n</table>");
        html
    }
}

fn cell(class: &str, line: &str) -> String {
    format!("<td class=\"{class}\">{}</td>", escape_html(line))
}

const EMPTY_CELL: &str = "<td>&nbsp;</td>";

fn unified_rows(html: &mut String, ops: &[(LineOp, &str)]) {
    for (op, line) in ops {
        let class = match op {
            LineOp::Equal => "diff-context",
            LineOp::Delete => "diff-deletedline",
            LineOp::Insert => "diff-addedline",
        };
        let _ = writeln!(html, "<tr>{}</tr>", cell(class, line));
    }
}

/// Pair each run of deletions with the insertions that follow it.
fn split_rows(html: &mut String, ops: &[(LineOp, &str)]) {
    let mut idx = 0;
    while idx < ops.len() {
        if ops[idx].0 == LineOp::Equal {
            let line = ops[idx].1;
            let _ = writeln!(
                html,
                "<tr>{}{}</tr>",
                cell("diff-context", line),
                cell("diff-context", line)
            );
            idx += 1;
            continue;
        }

        let mut deleted = Vec::new();
        while idx < ops.len() && ops[idx].0 == LineOp::Delete {
            deleted.push(ops[idx].1);
            idx += 1;
        }
        let mut inserted = Vec::new();
        while idx < ops.len() && ops[idx].0 == LineOp::Insert {
            inserted.push(ops[idx].1);
            idx += 1;
        }

        for row in 0..deleted.len().max(inserted.len()) {
            let left = deleted
                .get(row)
                .map(|l| cell("diff-deletedline", l))
                .unwrap_or_else(|| EMPTY_CELL.to_string());
            let right = inserted
                .get(row)
                .map(|l| cell("diff-addedline", l))
                .unwrap_or_else(|| EMPTY_CELL.to_string());
            let _ = writeln!(html, "<tr>{left}{right}</tr>");
        }
    }
}
