//! Line oriented diffs of document bodies, for reviewing test mode runs.

/// Unchanged lines kept around each change.
const CONTEXT_LINES: usize = 2;

/// Largest LCS table built for the changed region. Bigger regions are shown as a whole
/// removal followed by a whole addition.
const MAX_TABLE_CELLS: usize = 2_000_000;

/// Written when the bodies differ only in line endings or the trailing newline.
pub const LINE_ENDINGS_CHANGED: &str = "(line endings / trailing newline changed)\n";

/// One line of an edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit<'text> {
    /// Present in both.
    Same(&'text str),
    /// Only in the old body.
    Removed(&'text str),
    /// Only in the new body.
    Added(&'text str),
}

/// Render the line differences between `old` and `new`.
///
/// Removed lines are prefixed `- `, added lines `+ `, context lines two spaces. Runs of
/// unchanged lines further than two lines from a change are collapsed to `...`. Returns an
/// empty string only when the bodies are identical; bodies whose lines match but whose bytes
/// differ get [`LINE_ENDINGS_CHANGED`].
#[must_use]
pub fn line_diff(old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let edits = edit_script(&old_lines, &new_lines);
    if edits.iter().all(|edit| matches!(edit, Edit::Same(_))) {
        return LINE_ENDINGS_CHANGED.to_owned();
    }

    let near_change: Vec<bool> = (0..edits.len())
        .map(|idx| {
            let start = idx.saturating_sub(CONTEXT_LINES);
            let end = (idx + CONTEXT_LINES + 1).min(edits.len());
            edits.get(start..end).is_some_and(|window| {
                window.iter().any(|edit| !matches!(edit, Edit::Same(_)))
            })
        })
        .collect();

    let mut out = String::new();
    let mut elided = false;
    for (edit, keep) in edits.iter().zip(near_change) {
        match *edit {
            Edit::Same(line) if keep => push_line(&mut out, "  ", line),
            Edit::Same(_) => {
                if !elided {
                    out.push_str("...\n");
                }
                elided = true;
                continue;
            }
            Edit::Removed(line) => push_line(&mut out, "- ", line),
            Edit::Added(line) => push_line(&mut out, "+ ", line),
        }
        elided = false;
    }
    out
}

/// Append one prefixed line.
fn push_line(out: &mut String, prefix: &str, line: &str) {
    out.push_str(prefix);
    out.push_str(line);
    out.push('\n');
}

/// Edit script turning `old` into `new`. Common leading and trailing lines are peeled off
/// first, so only the region that actually changed is compared.
fn edit_script<'text>(old: &[&'text str], new: &[&'text str]) -> Vec<Edit<'text>> {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|&(left, right)| left == right)
        .count();
    let (old_head, old_rest) = old.split_at_checked(prefix).unwrap_or((old, &[]));
    let new_rest = new.get(prefix..).unwrap_or_default();
    let suffix = old_rest
        .iter()
        .rev()
        .zip(new_rest.iter().rev())
        .take_while(|&(left, right)| left == right)
        .count();
    let (old_mid, old_tail) = old_rest
        .split_at_checked(old_rest.len() - suffix)
        .unwrap_or((old_rest, &[]));
    let new_mid = new_rest
        .get(..new_rest.len() - suffix)
        .unwrap_or(new_rest);

    let mut edits: Vec<Edit<'text>> = old_head.iter().copied().map(Edit::Same).collect();
    if old_mid.len().saturating_mul(new_mid.len()) > MAX_TABLE_CELLS {
        edits.extend(old_mid.iter().copied().map(Edit::Removed));
        edits.extend(new_mid.iter().copied().map(Edit::Added));
    } else {
        edits.extend(lcs_script(old_mid, new_mid));
    }
    edits.extend(old_tail.iter().copied().map(Edit::Same));
    edits
}

/// Longest common subsequence edit script over a bounded region.
fn lcs_script<'text>(old: &[&'text str], new: &[&'text str]) -> Vec<Edit<'text>> {
    // Row major, `width` cells per row. Cell (i, j) is the LCS length of old[i..] and new[j..].
    let width = new.len() + 1;
    let mut table = vec![0_usize; (old.len() + 1) * width];
    let cell = |table: &[usize], row: usize, col: usize| -> usize {
        table.get(row * width + col).copied().unwrap_or(0)
    };
    for (row, old_line) in old.iter().enumerate().rev() {
        for (col, new_line) in new.iter().enumerate().rev() {
            let length = if old_line == new_line {
                cell(&table, row + 1, col + 1) + 1
            } else {
                cell(&table, row + 1, col).max(cell(&table, row, col + 1))
            };
            if let Some(slot) = table.get_mut(row * width + col) {
                *slot = length;
            }
        }
    }

    let mut edits = Vec::with_capacity(old.len() + new.len());
    let (mut row, mut col) = (0, 0);
    while let (Some(&old_line), Some(&new_line)) = (old.get(row), new.get(col)) {
        if old_line == new_line {
            edits.push(Edit::Same(old_line));
            row += 1;
            col += 1;
        } else if cell(&table, row + 1, col) >= cell(&table, row, col + 1) {
            edits.push(Edit::Removed(old_line));
            row += 1;
        } else {
            edits.push(Edit::Added(new_line));
            col += 1;
        }
    }
    edits.extend(old.get(row..).unwrap_or_default().iter().copied().map(Edit::Removed));
    edits.extend(new.get(col..).unwrap_or_default().iter().copied().map(Edit::Added));
    edits
}
