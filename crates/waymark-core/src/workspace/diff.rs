//! Line diffs, change summaries and minimal text edits.

use std::fmt::Write as _;

/// Result of comparing two versions of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSummary {
    /// One-line human-readable summary
    pub summary: String,
    /// Unified-diff-style text; empty when nothing changed
    pub diff: String,
    pub added: usize,
    pub removed: usize,
}

impl DiffSummary {
    /// Zero added and zero removed lines: the no-op signal for handlers.
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Produces summaries and diffs for before/after text.
pub trait DiffService: Send + Sync {
    fn summarize(&self, path: &str, before: &str, after: &str) -> DiffSummary;
}

/// A single replacement of the byte range `start..end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl TextEdit {
    /// Computes the smallest single-range edit that turns `old` into `new`,
    /// or `None` when they are identical.
    ///
    /// ```rust
    /// use waymark_core::workspace::TextEdit;
    ///
    /// let edit = TextEdit::minimal("let x = 1;\n", "let x = 2;\n").unwrap();
    /// assert_eq!((edit.start, edit.end), (8, 9));
    /// assert_eq!(edit.replacement, "2");
    /// assert!(TextEdit::minimal("same", "same").is_none());
    /// ```
    pub fn minimal(old: &str, new: &str) -> Option<Self> {
        if old == new {
            return None;
        }

        let mut prefix = old
            .bytes()
            .zip(new.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(prefix) || !new.is_char_boundary(prefix) {
            prefix -= 1;
        }

        let max_suffix = old.len().min(new.len()) - prefix;
        let mut suffix = old
            .bytes()
            .rev()
            .zip(new.bytes().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(old.len() - suffix) || !new.is_char_boundary(new.len() - suffix)
        {
            suffix -= 1;
        }

        Some(TextEdit {
            start: prefix,
            end: old.len() - suffix,
            replacement: new[prefix..new.len() - suffix].to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffOp {
    Equal,
    Delete,
    Insert,
}

/// LCS-based line differ with unified-style output.
#[derive(Debug, Clone, Copy)]
pub struct LineDiff {
    /// Unchanged lines shown around each hunk
    pub context: usize,
    /// Beyond this many cells in the LCS table the middle section is
    /// reported as a full replacement instead
    pub max_table_cells: usize,
}

impl Default for LineDiff {
    fn default() -> Self {
        Self {
            context: 3,
            max_table_cells: 4_000_000,
        }
    }
}

impl LineDiff {
    fn operations(&self, old: &[&str], new: &[&str]) -> Vec<DiffOp> {
        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = old[prefix..]
            .iter()
            .rev()
            .zip(new[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let old_mid = &old[prefix..old.len() - suffix];
        let new_mid = &new[prefix..new.len() - suffix];

        let mut ops = vec![DiffOp::Equal; prefix];
        if old_mid.len().saturating_mul(new_mid.len()) > self.max_table_cells {
            ops.extend(std::iter::repeat(DiffOp::Delete).take(old_mid.len()));
            ops.extend(std::iter::repeat(DiffOp::Insert).take(new_mid.len()));
        } else {
            ops.extend(lcs_operations(old_mid, new_mid));
        }
        ops.extend(std::iter::repeat(DiffOp::Equal).take(suffix));
        ops
    }

    fn render(&self, path: &str, ops: &[DiffOp], old: &[&str], new: &[&str]) -> String {
        // Line positions before each op, so any op range maps to hunk
        // coordinates.
        let mut positions = Vec::with_capacity(ops.len() + 1);
        let (mut old_pos, mut new_pos) = (0usize, 0usize);
        for op in ops {
            positions.push((old_pos, new_pos));
            match op {
                DiffOp::Equal => {
                    old_pos += 1;
                    new_pos += 1;
                }
                DiffOp::Delete => old_pos += 1,
                DiffOp::Insert => new_pos += 1,
            }
        }
        positions.push((old_pos, new_pos));

        let changes: Vec<usize> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| **op != DiffOp::Equal)
            .map(|(index, _)| index)
            .collect();
        let Some((&first, rest)) = changes.split_first() else {
            return String::new();
        };

        let mut groups = Vec::new();
        let (mut start, mut end) = (first, first);
        for &index in rest {
            if index - end - 1 > 2 * self.context {
                groups.push((start, end));
                start = index;
            }
            end = index;
        }
        groups.push((start, end));

        let mut out = String::new();
        let _ = writeln!(out, "--- a/{path}");
        let _ = writeln!(out, "+++ b/{path}");
        for (start, end) in groups {
            let lo = start.saturating_sub(self.context);
            let hi = (end + self.context + 1).min(ops.len());
            let (old_start, new_start) = positions[lo];
            let (old_end, new_end) = positions[hi];
            let old_count = old_end - old_start;
            let new_count = new_end - new_start;
            let _ = writeln!(
                out,
                "@@ -{},{} +{},{} @@",
                hunk_start(old_start, old_count),
                old_count,
                hunk_start(new_start, new_count),
                new_count
            );
            for (offset, op) in ops[lo..hi].iter().enumerate() {
                let (old_index, new_index) = positions[lo + offset];
                let _ = match op {
                    DiffOp::Equal => writeln!(out, " {}", old[old_index]),
                    DiffOp::Delete => writeln!(out, "-{}", old[old_index]),
                    DiffOp::Insert => writeln!(out, "+{}", new[new_index]),
                };
            }
        }
        out
    }
}

fn hunk_start(position: usize, count: usize) -> usize {
    if count == 0 {
        position
    } else {
        position + 1
    }
}

fn lcs_operations(old: &[&str], new: &[&str]) -> Vec<DiffOp> {
    let (n, m) = (old.len(), new.len());
    // lengths[i][j] = LCS length of old[i..] and new[j..]
    let mut lengths = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lengths[i][j] = if old[i] == new[j] {
                lengths[i + 1][j + 1] + 1
            } else {
                lengths[i + 1][j].max(lengths[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(DiffOp::Equal);
            i += 1;
            j += 1;
        } else if lengths[i + 1][j] >= lengths[i][j + 1] {
            ops.push(DiffOp::Delete);
            i += 1;
        } else {
            ops.push(DiffOp::Insert);
            j += 1;
        }
    }
    ops.extend(std::iter::repeat(DiffOp::Delete).take(n - i));
    ops.extend(std::iter::repeat(DiffOp::Insert).take(m - j));
    ops
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "line"
    } else {
        "lines"
    }
}

impl DiffService for LineDiff {
    fn summarize(&self, path: &str, before: &str, after: &str) -> DiffSummary {
        let old: Vec<&str> = before.lines().collect();
        let new: Vec<&str> = after.lines().collect();
        let ops = self.operations(&old, &new);

        let added = ops.iter().filter(|op| **op == DiffOp::Insert).count();
        let removed = ops.iter().filter(|op| **op == DiffOp::Delete).count();

        let summary = match (added, removed) {
            (0, 0) => format!("{path}: no changes"),
            (added, 0) => format!("{path}: +{added} {}", plural(added)),
            (0, removed) => format!("{path}: -{removed} {}", plural(removed)),
            (added, removed) => format!("{path}: +{added} -{removed} {}", plural(added + removed)),
        };

        DiffSummary {
            summary,
            diff: self.render(path, &ops, &old, &new),
            added,
            removed,
        }
    }
}
