//! Line-based unified diff (LCS), used to show what a patch set changes.

use std::fmt::Write as _;

const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op<'a> {
    Equal(&'a str),
    Delete(&'a str),
    Insert(&'a str),
}

impl Op<'_> {
    fn is_change(&self) -> bool {
        !matches!(self, Op::Equal(_))
    }

    fn in_old(&self) -> bool {
        matches!(self, Op::Equal(_) | Op::Delete(_))
    }

    fn in_new(&self) -> bool {
        matches!(self, Op::Equal(_) | Op::Insert(_))
    }
}

/// Largest LCS table built for the changed middle of the two texts. Past it
/// the middle is shown as one replacement.
const MAX_TABLE_CELLS: usize = 1 << 20;

fn diff_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Op<'a>> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut ops = Vec::with_capacity(old.len() + new.len());
    ops.extend(old[..prefix].iter().map(|l| Op::Equal(*l)));
    ops.extend(lcs_ops(
        &old[prefix..old.len() - suffix],
        &new[prefix..new.len() - suffix],
    ));
    ops.extend(old[old.len() - suffix..].iter().map(|l| Op::Equal(*l)));
    ops
}

fn lcs_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Op<'a>> {
    let (n, m) = (old.len(), new.len());
    let mut ops = Vec::with_capacity(n + m);
    if (n + 1).saturating_mul(m + 1) > MAX_TABLE_CELLS {
        ops.extend(old.iter().map(|l| Op::Delete(*l)));
        ops.extend(new.iter().map(|l| Op::Insert(*l)));
        return ops;
    }

    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(Op::Equal(old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(Op::Delete(old[i]));
            i += 1;
        } else {
            ops.push(Op::Insert(new[j]));
            j += 1;
        }
    }
    ops.extend(old[i..].iter().map(|l| Op::Delete(*l)));
    ops.extend(new[j..].iter().map(|l| Op::Insert(*l)));
    ops
}

/// Group change positions into hunk ranges `[start, end)` over `ops`.
fn hunks(ops: &[Op<'_>]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (idx, _) in ops.iter().enumerate().filter(|(_, op)| op.is_change()) {
        let start = idx.saturating_sub(CONTEXT);
        let end = (idx + 1 + CONTEXT).min(ops.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

/// Unified diff of two texts. Empty when they are identical.
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let ops = diff_ops(&old_lines, &new_lines);
    let ranges = hunks(&ops);
    if ranges.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let _ = writeln!(out, "--- {old_label}");
    let _ = writeln!(out, "+++ {new_label}");
    for (start, end) in ranges {
        let old_before = ops[..start].iter().filter(|op| op.in_old()).count();
        let new_before = ops[..start].iter().filter(|op| op.in_new()).count();
        let old_len = ops[start..end].iter().filter(|op| op.in_old()).count();
        let new_len = ops[start..end].iter().filter(|op| op.in_new()).count();
        let old_start = if old_len == 0 { old_before } else { old_before + 1 };
        let new_start = if new_len == 0 { new_before } else { new_before + 1 };
        let _ = writeln!(out, "@@ -{old_start},{old_len} +{new_start},{new_len} @@");
        for op in &ops[start..end] {
            let _ = match op {
                Op::Equal(line) => writeln!(out, " {line}"),
                Op::Delete(line) => writeln!(out, "-{line}"),
                Op::Insert(line) => writeln!(out, "+{line}"),
            };
        }
    }
    out
}
