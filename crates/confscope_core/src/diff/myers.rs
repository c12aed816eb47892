//! Myers shortest-edit-script line diff.

/// One step of an edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Op {
    /// Line present on both sides.
    Equal,
    /// Line present only on the before side.
    Delete,
    /// Line present only on the after side.
    Insert,
}

/// An edit-script entry carrying the affected line.
#[derive(Debug, Clone, Copy)]
pub(super) struct Edit<'a> {
    pub op: Op,
    pub text: &'a str,
}

/// Computes a minimal edit script turning `a` into `b`.
///
/// Classic O((N+M)·D) Myers with full trace backtracking. Line counts in
/// this tool are bounded by the sample cap, so the quadratic worst case
/// is acceptable.
pub(super) fn diff_lines<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<Edit<'a>> {
    if a.is_empty() && b.is_empty() {
        return Vec::new();
    }

    let n = isize::try_from(a.len()).unwrap_or(isize::MAX);
    let m = isize::try_from(b.len()).unwrap_or(isize::MAX);
    let max = n + m;
    let offset = max;
    let width = usize::try_from(2 * max + 1).unwrap_or(1);

    let mut v = vec![0isize; width];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'outer: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let down = k == -d || (k != d && at(&v, k - 1, offset) < at(&v, k + 1, offset));
            let mut x = if down { at(&v, k + 1, offset) } else { at(&v, k - 1, offset) + 1 };
            let mut y = x - k;

            while x < n && y < m && a[idx(x)] == b[idx(y)] {
                x += 1;
                y += 1;
            }
            set(&mut v, k, offset, x);

            if x >= n && y >= m {
                break 'outer;
            }
            k += 2;
        }
    }

    backtrack(a, b, &trace, n, m, offset)
}

fn backtrack<'a>(a: &[&'a str], b: &[&'a str], trace: &[Vec<isize>], n: isize, m: isize, offset: isize) -> Vec<Edit<'a>> {
    let mut edits = Vec::new();
    let (mut x, mut y) = (n, m);

    for (d, v) in trace.iter().enumerate().rev() {
        let d = isize::try_from(d).unwrap_or(isize::MAX);
        let k = x - y;

        let prev_k = if k == -d || (k != d && at(v, k - 1, offset) < at(v, k + 1, offset)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(v, prev_k, offset);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            edits.push(Edit {
                op: Op::Equal,
                text: a[idx(x)],
            });
        }

        if d > 0 {
            if x == prev_x {
                y -= 1;
                edits.push(Edit {
                    op: Op::Insert,
                    text: b[idx(y)],
                });
            } else {
                x -= 1;
                edits.push(Edit {
                    op: Op::Delete,
                    text: a[idx(x)],
                });
            }
        }
    }

    edits.reverse();
    edits
}

fn at(v: &[isize], k: isize, offset: isize) -> isize {
    v[idx(k + offset)]
}

fn set(v: &mut [isize], k: isize, offset: isize, value: isize) {
    v[idx(k + offset)] = value;
}

fn idx(i: isize) -> usize {
    usize::try_from(i).unwrap_or(0)
}
