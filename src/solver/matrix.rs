//! Dense matrix storage and the linear algebra the engine needs.

/// Dense matrix stored row-major in a flat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Allocate a zero-filled `rows` x `cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Allocate a zero-filled square matrix.
    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Set matrix element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] += value;
    }

    /// Borrow one row.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Zero every entry.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Zero one row.
    pub fn clear_row(&mut self, row: usize) {
        self.row_mut(row).fill(0.0);
    }

    /// Swap two rows in place.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let cols = self.cols;
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.data.split_at_mut(hi * cols);
        head[lo * cols..(lo + 1) * cols].swap_with_slice(&mut tail[..cols]);
    }

    /// Copy `src` into `self`. Both must have the same shape.
    pub fn copy_from(&mut self, src: &Matrix) {
        debug_assert_eq!((self.rows, self.cols), (src.rows, src.cols));
        self.data.copy_from_slice(&src.data);
    }

    /// Largest absolute entry.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0f64, |m, v| m.max(v.abs()))
    }

    /// Form `out = scale * M x`.
    pub fn mul_vec_into(&self, x: &[f64], out: &mut [f64], scale: f64) {
        debug_assert_eq!(x.len(), self.cols);
        debug_assert_eq!(out.len(), self.rows);
        for (i, o) in out.iter_mut().enumerate() {
            let sum: f64 = self.row(i).iter().zip(x).map(|(m, v)| m * v).sum();
            *o = scale * sum;
        }
    }

    /// Form `self = diag(scale_a) * A + scale_b * B` with per-row scaling of `A`.
    pub fn scale_add(&mut self, a: &Matrix, b: &Matrix, scale_a: &[f64], scale_b: f64) {
        debug_assert_eq!(scale_a.len(), a.rows);
        let cols = self.cols;
        for (i, &sa) in scale_a.iter().enumerate() {
            for j in 0..cols {
                self.data[i * cols + j] = sa * a.get(i, j) + scale_b * b.get(i, j);
            }
        }
    }

    /// Numerical rank by Gaussian elimination with row pivoting.
    ///
    /// A column counts as vanished when its largest remaining entry is not
    /// above `eps` times the largest entry of the whole matrix.
    pub fn rank(&self, eps: f64) -> usize {
        let mut m = self.clone();
        let threshold = eps * m.max_abs();
        let (nr, nc) = (m.rows, m.cols);

        let mut rank = 0;
        let mut start_col = 0;
        for row in 0..nr {
            for col in start_col..nc {
                let mut max_v = m.get(row, col).abs();
                let mut max_row = row;
                for i in (row + 1)..nr {
                    let v = m.get(i, col).abs();
                    if v > max_v {
                        max_v = v;
                        max_row = i;
                    }
                }
                if max_v > threshold {
                    start_col = col + 1;
                    rank += 1;
                    m.swap_rows(row, max_row);

                    let pivot = m.get(row, col);
                    for i in (row + 1)..nr {
                        let factor = m.get(i, col) / pivot;
                        if factor != 0.0 {
                            for j in col..nc {
                                let v = m.get(row, j);
                                m.add(i, j, -factor * v);
                            }
                        }
                    }
                    break;
                }
            }
        }
        rank
    }

    /// Mark rows that can be zeroed without changing the rank.
    ///
    /// For the storage matrix these are the unknowns with no time
    /// derivative, i.e. the purely algebraic equations.
    pub fn algebraic_rows(&self, eps: f64) -> Vec<bool> {
        let mut m = self.clone();
        let full_rank = m.rank(eps);
        let mut algebraic = vec![false; self.rows];
        for (row, alg) in algebraic.iter_mut().enumerate() {
            m.clear_row(row);
            if m.rank(eps) == full_rank {
                *alg = true;
            } else {
                m.row_mut(row).copy_from_slice(self.row(row));
            }
        }
        algebraic
    }

    /// Solve `M x = rhs` by Gaussian elimination with partial pivoting.
    ///
    /// A column with no nonzero pivot gets `eps` on the diagonal, which acts
    /// as a tiny conductance to ground for a floating node.
    pub fn solve(&self, rhs: &[f64], eps: f64) -> Vec<f64> {
        let n = self.rows;
        debug_assert_eq!(self.cols, n);
        let mut m = augment(self, rhs);
        let w = n + 1;

        for col in 0..n {
            let mut max_v = m.get(col, col).abs();
            let mut max_row = col;
            for i in (col + 1)..n {
                let v = m.get(i, col).abs();
                if v > max_v {
                    max_v = v;
                    max_row = i;
                }
            }

            if max_v == 0.0 {
                m.set(col, col, eps);
            } else {
                m.swap_rows(col, max_row);
            }

            let pivot = m.get(col, col);
            for i in (col + 1)..n {
                let factor = m.get(i, col) / pivot;
                if factor != 0.0 {
                    for j in col..w {
                        let v = m.get(col, j);
                        m.add(i, j, -factor * v);
                    }
                }
            }
        }

        // Back substitution
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut acc = m.get(i, n);
            for j in (i + 1)..n {
                acc -= m.get(i, j) * x[j];
            }
            x[i] = acc / m.get(i, i);
        }
        x
    }

    /// Solve `M x = rhs` through an R^T Q^T factorization of `M`.
    ///
    /// Rows are orthonormalized largest-norm first; rows that collapse below
    /// `eps` relative to the first row norm are treated as null space, so a
    /// singular Jacobian yields the minimum-norm style update instead of an
    /// overflow.
    pub fn solve_rq(&self, rhs: &[f64], eps: f64) -> Vec<f64> {
        let nr = self.rows;
        let nc = self.cols;
        let mut m = augment(self, rhs);

        let mut mat_scale = 0.0;
        let mut last_row = nr;
        for row in 0..nr {
            let mut max_row = row;
            let mut max_sumsq = 0.0;
            for rowp in row..nr {
                let sumsq: f64 = m.row(rowp)[..nc].iter().map(|v| v * v).sum();
                if rowp == row || sumsq > max_sumsq {
                    max_row = rowp;
                    max_sumsq = sumsq;
                }
            }
            m.swap_rows(row, max_row);

            let row_norm = max_sumsq.sqrt();
            if row == 0 {
                mat_scale = row_norm;
            }
            if row_norm <= mat_scale * eps {
                last_row = row;
                break;
            }

            let scale = 1.0 / row_norm;
            m.row_mut(row).iter_mut().for_each(|v| *v *= scale);

            let pivot_row = m.row(row).to_vec();
            for rowp in (row + 1)..nr {
                let target = m.row_mut(rowp);
                let inner: f64 = pivot_row[..nc]
                    .iter()
                    .zip(&target[..nc])
                    .map(|(a, b)| a * b)
                    .sum();
                for (t, p) in target.iter_mut().zip(&pivot_row) {
                    *t -= inner * p;
                }
            }
        }

        // Last column holds inv(R^T) rhs; combine rows of Q.
        let mut x = vec![0.0; nc];
        for row in 0..last_row {
            let r = m.row(row);
            let coeff = r[nc];
            for (xi, q) in x.iter_mut().zip(&r[..nc]) {
                *xi += q * coeff;
            }
        }
        x
    }
}

/// Copy `m` into an `[m | rhs]` augmented matrix.
fn augment(m: &Matrix, rhs: &[f64]) -> Matrix {
    debug_assert_eq!(rhs.len(), m.rows);
    let mut a = Matrix::new(m.rows, m.cols + 1);
    for i in 0..m.rows {
        let row = a.row_mut(i);
        row[..m.cols].copy_from_slice(m.row(i));
        row[m.cols] = rhs[i];
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn from_rows(rows: &[&[f64]]) -> Matrix {
        let mut m = Matrix::new(rows.len(), rows[0].len());
        for (i, r) in rows.iter().enumerate() {
            for (j, v) in r.iter().enumerate() {
                m.set(i, j, *v);
            }
        }
        m
    }

    #[test]
    fn test_gaussian_solve() {
        let m = from_rows(&[&[2.0, 1.0, -1.0], &[-3.0, -1.0, 2.0], &[-2.0, 1.0, 2.0]]);
        let x = m.solve(&[8.0, -11.0, -3.0], 1e-12);
        assert_abs_diff_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rq_solve_matches_gaussian() {
        let m = from_rows(&[&[4.0, -2.0, 0.0], &[-2.0, 5.0, -1.0], &[0.0, -1.0, 3.0]]);
        let b = [1.0, 2.0, 3.0];
        let x1 = m.solve(&b, 1e-12);
        let x2 = m.solve_rq(&b, 1e-12);
        for (a, b) in x1.iter().zip(&x2) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rq_solve_singular_is_finite() {
        // Second row duplicates the first
        let m = from_rows(&[&[1.0, 1.0], &[1.0, 1.0]]);
        let x = m.solve_rq(&[2.0, 2.0], 1e-12);
        assert!(x.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(x[0] + x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_pivot_regularized() {
        let m = from_rows(&[&[1.0, 0.0], &[0.0, 0.0]]);
        let x = m.solve(&[3.0, 0.0], 1e-12);
        assert_abs_diff_eq!(x[0], 3.0);
        assert_abs_diff_eq!(x[1], 0.0);
    }

    #[test]
    fn test_rank() {
        let full = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        assert_eq!(full.rank(1e-12), 2);
        let deficient = from_rows(&[&[1.0, -1.0, 0.0], &[-1.0, 1.0, 0.0]]);
        assert_eq!(deficient.rank(1e-12), 1);
        assert_eq!(Matrix::new(2, 3).rank(1e-12), 0);
    }

    #[test]
    fn test_algebraic_rows() {
        // Only unknown 0 has storage
        let c = from_rows(&[&[1e-6, 0.0], &[0.0, 0.0]]);
        assert_eq!(c.algebraic_rows(1e-12), vec![false, true]);
    }

    #[test]
    fn test_scale_add_and_mul() {
        let a = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = from_rows(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let mut out = Matrix::square(2);
        out.scale_add(&a, &b, &[2.0, 0.5], 10.0);
        assert_eq!(out.row(0), &[12.0, 4.0]);
        assert_eq!(out.row(1), &[1.5, 12.0]);

        let mut y = [0.0; 2];
        a.mul_vec_into(&[1.0, 1.0], &mut y, -1.0);
        assert_eq!(y, [-3.0, -7.0]);
    }

    #[test]
    fn test_swap_rows() {
        let mut m = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        m.swap_rows(1, 0);
        assert_eq!(m.row(0), &[3.0, 4.0]);
        assert_eq!(m.row(1), &[1.0, 2.0]);
    }
}
