//! Sparse constraint matrix
//!
//! Bidirectional sparse storage of the constraint/variable incidence. Every
//! element gets a stable *value index* in `0..nnz` at construction, so the
//! parallel coefficient and preference arrays can key off it from both the
//! row view and the column view. Rows iterate in stored element order;
//! columns iterate over the rows containing the variable, ordered by row
//! index.

use medius_core::MergedConstraint;

/// One element seen from its row: the variable and the shared value index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowElement {
    /// Variable id.
    pub column: u32,
    /// Stable index into the parallel `A`/`P` arrays.
    pub value: u32,
}

/// One element seen from its column: the constraint and the shared value
/// index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColElement {
    /// Constraint id.
    pub row: u32,
    /// Stable index into the parallel `A`/`P` arrays.
    pub value: u32,
}

/// CSR rows plus CSC columns over one shared value-index space.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    row_starts: Vec<usize>,
    rows: Vec<RowElement>,
    col_starts: Vec<usize>,
    cols: Vec<ColElement>,
}

impl SparseMatrix {
    /// Build from merged constraints over `n` variables. Value indices are
    /// assigned once, in row-major stored order, and never reused.
    pub fn new(constraints: &[MergedConstraint], n: usize) -> Self {
        let m = constraints.len();
        let nnz: usize = constraints.iter().map(|c| c.elements.len()).sum();

        let mut row_starts = Vec::with_capacity(m + 1);
        let mut rows = Vec::with_capacity(nnz);
        let mut col_counts = vec![0usize; n];

        row_starts.push(0);
        for cst in constraints {
            for elem in &cst.elements {
                rows.push(RowElement {
                    column: elem.variable,
                    value: rows.len() as u32,
                });
                col_counts[elem.variable as usize] += 1;
            }
            row_starts.push(rows.len());
        }

        let mut col_starts = Vec::with_capacity(n + 1);
        let mut total = 0;
        col_starts.push(0);
        for count in &col_counts {
            total += count;
            col_starts.push(total);
        }

        // Walking rows in order fills each column slice by increasing row
        // index.
        let mut cursor = col_starts.clone();
        let mut cols = vec![
            ColElement {
                row: 0,
                value: 0
            };
            nnz
        ];
        for k in 0..m {
            for element in &rows[row_starts[k]..row_starts[k + 1]] {
                let at = &mut cursor[element.column as usize];
                cols[*at] = ColElement {
                    row: k as u32,
                    value: element.value,
                };
                *at += 1;
            }
        }

        SparseMatrix {
            row_starts,
            rows,
            col_starts,
            cols,
        }
    }

    /// Elements of constraint `k` in stored order.
    #[inline]
    pub fn row(&self, k: usize) -> &[RowElement] {
        &self.rows[self.row_starts[k]..self.row_starts[k + 1]]
    }

    /// Constraints containing variable `j`, ordered by row index.
    #[inline]
    pub fn column(&self, j: usize) -> &[ColElement] {
        &self.cols[self.col_starts[j]..self.col_starts[j + 1]]
    }

    /// Number of stored elements.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    /// Stable storage length; equals [`SparseMatrix::nnz`] after
    /// construction.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the matrix has no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows.
    #[inline]
    pub fn rows_len(&self) -> usize {
        self.row_starts.len() - 1
    }

    /// Number of columns.
    #[inline]
    pub fn cols_len(&self) -> usize {
        self.col_starts.len() - 1
    }
}
