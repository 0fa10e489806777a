#![allow(non_snake_case)]

use crate::algebra::{FloatT, SparseFormatError};
use std::ops::Range;

/// Sparse matrix in Compressed Sparse Column format, with optional
/// per-column occupancy counts.
///
/// In the plain (compressed) form, `nnz_per_col` is `None` and column
/// `j` occupies `colptr[j]..colptr[j+1]`, exactly the standard CSC
/// layout:
///
/// ```no_run
/// use proxal::sparse::CscMatrix;
///
/// // A = [1.  3.]
/// //     [2.  0.]
/// let A : CscMatrix<f64> = CscMatrix::new(
///    2,                  // m
///    2,                  // n
///    vec![0, 2, 3],      // colptr
///    vec![0, 1, 0],      // rowval
///    vec![1., 2., 3.],   // nzval
///  );
/// assert!(A.check_format().is_ok());
/// ```
///
/// In the uncompressed form, `nnz_per_col` is present and column `j`
/// occupies only the prefix `colptr[j]..colptr[j] + nnz_per_col[j]` of
/// its allocated span; the remainder `..colptr[j+1]` is reserved
/// capacity into which the column may grow.  The KKT matrix and the
/// LDLᵀ factor both use this form so that inequality columns can be
/// switched in and out of the factorization, and so that update
/// kernels can insert fill, without reallocating.
///
/// Invariant: row indices are strictly increasing within the occupied
/// prefix of every column.  Values in the reserved slack are
/// meaningful to whoever parked them there (the KKT keeps constraint
/// values and diagonal sentinels parked in deactivated columns) but
/// are not part of the logical matrix.

#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix<T = f64> {
    /// number of rows
    pub m: usize,
    /// number of columns
    pub n: usize,
    /// column pointers (length `n+1`); consecutive deltas are column capacities
    pub colptr: Vec<usize>,
    /// per-column occupancy; `None` means fully compressed
    pub nnz_per_col: Option<Vec<usize>>,
    /// row indices (length `colptr[n]`)
    pub rowval: Vec<usize>,
    /// numerical values (length `colptr[n]`)
    pub nzval: Vec<T>,
}

impl<T> CscMatrix<T>
where
    T: FloatT,
{
    /// Compressed `CscMatrix` constructor.
    ///
    /// # Panics
    /// Makes rudimentary length compatibility checks and panics on
    /// failure.  Use [`check_format`](CscMatrix::check_format) for the
    /// full set of structural checks.
    pub fn new(m: usize, n: usize, colptr: Vec<usize>, rowval: Vec<usize>, nzval: Vec<T>) -> Self {
        assert_eq!(rowval.len(), nzval.len());
        assert_eq!(colptr.len(), n + 1);
        assert_eq!(colptr[n], rowval.len());
        CscMatrix {
            m,
            n,
            colptr,
            nnz_per_col: None,
            rowval,
            nzval,
        }
    }

    /// allocate a compressed m x n matrix with space for `nnz` elements
    pub fn spalloc(size: (usize, usize), nnz: usize) -> Self {
        let (m, n) = size;
        let mut colptr = vec![0; n + 1];
        let rowval = vec![0; nnz];
        let nzval = vec![T::zero(); nnz];
        colptr[n] = nnz;

        CscMatrix::new(m, n, colptr, rowval, nzval)
    }

    /// Identity matrix of size `n`
    pub fn identity(n: usize) -> Self {
        let colptr = (0usize..=n).collect();
        let rowval = (0usize..n).collect();
        let nzval = vec![T::one(); n];

        CscMatrix::new(n, n, colptr, rowval, nzval)
    }

    /// first occupied index of column `j`
    #[inline]
    pub fn col_start(&self, j: usize) -> usize {
        self.colptr[j]
    }

    /// one past the last occupied index of column `j`
    #[inline]
    pub fn col_end(&self, j: usize) -> usize {
        self.colptr[j] + self.col_nnz(j)
    }

    /// occupancy of column `j`
    #[inline]
    pub fn col_nnz(&self, j: usize) -> usize {
        match &self.nnz_per_col {
            Some(counts) => counts[j],
            None => self.colptr[j + 1] - self.colptr[j],
        }
    }

    /// allocated capacity of column `j`
    #[inline]
    pub fn col_capacity(&self, j: usize) -> usize {
        self.colptr[j + 1] - self.colptr[j]
    }

    /// occupied span of column `j`
    #[inline]
    pub fn col_range(&self, j: usize) -> Range<usize> {
        self.col_start(j)..self.col_end(j)
    }

    /// full allocated span of column `j`, occupied or not
    #[inline]
    pub fn col_cap_range(&self, j: usize) -> Range<usize> {
        self.colptr[j]..self.colptr[j + 1]
    }

    /// row index and value slices for the occupied part of column `j`
    pub fn col(&self, j: usize) -> (&[usize], &[T]) {
        let rng = self.col_range(j);
        (&self.rowval[rng.clone()], &self.nzval[rng])
    }

    /// Set the occupancy of column `j`.
    ///
    /// # Panics
    /// Panics if the matrix is compressed or `nnz` exceeds the
    /// column's capacity.
    pub fn set_col_nnz(&mut self, j: usize, nnz: usize) {
        assert!(nnz <= self.col_capacity(j));
        let counts = self
            .nnz_per_col
            .as_mut()
            .expect("set_col_nnz requires an uncompressed matrix");
        counts[j] = nnz;
    }

    /// total number of occupied entries
    pub fn nnz(&self) -> usize {
        match &self.nnz_per_col {
            Some(counts) => counts.iter().sum(),
            None => self.colptr[self.n],
        }
    }

    /// Check that matrix data is correctly formatted.
    pub fn check_format(&self) -> Result<(), SparseFormatError> {
        if self.rowval.len() != self.nzval.len() {
            return Err(SparseFormatError::IncompatibleDimension);
        }

        if self.colptr.is_empty()
            || (self.colptr.len() - 1) != self.n
            || self.colptr[self.n] != self.rowval.len()
        {
            return Err(SparseFormatError::IncompatibleDimension);
        }

        //check for colptr monotonicity
        if self.colptr.windows(2).any(|c| c[0] > c[1]) {
            return Err(SparseFormatError::BadColptr);
        }

        if let Some(counts) = &self.nnz_per_col {
            if counts.len() != self.n {
                return Err(SparseFormatError::IncompatibleDimension);
            }
            if (0..self.n).any(|j| counts[j] > self.col_capacity(j)) {
                return Err(SparseFormatError::BadColnnz);
            }
        }

        //check for rowval monotonicity within the occupied part of each column
        for col in 0..self.n {
            if self.rowval[self.col_range(col)].windows(2).any(|c| c[0] >= c[1]) {
                return Err(SparseFormatError::BadRowval);
            }
        }
        //check for row values out of bounds
        for col in 0..self.n {
            if self.rowval[self.col_range(col)].iter().any(|r| *r >= self.m) {
                return Err(SparseFormatError::BadRowval);
            }
        }

        Ok(())
    }

    /// True if the matrix has no occupied entries below the diagonal.
    pub fn is_triu(&self) -> bool {
        for col in 0..self.n {
            if self.rowval[self.col_range(col)].iter().any(|&row| row > col) {
                return false;
            }
        }
        true
    }

    /// Allocates a new compressed matrix containing only entries from
    /// the upper triangular part.
    ///
    /// # Panics
    /// Panics if the matrix is not square.
    pub fn to_triu(&self) -> Self {
        assert_eq!(self.m, self.n);
        let n = self.n;

        let mut colptr = vec![0; n + 1];
        let mut nnz = 0;
        for col in 0..n {
            let ntriu = self.rowval[self.col_range(col)]
                .iter()
                .filter(|&&row| row <= col)
                .count();
            colptr[col + 1] = nnz + ntriu;
            nnz += ntriu;
        }

        let mut rowval = vec![0; nnz];
        let mut nzval = vec![T::zero(); nnz];
        for col in 0..n {
            let mut dest = colptr[col];
            for p in self.col_range(col) {
                if self.rowval[p] <= col {
                    rowval[dest] = self.rowval[p];
                    nzval[dest] = self.nzval[p];
                    dest += 1;
                }
            }
        }
        CscMatrix::new(n, n, colptr, rowval, nzval)
    }

    /// Numeric transpose of the occupied pattern, returned compressed
    /// with sorted columns.
    pub fn transpose(&self) -> Self {
        let nnz = self.nnz();
        let mut At = CscMatrix::spalloc((self.n, self.m), nnz);

        //count entries per row, prefix sum into the new colptr
        for col in 0..self.n {
            for &row in &self.rowval[self.col_range(col)] {
                At.colptr[row + 1] += 1;
            }
        }
        for r in 0..self.m {
            At.colptr[r + 1] += At.colptr[r];
        }

        //scatter; visiting source columns in order leaves the
        //destination columns sorted
        let mut next = At.colptr[0..self.m].to_vec();
        for col in 0..self.n {
            for p in self.col_range(col) {
                let row = self.rowval[p];
                let dest = next[row];
                At.rowval[dest] = col;
                At.nzval[dest] = self.nzval[p];
                next[row] += 1;
            }
        }
        At
    }

    /// Value at `(row,col)` if it is an occupied structural nonzero.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    pub fn get_entry(&self, idx: (usize, usize)) -> Option<T> {
        let (row, col) = idx;
        assert!(row < self.m && col < self.n);

        let (rows, vals) = self.col(col);
        match rows.binary_search(&row) {
            Ok(idx) => Some(vals[idx]),
            Err(_) => None,
        }
    }
}

#[test]
fn test_transpose() {
    // A = [1.  0.  4.]
    //     [2.  3.  0.]
    let A = CscMatrix::new(
        2,
        3,
        vec![0, 2, 3, 4],
        vec![0, 1, 1, 0],
        vec![1., 2., 3., 4.],
    );
    let At = A.transpose();
    assert!(At.check_format().is_ok());
    assert_eq!(At.get_entry((0, 0)).unwrap(), 1.);
    assert_eq!(At.get_entry((0, 1)).unwrap(), 2.);
    assert_eq!(At.get_entry((1, 1)).unwrap(), 3.);
    assert_eq!(At.get_entry((2, 0)).unwrap(), 4.);
    assert!(At.get_entry((1, 0)).is_none());
    assert!(At.get_entry((2, 1)).is_none());
}

#[test]
fn test_uncompressed_occupancy() {
    // two columns of capacity 2, second column deactivated
    let mut A = CscMatrix {
        m: 2,
        n: 2,
        colptr: vec![0, 2, 4],
        nnz_per_col: Some(vec![2, 2]),
        rowval: vec![0, 1, 0, 1],
        nzval: vec![1., 2., 3., 4.],
    };

    assert_eq!(A.nnz(), 4);
    A.set_col_nnz(1, 0);
    assert_eq!(A.nnz(), 2);
    assert_eq!(A.col_range(1), 2..2);
    assert_eq!(A.col_cap_range(1), 2..4);
    assert!(A.check_format().is_ok());

    //reactivation restores the parked values
    A.set_col_nnz(1, 2);
    assert_eq!(A.get_entry((1, 1)).unwrap(), 4.);
}

#[test]
fn test_to_triu() {
    let A = CscMatrix::new(
        2,
        2,
        vec![0, 2, 4],
        vec![0, 1, 0, 1],
        vec![1., 2., 3., 4.],
    );
    let B = A.to_triu();
    assert_eq!(B.nnz(), 3);
    assert!(B.is_triu());
    assert_eq!(B.get_entry((0, 1)).unwrap(), 3.);
    assert!(B.get_entry((1, 0)).is_none());
}
