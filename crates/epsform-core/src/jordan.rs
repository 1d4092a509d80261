//! Generalized eigenvector decompositions.
//!
//! For a residue matrix and one of its eigenvalues λ, the worker computes
//! nested kernels of (M − λI)^s by rank-revealing column reduction; block
//! multiplicities follow from the rank differences, and explicit Jordan
//! chains are reconstructed longest-first by Gram–Schmidt projection
//! against the chains already extracted.

use std::collections::VecDeque;

use epsform_engine::Matrix;

use crate::eigen::{Eigen, EigenvalueSet};
use crate::error::{Error, Result};

/// One Jordan block: an eigenvalue and its chain of root vectors, ordered
/// from (M − λI)^(s−1)·w down to the top vector w.
#[derive(Clone, Debug)]
pub struct JordanBlock {
    pub ev: Eigen,
    pub rootvectors: VecDeque<Matrix>,
}

/// The blocks of a decomposition, longest chains first, ties broken by
/// eigenvalue order.
#[derive(Clone, Debug, Default)]
pub struct JordanSystem {
    blocks: Vec<JordanBlock>,
}

impl JordanSystem {
    #[must_use]
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Inserts keeping the (chain length desc, eigenvalue asc) order.
    pub fn insert(&mut self, block: JordanBlock) {
        let key = |b: &JordanBlock| (std::cmp::Reverse(b.rootvectors.len()), b.ev);
        let pos = self
            .blocks
            .partition_point(|b| key(b) <= key(&block));
        self.blocks.insert(pos, block);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JordanBlock> {
        self.blocks.iter()
    }
}

impl<'a> IntoIterator for &'a JordanSystem {
    type Item = &'a JordanBlock;
    type IntoIter = std::slice::Iter<'a, JordanBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

/// Kernel of `mat` as columns of the returned matrix (possibly 0×0), with
/// the kernel dimension.
///
/// Columns are reordered sparsest-first (fewest non-zero entries, then
/// lowest ε-degree) so that later Gram–Schmidt projections work on the
/// cheapest representatives.
fn kern(mat: &Matrix) -> Result<(usize, Matrix)> {
    let engine = mat.engine();
    let mut m = mat.clone();
    let (rank, b) = m.col_reduce()?;

    if rank == b.cols() {
        return Ok((0, Matrix::empty(engine)));
    }

    let mut u = b.submatrix(0, b.rows() - 1, rank, b.cols() - 1)?;
    let dim = b.cols() - rank;

    let mut cols: Vec<(usize, i64, usize)> = Vec::with_capacity(u.cols());
    for n in 0..u.cols() {
        let mut nonzero = 0usize;
        let mut deg = 0i64;
        for j in 0..u.rows() {
            let e = u.get(j, n)?;
            if !e.is_zero() {
                nonzero += 1;
                let d = e.numer()?.deg("ep")? + e.denom()?.deg("ep")?;
                deg = deg.max(d);
            }
        }
        cols.push((nonzero, deg, n));
    }
    cols.sort();

    let mut swap = Matrix::zeros(engine, u.cols(), u.cols())?;
    let one = epsform_engine::Expr::from_i64(engine, 1)?;
    for (c, &(_, _, col)) in cols.iter().enumerate() {
        swap.set(col, c, &one)?;
    }
    u = u.mul(&swap)?;

    Ok((dim, u))
}

fn shifted_by(mat: &Matrix, ev: Eigen) -> Result<Matrix> {
    let engine = mat.engine();
    let lambda = epsform_engine::Expr::new(engine, &ev.term())?;
    let id = Matrix::identity(engine, mat.cols())?;
    Ok(mat.sub(&id.scale(&lambda)?)?)
}

fn jordan_decomposition(mat: &Matrix, ev: Eigen, system: &mut JordanSystem) -> Result<()> {
    let engine = mat.engine();
    let n = mat.cols();
    let shifted = shifted_by(mat, ev)?;

    // Kernel dimensions of (M - λI)^s for s = 0, 1, 2, …; the sequence
    // stabilizes at the algebraic multiplicity.
    let mut dims: Vec<usize> = vec![0];
    let mut kernels: Vec<Matrix> = vec![Matrix::zeros(engine, n, n)?];
    let mut block_counts: Vec<i64> = Vec::new();

    let mut power = shifted.clone();
    let mut s = 1usize;
    loop {
        let (dim, u) = kern(&power)?;

        if s > 1 {
            let b = 2 * dims[dims.len() - 1] as i64 - dims[dims.len() - 2] as i64 - dim as i64;
            block_counts.push(b);
        }

        if dim == *dims.last().expect("dims is non-empty") {
            break;
        }

        dims.push(dim);
        kernels.push(u);
        power = power.mul(&shifted)?;
        s += 1;
    }

    // Extract chains, longest first, projecting against chains already in
    // the system for the same eigenvalue.
    for s in (1..=block_counts.len()).rev() {
        let count = block_counts[s - 1];
        let mut basis = kernels[s - 1].transpose()?;

        for block in system.iter() {
            if block.ev != ev {
                continue;
            }
            let v = &block.rootvectors[s - 1];
            basis = basis.stack(&v.transpose()?)?;
        }

        let pos = basis.rows();
        let mut basis = basis.stack(&kernels[s].transpose()?)?.transpose()?;
        basis.gram_schmidt()?;
        let basis = basis.submatrix(0, basis.rows() - 1, pos, basis.cols() - 1)?;

        let mut c = 0usize;
        let mut fresh = Vec::new();
        for _ in 0..count {
            let mut v;
            loop {
                if c >= basis.cols() {
                    return Err(Error::JordanFailed);
                }
                v = basis.col(c)?;
                c += 1;
                if !v.is_zero()? {
                    break;
                }
            }

            let mut block = JordanBlock {
                ev,
                rootvectors: VecDeque::new(),
            };
            block.rootvectors.push_front(v.clone());

            for _ in 1..s {
                v = shifted.mul(&v)?;
                block.rootvectors.push_front(v.clone());
            }

            fresh.push(block);
        }
        for block in fresh {
            system.insert(block);
        }
    }

    Ok(())
}

/// Full generalized-eigenvector decomposition of `mat` over the given
/// eigenvalues.
pub fn jordan_system(mat: &Matrix, evs: &EigenvalueSet, system: &mut JordanSystem) -> Result<()> {
    for ev in evs.keys() {
        jordan_decomposition(mat, *ev, system)?;
    }
    Ok(())
}

/// Orthogonalized eigenvectors of `mat` for the eigenvalue `ev` (the s = 1
/// degenerate case of the chain construction).
pub fn eigenvectors(mat: &Matrix, ev: Eigen) -> Result<Vec<Matrix>> {
    let shifted = shifted_by(mat, ev)?;
    let (_, mut u) = kern(&shifted)?;
    if u.is_empty() {
        return Ok(Vec::new());
    }
    u.gram_schmidt()?;

    let mut vectors = Vec::new();
    for c in 0..u.cols() {
        let v = u.col(c)?;
        if !v.is_zero()? {
            vectors.push(v);
        }
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fraction::Fraction;

    #[test]
    fn block_order_longest_then_eigenvalue() {
        // Ordering is what the projector construction relies on; exercised
        // here through the sort key alone.
        let key = |len: usize, u: i64| (std::cmp::Reverse(len), Eigen::new(Fraction::from(u), Fraction::from(0)));
        assert!(key(3, 5) < key(2, 0));
        assert!(key(2, 0) < key(2, 1));
    }
}
