//! The block-triangular coefficient layout.

use epsform_engine::{Engine, Matrix};

use crate::error::{Error, Result};

/// One coefficient of the system, partitioned around the active range:
///
/// ```text
/// ( A 0 0 )
/// ( B C 0 )
/// ( D E F )
/// ```
///
/// A is the left inactive block, C the active block under reduction, F the
/// right inactive block. The two upper-right blocks are zero by invariant;
/// they are validated on load and preserved by every transformation, so
/// they are never stored.
#[derive(Clone, Debug)]
pub struct BlockMatrix {
    pub a: Matrix,
    pub b: Matrix,
    pub c: Matrix,
    pub d: Matrix,
    pub e: Matrix,
    pub f: Matrix,
}

impl BlockMatrix {
    /// The all-zero coefficient for an active range [start, end] (0-based,
    /// inclusive) of a full dimension `dim`.
    pub fn null(engine: &Engine, start: usize, end: usize, dim: usize) -> Result<Self> {
        let mid = end - start + 1;
        let bottom = dim - end - 1;
        Ok(Self {
            a: Matrix::zeros(engine, start, start)?,
            b: Matrix::zeros(engine, mid, start)?,
            c: Matrix::zeros(engine, mid, mid)?,
            d: Matrix::zeros(engine, bottom, start)?,
            e: Matrix::zeros(engine, bottom, mid)?,
            f: Matrix::zeros(engine, bottom, bottom)?,
        })
    }

    /// Partitions a full coefficient around the active range, validating
    /// that the upper-right blocks vanish.
    pub fn split(full: &Matrix, start: usize, end: usize) -> Result<Self> {
        let dim = full.rows();
        let last = dim - 1;

        if start > 0 && !full.submatrix(0, start - 1, start, last)?.is_zero()? {
            return Err(Error::UpperBlocksNotZero);
        }
        if end < last && !full.submatrix(start, end, end + 1, last)?.is_zero()? {
            return Err(Error::UpperBlocksNotZero);
        }

        // Degenerate ranges (no left or right block) fall out as empty
        // matrices; `start - 1` wraps for start == 0 and is caught here.
        let sub = |r0: usize, r1: usize, c0: usize, c1: usize| -> Result<Matrix> {
            if r1 < r0 || c1 < c0 || r1 >= dim || c1 >= dim {
                return Ok(Matrix::empty(full.engine()));
            }
            Ok(full.submatrix(r0, r1, c0, c1)?)
        };

        Ok(Self {
            a: sub(0, start.wrapping_sub(1), 0, start.wrapping_sub(1))?,
            b: sub(start, end, 0, start.wrapping_sub(1))?,
            c: sub(start, end, start, end)?,
            d: sub(end + 1, last, 0, start.wrapping_sub(1))?,
            e: sub(end + 1, last, start, end)?,
            f: sub(end + 1, last, end + 1, last)?,
        })
    }

    /// Reassembles the full coefficient matrix.
    pub fn assemble(&self, engine: &Engine) -> Result<Matrix> {
        let start = self.a.rows();
        let mid = self.c.rows();
        let dim = start + mid + self.f.rows();

        let mut full = Matrix::zeros(engine, dim, dim)?;
        full.set_block(0, 0, &self.a)?;
        full.set_block(start, 0, &self.b)?;
        full.set_block(start, start, &self.c)?;
        full.set_block(start + mid, 0, &self.d)?;
        full.set_block(start + mid, start, &self.e)?;
        full.set_block(start + mid, start + mid, &self.f)?;
        Ok(full)
    }

    pub fn is_zero(&self) -> Result<bool> {
        Ok(self.a.is_zero()?
            && self.b.is_zero()?
            && self.c.is_zero()?
            && self.d.is_zero()?
            && self.e.is_zero()?
            && self.f.is_zero()?)
    }

    pub fn sub_assign(&mut self, other: &BlockMatrix) -> Result<()> {
        self.a.sub_assign(&other.a)?;
        self.b.sub_assign(&other.b)?;
        self.c.sub_assign(&other.c)?;
        self.d.sub_assign(&other.d)?;
        self.e.sub_assign(&other.e)?;
        self.f.sub_assign(&other.f)?;
        Ok(())
    }

    pub fn neg(&self) -> Result<BlockMatrix> {
        Ok(BlockMatrix {
            a: self.a.scale_i64(-1)?,
            b: self.b.scale_i64(-1)?,
            c: self.c.scale_i64(-1)?,
            d: self.d.scale_i64(-1)?,
            e: self.e.scale_i64(-1)?,
            f: self.f.scale_i64(-1)?,
        })
    }
}
