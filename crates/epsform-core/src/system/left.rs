//! Left-block reduction: clearing pole order from the coupling B of the
//! active block to the left block.
//!
//! For the highest order k with non-zero B, the gauge condition
//! "the order-k coefficient of B vanishes after applying G/(x−x1)^k"
//! is linear in the entries of G: k·G + A₀ᶜ·G − G·A₀ᴬ = Bₖ. An
//! inconsistent system is a hard failure; there is no fallback.

use std::collections::BTreeMap;

use tracing::info;

use epsform_engine::{Expr, Matrix};

use crate::error::{Error, Result};
use crate::point::SingPoint;

use super::{row_entry_add, row_entry_sub, System};

impl System {
    /// Logs the left pole order of every singularity.
    pub fn left_ranks(&mut self) -> Result<()> {
        for (xj, pr) in self.singularities.clone() {
            let mut k = pr.rank;
            while k >= 0 && self.a(&xj, k)?.b.is_zero()? {
                k -= 1;
            }
            if k >= 0 {
                info!("rank:\t{xj}:{k}");
            }
        }
        Ok(())
    }

    /// Annihilates the highest pole order of B at `xj` with one left
    /// gauge; returns the remaining left pole order.
    pub fn left_reduce(&mut self, xj: &SingPoint) -> Result<i32> {
        let Some(pr) = self.singularities.get(xj).copied() else {
            info!("no singularity at {xj}");
            return Ok(-1);
        };

        let mut k = pr.rank;
        while k >= 0 && self.a(xj, k)?.b.is_zero()? {
            k -= 1;
        }

        if k <= 0 {
            info!("{xj} is already a fuchsian singularity.");
            return Ok(k);
        }

        let b = self.a(xj, k)?.b;
        let a0 = self.a(xj, 0)?;

        let rows = b.rows();
        let cols = b.cols();
        let nn = rows * cols;
        let pos = |i: usize, j: usize| i * cols + j;

        let mut solver = self.new_solver(nn, nn + 1)?;
        let minus_k = Expr::from_i64(&self.engine, -i64::from(k))?;

        for i in 0..rows {
            for j in 0..cols {
                let mut row: BTreeMap<usize, Expr> = BTreeMap::new();

                row.insert(nn, b.get(i, j)?);
                row_entry_add(&mut row, pos(i, j), &minus_k)?;

                for m in 0..rows {
                    row_entry_sub(&mut row, pos(m, j), &a0.c.get(i, m)?)?;
                }
                for m in 0..cols {
                    row_entry_add(&mut row, pos(i, m), &a0.a.get(m, j)?)?;
                }

                solver.set(row)?;
            }
        }

        solver.run()?;

        let mut g = Matrix::zeros(&self.engine, rows, cols)?;

        for row in solver.rows() {
            let row = row?;
            let lead = row.leading().expect("reduced rows are non-empty");

            if lead == nn {
                return Err(Error::NoSolution);
            }
            if row.len() < 2 {
                continue;
            }

            let (last_col, last_val) = row.iter().last().expect("row is non-empty");
            if *last_col != nn {
                continue;
            }

            g.set(lead / cols, lead % cols, last_val)?;
        }

        self.left_transform(&g, xj, k)?;

        if !self.a(xj, k)?.b.is_zero()? {
            return Err(Error::TransformationFailed);
        }

        k -= 1;
        while k >= 0 && self.a(xj, k)?.b.is_zero()? {
            k -= 1;
        }

        info!("new rank:\t{xj}:{k}");
        Ok(k)
    }

    /// Left-reduces every singularity until its B coupling is pole-free.
    pub fn left_fuchsify(&mut self) -> Result<()> {
        for (xj, pr) in self.singularities.clone() {
            let mut k = pr.rank;
            while k >= 0 && self.a(&xj, k)?.b.is_zero()? {
                k -= 1;
            }

            if k >= 0 {
                info!("rank:    \t{xj}:{k}");
            }

            while k > 0 {
                k = self.left_reduce(&xj)?;
            }
        }
        Ok(())
    }

    /// Left-reduces the one singularity `xj`.
    pub fn left_fuchsify_at(&mut self, xj: &SingPoint) -> Result<()> {
        let Some(pr) = self.singularities.get(xj).copied() else {
            info!("no singularity at {xj}");
            return Ok(());
        };

        let mut k = pr.rank;
        while k >= 0 && self.a(xj, k)?.b.is_zero()? {
            k -= 1;
        }

        if k < 0 {
            info!("off-diagonal block is not singular at {xj}");
            return Ok(());
        }

        info!("rank:    \t{xj}:{k}");

        while k > 0 {
            k = self.left_reduce(xj)?;
        }
        Ok(())
    }
}
