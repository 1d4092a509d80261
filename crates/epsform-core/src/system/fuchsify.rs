//! Fuchsification: reduce every Poincaré rank of the active block to 0.
//!
//! Each round picks an irregular singularity x1 and searches for a
//! projector Q such that the balance (x1 → x2) does not raise the rank at
//! either point. The two-point projector couples the leading Jordan
//! subspace at x1 to an invariant subspace at x2; when no candidate x2
//! admits one, a one-point projector built from x1's own Jordan data is
//! balanced against a fresh regular point. Each successful balance
//! strictly lowers the total pole order, which bounds the loop.

use std::collections::BTreeSet;

use tracing::info;

use epsform_engine::Matrix;

use crate::error::Result;
use crate::point::SingPoint;

use super::{PoincareRank, System};

impl System {
    /// Reduces rankC to 0 at every singularity.
    pub fn fuchsify(&mut self) -> Result<()> {
        loop {
            self.print_singularities();

            let sings = self.sings_vec();
            let mut finished = true;
            let mut chosen: Option<(SingPoint, SingPoint, Matrix)> = None;

            'search: for (x1, pr) in &sings {
                if pr.rank_c <= 0 {
                    continue;
                }
                finished = false;
                for (x2, pr2) in &sings {
                    if x2 == x1 || pr2.rank_c < 0 {
                        continue;
                    }
                    if let Some(q) = self.projector_q(x1, x2)? {
                        chosen = Some((x1.clone(), x2.clone(), q));
                        break 'search;
                    }
                }
            }

            if finished {
                break;
            }

            let (x1, x2, q) = match chosen {
                Some(found) => found,
                None => {
                    let (x1, _) = sings
                        .iter()
                        .find(|(_, pr)| pr.rank_c > 0)
                        .expect("an irregular singularity exists")
                        .clone();
                    let x2 = self.regular_point()?;
                    let p = self.projector_p(&x1)?;
                    (x1, x2, p)
                }
            };

            self.balance(&q, &x1, &x2)?;
        }
        Ok(())
    }

    /// Reduces rankC to 0 at the one singularity `x1`.
    pub fn fuchsify_at(&mut self, x1: &SingPoint) -> Result<()> {
        if !self.singularities.contains_key(x1) {
            info!("no singularity at {x1}");
            return Ok(());
        }

        self.print_singularities();

        while self.singularities.get(x1).map_or(0, |pr| pr.rank_c) > 0 {
            let mut chosen: Option<(SingPoint, Matrix)> = None;
            for (x2, pr) in self.sings_vec() {
                if x2 == *x1 || pr.rank_c < 0 {
                    continue;
                }
                if let Some(q) = self.projector_q(x1, &x2)? {
                    chosen = Some((x2, q));
                    break;
                }
            }

            let (x2, q) = match chosen {
                Some(found) => found,
                None => (self.regular_point()?, self.projector_p(x1)?),
            };

            self.balance(&q, x1, &x2)?;

            self.print_singularities();
        }
        Ok(())
    }

    fn sings_vec(&self) -> Vec<(SingPoint, PoincareRank)> {
        self.singularities
            .iter()
            .map(|(p, r)| (p.clone(), *r))
            .collect()
    }

    /// Two-point projector: leading Jordan subspace at x1, matched against
    /// an invariant subspace at x2. `None` means the candidate pair fails
    /// the compatibility test and the search should move on.
    pub(crate) fn projector_q(
        &mut self,
        x1: &SingPoint,
        x2: &SingPoint,
    ) -> Result<Option<Matrix>> {
        let rank_c = self.singularities.get(x1).map_or(-1, |pr| pr.rank_c);
        let a1 = self.a(x1, rank_c - 1)?;

        let (u0, v0) = self.leading_bases(x1)?;

        let l0 = Matrix::mul3(&v0, &a1.c, &u0)?;
        let l1 = v0.mul(&u0)?;

        let mut k = 0;
        while k < l1.rows() && l1.get(k, k)?.is_zero() {
            k += 1;
        }

        let (k0, mut s, delta) = self.reduce_l0(l0, k, x1)?;

        let id = Matrix::identity(&self.engine, delta.rows())?;
        let u0 = u0.mul(&id.add(&delta)?)?;
        s.insert(k0);

        let uk = select_columns(&u0, &s)?;

        let Some(vk) = self.invariant_subspace(x2, &uk)? else {
            return Ok(None);
        };

        Ok(Some(uk.mul(&vk.transpose()?)?))
    }

    /// One-point projector from x1's own leading Jordan subspace and the
    /// dual chain tails.
    pub(crate) fn projector_p(&mut self, x1: &SingPoint) -> Result<Matrix> {
        let rank_c = self.singularities.get(x1).map_or(-1, |pr| pr.rank_c);
        let a1 = self.a(x1, rank_c - 1)?;

        let (u0, v0) = self.leading_bases(x1)?;

        let inv = self.inverse_jordan(x1)?;
        let n = self.dim_c();
        let mut vn = Matrix::zeros(&self.engine, n, inv.len())?;
        for (i, block) in inv.iter().enumerate() {
            let tail = block.rootvectors.back().expect("chains are non-empty");
            vn.set_col(i, tail)?;
        }

        let l0 = Matrix::mul3(&v0, &a1.c, &u0)?;
        let l1 = v0.mul(&u0)?;

        let mut k = 0;
        while k < l1.rows() && l1.get(k, k)?.is_zero() {
            k += 1;
        }

        let (k0, mut s, delta) = self.reduce_l0(l0, k, x1)?;

        let id = Matrix::identity(&self.engine, delta.rows())?;

        // Neumann series of (1 + Δ)⁻¹; Δ is nilpotent so it terminates.
        let neg_delta = delta.scale_i64(-1)?;
        let mut xdelta = Matrix::zeros(&self.engine, delta.rows(), delta.cols())?;
        let mut term = id.clone();
        while !term.is_zero()? {
            xdelta.add_assign(&term)?;
            term = term.mul(&neg_delta)?;
        }
        let xdelta = xdelta.transpose()?;

        let u0 = u0.mul(&id.add(&delta)?)?;
        let vn = vn.mul(&xdelta)?;

        s.insert(k0);

        let uk = select_columns(&u0, &s)?;
        let vk = select_columns(&vn, &s)?;

        Ok(uk.mul(&vk.transpose()?)?)
    }

    /// Column basis of leading root vectors and the dual row basis.
    fn leading_bases(&mut self, x1: &SingPoint) -> Result<(Matrix, Matrix)> {
        let jordans = self.jordan(x1)?.clone();
        let inv = self.inverse_jordan(x1)?;
        let n = self.dim_c();

        let mut u0 = Matrix::zeros(&self.engine, n, jordans.len())?;
        for (i, block) in jordans.iter().enumerate() {
            let lead = block.rootvectors.front().expect("chains are non-empty");
            u0.set_col(i, lead)?;
        }

        let mut v0 = Matrix::zeros(&self.engine, inv.len(), n)?;
        for (i, block) in inv.iter().enumerate() {
            let lead = block.rootvectors.front().expect("chains are non-empty");
            v0.set_row(i, &lead.transpose()?)?;
        }

        Ok((u0, v0))
    }

    /// Echelon-based column selection on the coupling L0. Repeatedly finds
    /// the first unprocessed column that adds no rank, eliminates it
    /// against the earlier columns (accumulating the correction Δ), and
    /// stops once a column inside the leading zero-diagonal range of L1 is
    /// selected. Returns that column, the other selected columns and Δ.
    fn reduce_l0(
        &mut self,
        mut l0: Matrix,
        k: usize,
        x1: &SingPoint,
    ) -> Result<(usize, BTreeSet<usize>, Matrix)> {
        let id = Matrix::identity(&self.engine, l0.rows())?;
        let chain_lens: Vec<usize> = self
            .jordan(x1)?
            .iter()
            .map(|b| b.rootvectors.len())
            .collect();

        let mut s: BTreeSet<usize> = BTreeSet::new();
        let mut delta = Matrix::zeros(&self.engine, l0.rows(), l0.cols())?;

        loop {
            // Rows already selected drop out of the rank probe.
            let mut l0x = Matrix::empty(&self.engine);
            for i in 0..l0.rows() {
                if s.contains(&i) {
                    continue;
                }
                l0x = l0x.stack(&l0.row(i)?)?;
            }

            let mut rank = 0;
            let mut found = l0x.cols();
            let mut cj: Option<Matrix> = None;

            for i in 0..l0x.cols() {
                let l0p = l0x.submatrix(0, l0x.rows() - 1, 0, i)?;
                let newrank = l0p.rank()?;

                if !s.contains(&i) && newrank == rank {
                    found = i;
                    if l0p.col(i)?.is_zero()? {
                        break;
                    }

                    let mut red = l0p.clone();
                    let rk = red.row_echelon()?;

                    let mut c = Matrix::zeros(&self.engine, i, 1)?;
                    for n in 0..rk {
                        for j in n..i {
                            if red.get(n, j)?.is_one() {
                                c.set(j, 0, &red.get(n, i)?)?;
                            }
                        }
                    }
                    cj = Some(c);
                    break;
                }
                rank = newrank;
            }

            if let Some(c) = cj {
                if !c.is_empty() {
                    let mut delta0 = Matrix::identity(&self.engine, l0.rows())?;
                    let mut delta0x = Matrix::identity(&self.engine, l0.rows())?;

                    for n in 0..found {
                        let coeff = c.get(n, 0)?;
                        delta0.set(n, found, &coeff.neg()?)?;
                        if chain_lens[n] == chain_lens[found] {
                            delta0x.set(n, found, &coeff)?;
                        }
                    }

                    l0 = Matrix::mul3(&delta0x, &l0, &delta0)?;
                    delta = delta0.sub(&id)?.add(&delta.mul(&delta0)?)?;
                }
            }

            s.insert(found);
            if found < k {
                s.remove(&found);
                return Ok((found, s, delta));
            }
        }
    }

    /// Looks for a dual basis at x2 pairing one-to-one with the columns of
    /// `uk`; `None` when the chains run out before every column is
    /// matched.
    fn invariant_subspace(&mut self, x2: &SingPoint, uk: &Matrix) -> Result<Option<Matrix>> {
        let mut inv = self.inverse_jordan(x2)?;
        let mut found: BTreeSet<usize> = BTreeSet::new();
        let mut vk = Matrix::zeros(&self.engine, uk.rows(), uk.cols())?;

        while !inv.is_empty() {
            let mut idx = 0;
            while idx < inv.len() {
                let v = inv[idx]
                    .rootvectors
                    .pop_front()
                    .expect("blocks with empty chains are removed");

                let test = v.transpose()?.mul(uk)?;

                // The pairing row must single out exactly one column.
                let mut pos = None;
                let mut norm = None;
                for c in 0..test.cols() {
                    let sp = test.get(0, c)?;
                    if !sp.is_zero() {
                        if pos.is_none() {
                            pos = Some(c);
                            norm = Some(sp);
                        } else {
                            pos = None;
                            break;
                        }
                    }
                }

                let exhausted = inv[idx].rootvectors.is_empty();
                let duplicate = pos.is_some_and(|p| found.contains(&p));
                let remove = exhausted || pos.is_none() || duplicate;

                if remove {
                    inv.remove(idx);
                } else {
                    idx += 1;
                }

                if let (Some(p), Some(norm)) = (pos, norm) {
                    let v = v.div(&norm)?;
                    vk.set_col(p, &v)?;
                    found.insert(p);

                    if found.len() == uk.cols() {
                        return Ok(Some(vk));
                    }
                }
            }
        }

        Ok(None)
    }
}

fn select_columns(m: &Matrix, s: &BTreeSet<usize>) -> Result<Matrix> {
    let mut out = Matrix::zeros(m.engine(), m.rows(), s.len())?;
    for (i, &col) in s.iter().enumerate() {
        out.set_col(i, &m.col(col)?)?;
    }
    Ok(out)
}
