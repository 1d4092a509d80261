//! Balance transformations.
//!
//! A balance with projector P moves one unit of pole order from x1 to x2
//! via the gauge T = 1 + (x1−x2)/(x−x1)·P (and its limits when one point
//! is infinity). The coefficient maps are rebuilt in full from the two
//! sandwiched copies P·M·(1−P) and (1−P)·M·P of the pre-transform system.

use std::collections::BTreeMap;

use epsform_engine::Matrix;

use crate::blocks::BlockMatrix;
use crate::error::Result;
use crate::point::SingPoint;

use super::System;

/// One-sided sandwich L·M·R of a system's coefficients, with couplings
/// L·B and E·R. Snapshot of the pre-transform state; the inactive diagonal
/// blocks are never consulted.
struct Sandwich {
    a_map: BTreeMap<(SingPoint, i32), BlockMatrix>,
    b_map: BTreeMap<i32, BlockMatrix>,
    null: BlockMatrix,
}

impl Sandwich {
    fn new(system: &System, left: &Matrix, right: &Matrix) -> Result<Sandwich> {
        let wrap = |mat: &BlockMatrix| -> Result<BlockMatrix> {
            Ok(BlockMatrix {
                a: Matrix::empty(&system.engine),
                b: left.mul(&mat.b)?,
                c: Matrix::mul3(left, &mat.c, right)?,
                d: Matrix::empty(&system.engine),
                e: mat.e.mul(right)?,
                f: Matrix::empty(&system.engine),
            })
        };

        let mut a_map = BTreeMap::new();
        for (key, mat) in &system.a_map {
            a_map.insert(key.clone(), wrap(mat)?);
        }
        let mut b_map = BTreeMap::new();
        for (k, mat) in &system.b_map {
            b_map.insert(*k, wrap(mat)?);
        }

        Ok(Sandwich {
            a_map,
            b_map,
            null: system.null.clone(),
        })
    }

    fn a(&self, xj: &SingPoint, k: i32) -> BlockMatrix {
        self.a_map
            .get(&(xj.clone(), k))
            .cloned()
            .unwrap_or_else(|| self.null.clone())
    }

    fn b(&self, k: i32) -> BlockMatrix {
        self.b_map.get(&k).cloned().unwrap_or_else(|| self.null.clone())
    }
}

impl System {
    /// Applies the balance with projector `p` between `x1` and `x2`,
    /// invalidates the caches of the touched points, refreshes the rank
    /// index and logs the step.
    pub fn balance(&mut self, p: &Matrix, x1: &SingPoint, x2: &SingPoint) -> Result<()> {
        match (x1.is_infinity(), x2.is_infinity()) {
            (true, _) => self.balance_inf_finite(p, x2)?,
            (_, true) => self.balance_finite_inf(p, x1)?,
            _ => self.balance_finite_finite(p, x1, x2)?,
        }

        self.jordans.clear();
        self.eigenvalues.remove(x1);
        self.eigenvalues.remove(x2);

        self.update_poincare_ranks()?;

        self.tqueue.balance(p, x1, x2)
    }

    fn rank_of(&self, xj: &SingPoint) -> i32 {
        self.singularities.get(xj).map_or(0, |pr| pr.rank)
    }

    fn finite_points(&self) -> Vec<SingPoint> {
        self.singularities
            .keys()
            .filter(|p| !p.is_infinity())
            .cloned()
            .collect()
    }

    pub(crate) fn a_keys(&self) -> Vec<(SingPoint, i32)> {
        self.a_map.keys().cloned().collect()
    }

    fn balance_finite_finite(&mut self, p: &Matrix, x1: &SingPoint, x2: &SingPoint) -> Result<()> {
        let id = Matrix::identity(&self.engine, p.rows())?;
        let pm = Sandwich::new(self, p, &id.sub(p)?)?;
        let bp = Sandwich::new(self, &id.sub(p)?, p)?;

        let x1e = x1.expr().expect("finite point").clone();
        let x2e = x2.expr().expect("finite point").clone();
        let d12 = x1e.sub(&x2e)?; // x1 - x2
        let d21 = x2e.sub(&x1e)?; // x2 - x1
        let kmax = self.kmax;

        self.ensure_singularity(x1);
        self.ensure_singularity(x2);
        let rank1 = self.rank_of(x1);
        let rank2 = self.rank_of(x2);

        // A(x1,0)
        {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            for n in 0..=rank1 {
                let pw = d21.pow(n as i64)?;
                dc.sub_assign(&pm.a(x1, n).c.div(&pw)?)?;
                db.sub_assign(&pm.a(x1, n).b.div(&pw)?)?;
            }

            for ((xj, n), mat) in &bp.a_map {
                if xj == x1 {
                    continue;
                }
                let xje = xj.expr().expect("finite point in coefficient map");
                let f = d12.div(&x1e.sub(xje)?.pow(*n as i64 + 1)?)?;
                dc.add_assign(&mat.c.scale(&f)?)?;
                de.add_assign(&mat.e.scale(&f)?)?;
            }

            for n in 0..=kmax {
                let f = x1e.pow(n as i64)?.mul(&d12)?;
                dc.add_assign(&bp.b(n).c.scale(&f)?)?;
                de.add_assign(&bp.b(n).e.scale(&f)?)?;
            }

            dc.add_assign(p)?;

            let entry = self.a_entry(x1, 0);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // A(x1,k>0)
        for k in 1..=rank1 {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.add_assign(&bp.a(x1, k - 1).c.scale(&d12)?)?;
            de.add_assign(&bp.a(x1, k - 1).e.scale(&d12)?)?;

            for n in 0..=(rank1 - k) {
                let pw = d21.pow(n as i64)?;
                dc.sub_assign(&pm.a(x1, n + k).c.div(&pw)?)?;
                db.sub_assign(&pm.a(x1, n + k).b.div(&pw)?)?;
            }

            let entry = self.a_entry(x1, k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // Pole order at x1 can grow by one.
        {
            let top = bp.a(x1, rank1);
            if !top.c.is_zero()? || !top.e.is_zero()? {
                let dc = top.c.scale(&d12)?;
                let de = top.e.scale(&d12)?;
                let entry = self.a_entry(x1, rank1 + 1);
                entry.c.add_assign(&dc)?;
                entry.e.add_assign(&de)?;
            }
        }

        // A(x2,0)
        {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            for n in 0..=rank2 {
                let pw = d12.pow(n as i64)?;
                dc.sub_assign(&bp.a(x2, n).c.div(&pw)?)?;
                de.sub_assign(&bp.a(x2, n).e.div(&pw)?)?;
            }

            for ((xj, n), mat) in &pm.a_map {
                if xj == x2 {
                    continue;
                }
                let xje = xj.expr().expect("finite point in coefficient map");
                let f = d21.div(&x2e.sub(xje)?.pow(*n as i64 + 1)?)?;
                dc.add_assign(&mat.c.scale(&f)?)?;
                db.add_assign(&mat.b.scale(&f)?)?;
            }

            for n in 0..=kmax {
                let f = x2e.pow(n as i64)?.mul(&d21)?;
                dc.add_assign(&pm.b(n).c.scale(&f)?)?;
                db.add_assign(&pm.b(n).b.scale(&f)?)?;
            }

            dc.sub_assign(p)?;

            let entry = self.a_entry(x2, 0);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // A(x2,k>0)
        for k in 1..=rank2 {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.add_assign(&pm.a(x2, k - 1).c.scale(&d21)?)?;
            db.add_assign(&pm.a(x2, k - 1).b.scale(&d21)?)?;

            for n in 0..=(rank2 - k) {
                let pw = d12.pow(n as i64)?;
                dc.sub_assign(&bp.a(x2, n + k).c.div(&pw)?)?;
                de.sub_assign(&bp.a(x2, n + k).e.div(&pw)?)?;
            }

            let entry = self.a_entry(x2, k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // Pole order at x2 can grow by one.
        {
            let top = pm.a(x2, rank2);
            if !top.b.is_zero()? || !top.c.is_zero()? {
                let db = top.b.scale(&d21)?;
                let dc = top.c.scale(&d21)?;
                let entry = self.a_entry(x2, rank2 + 1);
                entry.b.add_assign(&db)?;
                entry.c.add_assign(&dc)?;
            }
        }

        // A(xj,k) away from both points
        for (xj, k) in self.a_keys() {
            if xj == *x1 || xj == *x2 {
                continue;
            }
            let rankj = self.rank_of(&xj);
            let xje = xj.expr().expect("finite point in coefficient map").clone();

            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            for n in 0..=(rankj - k) {
                let f1 = d21.div(&x1e.sub(&xje)?.pow(n as i64 + 1)?)?;
                dc.add_assign(&bp.a(&xj, n + k).c.scale(&f1)?)?;
                de.add_assign(&bp.a(&xj, n + k).e.scale(&f1)?)?;

                let f2 = d12.div(&x2e.sub(&xje)?.pow(n as i64 + 1)?)?;
                dc.add_assign(&pm.a(&xj, n + k).c.scale(&f2)?)?;
                db.add_assign(&pm.a(&xj, n + k).b.scale(&f2)?)?;
            }

            let entry = self.a_entry(&xj, k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // B(k)
        for k in 0..=kmax {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            for n in 0..=(kmax - k - 1) {
                let f1 = x1e.pow(n as i64)?.mul(&d12)?;
                let f2 = x2e.pow(n as i64)?.mul(&d12)?;
                dc.add_assign(&bp.b(k + n + 1).c.scale(&f1)?)?;
                dc.sub_assign(&pm.b(k + n + 1).c.scale(&f2)?)?;
                db.sub_assign(&pm.b(k + n + 1).b.scale(&f2)?)?;
                de.add_assign(&bp.b(k + n + 1).e.scale(&f1)?)?;
            }

            let entry = self.b_entry(k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        Ok(())
    }

    fn balance_finite_inf(&mut self, p: &Matrix, x1: &SingPoint) -> Result<()> {
        let id = Matrix::identity(&self.engine, p.rows())?;
        let pm = Sandwich::new(self, p, &id.sub(p)?)?;
        let bp = Sandwich::new(self, &id.sub(p)?, p)?;

        let x1e = x1.expr().expect("finite point").clone();
        let kmax = self.kmax;
        let rank1 = self.rank_of(x1);

        // A(x1,0)
        {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.a(x1, 0).c)?;
            dc.sub_assign(&pm.a(x1, 0).c)?;
            dc.add_assign(&pm.a(x1, 1).c)?;
            db.sub_assign(&pm.a(x1, 0).b)?;
            db.add_assign(&pm.a(x1, 1).b)?;
            de.sub_assign(&bp.a(x1, 0).e)?;

            for ((xj, n), mat) in &bp.a_map {
                if xj == x1 {
                    continue;
                }
                let xje = xj.expr().expect("finite point in coefficient map");
                let pw = x1e.sub(xje)?.pow(*n as i64 + 1)?;
                dc.add_assign(&mat.c.div(&pw)?)?;
                de.add_assign(&mat.e.div(&pw)?)?;
            }

            for n in 0..=kmax {
                let f = x1e.pow(n as i64)?;
                dc.add_assign(&bp.b(n).c.scale(&f)?)?;
                de.add_assign(&bp.b(n).e.scale(&f)?)?;
            }

            dc.add_assign(p)?;

            let entry = self.a_entry(x1, 0);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // A(x1,k>0)
        for k in 1..=rank1 {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.a(x1, k).c)?;
            dc.sub_assign(&pm.a(x1, k).c)?;
            dc.add_assign(&pm.a(x1, k + 1).c)?;
            dc.add_assign(&bp.a(x1, k - 1).c)?;
            db.sub_assign(&pm.a(x1, k).b)?;
            db.add_assign(&pm.a(x1, k + 1).b)?;
            de.sub_assign(&bp.a(x1, k).e)?;
            de.add_assign(&bp.a(x1, k - 1).e)?;

            let entry = self.a_entry(x1, k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        {
            let top = bp.a(x1, rank1);
            if !top.c.is_zero()? || !top.e.is_zero()? {
                let entry = self.a_entry(x1, rank1 + 1);
                entry.c.add_assign(&top.c)?;
                entry.e.add_assign(&top.e)?;
            }
        }

        // A(xj != x1, k)
        for (xj, k) in self.a_keys() {
            if xj == *x1 {
                continue;
            }
            let rankj = self.rank_of(&xj);
            let xje = xj.expr().expect("finite point in coefficient map").clone();
            let shift = xje.sub(&x1e)?; // xj - x1

            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.a(&xj, k).c)?;
            dc.sub_assign(&pm.a(&xj, k).c)?;
            dc.add_assign(&pm.a(&xj, k + 1).c)?;
            dc.add_assign(&pm.a(&xj, k).c.scale(&shift)?)?;
            db.sub_assign(&pm.a(&xj, k).b)?;
            db.add_assign(&pm.a(&xj, k + 1).b)?;
            db.add_assign(&pm.a(&xj, k).b.scale(&shift)?)?;
            de.sub_assign(&bp.a(&xj, k).e)?;

            for n in 0..=(rankj - k) {
                let pw = x1e.sub(&xje)?.pow(n as i64 + 1)?;
                dc.sub_assign(&bp.a(&xj, n + k).c.div(&pw)?)?;
                de.sub_assign(&bp.a(&xj, n + k).e.div(&pw)?)?;
            }

            let entry = self.a_entry(&xj, k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // B(0)
        {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.b(0).c)?;
            dc.sub_assign(&pm.b(0).c)?;
            dc.sub_assign(&pm.b(0).c.scale(&x1e)?)?;
            db.sub_assign(&pm.b(0).b)?;
            db.sub_assign(&pm.b(0).b.scale(&x1e)?)?;
            de.sub_assign(&bp.b(0).e)?;

            for xj in self.finite_points() {
                dc.add_assign(&pm.a(&xj, 0).c)?;
                db.add_assign(&pm.a(&xj, 0).b)?;
            }

            for n in 0..=(kmax - 1) {
                let f = x1e.pow(n as i64)?;
                dc.add_assign(&bp.b(n + 1).c.scale(&f)?)?;
                de.add_assign(&bp.b(n + 1).e.scale(&f)?)?;
            }

            let entry = self.b_entry(0);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // B(k > 0)
        for k in 1..=kmax {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.b(k).c)?;
            dc.sub_assign(&pm.b(k).c)?;
            dc.add_assign(&pm.b(k - 1).c)?;
            dc.sub_assign(&pm.b(k).c.scale(&x1e)?)?;
            db.sub_assign(&pm.b(k).b)?;
            db.add_assign(&pm.b(k - 1).b)?;
            db.sub_assign(&pm.b(k).b.scale(&x1e)?)?;
            de.sub_assign(&bp.b(k).e)?;

            for n in 0..=(kmax - k - 1) {
                let f = x1e.pow(n as i64)?;
                dc.add_assign(&bp.b(k + n + 1).c.scale(&f)?)?;
                de.add_assign(&bp.b(k + n + 1).e.scale(&f)?)?;
            }

            let entry = self.b_entry(k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // Taylor tail can grow by one order.
        {
            let top = pm.b(kmax);
            if !top.b.is_zero()? || !top.c.is_zero()? {
                let entry = self.b_entry(kmax + 1);
                entry.b.add_assign(&top.b)?;
                entry.c.add_assign(&top.c)?;
            }
        }

        Ok(())
    }

    fn balance_inf_finite(&mut self, p: &Matrix, x2: &SingPoint) -> Result<()> {
        let id = Matrix::identity(&self.engine, p.rows())?;
        let pm = Sandwich::new(self, p, &id.sub(p)?)?;
        let bp = Sandwich::new(self, &id.sub(p)?, p)?;

        let x2e = x2.expr().expect("finite point").clone();
        let kmax = self.kmax;

        self.ensure_singularity(x2);
        let rank2 = self.rank_of(x2);

        // A(x2,0)
        {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.a(x2, 0).c)?;
            dc.sub_assign(&pm.a(x2, 0).c)?;
            dc.add_assign(&bp.a(x2, 1).c)?;
            db.sub_assign(&pm.a(x2, 0).b)?;
            de.sub_assign(&bp.a(x2, 0).e)?;
            de.add_assign(&bp.a(x2, 1).e)?;

            for ((xj, n), mat) in &pm.a_map {
                if xj == x2 {
                    continue;
                }
                let xje = xj.expr().expect("finite point in coefficient map");
                let pw = x2e.sub(xje)?.pow(*n as i64 + 1)?;
                dc.add_assign(&mat.c.div(&pw)?)?;
                db.add_assign(&mat.b.div(&pw)?)?;
            }

            for n in 0..=kmax {
                let f = x2e.pow(n as i64)?;
                dc.add_assign(&pm.b(n).c.scale(&f)?)?;
                db.add_assign(&pm.b(n).b.scale(&f)?)?;
            }

            dc.sub_assign(p)?;

            let entry = self.a_entry(x2, 0);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // A(x2,k>0)
        for k in 1..=rank2 {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.a(x2, k).c)?;
            dc.sub_assign(&pm.a(x2, k).c)?;
            dc.add_assign(&pm.a(x2, k - 1).c)?;
            dc.add_assign(&bp.a(x2, k + 1).c)?;
            db.sub_assign(&pm.a(x2, k).b)?;
            db.add_assign(&pm.a(x2, k - 1).b)?;
            de.sub_assign(&bp.a(x2, k).e)?;
            de.add_assign(&bp.a(x2, k + 1).e)?;

            let entry = self.a_entry(x2, k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        {
            let top = pm.a(x2, rank2);
            if !top.b.is_zero()? || !top.c.is_zero()? {
                let entry = self.a_entry(x2, rank2 + 1);
                entry.b.add_assign(&top.b)?;
                entry.c.add_assign(&top.c)?;
            }
        }

        // A(xj != x2, k)
        for (xj, k) in self.a_keys() {
            if xj == *x2 {
                continue;
            }
            let rankj = self.rank_of(&xj);
            let xje = xj.expr().expect("finite point in coefficient map").clone();
            let shift = xje.sub(&x2e)?; // xj - x2

            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.a(&xj, k).c)?;
            dc.sub_assign(&pm.a(&xj, k).c)?;
            dc.add_assign(&bp.a(&xj, k + 1).c)?;
            dc.add_assign(&bp.a(&xj, k).c.scale(&shift)?)?;
            db.sub_assign(&pm.a(&xj, k).b)?;
            de.sub_assign(&bp.a(&xj, k).e)?;
            de.add_assign(&bp.a(&xj, k + 1).e)?;
            de.add_assign(&bp.a(&xj, k).e.scale(&shift)?)?;

            for n in 0..=(rankj - k) {
                let pw = x2e.sub(&xje)?.pow(n as i64 + 1)?;
                dc.sub_assign(&pm.a(&xj, n + k).c.div(&pw)?)?;
                db.sub_assign(&pm.a(&xj, n + k).b.div(&pw)?)?;
            }

            let entry = self.a_entry(&xj, k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // B(0)
        {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.b(0).c)?;
            dc.sub_assign(&pm.b(0).c)?;
            dc.sub_assign(&bp.b(0).c.scale(&x2e)?)?;
            db.sub_assign(&pm.b(0).b)?;
            de.sub_assign(&bp.b(0).e)?;
            de.sub_assign(&bp.b(0).e.scale(&x2e)?)?;

            for xj in self.finite_points() {
                dc.add_assign(&bp.a(&xj, 0).c)?;
                de.add_assign(&bp.a(&xj, 0).e)?;
            }

            for n in 0..=(kmax - 1) {
                let f = x2e.pow(n as i64)?;
                dc.add_assign(&pm.b(n + 1).c.scale(&f)?)?;
                db.add_assign(&pm.b(n + 1).b.scale(&f)?)?;
            }

            let entry = self.b_entry(0);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        // B(k > 0)
        for k in 1..=kmax {
            let mut dc = self.null.c.clone();
            let mut db = self.null.b.clone();
            let mut de = self.null.e.clone();

            dc.sub_assign(&bp.b(k).c)?;
            dc.sub_assign(&pm.b(k).c)?;
            dc.add_assign(&bp.b(k - 1).c)?;
            dc.sub_assign(&bp.b(k).c.scale(&x2e)?)?;
            db.sub_assign(&pm.b(k).b)?;
            de.sub_assign(&bp.b(k).e)?;
            de.add_assign(&bp.b(k - 1).e)?;
            de.sub_assign(&bp.b(k).e.scale(&x2e)?)?;

            for n in 0..=(kmax - k - 1) {
                let f = x2e.pow(n as i64)?;
                dc.add_assign(&pm.b(k + n + 1).c.scale(&f)?)?;
                db.add_assign(&pm.b(k + n + 1).b.scale(&f)?)?;
            }

            let entry = self.b_entry(k);
            entry.c.add_assign(&dc)?;
            entry.b.add_assign(&db)?;
            entry.e.add_assign(&de)?;
        }

        {
            let top = bp.b(kmax);
            if !top.c.is_zero()? || !top.e.is_zero()? {
                let entry = self.b_entry(kmax + 1);
                entry.c.add_assign(&top.c)?;
                entry.e.add_assign(&top.e)?;
            }
        }

        Ok(())
    }
}
