//! Global similarity and left gauge transformations.
//!
//! A global transform conjugates the active block by T. A left gauge
//! G/(x−x1)^k (or G·x^k at infinity) acts on the coupling of the active
//! block to the left block: it shifts the B and D blocks without touching
//! the active block itself. The "full" variant used during replay acts on
//! an unpartitioned system, where the same gauge shows up as commutators
//! with the full coefficient.

use epsform_engine::Matrix;

use crate::error::{Error, Result};
use crate::point::SingPoint;

use super::{PoincareRank, System};

impl System {
    /// Global similarity transform of the active block: C ↦ T⁻¹CT,
    /// B ↦ T⁻¹B, E ↦ ET. Eigenvalues are invariant, so only the Jordan
    /// bases are invalidated; pole orders cannot change.
    pub fn transform(&mut self, t: &Matrix) -> Result<()> {
        let tinv = t.inverse()?;

        for mat in self.a_map.values_mut() {
            mat.b = tinv.mul(&mat.b)?;
            mat.c = Matrix::mul3(&tinv, &mat.c, t)?;
            mat.e = mat.e.mul(t)?;
        }
        for mat in self.b_map.values_mut() {
            mat.b = tinv.mul(&mat.b)?;
            mat.c = Matrix::mul3(&tinv, &mat.c, t)?;
            mat.e = mat.e.mul(t)?;
        }

        self.jordans.clear();

        self.tqueue.transform(t)
    }

    /// Applies the left gauge G of pole order `k` at `x1` to the B and D
    /// couplings, refreshes the rank index and logs the step.
    pub(crate) fn left_transform(&mut self, g: &Matrix, x1: &SingPoint, k: i32) -> Result<()> {
        if x1.is_infinity() {
            self.left_transform_inf(g, k)?;
        } else {
            self.left_transform_finite(g, x1, k)?;
        }

        self.update_poincare_ranks()?;
        self.tqueue.left_gauge(g, x1, k)
    }

    fn sing_snapshot(&self) -> Vec<(SingPoint, PoincareRank)> {
        self.singularities
            .iter()
            .map(|(p, r)| (p.clone(), *r))
            .collect()
    }

    fn left_transform_finite(&mut self, g: &Matrix, x1: &SingPoint, k: i32) -> Result<()> {
        let x1e = x1.expr().expect("finite point").clone();
        let sings = self.sing_snapshot();
        let kmax = self.kmax;
        let rank1 = self.singularities.get(x1).map_or(0, |pr| pr.rank);

        // B at the other singular points
        for (xj, pr) in &sings {
            if xj == x1 || xj.is_infinity() {
                continue;
            }
            let xje = xj.expr().expect("finite point").clone();

            for n in 0..=pr.rank {
                let mut mat = self.null.b.clone();

                for i in 0..=(pr.rank - n) {
                    let aji = self.a(xj, n + i)?;
                    let comm = aji.c.mul(g)?.sub(&g.mul(&aji.a)?)?;
                    let f = self
                        .powi(-1, k as i64)?
                        .mul(&self.binom((k + i - 1) as i64, i as i64)?)?
                        .div(&x1e.sub(&xje)?.pow((k + i) as i64)?)?;
                    mat.add_assign(&comm.scale(&f)?)?;
                }

                if mat.is_zero()? {
                    continue;
                }
                self.a_entry(xj, n).b.add_assign(&mat)?;
            }
        }

        // B at x1, below the gauge order
        for n in 0..k {
            let mut mat = self.null.b.clone();

            for (xj, i) in self.a_keys() {
                if xj == *x1 {
                    continue;
                }
                let xje = xj.expr().expect("finite point").clone();
                let aji = self.a(&xj, i)?;
                let comm = aji.c.mul(g)?.sub(&g.mul(&aji.a)?)?;
                let f = self
                    .powi(-1, (i + 1) as i64)?
                    .mul(&self.binom((k + i - n - 1) as i64, i as i64)?)?
                    .div(&xje.sub(&x1e)?.pow((k + i - n) as i64)?)?;
                mat.add_assign(&comm.scale(&f)?)?;
            }

            for i in 0..=(kmax - (k - n - 1)) {
                let b = self.b(i + k - n - 1)?;
                let comm = b.c.mul(g)?.sub(&g.mul(&b.a)?)?;
                let f = x1e
                    .pow(i as i64)?
                    .mul(&self.binom((i + k - n - 1) as i64, i as i64)?)?;
                mat.add_assign(&comm.scale(&f)?)?;
            }

            if mat.is_zero()? {
                continue;
            }
            self.a_entry(x1, n).b.add_assign(&mat)?;
        }

        // B at x1, at and above the gauge order
        {
            let a0 = self.a(x1, 0)?;
            let mut mat = a0.c.mul(g)?.sub(&g.mul(&a0.a)?)?;
            mat.add_assign(&g.scale_i64(k as i64)?)?;
            self.a_entry(x1, k).b.add_assign(&mat)?;
        }

        for n in (k + 1)..=(k + rank1) {
            let aj = self.a(x1, n - k)?;
            let mat = aj.c.mul(g)?.sub(&g.mul(&aj.a)?)?;
            if mat.is_zero()? {
                continue;
            }
            self.a_entry(x1, n).b.add_assign(&mat)?;
        }

        // B of the Taylor part
        for n in 0..=kmax {
            let mut mat = self.null.b.clone();

            for m in 0..=(kmax - n - k) {
                for i in 0..=(kmax - n - m - k) {
                    let b = self.b(i + n + m + k)?;
                    let comm = b.c.mul(g)?.sub(&g.mul(&b.a)?)?;
                    let f = self
                        .powi(-1, m as i64)?
                        .mul(&x1e.pow((m + i) as i64)?)?
                        .mul(&self.binom((n + m) as i64, n as i64)?)?
                        .mul(&self.binom((i + n + m + k) as i64, i as i64)?)?;
                    mat.add_assign(&comm.scale(&f)?)?;
                }
            }

            if mat.is_zero()? {
                continue;
            }
            self.b_entry(n).b.add_assign(&mat)?;
        }

        // D at the other singular points
        for (xj, pr) in &sings {
            if xj == x1 || xj.is_infinity() {
                continue;
            }
            let xje = xj.expr().expect("finite point").clone();

            for n in 0..=pr.rank {
                let mut mat = self.null.d.clone();

                for i in 0..=(pr.rank - n) {
                    let aji = self.a(xj, n + i)?;
                    let f = self
                        .powi(-1, k as i64)?
                        .mul(&self.binom((k + i - 1) as i64, i as i64)?)?
                        .div(&x1e.sub(&xje)?.pow((k + i) as i64)?)?;
                    mat.add_assign(&aji.e.mul(g)?.scale(&f)?)?;
                }

                if mat.is_zero()? {
                    continue;
                }
                self.a_entry(xj, n).d.add_assign(&mat)?;
            }
        }

        // D at x1, below the gauge order
        for n in 0..k {
            let mut mat = self.null.d.clone();

            for (xj, i) in self.a_keys() {
                if xj == *x1 {
                    continue;
                }
                let xje = xj.expr().expect("finite point").clone();
                let aji = self.a(&xj, i)?;
                let f = self
                    .powi(-1, (i + 1) as i64)?
                    .mul(&self.binom((k + i - n - 1) as i64, i as i64)?)?
                    .div(&xje.sub(&x1e)?.pow((k + i - n) as i64)?)?;
                mat.add_assign(&aji.e.mul(g)?.scale(&f)?)?;
            }

            for i in 0..=(kmax - (k - n - 1)) {
                let b = self.b(i + k - n - 1)?;
                let f = x1e
                    .pow(i as i64)?
                    .mul(&self.binom((i + k - n - 1) as i64, i as i64)?)?;
                mat.add_assign(&b.e.mul(g)?.scale(&f)?)?;
            }

            if mat.is_zero()? {
                continue;
            }
            self.a_entry(x1, n).d.add_assign(&mat)?;
        }

        // D at x1, at and above the gauge order
        for n in k..=(k + rank1) {
            let aj = self.a(x1, n - k)?;
            let mat = aj.e.mul(g)?;
            if mat.is_zero()? {
                continue;
            }
            self.a_entry(x1, n).d.add_assign(&mat)?;
        }

        // D of the Taylor part
        for n in 0..=kmax {
            let mut mat = self.null.d.clone();

            for m in 0..=(kmax - n - k) {
                for i in 0..=(kmax - n - m - k) {
                    let b = self.b(i + n + m + k)?;
                    let f = self
                        .powi(-1, m as i64)?
                        .mul(&x1e.pow((m + i) as i64)?)?
                        .mul(&self.binom((n + m) as i64, n as i64)?)?
                        .mul(&self.binom((i + n + m + k) as i64, i as i64)?)?;
                    mat.add_assign(&b.e.mul(g)?.scale(&f)?)?;
                }
            }

            if mat.is_zero()? {
                continue;
            }
            self.b_entry(n).d.add_assign(&mat)?;
        }

        Ok(())
    }

    fn left_transform_inf(&mut self, g: &Matrix, k: i32) -> Result<()> {
        let sings = self.sing_snapshot();
        let kmax = self.kmax;

        // B at the finite singular points
        for (xj, pr) in &sings {
            if xj.is_infinity() {
                continue;
            }
            let xje = xj.expr().expect("finite point").clone();

            for n in 0..=pr.rank {
                let mut mat = self.null.b.clone();

                for i in 0..=k {
                    let aji = self.a(xj, n + k - i)?;
                    let comm = aji.c.mul(g)?.sub(&g.mul(&aji.a)?)?;
                    let f = xje
                        .pow(i as i64)?
                        .mul(&self.binom(k as i64, (k - i) as i64)?)?;
                    mat.add_assign(&comm.scale(&f)?)?;
                }

                if mat.is_zero()? {
                    continue;
                }
                self.a_entry(xj, n).b.add_assign(&mat)?;
            }
        }

        // B of the Taylor part, below the gauge order
        for n in 0..=(k - 1) {
            let mut mat = self.null.b.clone();

            for (xj, _) in &sings {
                if xj.is_infinity() {
                    continue;
                }
                let xje = xj.expr().expect("finite point").clone();

                for m in 0..=(k - n - 1) {
                    for i in 0..=m {
                        let aji = self.a(xj, i)?;
                        let comm = aji.c.mul(g)?.sub(&g.mul(&aji.a)?)?;
                        let f = self
                            .powi(-1, (k - n - m - 1) as i64)?
                            .mul(&xje.pow((k - n - i - 1) as i64)?)?
                            .mul(&self.binom((k - m - 1) as i64, n as i64)?)?
                            .mul(&self.binom(k as i64, (k + i - m) as i64)?)?;
                        mat.add_assign(&comm.scale(&f)?)?;
                    }
                }
            }

            self.b_entry(n).b.add_assign(&mat)?;
        }

        {
            let shift = g.scale_i64(k as i64)?;
            self.b_entry(k - 1).b.sub_assign(&shift)?;
        }

        // B of the Taylor part, at and above the gauge order
        for n in k..=(k + kmax) {
            let b = self.b(n - k)?;
            let mat = b.c.mul(g)?.sub(&g.mul(&b.a)?)?;
            if mat.is_zero()? {
                continue;
            }
            self.b_entry(n).b.add_assign(&mat)?;
        }

        // D at the finite singular points
        for (xj, pr) in &sings {
            if xj.is_infinity() {
                continue;
            }
            let xje = xj.expr().expect("finite point").clone();

            for n in 0..=pr.rank {
                let mut mat = self.null.d.clone();

                for i in 0..=k {
                    let aji = self.a(xj, n + k - i)?;
                    let f = xje
                        .pow(i as i64)?
                        .mul(&self.binom(k as i64, (k - i) as i64)?)?;
                    mat.add_assign(&aji.e.mul(g)?.scale(&f)?)?;
                }

                if mat.is_zero()? {
                    continue;
                }
                self.a_entry(xj, n).d.add_assign(&mat)?;
            }
        }

        // D of the Taylor part, below the gauge order
        for n in 0..=(k - 1) {
            let mut mat = self.null.d.clone();

            for (xj, _) in &sings {
                if xj.is_infinity() {
                    continue;
                }
                let xje = xj.expr().expect("finite point").clone();

                for m in 0..=(k - n - 1) {
                    for i in 0..=m {
                        let aji = self.a(xj, i)?;
                        let f = self
                            .powi(-1, (k - n - m - 1) as i64)?
                            .mul(&xje.pow((k - n - i - 1) as i64)?)?
                            .mul(&self.binom((k - m - 1) as i64, n as i64)?)?
                            .mul(&self.binom(k as i64, (k + i - m) as i64)?)?;
                        mat.add_assign(&aji.e.mul(g)?.scale(&f)?)?;
                    }
                }
            }

            self.b_entry(n).d.add_assign(&mat)?;
        }

        // D of the Taylor part, at and above the gauge order
        for n in k..=(k + kmax) {
            let b = self.b(n - k)?;
            let mat = b.e.mul(g)?;
            if mat.is_zero()? {
                continue;
            }
            self.b_entry(n).d.add_assign(&mat)?;
        }

        Ok(())
    }

    /// Replay form of a left gauge on an unpartitioned system: the gauge
    /// must be nilpotent (G² = 0) and acts on the full coefficient as
    /// commutators.
    pub fn left_transform_full(&mut self, g: &Matrix, x1: &SingPoint, k: i32) -> Result<()> {
        if !g.mul(g)?.is_zero()? {
            return Err(Error::GaugeNotNilpotent);
        }

        if x1.is_infinity() {
            self.left_transform_full_inf(g, k)?;
        } else {
            self.left_transform_full_finite(g, x1, k)?;
        }

        self.update_poincare_ranks()
    }

    fn left_transform_full_finite(&mut self, g: &Matrix, x1: &SingPoint, k: i32) -> Result<()> {
        let x1e = x1.expr().expect("finite point").clone();
        let kmax = self.kmax;
        let rank1 = self.singularities.get(x1).map_or(0, |pr| pr.rank);

        for (xj, n) in self.a_keys() {
            if xj == *x1 {
                continue;
            }
            let rankj = self.singularities.get(&xj).map_or(0, |pr| pr.rank);
            let xje = xj.expr().expect("finite point").clone();

            let mut dc = self.null.c.clone();
            for i in 0..=(rankj - n) {
                let c = self.a(&xj, n + i)?.c;
                let comm = c.mul(g)?.sub(&g.mul(&c)?)?;
                let f = self
                    .powi(-1, k as i64)?
                    .mul(&self.binom((k + i - 1) as i64, i as i64)?)?
                    .div(&x1e.sub(&xje)?.pow((k + i) as i64)?)?;
                dc.add_assign(&comm.scale(&f)?)?;
            }
            self.a_entry(&xj, n).c.add_assign(&dc)?;
        }

        for n in 0..k {
            let mut dc = self.null.c.clone();

            for (xj, i) in self.a_keys() {
                if xj == *x1 {
                    continue;
                }
                let xje = xj.expr().expect("finite point").clone();
                let c = self.a(&xj, i)?.c;
                let comm = c.mul(g)?.sub(&g.mul(&c)?)?;
                let f = self
                    .powi(-1, (i + 1) as i64)?
                    .mul(&self.binom((k + i - n - 1) as i64, i as i64)?)?
                    .div(&xje.sub(&x1e)?.pow((k + i - n) as i64)?)?;
                dc.add_assign(&comm.scale(&f)?)?;
            }

            for i in 0..=(kmax - (k - n - 1)) {
                let c = self.b(i + k - n - 1)?.c;
                let comm = c.mul(g)?.sub(&g.mul(&c)?)?;
                let f = x1e
                    .pow(i as i64)?
                    .mul(&self.binom((i + k - n - 1) as i64, i as i64)?)?;
                dc.add_assign(&comm.scale(&f)?)?;
            }

            self.a_entry(x1, n).c.add_assign(&dc)?;
        }

        {
            let shift = g.scale_i64(k as i64)?;
            self.a_entry(x1, k).c.add_assign(&shift)?;
        }

        for n in k..=(k + rank1) {
            let c = self.a(x1, n - k)?.c;
            let comm = c.mul(g)?.sub(&g.mul(&c)?)?;
            self.a_entry(x1, n).c.add_assign(&comm)?;
        }

        for n in self.b_map.keys().copied().collect::<Vec<_>>() {
            let mut dc = self.null.c.clone();
            for m in 0..=(kmax - n - k) {
                for i in 0..=(kmax - n - m - k) {
                    let c = self.b(i + n + m + k)?.c;
                    let comm = c.mul(g)?.sub(&g.mul(&c)?)?;
                    let f = self
                        .powi(-1, m as i64)?
                        .mul(&x1e.pow((m + i) as i64)?)?
                        .mul(&self.binom((n + m) as i64, n as i64)?)?
                        .mul(&self.binom((i + n + m + k) as i64, i as i64)?)?;
                    dc.add_assign(&comm.scale(&f)?)?;
                }
            }
            self.b_entry(n).c.add_assign(&dc)?;
        }

        Ok(())
    }

    fn left_transform_full_inf(&mut self, g: &Matrix, k: i32) -> Result<()> {
        let kmax = self.kmax;
        let sings = self.sing_snapshot();

        for (xj, n) in self.a_keys() {
            let xje = xj.expr().expect("finite point").clone();

            let mut dc = self.null.c.clone();
            for i in 0..=k {
                let c = self.a(&xj, n + k - i)?.c;
                let comm = c.mul(g)?.sub(&g.mul(&c)?)?;
                let f = xje
                    .pow(i as i64)?
                    .mul(&self.binom(k as i64, (k - i) as i64)?)?;
                dc.add_assign(&comm.scale(&f)?)?;
            }
            self.a_entry(&xj, n).c.add_assign(&dc)?;
        }

        for n in 0..(k - 1) {
            let mut dc = self.null.c.clone();

            for (xj, _) in &sings {
                if xj.is_infinity() {
                    continue;
                }
                let xje = xj.expr().expect("finite point").clone();

                for m in 0..=(k - n - 1) {
                    for i in 0..=m {
                        let c = self.a(xj, i)?.c;
                        let comm = c.mul(g)?.sub(&g.mul(&c)?)?;
                        let f = self
                            .powi(-1, (k - n - m - 1) as i64)?
                            .mul(&xje.pow((k - n - i - 1) as i64)?)?
                            .mul(&self.binom((k - m - 1) as i64, n as i64)?)?
                            .mul(&self.binom(k as i64, (k + i - m) as i64)?)?;
                        dc.add_assign(&comm.scale(&f)?)?;
                    }
                }
            }

            self.b_entry(n).c.add_assign(&dc)?;
        }

        {
            let shift = g.scale_i64(k as i64)?;
            self.b_entry(k - 1).c.sub_assign(&shift)?;

            let mut dc = self.null.c.clone();
            for (xj, _) in &sings {
                if xj.is_infinity() {
                    continue;
                }
                let c = self.a(xj, 0)?.c;
                dc.add_assign(&c.mul(g)?.sub(&g.mul(&c)?)?)?;
            }
            self.b_entry(k - 1).c.add_assign(&dc)?;
        }

        for n in k..=(k + kmax) {
            let c = self.b(n - k)?.c;
            let comm = c.mul(g)?.sub(&g.mul(&c)?)?;
            self.b_entry(n).c.add_assign(&comm)?;
        }

        Ok(())
    }
}
