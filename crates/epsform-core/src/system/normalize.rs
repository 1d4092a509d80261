//! Eigenvalue normalization of a Fuchsian system.
//!
//! Balances between eigenvector pairs shift one residue eigenvalue down
//! by 1 and the other up by 1, leaving the rest untouched. The loop runs
//! until the reference singularity has no eigenvalue with a non-zero
//! ε-free part.

use num_traits::Zero;
use tracing::{info, warn};

use epsform_engine::Matrix;

use crate::error::{Error, Result};
use crate::jordan::eigenvectors;
use crate::point::SingPoint;

use super::System;

impl System {
    /// Shifts all residue eigenvalues into the ε-proportional lattice.
    /// Requires a Fuchsian system.
    pub fn normalize(&mut self) -> Result<()> {
        if self.singularities.values().any(|pr| pr.rank_c > 0) {
            return Err(Error::NotFuchsian);
        }

        // Reference point: first finite singularity with an ε-dependent
        // eigenvalue. If none exists every singularity might be apparent;
        // fall back to the last finite one.
        let finite: Vec<SingPoint> = self
            .singularities
            .keys()
            .filter(|p| !p.is_infinity())
            .cloned()
            .collect();

        let mut x0 = None;
        for xj in &finite {
            let evs = self.eigen(xj)?;
            if evs.keys().any(|ev| !ev.v.is_zero()) {
                x0 = Some(xj.clone());
                break;
            }
        }

        let x0 = match x0 {
            Some(x0) => x0,
            None => {
                let last = finite.last().cloned().ok_or(Error::UnableToNormalize)?;
                warn!("all singularities have integer eigenvalues");
                warn!("choosing x0 = {last} which might be an apparent singularity");
                last
            }
        };

        self.print_eigenvalues()?;

        loop {
            let step = if let Some(found) = self.find_balance(None)? {
                info!("mutual balance [{},{}]", found.0, found.1);
                found
            } else if let Some(found) = self.find_balance(Some(&x0))? {
                info!("balance [{},{}]", found.0, found.1);
                found
            } else {
                let evs = self.eigen(&x0)?;
                if evs.keys().all(|ev| ev.u.is_zero()) {
                    break;
                }

                let xr = self.regular_point()?;
                let Some(found) = self.find_balance(Some(&xr))? else {
                    return Err(Error::UnableToNormalize);
                };
                info!("balance with regular point [{},{}]", found.0, found.1);
                found
            };

            let (x1, x2, p) = step;
            self.balance(&p, &x1, &x2)?;
            self.print_eigenvalues()?;
        }
        Ok(())
    }

    /// Searches for a balance pair: an eigenvector at a "left" point whose
    /// eigenvalue can move up against an eigenvector at a "right" point
    /// moving down, with non-degenerate pairing. With `x0` given the
    /// search runs twice, x0 on the left then on the right; without it,
    /// both eigenvalues must have strictly signed ε-free parts. Among all
    /// candidates the projector with the shortest serialized form wins.
    pub(crate) fn find_balance(
        &mut self,
        x0: Option<&SingPoint>,
    ) -> Result<Option<(SingPoint, SingPoint, Matrix)>> {
        let all: Vec<SingPoint> = self.singularities.keys().cloned().collect();

        let (mut left, mut right) = match x0 {
            Some(x0) => (vec![x0.clone()], all),
            None => (all.clone(), all),
        };

        let mut best: Option<(usize, SingPoint, SingPoint, Matrix)> = None;
        let mut second = false;

        loop {
            for l in &left {
                if second && x0 == Some(l) {
                    continue;
                }

                let a0 = self.a(l, 0)?.c;
                let evs1 = self.eigen(l)?.clone();

                for ev1 in evs1.keys() {
                    if (x0.is_none() || second) && ev1.u >= 0 {
                        continue;
                    }
                    let vectors1 = eigenvectors(&a0, *ev1)?;

                    for r in &right {
                        if l == r {
                            continue;
                        }

                        let b0 = self.a(r, 0)?.c.transpose()?;
                        let evs2 = self.eigen(r)?.clone();

                        for ev2 in evs2.keys() {
                            if (x0.is_none() || !second) && ev2.u <= 0 {
                                continue;
                            }
                            let vectors2 = eigenvectors(&b0, *ev2)?;

                            for v1 in &vectors1 {
                                for v2 in &vectors2 {
                                    let pairing = v1.transpose()?.mul(v2)?.get(0, 0)?;
                                    if pairing.is_zero() {
                                        continue;
                                    }

                                    let p0 = v1.mul(&v2.transpose()?)?.div(&pairing)?;
                                    let len0 = p0.serialize()?.len();

                                    if best.as_ref().map_or(true, |(len, ..)| len0 < *len) {
                                        best = Some((len0, l.clone(), r.clone(), p0));
                                    }
                                }
                            }
                        }
                    }
                }
            }

            if x0.is_some() {
                if !second {
                    std::mem::swap(&mut left, &mut right);
                    second = true;
                } else {
                    second = false;
                }
            }
            if !second {
                break;
            }
        }

        Ok(best.map(|(_, x1, x2, p)| (x1, x2, p)))
    }
}
