//! Eigenvalue search over the u + v·ε lattice.
//!
//! Residue eigenvalues of the systems we reduce are of the form u + v·ε
//! with small rational u, v. Instead of a general root finder, the
//! characteristic polynomial is probed over a spiral of lattice offsets
//! with a configurable denominator, dividing off each linear factor as it
//! is found.

use std::collections::BTreeMap;

use num_traits::Zero;

use epsform_engine::{Engine, Expr, Matrix};

use crate::error::{Error, Result};
use crate::fraction::Fraction;

/// An eigenvalue u + v·ε.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Eigen {
    /// The ε-free part.
    pub u: Fraction,
    /// The coefficient of ε.
    pub v: Fraction,
}

impl Eigen {
    #[must_use]
    pub fn new(u: Fraction, v: Fraction) -> Self {
        Self { u, v }
    }

    /// Engine-parsable term for this value.
    #[must_use]
    pub fn term(&self) -> String {
        format!("({})+({})*ep", self.u, self.v)
    }
}

impl std::fmt::Display for Eigen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ep = if self.v.is_zero() {
            String::new()
        } else if self.v == 1 {
            "ep".to_string()
        } else if self.v == -1 {
            "-ep".to_string()
        } else {
            format!("{}*ep", self.v)
        };

        if self.u.is_zero() {
            if ep.is_empty() {
                write!(f, "0")
            } else {
                write!(f, "{ep}")
            }
        } else if ep.is_empty() {
            write!(f, "{}", self.u)
        } else if ep.starts_with('-') {
            write!(f, "{}{ep}", self.u)
        } else {
            write!(f, "{}+{ep}", self.u)
        }
    }
}

/// Eigenvalues with multiplicities, in lattice order.
pub type EigenvalueSet = BTreeMap<Eigen, usize>;

fn linear_factor(engine: &Engine, ev: Eigen) -> Result<Expr> {
    Ok(Expr::new(engine, &format!("t-({})", ev.term()))?)
}

fn is_root(poly: &Expr, ev: Eigen) -> Result<bool> {
    Ok(poly.subst("t", &format!("({})", ev.term()))?.is_zero())
}

/// Factors the characteristic polynomial of `matrix` over eigenvalues
/// u + v·ε where u, v are rationals with denominator `denom`, searching
/// offsets up to `max`.
///
/// Fails if the polynomial does not split over the lattice.
pub fn find_eigenvalues(matrix: &Matrix, max: i64, denom: i64) -> Result<EigenvalueSet> {
    let engine = matrix.engine();
    let mut poly = matrix.char_poly("t")?;
    let mut values = EigenvalueSet::new();
    let inc = Fraction::new(1, denom);
    let mut found = 0usize;

    let mut i = Fraction::zero();
    while i <= max {
        let mut j = -i;
        while j <= i {
            if found == matrix.rows() {
                return Ok(values);
            }

            // Probe the four quadrant representatives of the spiral shell,
            // retrying the same offset after dividing off a factor so
            // multiplicities are counted.
            let candidates = [
                Eigen::new(i, j),
                Eigen::new(j, i),
                Eigen::new(-i, j),
                Eigen::new(j, -i),
            ];

            let mut hit = false;
            for (n, ev) in candidates.into_iter().enumerate() {
                if n == 1 && i.is_zero() {
                    break;
                }
                if is_root(&poly, ev)? {
                    *values.entry(ev).or_insert(0) += 1;
                    found += 1;
                    poly = poly.div(&linear_factor(engine, ev)?)?;
                    hit = true;
                    break;
                }
            }
            if !hit {
                j += inc;
            }
        }
        i += inc;
    }

    if found == matrix.rows() {
        return Ok(values);
    }

    Err(Error::EigenvaluesNotFound(matrix.serialize()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eigen_ordering_is_u_then_v() {
        let a = Eigen::new(Fraction::from(0), Fraction::from(1));
        let b = Eigen::new(Fraction::from(1), Fraction::from(-1));
        let c = Eigen::new(Fraction::from(1), Fraction::from(0));
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn eigen_display() {
        let f = |u: i64, v: i64| Eigen::new(Fraction::from(u), Fraction::from(v)).to_string();
        assert_eq!(f(0, 0), "0");
        assert_eq!(f(0, 1), "ep");
        assert_eq!(f(0, -1), "-ep");
        assert_eq!(f(0, 3), "3*ep");
        assert_eq!(f(2, 0), "2");
        assert_eq!(f(2, 1), "2+ep");
        assert_eq!(f(2, -3), "2-3*ep");
        assert_eq!(
            Eigen::new(Fraction::new(1, 2), Fraction::from(0)).to_string(),
            "1/2"
        );
    }

    #[test]
    fn eigen_term_is_engine_parsable() {
        let ev = Eigen::new(Fraction::new(-1, 2), Fraction::from(3));
        assert_eq!(ev.term(), "(-1/2)+(3)*ep");
    }
}
