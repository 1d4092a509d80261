//! ε-factorization: one global transformation T turning every residue
//! into ε·(ε-free matrix).
//!
//! The condition A(x,ε)/ε · T = T · A(x,μ)/μ over all finite residues is
//! linear in the entries of T. The echelon solution leaves free entries,
//! which become fresh worker symbols; small integers are then substituted
//! for them until det T ≠ 0.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use epsform_engine::{EngineError, Expr, Matrix};

use crate::error::{Error, Result};

use super::{row_entry_add, row_entry_sub, System};

impl System {
    /// Factorizes with an automatically chosen μ (a fresh symbol that is
    /// specialized along with the other free entries).
    pub fn factor_ep(&mut self) -> Result<()> {
        self.factor_ep_impl(None)
    }

    /// Factorizes against a fixed μ ≠ 0. Fails if the system is singular
    /// at that μ.
    pub fn factor_ep_at(&mut self, mu: i64) -> Result<()> {
        if mu == 0 {
            return Err(Error::MuZero);
        }
        self.factor_ep_impl(Some(mu))
    }

    fn factor_ep_impl(&mut self, mu: Option<i64>) -> Result<()> {
        let n = self.dim_c();
        let ep = Expr::new(&self.engine, "ep")?;

        let mut symbols: BTreeSet<String> = BTreeSet::new();

        let (mu_term, mu_expr) = match mu {
            None => {
                self.engine.add_symbol("mu")?;
                symbols.insert("mu".to_string());
                ("mu".to_string(), Expr::new(&self.engine, "mu")?)
            }
            Some(mu) => (mu.to_string(), Expr::from_i64(&self.engine, mu)?),
        };

        let mut solver =
            self.new_solver(n * n * self.singularities.len(), n * n + 1)?;

        let points: Vec<_> = self
            .singularities
            .keys()
            .filter(|p| !p.is_infinity())
            .cloned()
            .collect();

        let pos = |i: usize, j: usize| i * n + j;

        let build = || -> Result<Vec<BTreeMap<usize, Expr>>> {
            let mut rows = Vec::new();
            for xj in &points {
                let aep = self.a(xj, 0)?.c;
                let amu = aep.subst("ep", &mu_term)?;

                for i in 0..n {
                    for k in 0..n {
                        let mut row: BTreeMap<usize, Expr> = BTreeMap::new();
                        for j in 0..n {
                            row_entry_add(&mut row, pos(j, k), &aep.get(i, j)?.div(&ep)?)?;
                            row_entry_sub(&mut row, pos(i, j), &amu.get(j, k)?.div(&mu_expr)?)?;
                        }
                        rows.push(row);
                    }
                }
            }
            Ok(rows)
        };

        let rows = match build() {
            Err(Error::Engine(EngineError::DivisionByZero)) if mu.is_some() => {
                return Err(Error::SingularAtMu(mu.expect("checked above")));
            }
            other => other?,
        };
        for row in rows {
            solver.set(row)?;
        }

        solver.run()?;

        // Back-substitute: columns skipped by the pivots become free
        // symbols tIxJ; each pivot entry collects the negated tail of its
        // reduced row.
        let mut t = Matrix::zeros(&self.engine, n, n)?;
        let mut cursor = 0usize;

        let mk_symbol = |sys: &System,
                            symbols: &mut BTreeSet<String>,
                            c: usize|
         -> Result<Expr> {
            let name = format!("t{}x{}", c / n, c % n);
            if symbols.insert(name.clone()) {
                sys.engine.add_symbol(&name)?;
                info!("adding symbol {name}");
            }
            Ok(Expr::new(&sys.engine, &name)?)
        };

        for row in self.collect_rows(&mut solver)? {
            let lead = row.leading().expect("reduced rows are non-empty");

            for c in cursor..lead {
                let sym = mk_symbol(self, &mut symbols, c)?;
                t.set(c / n, c % n, &sym)?;
            }
            cursor = lead + 1;

            for (col, value) in row.iter() {
                if *col == lead {
                    if !value.is_one() {
                        return Err(Error::NotEchelon);
                    }
                    continue;
                }

                let sym = mk_symbol(self, &mut symbols, *col)?;
                let current = t.get(lead / n, lead % n)?;
                let updated = current.sub(&value.mul(&sym)?)?;
                t.set(lead / n, lead % n, &updated)?;
            }
        }

        for c in cursor..n * n {
            let sym = mk_symbol(self, &mut symbols, c)?;
            t.set(c / n, c % n, &sym)?;
        }

        let mut det = t.det()?;
        if det.is_zero() {
            return Err(Error::SingularTransformation);
        }

        // Specialize the free symbols over 0, 1, −1, 2, −2, …; a value
        // that kills the determinant or divides by zero is skipped.
        for sym in &symbols {
            for step in 0..=200i64 {
                let value = if step % 2 == 1 { (step + 1) / 2 } else { -((step + 1) / 2) };
                match det.subst(sym, &value.to_string()) {
                    Err(EngineError::DivisionByZero) => continue,
                    Err(e) => return Err(e.into()),
                    Ok(det0) => {
                        if det0.is_zero() {
                            continue;
                        }
                        info!("{sym} -> {value}");
                        det = det0;
                        t = t.subst(sym, &value.to_string())?;
                        self.engine.drop_symbol(sym)?;
                        break;
                    }
                }
            }
        }

        self.transform(&t)
    }

    fn collect_rows(
        &self,
        solver: &mut crate::echelon::EchelonSolver,
    ) -> Result<Vec<crate::echelon::Row<Expr>>> {
        solver.rows().collect()
    }
}
