//! Sparse linear-system solver with two interchangeable back ends.
//!
//! Transformation candidates (ε-factorization, left gauges) are found by
//! solving sparse symbolic linear systems. Equations are entered as sparse
//! rows; [`EchelonSolver::run`] produces a row-reduced echelon form whose
//! pivots are normalized to 1, suitable for back-substitution by the
//! caller.
//!
//! The native back end eliminates sparse rows directly, grouping equations
//! by leading column and picking the cheapest row (by serialized size) as
//! the pivot of each group — a heuristic that keeps intermediate worker
//! expressions small. The delegate back end ships the whole system to the
//! worker as a dense matrix and reduces it there.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use epsform_engine::{Engine, Expr, Matrix};

use crate::error::Result;

/// Scalar values a sparse row can hold.
///
/// Implemented by the engine's [`Expr`]; [`crate::fraction::Fraction`]
/// implements it too, which lets the native back end run over exact
/// rationals without a worker.
pub trait Scalar: Clone {
    type Error;

    fn add(&self, other: &Self) -> std::result::Result<Self, Self::Error>;
    fn sub(&self, other: &Self) -> std::result::Result<Self, Self::Error>;
    fn mul(&self, other: &Self) -> std::result::Result<Self, Self::Error>;
    fn div(&self, other: &Self) -> std::result::Result<Self, Self::Error>;
    fn is_zero(&self) -> bool;
    fn is_one(&self) -> bool;

    /// Serialized size, used for pivot selection.
    fn cost(&self) -> usize;
}

impl Scalar for Expr {
    type Error = epsform_engine::EngineError;

    fn add(&self, other: &Self) -> std::result::Result<Self, Self::Error> {
        Expr::add(self, other)
    }

    fn sub(&self, other: &Self) -> std::result::Result<Self, Self::Error> {
        Expr::sub(self, other)
    }

    fn mul(&self, other: &Self) -> std::result::Result<Self, Self::Error> {
        Expr::mul(self, other)
    }

    fn div(&self, other: &Self) -> std::result::Result<Self, Self::Error> {
        Expr::div(self, other)
    }

    fn is_zero(&self) -> bool {
        Expr::is_zero(self)
    }

    fn is_one(&self) -> bool {
        Expr::is_one(self)
    }

    fn cost(&self) -> usize {
        self.as_str().len()
    }
}

impl Scalar for crate::fraction::Fraction {
    type Error = std::convert::Infallible;

    fn add(&self, other: &Self) -> std::result::Result<Self, Self::Error> {
        Ok(*self + *other)
    }

    fn sub(&self, other: &Self) -> std::result::Result<Self, Self::Error> {
        Ok(*self - *other)
    }

    fn mul(&self, other: &Self) -> std::result::Result<Self, Self::Error> {
        Ok(*self * *other)
    }

    fn div(&self, other: &Self) -> std::result::Result<Self, Self::Error> {
        Ok(*self / *other)
    }

    fn is_zero(&self) -> bool {
        num_traits::Zero::is_zero(self)
    }

    fn is_one(&self) -> bool {
        *self == 1
    }

    fn cost(&self) -> usize {
        let n = self.numer().unsigned_abs().max(1).ilog10() as usize + 1;
        let d = self.denom().unsigned_abs().max(1).ilog10() as usize + 1;
        n + d
    }
}

/// A sparse equation row: strictly ascending (column, value) pairs, zeros
/// never stored.
#[derive(Clone, Debug)]
pub struct Row<S> {
    data: SmallVec<[(usize, S); 8]>,
}

impl<S: Scalar> Default for Row<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Scalar> Row<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: SmallVec::new(),
        }
    }

    pub fn from_map(map: BTreeMap<usize, S>) -> Self {
        let mut row = Self::new();
        for (col, value) in map {
            row.push(col, value);
        }
        row
    }

    /// Appends an entry; columns must arrive in strictly ascending order.
    ///
    /// # Panics
    ///
    /// Panics if `col` is not past the last stored column.
    pub fn push(&mut self, col: usize, value: S) {
        if let Some((last, _)) = self.data.last() {
            assert!(col > *last, "row entries out of order");
        }
        if value.is_zero() {
            return;
        }
        self.data.push((col, value));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Leading (first non-zero) column.
    #[must_use]
    pub fn leading(&self) -> Option<usize> {
        self.data.first().map(|(c, _)| *c)
    }

    #[must_use]
    pub fn get(&self, col: usize) -> Option<&S> {
        self.data
            .binary_search_by_key(&col, |(c, _)| *c)
            .ok()
            .map(|i| &self.data[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, S)> {
        self.data.iter()
    }

    /// Merge-subtracts `other` from `self`.
    pub fn sub(&self, other: &Self) -> std::result::Result<Self, S::Error> {
        let mut res = Self::new();
        let mut a = self.data.iter().peekable();
        let mut b = other.data.iter().peekable();

        loop {
            match (a.peek(), b.peek()) {
                (Some((ca, va)), Some((cb, vb))) => {
                    if ca < cb {
                        res.push(*ca, va.clone());
                        a.next();
                    } else if cb < ca {
                        res.push(*cb, neg(vb)?);
                        b.next();
                    } else {
                        res.push(*ca, va.sub(vb)?);
                        a.next();
                        b.next();
                    }
                }
                (Some((ca, va)), None) => {
                    res.push(*ca, va.clone());
                    a.next();
                }
                (None, Some((cb, vb))) => {
                    res.push(*cb, neg(vb)?);
                    b.next();
                }
                (None, None) => break,
            }
        }

        Ok(res)
    }

    pub fn scale(&self, factor: &S) -> std::result::Result<Self, S::Error> {
        let mut res = Self::new();
        if factor.is_zero() {
            return Ok(res);
        }
        for (col, value) in &self.data {
            res.push(*col, value.mul(factor)?);
        }
        Ok(res)
    }

    /// Divides through by the leading entry, making it 1.
    pub fn normalize(&mut self) -> std::result::Result<(), S::Error> {
        let Some((_, lead)) = self.data.first() else {
            return Ok(());
        };
        let lead = lead.clone();
        for (_, value) in &mut self.data {
            *value = value.div(&lead)?;
        }
        Ok(())
    }

    fn cost(&self) -> usize {
        self.data.iter().map(|(_, v)| v.cost()).sum()
    }
}

fn neg<S: Scalar>(v: &S) -> std::result::Result<S, S::Error> {
    let zero = v.sub(v)?;
    zero.sub(v)
}

/// Native sparse Gaussian elimination.
#[derive(Debug, Default)]
pub struct Echelon<S> {
    pending: BTreeMap<usize, Vec<Row<S>>>,
    reduced: BTreeMap<usize, Row<S>>,
}

impl<S: Scalar> Echelon<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            reduced: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, row: Row<S>) {
        if let Some(col) = row.leading() {
            self.pending.entry(col).or_default().push(row);
        }
    }

    /// Forward elimination and back substitution; returns the rank.
    pub fn run(&mut self) -> std::result::Result<usize, S::Error> {
        // Forward elimination: take the lowest leading column, normalize its
        // group, keep the cheapest row as pivot, push the eliminated rows
        // back under their new leading columns.
        while let Some((&col, _)) = self.pending.iter().next() {
            let mut group = self.pending.remove(&col).expect("group exists");

            for row in &mut group {
                row.normalize()?;
            }

            let pivot_idx = find_pivot(&group);
            let pivot = group.swap_remove(pivot_idx);

            for row in group {
                self.set(row.sub(&pivot)?);
            }

            self.reduced.insert(col, pivot);
        }

        // Back substitution.
        let cols: Vec<usize> = self.reduced.keys().copied().collect();
        for idx in (0..cols.len()).rev() {
            let pivot = self.reduced[&cols[idx]].clone();
            for &cj in &cols[..idx] {
                let row = self.reduced.get_mut(&cj).expect("pivot row exists");
                if let Some(f) = row.get(cols[idx]).cloned() {
                    *row = row.sub(&pivot.scale(&f)?)?;
                }
            }
        }

        Ok(self.reduced.len())
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row<S>> {
        self.reduced.values()
    }
}

fn find_pivot<S: Scalar>(group: &[Row<S>]) -> usize {
    if group.len() == 1 {
        return 0;
    }
    let mut best = 0;
    let mut min = usize::MAX;
    for (n, row) in group.iter().enumerate() {
        let cost = row.cost();
        if cost < min {
            min = cost;
            best = n;
        }
    }
    best
}

/// Delegate back end: a dense worker-side matrix reduced by the worker's
/// own row-echelon routine.
#[derive(Debug)]
pub struct EchelonDelegate {
    array: Matrix,
    cols: usize,
    pos: usize,
    rank: usize,
}

impl EchelonDelegate {
    pub fn new(engine: &Engine, rows: usize, cols: usize) -> Result<Self> {
        Ok(Self {
            array: Matrix::zeros(engine, rows, cols)?,
            cols,
            pos: 0,
            rank: 0,
        })
    }

    pub fn set(&mut self, row: &Row<Expr>) -> Result<()> {
        if row.is_empty() {
            return Ok(());
        }
        for (col, value) in row.iter() {
            self.array.set(self.pos, *col, value)?;
        }
        self.pos += 1;
        Ok(())
    }

    pub fn run(&mut self) -> Result<usize> {
        self.rank = self.array.row_echelon()?;
        self.pos = self.rank;
        Ok(self.rank)
    }

    fn row(&self, r: usize) -> Result<Row<Expr>> {
        let mut row = Row::new();
        // Dense scan; the reduced system is read once, so this stays off
        // the hot path.
        for c in 0..self.cols {
            row.push(c, self.array.get(r, c)?);
        }
        Ok(row)
    }
}

/// The solver strategy, chosen once at system construction.
#[derive(Debug)]
pub enum EchelonSolver {
    Native(Echelon<Expr>),
    Delegate(EchelonDelegate),
}

impl EchelonSolver {
    /// Native solver; the size hints are ignored.
    #[must_use]
    pub fn native() -> Self {
        Self::Native(Echelon::new())
    }

    pub fn delegate(engine: &Engine, rows: usize, cols: usize) -> Result<Self> {
        Ok(Self::Delegate(EchelonDelegate::new(engine, rows, cols)?))
    }

    /// Enters one equation given as a column → coefficient map.
    pub fn set(&mut self, eq: BTreeMap<usize, Expr>) -> Result<()> {
        let row = Row::from_map(eq);
        match self {
            Self::Native(e) => {
                e.set(row);
                Ok(())
            }
            Self::Delegate(d) => d.set(&row),
        }
    }

    pub fn run(&mut self) -> Result<usize> {
        match self {
            Self::Native(e) => Ok(e.run()?),
            Self::Delegate(d) => d.run(),
        }
    }

    /// The reduced rows, in ascending leading-column order.
    pub fn rows(&self) -> SolverRows<'_> {
        match self {
            Self::Native(e) => SolverRows::Native(e.reduced.values()),
            Self::Delegate(d) => SolverRows::Delegate { del: d, next: 0 },
        }
    }
}

/// Iterator over reduced rows; the delegate back end materializes rows
/// lazily, so items are fallible.
pub enum SolverRows<'a> {
    Native(std::collections::btree_map::Values<'a, usize, Row<Expr>>),
    Delegate { del: &'a EchelonDelegate, next: usize },
}

impl Iterator for SolverRows<'_> {
    type Item = Result<Row<Expr>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Native(values) => values.next().map(|r| Ok(r.clone())),
            Self::Delegate { del, next } => {
                if *next >= del.rank {
                    return None;
                }
                let row = del.row(*next);
                *next += 1;
                Some(row)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fraction::Fraction;

    fn q(n: i64) -> Fraction {
        Fraction::from(n)
    }

    fn row(entries: &[(usize, i64)]) -> Row<Fraction> {
        let mut r = Row::new();
        for &(c, v) in entries {
            r.push(c, q(v));
        }
        r
    }

    #[test]
    fn row_sub_merges_sparsely() {
        let a = row(&[(0, 3), (2, 1)]);
        let b = row(&[(0, 3), (1, 4)]);
        let c = a.sub(&b).unwrap();
        let entries: Vec<_> = c.iter().map(|(c, v)| (*c, *v)).collect();
        assert_eq!(entries, vec![(1, q(-4)), (2, q(1))]);
    }

    #[test]
    fn row_normalize_sets_leading_one() {
        let mut r = row(&[(1, 4), (3, 2)]);
        r.normalize().unwrap();
        assert_eq!(r.get(1), Some(&q(1)));
        assert_eq!(r.get(3), Some(&Fraction::new(1, 2)));
    }

    #[test]
    fn solves_full_rank_system() {
        // x + y = 3, x - y = 1  (columns 0,1; rhs column 2)
        let mut ech = Echelon::new();
        ech.set(row(&[(0, 1), (1, 1), (2, 3)]));
        ech.set(row(&[(0, 1), (1, -1), (2, 1)]));

        assert_eq!(ech.run().unwrap(), 2);

        let rows: Vec<_> = ech.rows().cloned().collect();
        assert_eq!(rows.len(), 2);
        // x = 2, y = 1 read off the reduced rows
        for r in &rows {
            let lead = r.leading().unwrap();
            assert!(r.get(lead).unwrap().is_one());
        }
        assert_eq!(rows[0].get(2), Some(&q(2)));
        assert_eq!(rows[1].get(2), Some(&q(1)));
    }

    #[test]
    fn dependent_rows_reduce_rank() {
        let mut ech = Echelon::new();
        ech.set(row(&[(0, 1), (1, 2)]));
        ech.set(row(&[(0, 2), (1, 4)]));
        assert_eq!(ech.run().unwrap(), 1);
    }

    #[test]
    fn inconsistent_system_leaves_rhs_only_row() {
        // x + y = 1, x + y = 2 reduces to a row with only the rhs column:
        // the caller detects "no solution" by a leading column at the rhs.
        let mut ech = Echelon::new();
        ech.set(row(&[(0, 1), (1, 1), (2, 1)]));
        ech.set(row(&[(0, 1), (1, 1), (2, 2)]));

        assert_eq!(ech.run().unwrap(), 2);
        let leads: Vec<_> = ech.rows().map(|r| r.leading().unwrap()).collect();
        assert!(leads.contains(&2));
    }

    #[test]
    fn already_reduced_is_stable() {
        let mut ech = Echelon::new();
        ech.set(row(&[(0, 1), (2, 5)]));
        ech.set(row(&[(1, 1), (2, 7)]));
        assert_eq!(ech.run().unwrap(), 2);
        let rows: Vec<_> = ech.rows().cloned().collect();
        assert_eq!(rows[0].get(2), Some(&q(5)));
        assert_eq!(rows[1].get(2), Some(&q(7)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        fn entries(r: &Row<Fraction>) -> Vec<(usize, Fraction)> {
            r.iter().cloned().collect()
        }

        fn sparse_row() -> impl Strategy<Value = Row<Fraction>> {
            prop::collection::btree_map(0usize..8, -20i64..20, 0..6).prop_map(|m| {
                let m: BTreeMap<usize, Fraction> =
                    m.into_iter().map(|(c, v)| (c, q(v))).collect();
                Row::from_map(m)
            })
        }

        proptest! {
            #[test]
            fn sub_of_self_is_empty(a in sparse_row()) {
                prop_assert!(a.sub(&a).unwrap().is_empty());
            }

            #[test]
            fn negated_sub_swaps_operands(a in sparse_row(), b in sparse_row()) {
                let lhs = a.sub(&b).unwrap().scale(&q(-1)).unwrap();
                let rhs = b.sub(&a).unwrap();
                prop_assert_eq!(entries(&lhs), entries(&rhs));
            }

            #[test]
            fn normalize_is_idempotent(a in sparse_row()) {
                let mut once = a.clone();
                once.normalize().unwrap();
                let mut twice = once.clone();
                twice.normalize().unwrap();
                prop_assert_eq!(entries(&once), entries(&twice));
            }

            #[test]
            fn rerunning_reduced_rows_is_stable(
                rows in prop::collection::vec(sparse_row(), 1..6),
            ) {
                let mut ech = Echelon::new();
                for r in rows {
                    ech.set(r);
                }
                let rank = ech.run().unwrap();
                let reduced: Vec<_> = ech.rows().cloned().collect();

                let mut again = Echelon::new();
                for r in reduced.iter().cloned() {
                    again.set(r);
                }
                prop_assert_eq!(again.run().unwrap(), rank);

                let stable: Vec<Vec<_>> = again.rows().map(entries).collect();
                let first: Vec<Vec<_>> = reduced.iter().map(entries).collect();
                prop_assert_eq!(stable, first);
            }
        }
    }
}
