//! The system orchestrator.
//!
//! A [`System`] owns the block-triangular coefficient maps of
//! dF/dx = M(x,ε)F, indexed by singularity and pole order, plus the derived
//! Poincaré-rank index and the lazily computed eigenvalue/Jordan caches.
//! Reduction operations (fuchsify, normalize, ε-factorization, left
//! reduction) live in the submodules and drive the coefficient maps through
//! balance and gauge transformations, logging each step to the attached
//! transformation queue.

mod balance;
mod factor;
mod fuchsify;
mod left;
mod normalize;
mod transform;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader, Write as _};

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use epsform_engine::{Engine, Expr, Matrix};

use crate::blocks::BlockMatrix;
use crate::echelon::EchelonSolver;
use crate::eigen::{find_eigenvalues, Eigen, EigenvalueSet};
use crate::error::{Error, Result};
use crate::fraction::Fraction;
use crate::jordan::{jordan_system, JordanBlock, JordanSystem};
use crate::point::SingPoint;
use crate::queue::{TransformSink, TransformationQueue};

/// Derived pole orders at one singularity; −1 means "no pole".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoincareRank {
    /// Highest pole order over the full coefficient.
    pub rank: i32,
    /// Highest pole order restricted to the active block.
    pub rank_c: i32,
}

impl PoincareRank {
    const NONE: PoincareRank = PoincareRank {
        rank: -1,
        rank_c: -1,
    };
}

/// Knobs fixed at system construction.
#[derive(Clone, Copy, Debug)]
pub struct SystemConfig {
    /// Solve linear systems with the worker's row-echelon routine instead
    /// of the native sparse elimination.
    pub engine_echelon: bool,
    /// Denominator of the eigenvalue search lattice (1 = integers,
    /// 2 = half-integers, …).
    pub ev_denom: i64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            engine_echelon: false,
            ev_denom: 1,
        }
    }
}

/// A linear differential system in block-triangular form.
pub struct System {
    engine: Engine,
    config: SystemConfig,
    null: BlockMatrix,
    a_map: BTreeMap<(SingPoint, i32), BlockMatrix>,
    b_map: BTreeMap<i32, BlockMatrix>,
    singularities: BTreeMap<SingPoint, PoincareRank>,
    kmax: i32,
    kmax_c: i32,
    eigenvalues: FxHashMap<SingPoint, EigenvalueSet>,
    jordans: FxHashMap<SingPoint, JordanSystem>,
    tqueue: TransformationQueue,
}

/// Parsed head of a system file line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SystemHead {
    A(String, i32),
    B(i32),
}

pub(crate) fn parse_system_head(head: &str) -> Option<SystemHead> {
    if let Some(args) = head.strip_prefix("A[").and_then(|s| s.strip_suffix(']')) {
        let (point, rank) = args.split_once(',')?;
        if point.is_empty() {
            return None;
        }
        return Some(SystemHead::A(point.to_string(), rank.parse().ok()?));
    }
    if let Some(arg) = head.strip_prefix("B[").and_then(|s| s.strip_suffix(']')) {
        return Some(SystemHead::B(arg.parse().ok()?));
    }
    None
}

impl System {
    /// Loads a system from its file form with the active block at the
    /// 0-based inclusive range `[start, end]` (`end = None` extends to the
    /// full dimension).
    pub fn load(
        engine: &Engine,
        path: &str,
        start: usize,
        end: Option<usize>,
        config: SystemConfig,
    ) -> Result<System> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })?;

        let mut a_map = BTreeMap::new();
        let mut b_map = BTreeMap::new();
        let mut end = end;
        let mut dim = None;

        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| Error::Io {
                path: path.to_string(),
                source,
            })?;
            let stripped: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            if stripped.is_empty() {
                continue;
            }

            let parse_err = |msg: &str| Error::Parse {
                path: path.to_string(),
                line: lineno + 1,
                msg: msg.to_string(),
            };

            let (head, tail) = stripped
                .split_once(':')
                .ok_or_else(|| parse_err("missing ':'"))?;
            let head = parse_system_head(head).ok_or_else(|| parse_err("bad coefficient head"))?;

            let full = Matrix::parse(engine, tail)?;
            dim.get_or_insert(full.rows());
            let end_v = *end.get_or_insert(full.rows() - 1);
            let mat = BlockMatrix::split(&full, start, end_v)?;

            match head {
                SystemHead::A(point, rank) => {
                    let point = SingPoint::parse(engine, &point)?;
                    a_map.insert((point, rank), mat);
                }
                SystemHead::B(k) => {
                    b_map.insert(k, mat);
                }
            }
        }

        let Some(dim) = dim else {
            return Err(Error::Parse {
                path: path.to_string(),
                line: 0,
                msg: "no coefficients found".to_string(),
            });
        };
        let end = end.expect("end resolved with dim");

        let mut tqueue = TransformationQueue::new(engine.clone());
        tqueue.set_padding(start, dim - 1 - end);

        let mut system = System {
            engine: engine.clone(),
            config,
            null: BlockMatrix::null(engine, start, end, dim)?,
            a_map,
            b_map,
            singularities: BTreeMap::new(),
            kmax: -1,
            kmax_c: -1,
            eigenvalues: FxHashMap::default(),
            jordans: FxHashMap::default(),
            tqueue,
        };
        system.update_poincare_ranks()?;
        Ok(system)
    }

    /// Re-partitions this system around a new active range, carrying over
    /// the queue records (the log file association is dropped).
    pub fn reblock(&self, start: usize, end: Option<usize>) -> Result<System> {
        let mut a_map = BTreeMap::new();
        let mut b_map = BTreeMap::new();
        let mut end = end;
        let mut dim = 0;

        for (key, mat) in &self.a_map {
            let full = mat.assemble(&self.engine)?;
            dim = full.rows();
            let end_v = *end.get_or_insert(dim - 1);
            a_map.insert(key.clone(), BlockMatrix::split(&full, start, end_v)?);
        }
        for (k, mat) in &self.b_map {
            let full = mat.assemble(&self.engine)?;
            dim = full.rows();
            let end_v = *end.get_or_insert(dim - 1);
            b_map.insert(*k, BlockMatrix::split(&full, start, end_v)?);
        }

        let end = end.unwrap_or(dim - 1);
        let mut tqueue = TransformationQueue::from_records(&self.tqueue);
        tqueue.set_padding(start, dim - 1 - end);

        let mut system = System {
            engine: self.engine.clone(),
            config: self.config,
            null: BlockMatrix::null(&self.engine, start, end, dim)?,
            a_map,
            b_map,
            singularities: BTreeMap::new(),
            kmax: -1,
            kmax_c: -1,
            eigenvalues: FxHashMap::default(),
            jordans: FxHashMap::default(),
            tqueue,
        };
        system.update_poincare_ranks()?;
        Ok(system)
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Dimension of the active block.
    #[must_use]
    pub fn dim_c(&self) -> usize {
        self.null.c.rows()
    }

    pub fn queue(&mut self) -> &mut TransformationQueue {
        &mut self.tqueue
    }

    #[must_use]
    pub fn singularities(&self) -> &BTreeMap<SingPoint, PoincareRank> {
        &self.singularities
    }

    /// Coefficient of (x − xj)^(−k−1) for finite xj, or the derived Taylor
    /// data at infinity; the all-zero coefficient when absent.
    pub fn a(&self, xj: &SingPoint, k: i32) -> Result<BlockMatrix> {
        if xj.is_infinity() {
            return self.a_inf(k);
        }
        Ok(self
            .a_map
            .get(&(xj.clone(), k))
            .cloned()
            .unwrap_or_else(|| self.null.clone()))
    }

    /// Taylor coefficient of order k of the regular part.
    pub fn b(&self, k: i32) -> Result<BlockMatrix> {
        Ok(self.b_map.get(&k).cloned().unwrap_or_else(|| self.null.clone()))
    }

    /// The coefficient at infinity is derived, never stored: the residue
    /// is minus the sum of all finite residues (a system regular at
    /// infinity), higher orders are minus the previous Taylor coefficient.
    fn a_inf(&self, k: i32) -> Result<BlockMatrix> {
        if k == 0 {
            let mut mat = self.null.clone();
            for xj in self.singularities.keys() {
                if xj.is_infinity() {
                    continue;
                }
                mat.sub_assign(&self.a(xj, 0)?)?;
            }
            Ok(mat)
        } else {
            self.b(k - 1)?.neg()
        }
    }

    /// Entry accessor used by transformations; inserts the all-zero
    /// coefficient when absent.
    pub(crate) fn a_entry(&mut self, xj: &SingPoint, k: i32) -> &mut BlockMatrix {
        let null = self.null.clone();
        self.a_map
            .entry((xj.clone(), k))
            .or_insert_with(|| null)
    }

    pub(crate) fn b_entry(&mut self, k: i32) -> &mut BlockMatrix {
        let null = self.null.clone();
        self.b_map.entry(k).or_insert_with(|| null)
    }

    pub(crate) fn ensure_singularity(&mut self, xj: &SingPoint) {
        self.singularities
            .entry(xj.clone())
            .or_insert(PoincareRank::NONE);
    }

    /// Rescans all stored blocks and rebuilds the rank index; singular
    /// points whose ranks both come back −1 leave the active set.
    pub(crate) fn update_poincare_ranks(&mut self) -> Result<()> {
        let mut sings: BTreeMap<SingPoint, PoincareRank> = BTreeMap::new();
        let mut kmax = -1;
        let mut kmax_c = -1;

        for ((point, k), mat) in &self.a_map {
            if !mat.c.is_zero()? {
                let pr = sings.entry(point.clone()).or_insert(PoincareRank::NONE);
                pr.rank_c = pr.rank_c.max(*k);
            }
            if !mat.is_zero()? {
                let pr = sings.entry(point.clone()).or_insert(PoincareRank::NONE);
                pr.rank = pr.rank.max(*k);
            }
        }

        for (k, mat) in &self.b_map {
            if !mat.c.is_zero()? {
                kmax_c = kmax_c.max(*k);
            }
            if !mat.is_zero()? {
                kmax = kmax.max(*k);
            }
        }

        sings.retain(|_, pr| pr.rank >= 0 || pr.rank_c >= 0);

        self.singularities = sings;
        self.kmax = kmax;
        self.kmax_c = kmax_c;

        let mut inf = PoincareRank::NONE;
        if self.kmax_c < 0 {
            if !self.a_inf(0)?.c.is_zero()? {
                inf.rank_c = 0;
            }
        } else {
            inf.rank_c = self.kmax_c + 1;
        }
        if self.kmax < 0 {
            if !self.a_inf(0)?.is_zero()? {
                inf.rank = 0;
            }
        } else {
            inf.rank = self.kmax + 1;
        }

        if inf.rank >= 0 {
            self.singularities.insert(SingPoint::Infinity, inf);
        }

        Ok(())
    }

    /// Eigenvalues of the leading active-block coefficient at `xj`,
    /// computed on first use and cached until a balance touches the point.
    pub fn eigen(&mut self, xj: &SingPoint) -> Result<&EigenvalueSet> {
        if !self.eigenvalues.contains_key(xj) {
            let c = match self.singularities.get(xj) {
                Some(pr) => self.a(xj, pr.rank_c)?.c,
                None => self.null.c.clone(),
            };
            let evs = find_eigenvalues(&c, 100, self.config.ev_denom)?;
            self.eigenvalues.insert(xj.clone(), evs);
        }
        Ok(self.eigenvalues.get(xj).expect("just inserted"))
    }

    /// The Jordan decomposition at `xj`, cached like the eigenvalues.
    pub fn jordan(&mut self, xj: &SingPoint) -> Result<&JordanSystem> {
        if !self.jordans.contains_key(xj) {
            let evs = self.eigen(xj)?.clone();
            let c = match self.singularities.get(xj) {
                Some(pr) => self.a(xj, pr.rank_c)?.c,
                None => self.null.c.clone(),
            };
            let mut sys = JordanSystem::new();
            jordan_system(&c, &evs, &mut sys)?;
            self.jordans.insert(xj.clone(), sys);
        }
        Ok(self.jordans.get(xj).expect("just inserted"))
    }

    /// The dual (left) decomposition: rows of the inverse of the stacked
    /// root-vector basis, chains reversed so the leading vector comes
    /// first.
    pub(crate) fn inverse_jordan(&mut self, xj: &SingPoint) -> Result<Vec<JordanBlock>> {
        let jordans = self.jordan(xj)?.clone();
        let n = self.dim_c();

        let mut u = Matrix::zeros(&self.engine, n, n)?;
        let mut i = 0;
        for block in &jordans {
            for v in &block.rootvectors {
                u.set_row(i, &v.transpose()?)?;
                i += 1;
            }
        }
        if i != n {
            return Err(Error::RootVectorCount);
        }

        let v = u.inverse()?;

        let mut inv = Vec::new();
        let mut i = 0;
        for block in &jordans {
            let mut dual = JordanBlock {
                ev: block.ev,
                rootvectors: std::collections::VecDeque::new(),
            };
            for _ in 0..block.rootvectors.len() {
                dual.rootvectors.push_front(v.col(i)?);
                i += 1;
            }
            inv.push(dual);
        }
        Ok(inv)
    }

    /// First of ∞, 0, 1, −1, 2, −2, … that is not a current singularity.
    pub fn regular_point(&self) -> Result<SingPoint> {
        if !self.singularities.contains_key(&SingPoint::Infinity) {
            return Ok(SingPoint::Infinity);
        }

        let zero = SingPoint::from_i64(&self.engine, 0)?;
        if !self.singularities.contains_key(&zero) {
            return Ok(zero);
        }

        for n in 1..100 {
            let plus = SingPoint::from_i64(&self.engine, n)?;
            if !self.singularities.contains_key(&plus) {
                return Ok(plus);
            }
            let minus = SingPoint::from_i64(&self.engine, -n)?;
            if !self.singularities.contains_key(&minus) {
                return Ok(minus);
            }
        }

        Err(Error::NoRegularPoint)
    }

    /// Serializes the system back to its file form, skipping all-zero
    /// coefficients.
    pub fn write(&self, path: &str) -> Result<()> {
        let mut file = File::create(path).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })?;
        let io_err = |source| Error::Io {
            path: path.to_string(),
            source,
        };

        for ((point, rank), mat) in &self.a_map {
            let full = mat.assemble(&self.engine)?;
            if full.is_zero()? {
                continue;
            }
            writeln!(file, "A[{point},{rank}]:  \t{}", full.serialize()?).map_err(io_err)?;
        }
        for (k, mat) in &self.b_map {
            let full = mat.assemble(&self.engine)?;
            if full.is_zero()? {
                continue;
            }
            writeln!(file, "B[{k}]:    \t{}", full.serialize()?).map_err(io_err)?;
        }
        Ok(())
    }

    /// Final hand-off of a fully reduced system: residue matrix per
    /// singularity. Fails unless every remaining active-block coefficient
    /// is a simple pole.
    pub fn export_fuchs(&self) -> Result<BTreeMap<SingPoint, Matrix>> {
        for mat in self.b_map.values() {
            if !mat.c.is_zero()? {
                return Err(Error::NotFuchsian);
            }
        }

        let mut fuchs = BTreeMap::new();
        for ((point, rank), mat) in &self.a_map {
            if mat.c.is_zero()? {
                continue;
            }
            if *rank != 0 {
                return Err(Error::NotFuchsian);
            }
            fuchs.insert(point.clone(), mat.c.clone());
        }
        Ok(fuchs)
    }

    /// Detects the irreducible block-triangular structure inside the
    /// active block and logs each sub-block's singularities and left
    /// couplings.
    pub fn analyze(&mut self) -> Result<()> {
        let dim = self.dim_c();

        // Closure of [start, start+size) under one coefficient: the last
        // column the range couples to.
        let closure = |mat: &Matrix, start: usize, end: usize| -> Result<usize> {
            for c in end + 1..mat.cols() {
                if mat.submatrix(start, end, c, mat.cols() - 1)?.is_zero()? {
                    return Ok(c - 1);
                }
            }
            Ok(mat.cols().saturating_sub(1))
        };

        let mut blocks = Vec::new();
        let mut start = 0usize;
        while start < dim {
            let mut size = 1usize;
            loop {
                let mut size1 = size;
                for mat in self.a_map.values() {
                    size1 = closure(&mat.c, start, start + size - 1)? - start + 1;
                    if size1 != size {
                        break;
                    }
                }
                if size1 != size {
                    size = size1;
                    continue;
                }
                for mat in self.b_map.values() {
                    size1 = closure(&mat.c, start, start + size - 1)? - start + 1;
                    if size1 != size {
                        break;
                    }
                }
                if size1 == size {
                    break;
                }
                size = size1;
            }
            blocks.push((start, start + size - 1));
            start += size;
        }

        let offset = self.null.a.rows();
        let sings: Vec<(SingPoint, PoincareRank)> = self
            .singularities
            .iter()
            .map(|(p, r)| (p.clone(), *r))
            .collect();

        for (cnt, (bstart, bend)) in blocks.iter().enumerate() {
            info!(
                "block {}: [{},{}]",
                cnt + 1,
                bstart + offset + 1,
                bend + offset + 1
            );

            let mut report = String::new();
            for (point, pr) in &sings {
                let mut rank = pr.rank_c;
                while rank >= 0 {
                    let sub = self.a(point, rank)?.c.submatrix(*bstart, *bend, *bstart, *bend)?;
                    if !sub.is_zero()? {
                        break;
                    }
                    rank -= 1;
                }
                if rank < 0 {
                    continue;
                }
                let _ = write!(report, "  {point}:{rank}");
            }
            if report.is_empty() {
                info!("  no singularities.");
            } else {
                info!("  singularities:{report}");
            }

            if offset == 0 && *bstart > 0 {
                let mut report = String::new();
                for (point, pr) in &sings {
                    let mut rank = pr.rank;
                    while rank >= 0 {
                        let sub = self
                            .a(point, rank)?
                            .c
                            .submatrix(*bstart, *bend, 0, bstart - 1)?;
                        if !sub.is_zero()? {
                            break;
                        }
                        rank -= 1;
                    }
                    if rank < 0 {
                        continue;
                    }
                    let _ = write!(report, "  {point}:{rank}");
                }
                if !report.is_empty() {
                    info!("  left singularities:{report}");
                }
            }
        }
        Ok(())
    }

    /// Global transformation into the Jordan basis of the residue at `xj`
    /// (or of residue/ε with `divide_by_ep`, requiring every eigenvalue to
    /// be ε-proportional).
    pub fn jordan_transform(&mut self, xj: &SingPoint, divide_by_ep: bool) -> Result<()> {
        let Some(pr) = self.singularities.get(xj).copied() else {
            warn!("no singularity at {xj}");
            return Ok(());
        };

        let mut c = self.a(xj, pr.rank_c)?.c;
        self.eigen(xj)?;
        let cached = self.eigenvalues.get(xj).expect("eigen just ran").clone();

        let evs = if divide_by_ep {
            let ep = Expr::new(&self.engine, "ep")?;
            c = c.div(&ep)?;

            let mut evs = EigenvalueSet::new();
            for (ev, mult) in &cached {
                if !num_traits::Zero::is_zero(&ev.u) {
                    return Err(Error::EigenvaluesNotEpProportional);
                }
                evs.insert(Eigen::new(ev.v, Fraction::from(0)), *mult);
            }
            evs
        } else {
            cached
        };

        let mut sys = JordanSystem::new();
        jordan_system(&c, &evs, &mut sys)?;

        let n = self.dim_c();
        let mut t = Matrix::zeros(&self.engine, n, n)?;
        let mut i = 0;
        for block in &sys {
            for v in &block.rootvectors {
                t.set_col(i, v)?;
                i += 1;
            }
        }
        if i != n {
            return Err(Error::RootVectorCount);
        }

        self.transform(&t)
    }

    /// Replays the attached queue against this system, in order.
    pub fn replay(&mut self) -> Result<()> {
        let records = self.tqueue.start_replay()?;
        let result = TransformationQueue::replay_records(&records, self);
        self.tqueue.finish_replay();
        result
    }

    pub(crate) fn new_solver(&self, rows: usize, cols: usize) -> Result<EchelonSolver> {
        if self.config.engine_echelon {
            EchelonSolver::delegate(&self.engine, rows, cols)
        } else {
            Ok(EchelonSolver::native())
        }
    }

    pub(crate) fn print_singularities(&self) {
        let mut line = String::new();
        for (point, pr) in &self.singularities {
            if pr.rank_c < 0 {
                continue;
            }
            let _ = write!(line, "  {point}:{}", pr.rank_c);
        }
        info!("singularities:{line}");
    }

    /// Logs the residue eigenvalues of every Fuchsian singularity,
    /// ε-proportional values first.
    pub fn print_eigenvalues(&mut self) -> Result<()> {
        let points: Vec<SingPoint> = self
            .singularities
            .iter()
            .filter(|(_, pr)| pr.rank_c == 0)
            .map(|(p, _)| p.clone())
            .collect();

        for point in points {
            let evs = self.eigen(&point)?;
            let mut line = String::new();
            for (ev, mult) in evs {
                if num_traits::Zero::is_zero(&ev.u) {
                    let _ = write!(line, "  {ev}:{mult}");
                }
            }
            for (ev, mult) in evs {
                if !num_traits::Zero::is_zero(&ev.u) {
                    let _ = write!(line, "  {ev}:{mult}");
                }
            }
            info!("eigenvalues [{point}]: {}", line.trim_start());
        }
        Ok(())
    }

    pub(crate) fn binom(&self, n: i64, k: i64) -> Result<Expr> {
        Ok(Expr::new(&self.engine, &format!("binom({n},{k})"))?)
    }

    pub(crate) fn powi(&self, b: i64, e: i64) -> Result<Expr> {
        Ok(Expr::new(&self.engine, &format!("({b})^({e})"))?)
    }
}

/// Accumulating insert for sparse equation rows.
pub(crate) fn row_entry_add(
    row: &mut BTreeMap<usize, Expr>,
    col: usize,
    value: &Expr,
) -> Result<()> {
    match row.entry(col) {
        std::collections::btree_map::Entry::Occupied(mut e) => {
            let updated = e.get().add(value)?;
            e.insert(updated);
        }
        std::collections::btree_map::Entry::Vacant(e) => {
            e.insert(value.clone());
        }
    }
    Ok(())
}

pub(crate) fn row_entry_sub(
    row: &mut BTreeMap<usize, Expr>,
    col: usize,
    value: &Expr,
) -> Result<()> {
    match row.entry(col) {
        std::collections::btree_map::Entry::Occupied(mut e) => {
            let updated = e.get().sub(value)?;
            e.insert(updated);
        }
        std::collections::btree_map::Entry::Vacant(e) => {
            e.insert(value.neg()?);
        }
    }
    Ok(())
}

impl TransformSink for System {
    fn apply_balance(&mut self, p: &Matrix, x1: &SingPoint, x2: &SingPoint) -> Result<()> {
        self.balance(p, x1, x2)
    }

    fn apply_global(&mut self, t: &Matrix) -> Result<()> {
        self.transform(t)
    }

    fn apply_left_gauge(&mut self, g: &Matrix, point: &SingPoint, order: i32) -> Result<()> {
        self.left_transform_full(g, point, order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_head() {
        assert_eq!(
            parse_system_head("A[0,1]"),
            Some(SystemHead::A("0".into(), 1))
        );
        assert_eq!(
            parse_system_head("A[inf,0]"),
            Some(SystemHead::A("inf".into(), 0))
        );
        assert_eq!(
            parse_system_head("A[1/2,2]"),
            Some(SystemHead::A("1/2".into(), 2))
        );
    }

    #[test]
    fn parses_b_head() {
        assert_eq!(parse_system_head("B[3]"), Some(SystemHead::B(3)));
    }

    #[test]
    fn rejects_malformed_heads() {
        assert_eq!(parse_system_head("A[0]"), None);
        assert_eq!(parse_system_head("B[x]"), None);
        assert_eq!(parse_system_head("C[0,1]"), None);
        assert_eq!(parse_system_head("A[,1]"), None);
    }
}
