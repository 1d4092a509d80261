//! Matrix handles.
//!
//! Matrices live in the worker; the proxy tracks only dimensions and the
//! engine-side name. Indices are 0-based, ranges inclusive, matching the
//! worker's `m[r0~r1,c0~c1]` addressing.
//!
//! Handles are reference counted. Mutating operations copy-on-write: if the
//! handle is shared, the engine value is duplicated under a fresh name
//! first, so clones behave like independent values.

use std::fmt;
use std::rc::Rc;

use crate::error::EngineError;
use crate::expr::Expr;
use crate::session::Engine;

struct MatInner {
    engine: Engine,
    name: String,
    rows: usize,
    cols: usize,
}

impl Drop for MatInner {
    fn drop(&mut self) {
        self.engine.release(&self.name);
    }
}

/// Handle to an engine-resident matrix.
///
/// A 0×0 matrix is representable and is the identity of [`Matrix::stack`];
/// arithmetic on it is a caller bug and panics on the missing engine name.
#[derive(Clone)]
pub struct Matrix {
    inner: Option<Rc<MatInner>>,
    engine: Engine,
    rows: usize,
    cols: usize,
}

impl Matrix {
    fn bind(engine: &Engine, name: String, rows: usize, cols: usize) -> Self {
        Self {
            inner: Some(Rc::new(MatInner {
                engine: engine.clone(),
                name,
                rows,
                cols,
            })),
            engine: engine.clone(),
            rows,
            cols,
        }
    }

    fn fresh(engine: &Engine, src: &str, rows: usize, cols: usize) -> Result<Self, EngineError> {
        if rows == 0 || cols == 0 {
            return Ok(Self::empty(engine));
        }
        let name = engine.alloc_matrix_name();
        engine.command(&format!("let {name} := {src}"))?;
        Ok(Self::bind(engine, name, rows, cols))
    }

    /// The degenerate 0×0 matrix; no engine value is allocated.
    #[must_use]
    pub fn empty(engine: &Engine) -> Self {
        Self {
            inner: None,
            engine: engine.clone(),
            rows: 0,
            cols: 0,
        }
    }

    /// An all-zero matrix.
    pub fn zeros(engine: &Engine, rows: usize, cols: usize) -> Result<Self, EngineError> {
        Self::fresh(engine, &format!("zeros({rows},{cols})"), rows, cols)
    }

    /// The n×n identity.
    pub fn identity(engine: &Engine, n: usize) -> Result<Self, EngineError> {
        Self::fresh(engine, &format!("ident({n})"), n, n)
    }

    /// Parses the worker's native serialization `[[...],[...]]` and queries
    /// the resulting dimensions.
    pub fn parse(engine: &Engine, text: &str) -> Result<Self, EngineError> {
        let name = engine.alloc_matrix_name();
        engine.command(&format!("let {name} := {text}"))?;
        let dims = engine.query(&format!("query dims {name}"))?;
        let mut it = dims.split_whitespace();
        let (rows, cols) = match (
            it.next().and_then(|s| s.parse().ok()),
            it.next().and_then(|s| s.parse().ok()),
        ) {
            (Some(r), Some(c)) => (r, c),
            _ => return Err(EngineError::Protocol(format!("bad dims response: {dims}"))),
        };
        Ok(Self::bind(engine, name, rows, cols))
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    fn name(&self) -> &str {
        &self
            .inner
            .as_ref()
            .expect("operation on an empty matrix")
            .name
    }

    /// Ensures this handle exclusively owns its engine value.
    fn make_unique(&mut self) -> Result<(), EngineError> {
        let Some(inner) = self.inner.as_ref() else {
            return Ok(());
        };
        if Rc::strong_count(inner) == 1 {
            return Ok(());
        }
        let name = self.engine.alloc_matrix_name();
        self.engine
            .command(&format!("let {name} := {}", inner.name))?;
        self.inner = Some(Rc::new(MatInner {
            engine: self.engine.clone(),
            name,
            rows: self.rows,
            cols: self.cols,
        }));
        Ok(())
    }

    pub fn get(&self, r: usize, c: usize) -> Result<Expr, EngineError> {
        Expr::new(&self.engine, &format!("{}[{r},{c}]", self.name()))
    }

    pub fn set(&mut self, r: usize, c: usize, value: &Expr) -> Result<(), EngineError> {
        self.make_unique()?;
        self.engine
            .command(&format!("{}[{r},{c}] := {}", self.name(), value.name()))
    }

    /// Copies `block` into this matrix with its top-left entry at (r0, c0).
    pub fn set_block(&mut self, r0: usize, c0: usize, block: &Matrix) -> Result<(), EngineError> {
        if block.is_empty() {
            return Ok(());
        }
        self.make_unique()?;
        let (r1, c1) = (r0 + block.rows() - 1, c0 + block.cols() - 1);
        self.engine.command(&format!(
            "{}[{r0}~{r1},{c0}~{c1}] := {}",
            self.name(),
            block.name()
        ))
    }

    /// Overwrites row `r` with the 1×n matrix `row`.
    pub fn set_row(&mut self, r: usize, row: &Matrix) -> Result<(), EngineError> {
        self.make_unique()?;
        self.engine.command(&format!(
            "{}[{r}~{r},0~{}] := {}",
            self.name(),
            self.cols - 1,
            row.name()
        ))
    }

    /// Overwrites column `c` with the n×1 matrix `col`.
    pub fn set_col(&mut self, c: usize, col: &Matrix) -> Result<(), EngineError> {
        self.make_unique()?;
        self.engine.command(&format!(
            "{}[0~{},{c}~{c}] := {}",
            self.name(),
            self.rows - 1,
            col.name()
        ))
    }

    /// Extracts the inclusive sub-range [r0,r1]×[c0,c1].
    pub fn submatrix(
        &self,
        r0: usize,
        r1: usize,
        c0: usize,
        c1: usize,
    ) -> Result<Matrix, EngineError> {
        if r1 < r0 || c1 < c0 {
            return Ok(Matrix::empty(&self.engine));
        }
        Self::fresh(
            &self.engine,
            &format!("{}[{r0}~{r1},{c0}~{c1}]", self.name()),
            r1 - r0 + 1,
            c1 - c0 + 1,
        )
    }

    pub fn row(&self, r: usize) -> Result<Matrix, EngineError> {
        self.submatrix(r, r, 0, self.cols - 1)
    }

    pub fn col(&self, c: usize) -> Result<Matrix, EngineError> {
        self.submatrix(0, self.rows - 1, c, c)
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix, EngineError> {
        if self.is_empty() {
            return Ok(self.clone());
        }
        Self::fresh(
            &self.engine,
            &format!("{} + {}", self.name(), other.name()),
            self.rows,
            self.cols,
        )
    }

    pub fn sub(&self, other: &Matrix) -> Result<Matrix, EngineError> {
        if self.is_empty() {
            return Ok(self.clone());
        }
        Self::fresh(
            &self.engine,
            &format!("{} - {}", self.name(), other.name()),
            self.rows,
            self.cols,
        )
    }

    pub fn add_assign(&mut self, other: &Matrix) -> Result<(), EngineError> {
        if self.is_empty() || other.is_empty() {
            return Ok(());
        }
        self.make_unique()?;
        self.engine.command(&format!(
            "{} := {} + {}",
            self.name(),
            self.name(),
            other.name()
        ))
    }

    pub fn sub_assign(&mut self, other: &Matrix) -> Result<(), EngineError> {
        if self.is_empty() || other.is_empty() {
            return Ok(());
        }
        self.make_unique()?;
        self.engine.command(&format!(
            "{} := {} - {}",
            self.name(),
            self.name(),
            other.name()
        ))
    }

    pub fn mul(&self, other: &Matrix) -> Result<Matrix, EngineError> {
        if self.is_empty() || other.is_empty() {
            return Ok(Matrix::empty(&self.engine));
        }
        Self::fresh(
            &self.engine,
            &format!("{} * {}", self.name(), other.name()),
            self.rows,
            other.cols,
        )
    }

    /// Three-factor product, evaluated in one round trip.
    pub fn mul3(left: &Matrix, mid: &Matrix, right: &Matrix) -> Result<Matrix, EngineError> {
        if left.is_empty() || mid.is_empty() || right.is_empty() {
            return Ok(Matrix::empty(left.engine()));
        }
        Self::fresh(
            left.engine(),
            &format!("{} * {} * {}", left.name(), mid.name(), right.name()),
            left.rows,
            right.cols,
        )
    }

    pub fn scale(&self, factor: &Expr) -> Result<Matrix, EngineError> {
        if self.is_empty() {
            return Ok(self.clone());
        }
        Self::fresh(
            &self.engine,
            &format!("{} * ({})", self.name(), factor.name()),
            self.rows,
            self.cols,
        )
    }

    pub fn scale_i64(&self, factor: i64) -> Result<Matrix, EngineError> {
        if self.is_empty() {
            return Ok(self.clone());
        }
        Self::fresh(
            &self.engine,
            &format!("{} * ({factor})", self.name()),
            self.rows,
            self.cols,
        )
    }

    pub fn div(&self, divisor: &Expr) -> Result<Matrix, EngineError> {
        if self.is_empty() {
            return Ok(self.clone());
        }
        Self::fresh(
            &self.engine,
            &format!("{} / ({})", self.name(), divisor.name()),
            self.rows,
            self.cols,
        )
    }

    pub fn transpose(&self) -> Result<Matrix, EngineError> {
        if self.is_empty() {
            return Ok(self.clone());
        }
        Self::fresh(
            &self.engine,
            &format!("transpose({})", self.name()),
            self.cols,
            self.rows,
        )
    }

    pub fn inverse(&self) -> Result<Matrix, EngineError> {
        Self::fresh(
            &self.engine,
            &format!("inverse({})", self.name()),
            self.rows,
            self.cols,
        )
    }

    pub fn det(&self) -> Result<Expr, EngineError> {
        Expr::new(&self.engine, &format!("det({})", self.name()))
    }

    pub fn rank(&self) -> Result<usize, EngineError> {
        let line = self.engine.query(&format!("query rank {}", self.name()))?;
        line.trim()
            .parse()
            .map_err(|_| EngineError::Protocol(format!("bad rank response: {line}")))
    }

    /// In-place row-reduced echelon form; returns the rank. Pivots are
    /// normalized to 1 by the worker.
    pub fn row_echelon(&mut self) -> Result<usize, EngineError> {
        self.make_unique()?;
        let line = self
            .engine
            .query(&format!("rowechelon {}", self.name()))?;
        line.trim()
            .parse()
            .map_err(|_| EngineError::Protocol(format!("bad rank response: {line}")))
    }

    /// Rank-revealing in-place column reduction. Returns the rank and the
    /// cols×cols right transform `b` with `reduced = original · b`; the
    /// columns of `b` past the rank span the kernel.
    pub fn col_reduce(&mut self) -> Result<(usize, Matrix), EngineError> {
        self.make_unique()?;
        let b = Matrix::zeros(&self.engine, self.cols, self.cols)?;
        let line = self
            .engine
            .query(&format!("colreduce {} {}", self.name(), b.name()))?;
        let rank = line
            .trim()
            .parse()
            .map_err(|_| EngineError::Protocol(format!("bad rank response: {line}")))?;
        Ok((rank, b))
    }

    /// In-place Gram–Schmidt orthogonalization of the columns; linearly
    /// dependent columns come back zero.
    pub fn gram_schmidt(&mut self) -> Result<(), EngineError> {
        self.make_unique()?;
        self.engine
            .command(&format!("gramschmidt {}", self.name()))
    }

    /// Characteristic polynomial in the symbol `var`.
    pub fn char_poly(&self, var: &str) -> Result<Expr, EngineError> {
        Expr::new(&self.engine, &format!("charpoly({}, {var})", self.name()))
    }

    /// Substitutes `value` (any engine-parsable term) for the symbol `sym`
    /// in every entry.
    pub fn subst(&self, sym: &str, value: &str) -> Result<Matrix, EngineError> {
        if self.is_empty() {
            return Ok(self.clone());
        }
        Self::fresh(
            &self.engine,
            &format!("subst({}, {sym}, {value})", self.name()),
            self.rows,
            self.cols,
        )
    }

    /// Appends the rows of `other` below `self`. Stacking onto a 0×0 matrix
    /// yields `other`.
    pub fn stack(&self, other: &Matrix) -> Result<Matrix, EngineError> {
        if self.is_empty() {
            return Ok(other.clone());
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        Self::fresh(
            &self.engine,
            &format!("stack({}, {})", self.name(), other.name()),
            self.rows + other.rows,
            self.cols,
        )
    }

    pub fn is_zero(&self) -> Result<bool, EngineError> {
        if self.is_empty() {
            return Ok(true);
        }
        let line = self
            .engine
            .query(&format!("query iszero {}", self.name()))?;
        Ok(line.trim() == "1")
    }

    /// The worker's native serialization.
    pub fn serialize(&self) -> Result<String, EngineError> {
        if self.is_empty() {
            return Ok("[]".to_string());
        }
        self.engine.query(&format!("print {}", self.name()))
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => write!(f, "Matrix({} {}x{})", inner.name, self.rows, self.cols),
            None => write!(f, "Matrix(empty)"),
        }
    }
}
