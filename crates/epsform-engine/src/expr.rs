//! Scalar expression handles.

use std::fmt;
use std::rc::Rc;

use crate::error::EngineError;
use crate::session::Engine;

struct ExprInner {
    engine: Engine,
    name: String,
    repr: String,
}

impl Drop for ExprInner {
    fn drop(&mut self) {
        self.engine.release(&self.name);
    }
}

/// Handle to an engine-resident scalar expression.
///
/// The canonical serialization is fetched once at construction, so equality,
/// hashing and zero tests are local. Handles are immutable; arithmetic
/// produces new handles.
#[derive(Clone)]
pub struct Expr {
    inner: Rc<ExprInner>,
}

impl Expr {
    /// Evaluates `src` in the worker and binds the result to a fresh name.
    pub fn new(engine: &Engine, src: &str) -> Result<Self, EngineError> {
        let name = engine.alloc_expr_name();
        engine.command(&format!("let {name} := {src}"))?;
        let repr = engine.query(&format!("print {name}"))?;

        Ok(Self {
            inner: Rc::new(ExprInner {
                engine: engine.clone(),
                name,
                repr,
            }),
        })
    }

    /// An integer constant.
    pub fn from_i64(engine: &Engine, n: i64) -> Result<Self, EngineError> {
        Self::new(engine, &n.to_string())
    }

    /// The session this handle belongs to.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// The engine-side variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The canonical serialization.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.inner.repr
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.inner.repr == "0"
    }

    #[must_use]
    pub fn is_one(&self) -> bool {
        self.inner.repr == "1"
    }

    pub fn add(&self, other: &Expr) -> Result<Expr, EngineError> {
        self.binop("+", other)
    }

    pub fn sub(&self, other: &Expr) -> Result<Expr, EngineError> {
        self.binop("-", other)
    }

    pub fn mul(&self, other: &Expr) -> Result<Expr, EngineError> {
        self.binop("*", other)
    }

    pub fn div(&self, other: &Expr) -> Result<Expr, EngineError> {
        self.binop("/", other)
    }

    pub fn neg(&self) -> Result<Expr, EngineError> {
        Expr::new(self.engine(), &format!("-({})", self.name()))
    }

    /// `self^k` for a (possibly negative) integer exponent.
    pub fn pow(&self, k: i64) -> Result<Expr, EngineError> {
        Expr::new(self.engine(), &format!("({})^({k})", self.name()))
    }

    /// Numerator of the reduced rational form.
    pub fn numer(&self) -> Result<Expr, EngineError> {
        Expr::new(self.engine(), &format!("numer({})", self.name()))
    }

    /// Denominator of the reduced rational form.
    pub fn denom(&self) -> Result<Expr, EngineError> {
        Expr::new(self.engine(), &format!("denom({})", self.name()))
    }

    /// Degree in `sym`; polynomial expressions only.
    pub fn deg(&self, sym: &str) -> Result<i64, EngineError> {
        let line = self
            .engine()
            .query(&format!("query deg {} {sym}", self.name()))?;
        line.trim()
            .parse()
            .map_err(|_| EngineError::Protocol(format!("bad degree response: {line}")))
    }

    /// Substitutes `value` (any engine-parsable term) for the symbol `sym`.
    pub fn subst(&self, sym: &str, value: &str) -> Result<Expr, EngineError> {
        Expr::new(
            self.engine(),
            &format!("subst({}, {sym}, {value})", self.name()),
        )
    }

    fn binop(&self, op: &str, other: &Expr) -> Result<Expr, EngineError> {
        Expr::new(
            self.engine(),
            &format!("({}) {op} ({})", self.name(), other.name()),
        )
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.inner.repr == other.inner.repr
    }
}

impl Eq for Expr {}

impl std::hash::Hash for Expr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.repr.hash(state);
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.repr)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({} = {})", self.inner.name, self.inner.repr)
    }
}
