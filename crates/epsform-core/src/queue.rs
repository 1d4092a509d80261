//! The transformation log.
//!
//! Every transformation applied to a system is appended here, padded to
//! the full (unblocked) dimension, and optionally mirrored to a log file
//! as it is appended. A logged queue can be replayed against a freshly
//! loaded system, or compiled down into a single net transformation matrix
//! in a fresh formal variable `x`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};

use tracing::info;

use epsform_engine::{Engine, Matrix};

use crate::error::{Error, Result};
use crate::point::SingPoint;

/// A logged transformation, padded to the full dimension.
#[derive(Clone, Debug)]
pub enum Transformation {
    /// Balance with projector matrix between two points.
    Balance {
        x1: SingPoint,
        x2: SingPoint,
        matrix: Matrix,
    },
    /// Global similarity transformation.
    Global { matrix: Matrix },
    /// Left gauge of the given pole order at a point.
    LeftGauge {
        point: SingPoint,
        order: i32,
        matrix: Matrix,
    },
}

/// Receiver for replayed transformations; implemented by the system.
pub trait TransformSink {
    fn apply_balance(&mut self, p: &Matrix, x1: &SingPoint, x2: &SingPoint) -> Result<()>;
    fn apply_global(&mut self, t: &Matrix) -> Result<()>;
    fn apply_left_gauge(&mut self, g: &Matrix, point: &SingPoint, order: i32) -> Result<()>;
}

impl Transformation {
    fn apply<S: TransformSink>(&self, sink: &mut S) -> Result<()> {
        match self {
            Self::Balance { x1, x2, matrix } => {
                info!("balance [{x1},{x2}]");
                sink.apply_balance(matrix, x1, x2)
            }
            Self::Global { matrix } => {
                info!("transformation");
                sink.apply_global(matrix)
            }
            Self::LeftGauge {
                point,
                order,
                matrix,
            } => {
                info!("left transformation [{point},{order}]");
                sink.apply_left_gauge(matrix, point, *order)
            }
        }
    }
}

/// Append-only log of applied transformations.
pub struct TransformationQueue {
    engine: Engine,
    records: Vec<Transformation>,
    file: Option<File>,
    filename: Option<String>,
    before: usize,
    after: usize,
    replaying: bool,
}

impl TransformationQueue {
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            records: Vec::new(),
            file: None,
            filename: None,
            before: 0,
            after: 0,
            replaying: false,
        }
    }

    /// A queue carrying over the records of `other`; the log file and
    /// padding are not inherited.
    #[must_use]
    pub fn from_records(other: &TransformationQueue) -> Self {
        Self {
            engine: other.engine.clone(),
            records: other.records.clone(),
            file: None,
            filename: None,
            before: 0,
            after: 0,
            replaying: false,
        }
    }

    /// Rows/columns of inactive context around the active block; appended
    /// matrices are padded by this much.
    pub fn set_padding(&mut self, before: usize, after: usize) {
        self.before = before;
        self.after = after;
    }

    /// Mirrors future appends to `path`.
    pub fn set_file(&mut self, path: &str, append: bool) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|source| Error::Io {
                path: path.to_string(),
                source,
            })?;
        self.file = Some(file);
        self.filename = Some(path.to_string());
        Ok(())
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Loads records from a queue file.
    pub fn load(&mut self, path: &str) -> Result<()> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })?;

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
            let head = parse_queue_head(head).ok_or_else(|| parse_err("bad record head"))?;
            let matrix = Matrix::parse(&self.engine, tail)?;

            let record = match head {
                QueueHead::Balance(p1, p2) => Transformation::Balance {
                    x1: SingPoint::parse(&self.engine, &p1)?,
                    x2: SingPoint::parse(&self.engine, &p2)?,
                    matrix,
                },
                QueueHead::Global => Transformation::Global { matrix },
                QueueHead::LeftGauge(p, k) => Transformation::LeftGauge {
                    point: SingPoint::parse(&self.engine, &p)?,
                    order: k,
                    matrix,
                },
            };
            self.records.push(record);
        }
        Ok(())
    }

    /// Starts a replay: checks that no padding is active, suppresses
    /// appends, and hands out the records to apply. Pair with
    /// [`TransformationQueue::finish_replay`].
    pub fn start_replay(&mut self) -> Result<Vec<Transformation>> {
        if self.before != 0 || self.after != 0 {
            return Err(Error::ReplayWithPadding);
        }
        self.replaying = true;
        Ok(self.records.clone())
    }

    pub fn finish_replay(&mut self) {
        self.replaying = false;
    }

    /// Applies `records` in order to `sink`.
    pub fn replay_records<S: TransformSink>(
        records: &[Transformation],
        sink: &mut S,
    ) -> Result<()> {
        for record in records {
            record.apply(sink)?;
        }
        Ok(())
    }

    /// Appends a balance; `p` is the projector on the active block.
    pub fn balance(&mut self, p: &Matrix, x1: &SingPoint, x2: &SingPoint) -> Result<()> {
        if self.replaying {
            return Ok(());
        }
        let padded = self.pad(p, PadKind::Zero, false)?;
        self.write_record(&format!("B({x1},{x2})"), &padded)?;
        self.records.push(Transformation::Balance {
            x1: x1.clone(),
            x2: x2.clone(),
            matrix: padded,
        });
        Ok(())
    }

    /// Appends a global transformation on the active block.
    pub fn transform(&mut self, t: &Matrix) -> Result<()> {
        if self.replaying {
            return Ok(());
        }
        let padded = self.pad(t, PadKind::Identity, false)?;
        self.write_record("T", &padded)?;
        self.records.push(Transformation::Global { matrix: padded });
        Ok(())
    }

    /// Appends a left gauge; `g` couples the active block to the left
    /// block, so it sits at rows `before..`, columns `0..`.
    pub fn left_gauge(&mut self, g: &Matrix, x1: &SingPoint, k: i32) -> Result<()> {
        if self.replaying {
            return Ok(());
        }
        let padded = self.pad(g, PadKind::Zero, true)?;
        self.write_record(&format!("L({x1},{k})"), &padded)?;
        self.records.push(Transformation::LeftGauge {
            point: x1.clone(),
            order: k,
            matrix: padded,
        });
        Ok(())
    }

    /// Folds the whole queue into one net transformation, written to
    /// `path` in the worker's serialization. Each step becomes a rational
    /// function of a fresh formal variable `x` and the products are taken
    /// in application order.
    pub fn export(&self, path: &str) -> Result<()> {
        let Some(first) = self.records.first() else {
            return Err(Error::EmptyQueue);
        };
        let size = match first {
            Transformation::Balance { matrix, .. }
            | Transformation::Global { matrix }
            | Transformation::LeftGauge { matrix, .. } => matrix.rows(),
        };

        self.engine.add_symbol("x")?;
        let mut net = Matrix::identity(&self.engine, size)?;

        for record in &self.records {
            let id = Matrix::identity(&self.engine, size)?;
            let step = match record {
                Transformation::Balance { x1, x2, matrix } => {
                    info!("balance ({x1},{x2})");
                    let coeff = match (x1.expr(), x2.expr()) {
                        (None, Some(p2)) => epsform_engine::Expr::new(
                            &self.engine,
                            &format!("x-(({})+1)", p2.name()),
                        )?,
                        (Some(p1), None) => epsform_engine::Expr::new(
                            &self.engine,
                            &format!("((({})+1)-x)/(x-({}))", p1.name(), p1.name()),
                        )?,
                        (Some(p1), Some(p2)) => epsform_engine::Expr::new(
                            &self.engine,
                            &format!("(({})-({}))/(x-({}))", p1.name(), p2.name(), p1.name()),
                        )?,
                        (None, None) => unreachable!("balance between two infinite points"),
                    };
                    matrix.scale(&coeff)?.add(&id)?
                }
                Transformation::Global { matrix } => {
                    info!("transformation");
                    matrix.clone()
                }
                Transformation::LeftGauge {
                    point,
                    order,
                    matrix,
                } => {
                    info!("left transformation ({point},{order})");
                    let coeff = match point.expr() {
                        None => {
                            epsform_engine::Expr::new(&self.engine, &format!("x^({order})"))?
                        }
                        Some(p) => epsform_engine::Expr::new(
                            &self.engine,
                            &format!("1/(x-({}))^({order})", p.name()),
                        )?,
                    };
                    matrix.scale(&coeff)?.add(&id)?
                }
            };
            net = net.mul(&step)?;
        }

        let serialized = net.serialize()?;
        std::fs::write(path, format!("{serialized}\n")).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })?;

        self.engine.drop_symbol("x")?;
        Ok(())
    }

    fn pad(&self, m: &Matrix, kind: PadKind, left_cols: bool) -> Result<Matrix> {
        let dim = m.rows() + self.before + self.after;
        let mut padded = match kind {
            PadKind::Zero => Matrix::zeros(&self.engine, dim, dim)?,
            PadKind::Identity => Matrix::identity(&self.engine, dim)?,
        };
        let c0 = if left_cols { 0 } else { self.before };
        padded.set_block(self.before, c0, m)?;
        Ok(padded)
    }

    fn write_record(&mut self, head: &str, matrix: &Matrix) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let text = matrix.serialize()?;
        writeln!(file, "{head}:  \t{text}").map_err(|source| Error::Io {
            path: self.filename.clone().unwrap_or_default(),
            source,
        })?;
        Ok(())
    }
}

enum PadKind {
    Zero,
    Identity,
}

/// Parsed head of a queue file line; the matrix payload follows the colon.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum QueueHead {
    Balance(String, String),
    Global,
    LeftGauge(String, i32),
}

pub(crate) fn parse_queue_head(head: &str) -> Option<QueueHead> {
    if head == "T" {
        return Some(QueueHead::Global);
    }
    if let Some(args) = head.strip_prefix("B(").and_then(|s| s.strip_suffix(')')) {
        let (p1, p2) = args.split_once(',')?;
        if p1.is_empty() || p2.is_empty() {
            return None;
        }
        return Some(QueueHead::Balance(p1.to_string(), p2.to_string()));
    }
    if let Some(args) = head.strip_prefix("L(").and_then(|s| s.strip_suffix(')')) {
        let (p, k) = args.split_once(',')?;
        if p.is_empty() {
            return None;
        }
        return Some(QueueHead::LeftGauge(p.to_string(), k.parse().ok()?));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_balance_head() {
        assert_eq!(
            parse_queue_head("B(0,inf)"),
            Some(QueueHead::Balance("0".into(), "inf".into()))
        );
    }

    #[test]
    fn parses_global_head() {
        assert_eq!(parse_queue_head("T"), Some(QueueHead::Global));
    }

    #[test]
    fn parses_left_gauge_head() {
        assert_eq!(
            parse_queue_head("L(1,2)"),
            Some(QueueHead::LeftGauge("1".into(), 2))
        );
        assert_eq!(
            parse_queue_head("L(inf,3)"),
            Some(QueueHead::LeftGauge("inf".into(), 3))
        );
    }

    #[test]
    fn rejects_malformed_heads() {
        assert_eq!(parse_queue_head("B(0)"), None);
        assert_eq!(parse_queue_head("L(1,x)"), None);
        assert_eq!(parse_queue_head("Q(1,2)"), None);
        assert_eq!(parse_queue_head("B(,1)"), None);
        assert_eq!(parse_queue_head(""), None);
    }
}
