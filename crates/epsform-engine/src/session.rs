//! The worker session.
//!
//! One worker process is spawned per run and driven synchronously. Requests
//! are single lines; a response is zero or more payload lines terminated by
//! a line containing a single `.`. Error responses carry an `error:` prefix
//! on their first payload line.
//!
//! Engine-resident values are addressed by names allocated from an arena
//! (`e<n>` for scalars, `m<n>` for matrices). Names are reclaimed and the
//! engine-side value freed when the owning handle is dropped.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::rc::Rc;

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::EngineError;

struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
    free_exprs: Vec<u64>,
    free_mats: Vec<u64>,
    symbols: FxHashSet<String>,
}

/// Handle to the worker session.
///
/// Cheap to clone; all clones address the same process. The session is
/// single-threaded by construction (`Rc`), matching the synchronous
/// round-trip model.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<RefCell<Session>>,
}

impl Engine {
    /// Spawns the worker and waits for its ready banner.
    pub fn start(path: &str, args: &[String]) -> Result<Self, EngineError> {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take().expect("stdin is piped");
        let stdout = BufReader::new(child.stdout.take().expect("stdout is piped"));

        let mut session = Session {
            child,
            stdin,
            stdout,
            next_id: 0,
            free_exprs: Vec::new(),
            free_mats: Vec::new(),
            symbols: FxHashSet::default(),
        };

        // banner
        session.read_response()?;

        Ok(Self {
            inner: Rc::new(RefCell::new(session)),
        })
    }

    /// Executes a statement, discarding any payload.
    pub fn command(&self, stmt: &str) -> Result<(), EngineError> {
        self.inner.borrow_mut().round_trip(stmt).map(|_| ())
    }

    /// Executes a statement and returns its single payload line.
    pub fn query(&self, stmt: &str) -> Result<String, EngineError> {
        let lines = self.inner.borrow_mut().round_trip(stmt)?;
        match lines.into_iter().next() {
            Some(line) => Ok(line),
            None => Err(EngineError::Protocol(format!(
                "no payload for query: {stmt}"
            ))),
        }
    }

    /// Registers a free symbol with the worker session.
    pub fn add_symbol(&self, name: &str) -> Result<(), EngineError> {
        {
            let session = self.inner.borrow();
            if session.symbols.contains(name) {
                return Ok(());
            }
        }
        self.command(&format!("symbol {name}"))?;
        self.inner.borrow_mut().symbols.insert(name.to_string());
        Ok(())
    }

    /// Removes a symbol from the worker session.
    pub fn drop_symbol(&self, name: &str) -> Result<(), EngineError> {
        if !self.inner.borrow_mut().symbols.remove(name) {
            return Ok(());
        }
        self.command(&format!("unsymbol {name}"))
    }

    pub(crate) fn alloc_expr_name(&self) -> String {
        let mut session = self.inner.borrow_mut();
        let id = session.free_exprs.pop().unwrap_or_else(|| {
            session.next_id += 1;
            session.next_id
        });
        format!("e{id}")
    }

    pub(crate) fn alloc_matrix_name(&self) -> String {
        let mut session = self.inner.borrow_mut();
        let id = session.free_mats.pop().unwrap_or_else(|| {
            session.next_id += 1;
            session.next_id
        });
        format!("m{id}")
    }

    /// Frees an engine-side value. Called from handle drops; failures are
    /// swallowed there because drop order during teardown may outlive the
    /// worker.
    pub(crate) fn release(&self, name: &str) {
        let _ = self.command(&format!("free {name}"));

        let mut session = self.inner.borrow_mut();
        if let Ok(id) = name[1..].parse::<u64>() {
            match name.as_bytes()[0] {
                b'e' => session.free_exprs.push(id),
                b'm' => session.free_mats.push(id),
                _ => {}
            }
        }
    }

    /// Two sessions are the same if they address the same process.
    #[must_use]
    pub fn same_session(&self, other: &Engine) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Session {
    fn round_trip(&mut self, stmt: &str) -> Result<Vec<String>, EngineError> {
        trace!(target: "epsform_engine::proto", ">> {stmt}");
        writeln!(self.stdin, "{stmt}")?;
        self.stdin.flush()?;
        self.read_response()
    }

    fn read_response(&mut self) -> Result<Vec<String>, EngineError> {
        let mut payload = Vec::new();
        let mut error: Option<String> = None;

        loop {
            let mut buf = String::new();
            if self.stdout.read_line(&mut buf)? == 0 {
                return Err(EngineError::Closed);
            }
            let line = buf.trim_end();
            trace!(target: "epsform_engine::proto", "<< {line}");

            if line == "." {
                break;
            }
            if let Some(msg) = line.strip_prefix("error:") {
                error.get_or_insert_with(|| msg.trim().to_string());
                continue;
            }
            payload.push(line.to_string());
        }

        match error {
            Some(msg) if msg.contains("division by zero") => Err(EngineError::DivisionByZero),
            Some(msg) => Err(EngineError::Engine(msg)),
            None => Ok(payload),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "quit");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}
