//! Process-wide interaction log.
//!
//! A plain-text, append-only record of bridge activity: sessions opening
//! and closing, checks and their verdicts, interrupts. One log is shared by
//! every session in the process. Lines appended while no log is open are
//! dropped; every line is also emitted as a trace event.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::{BridgeResult, LogError};

static LOG: OnceLock<Mutex<Option<File>>> = OnceLock::new();

fn slot() -> MutexGuard<'static, Option<File>> {
    LOG.get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Create (or truncate) `path` and make it the interaction log, closing any
/// log that was open.
pub fn open(path: impl AsRef<Path>) -> BridgeResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| LogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    *slot() = Some(file);
    tracing::debug!(path = %path.display(), "interaction log opened");
    Ok(())
}

pub fn is_open() -> bool {
    slot().is_some()
}

/// Append one line to the open log.
pub fn append(text: &str) {
    tracing::trace!(target: "termbridge::log", "{text}");
    let mut log = slot();
    let Some(file) = log.as_mut() else {
        return;
    };
    if let Err(err) = writeln!(file, "{text}") {
        tracing::warn!(error = %err, "interaction log write failed, closing the log");
        *log = None;
    }
}

/// Flush and close the log. Later appends are dropped until the next `open`.
pub fn close() {
    if let Some(mut file) = slot().take() {
        if let Err(err) = file.flush() {
            tracing::warn!(error = %err, "interaction log flush failed");
        }
        tracing::debug!("interaction log closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::solver::SatResult;

    // The log is global, so the whole lifecycle lives in one test.
    #[test]
    fn log_records_session_activity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.log");

        append("dropped before open");
        open(&path).unwrap();
        assert!(is_open());
        append("marker one");

        let session = Session::default_session();
        let p = session.bool_const("p").unwrap();
        let solver = session.solver().unwrap();
        solver.assert(&p).unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Sat);
        session.interrupt();
        let id = session.id();
        drop((p, solver, session));

        close();
        assert!(!is_open());
        append("dropped after close");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("marker one\n"));
        assert!(text.contains(&format!("session {id} opened")));
        assert!(text.contains(&format!("session {id} solver check: sat")));
        assert!(text.contains(&format!("session {id} interrupt")));
        assert!(text.contains(&format!("session {id} closed")));
        assert!(!text.contains("dropped"));

        let missing = dir.path().join("no-such-dir").join("bridge.log");
        let err = open(&missing).unwrap_err();
        assert!(err.to_string().contains("interaction log"));
        assert!(!is_open());
    }
}
