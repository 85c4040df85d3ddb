// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # termbridge
//!
//! A handle lifetime and concurrency bridge for reference-counted symbolic
//! expression engines (terms, sorts, solvers, models).
//!
//! ## Architecture
//!
//! - **Native surface** (`native`): the C-style call interface an engine implements
//! - **Session** (`session`): one lock-serialized connection with its symbol cache
//! - **Handles** (`handle`): one native reference per host value, released on `Drop`
//! - **Lifting** (`lift`, `terms`): sort category → typed term variant
//! - **Numerals** (`numeral`): fixed-width and exact extraction with overflow reporting
//! - **Solving** (`solver`, `optimize`, `model`): checks, objectives and their models
//! - **Interaction log** (`log`): an optional append-only trace of bridge activity
//! - **Reference engine** (`engine`): an in-process stand-in for a native engine, used by tests and the CLI
//!
//! ## Library usage
//!
//! ```no_run
//! use termbridge::session::Session;
//! use termbridge::terms::Term;
//!
//! let session = Session::default_session();
//! let x = session.int_const("x").unwrap();
//! let two = session.int(2).unwrap();
//! let one = session.int(1).unwrap();
//! let a = x.add(&two).unwrap().simplify().unwrap();
//! let b = x.add(&one).unwrap().add(&one).unwrap().simplify().unwrap();
//! assert_eq!(a, b);
//! ```

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod func_decl;
pub mod handle;
pub mod lift;
pub mod log;
pub mod model;
pub mod native;
pub mod numeral;
pub mod optimize;
pub mod session;
pub mod solver;
pub mod sort;
pub mod terms;

pub use error::{BridgeError, BridgeResult};
pub use expr::Expr;
pub use lift::Dynamic;
pub use numeral::NumeralValue;
pub use session::Session;
