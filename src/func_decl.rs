//! Function declarations.

use std::fmt;

use crate::ast::Ast;
use crate::error::BridgeResult;
use crate::expr::Expr;
use crate::handle::Handle;
use crate::lift::{self, Dynamic};
use crate::native::RawFuncDecl;
use crate::session::Session;

/// An uninterpreted function symbol with a fixed signature.
#[derive(Clone)]
pub struct FuncDecl {
    handle: Handle<RawFuncDecl>,
}

impl FuncDecl {
    pub(crate) fn from_handle(handle: Handle<RawFuncDecl>) -> Self {
        Self { handle }
    }

    pub fn raw(&self) -> RawFuncDecl {
        self.handle.raw()
    }

    pub fn session(&self) -> &Session {
        self.handle.session()
    }

    /// Apply this declaration to `args` and lift the result.
    pub fn apply(&self, args: &[&Expr]) -> BridgeResult<Dynamic> {
        let session = self.session();
        let mut raws = Vec::with_capacity(args.len());
        for arg in args {
            session.ensure_same(arg.session())?;
            raws.push(arg.raw());
        }
        let decl = self.raw();
        let expr = session.term_from(|e| e.mk_app(decl, &raws))?;
        lift::lift(expr, None)
    }

    pub fn as_ast(&self) -> BridgeResult<Ast> {
        let raw = self.raw();
        let session = self.session();
        let owned = session.transaction(|call| call.create(|e| e.func_decl_to_ast(raw)))?;
        Ok(Ast::from_handle(owned.into_handle(session)))
    }
}

impl fmt::Display for FuncDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        match self.session().with_lock(|e| e.func_decl_to_string(raw)) {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

impl fmt::Debug for FuncDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncDecl({self})")
    }
}
