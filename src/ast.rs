//! Generic ast view over terms, sorts and declarations.

use std::fmt;

use crate::error::BridgeResult;
use crate::handle::Handle;
use crate::native::{AstKind, RawAst};
use crate::session::Session;

/// Any native ast, without a category.
#[derive(Clone)]
pub struct Ast {
    handle: Handle<RawAst>,
}

impl Ast {
    pub(crate) fn from_handle(handle: Handle<RawAst>) -> Self {
        Self { handle }
    }

    pub fn raw(&self) -> RawAst {
        self.handle.raw()
    }

    pub fn session(&self) -> &Session {
        self.handle.session()
    }

    pub fn kind(&self) -> BridgeResult<AstKind> {
        let raw = self.raw();
        self.session().with_lock(|e| e.get_ast_kind(raw))
    }

    pub fn ast_id(&self) -> BridgeResult<u32> {
        let raw = self.raw();
        self.session().with_lock(|e| e.get_ast_id(raw))
    }

    pub fn ast_hash(&self) -> BridgeResult<u32> {
        let raw = self.raw();
        self.session().with_lock(|e| e.get_ast_hash(raw))
    }

    pub fn is_eq(&self, other: &Ast) -> BridgeResult<bool> {
        self.session().ensure_same(other.session())?;
        let (a, b) = (self.raw(), other.raw());
        self.session().with_lock(|e| e.is_eq_ast(a, b))
    }
}

impl PartialEq for Ast {
    fn eq(&self, other: &Self) -> bool {
        self.is_eq(other).unwrap_or(false)
    }
}

impl Eq for Ast {}

impl std::hash::Hash for Ast {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u32(self.ast_hash().unwrap_or_default());
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        match self.session().with_lock(|e| e.ast_to_string(raw)) {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

impl fmt::Debug for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ast(#{}: {self})", self.raw().get())
    }
}

#[cfg(test)]
mod tests {
    use crate::native::AstKind;
    use crate::session::Session;
    use crate::terms::Term;

    #[test]
    fn views_report_their_kind() {
        let session = Session::default_session();
        let int = session.int_sort().unwrap();
        let x = session.int_const("x").unwrap();
        let seven = session.int(7).unwrap();
        let f = session.func_decl("f", &[&int], &int).unwrap();

        assert_eq!(int.as_ast().unwrap().kind().unwrap(), AstKind::Sort);
        assert_eq!(f.as_ast().unwrap().kind().unwrap(), AstKind::FuncDecl);
        assert_eq!(x.expr().as_ast().kind().unwrap(), AstKind::App);
        assert_eq!(seven.expr().as_ast().kind().unwrap(), AstKind::Numeral);
        assert_eq!(int.as_ast().unwrap().to_string(), "Int");
    }
}
