//! Sort handles with a cached category.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::ast::Ast;
use crate::error::{BridgeResult, CategoryError};
use crate::handle::Handle;
use crate::native::{RawSort, SortKind};
use crate::session::Session;

/// A sort. Its [`SortKind`] is fetched once, when the handle is created.
#[derive(Clone)]
pub struct Sort {
    handle: Handle<RawSort>,
    kind: SortKind,
}

impl Sort {
    pub(crate) fn new(handle: Handle<RawSort>, kind: SortKind) -> Self {
        Self { handle, kind }
    }

    pub fn raw(&self) -> RawSort {
        self.handle.raw()
    }

    pub fn session(&self) -> &Session {
        self.handle.session()
    }

    /// Cached category; no native call.
    pub fn kind(&self) -> SortKind {
        self.kind
    }

    fn require(&self, kind: SortKind) -> BridgeResult<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(CategoryError::WrongCategory {
                expected: kind.to_string(),
                actual: self.kind,
            }
            .into())
        }
    }

    /// Width of a bit-vector sort.
    pub fn bv_size(&self) -> BridgeResult<u32> {
        self.require(SortKind::BV)?;
        let raw = self.raw();
        self.session().with_lock(|e| e.get_bv_sort_size(raw))
    }

    pub fn array_domain(&self) -> BridgeResult<Sort> {
        self.require(SortKind::Array)?;
        let raw = self.raw();
        self.session().sort_from(|e| e.get_array_sort_domain(raw))
    }

    pub fn array_range(&self) -> BridgeResult<Sort> {
        self.require(SortKind::Array)?;
        let raw = self.raw();
        self.session().sort_from(|e| e.get_array_sort_range(raw))
    }

    pub fn is_eq(&self, other: &Sort) -> BridgeResult<bool> {
        self.session().ensure_same(other.session())?;
        let (a, b) = (self.raw(), other.raw());
        self.session().with_lock(|e| e.is_eq_sort(a, b))
    }

    pub fn as_ast(&self) -> BridgeResult<Ast> {
        let raw = self.raw();
        let session = self.session();
        let owned = session.transaction(|call| call.create(|e| e.sort_to_ast(raw)))?;
        Ok(Ast::from_handle(owned.into_handle(session)))
    }
}

impl PartialEq for Sort {
    fn eq(&self, other: &Self) -> bool {
        self.is_eq(other).unwrap_or(false)
    }
}

impl Eq for Sort {}

impl Hash for Sort {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let raw = self.raw();
        let hash = self
            .session()
            .with_lock(|e| {
                let ast = e.sort_to_ast(raw);
                e.get_ast_hash(ast)
            })
            .unwrap_or_default();
        state.write_u32(hash);
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        match self.session().with_lock(|e| e.sort_to_string(raw)) {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

impl fmt::Debug for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sort({}: {self})", self.kind)
    }
}
