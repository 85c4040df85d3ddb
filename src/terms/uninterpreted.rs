//! Terms of user-declared sorts.

use crate::native::SortKind;

term_type!(
    /// A term whose sort was declared with
    /// [`Session::uninterpreted_sort`](crate::session::Session::uninterpreted_sort).
    Uninterpreted,
    Uninterpreted,
    SortKind::Uninterpreted
);
