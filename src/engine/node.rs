//! Hash-consed node table with reference counts.
//!
//! Every AST the engine knows about (sorts, declarations, numerals and
//! applications) lives in one slot of the table. Structurally equal data
//! always maps to the same slot, so node identity is structural identity.
//!
//! A node's count is the sum of external references (`inc_ref`), one per
//! parent that mentions it, and one for the "last result" pin. Nodes created
//! during a call start at zero and are swept when the call ends unless
//! something picked them up.

use std::hash::{Hash, Hasher};

use num_rational::BigRational;
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use crate::native::BuiltinOp;

/// Slot identifier. Slot `n` lives at index `n - 1`; zero is never used.
pub(crate) type NodeId = u32;

/// Argument list of an application or declaration.
pub(crate) type Args = SmallVec<[NodeId; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SortData {
    Bool,
    Int,
    Real,
    BitVec(u32),
    Array { domain: NodeId, range: NodeId },
    /// Named by an interned symbol.
    Uninterpreted(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Func {
    Builtin(BuiltinOp),
    Decl(NodeId),
    ConstArray,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct DeclData {
    pub name: String,
    pub domain: Args,
    pub range: NodeId,
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum NodeData {
    Sort(SortData),
    Decl(DeclData),
    App {
        func: Func,
        args: Args,
        sort: NodeId,
    },
    /// Integer, real or bit-vector literal. Bit-vectors are stored unsigned.
    Numeral { value: BigRational, sort: NodeId },
    /// The positive real `degree`-th root of `radicand`, known to be irrational.
    Algebraic {
        radicand: BigRational,
        degree: u32,
        sort: NodeId,
    },
    /// The `index`-th element of an uninterpreted sort, as found in models.
    Elem { sort: NodeId, index: u32 },
}

impl NodeData {
    /// Nodes this one holds a structural reference to.
    pub fn children(&self) -> Args {
        let mut out = Args::new();
        match self {
            NodeData::Sort(SortData::Array { domain, range }) => {
                out.push(*domain);
                out.push(*range);
            }
            NodeData::Sort(_) => {}
            NodeData::Decl(decl) => {
                out.extend(decl.domain.iter().copied());
                out.push(decl.range);
            }
            NodeData::App { func, args, sort } => {
                if let Func::Decl(decl) = func {
                    out.push(*decl);
                }
                out.extend(args.iter().copied());
                out.push(*sort);
            }
            NodeData::Numeral { sort, .. }
            | NodeData::Algebraic { sort, .. }
            | NodeData::Elem { sort, .. } => out.push(*sort),
        }
        out
    }
}

#[derive(Debug)]
struct Slot {
    data: NodeData,
    rc: u32,
    hash: u32,
}

/// The decrement would take a count below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Underflow;

#[derive(Debug, Default)]
pub(crate) struct NodeTable {
    slots: Vec<Option<Slot>>,
    free: Vec<NodeId>,
    index: FxHashMap<NodeData, NodeId>,
    scratch: Vec<NodeId>,
    pinned: Option<NodeId>,
    live: usize,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the node for `data`, creating it with a zero count if needed.
    pub fn intern(&mut self, data: NodeData) -> NodeId {
        if let Some(&id) = self.index.get(&data) {
            return id;
        }
        for child in data.children() {
            if let Some(slot) = self.slot_mut(child) {
                slot.rc += 1;
            }
        }
        let mut hasher = FxHasher::default();
        data.hash(&mut hasher);
        let slot = Slot {
            data: data.clone(),
            rc: 0,
            hash: hasher.finish() as u32,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id as usize - 1] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() as NodeId
            }
        };
        self.index.insert(data, id);
        self.scratch.push(id);
        self.live += 1;
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.slot(id).map(|s| &s.data)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    pub fn hash_of(&self, id: NodeId) -> Option<u32> {
        self.slot(id).map(|s| s.hash)
    }

    pub fn rc(&self, id: NodeId) -> u32 {
        self.slot(id).map_or(0, |s| s.rc)
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn inc(&mut self, id: NodeId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.rc += 1;
        }
    }

    /// Drop one external reference. Refuses to steal the pin's reference.
    pub fn dec(&mut self, id: NodeId) -> Result<(), Underflow> {
        let pinned = self.pinned == Some(id);
        let slot = self.slot_mut(id).ok_or(Underflow)?;
        if slot.rc == 0 || (pinned && slot.rc == 1) {
            return Err(Underflow);
        }
        slot.rc -= 1;
        if slot.rc == 0 {
            self.free_cascade(id);
        }
        Ok(())
    }

    /// Make `id` the last result, releasing the previous one.
    pub fn pin(&mut self, id: NodeId) {
        self.inc(id);
        if let Some(old) = self.pinned.replace(id) {
            self.release(old);
        }
    }

    /// Free every node created since the last sweep that nobody references.
    pub fn sweep(&mut self) {
        let scratch = std::mem::take(&mut self.scratch);
        for id in scratch {
            if self.contains(id) && self.rc(id) == 0 {
                self.free_cascade(id);
            }
        }
    }

    /// Drop an engine-internal reference.
    pub fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.rc = slot.rc.saturating_sub(1);
            if slot.rc == 0 {
                self.free_cascade(id);
            }
        }
    }

    fn free_cascade(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.slots.get_mut(id as usize - 1).and_then(Option::take) else {
                continue;
            };
            self.index.remove(&slot.data);
            self.free.push(id);
            self.live -= 1;
            for child in slot.data.children() {
                if let Some(child_slot) = self.slot_mut(child) {
                    child_slot.rc = child_slot.rc.saturating_sub(1);
                    if child_slot.rc == 0 {
                        stack.push(child);
                    }
                }
            }
        }
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        if id == 0 {
            return None;
        }
        self.slots.get(id as usize - 1).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        if id == 0 {
            return None;
        }
        self.slots.get_mut(id as usize - 1).and_then(Option::as_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn numeral(table: &mut NodeTable, sort: NodeId, v: i64) -> NodeId {
        table.intern(NodeData::Numeral {
            value: BigRational::from_integer(BigInt::from(v)),
            sort,
        })
    }

    #[test]
    fn interning_is_structural() {
        let mut table = NodeTable::new();
        let int = table.intern(NodeData::Sort(SortData::Int));
        let a = numeral(&mut table, int, 5);
        let b = numeral(&mut table, int, 5);
        assert_eq!(a, b);
        assert_eq!(table.hash_of(a), table.hash_of(b));
        assert_eq!(table.rc(int), 1);
    }

    #[test]
    fn sweep_frees_unreferenced_scratch() {
        let mut table = NodeTable::new();
        let int = table.intern(NodeData::Sort(SortData::Int));
        table.inc(int);
        let five = numeral(&mut table, int, 5);
        let six = numeral(&mut table, int, 6);
        table.pin(six);
        table.sweep();
        assert!(!table.contains(five));
        assert!(table.contains(six));
        assert_eq!(table.live(), 2);
    }

    #[test]
    fn dec_cascades_and_reuses_slots() {
        let mut table = NodeTable::new();
        let int = table.intern(NodeData::Sort(SortData::Int));
        let five = numeral(&mut table, int, 5);
        table.inc(five);
        table.sweep();
        assert!(table.contains(int));
        table.dec(five).unwrap();
        assert!(!table.contains(five));
        assert!(!table.contains(int));
        assert_eq!(table.live(), 0);
        assert_eq!(table.dec(five), Err(Underflow));

        let real = table.intern(NodeData::Sort(SortData::Real));
        assert!(real == five || real == int);
    }

    #[test]
    fn pin_reference_cannot_be_stolen() {
        let mut table = NodeTable::new();
        let int = table.intern(NodeData::Sort(SortData::Int));
        table.pin(int);
        table.sweep();
        assert_eq!(table.dec(int), Err(Underflow));
        table.inc(int);
        assert_eq!(table.dec(int), Ok(()));
        assert!(table.contains(int));
    }
}
