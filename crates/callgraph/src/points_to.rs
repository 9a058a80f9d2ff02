//! The interface to an (external) pointer analysis.
//!
//! The slicer never inspects memory itself; whenever it needs to know what a
//! value may point at it asks a [`PointsTo`] session. All call-graph
//! strategies accept `Option<&dyn PointsTo>` — without a session the lazy
//! strategy falls back to the address-taken filter.

use ir::{FuncId, GlobalId, Inst, Module, Operand};
use smallvec::SmallVec;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PtTarget {
    Func(FuncId),
    Global(GlobalId),
    /// A stack allocation, identified by its `alloca` instruction.
    Alloca(FuncId, Inst),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PointsToEntry {
    pub target: PtTarget,
    /// Byte offset into the target, `None` for "unknown".
    pub offset: Option<i64>,
}

pub trait PointsTo {
    /// What may `value`, read inside `func`, point at?
    fn points_to(
        &self,
        module: &Module,
        func: FuncId,
        value: &Operand,
    ) -> SmallVec<[PointsToEntry; 4]>;

    /// A call graph the analysis computed during its own fixpoint, if it
    /// kept one. Feeds [`CallGraph::imported`](crate::CallGraph::imported).
    fn call_graph(&self) -> Option<ExternalCallGraph> {
        None
    }
}

/// Caller → callee edges computed by an external analysis.
#[derive(Clone, Debug, Default)]
pub struct ExternalCallGraph {
    pub edges: Vec<(FuncId, FuncId)>,
}
