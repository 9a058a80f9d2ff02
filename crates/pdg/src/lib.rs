//! The procedure dependence graph (PDG).
//!
//! One arena of nodes covers the whole program; a node wraps an IR position
//! (instruction, terminator or formal parameter) of one procedure and owns
//! four edge sets: `ctrl`/`data` point at the nodes that depend on this one,
//! `rev_ctrl`/`rev_data` at the nodes this one depends on. The two
//! directions are always mutated together, so `M ∈ N.data ⇔ N ∈ M.rev_data`
//! holds at every point in time.
//!
//! Call-site nodes additionally record *parameter linkage*: which callee
//! PDGs they transfer control into (`subgraphs`) and the formal-parameter
//! and return nodes they were wired to (`params`). Interference edges (for
//! the multithreaded mode) are symmetric and live in their own set.

use ahash::AHashMap;
use indexmap::IndexSet;
use ir::{Block, FuncId, Inst};
use stdx::{impl_debug, impl_idx_from};
use typed_index_collections::TiVec;

mod builder;
mod control_dependence;
mod interference;
mod post_dominators;
mod reaching;

#[cfg(test)]
mod tests;

pub use builder::{build, PdgParams};
pub use control_dependence::{control_dependence, ControlDependence};
pub use interference::add_interference_edges;
pub use post_dominators::{post_dominators, Pdom, PostDominators};
pub use reaching::ReachingStores;

/// Stores whose value may reach a given load; supplied by the data-dependence
/// service (the bundled baseline is [`ReachingStores`]).
pub trait DataDeps {
    fn reaching_defs(&self, func: FuncId, load: Inst) -> &[Inst];
}

#[derive(PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
impl_idx_from!(NodeId(u32));
impl_debug!(match NodeId { n => "n{}", n.0; });

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    Inst(Inst),
    /// The terminator of the given block.
    Term(Block),
    /// The i-th formal parameter of the procedure.
    Param(u32),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeKey {
    pub func: FuncId,
    pub kind: NodeKind,
}

pub type NodeSet = IndexSet<NodeId, ahash::RandomState>;

/// Parameter linkage of a call site towards one resolved callee.
#[derive(Clone, Debug)]
pub struct CallParams {
    pub callee: FuncId,
    pub formals: Vec<NodeId>,
    pub rets: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct NodeData {
    pub ctrl: NodeSet,
    pub rev_ctrl: NodeSet,
    pub data: NodeSet,
    pub rev_data: NodeSet,
    pub interf: NodeSet,
    /// Callee PDGs this node transfers control into (call sites only);
    /// exactly those for which parameter linkage has been wired.
    pub subgraphs: Vec<FuncId>,
    pub params: Vec<CallParams>,
    /// Set by the sweep once the node has been isolated and dropped.
    pub dropped: bool,
}

impl NodeData {
    pub fn is_isolated(&self) -> bool {
        self.ctrl.is_empty()
            && self.rev_ctrl.is_empty()
            && self.data.is_empty()
            && self.rev_data.is_empty()
    }
}

pub struct Pdg {
    keys: TiVec<NodeId, NodeKey>,
    pub(crate) nodes: TiVec<NodeId, NodeData>,
    /// The overlay block each node is linked into, if any.
    node_blocks: TiVec<NodeId, Option<Block>>,
    by_key: AHashMap<NodeKey, NodeId>,
    /// Basic-block overlay: the nodes of each block, in instruction order
    /// with the terminator last. Blocks emptied by the sweep are removed.
    block_nodes: AHashMap<(FuncId, Block), Vec<NodeId>>,
}

impl Default for Pdg {
    fn default() -> Pdg {
        Pdg::new()
    }
}

impl Pdg {
    pub fn new() -> Pdg {
        Pdg {
            keys: TiVec::new(),
            nodes: TiVec::new(),
            node_blocks: TiVec::new(),
            by_key: AHashMap::new(),
            block_nodes: AHashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn key(&self, node: NodeId) -> NodeKey {
        self.keys[node]
    }

    pub fn node_data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node]
    }

    pub fn get(&self, key: NodeKey) -> Option<NodeId> {
        self.by_key.get(&key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.nodes.iter_enumerated()
    }

    pub fn block_nodes(&self, func: FuncId, block: Block) -> Option<&[NodeId]> {
        self.block_nodes.get(&(func, block)).map(|nodes| &nodes[..])
    }

    /// Whether this procedure contributed any node.
    pub fn has_nodes_for(&self, func: FuncId) -> bool {
        self.keys.iter().any(|key| key.func == func)
    }

    /// Returns the node for `key`, creating it on first reference.
    /// Terminator nodes are linked into the block overlay; instruction nodes
    /// go through [`inst_node`](Self::inst_node) which knows their block.
    pub fn node(&mut self, key: NodeKey) -> NodeId {
        if let Some(node) = self.by_key.get(&key) {
            return *node;
        }
        let block = match key.kind {
            NodeKind::Term(block) => Some(block),
            NodeKind::Inst(_) | NodeKind::Param(_) => None,
        };
        let node = self.keys.next_key();
        self.keys.push(key);
        self.nodes.push(NodeData::default());
        self.node_blocks.push(block);
        self.by_key.insert(key, node);
        if let Some(block) = block {
            self.block_nodes.entry((key.func, block)).or_default().push(node);
        }
        node
    }

    /// Like [`node`](Self::node) for instruction keys, registering the node
    /// in `block`'s overlay.
    pub fn inst_node(&mut self, func: FuncId, block: Block, inst: Inst) -> NodeId {
        let key = NodeKey { func, kind: NodeKind::Inst(inst) };
        if let Some(node) = self.by_key.get(&key) {
            return *node;
        }
        let node = self.node(key);
        self.node_blocks[node] = Some(block);
        self.block_nodes.entry((func, block)).or_default().push(node);
        node
    }

    /// `to` is data-dependent on `from`.
    pub fn add_data_edge(&mut self, from: NodeId, to: NodeId) {
        if from == to {
            return;
        }
        self.nodes[from].data.insert(to);
        self.nodes[to].rev_data.insert(from);
    }

    /// `to` is control-dependent on `from`.
    pub fn add_ctrl_edge(&mut self, from: NodeId, to: NodeId) {
        if from == to {
            return;
        }
        self.nodes[from].ctrl.insert(to);
        self.nodes[to].rev_ctrl.insert(from);
    }

    /// Loose read/write conflict between two procedures (symmetric).
    pub fn add_interference(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        self.nodes[a].interf.insert(b);
        self.nodes[b].interf.insert(a);
    }

    /// Removes every edge touching `node` (mutating the reverse neighbours
    /// symmetrically) and detaches it from the block overlay; if the block
    /// empties it is removed. The node stays in the arena, flagged dropped.
    pub fn isolate(&mut self, node: NodeId) {
        let data = std::mem::take(&mut self.nodes[node].data);
        for succ in data {
            self.nodes[succ].rev_data.swap_remove(&node);
        }
        let rev_data = std::mem::take(&mut self.nodes[node].rev_data);
        for pred in rev_data {
            self.nodes[pred].data.swap_remove(&node);
        }
        let ctrl = std::mem::take(&mut self.nodes[node].ctrl);
        for succ in ctrl {
            self.nodes[succ].rev_ctrl.swap_remove(&node);
        }
        let rev_ctrl = std::mem::take(&mut self.nodes[node].rev_ctrl);
        for pred in rev_ctrl {
            self.nodes[pred].ctrl.swap_remove(&node);
        }
        let interf = std::mem::take(&mut self.nodes[node].interf);
        for other in interf {
            self.nodes[other].interf.swap_remove(&node);
        }

        if let Some(block) = self.node_blocks[node].take() {
            let func = self.keys[node].func;
            if let Some(nodes) = self.block_nodes.get_mut(&(func, block)) {
                nodes.retain(|&n| n != node);
                if nodes.is_empty() {
                    self.block_nodes.remove(&(func, block));
                }
            }
        }

        self.nodes[node].dropped = true;
    }
}
