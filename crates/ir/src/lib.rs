//! The whole-program IR the slicer operates on.
//!
//! The model is deliberately independent from any front end: a [`Module`] is
//! a set of functions, declarations and globals; a [`Function`] owns one flat
//! arena of instructions plus a basic-block overlay holding the instruction
//! order and the terminators. Dense newtype indices (`FuncId`, `Block`,
//! `Inst`, ...) address everything, so analyses can key bit sets and side
//! tables without touching the IR itself.
//!
//! Instructions are opaque to most of the slicer; the [`Op`] enum only
//! distinguishes the categories the analyses care about (`call`, `load`,
//! `store`, `alloca`, `phi`) and carries everything else as `Other`.
//! Debug metadata is a per-function subprogram file/line plus an optional
//! `(line, column)` per instruction.

use std::iter::once;

use ahash::AHashMap;
use once_cell::unsync::OnceCell;
use smallvec::SmallVec;
use smol_str::SmolStr;
use stdx::{impl_debug, impl_debug_display, impl_idx_from};
use typed_index_collections::{TiSlice, TiVec};

mod parse;
mod pretty;
mod unused;
mod verify;

#[cfg(test)]
mod tests;

pub use pretty::{inst_string, operand_string, term_string};
pub use unused::remove_unused;
pub use verify::VerifyError;

#[derive(PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);
impl_idx_from!(FuncId(u32));
impl_debug!(match FuncId { f => "fn{}", f.0; });

#[derive(PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct GlobalId(u32);
impl_idx_from!(GlobalId(u32));
impl_debug!(match GlobalId { g => "g{}", g.0; });

#[derive(PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Block(u32);
impl_idx_from!(Block(u32));
impl_debug!(match Block { b => "bb{}", b.0; });

#[derive(PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
impl_idx_from!(Inst(u32));
impl_debug!(match Inst { i => "inst{}", i.0; });

#[derive(PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum Ty {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
    Str,
}

impl_debug_display! {
    match Ty {
        Ty::Void => "void";
        Ty::I1 => "i1";
        Ty::I8 => "i8";
        Ty::I16 => "i16";
        Ty::I32 => "i32";
        Ty::I64 => "i64";
        Ty::F32 => "f32";
        Ty::F64 => "f64";
        Ty::Ptr => "ptr";
        Ty::Str => "str";
    }
}

impl Ty {
    pub fn is_integer(self) -> bool {
        matches!(self, Ty::I1 | Ty::I8 | Ty::I16 | Ty::I32 | Ty::I64)
    }

    pub fn is_pointer_or_integer(self) -> bool {
        self == Ty::Ptr || self.is_integer()
    }

    pub fn bits(self) -> u32 {
        match self {
            Ty::Void => 0,
            Ty::I1 => 1,
            Ty::I8 => 8,
            Ty::I16 => 16,
            Ty::I32 | Ty::F32 => 32,
            Ty::I64 | Ty::F64 | Ty::Ptr | Ty::Str => 64,
        }
    }

    /// Whether a value of `self` reinterprets as `other` without loss.
    pub fn lossless_bitcast_to(self, other: Ty) -> bool {
        self == other || (self.bits() == other.bits() && self.bits() != 0)
    }
}

/// A source position within the containing function's subprogram file.
#[derive(PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct SrcLoc {
    pub line: u32,
    pub col: u32,
}

impl_debug!(match SrcLoc { l => "!{}:{}", l.line, l.col; });

#[derive(Clone, PartialEq, Debug)]
pub enum Const {
    Int(i64, Ty),
    Float(f64, Ty),
    Str(SmolStr),
    Null,
    Undef,
}

impl Const {
    pub fn ty(&self) -> Ty {
        match self {
            Const::Int(_, ty) | Const::Float(_, ty) => *ty,
            Const::Str(_) => Ty::Str,
            Const::Null | Const::Undef => Ty::Ptr,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Operand {
    /// The result of another instruction in the same function.
    Value(Inst),
    /// The i-th formal parameter of the containing function.
    Arg(u32),
    Func(FuncId),
    Global(GlobalId),
    Const(Const),
}

impl Operand {
    pub fn as_value(&self) -> Option<Inst> {
        match self {
            Operand::Value(inst) => Some(*inst),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<FuncId> {
        match self {
            Operand::Func(func) => Some(*func),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Op {
    /// `args[0]` is the called value, the rest are the actual arguments.
    Call,
    /// `args[0]` is the address.
    Load,
    /// `args[0]` is the stored value, `args[1]` the address.
    Store,
    Alloca,
    /// Sources come in `args`, one per block, in the order given here.
    Phi(Box<[Block]>),
    /// Placeholder left behind when an instruction is sliced away.
    Noop,
    Other(SmolStr),
}

#[derive(Clone, Debug)]
pub struct InstData {
    pub op: Op,
    /// Result type; `Ty::Void` when the instruction produces no value.
    pub ty: Ty,
    pub result: Option<SmolStr>,
    pub args: SmallVec<[Operand; 2]>,
    pub loc: Option<SrcLoc>,
}

impl InstData {
    pub fn noop() -> InstData {
        InstData { op: Op::Noop, ty: Ty::Void, result: None, args: SmallVec::new(), loc: None }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self.op, Op::Phi(_))
    }

    pub fn is_call(&self) -> bool {
        matches!(self.op, Op::Call)
    }

    /// The called value of a call instruction.
    pub fn callee(&self) -> Option<&Operand> {
        if self.is_call() {
            self.args.first()
        } else {
            None
        }
    }

    /// The actual arguments of a call instruction.
    pub fn call_args(&self) -> &[Operand] {
        if self.is_call() {
            self.args.get(1..).unwrap_or(&[])
        } else {
            &[]
        }
    }

    pub fn visit_values(&self, mut f: impl FnMut(Inst)) {
        for arg in &self.args {
            if let Operand::Value(inst) = arg {
                f(*inst)
            }
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Terminator {
    Br { dest: Block },
    CondBr { cond: Operand, then_dest: Block, else_dest: Block },
    Ret { value: Option<Operand> },
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> SmallVec<[Block; 2]> {
        match self {
            Terminator::Br { dest } => SmallVec::from_slice(&[*dest]),
            Terminator::CondBr { then_dest, else_dest, .. } => {
                SmallVec::from_slice(&[*then_dest, *else_dest])
            }
            Terminator::Ret { .. } | Terminator::Unreachable => SmallVec::new(),
        }
    }

    pub fn is_ret(&self) -> bool {
        matches!(self, Terminator::Ret { .. })
    }

    pub fn visit_operands(&self, mut f: impl FnMut(&Operand)) {
        match self {
            Terminator::CondBr { cond, .. } => f(cond),
            Terminator::Ret { value: Some(value) } => f(value),
            _ => (),
        }
    }

    pub fn visit_operands_mut(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Terminator::CondBr { cond, .. } => f(cond),
            Terminator::Ret { value: Some(value) } => f(value),
            _ => (),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BlockData {
    /// Instruction order within the block; phis come first.
    pub insts: Vec<Inst>,
    pub terminator: Option<Terminator>,
    pub term_loc: Option<SrcLoc>,
}

impl BlockData {
    pub fn terminator(&self) -> &Terminator {
        self.terminator.as_ref().expect("block without terminator")
    }

    pub fn successors(&self) -> SmallVec<[Block; 2]> {
        match &self.terminator {
            Some(term) => term.successors(),
            None => SmallVec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub variadic: bool,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: SmolStr,
    pub sig: Signature,
    /// Subprogram file the function was compiled from, if known.
    pub file: Option<SmolStr>,
    /// Subprogram declaration line; 0 when unknown.
    pub line: u32,
    /// Declarations may promise to never return (`exit`, `abort`, ...).
    pub noreturn: bool,
    pub insts: TiVec<Inst, InstData>,
    pub blocks: TiVec<Block, BlockData>,
    predecessors: PredecessorCache,
}

impl Function {
    pub fn new_declaration(name: SmolStr, sig: Signature, noreturn: bool) -> Function {
        Function {
            name,
            sig,
            file: None,
            line: 0,
            noreturn,
            insts: TiVec::new(),
            blocks: TiVec::new(),
            predecessors: PredecessorCache::new(),
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry(&self) -> Block {
        Block(0)
    }

    pub fn predecessors(&self, block: Block) -> &[Block] {
        &self.predecessors.compute(&self.blocks)[block]
    }

    /// Must be called after any mutation of block successors.
    pub fn invalidate_predecessors(&mut self) {
        self.predecessors.invalidate()
    }

    /// Index (into `blocks[block].insts`) of the first non-phi instruction.
    pub fn first_non_phi(&self, block: Block) -> usize {
        self.blocks[block]
            .insts
            .iter()
            .position(|&inst| !self.insts[inst].is_phi())
            .unwrap_or(self.blocks[block].insts.len())
    }

    /// Blocks in postorder of the walk from the entry block. Unreachable
    /// blocks are not visited.
    pub fn postorder(&self) -> Vec<Block> {
        if self.is_declaration() {
            return Vec::new();
        }
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut visited = vec![false; self.blocks.len()];
        let mut stack: Vec<(Block, SmallVec<[Block; 2]>, usize)> = Vec::new();
        visited[usize::from(self.entry())] = true;
        stack.push((self.entry(), self.blocks[self.entry()].successors(), 0));
        while let Some((block, succs, idx)) = stack.last_mut() {
            if let Some(&succ) = succs.get(*idx) {
                *idx += 1;
                if !visited[usize::from(succ)] {
                    visited[usize::from(succ)] = true;
                    stack.push((succ, self.blocks[succ].successors(), 0));
                }
            } else {
                order.push(*block);
                stack.pop();
            }
        }
        order
    }

    pub fn reverse_postorder(&self) -> Vec<Block> {
        let mut order = self.postorder();
        order.reverse();
        order
    }

    /// The containing block of every instruction that is linked into a block.
    pub fn containing_blocks(&self) -> TiVec<Inst, Option<Block>> {
        let mut res: TiVec<Inst, Option<Block>> = vec![None; self.insts.len()].into();
        for (block, data) in self.blocks.iter_enumerated() {
            for &inst in &data.insts {
                res[inst] = Some(block);
            }
        }
        res
    }

    /// The type of `op` when read inside this function.
    pub fn operand_ty(&self, op: &Operand) -> Ty {
        match op {
            Operand::Value(inst) => self.insts[*inst].ty,
            Operand::Arg(idx) => self.sig.params.get(*idx as usize).copied().unwrap_or(Ty::I64),
            Operand::Func(_) | Operand::Global(_) => Ty::Ptr,
            Operand::Const(constant) => constant.ty(),
        }
    }

    /// All locations of the function: instructions in block order, with the
    /// block terminator last.
    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.blocks.iter_enumerated().flat_map(|(block, data)| {
            data.insts
                .iter()
                .map(move |&inst| Location { block, kind: LocationKind::Inst(inst) })
                .chain(once(Location { block, kind: LocationKind::Terminator }))
        })
    }
}

/// A unique position inside a function: an instruction or a terminator.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Location {
    pub block: Block,
    pub kind: LocationKind,
}

impl_debug!(match Location { l => "{:?}/{:?}", l.block, l.kind; });

#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum LocationKind {
    Inst(Inst),
    Terminator,
}

impl_debug! {
    match LocationKind {
        LocationKind::Inst(inst) => "{:?}", inst;
        LocationKind::Terminator => "term";
    }
}

#[derive(Clone, Debug)]
pub struct GlobalData {
    pub name: SmolStr,
}

#[derive(Clone, Debug, Default)]
struct PredecessorCache {
    cache: OnceCell<TiVec<Block, Vec<Block>>>,
}

impl PredecessorCache {
    fn new() -> PredecessorCache {
        PredecessorCache { cache: OnceCell::new() }
    }

    fn invalidate(&mut self) {
        self.cache = OnceCell::new();
    }

    fn compute(&self, blocks: &TiSlice<Block, BlockData>) -> &TiVec<Block, Vec<Block>> {
        self.cache.get_or_init(|| {
            let mut preds: TiVec<Block, Vec<Block>> =
                vec![Vec::with_capacity(2); blocks.len()].into();
            for (block, data) in blocks.iter_enumerated() {
                for succ in data.successors() {
                    preds[succ].push(block);
                }
            }
            preds
        })
    }
}

#[derive(Default, Debug)]
pub struct Module {
    pub funcs: TiVec<FuncId, Function>,
    pub globals: TiVec<GlobalId, GlobalData>,
    func_names: AHashMap<SmolStr, FuncId>,
    global_names: AHashMap<SmolStr, GlobalId>,
}

impl Module {
    pub fn func_by_name(&self, name: &str) -> Option<FuncId> {
        self.func_names.get(name).copied()
    }

    pub fn global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.global_names.get(name).copied()
    }

    pub fn add_func(&mut self, func: Function) -> FuncId {
        let id = self.funcs.next_key();
        self.func_names.insert(func.name.clone(), id);
        self.funcs.push(func);
        id
    }

    pub fn add_global(&mut self, global: GlobalData) -> GlobalId {
        let id = self.globals.next_key();
        self.global_names.insert(global.name.clone(), id);
        self.globals.push(global);
        id
    }

    pub fn defined_funcs(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.funcs.iter_enumerated().filter(|(_, func)| !func.is_declaration())
    }

    /// Counts of the module, `noop` placeholders excluded.
    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics { globals: self.globals.len() as u64, ..Statistics::default() };
        for (_, func) in self.defined_funcs() {
            stats.functions += 1;
            stats.blocks += func.blocks.len() as u64;
            for data in &func.blocks {
                stats.instructions += data
                    .insts
                    .iter()
                    .filter(|&&inst| !matches!(func.insts[inst].op, Op::Noop))
                    .count() as u64;
            }
        }
        stats
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    pub globals: u64,
    pub functions: u64,
    pub blocks: u64,
    pub instructions: u64,
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Globals/Functions/Blocks/Instr.: {} {} {} {}",
            self.globals, self.functions, self.blocks, self.instructions
        )
    }
}
