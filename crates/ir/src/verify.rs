//! Structural checks for modules, used on slicer output when `--verify` is
//! active.

use bitset::BitSet;

use crate::{Block, FuncId, Inst, Module, Op, Operand};

pub enum VerifyError {
    MissingTerminator { func: FuncId, block: Block },
    InvalidTarget { func: FuncId, block: Block, target: Block },
    ReadBeforeWrite { func: FuncId, block: Block, value: Inst },
    InvalidPhiSource { func: FuncId, block: Block, src: Block },
    PhiMissingSource { func: FuncId, block: Block, missing: Vec<Block> },
    PhiNotAtBlockStart { func: FuncId, block: Block, inst: Inst },
}

stdx::impl_debug! {
    match VerifyError {
        VerifyError::MissingTerminator { func, block } => "{:?}/{:?}: block has no terminator", func, block;
        VerifyError::InvalidTarget { func, block, target } => "{:?}/{:?}: branch to nonexistent {:?}", func, block, target;
        VerifyError::ReadBeforeWrite { func, block, value } => "{:?}/{:?}: {:?} was read before write!", func, block, value;
        VerifyError::InvalidPhiSource { func, block, src } => "{:?}/{:?}: {:?} is not a predecessor (but used in phi)", func, block, src;
        VerifyError::PhiMissingSource { func, block, missing } => "{:?}/{:?}: phi is missing sources {:?}", func, block, missing;
        VerifyError::PhiNotAtBlockStart { func, block, inst } => "{:?}/{:?}: phi {:?} after non-phi instruction", func, block, inst;
    }
}

impl Module {
    pub fn verify(&self) -> Box<[VerifyError]> {
        let mut res = Vec::new();
        for (id, func) in self.defined_funcs() {
            // Definitions seen along a reverse-postorder walk; like the
            // dominance check in a real verifier this may miss exotic
            // irreducible flow but catches dangling references from slicing.
            let mut defined: BitSet<Inst> = BitSet::new_empty(func.insts.len());
            let num_blocks = func.blocks.len();

            for block in func.reverse_postorder() {
                let data = &func.blocks[block];
                if data.terminator.is_none() {
                    res.push(VerifyError::MissingTerminator { func: id, block });
                    continue;
                }

                for target in data.successors() {
                    if usize::from(target) >= num_blocks {
                        res.push(VerifyError::InvalidTarget { func: id, block, target });
                    }
                }

                let mut seen_non_phi = false;
                for &inst in &data.insts {
                    let inst_data = &func.insts[inst];
                    if let Op::Phi(sources) = &inst_data.op {
                        if seen_non_phi {
                            res.push(VerifyError::PhiNotAtBlockStart { func: id, block, inst });
                        }
                        let mut preds = func.predecessors(block).to_vec();
                        for src in sources.iter() {
                            match preds.iter().position(|pred| pred == src) {
                                Some(pos) => {
                                    preds.swap_remove(pos);
                                }
                                None => res.push(VerifyError::InvalidPhiSource {
                                    func: id,
                                    block,
                                    src: *src,
                                }),
                            }
                        }
                        if !preds.is_empty() {
                            res.push(VerifyError::PhiMissingSource {
                                func: id,
                                block,
                                missing: preds,
                            });
                        }
                        // Phi reads happen "on the edge"; their sources are
                        // exempt from the read-before-write check.
                    } else {
                        seen_non_phi = true;
                        inst_data.visit_values(|value| {
                            if !defined.contains(value) {
                                res.push(VerifyError::ReadBeforeWrite { func: id, block, value });
                            }
                        });
                    }
                    defined.insert(inst);
                }

                if let Some(term) = &data.terminator {
                    term.visit_operands(|op| {
                        if let Operand::Value(value) = op {
                            if !defined.contains(*value) {
                                res.push(VerifyError::ReadBeforeWrite {
                                    func: id,
                                    block,
                                    value: *value,
                                });
                            }
                        }
                    });
                }
            }
        }
        res.into_boxed_slice()
    }
}
