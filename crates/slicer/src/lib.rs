//! The slicing engine: criteria resolution, the depth-capped backward
//! marking walk, the diverging-branch cutoff and the sweep that applies a
//! computed slice back to the module.

mod criteria;
mod cutoff;
mod mark;
mod sweep;


pub use criteria::{parse_criteria, resolve_to_insts, resolve_to_nodes, CriterionSpec};
pub use cutoff::cutoff_diverging_branches;
pub use mark::{mark, WalkDepth};
pub use sweep::{apply_to_module, sweep};
