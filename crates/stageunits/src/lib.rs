//! Page composition from units
//!
//! Units are tasks producing a payload for their dependents and an optional
//! page result. After a run, the results are folded into one page result with
//! redirect and not-found taking precedence over merged props.

mod merge;
mod result;
mod tree;

pub use merge::PagePropsMerger;
pub use result::{PageResult, Redirect, UnitResult};
pub use tree::{UnitTree, UnitTreeBuilder};
