//! The fragment/selection-set renderer.

pub mod ir;
pub mod renderer;

pub use ir::{FieldIr, FragmentIr, SelectionIr, TypeCondition};
pub use renderer::{render_fragment, reprint_with_injected_typename};
