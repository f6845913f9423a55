//! Validation Rules
//!
//! Each file in this module contains one validation rule:
//!
//! - `loop_control.rs` - LEAVE/CONTINUE outside an iterative DO loop
//! - `output_target.rs` - OUTPUT naming a dataset the DATA statement lacks
//! - `undefined_array.rs` - Array references before the ARRAY statement
//! - `uninitialized_variable.rs` - Variables read but never given a value

mod loop_control;
mod output_target;
mod undefined_array;
mod uninitialized_variable;

pub use loop_control::LoopControlRule;
pub use output_target::OutputTargetRule;
pub use undefined_array::UndefinedArrayRule;
pub use uninitialized_variable::UninitializedVariableRule;
