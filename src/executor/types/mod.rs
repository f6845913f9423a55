//! Type definitions for the executor
//!
//! This module contains all the core types used by the executor:
//! - AST nodes (DataStep, Stmt, Expr)
//! - Runtime values (Value, VarType)
//! - Control flow (Control)

pub mod ast;
pub mod control;
pub mod values;

// Re-export all types for convenient access
pub use ast::*;
pub use control::Control;
pub use values::{Value, VarType};
