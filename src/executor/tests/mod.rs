//! Executor tests
//!
//! Steps are built as statement trees, round-tripped through JSON and run
//! against in-memory stores.

mod helpers;
mod output_tests;
mod set_tests;
