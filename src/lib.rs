//! Conversation synchronization core and chat relay for the Solace client.
//!
//! The client side drives one chat turn at a time against the relay, keeps
//! the local conversation store consistent and reconciles independently
//! assigned conversation identifiers. The server side is the relay itself:
//! it forwards turns to the upstream model and keeps its own archived copy
//! of every synchronized conversation.

// Strict ban on dangerous or non-idiomatic practices
#![deny(warnings)] // All warnings are treated as errors
#![deny(unsafe_code)] // Unsafe code is forbidden
#![deny(missing_docs)] // Every public function, struct, enum or module must be documented
#![deny(dead_code)] // Unused code is forbidden
#![deny(non_camel_case_types)]
// Types must follow the CamelCase convention (explicit exceptions possible when needed)

// Additional options to let nothing slip through
#![deny(unused_imports)] // Unused imports are forbidden
#![deny(unused_variables)] // Unused variables are forbidden
#![deny(unused_must_use)] // Forces explicit handling of Result and Option
#![deny(non_snake_case)] // Variable and function names must be snake_case
#![deny(non_upper_case_globals)] // Constants and globals must be UPPERCASE
#![deny(nonstandard_style)] // Prevents any non-standard code style
#![forbid(unsafe_op_in_unsafe_fn)]
// Forbids unsafe operations even inside an unsafe function

// Clippy for strict discipline
#![deny(clippy::all)] // Enables all standard Clippy lints
#![deny(clippy::pedantic)] // Enables Clippy's very strict lints
#![deny(clippy::nursery)] // Enables experimental lints
#![deny(clippy::unwrap_used)] // Forbids unwrap()
#![deny(clippy::expect_used)] // Forbids expect()
#![deny(clippy::panic)] // Forbids panic!()
#![deny(clippy::print_stdout)] // Forbids println!() in production
#![deny(clippy::todo)] // Forbids TODOs in the code
#![deny(clippy::unimplemented)] // Forbids unimplemented functions
#![deny(clippy::missing_const_for_fn)] // Forces const where possible
#![deny(clippy::unwrap_in_result)] // Forbids unwrap() on Result
#![deny(clippy::module_inception)] // Forbids a module named like its crate
#![deny(clippy::redundant_clone)] // Forbids unnecessary clones
#![deny(clippy::shadow_unrelated)] // Forbids shadowing of unrelated variables
#![deny(clippy::too_many_arguments)] // Limits the number of function arguments
#![deny(clippy::cognitive_complexity)] // Limits the cognitive complexity of functions

// Lints for safety and robustness
#![deny(overflowing_literals)] // Forbids literals that overflow

/// Conversation data model, local persistence and the turn loop.
pub mod chat;
/// Client configuration from the environment.
pub mod config;
/// Language model service client.
pub mod llm;
/// Client for the relay's HTTP surface.
pub mod relay;
/// HTTP relay service, its archive and prompt assembly.
#[allow(
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::unused_async
)]
pub mod server;
/// Entry helpers to start the Solace relay.
pub mod start_solace_relay;
/// Trust-gated replication and identifier reconciliation.
pub mod sync;
