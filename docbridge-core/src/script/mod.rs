//! Script generation, parsing, and application.
//!
//! `generate` renders a model into mongo-shell-style script text. `statement`
//! parses that text back into typed statements without any dynamic code
//! execution. `apply` runs parsed statements sequentially against a
//! [`crate::source::DocumentSource`].

pub mod apply;
pub mod generate;
pub mod statement;

pub use apply::apply_script;
pub use generate::{GenerateOptions, ScriptBlock, ScriptOrigin, ScriptOutput, generate};
pub use statement::{Statement, parse_script};
