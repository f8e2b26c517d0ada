#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Command-line replay harness for the Riptide sync engine.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `replay.rs`: script model, scripted transport, and step execution
//! - `error.rs`: validation vs. operational failure classification
//! - `output.rs`: table and JSON renderers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod error;
pub(crate) mod output;
pub(crate) mod replay;

pub use cli::run;
