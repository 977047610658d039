//! A small Unix command shell.
//!
//! A line goes through the [`validate`] checks, is split by the [`parser`]
//! into a [`command::CommandSequence`] and handed to the [`engine`], which
//! forks the processes, wires pipes and redirections and waits for the
//! foreground ones. Background jobs are collected by the [`reaper`].
//!
//! The main entry point is [`Interpreter`], which drives this per line or as
//! an interactive loop on top of `rustyline`.

pub mod builtin;
pub mod command;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
mod external;
pub mod history;
mod interpreter;
mod io_adapters;
pub mod lexer;
pub mod parser;
pub mod reaper;
pub mod redirect;
pub mod validate;
pub mod wildcard;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
