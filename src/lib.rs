#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]

//! Interactive code-execution sandbox.
//!
//! Accepts untrusted C++ submissions over a TCP socket, compiles them,
//! and runs the result under OS-level resource limits while streaming an
//! interactive session back to the client as typed JSON messages.
//!
//! - `config` — configuration loading
//! - `workspace` — per-submission scratch directory
//! - `screener` — static deny-list
//! - `compiler` — source writing and compiler invocation
//! - `child` — resource-limited child process launch
//! - `protocol` — wire request parsing and response encoding
//! - `heuristic` — input-request detector
//! - `verdict` — exit status to result classification
//! - `session` — per-connection orchestration
//! - `server` — TCP accept loop

pub mod child;
pub mod compiler;
pub mod config;
pub mod heuristic;
pub mod protocol;
pub mod screener;
pub mod server;
pub mod session;
pub mod verdict;
pub mod workspace;
