//! knife: command-line client for a configuration-management server
//!
//! Layers, outermost first:
//! - `cli`: clap arguments, dispatch and output rendering
//! - `infrastructure`: HTTP/cloud clients, real I/O, service container
//! - `application`: one service per command family
//! - `domain`: documents, versions, metadata and script parsing

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
