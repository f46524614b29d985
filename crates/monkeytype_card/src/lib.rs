#![forbid(unsafe_code)]

//! Dynamic SVG stat cards for Monkeytype personal bests.
//!
//! One pipeline ([`pipeline::CardService`]) backs both the HTTP endpoint
//! ([`server`]) and the file generator ([`generate`]).

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod stats;
pub mod theme;
pub mod util;

pub use cli::{run, run_from_env};
