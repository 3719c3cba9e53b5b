#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod formats;
pub mod library;
pub mod logging;
pub mod manifest;
pub mod parser;
pub mod probe;
pub mod query;
pub mod source;
pub mod split;

#[cfg(test)]
mod testing;
