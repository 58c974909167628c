#![doc = "dirdoc-core: core pipeline library for dirdoc."]

//! This crate contains the scanning, staleness, generation and persistence
//! logic for dirdoc. CLI argument parsing, configuration files and logger
//! installation live in the `dirdoc` binary crate.
//!
//! # Usage
//! Build a [`failover::FailoverClient`] from one or more provider tiers
//! (see [`providers::build_tiers`]) and drive a run with
//! [`orchestrate::run`].

pub mod artifact;
pub mod config;
pub mod contract;
pub mod failover;
pub mod gather;
pub mod orchestrate;
pub mod prompt;
pub mod providers;
pub mod scan;
pub mod staleness;
