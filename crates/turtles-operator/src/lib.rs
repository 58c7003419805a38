//! rancher-turtles operator: runs the CAPI cluster import controller

#![deny(missing_docs)]

pub mod config;
pub mod controller_runner;
