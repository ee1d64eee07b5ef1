//! Test cases.

mod example_config;
mod isolation;
mod ranking;
mod scenario;
