pub mod adapter;
pub mod cli;
pub mod config;
pub mod observe;
pub mod transport;

pub use {
    adapter::{Adapter, Registry},
    config::Config,
    transport::Transport,
};
