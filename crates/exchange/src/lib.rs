pub mod domain;
pub mod infra;
mod run;
mod util;


pub use {
    domain::{
        Deadline,
        auction::{AuctionRequest, AuctionResult, Exchange},
    },
    run::{exchange, start},
};
