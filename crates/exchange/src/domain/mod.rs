pub mod aggregation;
pub mod auction;
pub mod currency;
pub mod fanout;
pub mod hooks;
pub mod time;

pub use {
    auction::{AdapterName, AuctionRequest, Exchange, ImpressionId, TypedBid},
    currency::Currency,
    time::Deadline,
};
