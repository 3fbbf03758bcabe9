pub mod client;
pub mod http;

pub use client::RewardApi;
pub use http::{ApiRequest, HttpRewardApi};
