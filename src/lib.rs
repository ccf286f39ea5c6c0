#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub use details::icmp::v4::{IcmpHeader, IpHeader, SequenceNumber, Ttl};
pub use details::{PingError, PingResult, PingStatistics};
pub use echo_ping::*;

mod details;
mod echo_ping;
