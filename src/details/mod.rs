pub use ping_error::PingError;
pub(crate) use ping_receiver::PingReceiver;
pub use ping_result::PingResult;
pub(crate) use ping_sender::PingSender;
pub use statistics::PingStatistics;

pub(crate) mod icmp;
mod ping_error;
mod ping_receiver;
mod ping_result;
mod ping_sender;
pub(crate) mod records;
mod statistics;
