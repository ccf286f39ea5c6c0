use crate::details::icmp::v4::{checksum, IcmpHeader, SequenceNumber, ICMP_HEADER_SIZE};
use crate::details::PingResult;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

/// The send time travels in the payload as a big-endian `f64` of seconds.
pub(crate) const TIMESTAMP_SIZE: usize = 8;
const PADDING_BYTE: u8 = b'Q';

/// Echo identifier for the calling thread: process id xor thread id, low 16 bits.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn identifier() -> u16 {
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    let thread_id = hasher.finish();
    ((u64::from(std::process::id()) ^ thread_id) & 0xffff) as u16
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_time_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0.0, |elapsed| elapsed.as_secs_f64())
}

/// Builds an echo request: header, then the send timestamp, then `size - 8`
/// padding bytes. Sizes below eight still carry the whole timestamp.
pub(crate) fn new_icmpv4_package(identifier: u16, sequence_number: SequenceNumber, size: usize) -> PingResult<Vec<u8>> {
    let padding = size.saturating_sub(TIMESTAMP_SIZE);
    let mut package = vec![PADDING_BYTE; ICMP_HEADER_SIZE + TIMESTAMP_SIZE + padding];
    package[ICMP_HEADER_SIZE..ICMP_HEADER_SIZE + TIMESTAMP_SIZE].copy_from_slice(&unix_time_now().to_be_bytes());

    let mut header = IcmpHeader::echo_request(identifier, sequence_number.into());
    header.encode_into(&mut package)?;
    header.checksum = checksum(&package);
    header.encode_into(&mut package)?;
    Ok(package)
}
