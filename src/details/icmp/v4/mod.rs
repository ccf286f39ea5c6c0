mod checksum;
pub(crate) use checksum::checksum;

mod headers;
pub use headers::{IcmpHeader, IpHeader};
pub(crate) use headers::{IcmpType, ICMP_HEADER_SIZE};
#[cfg(test)]
pub(crate) use headers::tests::ipv4_datagram;

mod icmpv4;
pub(crate) use icmpv4::{identifier, new_icmpv4_package, unix_time_now, TIMESTAMP_SIZE};

mod sequence_number;
pub use sequence_number::SequenceNumber;

mod socket;
pub(crate) use socket::{Socket, TSocket};
#[cfg(test)]
pub(crate) use socket::tests;

mod ttl;
pub use ttl::Ttl;
