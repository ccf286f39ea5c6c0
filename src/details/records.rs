use crate::details::icmp::v4::{IcmpHeader, IpHeader, SequenceNumber, Ttl};
use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug, PartialEq)]
pub(crate) struct PingSendRecord {
    pub package_size: usize,
    pub ip_addr: Ipv4Addr,
    pub identifier: u16,
    pub sequence_number: SequenceNumber,
    /// Seconds since the Unix epoch, as embedded in the payload.
    pub send_time: f64,
}

#[derive(Debug, PartialEq)]
pub(crate) enum PingReceiveRecord {
    Timeout,
    Data(PingReceiveRecordData),
    DestinationUnreachable { ip_header: Option<IpHeader>, icmp_header: IcmpHeader },
    TimeToLiveExpired { ip_header: Option<IpHeader>, icmp_header: IcmpHeader },
}

#[derive(Debug, PartialEq)]
pub(crate) struct PingReceiveRecordData {
    pub package_size: usize,
    pub ip_addr: IpAddr,
    /// Absent when the socket does not deliver the IP header.
    pub ttl: Option<Ttl>,
    pub sequence_number: SequenceNumber,
    /// Receive time minus the send time echoed back in the payload, in seconds.
    pub round_trip: f64,
}
