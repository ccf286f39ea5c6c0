use crate::details::icmp::v4::Ttl;
use crate::details::{PingError, PingResult};
use pnet_packet::icmp::echo_reply::EchoReplyPacket;
use pnet_packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet_packet::icmp::{IcmpCode, IcmpType as PnetIcmpType};
use pnet_packet::ipv4::Ipv4Packet;
use std::net::Ipv4Addr;

pub(crate) const ICMP_HEADER_SIZE: usize = 8;
const IPV4_MIN_HEADER_SIZE: usize = 20;

/// ICMPv4 message types the receiver distinguishes.
pub(crate) struct IcmpType;

impl IcmpType {
    pub(crate) const ECHO_REPLY: u8 = 0;
    pub(crate) const DESTINATION_UNREACHABLE: u8 = 3;
    pub(crate) const ECHO_REQUEST: u8 = 8;
    pub(crate) const TIME_EXCEEDED: u8 = 11;

    /// Time Exceeded code "TTL expired in transit".
    pub(crate) const TTL_EXPIRED_IN_TRANSIT: u8 = 0;
}

/// Decoded fixed part of a received IPv4 header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IpHeader {
    pub version: u8,
    /// Header length in 32-bit words (IHL).
    pub header_length: u8,
    pub type_of_service: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags: u8,
    pub fragment_offset: u16,
    pub ttl: Ttl,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl IpHeader {
    pub(crate) fn decode(buf: &[u8]) -> PingResult<IpHeader> {
        let packet = Ipv4Packet::new(buf).ok_or_else(|| {
            PingError::decode(format!("IPv4 header needs {IPV4_MIN_HEADER_SIZE} bytes, got {}", buf.len()))
        })?;
        let header = IpHeader {
            version: packet.get_version(),
            header_length: packet.get_header_length(),
            type_of_service: (packet.get_dscp() << 2) | packet.get_ecn(),
            total_length: packet.get_total_length(),
            identification: packet.get_identification(),
            flags: packet.get_flags(),
            fragment_offset: packet.get_fragment_offset(),
            ttl: packet.get_ttl().into(),
            protocol: packet.get_next_level_protocol().0,
            checksum: packet.get_checksum(),
            source: packet.get_source(),
            destination: packet.get_destination(),
        };
        if header.version != 4 {
            return Err(PingError::decode(format!("not an IPv4 header (version {})", header.version)));
        }
        if header.size() < IPV4_MIN_HEADER_SIZE || header.size() > buf.len() {
            return Err(PingError::decode(format!(
                "IPv4 header length {} out of bounds for {} bytes",
                header.size(),
                buf.len()
            )));
        }
        Ok(header)
    }

    /// Header size in bytes, options included.
    #[must_use]
    pub fn size(&self) -> usize {
        usize::from(self.header_length) * 4
    }
}

/// Decoded ICMPv4 header, echo layout (identifier and sequence in bytes 4..8).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
}

impl IcmpHeader {
    pub(crate) fn echo_request(identifier: u16, sequence: u16) -> IcmpHeader {
        IcmpHeader { icmp_type: IcmpType::ECHO_REQUEST, code: 0, checksum: 0, identifier, sequence }
    }

    /// Writes the header into the first eight bytes of `buf`.
    pub(crate) fn encode_into(&self, buf: &mut [u8]) -> PingResult<()> {
        let len = buf.len();
        let mut packet = MutableEchoRequestPacket::new(buf)
            .ok_or_else(|| PingError::decode(format!("ICMP header needs {ICMP_HEADER_SIZE} bytes, got {len}")))?;
        packet.set_icmp_type(PnetIcmpType::new(self.icmp_type));
        packet.set_icmp_code(IcmpCode::new(self.code));
        packet.set_checksum(self.checksum);
        packet.set_identifier(self.identifier);
        packet.set_sequence_number(self.sequence);
        Ok(())
    }

    pub(crate) fn decode(buf: &[u8]) -> PingResult<IcmpHeader> {
        let packet = EchoReplyPacket::new(buf).ok_or_else(|| {
            PingError::decode(format!("ICMP header needs {ICMP_HEADER_SIZE} bytes, got {}", buf.len()))
        })?;
        Ok(IcmpHeader {
            icmp_type: packet.get_icmp_type().0,
            code: packet.get_icmp_code().0,
            checksum: packet.get_checksum(),
            identifier: packet.get_identifier(),
            sequence: packet.get_sequence_number(),
        })
    }

    /// Decodes the original IP and ICMP headers quoted in the payload of an
    /// ICMP error message.
    pub(crate) fn decode_embedded(icmp_payload: &[u8]) -> PingResult<(IpHeader, IcmpHeader)> {
        let ip_header = IpHeader::decode(icmp_payload)?;
        let icmp_header = IcmpHeader::decode(&icmp_payload[ip_header.size()..])?;
        Ok((ip_header, icmp_header))
    }
}
