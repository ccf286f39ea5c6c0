use crate::details::icmp::v4::{
    unix_time_now, IcmpHeader, IcmpType, IpHeader, SequenceNumber, TSocket, Ttl, ICMP_HEADER_SIZE, TIMESTAMP_SIZE,
};
use crate::details::records::{PingReceiveRecord, PingReceiveRecordData};
use crate::details::PingResult;
use std::io;
use std::time::{Duration, Instant};

// Large enough for any reply on an Ethernet-sized path.
const RECV_BUFFER_SIZE: usize = 1500;
const ICMP_PROTOCOL: u8 = 1;

pub(crate) struct PingReceiver<'a, S> {
    socket: &'a S,
}

/// What one received datagram means for the outstanding request.
#[derive(Debug, PartialEq)]
enum Verdict {
    Skip(String),
    Reply { ttl: Option<Ttl>, send_time: f64 },
    Final(PingReceiveRecord),
}

impl<'a, S> PingReceiver<'a, S>
where
    S: TSocket,
{
    pub(crate) fn new(socket: &'a S) -> Self {
        PingReceiver { socket }
    }

    /// Reads datagrams until the reply to (`identifier`, `sequence_number`)
    /// or an ICMP error about it arrives, or until `timeout` has passed.
    /// Anything else received in the meantime is logged and dropped.
    pub(crate) fn receive(
        &self,
        identifier: u16,
        sequence_number: SequenceNumber,
        timeout: Duration,
    ) -> PingResult<PingReceiveRecord> {
        let identifier = self.socket.kernel_identifier().unwrap_or(identifier);
        let has_ip_header = self.socket.has_ip_header();
        // No deadline when the timeout reaches past what `Instant` can represent.
        let deadline = Instant::now().checked_add(timeout);
        let mut buf = [0u8; RECV_BUFFER_SIZE];

        loop {
            let time_left = deadline.map_or(timeout, |deadline| deadline.saturating_duration_since(Instant::now()));
            if time_left.is_zero() {
                tracing::debug!("no reply to id={identifier} seq={sequence_number} within {timeout:?}");
                return Ok(PingReceiveRecord::Timeout);
            }
            tracing::trace!("waiting up to {time_left:?} for a reply");

            let (package_size, ip_addr) = match self.socket.recv_from(&mut buf, time_left) {
                Ok(received) => received,
                Err(error) if matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    tracing::debug!("no reply to id={identifier} seq={sequence_number} within {timeout:?}");
                    return Ok(PingReceiveRecord::Timeout);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {
                    tracing::trace!("wait interrupted, retrying");
                    continue;
                }
                Err(error) => return Err(error.into()),
            };
            let receive_time = unix_time_now();

            match inspect(&buf[..package_size], has_ip_header, identifier, sequence_number.into()) {
                Verdict::Skip(reason) => {
                    tracing::debug!("skipping {package_size} bytes from {ip_addr}: {reason}");
                }
                Verdict::Reply { ttl, send_time } => {
                    let round_trip = receive_time - send_time;
                    tracing::trace!("matching reply from {ip_addr}");
                    return Ok(PingReceiveRecord::Data(PingReceiveRecordData {
                        package_size,
                        ip_addr,
                        ttl,
                        sequence_number,
                        round_trip,
                    }));
                }
                Verdict::Final(record) => {
                    tracing::debug!("error reply from {ip_addr}: {record:?}");
                    return Ok(record);
                }
            }
        }
    }
}

fn inspect(datagram: &[u8], has_ip_header: bool, identifier: u16, sequence: u16) -> Verdict {
    let (ip_header, icmp_offset) = if has_ip_header {
        match IpHeader::decode(datagram) {
            Ok(ip_header) => (Some(ip_header), ip_header.size()),
            Err(error) => return Verdict::Skip(error.to_string()),
        }
    } else {
        (None, 0)
    };
    let icmp = &datagram[icmp_offset..];
    let icmp_header = match IcmpHeader::decode(icmp) {
        Ok(icmp_header) => icmp_header,
        Err(error) => return Verdict::Skip(error.to_string()),
    };
    let icmp_payload = &icmp[ICMP_HEADER_SIZE..];

    match icmp_header.icmp_type {
        IcmpType::DESTINATION_UNREACHABLE | IcmpType::TIME_EXCEEDED => {
            // Error messages quote the request they are about; the header's
            // own identifier and sequence fields are unused.
            if let Ok((quoted_ip_header, original)) = IcmpHeader::decode_embedded(icmp_payload) {
                if quoted_ip_header.protocol != ICMP_PROTOCOL {
                    return Verdict::Skip(format!(
                        "ICMP error (type {}) about a protocol {} packet",
                        icmp_header.icmp_type, quoted_ip_header.protocol
                    ));
                }
                if original.identifier != identifier || original.sequence != sequence {
                    return Verdict::Skip(format!(
                        "ICMP error (type {}) about id={} seq={}",
                        icmp_header.icmp_type, original.identifier, original.sequence
                    ));
                }
            }
            if icmp_header.icmp_type == IcmpType::DESTINATION_UNREACHABLE
                || icmp_header.code == IcmpType::TTL_EXPIRED_IN_TRANSIT
            {
                Verdict::Final(PingReceiveRecord::DestinationUnreachable { ip_header, icmp_header })
            } else {
                Verdict::Final(PingReceiveRecord::TimeToLiveExpired { ip_header, icmp_header })
            }
        }
        IcmpType::ECHO_REQUEST if icmp_header.identifier == identifier => {
            Verdict::Skip("our own echo request".to_owned())
        }
        _ if icmp_header.identifier != identifier => {
            Verdict::Skip(format!("identifier {} is not ours ({identifier})", icmp_header.identifier))
        }
        _ if icmp_header.sequence != sequence => {
            Verdict::Skip(format!("sequence {} is not the outstanding one ({sequence})", icmp_header.sequence))
        }
        IcmpType::ECHO_REPLY if icmp_header.code == 0 => match icmp_payload.get(..TIMESTAMP_SIZE) {
            Some(bytes) => {
                let mut timestamp = [0u8; TIMESTAMP_SIZE];
                timestamp.copy_from_slice(bytes);
                Verdict::Reply { ttl: ip_header.map(|ip_header| ip_header.ttl), send_time: f64::from_be_bytes(timestamp) }
            }
            None => Verdict::Skip(format!("echo reply payload of {} bytes has no timestamp", icmp_payload.len())),
        },
        _ => Verdict::Skip(format!("unexpected ICMP type {} code {}", icmp_header.icmp_type, icmp_header.code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::icmp::v4::ipv4_datagram;
    use crate::details::icmp::v4::tests::{echo_reply, icmp_message, timestamp_payload, OnReceive, OnSend, SocketMock};
    use more_asserts as ma;
    use std::net::{IpAddr, Ipv4Addr};

    const ID: u16 = 1234;
    const SEQ: u16 = 1;
    const ROUTER: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 254);

    fn timeout() -> Duration {
        Duration::from_secs(1)
    }

    fn reply(identifier: u16, sequence: u16, sent_at: f64) -> OnReceive {
        OnReceive::Datagram(ipv4_datagram(
            Ipv4Addr::LOCALHOST,
            64,
            &echo_reply(identifier, sequence, &timestamp_payload(sent_at)),
        ))
    }

    fn icmp_error(icmp_type: u8, code: u8, identifier: u16, sequence: u16) -> OnReceive {
        let original_request = icmp_message(IcmpType::ECHO_REQUEST, 0, identifier, sequence, &timestamp_payload(0.0));
        let quoted = ipv4_datagram(Ipv4Addr::LOCALHOST, 1, &original_request[..ICMP_HEADER_SIZE]);
        OnReceive::Datagram(ipv4_datagram(ROUTER, 250, &icmp_message(icmp_type, code, 0, 0, &quoted)))
    }

    fn receive(socket: &SocketMock) -> PingReceiveRecord {
        PingReceiver::new(socket).receive(ID, SequenceNumber::from(SEQ), timeout()).unwrap()
    }

    fn round_trip_of(record: PingReceiveRecord) -> f64 {
        match record {
            PingReceiveRecord::Data(data) => data.round_trip,
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    #[test]
    fn matching_reply_yields_round_trip() {
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![reply(ID, SEQ, unix_time_now() - 0.25)]);

        let record = receive(&socket);

        let PingReceiveRecord::Data(data) = record else { panic!("expected a reply, got {record:?}") };
        ma::assert_ge!(data.round_trip, 0.25);
        ma::assert_lt!(data.round_trip, 1.25);
        assert_eq!(Some(Ttl(64)), data.ttl);
        assert_eq!(IpAddr::V4(Ipv4Addr::LOCALHOST), data.ip_addr);
        assert_eq!(SequenceNumber::from(SEQ), data.sequence_number);
        socket.should_receive_number_of_messages(1);
    }

    #[test]
    fn nothing_ready_is_a_timeout() {
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![OnReceive::ReturnWouldBlock]);
        assert_eq!(PingReceiveRecord::Timeout, receive(&socket));
    }

    #[test]
    fn platform_timeout_error_is_a_timeout() {
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![OnReceive::ReturnErr(io::ErrorKind::TimedOut)]);
        assert_eq!(PingReceiveRecord::Timeout, receive(&socket));
    }

    #[test]
    fn other_socket_errors_are_returned() {
        let socket =
            SocketMock::new(OnSend::ReturnDefault, vec![OnReceive::ReturnErr(io::ErrorKind::ConnectionRefused)]);
        let result = PingReceiver::new(&socket).receive(ID, SequenceNumber::from(SEQ), timeout());
        assert!(result.is_err());
    }

    #[test]
    fn interrupted_wait_is_retried() {
        let socket = SocketMock::new(
            OnSend::ReturnDefault,
            vec![OnReceive::ReturnErr(io::ErrorKind::Interrupted), reply(ID, SEQ, unix_time_now())],
        );

        round_trip_of(receive(&socket));

        socket.should_receive_number_of_messages(1);
    }

    #[test]
    fn unrepresentable_deadline_waits_without_one() {
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![reply(ID, SEQ, unix_time_now())]);

        let record = PingReceiver::new(&socket).receive(ID, SequenceNumber::from(SEQ), Duration::MAX).unwrap();

        round_trip_of(record);
    }

    #[test]
    fn unrepresentable_deadline_still_reports_socket_timeout() {
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![OnReceive::ReturnWouldBlock]);

        let record = PingReceiver::new(&socket).receive(ID, SequenceNumber::from(SEQ), Duration::MAX).unwrap();

        assert_eq!(PingReceiveRecord::Timeout, record);
    }

    #[test]
    fn wrong_sequence_is_skipped_for_the_matching_reply() {
        let now = unix_time_now();
        let socket =
            SocketMock::new(OnSend::ReturnDefault, vec![reply(ID, SEQ + 1, now - 5.0), reply(ID, SEQ, now - 0.1)]);

        let round_trip = round_trip_of(receive(&socket));

        ma::assert_ge!(round_trip, 0.1);
        ma::assert_lt!(round_trip, 1.1);
        socket.should_receive_number_of_messages(2);
    }

    #[test]
    fn wrong_identifier_is_skipped() {
        let now = unix_time_now();
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![reply(ID + 1, SEQ, now), reply(ID, SEQ, now)]);

        round_trip_of(receive(&socket));

        socket.should_receive_number_of_messages(2);
    }

    #[test]
    fn own_echo_request_is_skipped() {
        let now = unix_time_now();
        let own_request = ipv4_datagram(
            Ipv4Addr::LOCALHOST,
            64,
            &icmp_message(IcmpType::ECHO_REQUEST, 0, ID, SEQ, &timestamp_payload(now)),
        );
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![OnReceive::Datagram(own_request), reply(ID, SEQ, now)]);

        round_trip_of(receive(&socket));

        socket.should_receive_number_of_messages(2);
    }

    #[test]
    fn unexpected_type_is_skipped() {
        let now = unix_time_now();
        let redirect = ipv4_datagram(ROUTER, 64, &icmp_message(5, 1, ID, SEQ, &timestamp_payload(now)));
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![OnReceive::Datagram(redirect)]);

        assert_eq!(PingReceiveRecord::Timeout, receive(&socket));
        socket.should_receive_number_of_messages(1);
    }

    #[test]
    fn malformed_datagrams_are_skipped() {
        let now = unix_time_now();
        let truncated = ipv4_datagram(Ipv4Addr::LOCALHOST, 64, &[0, 0, 0]);
        let no_timestamp = ipv4_datagram(Ipv4Addr::LOCALHOST, 64, &echo_reply(ID, SEQ, &[0x51; 4]));
        let socket = SocketMock::new(
            OnSend::ReturnDefault,
            vec![
                OnReceive::Datagram(vec![0x45; 10]),
                OnReceive::Datagram(truncated),
                OnReceive::Datagram(no_timestamp),
                reply(ID, SEQ, now),
            ],
        );

        round_trip_of(receive(&socket));

        socket.should_receive_number_of_messages(4);
    }

    #[test]
    fn destination_unreachable_about_our_request() {
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![icmp_error(3, 1, ID, SEQ)]);

        let record = receive(&socket);

        let PingReceiveRecord::DestinationUnreachable { ip_header, icmp_header } = record else {
            panic!("expected destination unreachable, got {record:?}")
        };
        assert_eq!(Some(ROUTER), ip_header.map(|ip_header| ip_header.source));
        assert_eq!((3, 1), (icmp_header.icmp_type, icmp_header.code));
    }

    #[test]
    fn error_about_another_request_is_skipped() {
        let socket = SocketMock::new(
            OnSend::ReturnDefault,
            vec![icmp_error(3, 1, ID, SEQ + 1), icmp_error(11, 0, ID + 1, SEQ), reply(ID, SEQ, unix_time_now())],
        );

        round_trip_of(receive(&socket));

        socket.should_receive_number_of_messages(3);
    }

    #[test]
    fn error_about_a_non_icmp_packet_is_skipped() {
        let mut udp_header = [0u8; ICMP_HEADER_SIZE];
        // Bytes 4..8 of a UDP header are length and checksum; make them look like our id/seq.
        udp_header[4..6].copy_from_slice(&ID.to_be_bytes());
        udp_header[6..8].copy_from_slice(&SEQ.to_be_bytes());
        let mut quoted = ipv4_datagram(Ipv4Addr::LOCALHOST, 1, &udp_header);
        quoted[9] = 17;
        let error = ipv4_datagram(ROUTER, 250, &icmp_message(3, 3, 0, 0, &quoted));
        let socket = SocketMock::new(
            OnSend::ReturnDefault,
            vec![OnReceive::Datagram(error), reply(ID, SEQ, unix_time_now())],
        );

        round_trip_of(receive(&socket));

        socket.should_receive_number_of_messages(2);
    }

    #[test]
    fn ttl_expired_in_transit_is_destination_unreachable() {
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![icmp_error(11, 0, ID, SEQ)]);
        assert!(matches!(receive(&socket), PingReceiveRecord::DestinationUnreachable { .. }));
    }

    #[test]
    fn other_time_exceeded_codes_are_ttl_expired() {
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![icmp_error(11, 1, ID, SEQ)]);
        assert!(matches!(receive(&socket), PingReceiveRecord::TimeToLiveExpired { .. }));
    }

    #[test]
    fn error_without_quoted_request_is_final() {
        let bare = ipv4_datagram(ROUTER, 250, &icmp_message(3, 3, 0, 0, &[]));
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![OnReceive::Datagram(bare)]);
        assert!(matches!(receive(&socket), PingReceiveRecord::DestinationUnreachable { .. }));
    }

    #[test]
    fn dgram_socket_matches_kernel_identifier_without_ip_header() {
        let kernel_identifier = 40_000;
        let now = unix_time_now();
        let socket = SocketMock::new(
            OnSend::ReturnDefault,
            vec![
                OnReceive::Datagram(echo_reply(ID, SEQ, &timestamp_payload(now))),
                OnReceive::Datagram(echo_reply(kernel_identifier, SEQ, &timestamp_payload(now))),
            ],
        )
        .dgram(kernel_identifier);

        let record = receive(&socket);

        let PingReceiveRecord::Data(data) = record else { panic!("expected a reply, got {record:?}") };
        assert_eq!(None, data.ttl);
        socket.should_receive_number_of_messages(2);
    }

    #[test]
    fn endless_noise_still_times_out() {
        let noise = ipv4_datagram(Ipv4Addr::LOCALHOST, 64, &echo_reply(ID + 1, SEQ, &timestamp_payload(0.0)));
        let socket = SocketMock::new(OnSend::ReturnDefault, vec![OnReceive::RepeatDatagram(noise)]);
        let timeout = Duration::from_millis(20);

        let start = Instant::now();
        let record = PingReceiver::new(&socket).receive(ID, SequenceNumber::from(SEQ), timeout).unwrap();

        assert_eq!(PingReceiveRecord::Timeout, record);
        ma::assert_ge!(start.elapsed(), timeout);
        ma::assert_lt!(start.elapsed(), timeout + Duration::from_secs(1));
    }

    #[test]
    fn inspect_echo_reply_with_wrong_code_is_skipped() {
        let datagram = ipv4_datagram(Ipv4Addr::LOCALHOST, 64, &icmp_message(0, 3, ID, SEQ, &timestamp_payload(0.0)));
        assert!(matches!(inspect(&datagram, true, ID, SEQ), Verdict::Skip(_)));
    }
}
