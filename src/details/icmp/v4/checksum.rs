/// Internet checksum (RFC 1071) over `data`.
///
/// Bytes are summed as big-endian 16-bit words. A trailing odd byte is
/// treated as the high half of a word whose low half is zero. Carries are
/// folded back in until the sum fits 16 bits and the one's complement of the
/// result is returned.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn checksum(data: &[u8]) -> u16 {
    let mut sum: u64 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u64::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u64::from(*last) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
