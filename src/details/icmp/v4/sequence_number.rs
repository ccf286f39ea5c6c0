type SequenceNumberInnerType = u16;

/// ICMP echo sequence number of one probe.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct SequenceNumber(SequenceNumberInnerType);

impl SequenceNumber {
    fn start_value_inner_type() -> SequenceNumberInnerType {
        // A single ping uses sequence number 1 unless told otherwise.
        SequenceNumberInnerType::from(1u8)
    }

    #[must_use]
    pub fn start_value() -> SequenceNumber {
        SequenceNumber(Self::start_value_inner_type())
    }

    /// Sequence number of the `index`-th probe in a run, wrapping at 2^16.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_probe_index(index: u64) -> SequenceNumber {
        SequenceNumber(index as SequenceNumberInnerType)
    }
}

impl Default for SequenceNumber {
    fn default() -> Self {
        Self::start_value()
    }
}

impl From<SequenceNumber> for SequenceNumberInnerType {
    fn from(value: SequenceNumber) -> Self {
        value.0
    }
}

impl From<SequenceNumberInnerType> for SequenceNumber {
    fn from(value: SequenceNumberInnerType) -> Self {
        SequenceNumber(value)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
