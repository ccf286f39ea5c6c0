use std::fmt;

/// Counters over a run of probes. Delays are in the run's configured unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PingStatistics {
    pub sent: u64,
    pub received: u64,
    pub lost: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    sum: f64,
}

impl PingStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_reply(&mut self, delay: f64) {
        self.sent += 1;
        self.received += 1;
        self.sum += delay;
        self.min = Some(self.min.map_or(delay, |min| min.min(delay)));
        self.max = Some(self.max.map_or(delay, |max| max.max(delay)));
    }

    pub(crate) fn record_lost(&mut self) {
        self.sent += 1;
        self.lost += 1;
    }

    /// Share of probes without a reply, in percent. 100 when nothing was sent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn loss_percent(&self) -> f64 {
        if self.sent == 0 {
            return 100.0;
        }
        self.lost as f64 / self.sent as f64 * 100.0
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        (self.received > 0).then(|| self.sum / self.received as f64)
    }
}

impl fmt::Display for PingStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} packets transmitted, {} received, {} lost ({:.1}% loss)",
            self.sent,
            self.received,
            self.lost,
            self.loss_percent()
        )?;
        match (self.min, self.max, self.average()) {
            (Some(min), Some(max), Some(average)) => {
                write!(f, "\nround-trip min/avg/max = {min:.3}/{average:.3}/{max:.3}")
            }
            _ => write!(f, "\nno replies, round-trip time unavailable"),
        }
    }
}
