//! The pluggable congestion and retransmission policy.
//!
//! The fast path only maintains the inputs of a policy (acknowledged bytes, ECN marked bytes, round
//! trip samples, duplicate acknowledgements) and the one output register, the flow's transmit
//! rate. The algorithm deciding the rate runs elsewhere, typically in the slow path on a timer,
//! and reads the counters from the flow record. A policy implemented here is the in-line part.
use crate::flow::FlowId;

/// Inputs of one acknowledgement that released data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AckSample {
    /// Newly acknowledged bytes.
    pub acked: u32,
    /// Of these, the bytes the peer echoed a congestion mark for.
    pub ecn_bytes: u32,
    /// The round trip time measured by this acknowledgement in microseconds.
    pub rtt: Option<u32>,
    /// The smoothed estimate after including `rtt`.
    pub rtt_est: u32,
}

/// In-line congestion reaction of the fast path.
pub trait CongestionPolicy {
    /// React to acknowledged data, possibly adjusting the flow's rate register.
    fn on_ack(&mut self, flow: FlowId, sample: &AckSample, rate: &mut u32);

    /// Whether `dupacks` duplicate acknowledgements in a row trigger going back to the first
    /// unacknowledged byte.
    fn fast_retransmit(&mut self, flow: FlowId, dupacks: u32) -> bool {
        let _ = flow;
        dupacks == 3
    }
}

/// Leave the rate as installed, or pin it to one value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedRate {
    /// The pinned rate in kbps, `None` keeps each flow's rate.
    pub rate: Option<u32>,
}

impl CongestionPolicy for FixedRate {
    fn on_ack(&mut self, _: FlowId, _: &AckSample, rate: &mut u32) {
        if let Some(fixed) = self.rate {
            *rate = fixed;
        }
    }
}

impl<P: CongestionPolicy + ?Sized> CongestionPolicy for &'_ mut P {
    fn on_ack(&mut self, flow: FlowId, sample: &AckSample, rate: &mut u32) {
        (**self).on_ack(flow, sample, rate)
    }

    fn fast_retransmit(&mut self, flow: FlowId, dupacks: u32) -> bool {
        (**self).fast_retransmit(flow, dupacks)
    }
}

/// Fold a round trip sample into the smoothed estimate, weighting the old estimate by 7/8.
pub fn smooth_rtt(estimate: u32, sample: u32) -> u32 {
    if estimate == 0 {
        return sample;
    }
    ((u64::from(estimate) * 7 + u64::from(sample)) / 8) as u32
}
