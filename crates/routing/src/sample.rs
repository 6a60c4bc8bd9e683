//! Percent sample gate

use rand::Rng;

/// Uniform accept/reject gate parameterised by percent
///
/// Draws come from the thread-local generator, which is seeded once from
/// the OS per thread - never reseeded per draw. 0 and 100 short-circuit
/// without touching the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleGate {
    percent: u8,
}

impl SampleGate {
    /// Create a gate passing `percent` of events; values above 100 clamp
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
        }
    }

    /// The configured percentage
    #[inline]
    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Whether the gate passes everything
    #[inline]
    pub fn is_open(&self) -> bool {
        self.percent == 100
    }

    /// Draw once: forward iff a uniform integer in `[0, 100)` is below
    /// the configured percent
    #[inline]
    pub fn accept(&self) -> bool {
        match self.percent {
            100 => true,
            0 => false,
            p => rand::thread_rng().gen_range(0..100) < i32::from(p),
        }
    }
}

impl Default for SampleGate {
    /// Forward everything
    fn default() -> Self {
        Self { percent: 100 }
    }
}
