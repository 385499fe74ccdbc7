//! `CosmoOptions` — the cycle timing and endpoint knobs, bundled as a single
//! `Default`-carrying struct with a builder for overrides.

use std::time::Duration;

/// Tunable timing constants for the session worker.
#[derive(Debug, Clone)]
pub struct CosmoOptions {
    /// Base interval between poll cycles.
    pub cycle_base: Duration,
    /// Divisor applied to `cycle_base` to bound the per-cycle jitter:
    /// jitter is uniform in `[0, cycle_base / stagger_factor)`.
    pub stagger_factor: u32,
    /// How long without a successful cycle before firing `disconnect`.
    pub connect_timeout: Duration,
    /// Per-HTTP-request timeout, handed to the transport.
    pub request_timeout: Duration,
}

impl Default for CosmoOptions {
    fn default() -> Self {
        Self {
            cycle_base: Duration::from_secs(10),
            stagger_factor: 10,
            connect_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl CosmoOptions {
    pub fn builder() -> CosmoOptionsBuilder {
        CosmoOptionsBuilder::default()
    }

    /// The jitter ceiling implied by `cycle_base` / `stagger_factor`.
    pub fn jitter_ceiling(&self) -> Duration {
        self.cycle_base / self.stagger_factor.max(1)
    }
}

/// Builder for [`CosmoOptions`] — plain field setters over `Default::default()`.
#[derive(Debug, Clone, Default)]
pub struct CosmoOptionsBuilder {
    options: OptBuilderState,
}

#[derive(Debug, Clone, Default)]
struct OptBuilderState {
    cycle_base: Option<Duration>,
    stagger_factor: Option<u32>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl CosmoOptionsBuilder {
    pub fn cycle_base(mut self, d: Duration) -> Self {
        self.options.cycle_base = Some(d);
        self
    }

    pub fn stagger_factor(mut self, f: u32) -> Self {
        self.options.stagger_factor = Some(f);
        self
    }

    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.options.connect_timeout = Some(d);
        self
    }

    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.options.request_timeout = Some(d);
        self
    }

    pub fn build(self) -> CosmoOptions {
        let defaults = CosmoOptions::default();
        CosmoOptions {
            cycle_base: self.options.cycle_base.unwrap_or(defaults.cycle_base),
            stagger_factor: self.options.stagger_factor.unwrap_or(defaults.stagger_factor),
            connect_timeout: self.options.connect_timeout.unwrap_or(defaults.connect_timeout),
            request_timeout: self.options.request_timeout.unwrap_or(defaults.request_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let opts = CosmoOptions::default();
        assert_eq!(opts.cycle_base, Duration::from_secs(10));
        assert_eq!(opts.stagger_factor, 10);
        assert_eq!(opts.connect_timeout, Duration::from_secs(60));
        assert_eq!(opts.jitter_ceiling(), Duration::from_secs(1));
    }

    #[test]
    fn builder_overrides_only_specified_fields() {
        let opts = CosmoOptions::builder()
            .cycle_base(Duration::from_secs(5))
            .build();
        assert_eq!(opts.cycle_base, Duration::from_secs(5));
        assert_eq!(opts.connect_timeout, Duration::from_secs(60));
    }
}
