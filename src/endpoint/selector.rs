use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tracing::debug;
use tracing::trace;

use super::Endpoint;
use crate::Error;
use crate::Result;
use crate::DEFAULT_ENDPOINT_WEIGHT;

/// Weighted random choice among interchangeable discovery endpoints.
///
/// Failures halve the weight of the endpoint that served the cycle, a clean
/// cycle restores it to [`DEFAULT_ENDPOINT_WEIGHT`]. Traffic moves away
/// from a failing endpoint within `log2(DEFAULT_ENDPOINT_WEIGHT)` failed
/// cycles, but the weight floor of 1 means it is still retried now and then.
#[derive(Debug)]
pub struct EndpointSelector {
    pub(super) endpoints: Vec<Endpoint>,
    pub(super) current: Option<usize>,
    rng: StdRng,
}

impl EndpointSelector {
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        Self::with_rng(endpoints, StdRng::from_entropy())
    }

    /// Deterministic draws, used by tests and reproducible simulations
    pub fn with_seed(
        endpoints: Vec<Endpoint>,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(endpoints, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        endpoints: Vec<Endpoint>,
        rng: StdRng,
    ) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::InvalidConfig("at least one endpoint required".to_string()));
        }
        let endpoints = endpoints
            .into_iter()
            .map(|mut e| {
                e.weight = DEFAULT_ENDPOINT_WEIGHT;
                e
            })
            .collect();
        Ok(Self {
            endpoints,
            current: None,
            rng,
        })
    }

    /// Endpoint of the in-progress cycle, drawing one if none is selected yet
    pub fn current(&mut self) -> &Endpoint {
        if self.current.is_none() {
            self.reshuffle();
        }
        let idx = self.current.unwrap_or(0);
        &self.endpoints[idx]
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Draw the endpoint for the next cycle with probability `weight / total`.
    pub fn reshuffle(&mut self) {
        let total: u64 = self.endpoints.iter().map(|e| u64::from(e.weight)).sum();
        let draw = self.rng.gen_range(0..total);

        let mut acc = 0u64;
        let mut chosen = self.endpoints.len() - 1;
        for (idx, endpoint) in self.endpoints.iter().enumerate() {
            acc += u64::from(endpoint.weight);
            if acc > draw {
                chosen = idx;
                break;
            }
        }
        trace!(draw, total, endpoint = %self.endpoints[chosen], "reshuffle");
        self.current = Some(chosen);
    }

    /// current origin available, recover weight
    pub fn on_success(&mut self) {
        if let Some(idx) = self.current {
            self.endpoints[idx].weight = DEFAULT_ENDPOINT_WEIGHT;
        }
    }

    /// current origin unavailable, halve weight (never below 1)
    pub fn on_failure(&mut self) {
        if let Some(idx) = self.current {
            let endpoint = &mut self.endpoints[idx];
            endpoint.weight = (endpoint.weight / 2).max(1);
            debug!(endpoint = %endpoint, weight = endpoint.weight, "endpoint weight decreased");
        }
    }
}
