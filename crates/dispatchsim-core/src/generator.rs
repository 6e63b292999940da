//! Request generators.
//!
//! Every generator is an `Iterator<Item = Request>`: `None` marks the end of
//! the stream. Ids are assigned `0, 1, 2, ...` in production order.

use crate::config::{ArrivalProcess, WorkloadConfig};
use crate::trace::{load_trace, TraceError, TraceRecord};
use crate::zipf::{ZipfError, ZipfSampler};
use dispatchsim_schedulers::Request;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Failed to load trace: {0}")]
    Trace(#[from] TraceError),
    #[error("Invalid zipf parameters: {0}")]
    Zipf(#[from] ZipfError),
    #[error("Trace record {index} arrives at {arrived_at}s, which is not finite after scaling by {time_scale}")]
    ScaledArrival {
        index: usize,
        arrived_at: f64,
        time_scale: f64,
    },
}

/// Boxed request stream.
pub type RequestStream = Box<dyn Iterator<Item = Request> + Send>;

/// Arrival times starting at t = 0.
#[derive(Debug, Clone)]
pub struct ArrivalTimes {
    process: ArrivalProcess,
    qps: f64,
    rng: ChaCha8Rng,
    emitted: u64,
    last: f64,
}

impl ArrivalTimes {
    pub fn new(process: ArrivalProcess, qps: f64, seed: u64) -> Self {
        assert!(qps.is_finite() && qps > 0.0, "qps must be > 0");
        Self {
            process,
            qps,
            rng: ChaCha8Rng::seed_from_u64(seed),
            emitted: 0,
            last: 0.0,
        }
    }

    /// Next arrival time in seconds.
    pub fn next_arrival(&mut self) -> f64 {
        let t = if self.emitted == 0 {
            0.0
        } else {
            match self.process {
                ArrivalProcess::Static => self.emitted as f64 / self.qps,
                ArrivalProcess::Poisson => {
                    // Inverse CDF of the exponential distribution; 1 - u is in (0, 1].
                    let u: f64 = self.rng.gen();
                    self.last - (1.0 - u).ln() / self.qps
                }
            }
        };
        self.emitted += 1;
        self.last = t;
        t
    }
}

/// Uniform request sizes in `[min_tokens, max_tokens]`.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    arrivals: ArrivalTimes,
    rng: ChaCha8Rng,
    min_tokens: u32,
    max_tokens: u32,
    num_requests: u64,
    next_id: u64,
}

impl SyntheticGenerator {
    pub fn new(
        num_requests: u64,
        arrivals: ArrivalTimes,
        min_tokens: u32,
        max_tokens: u32,
        seed: u64,
    ) -> Self {
        assert!(min_tokens <= max_tokens, "min_tokens must not exceed max_tokens");
        Self {
            arrivals,
            // Separate stream so sizes do not shift when the arrival process changes.
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
            min_tokens,
            max_tokens,
            num_requests,
            next_id: 0,
        }
    }
}

impl Iterator for SyntheticGenerator {
    type Item = Request;

    fn next(&mut self) -> Option<Request> {
        if self.next_id >= self.num_requests {
            return None;
        }
        let arrived_at = self.arrivals.next_arrival();
        let input = self.rng.gen_range(self.min_tokens..=self.max_tokens);
        let output = self.rng.gen_range(self.min_tokens..=self.max_tokens);
        let request = Request::new(self.next_id, arrived_at, input, output);
        self.next_id += 1;
        Some(request)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.num_requests - self.next_id) as usize;
        (left, Some(left))
    }
}

/// Zipf-distributed request sizes. Prefill is drawn before decode.
pub struct ZipfianGenerator {
    arrivals: ArrivalTimes,
    sampler: ZipfSampler,
    num_requests: u64,
    next_id: u64,
}

impl ZipfianGenerator {
    pub fn new(num_requests: u64, arrivals: ArrivalTimes, sampler: ZipfSampler) -> Self {
        Self {
            arrivals,
            sampler,
            num_requests,
            next_id: 0,
        }
    }
}

impl Iterator for ZipfianGenerator {
    type Item = Request;

    fn next(&mut self) -> Option<Request> {
        if self.next_id >= self.num_requests {
            return None;
        }
        let arrived_at = self.arrivals.next_arrival();
        let prefill = self.sampler.sample();
        let decode = self.sampler.sample();
        let request = Request::new(self.next_id, arrived_at, prefill, decode);
        self.next_id += 1;
        Some(request)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.num_requests - self.next_id) as usize;
        (left, Some(left))
    }
}

/// Replays trace records in arrival order.
pub struct TraceReplay {
    records: std::vec::IntoIter<TraceRecord>,
    time_scale: f64,
    next_id: u64,
}

impl TraceReplay {
    /// `records` must already be sorted by arrival, as `load_trace` returns them.
    ///
    /// Fails if any replayed arrival overflows once scaled.
    pub fn new(
        records: Vec<TraceRecord>,
        time_scale: f64,
        max_requests: Option<u64>,
    ) -> Result<Self, GeneratorError> {
        let mut records = records;
        if let Some(cap) = max_requests {
            records.truncate(cap.min(records.len() as u64) as usize);
        }
        if let Some(index) = records
            .iter()
            .position(|r| !(r.arrived_at * time_scale).is_finite())
        {
            return Err(GeneratorError::ScaledArrival {
                index,
                arrived_at: records[index].arrived_at,
                time_scale,
            });
        }
        Ok(Self {
            records: records.into_iter(),
            time_scale,
            next_id: 0,
        })
    }
}

impl Iterator for TraceReplay {
    type Item = Request;

    fn next(&mut self) -> Option<Request> {
        let record = self.records.next()?;
        let request = Request::new(
            self.next_id,
            record.arrived_at * self.time_scale,
            record.num_prefill_tokens,
            record.num_decode_tokens,
        );
        self.next_id += 1;
        Some(request)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

/// Build the request stream described by a workload configuration.
///
/// `seed` is used by every random source that does not carry its own.
pub fn generator_from_config(
    workload: &WorkloadConfig,
    seed: u64,
) -> Result<RequestStream, GeneratorError> {
    let stream: RequestStream = match workload {
        WorkloadConfig::Synthetic {
            num_requests,
            qps,
            arrival_process,
            min_tokens,
            max_tokens,
        } => Box::new(SyntheticGenerator::new(
            *num_requests,
            ArrivalTimes::new(*arrival_process, *qps, seed),
            *min_tokens,
            *max_tokens,
            seed,
        )),
        WorkloadConfig::Zipfian {
            num_requests,
            qps,
            arrival_process,
            min_tokens,
            max_tokens,
            theta,
            scramble,
            seed: zipf_seed,
        } => {
            let sampler = ZipfSampler::new(
                *min_tokens,
                *max_tokens,
                *theta,
                *scramble,
                zipf_seed.unwrap_or(seed),
            )?;
            Box::new(ZipfianGenerator::new(
                *num_requests,
                ArrivalTimes::new(*arrival_process, *qps, seed),
                sampler,
            ))
        }
        WorkloadConfig::Trace {
            path,
            time_scale,
            max_requests,
        } => {
            let records = load_trace(path)?;
            if records.is_empty() {
                warn!(path = %path.display(), "trace contains no requests");
            } else {
                info!(path = %path.display(), records = records.len(), "loaded trace");
            }
            Box::new(TraceReplay::new(records, *time_scale, *max_requests)?)
        }
    };
    Ok(stream)
}
