// Cycle detection over the numeric symbol stream (A = 1, B = 0).
// Two estimators: the dominant DFT bin, or the strongest autocorrelation
// peak. Both predict the symbol one detected period back.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::config::{CycleMethod, PredictorConfig};
use crate::strategy::Vote;
use crate::symbol::Symbol;

/// Magnitudes at or below this are treated as numerical noise.
const PEAK_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleEstimate {
    pub period: usize,
    pub vote: Vote,
}

#[derive(Debug, Clone)]
pub struct CycleDetector {
    method: CycleMethod,
    min_len: usize,
}

impl CycleDetector {
    pub fn new(method: CycleMethod, min_len: usize) -> Self {
        Self { method, min_len }
    }

    pub fn from_config(config: &PredictorConfig) -> Self {
        Self::new(config.cycle_method, config.cycle_min_len)
    }

    /// Period and vote, or `None` when the detector abstains.
    pub fn estimate(&self, sequence: &[Symbol]) -> Option<CycleEstimate> {
        if sequence.len() < self.min_len.max(2) {
            return None;
        }
        let signal = numeric(sequence);
        let period = match self.method {
            CycleMethod::Spectral => spectral_period(&signal)?,
            CycleMethod::Autocorrelation => autocorrelation_period(&signal)?,
        };
        if period == 0 || period > signal.len() {
            return None;
        }

        let value = signal[signal.len() - period];
        let symbol = if value > 0.5 { Symbol::A } else { Symbol::B };
        let confidence = (value - 0.5).abs() * 2.0;
        Some(CycleEstimate {
            period,
            vote: Vote::new(symbol, confidence),
        })
    }

    pub fn predict(&self, sequence: &[Symbol]) -> Option<Vote> {
        self.estimate(sequence).map(|e| e.vote)
    }
}

fn numeric(sequence: &[Symbol]) -> Vec<f64> {
    sequence.iter().map(|s| s.bit() as f64).collect()
}

/// |DFT| of `signal`.
pub fn magnitude_spectrum(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    let fft = FftPlanner::<f64>::new().plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer.iter().map(|c| c.norm()).collect()
}

/// Autocorrelation at non-negative lags: `r[k] = sum_i x[i] * x[i + k]`.
///
/// Computed as the inverse FFT of `|X|^2` over a zero-padded buffer of at
/// least `2N` so the circular correlation does not wrap. Samples are 0/1, so
/// every lag is a whole count and FFT round-off is rounded away.
fn autocorrelation(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let padded = (2 * signal.len()).next_power_of_two();
    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(padded)
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(padded).process(&mut buffer);
    for c in buffer.iter_mut() {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    planner.plan_fft_inverse(padded).process(&mut buffer);

    let scale = padded as f64;
    buffer
        .iter()
        .take(signal.len())
        .map(|c| (c.re / scale).round())
        .collect()
}

/// `N / k` for the strongest bin `k` in `1..=N/2`. The Nyquist bin is
/// included so a strictly alternating stream resolves to period 2.
fn spectral_period(signal: &[f64]) -> Option<usize> {
    let spectrum = magnitude_spectrum(signal);
    let half = signal.len() / 2;

    let mut best: Option<(usize, f64)> = None;
    for (bin, &magnitude) in spectrum.iter().enumerate().take(half + 1).skip(1) {
        if best.map_or(true, |(_, m)| magnitude > m) {
            best = Some((bin, magnitude));
        }
    }

    let (bin, magnitude) = best?;
    if magnitude <= PEAK_EPSILON {
        return None;
    }
    Some(signal.len() / bin)
}

/// Lag of the strongest strict local maximum; the smallest lag wins ties.
fn autocorrelation_period(signal: &[f64]) -> Option<usize> {
    let r = autocorrelation(signal);
    if r.len() < 3 {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for lag in 1..r.len() - 1 {
        let is_peak = r[lag] > r[lag - 1] && r[lag] > r[lag + 1];
        if is_peak && r[lag] > PEAK_EPSILON && best.map_or(true, |(_, m)| r[lag] > m) {
            best = Some((lag, r[lag]));
        }
    }
    best.map(|(lag, _)| lag)
}
