//! Runtime configuration for the codec.
//!
//! Mirrors `ArrEssJay-chimera`'s `ProtocolConfig`/`SimulationConfig` pattern: a
//! serde-derived struct with a `Default` impl carrying the spec's default
//! values, validated once at construction rather than scattered through the
//! pipeline.

use crate::error::{CodecError, Result};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FecScheme {
    Rs255223,
}

impl Default for FecScheme {
    fn default() -> Self {
        FecScheme::Rs255223
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Config {
    pub sample_rate: usize,
    pub band_low_hz: f32,
    pub band_high_hz: f32,
    pub fft_size: usize,
    pub cp_ratio: f32,
    pub pilot_spacing: usize,
    pub fec: FecScheme,
    pub compress: bool,
    pub encrypt: bool,
    pub idle_timeout_ms: u64,
    pub cancel_check_interval_chunks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            band_low_hz: 18_000.0,
            band_high_hz: 22_000.0,
            fft_size: 256,
            cp_ratio: 0.25,
            pilot_spacing: 8,
            fec: FecScheme::Rs255223,
            compress: false,
            encrypt: false,
            idle_timeout_ms: 5_000,
            cancel_check_interval_chunks: 4,
        }
    }
}

/// Assignment of the `fft_size` FFT bins to data, pilot, and null roles.
///
/// A pure function of `(sample_rate, fft_size, band)`: both sides of a link
/// derive the identical layout from the same config, with no negotiation.
#[derive(Debug, Clone)]
pub struct SubcarrierLayout {
    pub data_bins: Vec<usize>,
    pub pilot_bins: Vec<usize>,
    pub cyclic_prefix_len: usize,
}

impl SubcarrierLayout {
    pub fn data_bin_count(&self) -> usize {
        self.data_bins.len()
    }

    /// `(K * 6) / 8`, guaranteed integral by construction (`K` is always a
    /// multiple of 4, since `6*K mod 8 == 0 <=> K mod 4 == 0`).
    pub fn bytes_per_symbol(&self) -> usize {
        (self.data_bin_count() * 6) / 8
    }
}

impl Config {
    /// Computes the subcarrier layout and checks every invariant from spec
    /// §3/§6: in-band bins only, `K` a multiple of 4, `cp_ratio` in (0, 1).
    pub fn validate(&self) -> Result<SubcarrierLayout> {
        if self.fft_size == 0 || !self.fft_size.is_power_of_two() {
            return Err(CodecError::InvalidConfig(format!(
                "fft_size {} must be a nonzero power of two",
                self.fft_size
            )));
        }
        if !(self.cp_ratio > 0.0 && self.cp_ratio < 1.0) {
            return Err(CodecError::InvalidConfig(format!(
                "cp_ratio {} must be in (0, 1)",
                self.cp_ratio
            )));
        }
        if self.band_low_hz <= 0.0 || self.band_high_hz <= self.band_low_hz {
            return Err(CodecError::InvalidConfig(
                "band_low_hz must be positive and below band_high_hz".into(),
            ));
        }
        if self.pilot_spacing == 0 {
            return Err(CodecError::InvalidConfig("pilot_spacing must be nonzero".into()));
        }

        let bin_hz = self.sample_rate as f32 / self.fft_size as f32;
        let nyquist_bin = self.fft_size / 2;
        let mut in_band_bins: Vec<usize> = (1..nyquist_bin)
            .filter(|&k| {
                let freq = k as f32 * bin_hz;
                freq >= self.band_low_hz && freq <= self.band_high_hz
            })
            .collect();
        in_band_bins.sort_unstable();

        if in_band_bins.is_empty() {
            return Err(CodecError::InvalidConfig(format!(
                "no FFT bins fall inside [{}, {}] Hz at {} Hz / N={}",
                self.band_low_hz, self.band_high_hz, self.sample_rate, self.fft_size
            )));
        }

        // Largest K (multiple of 4, so K*6 % 8 == 0) such that K data bins plus
        // their ceil(K/pilot_spacing) pilot bins still fit the in-band budget.
        let budget = in_band_bins.len();
        let mut best_k = 0usize;
        let mut k = 4usize;
        while k <= budget {
            let pilots = k.div_ceil(self.pilot_spacing);
            if k + pilots <= budget {
                best_k = k;
            } else {
                break;
            }
            k += 4;
        }
        if best_k == 0 {
            return Err(CodecError::InvalidConfig(format!(
                "band [{}, {}] Hz yields only {} usable bins at {} Hz / N={}, too few for any K*6 % 8 == 0 layout",
                self.band_low_hz, self.band_high_hz, budget, self.sample_rate, self.fft_size
            )));
        }

        // Walk the in-band bins in frequency order, handing out data bins
        // until `pilot_spacing` of them have accumulated, then one pilot bin,
        // repeating until both budgets are met. If the data budget fills
        // before the pilot budget does (best_k not a multiple of
        // pilot_spacing), the remaining pilots trail after the last data
        // bin rather than being appended out of order.
        let pilots = best_k.div_ceil(self.pilot_spacing);
        let mut data_bins = Vec::with_capacity(best_k);
        let mut pilot_bins = Vec::with_capacity(pilots);
        let mut since_last_pilot = 0usize;
        for &bin in &in_band_bins {
            if data_bins.len() == best_k && pilot_bins.len() == pilots {
                break;
            }
            if data_bins.len() < best_k && since_last_pilot == self.pilot_spacing && pilot_bins.len() < pilots {
                pilot_bins.push(bin);
                since_last_pilot = 0;
                continue;
            }
            if data_bins.len() < best_k {
                data_bins.push(bin);
                since_last_pilot += 1;
            } else if pilot_bins.len() < pilots {
                pilot_bins.push(bin);
            }
        }

        let cp_len = ((self.fft_size as f32) * self.cp_ratio).round() as usize;
        Ok(SubcarrierLayout {
            data_bins,
            pilot_bins,
            cyclic_prefix_len: cp_len,
        })
    }

    /// `(K * 6 * sample_rate) / (8 * (N+L))`, per spec §9's rate formula.
    pub fn bitrate_bps(&self, layout: &SubcarrierLayout) -> f64 {
        let symbol_samples = self.fft_size + layout.cyclic_prefix_len;
        (layout.bytes_per_symbol() * 8) as f64 * self.sample_rate as f64 / symbol_samples as f64
    }
}
