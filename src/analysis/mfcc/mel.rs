// Mel filter bank - triangular bands evenly spaced on the mel scale
//
// B bands need B + 2 edge points spanning [lower, upper] in mel. Band j
// rises from point j to point j + 1 and falls to point j + 2. With more bands
// than FFT bins many bands cover no bin at all and report zero energy.

/// Hz to mel (O'Shaughnessy)
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Mel to Hz
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Sparse triangular weights per band
pub struct MelFilterBank {
    /// (bin, weight) pairs with non-zero weight, per band
    bands: Vec<Vec<(usize, f32)>>,
}

impl MelFilterBank {
    /// Build `band_count` filters over the bins of a `fft_size`-point FFT
    ///
    /// # Arguments
    /// * `band_count` - Number of triangular bands
    /// * `fft_size` - FFT length (bins = fft_size / 2 + 1)
    /// * `sample_rate` - Sample rate in Hz
    /// * `lower_hz` / `upper_hz` - Frequency span of the bank
    pub fn new(
        band_count: usize,
        fft_size: usize,
        sample_rate: u32,
        lower_hz: f32,
        upper_hz: f32,
    ) -> Self {
        let lower_mel = hz_to_mel(lower_hz);
        let upper_mel = hz_to_mel(upper_hz);
        let step = (upper_mel - lower_mel) / (band_count + 1) as f32;
        let edges: Vec<f32> = (0..band_count + 2)
            .map(|k| mel_to_hz(lower_mel + k as f32 * step))
            .collect();

        let bin_width = sample_rate as f32 / fft_size as f32;
        let bin_count = fft_size / 2 + 1;

        let bands = edges
            .windows(3)
            .map(|edge| {
                let (left, center, right) = (edge[0], edge[1], edge[2]);
                (0..bin_count)
                    .filter_map(|bin| {
                        let freq = bin as f32 * bin_width;
                        let weight = if freq > left && freq < center {
                            (freq - left) / (center - left)
                        } else if freq >= center && freq < right {
                            (right - freq) / (right - center)
                        } else {
                            0.0
                        };
                        (weight > 0.0).then_some((bin, weight))
                    })
                    .collect()
            })
            .collect();

        Self { bands }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Weighted magnitude sum per band, written into `energies`
    pub fn apply(&self, spectrum: &[f32], energies: &mut Vec<f32>) {
        energies.clear();
        energies.extend(self.bands.iter().map(|band| {
            band.iter()
                .map(|&(bin, weight)| spectrum.get(bin).copied().unwrap_or(0.0) * weight)
                .sum::<f32>()
        }));
    }
}
