//! Signal-level measurements used for silence gating.

/// Root-mean-square level of a sample window. Empty input is 0.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Peak absolute amplitude of a sample window.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0f32, |m, s| m.max(s.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_measures_zero() {
        assert_eq!(rms(&[0.0; 1024]), 0.0);
        assert_eq!(peak(&[0.0; 1024]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn full_scale_square_wave() {
        let samples: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((rms(&samples) - 1.0).abs() < 1e-6);
        assert_eq!(peak(&samples), 1.0);
    }

    #[test]
    fn sine_rms_is_peak_over_sqrt2() {
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * 0.5)
            .collect();
        let expected = 0.5 / std::f32::consts::SQRT_2;
        assert!((rms(&samples) - expected).abs() < 1e-3);
    }
}
