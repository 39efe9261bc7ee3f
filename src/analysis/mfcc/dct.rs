// Unnormalized DCT-II: c_i = sum_j e_j * cos(pi * i * (j + 0.5) / B)

use std::f64::consts::PI;

/// Cosine table for a truncated DCT-II
pub struct DctTable {
    input_len: usize,
    /// output_len rows of input_len coefficients
    table: Vec<f32>,
}

impl DctTable {
    pub fn new(input_len: usize, output_len: usize) -> Self {
        let mut table = Vec::with_capacity(input_len * output_len);
        for i in 0..output_len {
            for j in 0..input_len {
                let angle = PI * i as f64 * (j as f64 + 0.5) / input_len as f64;
                table.push(angle.cos() as f32);
            }
        }
        Self { input_len, table }
    }

    pub fn output_len(&self) -> usize {
        if self.input_len == 0 {
            0
        } else {
            self.table.len() / self.input_len
        }
    }

    /// Transform `input` (length B) into the first `output_len` coefficients
    pub fn apply(&self, input: &[f32]) -> Vec<f32> {
        if self.input_len == 0 {
            return Vec::new();
        }
        self.table
            .chunks_exact(self.input_len)
            .map(|row| row.iter().zip(input).map(|(&c, &e)| c * e).sum())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_coefficient_is_plain_sum() {
        let dct = DctTable::new(4, 2);
        let out = dct.apply(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], 10.0);
    }

    #[test]
    fn test_constant_input_has_no_higher_terms() {
        let dct = DctTable::new(8, 8);
        let out = dct.apply(&[-50.0; 8]);
        assert_eq!(out[0], -400.0);
        for &c in &out[1..] {
            assert!(c.abs() < 1e-3, "unexpected coefficient {}", c);
        }
    }

    #[test]
    fn test_truncation() {
        assert_eq!(DctTable::new(500, 300).output_len(), 300);
    }
}
