//! 16-bit PCM byte helpers.
//!
//! Sinks receive little-endian bytes regardless of host byte order.

/// Append `samples` to `out` as little-endian 16-bit PCM.
pub fn extend_le_bytes(out: &mut Vec<u8>, samples: &[i16]) {
    out.reserve(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

/// Encode `samples` into a reusable staging vector, replacing its contents.
pub fn encode_le_into(out: &mut Vec<u8>, samples: &[i16]) -> usize {
    out.clear();
    extend_le_bytes(out, samples);
    out.len()
}

/// Convert a float sample in [-1.0, 1.0] to 16-bit PCM. Out-of-range input is clamped.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Convert float samples into a reusable `i16` staging vector, replacing its contents.
pub fn convert_f32_into(out: &mut Vec<i16>, samples: &[f32]) {
    out.clear();
    out.extend(samples.iter().copied().map(f32_to_i16));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_little_endian() {
        let mut out = Vec::new();
        let len = encode_le_into(&mut out, &[0x0102, -1, i16::MIN]);
        assert_eq!(len, 6);
        assert_eq!(out, vec![0x02, 0x01, 0xFF, 0xFF, 0x00, 0x80]);
    }

    #[test]
    fn staging_is_replaced_not_appended() {
        let mut out = vec![9u8; 10];
        encode_le_into(&mut out, &[1]);
        assert_eq!(out, vec![1, 0]);
    }

    #[test]
    fn float_conversion_clamps() {
        let mut out = Vec::new();
        convert_f32_into(&mut out, &[0.0, 1.0, -1.0, 1.5, -2.0]);
        assert_eq!(out, vec![0, i16::MAX, -i16::MAX, i16::MAX, -i16::MAX]);
    }
}
