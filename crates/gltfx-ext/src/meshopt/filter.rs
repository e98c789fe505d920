//! Meshopt filters: lossy pre-passes that make attribute streams compress
//! better, and the exact post-passes that decoders run.
//!
//! Decode passes work in place on the decompressed bytes of a view. Encode
//! passes turn float data into the filtered integer layout.

use serde::{Deserialize, Serialize};

use super::MeshoptError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Filter {
    #[default]
    None,
    Octahedral,
    Quaternion,
    Exponential,
}

impl Filter {
    pub fn is_none(&self) -> bool {
        *self == Filter::None
    }

    /// Checks that `stride` is a layout this filter decodes.
    pub fn check_stride(self, stride: usize) -> Result<(), MeshoptError> {
        let ok = match self {
            Filter::None => true,
            Filter::Octahedral => stride == 4 || stride == 8,
            Filter::Quaternion => stride == 8,
            Filter::Exponential => stride % 4 == 0 && stride > 0,
        };
        if ok {
            Ok(())
        } else {
            Err(MeshoptError::FilterStride { filter: self, stride })
        }
    }
}

/// Signed normalized quantization of `v` to `bits` bits.
fn quantize_snorm(v: f32, bits: u32) -> i32 {
    let scale = ((1i32 << (bits - 1)) - 1) as f32;
    let v = v.clamp(-1.0, 1.0);
    (v * scale + if v >= 0.0 { 0.5 } else { -0.5 }) as i32
}

fn round_to_int(v: f32) -> i32 {
    (v + if v >= 0.0 { 0.5 } else { -0.5 }) as i32
}

// ============================================================================
// Decoding
// ============================================================================

/// Runs the decode pass of `filter` over `count` elements of `stride` bytes.
pub fn decode_filter(filter: Filter, data: &mut [u8], count: usize, stride: usize) -> Result<(), MeshoptError> {
    filter.check_stride(stride)?;
    if data.len() < count * stride {
        return Err(MeshoptError::SizeMismatch {
            expected: count * stride,
            actual: data.len(),
        });
    }
    let data = &mut data[..count * stride];
    match filter {
        Filter::None => {}
        Filter::Octahedral if stride == 4 => decode_octahedral_i8(data),
        Filter::Octahedral => decode_octahedral_i16(data),
        Filter::Quaternion => decode_quaternion(data),
        Filter::Exponential => decode_exponential(data),
    }
    Ok(())
}

/// Reconstructs a unit vector from octahedral `x y` and the one-value `z`
/// lane, returning it scaled to `max`.
fn octahedral_to_vector(x: f32, y: f32, one: f32, max: f32) -> [i32; 3] {
    let z = one - x.abs() - y.abs();
    let t = z.min(0.0);
    let x = x + if x >= 0.0 { t } else { -t };
    let y = y + if y >= 0.0 { t } else { -t };
    let len = (x * x + y * y + z * z).sqrt();
    let s = if len > 0.0 { max / len } else { 0.0 };
    [round_to_int(x * s), round_to_int(y * s), round_to_int(z * s)]
}

fn decode_octahedral_i8(data: &mut [u8]) {
    for element in data.chunks_exact_mut(4) {
        let [x, y, z] = octahedral_to_vector(
            f32::from(element[0] as i8),
            f32::from(element[1] as i8),
            f32::from(element[2] as i8),
            127.0,
        );
        element[0] = x as i8 as u8;
        element[1] = y as i8 as u8;
        element[2] = z as i8 as u8;
    }
}

fn read_i16(data: &[u8], i: usize) -> i16 {
    i16::from_le_bytes([data[2 * i], data[2 * i + 1]])
}

fn write_i16(data: &mut [u8], i: usize, v: i16) {
    data[2 * i..2 * i + 2].copy_from_slice(&v.to_le_bytes());
}

fn decode_octahedral_i16(data: &mut [u8]) {
    for element in data.chunks_exact_mut(8) {
        let [x, y, z] = octahedral_to_vector(
            f32::from(read_i16(element, 0)),
            f32::from(read_i16(element, 1)),
            f32::from(read_i16(element, 2)),
            32767.0,
        );
        write_i16(element, 0, x as i16);
        write_i16(element, 1, y as i16);
        write_i16(element, 2, z as i16);
    }
}

fn decode_quaternion(data: &mut [u8]) {
    let scale = std::f32::consts::FRAC_1_SQRT_2;
    for element in data.chunks_exact_mut(8) {
        let last = read_i16(element, 3);
        let sf = i32::from(last) | 3;
        let ss = scale / sf as f32;
        let x = f32::from(read_i16(element, 0)) * ss;
        let y = f32::from(read_i16(element, 1)) * ss;
        let z = f32::from(read_i16(element, 2)) * ss;
        let ww = 1.0 - x * x - y * y - z * z;
        let w = ww.max(0.0).sqrt();

        let qc = (last & 3) as usize;
        write_i16(element, (qc + 1) & 3, round_to_int(x * 32767.0) as i16);
        write_i16(element, (qc + 2) & 3, round_to_int(y * 32767.0) as i16);
        write_i16(element, (qc + 3) & 3, round_to_int(z * 32767.0) as i16);
        write_i16(element, qc, (w * 32767.0 + 0.5) as i16);
    }
}

fn decode_exponential(data: &mut [u8]) {
    for lane in data.chunks_exact_mut(4) {
        let v = u32::from_le_bytes([lane[0], lane[1], lane[2], lane[3]]);
        let mantissa = ((v << 8) as i32) >> 8;
        let exponent = (v as i32) >> 24;
        let value = mantissa as f32 * 2f32.powi(exponent);
        lane.copy_from_slice(&value.to_bits().to_le_bytes());
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Octahedral-encodes `count` 4-float elements (`x y z w`, `xyz` a unit
/// vector) into i8 (`stride == 4`) or i16 (`stride == 8`) lanes using `bits`
/// bits for the two octahedral coordinates.
pub fn encode_octahedral(values: &[f32], stride: usize, bits: u32) -> Result<Vec<u8>, MeshoptError> {
    Filter::Octahedral.check_stride(stride)?;
    let lane_bits = stride as u32 * 2;
    if values.len() % 4 != 0 || bits < 2 || bits > lane_bits {
        return Err(MeshoptError::FilterInput("octahedral"));
    }
    let mut out = Vec::with_capacity(values.len() / 4 * stride);
    for n in values.chunks_exact(4) {
        let (nx, ny, nz, nw) = (n[0], n[1], n[2], n[3]);
        let l1 = nx.abs() + ny.abs() + nz.abs();
        let ns = if l1 == 0.0 { 0.0 } else { 1.0 / l1 };
        let (nx, ny) = (nx * ns, ny * ns);
        let u = if nz >= 0.0 { nx } else { (1.0 - ny.abs()) * sign_or_one(nx) };
        let v = if nz >= 0.0 { ny } else { (1.0 - nx.abs()) * sign_or_one(ny) };
        let lanes = [
            quantize_snorm(u, bits),
            quantize_snorm(v, bits),
            quantize_snorm(1.0, bits),
            quantize_snorm(nw, lane_bits),
        ];
        for lane in lanes {
            if stride == 4 {
                out.push(lane as i8 as u8);
            } else {
                out.extend_from_slice(&(lane as i16).to_le_bytes());
            }
        }
    }
    Ok(out)
}

/// Encodes `count` unit quaternions (`x y z w`) into 8-byte elements with
/// `bits` bits per stored component.
pub fn encode_quaternion(values: &[f32], bits: u32) -> Result<Vec<u8>, MeshoptError> {
    if values.len() % 4 != 0 || !(4..=16).contains(&bits) {
        return Err(MeshoptError::FilterInput("quaternion"));
    }
    let scaler = std::f32::consts::SQRT_2;
    let mut out = Vec::with_capacity(values.len() * 2);
    for q in values.chunks_exact(4) {
        let mut qc = 0;
        for i in 1..4 {
            if q[i].abs() > q[qc].abs() {
                qc = i;
            }
        }
        let sign = if q[qc] < 0.0 { -1.0 } else { 1.0 };
        let lanes = [
            quantize_snorm(q[(qc + 1) & 3] * scaler * sign, bits),
            quantize_snorm(q[(qc + 2) & 3] * scaler * sign, bits),
            quantize_snorm(q[(qc + 3) & 3] * scaler * sign, bits),
            (quantize_snorm(1.0, bits) & !3) | qc as i32,
        ];
        for lane in lanes {
            out.extend_from_slice(&(lane as i16).to_le_bytes());
        }
    }
    Ok(out)
}

/// Encodes floats as a 24-bit mantissa with `bits` significant bits and an
/// 8-bit exponent per value.
pub fn encode_exponential(values: &[f32], bits: u32) -> Result<Vec<u8>, MeshoptError> {
    if !(1..=24).contains(&bits) {
        return Err(MeshoptError::FilterInput("exponential"));
    }
    let mut out = Vec::with_capacity(values.len() * 4);
    for &v in values {
        let exponent = (frexp_exponent(v) - (bits as i32 - 1)).clamp(-100, 100);
        let mantissa = round_to_int(v * 2f32.powi(-exponent)).clamp(-(1 << 23), (1 << 23) - 1);
        let packed = (mantissa as u32 & 0x00FF_FFFF) | ((exponent as u32) << 24);
        out.extend_from_slice(&packed.to_le_bytes());
    }
    Ok(out)
}

/// Exponent `e` with `|v| = f * 2^e`, `f` in `[0.5, 1)`; 0 for zero and non-finite values.
fn frexp_exponent(v: f32) -> i32 {
    if v == 0.0 || !v.is_finite() {
        return 0;
    }
    let bits = v.to_bits();
    let biased = ((bits >> 23) & 0xFF) as i32;
    if biased == 0 {
        // Subnormal: normalize through a scaled copy.
        return frexp_exponent(v * 2f32.powi(64)) - 64;
    }
    biased - 126
}

/// `1` for non-negative values including `+0`, `-1` otherwise.
fn sign_or_one(v: f32) -> f32 {
    if v >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn i16_lanes(data: &[u8]) -> Vec<i16> {
        data.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect()
    }

    fn normalize(v: [f32; 3]) -> [f32; 3] {
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        [v[0] / len, v[1] / len, v[2] / len]
    }

    #[test]
    fn test_octahedral_axes() {
        let normals = [0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0];
        let mut data = encode_octahedral(&normals, 8, 16).unwrap();
        decode_filter(Filter::Octahedral, &mut data, 3, 8).unwrap();
        let lanes = i16_lanes(&data);
        assert_eq!(&lanes[0..3], &[0, 0, 32767]);
        assert_eq!(&lanes[4..7], &[32767, 0, 0]);
        assert_eq!(&lanes[8..11], &[0, 0, -32767]);
    }

    #[test]
    fn test_quaternion_identity() {
        let mut data = encode_quaternion(&[0.0, 0.0, 0.0, 1.0], 16).unwrap();
        decode_filter(Filter::Quaternion, &mut data, 1, 8).unwrap();
        assert_eq!(i16_lanes(&data), vec![0, 0, 0, 32767]);
    }

    #[test]
    fn test_exponential_exact_values() {
        let values = [0.0f32, 1.0, -2.5, 1024.0, 0.125, -3.0e-3];
        let mut data = encode_exponential(&values, 24).unwrap();
        decode_filter(Filter::Exponential, &mut data, values.len(), 4).unwrap();
        let decoded: Vec<f32> = data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(&decoded[..5], &values[..5]);
        assert!((decoded[5] - values[5]).abs() < 1.0e-9);
    }

    #[test]
    fn test_stride_rules() {
        assert!(Filter::Quaternion.check_stride(4).is_err());
        assert!(Filter::Octahedral.check_stride(12).is_err());
        assert!(Filter::Exponential.check_stride(12).is_ok());
        assert!(Filter::None.check_stride(3).is_ok());
    }

    proptest! {
        #[test]
        fn prop_octahedral_error_bounded(
            x in -1.0f32..1.0, y in -1.0f32..1.0, z in -1.0f32..1.0
        ) {
            prop_assume!(x * x + y * y + z * z > 0.01);
            let n = normalize([x, y, z]);
            let mut data = encode_octahedral(&[n[0], n[1], n[2], 0.0], 8, 16).unwrap();
            decode_filter(Filter::Octahedral, &mut data, 1, 8).unwrap();
            let lanes = i16_lanes(&data);
            for k in 0..3 {
                prop_assert!((lanes[k] as f32 / 32767.0 - n[k]).abs() < 1.0e-3);
            }
        }

        #[test]
        fn prop_quaternion_error_bounded(
            x in -1.0f32..1.0, y in -1.0f32..1.0, z in -1.0f32..1.0, w in -1.0f32..1.0
        ) {
            let len = (x * x + y * y + z * z + w * w).sqrt();
            prop_assume!(len > 0.1);
            let q = [x / len, y / len, z / len, w / len];
            let mut data = encode_quaternion(&q, 16).unwrap();
            decode_filter(Filter::Quaternion, &mut data, 1, 8).unwrap();
            let lanes = i16_lanes(&data);
            // Double cover: the decoded quaternion may be negated.
            let dot: f32 = (0..4).map(|k| lanes[k] as f32 / 32767.0 * q[k]).sum();
            prop_assert!(dot.abs() > 0.9999);
        }

        #[test]
        fn prop_exponential_relative_error(v in -1.0e6f32..1.0e6) {
            let mut data = encode_exponential(&[v], 16).unwrap();
            decode_filter(Filter::Exponential, &mut data, 1, 4).unwrap();
            let decoded = f32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            prop_assert!((decoded - v).abs() <= v.abs() * 2.0f32.powi(-15) + f32::MIN_POSITIVE);
        }
    }
}
