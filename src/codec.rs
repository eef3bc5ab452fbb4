//! Fixed-width little-endian scalar encoding.
//!
//! Every multi-byte value that crosses the bus or lands in EEPROM goes
//! through [`ByteCodec`], so the register file, the bus handler and the
//! persistence layer always agree on byte order.

use crate::RegisterError;

/// Bidirectional fixed-width binary encoding of a scalar.
///
/// `decode(encode(v))` reproduces `v` bit for bit, including NaN payloads
/// and infinities for the float types.
pub trait ByteCodec: Sized + Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Fixed-size byte array holding the encoded value.
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default + Copy;

    /// Encodes the value in little-endian order.
    fn encode(self) -> Self::Bytes;

    /// Decodes a value from little-endian bytes.
    fn decode(bytes: &Self::Bytes) -> Self;

    /// Decodes from an untyped slice, which must be exactly `WIDTH` bytes long.
    fn decode_slice(data: &[u8]) -> Result<Self, RegisterError> {
        if data.len() != Self::WIDTH {
            return Err(RegisterError::WidthMismatch);
        }
        let mut bytes = Self::Bytes::default();
        bytes.as_mut().copy_from_slice(data);
        Ok(Self::decode(&bytes))
    }
}

/// Implements [`ByteCodec`] plus a pair of free conversion functions per type.
macro_rules! impl_byte_codec {
    ($($type:ty, $size:literal);* $(;)?) => {
        $(
            impl ByteCodec for $type {
                const WIDTH: usize = $size;
                type Bytes = [u8; $size];

                #[inline]
                fn encode(self) -> [u8; $size] {
                    self.to_le_bytes()
                }

                #[inline]
                fn decode(bytes: &[u8; $size]) -> Self {
                    <$type>::from_le_bytes(*bytes)
                }
            }

            paste::paste! {
                #[doc = "Encodes a `" $type "` as " $size " little-endian bytes."]
                #[inline]
                pub fn [<$type _to_bytes>](value: $type) -> [u8; $size] {
                    value.encode()
                }

                #[doc = "Decodes a `" $type "` from " $size " little-endian bytes."]
                #[inline]
                pub fn [<bytes_to_ $type>](bytes: &[u8; $size]) -> $type {
                    <$type as ByteCodec>::decode(bytes)
                }
            }
        )*
    };
}

impl_byte_codec! {
    u8, 1;
    i8, 1;
    u16, 2;
    i16, 2;
    u32, 4;
    i32, 4;
    u64, 8;
    i64, 8;
    f32, 4;
    f64, 8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_are_fixed_per_type() {
        assert_eq!(<u8 as ByteCodec>::WIDTH, 1);
        assert_eq!(<i16 as ByteCodec>::WIDTH, 2);
        assert_eq!(<u32 as ByteCodec>::WIDTH, 4);
        assert_eq!(<f32 as ByteCodec>::WIDTH, 4);
        assert_eq!(<i64 as ByteCodec>::WIDTH, 8);
        assert_eq!(<f64 as ByteCodec>::WIDTH, 8);
    }

    #[test]
    fn byte_order_is_little_endian() {
        assert_eq!(u32_to_bytes(5000), [0x88, 0x13, 0x00, 0x00]);
        assert_eq!(u16_to_bytes(0x1234), [0x34, 0x12]);
        assert_eq!(i32_to_bytes(-2), [0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(f32_to_bytes(1.0), [0x00, 0x00, 0x80, 0x3F]);
        assert_eq!(bytes_to_u32(&[0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
    }

    #[test]
    fn integer_extremes_survive() {
        for v in [i64::MIN, -1, 0, 1, i64::MAX] {
            assert_eq!(bytes_to_i64(&i64_to_bytes(v)), v);
        }
        for v in [u64::MIN, u64::MAX] {
            assert_eq!(bytes_to_u64(&u64_to_bytes(v)), v);
        }
        for v in [i16::MIN, i16::MAX] {
            assert_eq!(bytes_to_i16(&i16_to_bytes(v)), v);
        }
        assert_eq!(bytes_to_i8(&i8_to_bytes(-128)), -128);
    }

    #[test]
    fn float_special_values_are_bit_exact() {
        let quiet_nan = f32::from_bits(0x7FC0_0001);
        for v in [f32::INFINITY, f32::NEG_INFINITY, -0.0, quiet_nan, f32::MIN_POSITIVE] {
            assert_eq!(bytes_to_f32(&f32_to_bytes(v)).to_bits(), v.to_bits());
        }

        let payload_nan = f64::from_bits(0x7FF8_0000_0000_BEEF);
        for v in [f64::INFINITY, payload_nan, core::f64::consts::PI] {
            assert_eq!(bytes_to_f64(&f64_to_bytes(v)).to_bits(), v.to_bits());
        }
    }

    #[test]
    fn double_keeps_full_precision() {
        let v = 0.1f64 + 0.2f64;
        assert_eq!(f64_to_bytes(v).len(), 8);
        assert_eq!(bytes_to_f64(&f64_to_bytes(v)), v);
    }

    #[test]
    fn decode_slice_checks_length() {
        assert_eq!(u32::decode_slice(&[0x88, 0x13, 0, 0]), Ok(5000));
        assert_eq!(u32::decode_slice(&[0x88, 0x13]), Err(RegisterError::WidthMismatch));
        assert_eq!(u8::decode_slice(&[]), Err(RegisterError::WidthMismatch));
    }
}
