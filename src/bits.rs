//! Bit-string views over key types.
//!
//! Bits are numbered MSB-first: bit 0 is the most significant bit of the
//! first byte, matching network byte order for integers and addresses.
//! Bits past the end of a key read as zero.
//!
//! Fixed-width keys (integers, addresses, `[u8; N]`) expose their bytes as
//! they are. Variable-length byte strings (`[u8]`, `Vec<u8>`, `str`) use a
//! terminated view instead: every byte becomes a `1` marker bit followed by
//! its eight data bits, and the key ends in zeros. No byte string is then a
//! zero-padded prefix of another, so `"a"` and `"a\0"` are distinct keys
//! splitting at the marker bit, and bit order is lexicographic byte order.
//! A mask covering the first `n` bytes of such a key is
//! `n * BYTE_STRING_STRIDE` bits long.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Bit length meaning "through the end of the longer key".
pub const BITLEN_ALL: u32 = u32::MAX;

/// Bits per byte in the terminated view of a variable-length byte string.
pub const BYTE_STRING_STRIDE: u32 = 9;

/// A key that can be viewed as a string of bits.
///
/// Keys of one type compare equal when they agree through the longer
/// [`bit_len`](Self::bit_len), so variable-length implementations must make
/// sure no key is another key extended with zero bits.
pub trait BitString {
    /// Number of significant bits.
    fn bit_len(&self) -> u32;

    /// Byte `index` of the key, `0` past the end.
    fn byte_at(&self, index: usize) -> u8;

    /// Bit `bit` of the key, MSB-first.
    #[inline]
    fn bit(&self, bit: u32) -> bool {
        let byte = self.byte_at(bit_byte_index(bit));
        (byte >> (7 - bit_in_byte_msb0(bit))) & 1 != 0
    }
}

#[inline]
fn bit_byte_index(bit: u32) -> usize {
    (bit / 8) as usize
}

/// Bit index within its byte, where `0` is the MSB and `7` is the LSB.
#[inline]
fn bit_in_byte_msb0(bit: u32) -> u32 {
    bit % 8
}

/// End (exclusive) of the range `[bitoff, bitoff + bitlen)`, clipped to the
/// longer of the two keys since zero padding never differs.
#[inline]
fn range_end(longest: u32, bitoff: u32, bitlen: u32) -> u32 {
    bitoff.saturating_add(bitlen).min(longest)
}

/// First bit in `[bitoff, bitoff + bitlen)` where `a` and `b` differ.
///
/// `bitlen` may be [`BITLEN_ALL`].
pub fn first_difference<A, B>(a: &A, b: &B, bitoff: u32, bitlen: u32) -> Option<u32>
where
    A: BitString + ?Sized,
    B: BitString + ?Sized,
{
    let end = range_end(a.bit_len().max(b.bit_len()), bitoff, bitlen);
    if bitoff >= end {
        return None;
    }

    let first = bit_byte_index(bitoff);
    let last = bit_byte_index(end - 1);
    for index in first..=last {
        let mut diff = a.byte_at(index) ^ b.byte_at(index);
        if index == first {
            diff &= 0xFFu8 >> bit_in_byte_msb0(bitoff);
        }
        if index == last {
            let kept = end - (last as u32) * 8;
            diff &= 0xFFu8 << (8 - kept);
        }
        if diff != 0 {
            return Some(index as u32 * 8 + diff.leading_zeros());
        }
    }
    None
}

/// The `bitlen` bits of `key` starting at `bitoff`, right-aligned.
///
/// Fields wider than 32 bits keep their low 32 bits.
pub fn extract_bits<K: BitString + ?Sized>(key: &K, bitoff: u32, bitlen: u32) -> u32 {
    let mut out = 0u32;
    for bit in bitoff..bitoff.saturating_add(bitlen) {
        out = (out << 1) | key.bit(bit) as u32;
    }
    out
}

/// Bit `bit` of the terminated view of `bytes`.
#[inline]
fn terminated_bit(bytes: &[u8], bit: u32) -> bool {
    let Some(&byte) = bytes.get((bit / BYTE_STRING_STRIDE) as usize) else {
        return false;
    };
    match bit % BYTE_STRING_STRIDE {
        0 => true,
        pos => (byte >> (8 - pos)) & 1 != 0,
    }
}

impl BitString for [u8] {
    #[inline]
    fn bit_len(&self) -> u32 {
        u32::try_from(self.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(BYTE_STRING_STRIDE)
    }

    fn byte_at(&self, index: usize) -> u8 {
        let first = u32::try_from(index).unwrap_or(u32::MAX).saturating_mul(8);
        (0..8).fold(0u8, |byte, i| {
            (byte << 1) | terminated_bit(self, first.saturating_add(i)) as u8
        })
    }

    #[inline]
    fn bit(&self, bit: u32) -> bool {
        terminated_bit(self, bit)
    }
}

impl BitString for Vec<u8> {
    #[inline]
    fn bit_len(&self) -> u32 {
        self.as_slice().bit_len()
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u8 {
        self.as_slice().byte_at(index)
    }

    #[inline]
    fn bit(&self, bit: u32) -> bool {
        terminated_bit(self, bit)
    }
}

impl BitString for str {
    #[inline]
    fn bit_len(&self) -> u32 {
        self.as_bytes().bit_len()
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u8 {
        self.as_bytes().byte_at(index)
    }

    #[inline]
    fn bit(&self, bit: u32) -> bool {
        terminated_bit(self.as_bytes(), bit)
    }
}

impl<const N: usize> BitString for [u8; N] {
    #[inline]
    fn bit_len(&self) -> u32 {
        (N as u32).saturating_mul(8)
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u8 {
        self.get(index).copied().unwrap_or(0)
    }
}

macro_rules! bitstring_uint {
    ($($ty:ty),*) => {$(
        impl BitString for $ty {
            #[inline]
            fn bit_len(&self) -> u32 {
                <$ty>::BITS
            }

            #[inline]
            fn byte_at(&self, index: usize) -> u8 {
                self.to_be_bytes().get(index).copied().unwrap_or(0)
            }
        }
    )*};
}

bitstring_uint!(u8, u16, u32, u64, u128);

impl BitString for Ipv4Addr {
    #[inline]
    fn bit_len(&self) -> u32 {
        32
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u8 {
        self.octets().byte_at(index)
    }
}

impl BitString for Ipv6Addr {
    #[inline]
    fn bit_len(&self) -> u32 {
        128
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u8 {
        self.octets().byte_at(index)
    }
}
