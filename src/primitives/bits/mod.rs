#![forbid(unsafe_code)]
//! Bit-addressed buffers, bit copies and the nibble-swapped hex text form.
//!
//! Bit `k` of a buffer lives in byte `k / 8` at position `k % 8`, least
//! significant bit first.

pub mod copy {
    //! Unaligned bit copies between byte slices.

    /// Number of bytes needed to hold `bits` bits.
    pub fn bytes_for(bits: u64) -> usize {
        bits.div_ceil(8) as usize
    }

    /// Buffer size for `bits` bits, rounded up to a 4-byte boundary.
    pub fn padded_len(bits: u64) -> usize {
        bits.div_ceil(32) as usize * 4
    }

    #[inline]
    fn load_byte(src: &[u8], bit: u64) -> u8 {
        let idx = (bit >> 3) as usize;
        let shift = (bit & 7) as u32;
        let lo = src.get(idx).copied().unwrap_or(0) as u16;
        let hi = src.get(idx + 1).copied().unwrap_or(0) as u16;
        ((lo | (hi << 8)) >> shift) as u8
    }

    #[inline]
    fn store_bits(dst: &mut [u8], bit: u64, value: u8, n: u32) {
        debug_assert!((1..=8).contains(&n));
        let idx = (bit >> 3) as usize;
        let shift = (bit & 7) as u32;
        let mask = (((1u32 << n) - 1) << shift) as u16;
        let bits = ((value as u16) << shift) & mask;
        dst[idx] = (dst[idx] & !(mask as u8)) | bits as u8;
        if shift + n > 8 {
            let hi_mask = (mask >> 8) as u8;
            dst[idx + 1] = (dst[idx + 1] & !hi_mask) | (bits >> 8) as u8;
        }
    }

    /// Copies `len` bits from `src` at `src_off` into `dst` at `dst_off`.
    ///
    /// Bits of `dst` outside the target range are preserved. Source bits past
    /// the end of `src` read as zero. Panics if `dst` is too short.
    pub fn copy_bits(dst: &mut [u8], dst_off: u64, src: &[u8], src_off: u64, len: u64) {
        let mut done = 0u64;
        if dst_off % 8 == 0 && src_off % 8 == 0 {
            let whole = (len / 8) as usize;
            let d = (dst_off / 8) as usize;
            let s = (src_off / 8) as usize;
            let avail = src.len().saturating_sub(s).min(whole);
            if avail > 0 {
                dst[d..d + avail].copy_from_slice(&src[s..s + avail]);
            }
            dst[d + avail..d + whole].fill(0);
            done = whole as u64 * 8;
        }
        while done < len {
            let n = (len - done).min(8) as u32;
            let byte = load_byte(src, src_off + done);
            store_bits(dst, dst_off + done, byte, n);
            done += n as u64;
        }
    }

    /// Returns `len` bits of `src` starting at `off`, zero padded to whole bytes.
    pub fn extract(src: &[u8], off: u64, len: u64) -> Vec<u8> {
        let mut out = vec![0u8; bytes_for(len)];
        copy_bits(&mut out, 0, src, off, len);
        out
    }
}

pub mod buffer {
    //! A growable bit string backed by a 4-byte padded byte vector.

    use super::copy::{copy_bits, extract, padded_len};

    /// A bit string whose padding bits are always zero.
    #[derive(Clone, Default, PartialEq, Eq)]
    pub struct BitBuffer {
        bytes: Vec<u8>,
        len: u64,
    }

    impl BitBuffer {
        /// Creates an empty buffer.
        pub fn new() -> Self {
            Self::default()
        }

        /// Wraps the first `len` bits of `bytes`.
        pub fn from_bytes(bytes: &[u8], len: u64) -> Self {
            let mut buf = Self {
                bytes: vec![0u8; padded_len(len)],
                len,
            };
            copy_bits(&mut buf.bytes, 0, bytes, 0, len);
            buf
        }

        /// Length in bits.
        pub fn len(&self) -> u64 {
            self.len
        }

        /// Returns true if the buffer holds no bits.
        pub fn is_empty(&self) -> bool {
            self.len == 0
        }

        /// The padded backing bytes.
        pub fn as_bytes(&self) -> &[u8] {
            &self.bytes
        }

        /// Reads `len` bits at `off`; `None` if the range leaves the buffer.
        pub fn read(&self, off: u64, len: u64) -> Option<Vec<u8>> {
            let end = off.checked_add(len)?;
            if end > self.len {
                return None;
            }
            Some(extract(&self.bytes, off, len))
        }

        /// Overwrites `len` bits at `off` with the leading bits of `src`.
        pub fn write(&mut self, off: u64, len: u64, src: &[u8]) -> bool {
            match off.checked_add(len) {
                Some(end) if end <= self.len => {
                    copy_bits(&mut self.bytes, off, src, 0, len);
                    true
                }
                _ => false,
            }
        }

        /// Appends `len` bits of `src`, returning the offset they start at.
        pub fn append(&mut self, src: &[u8], len: u64) -> u64 {
            let off = self.len;
            self.resize(off + len);
            copy_bits(&mut self.bytes, off, src, 0, len);
            off
        }

        /// Appends `len` zero bits, returning the offset they start at.
        pub fn append_zeros(&mut self, len: u64) -> u64 {
            let off = self.len;
            self.resize(off + len);
            off
        }

        /// Splices `len` zero bits in at `off`, shifting later bits up.
        pub fn insert_zeros(&mut self, off: u64, len: u64) -> bool {
            if off > self.len {
                return false;
            }
            if len == 0 {
                return true;
            }
            let mut next = vec![0u8; padded_len(self.len + len)];
            copy_bits(&mut next, 0, &self.bytes, 0, off);
            copy_bits(&mut next, off + len, &self.bytes, off, self.len - off);
            self.bytes = next;
            self.len += len;
            true
        }

        /// Removes `len` bits at `off`, shifting later bits down.
        pub fn remove(&mut self, off: u64, len: u64) -> bool {
            match off.checked_add(len) {
                Some(end) if end <= self.len => {}
                _ => return false,
            }
            if len == 0 {
                return true;
            }
            let remaining = self.len - len;
            let mut next = vec![0u8; padded_len(remaining)];
            copy_bits(&mut next, 0, &self.bytes, 0, off);
            copy_bits(&mut next, off, &self.bytes, off + len, remaining - off);
            self.bytes = next;
            self.len = remaining;
            true
        }

        /// Returns true if every bit beyond `len` in the backing bytes is zero.
        pub fn padding_is_clear(&self) -> bool {
            if self.bytes.len() != padded_len(self.len) {
                return false;
            }
            let full = (self.len / 8) as usize;
            let rem = (self.len % 8) as u32;
            if rem != 0 && self.bytes[full] >> rem != 0 {
                return false;
            }
            let start = full + usize::from(rem != 0);
            self.bytes[start..].iter().all(|&b| b == 0)
        }

        fn resize(&mut self, len: u64) {
            self.bytes.resize(padded_len(len), 0);
            self.len = len;
        }
    }

    impl std::fmt::Debug for BitBuffer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("BitBuffer")
                .field("len", &self.len)
                .field("hex", &super::hex::encode(&self.bytes[..super::copy::bytes_for(self.len)]))
                .finish()
        }
    }
}

pub mod hex {
    //! Hex text with the low nibble of each byte written first.

    use crate::types::{Error, Result};

    /// Encodes bytes as upper-case hex, low nibble first.
    pub fn encode(bytes: &[u8]) -> String {
        let swapped: Vec<u8> = bytes.iter().map(|b| b.rotate_left(4)).collect();
        ::hex::encode_upper(swapped)
    }

    /// Decodes text produced by [`encode`]; accepts either letter case.
    pub fn decode(text: &str) -> Result<Vec<u8>> {
        let raw = ::hex::decode(text)
            .map_err(|err| Error::Serialization(format!("invalid hex '{text}': {err}")))?;
        Ok(raw.into_iter().map(|b| b.rotate_left(4)).collect())
    }
}

pub use buffer::BitBuffer;
