//! Image checksum expected by the Build HAT `load` command.
//!
//! This is not a standard CRC: the accumulator starts at 1, is shifted
//! before each byte is folded in, and reduces with polynomial `0x1D872B41`
//! whenever the top bit falls off. The bootloader recomputes the same value
//! over the received bytes and rejects the image on mismatch.

/// Reduction polynomial.
pub const POLYNOMIAL: u32 = 0x1D87_2B41;

/// Accumulator value before any byte is processed.
pub const INITIAL: u32 = 1;

/// Compute the Build HAT image checksum over `data`.
pub fn checksum(data: &[u8]) -> u32 {
    data.iter()
        .fold(INITIAL, |acc, &b| update(acc, b))
}

#[inline]
fn update(acc: u32, byte: u8) -> u32 {
    let shifted = if acc & 0x8000_0000 != 0 {
        (acc << 1) ^ POLYNOMIAL
    } else {
        acc << 1
    };
    shifted ^ u32::from(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small xorshift generator so the sweep below is reproducible.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn bytes(&mut self, len: usize) -> Vec<u8> {
            (0..len)
                .map(|_| (self.next() & 0xFF) as u8)
                .collect()
        }
    }

    #[test]
    fn test_empty_buffer_is_initial_value() {
        assert_eq!(checksum(&[]), 1);
    }

    #[test]
    fn test_known_small_buffer() {
        // 1 -> 2^1=3 -> 6^2=4 -> 8^3=11 -> 22^4=18
        assert_eq!(checksum(&[0x01, 0x02, 0x03, 0x04]), 18);
    }

    #[test]
    fn test_polynomial_applied_when_high_bit_set() {
        // 31 zero bytes walk the initial 1 up to bit 31; the 32nd shifts it
        // out and folds in the polynomial.
        assert_eq!(checksum(&[0u8; 31]), 0x8000_0000);
        assert_eq!(checksum(&[0u8; 32]), POLYNOMIAL);
    }

    #[test]
    fn test_deterministic() {
        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
        let data = rng.bytes(4096);
        assert_eq!(checksum(&data), checksum(&data));
    }

    #[test]
    fn test_single_byte_change_is_detected() {
        let mut rng = XorShift(0xD1B5_4A32_D192_ED03);
        for _ in 0..200 {
            let len = 1 + (rng.next() % 512) as usize;
            let data = rng.bytes(len);
            let original = checksum(&data);

            let index = (rng.next() % len as u64) as usize;
            let delta = 1 + (rng.next() % 255) as u8;
            let mut changed = data.clone();
            changed[index] ^= delta;

            assert_ne!(
                original,
                checksum(&changed),
                "byte {index} of {len} flipped by {delta:#04x} went unnoticed"
            );
        }
    }
}
