/// TCP sequence number, RFC 793 Section 3.3
///
/// The actual sequence number space is finite, though very large. This
/// space ranges from 0 to 2**32 - 1. Since the space is finite, all
/// arithmetic dealing with sequence numbers must be performed modulo 2**32.
/// This unsigned arithmetic preserves the relationship of sequence numbers
/// as they cycle from 2**32 - 1 to 0 again.
///
/// Internally the stack works with 64-bit absolute stream indices, which
/// never wrap in practice; only the wire carries the 32-bit form. `wrap`
/// projects an absolute index onto the wire space relative to the
/// connection's initial sequence number, and `unwrap` recovers the absolute
/// index nearest a checkpoint the caller already trusts (typically the
/// number of bytes already processed).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeqNo(u32);

impl SeqNo {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    /// Project an absolute sequence number onto the 32-bit wire space.
    pub fn wrap(n: u64, zero_point: SeqNo) -> SeqNo {
        SeqNo(zero_point.0.wrapping_add(n as u32))
    }

    /// Recover the absolute sequence number closest to `checkpoint` whose
    /// low 32 bits match `self - zero_point`.
    ///
    /// Of the values sharing those low bits, at most three are candidates:
    /// one in the checkpoint's own 2**32 block and one in each neighbouring
    /// block. Equidistant candidates resolve to the smaller value.
    pub fn unwrap(self, zero_point: SeqNo, checkpoint: u64) -> u64 {
        const BLOCK: u64 = 1 << 32;
        let delta = self.0.wrapping_sub(zero_point.0) as u64;
        let mid = (checkpoint & !(BLOCK - 1)) + delta;

        [mid.checked_sub(BLOCK), Some(mid), mid.checked_add(BLOCK)]
            .into_iter()
            .flatten()
            .min_by_key(|cand| (cand.abs_diff(checkpoint), *cand))
            .unwrap_or(mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: u64 = 1 << 32;

    #[test]
    fn wrap_is_modular() {
        assert_eq!(SeqNo::wrap(0, SeqNo::new(0)), SeqNo::new(0));
        assert_eq!(SeqNo::wrap(3 * BLOCK, SeqNo::new(0)), SeqNo::new(0));
        assert_eq!(SeqNo::wrap(3 * BLOCK + 17, SeqNo::new(15)), SeqNo::new(32));
        assert_eq!(SeqNo::wrap(7, SeqNo::new(u32::MAX)), SeqNo::new(6));
    }

    #[test]
    fn unwrap_picks_the_candidate_near_the_checkpoint() {
        let zero = SeqNo::new(0);
        assert_eq!(SeqNo::new(0xFFFF_FFFE).unwrap(zero, 0), 4_294_967_294);
        assert_eq!(SeqNo::new(1).unwrap(zero, 5), 1);
        assert_eq!(SeqNo::new(1).unwrap(zero, BLOCK + 1), BLOCK + 1);
        assert_eq!(SeqNo::new(10).unwrap(zero, 10 * BLOCK), 10 * BLOCK + 10);
        assert_eq!(SeqNo::new(10).unwrap(zero, 10 * BLOCK - 5), 10 * BLOCK + 10);
    }

    #[test]
    fn unwrap_respects_the_zero_point() {
        let zero = SeqNo::new(5);
        assert_eq!(SeqNo::new(5).unwrap(zero, 0), 0);
        assert_eq!(SeqNo::new(4).unwrap(zero, 0), BLOCK - 1);
        assert_eq!(SeqNo::new(7).unwrap(SeqNo::new(u32::MAX), 0), 8);
    }

    #[test]
    fn wrap_then_unwrap_round_trips() {
        for &zero in &[SeqNo::new(0), SeqNo::new(1 << 31), SeqNo::new(u32::MAX)] {
            for &n in &[
                0u64,
                1,
                0xFFFF_FFFF,
                BLOCK,
                BLOCK + 1,
                5 * BLOCK - 1,
                (1 << 63) + 12_345,
            ] {
                assert_eq!(SeqNo::wrap(n, zero).unwrap(zero, n), n, "n={n} zero={zero:?}");
            }
        }
    }

    #[test]
    fn unwrap_stays_within_half_a_block_of_the_checkpoint() {
        for &checkpoint in &[0u64, 1, BLOCK - 1, BLOCK, 17 * BLOCK + 3, 1 << 40] {
            for &raw in &[0u32, 1, 0x7FFF_FFFF, 0x8000_0000, u32::MAX] {
                let abs = SeqNo::new(raw).unwrap(SeqNo::new(0), checkpoint);
                assert!(abs.abs_diff(checkpoint) <= 1 << 31, "raw={raw} checkpoint={checkpoint}");
            }
        }
    }
}
