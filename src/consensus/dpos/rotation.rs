//! Signer rotation integrity: roster succession and missed-slot detection.
//!
//! Two missed-slot algorithms exist on chain. Which one applies is fixed by
//! block height through [`ProtocolPolicy`]; a header is never checked
//! against both. Producers and verifiers run the same pure functions, so an
//! embedded `signer_missing` list that differs from the recomputed one is a
//! protocol violation.

use super::{
    config::{ProtocolPolicy, RotationAlgorithm, RotationParams},
    error::{DposError, DposResult},
    extra::HeaderExtra,
};
use crate::primitives::Header;
use alloy_primitives::Address;

/// Missing signers under the legacy slot-index algorithm.
///
/// - `reality_index`: parent height modulo the roster size
/// - `parent_index` / `current_index`: absolute slot of parent and current
///   block since the loop start
/// - `new_loop`: the current block closes the loop, so every slot after the
///   parent up to the end of the loop counts as missed
pub fn compute_missing_legacy(
    queue: &[Address],
    reality_index: u64,
    parent_index: u64,
    current_index: u64,
    new_loop: bool,
) -> Vec<Address> {
    let len = queue.len() as u64;
    if len == 0 {
        return Vec::new();
    }
    let at = |slot: u64| queue[(slot % len) as usize];

    if new_loop {
        let remaining = len.saturating_sub(reality_index).saturating_sub(1);
        (0..remaining).map(|i| at(parent_index + 1 + i)).collect()
    } else {
        (parent_index.saturating_add(1)..current_index).map(at).collect()
    }
}

/// Missing signers under the Trantor scan algorithm.
///
/// The parent roster is doubled so the scan can wrap without modular
/// arithmetic. Entries after `last_signer` and before `current_signer` are
/// missing. When `grand_parent_queue` is given (first slot of a loop) the
/// last signer's position is taken from that roster instead and the scan
/// starts right after it.
pub fn compute_missing_trantor(
    last_signer: Address,
    current_signer: Address,
    parent_queue: &[Address],
    grand_parent_queue: Option<&[Address]>,
) -> DposResult<Vec<Address>> {
    let doubled: Vec<Address> = parent_queue.iter().chain(parent_queue).copied().collect();

    let (scan, mut recording) = match grand_parent_queue {
        Some(previous) => {
            let position = previous
                .iter()
                .position(|signer| *signer == last_signer)
                .ok_or(DposError::LastLoopHeaderFail { signer: last_signer })?;
            (doubled.get(position + 1..).unwrap_or_default(), true)
        }
        None => (doubled.as_slice(), false),
    };

    let mut missing = Vec::new();
    for signer in scan {
        if !recording {
            recording = *signer == last_signer;
            continue;
        }
        if *signer == current_signer {
            break;
        }
        missing.push(*signer);
    }
    Ok(missing)
}

/// Inputs for recomputing the missed-slot list of `header`.
#[derive(Debug, Clone, Copy)]
pub struct MissingContext<'a> {
    pub header: &'a Header,
    pub parent: &'a Header,
    pub parent_extra: &'a HeaderExtra,
    /// Grandparent roster; required on the first slot of a loop under
    /// Trantor.
    pub grand_parent_queue: Option<&'a [Address]>,
}

/// Roster and missed-slot checks parameterised by the rotation settings.
#[derive(Debug, Clone, Copy)]
pub struct RotationGuard {
    params: RotationParams,
}

impl RotationGuard {
    pub fn new(params: RotationParams) -> Self {
        Self { params }
    }

    /// Whether `number` closes a loop and carries a new roster.
    pub fn is_loop_end(&self, number: u64) -> bool {
        self.params.max_signer_count != 0 && number % self.params.max_signer_count == 0
    }

    /// Whether `number` is the first slot of a loop.
    pub fn is_loop_start(&self, number: u64) -> bool {
        self.params.max_signer_count != 0 && number % self.params.max_signer_count == 1
    }

    /// Structural checks on a freshly elected roster. Membership legality is
    /// the tally's call.
    pub fn verify_new_roster(&self, queue: &[Address]) -> DposResult<()> {
        if queue.is_empty() {
            return Err(DposError::SignerQueueEmpty);
        }
        if queue.len() as u64 != self.params.max_signer_count {
            return Err(DposError::InvalidSignerQueue);
        }
        if queue.iter().any(|signer| *signer == Address::ZERO) {
            return Err(DposError::InvalidSignerQueue);
        }
        Ok(())
    }

    /// Loop start time a header at `number` must carry: a loop end opens the
    /// next loop one full rotation later, every other header repeats its
    /// parent.
    pub fn expected_loop_start(&self, number: u64, parent_loop_start: u64) -> u64 {
        if self.is_loop_end(number) {
            parent_loop_start + self.params.period * self.params.max_signer_count
        } else {
            parent_loop_start
        }
    }

    pub fn verify_loop_start(&self, number: u64, parent_loop_start: u64, actual: u64) -> DposResult<()> {
        let expected = self.expected_loop_start(number, parent_loop_start);
        if expected != actual {
            return Err(DposError::InvalidLoopStartTime { expected, actual });
        }
        Ok(())
    }

    /// Mid-loop blocks must repeat the parent roster position by position.
    pub fn verify_unchanged_roster(&self, parent: &[Address], current: &[Address]) -> DposResult<()> {
        if parent != current {
            return Err(DposError::InvalidSignerQueue);
        }
        Ok(())
    }

    /// Recompute the missed-slot list with the algorithm `policy` selects.
    pub fn compute_missing(
        &self,
        policy: &ProtocolPolicy,
        ctx: &MissingContext<'_>,
    ) -> DposResult<Vec<Address>> {
        match policy.rotation {
            RotationAlgorithm::Legacy => {
                let period = self.params.period;
                if period == 0 {
                    return Ok(Vec::new());
                }
                let loop_start = ctx.parent_extra.loop_start_time;
                let reality_index = ctx.parent.number % self.params.max_signer_count.max(1);
                let parent_index = ctx.parent.time.saturating_sub(loop_start) / period;
                let current_index = ctx.header.time.saturating_sub(loop_start) / period;
                Ok(compute_missing_legacy(
                    &ctx.parent_extra.signer_queue,
                    reality_index,
                    parent_index,
                    current_index,
                    self.is_loop_end(ctx.header.number),
                ))
            }
            RotationAlgorithm::Trantor => {
                let grand_parent = if self.is_loop_start(ctx.header.number) {
                    Some(ctx.grand_parent_queue.ok_or(DposError::UnknownAncestor)?)
                } else {
                    None
                };
                compute_missing_trantor(
                    ctx.parent.coinbase,
                    ctx.header.coinbase,
                    &ctx.parent_extra.signer_queue,
                    grand_parent,
                )
            }
        }
    }

    /// Compare the embedded list against the recomputed one, element-wise.
    pub fn verify_missing(&self, expected: &[Address], embedded: &[Address]) -> DposResult<()> {
        if expected != embedded {
            return Err(DposError::PunishedMissing);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::dpos::config::{ExtraSchema, RotationAlgorithm};

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn roster(n: u8) -> Vec<Address> {
        (1..=n).map(addr).collect()
    }

    fn policy(rotation: RotationAlgorithm) -> ProtocolPolicy {
        ProtocolPolicy { rotation, extra_schema: ExtraSchema::V2, require_coinbase_signer: true }
    }

    #[test]
    fn test_legacy_new_loop_wraps() {
        let queue = roster(5);
        let missing = compute_missing_legacy(&queue, 3, 7, 0, true);

        // 5 - 3 - 1 entries starting at (7 + 1) mod 5
        assert_eq!(missing, vec![queue[3]]);
    }

    #[test]
    fn test_legacy_gap_within_loop() {
        let queue = roster(5);
        // parent at slot 1, current at slot 4: slots 2 and 3 went unused
        assert_eq!(compute_missing_legacy(&queue, 1, 1, 4, false), vec![queue[2], queue[3]]);
        // adjacent slots: nothing missed
        assert!(compute_missing_legacy(&queue, 1, 1, 2, false).is_empty());
        // gap across the end of the roster wraps around
        assert_eq!(compute_missing_legacy(&queue, 1, 3, 7, false), vec![queue[4], queue[0], queue[1]]);
    }

    #[test]
    fn test_legacy_new_loop_at_last_slot_is_empty() {
        let queue = roster(3);
        assert!(compute_missing_legacy(&queue, 2, 2, 3, true).is_empty());
        assert!(compute_missing_legacy(&[], 0, 0, 9, false).is_empty());
    }

    #[test]
    fn test_trantor_scan() {
        let queue = roster(5);
        // last signer 2, current 5: 3 and 4 missed
        let missing = compute_missing_trantor(addr(2), addr(5), &queue, None).unwrap();
        assert_eq!(missing, vec![addr(3), addr(4)]);

        // wrap: last signer 4, current 2
        let missing = compute_missing_trantor(addr(4), addr(2), &queue, None).unwrap();
        assert_eq!(missing, vec![addr(5), addr(1)]);

        // next in line: nothing missed
        assert!(compute_missing_trantor(addr(1), addr(2), &queue, None).unwrap().is_empty());
    }

    #[test]
    fn test_trantor_loop_start_uses_grandparent_frame() {
        let previous = vec![addr(7), addr(8), addr(9)];
        let queue = vec![addr(1), addr(2), addr(3)];

        // Last signer closed the previous loop in its last slot; the new loop
        // begins at position 0 of the new roster.
        let missing = compute_missing_trantor(addr(9), addr(3), &queue, Some(&previous)).unwrap();
        assert_eq!(missing, vec![addr(1), addr(2)]);

        // Previous loop closed early at slot 1: scan resumes at slot 2.
        let missing = compute_missing_trantor(addr(8), addr(1), &queue, Some(&previous)).unwrap();
        assert_eq!(missing, vec![addr(3)]);
    }

    #[test]
    fn test_trantor_loop_start_fails_closed() {
        let previous = vec![addr(7), addr(8), addr(9)];
        let queue = vec![addr(1), addr(2), addr(3)];

        assert_eq!(
            compute_missing_trantor(addr(4), addr(1), &queue, Some(&previous)),
            Err(DposError::LastLoopHeaderFail { signer: addr(4) })
        );
    }

    #[test]
    fn test_guard_dispatch_and_missing_grandparent() {
        let guard = RotationGuard::new(RotationParams { period: 10, max_signer_count: 3 });
        let parent_extra = HeaderExtra { signer_queue: roster(3), ..Default::default() };
        let parent = Header { number: 6, time: 60, coinbase: addr(1), ..Default::default() };
        let header = Header { number: 7, time: 90, coinbase: addr(1), ..Default::default() };

        let ctx = MissingContext {
            header: &header,
            parent: &parent,
            parent_extra: &parent_extra,
            grand_parent_queue: None,
        };
        assert_eq!(
            guard.compute_missing(&policy(RotationAlgorithm::Trantor), &ctx),
            Err(DposError::UnknownAncestor)
        );

        // Legacy: slots 7 and 8 between parent slot 6 and current slot 9.
        let legacy = guard.compute_missing(&policy(RotationAlgorithm::Legacy), &ctx).unwrap();
        assert_eq!(legacy, vec![addr(2), addr(3)]);
    }

    #[test]
    fn test_loop_start_advances_only_at_loop_end() {
        let guard = RotationGuard::new(RotationParams { period: 10, max_signer_count: 3 });

        assert_eq!(guard.expected_loop_start(4, 30), 30);
        assert_eq!(guard.expected_loop_start(6, 30), 60);
        guard.verify_loop_start(6, 30, 60).unwrap();
        assert_eq!(
            guard.verify_loop_start(6, 30, 5),
            Err(DposError::InvalidLoopStartTime { expected: 60, actual: 5 })
        );
        assert_eq!(
            guard.verify_loop_start(5, 30, 40),
            Err(DposError::InvalidLoopStartTime { expected: 30, actual: 40 })
        );
    }

    #[test]
    fn test_roster_checks() {
        let guard = RotationGuard::new(RotationParams { period: 10, max_signer_count: 3 });

        assert!(guard.verify_new_roster(&roster(3)).is_ok());
        assert_eq!(guard.verify_new_roster(&[]), Err(DposError::SignerQueueEmpty));
        assert_eq!(guard.verify_new_roster(&roster(2)), Err(DposError::InvalidSignerQueue));
        assert_eq!(
            guard.verify_new_roster(&[addr(1), Address::ZERO, addr(2)]),
            Err(DposError::InvalidSignerQueue)
        );

        assert!(guard.verify_unchanged_roster(&roster(3), &roster(3)).is_ok());
        assert_eq!(
            guard.verify_unchanged_roster(&roster(3), &[addr(1), addr(3), addr(2)]),
            Err(DposError::InvalidSignerQueue)
        );
        assert_eq!(
            guard.verify_missing(&[addr(1)], &[addr(1), addr(2)]),
            Err(DposError::PunishedMissing)
        );
    }
}
