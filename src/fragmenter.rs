//! Fragmentation of outbound L2CAP PDUs into ACL packets.

use crate::packets::{AclBroadcastFlag, AclPacket, AclPacketBoundary};
use crate::param::ConnHandle;

/// Lazily produces the ACL fragments of one L2CAP PDU.
///
/// The first fragment carries the first-automatically-flushable boundary
/// flag, every following fragment is a continuation; all fragments are
/// point-to-point. Concatenating the fragment payloads yields the PDU.
pub struct AclFragmenter<'d> {
    handle: ConnHandle,
    payload: &'d [u8],
    fragment_size: usize,
    offset: usize,
}

impl<'d> AclFragmenter<'d> {
    pub fn new(handle: ConnHandle, fragment_size: usize, payload: &'d [u8]) -> Self {
        debug_assert!(fragment_size > 0);
        Self {
            handle,
            payload,
            fragment_size,
            offset: 0,
        }
    }

    /// Number of fragments this PDU splits into.
    pub fn fragments(&self) -> usize {
        self.payload.len().div_ceil(self.fragment_size)
    }
}

impl<'d> Iterator for AclFragmenter<'d> {
    type Item = AclPacket<'d>;

    fn next(&mut self) -> Option<AclPacket<'d>> {
        if self.offset >= self.payload.len() {
            return None;
        }
        let boundary = if self.offset == 0 {
            AclPacketBoundary::FirstFlushable
        } else {
            AclPacketBoundary::Continuing
        };
        let end = (self.offset + self.fragment_size).min(self.payload.len());
        let chunk = &self.payload[self.offset..end];
        self.offset = end;
        Some(AclPacket::new(
            self.handle,
            boundary,
            AclBroadcastFlag::PointToPoint,
            chunk,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(handle: u16, max: usize, payload: &[u8]) -> heapless::Vec<AclPacket<'_>, 16> {
        AclFragmenter::new(ConnHandle::new(handle), max, payload).collect()
    }

    #[test]
    fn single_fragment() {
        let payload = [1u8, 2, 3, 4];
        let frags = collect(0x42, 27, &payload);
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].boundary_flag(), AclPacketBoundary::FirstFlushable);
        assert_eq!(frags[0].broadcast_flag(), AclBroadcastFlag::PointToPoint);
        assert_eq!(frags[0].data(), &payload);
    }

    #[test]
    fn fragment_count_is_ceil_of_len_over_max() {
        let payload = [0u8; 70];
        let fragmenter = AclFragmenter::new(ConnHandle::new(1), 27, &payload);
        assert_eq!(fragmenter.fragments(), 3);

        let frags = collect(1, 27, &payload);
        assert_eq!(frags.len(), 3);
        assert_eq!(frags[0].data().len(), 27);
        assert_eq!(frags[1].data().len(), 27);
        assert_eq!(frags[2].data().len(), 16);
    }

    #[test]
    fn payload_reassembles_to_original() {
        let mut payload = [0u8; 61];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut out = heapless::Vec::<u8, 61>::new();
        for (i, frag) in collect(7, 20, &payload).iter().enumerate() {
            let expected = if i == 0 {
                AclPacketBoundary::FirstFlushable
            } else {
                AclPacketBoundary::Continuing
            };
            assert_eq!(frag.boundary_flag(), expected);
            out.extend_from_slice(frag.data()).unwrap();
        }
        assert_eq!(&out[..], &payload[..]);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let payload = [0u8; 54];
        let frags = collect(1, 27, &payload);
        assert_eq!(frags.len(), 2);
        assert!(frags.iter().all(|f| f.data().len() == 27));
    }
}
