//! GUID type and the pure ring-topology math.
//!
//! The network is a ring over `{1..=guid_max}` (GUID 0 is reserved for the
//! boot node and never a ring member). Peers are sampled at indices
//! `1, 2, 4, 8, ...` walking backwards around the ring from `self`.

use std::fmt;

use crate::error::SdkError;

/// A node's dense integer identifier. GUID 0 is reserved for the boot node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Guid(pub u64);

impl Guid {
    pub const BOOT: Guid = Guid(0);

    pub fn is_boot(self) -> bool {
        self == Self::BOOT
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Guid {
    fn from(id: u64) -> Self {
        Guid(id)
    }
}

impl From<Guid> for u64 {
    fn from(guid: Guid) -> Self {
        guid.0
    }
}

/// Pure, stateless ring math. Every method takes `self_guid` and `guid_max`
/// explicitly rather than reading from shared state — see the "no hidden
/// shared state" design note.
pub struct RingTopology;

impl RingTopology {
    /// The ring rotated so `self_guid` comes first, then descends (wrapping)
    /// through every other member of `{1..=guid_max}`.
    ///
    /// `network_sequence(5, 9) == [5, 4, 3, 2, 1, 9, 8, 7, 6]`.
    pub fn network_sequence(self_guid: Guid, guid_max: Guid) -> Vec<Guid> {
        let max = guid_max.0;
        if max == 0 {
            return Vec::new();
        }
        let descending: Vec<u64> = (1..=max).rev().collect();
        let offset = descending
            .iter()
            .position(|&g| g == self_guid.0)
            .unwrap_or(0);
        descending[offset..]
            .iter()
            .chain(descending[..offset].iter())
            .map(|&id| Guid(id))
            .collect()
    }

    /// Peers at indices `1, 2, 4, 8, ...` of [`network_sequence`], while the
    /// index stays strictly less than `guid_max`. Length is the count of
    /// powers of two strictly less than `max`.
    pub fn primary_peers(self_guid: Guid, guid_max: Guid) -> Vec<Guid> {
        let max = guid_max.0;
        if max == 0 {
            return Vec::new();
        }
        let network = Self::network_sequence(self_guid, guid_max);
        let mut distance = 1u64;
        let mut peers = Vec::new();
        while distance < max {
            peers.push(network[distance as usize]);
            distance *= 2;
        }
        peers
    }

    /// The ring segment strictly between `start` and `stop`: if `stop`
    /// appears after `start` in [`network_sequence`], the open interval
    /// `(idx(start), idx(stop))`; otherwise the tail `(idx(start), end]`.
    ///
    /// Fails with [`SdkError::GuidNotInNetwork`] if either endpoint is not a
    /// member of the ring for `guid_max`.
    pub fn backup_peers(
        self_guid: Guid,
        start: Guid,
        stop: Guid,
        guid_max: Guid,
    ) -> Result<Vec<Guid>, SdkError> {
        let network = Self::network_sequence(self_guid, guid_max);
        let start_idx = network
            .iter()
            .position(|&g| g == start)
            .ok_or(SdkError::GuidNotInNetwork(start))?;
        let stop_idx = network
            .iter()
            .position(|&g| g == stop)
            .ok_or(SdkError::GuidNotInNetwork(stop))?;
        if stop_idx > start_idx {
            Ok(network[start_idx + 1..stop_idx].to_vec())
        } else {
            Ok(network[start_idx + 1..].to_vec())
        }
    }
}
