//! Full-state snapshot shared with persistence and observers.

use serde::{Deserialize, Serialize};

use super::{MerchantRecord, Platform};

/// The complete captured state for both platforms.
///
/// This is the shape persisted under the single storage key, returned to
/// snapshot readers and pushed to observers after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Woaizuji records, in capture order.
    #[serde(default)]
    pub woaizuji: Vec<MerchantRecord>,
    /// Rrzu records, in capture order.
    #[serde(default)]
    pub rrzu: Vec<MerchantRecord>,
}

impl Snapshot {
    /// Returns the records for one platform.
    #[inline]
    #[must_use]
    pub fn records(&self, platform: Platform) -> &[MerchantRecord] {
        match platform {
            Platform::Woaizuji => &self.woaizuji,
            Platform::Rrzu => &self.rrzu,
        }
    }

    /// Returns a mutable reference to one platform's records.
    #[inline]
    pub fn records_mut(&mut self, platform: Platform) -> &mut Vec<MerchantRecord> {
        match platform {
            Platform::Woaizuji => &mut self.woaizuji,
            Platform::Rrzu => &mut self.rrzu,
        }
    }

    /// Returns a snapshot containing only the given platform's records.
    #[inline]
    #[must_use]
    pub fn only(&self, platform: Platform) -> Self {
        let mut filtered = Self::default();
        filtered
            .records_mut(platform)
            .extend_from_slice(self.records(platform));
        filtered
    }

    /// Total number of records across both platforms.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.woaizuji.len() + self.rrzu.len()
    }

    /// Returns `true` if neither platform has records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.woaizuji.is_empty() && self.rrzu.is_empty()
    }
}
