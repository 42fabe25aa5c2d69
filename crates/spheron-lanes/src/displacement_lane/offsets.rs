// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Two-level (NUMA domain, local index) to flat index translation.

use spheron_core::agent::AgentHandle;
use spheron_core::error::DisplacementError;
use spheron_core::storage::AgentStorage;

/// Per-domain base offsets into the flat index space of one invocation.
///
/// `offsets[0] == 0` and `offsets[d + 1] == offsets[d] + count(d)`. The table
/// is only meaningful for the storage state it was built from and must be
/// rebuilt every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumaOffsetTable {
    offsets: Vec<u32>,
    counts: Vec<u32>,
    total: u32,
}

impl NumaOffsetTable {
    /// Builds the table from per-domain agent counts.
    pub fn from_counts(counts: &[usize]) -> Result<Self, DisplacementError> {
        let mut offsets = Vec::with_capacity(counts.len());
        let mut narrow = Vec::with_capacity(counts.len());
        let mut running: u64 = 0;
        for &count in counts {
            offsets.push(running as u32);
            running += count as u64;
            if running > u32::MAX as u64 {
                return Err(DisplacementError::IndexOverflow(running as usize));
            }
            narrow.push(count as u32);
        }
        Ok(Self {
            offsets,
            counts: narrow,
            total: running as u32,
        })
    }

    /// Builds the table from the current contents of `storage`.
    pub fn from_storage(storage: &dyn AgentStorage) -> Result<Self, DisplacementError> {
        let counts: Vec<usize> = (0..storage.numa_domain_count())
            .map(|d| storage.agent_count_in(d))
            .collect();
        Self::from_counts(&counts)
    }

    /// Base offset of `domain`.
    pub fn offset(&self, domain: usize) -> Option<u32> {
        self.offsets.get(domain).copied()
    }

    /// Flat index of `handle`, or `None` if the handle is outside the
    /// population the table was built from.
    #[inline]
    pub fn flat_index(&self, handle: AgentHandle) -> Option<u32> {
        let domain = handle.numa_domain();
        let local = handle.local_index();
        let count = *self.counts.get(domain)? as usize;
        if local >= count {
            return None;
        }
        Some(self.offsets[domain] + local as u32)
    }

    /// Total number of agents.
    pub fn total(&self) -> usize {
        self.total as usize
    }

    /// Number of NUMA domains.
    pub fn domain_count(&self) -> usize {
        self.offsets.len()
    }
}
