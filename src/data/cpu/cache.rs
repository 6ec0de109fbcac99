use serde::Serialize;

use super::bits::field;
use super::registers::{CpuIdReader, LEAF_L2_CACHE, query};
use crate::utils::format_bytes;

/// L2 cache geometry reported by the extended cache leaf
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct L2Cache {
    /// Total size in bytes, 0 when unavailable
    pub size_bytes: u32,
    /// Line size in bytes, 0 when unavailable
    pub line_bytes: u32,
}

impl L2Cache {
    pub fn read<R: CpuIdReader>(reader: &R) -> Self {
        let regs = query(reader, LEAF_L2_CACHE, 0);
        Self::from_ecx(regs.ecx)
    }

    /// ECX carries the line size in [0:7] and the size in KB in [16:31]
    pub fn from_ecx(ecx: u32) -> Self {
        Self {
            size_bytes: field(ecx, 16, 16).saturating_mul(1024),
            line_bytes: field(ecx, 0, 8),
        }
    }

    pub fn is_known(&self) -> bool {
        self.size_bytes != 0
    }

    /// Format for display (e.g., "1.0 MiB, 64 B lines")
    pub fn format(&self) -> String {
        if !self.is_known() {
            return "N/A".to_string();
        }

        if self.line_bytes == 0 {
            format_bytes(u64::from(self.size_bytes))
        } else {
            format!(
                "{}, {} B lines",
                format_bytes(u64::from(self.size_bytes)),
                self.line_bytes
            )
        }
    }
}
