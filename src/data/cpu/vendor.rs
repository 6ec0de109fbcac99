use std::fmt;

use serde::Serialize;

pub const INTEL_VENDOR_ID: &str = "GenuineIntel";
pub const AMD_VENDOR_ID: &str = "AuthenticAMD";

/// Processor vendor, resolved once from the leaf 0 vendor id
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Intel,
    Amd,
    #[default]
    Unknown,
}

impl Vendor {
    pub fn from_id(vendor_id: &str) -> Self {
        match vendor_id {
            INTEL_VENDOR_ID => Vendor::Intel,
            AMD_VENDOR_ID => Vendor::Amd,
            _ => Vendor::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Vendor::Intel => "Intel",
            Vendor::Amd => "AMD",
            Vendor::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Append the four bytes of a register, least significant byte first
pub fn push_register_bytes(bytes: &mut Vec<u8>, register: u32) {
    bytes.extend_from_slice(&register.to_le_bytes());
}

/// Decode the 12-byte vendor id; the registers are concatenated as EBX, EDX, ECX.
pub fn decode_vendor_id(ebx: u32, edx: u32, ecx: u32) -> String {
    let mut bytes = Vec::with_capacity(12);
    for register in [ebx, edx, ecx] {
        push_register_bytes(&mut bytes, register);
    }
    // one char per byte keeps the id at twelve characters
    bytes.into_iter().map(char::from).collect()
}
