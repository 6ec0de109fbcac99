use super::registers::{CpuIdReader, LEAF_BRAND_FIRST, LEAF_BRAND_LAST, query};
use super::vendor::push_register_bytes;

/// Read the processor name from the three brand string leaves.
///
/// Each leaf contributes EAX, EBX, ECX and EDX in that order. The string is
/// NUL padded and Intel parts right-justify it, so both ends are trimmed.
pub fn read_processor_name<R: CpuIdReader>(reader: &R) -> Option<String> {
    let mut bytes = Vec::with_capacity(48);
    for leaf in LEAF_BRAND_FIRST..=LEAF_BRAND_LAST {
        let regs = query(reader, leaf, 0);
        for register in [regs.eax, regs.ebx, regs.ecx, regs.edx] {
            push_register_bytes(&mut bytes, register);
        }
    }
    decode_brand_bytes(&bytes)
}

fn decode_brand_bytes(bytes: &[u8]) -> Option<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let name = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
    if name.is_empty() { None } else { Some(name) }
}
