/// XORs `payload` in place with the 4-byte `mask`.
///
/// The index is relative to the slice, so callers pass exactly one frame's
/// payload even when it is appended behind earlier fragments.
pub fn apply_mask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}
