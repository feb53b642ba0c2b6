/*!
    Packed 10-bit RGB unpacking.
*/

/**
    Expand `X2Rgb10le` rows into `Rgb48le` rows.

    Each source pixel is a little-endian 32-bit word holding red in bits 20..30,
    green in bits 10..20 and blue in bits 0..10. Components are widened to 16
    bits by replicating their top bits into the low bits, so full scale maps to
    full scale.
*/
pub fn unpack_x2rgb10(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    width: usize,
    height: usize,
) {
    for row in 0..height {
        let src_row = &src[row * src_stride..row * src_stride + width * 4];
        let dst_row = &mut dst[row * dst_stride..row * dst_stride + width * 6];
        for (word, out) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(6)) {
            let word = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            let r = widen((word >> 20) & 0x3ff);
            let g = widen((word >> 10) & 0x3ff);
            let b = widen(word & 0x3ff);
            out[0..2].copy_from_slice(&r.to_le_bytes());
            out[2..4].copy_from_slice(&g.to_le_bytes());
            out[4..6].copy_from_slice(&b.to_le_bytes());
        }
    }
}

fn widen(component: u32) -> u16 {
    (component << 6 | component >> 4) as u16
}
