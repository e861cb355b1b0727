//! Image layout helpers
//!
//! Images exchanged by this server use LSBFirst image byte order, LSBFirst
//! bitmap bit order and a 32-bit scanline pad. Z images use the pixmap
//! format of their depth (1, 8, 16 or 32 bits per pixel).

use super::errors::{X11Error, X11Result};

/// Scanline pad in bits
pub const SCANLINE_PAD: usize = 32;

/// Bits per pixel of the Z format used for `depth`
pub fn bits_per_pixel(depth: u8) -> usize {
    match depth {
        1 => 1,
        2..=8 => 8,
        9..=16 => 16,
        _ => 32,
    }
}

fn pad_bits(bits: usize) -> Option<usize> {
    Some(bits.checked_add(SCANLINE_PAD - 1)? / SCANLINE_PAD * (SCANLINE_PAD / 8))
}

/// Bytes per Z scanline (PixmapBytePad)
pub fn pixmap_row_bytes(width: usize, depth: u8) -> Option<usize> {
    pad_bits(width.checked_mul(bits_per_pixel(depth))?)
}

/// Bytes per bitmap scanline (BitmapBytePad)
pub fn bitmap_row_bytes(width: usize) -> Option<usize> {
    pad_bits(width)
}

/// Mask of the planes that exist at `depth`
pub fn depth_mask(depth: u8) -> u32 {
    if depth >= 32 {
        u32::MAX
    } else {
        (1u32 << depth) - 1
    }
}

/// Allocate a zeroed buffer of `len` bytes, reporting BadAlloc instead of
/// aborting when the allocation cannot be satisfied
pub fn alloc_image(len: usize) -> X11Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| X11Error::bad_alloc())?;
    data.resize(len, 0);
    Ok(data)
}

/// Size in bytes of a Z image
pub fn z_image_len(width: usize, height: usize, depth: u8) -> Option<usize> {
    pixmap_row_bytes(width, depth)?.checked_mul(height)
}

/// Size in bytes of an XY image holding the planes of `plane_mask`
pub fn xy_image_len(width: usize, height: usize, depth: u8, plane_mask: u32) -> Option<usize> {
    let planes = (plane_mask & depth_mask(depth)).count_ones() as usize;
    bitmap_row_bytes(width)?.checked_mul(height)?.checked_mul(planes)
}

/// Read one pixel from a Z image
pub fn get_pixel(data: &[u8], row_bytes: usize, depth: u8, x: usize, y: usize) -> u32 {
    let row = y * row_bytes;
    match bits_per_pixel(depth) {
        1 => {
            let byte = data.get(row + x / 8).copied().unwrap_or(0);
            ((byte >> (x % 8)) & 1) as u32
        }
        bpp => {
            let bytes = bpp / 8;
            let start = row + x * bytes;
            data.get(start..start + bytes)
                .map(|b| {
                    b.iter()
                        .enumerate()
                        .fold(0u32, |acc, (i, v)| acc | (*v as u32) << (8 * i))
                })
                .unwrap_or(0)
        }
    }
}

/// Write one pixel into a Z image
pub fn put_pixel(data: &mut [u8], row_bytes: usize, depth: u8, x: usize, y: usize, pixel: u32) {
    let row = y * row_bytes;
    match bits_per_pixel(depth) {
        1 => {
            if let Some(byte) = data.get_mut(row + x / 8) {
                if pixel & 1 != 0 {
                    *byte |= 1 << (x % 8);
                } else {
                    *byte &= !(1 << (x % 8));
                }
            }
        }
        bpp => {
            let bytes = bpp / 8;
            let start = row + x * bytes;
            if let Some(dst) = data.get_mut(start..start + bytes) {
                for (i, b) in dst.iter_mut().enumerate() {
                    *b = (pixel >> (8 * i)) as u8;
                }
            }
        }
    }
}

/// Encode a pixel grid as a Z image
pub fn encode_z(pixels: &[u32], width: usize, height: usize, depth: u8) -> X11Result<Vec<u8>> {
    let row_bytes = pixmap_row_bytes(width, depth).ok_or_else(X11Error::bad_alloc)?;
    let len = row_bytes.checked_mul(height).ok_or_else(X11Error::bad_alloc)?;
    let mut data = alloc_image(len)?;
    let mask = depth_mask(depth);
    for y in 0..height {
        for x in 0..width {
            let pixel = pixels.get(y * width + x).copied().unwrap_or(0) & mask;
            put_pixel(&mut data, row_bytes, depth, x, y, pixel);
        }
    }
    Ok(data)
}

/// Convert a Z image into XY planes, most significant plane first, keeping
/// only the planes selected by `plane_mask`
pub fn z_to_xy(
    z: &[u8],
    width: usize,
    height: usize,
    depth: u8,
    plane_mask: u32,
) -> X11Result<Vec<u8>> {
    let z_row = pixmap_row_bytes(width, depth).ok_or_else(X11Error::bad_alloc)?;
    let xy_row = bitmap_row_bytes(width).ok_or_else(X11Error::bad_alloc)?;
    let len = xy_image_len(width, height, depth, plane_mask).ok_or_else(X11Error::bad_alloc)?;
    let mut out = alloc_image(len)?;

    let mut offset = 0;
    for plane in (0..depth.min(32)).rev() {
        let bit = 1u32 << plane;
        if plane_mask & bit == 0 {
            continue;
        }
        let plane_data = &mut out[offset..offset + xy_row * height];
        for y in 0..height {
            for x in 0..width {
                if get_pixel(z, z_row, depth, x, y) & bit != 0 {
                    plane_data[y * xy_row + x / 8] |= 1 << (x % 8);
                }
            }
        }
        offset += xy_row * height;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_padding() {
        assert_eq!(pixmap_row_bytes(3, 24), Some(12));
        assert_eq!(pixmap_row_bytes(3, 8), Some(4));
        assert_eq!(pixmap_row_bytes(5, 16), Some(12));
        assert_eq!(bitmap_row_bytes(33), Some(8));
        assert_eq!(pixmap_row_bytes(usize::MAX, 24), None);
    }

    #[test]
    fn test_pixel_access_depth_1_and_24() {
        let mut bits = vec![0u8; 4];
        put_pixel(&mut bits, 4, 1, 9, 0, 1);
        assert_eq!(bits[1], 0b10);
        assert_eq!(get_pixel(&bits, 4, 1, 9, 0), 1);

        let mut z = vec![0u8; 8];
        put_pixel(&mut z, 8, 24, 1, 0, 0x00ab_cdef);
        assert_eq!(&z[4..8], &[0xef, 0xcd, 0xab, 0x00]);
        assert_eq!(get_pixel(&z, 8, 24, 1, 0), 0x00ab_cdef);
    }

    #[test]
    fn test_z_to_xy_selects_planes() {
        // Two pixels at depth 8: 0b1000_0001 and 0b0000_0001
        let z = encode_z(&[0x81, 0x01], 2, 1, 8).unwrap();
        let xy = z_to_xy(&z, 2, 1, 8, 0x81).unwrap();
        // Plane 7 first, then plane 0
        assert_eq!(xy.len(), 8);
        assert_eq!(xy[0], 0b01);
        assert_eq!(xy[4], 0b11);
    }
}
