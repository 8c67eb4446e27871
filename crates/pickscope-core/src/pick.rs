//! Pick results and the identifier-to-color encoding.
//!
//! Any pass that writes per-object color for the id-buffer must use
//! [`encode_id`], and anything reading it back must use [`decode_id`]:
//!
//! - R contains bits 0-7
//! - G contains bits 8-15
//! - B contains bits 16-23
//!
//! `(0, 0, 0)` is the background and never decodes to an object.

use std::collections::BTreeSet;

use crate::id::ObjectId;

/// Set of object identifiers returned by a region pick.
pub type IdSet = BTreeSet<ObjectId>;

/// Result of a single-point pick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PickResult {
    /// Whether something was hit.
    pub hit: bool,
    /// The identifier of the nearest object. `None` unless `hit`.
    pub id: Option<ObjectId>,
    /// Distance along the ray to the hit. Only meaningful for ray picks.
    pub distance: f32,
}

impl PickResult {
    /// A pick that found nothing.
    #[must_use]
    pub const fn miss() -> Self {
        Self {
            hit: false,
            id: None,
            distance: 0.0,
        }
    }

    /// A pick that resolved to `id` at ray distance `distance`.
    #[must_use]
    pub const fn hit(id: ObjectId, distance: f32) -> Self {
        Self {
            hit: true,
            id: Some(id),
            distance,
        }
    }

    /// Builds a result from an id-buffer readback, which carries no distance.
    #[must_use]
    pub const fn from_id(id: Option<ObjectId>) -> Self {
        match id {
            Some(id) => Self::hit(id, 0.0),
            None => Self::miss(),
        }
    }
}

/// An 8-bit RGB color carrying a 24-bit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IdColor(pub [u8; 3]);

impl IdColor {
    /// The background / "no object" color.
    pub const NONE: Self = Self([0, 0, 0]);

    /// Normalized RGBA for writing through an `Rgba8Unorm` target.
    ///
    /// `k / 255.0` converts back to exactly `k` on store, so the encoding
    /// survives the float round trip.
    #[must_use]
    pub fn to_unorm(self) -> [f32; 4] {
        let [r, g, b] = self.0;
        [
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            1.0,
        ]
    }
}

/// Encodes a raw index as a pick color. Only the low 24 bits are kept.
#[must_use]
pub fn index_to_color(index: u32) -> [u8; 3] {
    [
        (index & 0xFF) as u8,
        ((index >> 8) & 0xFF) as u8,
        ((index >> 16) & 0xFF) as u8,
    ]
}

/// Decodes a pick color back to a raw index.
#[must_use]
pub fn color_to_index(r: u8, g: u8, b: u8) -> u32 {
    u32::from(r) | (u32::from(g) << 8) | (u32::from(b) << 16)
}

/// Encodes an object identifier as its id-buffer color.
#[must_use]
pub fn encode_id(id: ObjectId) -> IdColor {
    IdColor(index_to_color(id.get()))
}

/// Decodes an id-buffer color. Background decodes to `None`.
#[must_use]
pub fn decode_id(color: IdColor) -> Option<ObjectId> {
    let [r, g, b] = color.0;
    ObjectId::new(color_to_index(r, g, b))
}

/// Decodes one RGBA8 pixel.
#[must_use]
pub fn decode_rgba(pixel: [u8; 4]) -> Option<ObjectId> {
    decode_id(IdColor([pixel[0], pixel[1], pixel[2]]))
}

/// Collects every distinct nonzero identifier in an RGBA8 readback.
///
/// `bytes_per_row` may exceed `width * 4` when rows carry copy alignment
/// padding; padding bytes are skipped. An object only needs to cover one
/// pixel to be included.
#[must_use]
pub fn decode_rgba_region(data: &[u8], width: u32, height: u32, bytes_per_row: u32) -> IdSet {
    let tight = width as usize * 4;
    let stride = bytes_per_row as usize;
    let mut ids = IdSet::new();
    if tight == 0 || stride < tight {
        return ids;
    }

    for row in data.chunks(stride).take(height as usize) {
        let Some(row) = row.get(..tight) else {
            break;
        };
        for px in row.chunks_exact(4) {
            if let Some(id) = decode_rgba([px[0], px[1], px[2], px[3]]) {
                ids.insert(id);
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(raw: u32) -> ObjectId {
        ObjectId::new(raw).unwrap()
    }

    #[test]
    fn test_specific_colors() {
        assert_eq!(index_to_color(0), [0, 0, 0]);
        assert_eq!(index_to_color(1), [1, 0, 0]);
        assert_eq!(index_to_color(255), [255, 0, 0]);
        assert_eq!(index_to_color(256), [0, 1, 0]);
        assert_eq!(index_to_color(0xFF0000), [0, 0, 255]);
        assert_eq!(index_to_color(0x00FF00), [0, 255, 0]);
        assert_eq!(index_to_color(0x0000FF), [255, 0, 0]);
        assert_eq!(index_to_color(0x0123_4567), [0x67, 0x45, 0x23]);
    }

    #[test]
    fn test_background_is_no_object() {
        assert_eq!(decode_id(IdColor::NONE), None);
        assert_eq!(decode_rgba([0, 0, 0, 255]), None);
        assert_eq!(IdColor::NONE.to_unorm(), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unorm_round_trip_is_exact() {
        let color = encode_id(id(0x00AB_CDEF));
        let stored = color
            .to_unorm()
            .map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8);
        assert_eq!([stored[0], stored[1], stored[2]], color.0);
    }

    #[test]
    fn test_region_decode_skips_padding_and_background() {
        // 2x2 image with 12 bytes of row padding
        let stride = 20;
        let mut data = vec![0u8; stride * 2];
        data[0..4].copy_from_slice(&[7, 0, 0, 255]);
        data[stride + 4..stride + 8].copy_from_slice(&[0, 1, 0, 255]);
        // Garbage in the padding must be ignored
        data[8..12].copy_from_slice(&[9, 9, 9, 255]);

        let ids = decode_rgba_region(&data, 2, 2, stride as u32);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![id(7), id(256)]);
    }

    #[test]
    fn test_region_decode_any_coverage() {
        // 800x600 target with two disks of radius 20 at (100,100) and (150,100)
        let (w, h) = (800u32, 600u32);
        let mut image = vec![0u8; (w * h * 4) as usize];
        let disks = [(100.0f32, 100.0f32, id(11)), (150.0, 100.0, id(12))];
        for y in 0..h {
            for x in 0..w {
                for (cx, cy, obj) in disks {
                    let (dx, dy) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
                    if dx * dx + dy * dy <= 400.0 {
                        let o = ((y * w + x) * 4) as usize;
                        let c = encode_id(obj).0;
                        image[o..o + 4].copy_from_slice(&[c[0], c[1], c[2], 255]);
                    }
                }
            }
        }

        // Rectangle (80,80)-(200,140)
        let (rx, ry, rw, rh) = (80u32, 80u32, 120u32, 60u32);
        let mut region = Vec::with_capacity((rw * rh * 4) as usize);
        for y in ry..ry + rh {
            let start = ((y * w + rx) * 4) as usize;
            region.extend_from_slice(&image[start..start + (rw * 4) as usize]);
        }
        let ids = decode_rgba_region(&region, rw, rh, rw * 4);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![id(11), id(12)]);

        // Empty background rectangle
        let mut empty = Vec::new();
        for y in 400..420u32 {
            let start = ((y * w + 600) * 4) as usize;
            empty.extend_from_slice(&image[start..start + 80]);
        }
        assert!(decode_rgba_region(&empty, 20, 20, 80).is_empty());
    }

    #[test]
    fn test_pick_result_constructors() {
        assert!(!PickResult::miss().hit);
        let r = PickResult::hit(id(3), 5.0);
        assert!(r.hit);
        assert_eq!(r.id, Some(id(3)));
        assert_eq!(PickResult::from_id(None), PickResult::miss());
    }

    #[test]
    fn test_full_range_round_trip() {
        for raw in 1..=crate::id::MAX_OBJECT_ID {
            let decoded = decode_id(IdColor(index_to_color(raw)));
            assert_eq!(decoded.map(ObjectId::get), Some(raw));
        }
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(raw in 1u32..=crate::id::MAX_OBJECT_ID) {
            let obj = ObjectId::new(raw).unwrap();
            prop_assert_eq!(decode_id(encode_id(obj)), Some(obj));
        }

        #[test]
        fn prop_encoding_never_black(raw in 1u32..=crate::id::MAX_OBJECT_ID) {
            let obj = ObjectId::new(raw).unwrap();
            prop_assert_ne!(encode_id(obj), IdColor::NONE);
        }
    }
}
