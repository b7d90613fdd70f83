use glam::Vec2;

use crate::collision::narrowphase::{ContactFeature, FeatureKind};

/// A candidate contact vertex carried through the clipping passes, tagged
/// with the feature pair that produced it so ids stay stable across frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub feature: ContactFeature,
}

/// Sutherland–Hodgman clip of a two-point segment against a single side
/// plane. Returns the number of output points (0..=2).
pub fn clip_segment_to_line(
    v_out: &mut [ClipVertex; 2],
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: usize,
) -> usize {
    let mut count = 0;

    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // The segment crosses the plane; emit the intersection with a feature id
    // naming the clipping vertex so the point survives re-identification.
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + interp * (v_in[1].v - v_in[0].v);
        v_out[count].feature = ContactFeature {
            index_a: vertex_index_a as u8,
            index_b: v_in[0].feature.index_b,
            kind_a: FeatureKind::Vertex,
            kind_b: FeatureKind::Face,
        };
        count += 1;
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_fully_inside_passes_through() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(0.0, -1.0),
                ..Default::default()
            },
            ClipVertex {
                v: Vec2::new(0.0, 1.0),
                ..Default::default()
            },
        ];
        let mut v_out = [ClipVertex::default(); 2];
        let n = clip_segment_to_line(&mut v_out, &v_in, Vec2::X, 1.0, 0);
        assert_eq!(n, 2);
    }

    #[test]
    fn crossing_segment_is_clipped_at_the_plane() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                ..Default::default()
            },
            ClipVertex {
                v: Vec2::new(3.0, 0.0),
                ..Default::default()
            },
        ];
        let mut v_out = [ClipVertex::default(); 2];
        let n = clip_segment_to_line(&mut v_out, &v_in, Vec2::X, 1.0, 4);
        assert_eq!(n, 2);
        assert!((v_out[1].v.x - 1.0).abs() < 1e-6);
        assert_eq!(v_out[1].feature.index_a, 4);
    }
}
