//! Hexagonal lattice geometry.
//!
//! Hexes are pointy-top with circumradius [`HEX_RADIUS`]. World space is in
//! pixels with y growing downward. Rows are [`HEX_V_SPACING`] apart; rows with
//! an even global index are shifted right by half a hex width, odd rows start
//! on chunk edges. Chunks hold `CHUNK_SIZE x CHUNK_SIZE` hexes.

use glam::DVec2;
use serde::{Deserialize, Serialize};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Circumradius of a hex in pixels.
pub const HEX_RADIUS: f64 = 30.0;
/// Horizontal distance between neighbouring centers in a row.
pub const HEX_WIDTH: f64 = SQRT_3 * HEX_RADIUS;
/// Vertical distance between rows.
pub const HEX_V_SPACING: f64 = 1.5 * HEX_RADIUS;
/// Hexes per chunk along each axis.
pub const CHUNK_SIZE: i32 = 32;
/// Chunk width in pixels.
pub const CHUNK_WIDTH: f64 = CHUNK_SIZE as f64 * HEX_WIDTH;
/// Chunk height in pixels.
pub const CHUNK_HEIGHT: f64 = CHUNK_SIZE as f64 * HEX_V_SPACING;

/// Fraction of a cell absorbed when flooring, so two computations of the
/// same center land in the same slot.
const FLOOR_EPSILON: f64 = 1e-6;

fn floor_cell(v: f64) -> i32 {
    (v + FLOOR_EPSILON).floor() as i32
}

/// Chunk coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk column.
    pub x: i32,
    /// Chunk row (grows downward).
    pub y: i32,
}

impl ChunkPos {
    /// Construct a chunk position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing world point `p`.
    pub fn containing(p: DVec2) -> Self {
        Self {
            x: floor_cell(p.x / CHUNK_WIDTH),
            y: floor_cell(p.y / CHUNK_HEIGHT),
        }
    }

    /// World-space top-left corner of the chunk.
    pub fn origin(self) -> DVec2 {
        DVec2::new(self.x as f64 * CHUNK_WIDTH, self.y as f64 * CHUNK_HEIGHT)
    }
}

/// Chunk containing world point `p`.
pub fn chunk_pos_of(p: DVec2) -> ChunkPos {
    ChunkPos::containing(p)
}

/// Slot of a hex inside its chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalCoord {
    /// Row within the chunk, `0..CHUNK_SIZE`.
    pub row: i32,
    /// Column within the chunk, `0..CHUNK_SIZE`.
    pub col: i32,
}

impl LocalCoord {
    /// Construct a local coordinate.
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Slot addressed by world point `p` relative to `chunk`.
    ///
    /// Only meaningful for hex centers; callers snap with
    /// [`world_to_hex_center`] first.
    pub fn from_world(chunk: ChunkPos, p: DVec2) -> Self {
        let origin = chunk.origin();
        let row = floor_cell((p.y - origin.y) / HEX_V_SPACING);
        let shift = if row.rem_euclid(2) == 0 {
            HEX_WIDTH / 2.0
        } else {
            0.0
        };
        let col = floor_cell((p.x - origin.x - shift) / HEX_WIDTH);
        Self { row, col }
    }

    /// Center of this slot in world space.
    pub fn center(self, chunk: ChunkPos) -> DVec2 {
        let origin = chunk.origin();
        let shift = if self.row.rem_euclid(2) == 0 {
            HEX_WIDTH / 2.0
        } else {
            0.0
        };
        DVec2::new(
            origin.x + self.col as f64 * HEX_WIDTH + shift,
            origin.y + self.row as f64 * HEX_V_SPACING,
        )
    }

    /// Whether the slot lies inside a chunk.
    pub fn in_bounds(self) -> bool {
        (0..CHUNK_SIZE).contains(&self.row) && (0..CHUNK_SIZE).contains(&self.col)
    }

    /// Every slot of a chunk in row-major order.
    pub fn all() -> impl Iterator<Item = LocalCoord> {
        (0..CHUNK_SIZE).flat_map(|row| (0..CHUNK_SIZE).map(move |col| LocalCoord { row, col }))
    }
}

/// Axial hex coordinate (pointy-top).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Axial {
    /// Column axis.
    pub q: i32,
    /// Row axis (equal to the global row index).
    pub r: i32,
}

/// Result of snapping a point to the lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexCenter {
    /// Center of the hex containing the point.
    pub center: DVec2,
    /// Axial coordinate of that hex.
    pub axial: Axial,
}

/// Snap `p` to the center of the hex that contains it.
pub fn world_to_hex_center(p: DVec2) -> HexCenter {
    // The axial lattice has a center at the origin; ours is shifted half a
    // width so even rows sit off the chunk edge.
    let x = p.x - HEX_WIDTH / 2.0;
    let qf = (SQRT_3 / 3.0 * x - p.y / 3.0) / HEX_RADIUS;
    let rf = (2.0 / 3.0 * p.y) / HEX_RADIUS;
    let axial = cube_round(qf, rf);
    HexCenter {
        center: axial_to_world(axial),
        axial,
    }
}

/// Center of the hex at `axial`.
pub fn axial_to_world(axial: Axial) -> DVec2 {
    DVec2::new(
        HEX_WIDTH * (axial.q as f64 + axial.r as f64 / 2.0) + HEX_WIDTH / 2.0,
        HEX_V_SPACING * axial.r as f64,
    )
}

fn cube_round(qf: f64, rf: f64) -> Axial {
    let sf = -qf - rf;
    let (mut q, mut r, s) = (qf.round(), rf.round(), sf.round());
    let dq = (q - qf).abs();
    let dr = (r - rf).abs();
    let ds = (s - sf).abs();
    if dq > dr && dq > ds {
        q = -r - s;
    } else if dr > ds {
        r = -q - s;
    }
    Axial {
        q: q as i32,
        r: r as i32,
    }
}

/// Corners of a pointy-top hex at 30° + 60°·i. With y pointing down,
/// corner 4 is the top vertex and corners 3 and 5 are the upper shoulders.
pub fn corners(center: DVec2, radius: f64) -> [DVec2; 6] {
    std::array::from_fn(|i| {
        let angle = (60.0 * i as f64 + 30.0).to_radians();
        center + DVec2::new(angle.cos(), angle.sin()) * radius
    })
}

/// Height of the top edge of a hex at horizontal position `x`, or `None`
/// when `x` is outside the hex.
pub fn top_surface_y(corners: &[DVec2; 6], x: f64) -> Option<f64> {
    let edge = |a: DVec2, b: DVec2| {
        let t = if (b.x - a.x).abs() < f64::EPSILON {
            0.0
        } else {
            (x - a.x) / (b.x - a.x)
        };
        a.y + t * (b.y - a.y)
    };
    let (left, top, right) = (corners[3], corners[4], corners[5]);
    if x >= left.x && x <= top.x {
        Some(edge(left, top))
    } else if x > top.x && x <= right.x {
        Some(edge(top, right))
    } else {
        None
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: DVec2, b: DVec2) {
        assert!(a.distance(b) < 1e-6, "{a:?} != {b:?}");
    }

    #[test]
    fn snapping_a_center_is_identity() {
        let chunk = ChunkPos::new(0, 0);
        for slot in LocalCoord::all() {
            let c = slot.center(chunk);
            assert_close(world_to_hex_center(c).center, c);
        }
    }

    #[test]
    fn snapping_is_idempotent_near_corners() {
        let c = LocalCoord::new(4, 7).center(ChunkPos::new(-2, 3));
        for corner in corners(c, HEX_RADIUS * 0.95) {
            let snapped = world_to_hex_center(corner).center;
            assert_close(snapped, c);
            assert_close(world_to_hex_center(snapped).center, snapped);
        }
    }

    #[test]
    fn even_rows_are_shifted_half_a_width() {
        let chunk = ChunkPos::new(0, 0);
        assert_close(
            LocalCoord::new(0, 0).center(chunk),
            DVec2::new(HEX_WIDTH / 2.0, 0.0),
        );
        assert_close(LocalCoord::new(1, 0).center(chunk), DVec2::new(0.0, HEX_V_SPACING));
    }

    #[test]
    fn local_addressing_round_trips() {
        for chunk in [ChunkPos::new(0, 0), ChunkPos::new(-1, 2), ChunkPos::new(5, -7)] {
            for slot in LocalCoord::all() {
                let center = slot.center(chunk);
                assert_eq!(chunk_pos_of(center), chunk);
                assert_eq!(LocalCoord::from_world(chunk, center), slot);
                let snapped = world_to_hex_center(center).center;
                assert_eq!(LocalCoord::from_world(chunk, snapped), slot);
            }
        }
    }

    #[test]
    fn chunk_of_negative_coordinates() {
        assert_eq!(chunk_pos_of(DVec2::new(-0.5, -0.5)), ChunkPos::new(-1, -1));
        assert_eq!(
            chunk_pos_of(DVec2::new(CHUNK_WIDTH + 1.0, CHUNK_HEIGHT * 2.5)),
            ChunkPos::new(1, 2)
        );
    }

    #[test]
    fn corner_layout() {
        let c = corners(DVec2::ZERO, HEX_RADIUS);
        assert_close(c[4], DVec2::new(0.0, -HEX_RADIUS));
        assert_close(c[1], DVec2::new(0.0, HEX_RADIUS));
        assert!(c[3].x < 0.0 && c[3].y < 0.0);
        assert!(c[5].x > 0.0 && c[5].y < 0.0);
    }

    #[test]
    fn top_surface_interpolates_upper_edges() {
        let c = corners(DVec2::new(100.0, 200.0), HEX_RADIUS);
        let apex = top_surface_y(&c, 100.0).unwrap();
        assert!((apex - (200.0 - HEX_RADIUS)).abs() < 1e-9);
        let shoulder = top_surface_y(&c, c[3].x).unwrap();
        assert!((shoulder - c[3].y).abs() < 1e-9);
        let mid = top_surface_y(&c, 100.0 + HEX_WIDTH / 4.0).unwrap();
        assert!(mid > apex && mid < c[5].y + 1e-9);
        assert_eq!(top_surface_y(&c, 100.0 + HEX_WIDTH), None);
    }
}
