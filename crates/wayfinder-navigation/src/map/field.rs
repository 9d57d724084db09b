use std::collections::BTreeMap;

use nalgebra::{Matrix4, Vector3, Vector4};

/// Stable identity of the spatial anchor a field belongs to.
pub type AnchorId = u64;

/// Every field currently known, keyed by anchor.
pub type Fields = BTreeMap<AnchorId, Field>;

/// A flat disc approximating one sensed surface patch, in the field's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disc {
    /// Homogeneous center point.
    pub center: Vector4<f32>,
    /// Radius in the ground plane (m).
    pub radius: f32,
}

impl Disc {
    /// Creates a disc centered at `center` (w = 1).
    pub fn new(center: Vector3<f32>, radius: f32) -> Self {
        Disc { center: center.push(1.0), radius }
    }

    /// True for zero, negative or non-finite radii. Such discs are never rasterized.
    pub fn is_degenerate(&self) -> bool {
        !(self.radius > 0.0 && self.radius.is_finite())
    }
}

/// Axis-aligned bounding volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    /// Minimum corner.
    pub min: Vector3<f32>,
    /// Maximum corner.
    pub max: Vector3<f32>,
}

impl Default for Volume {
    fn default() -> Self {
        Volume::empty()
    }
}

impl Volume {
    /// A volume containing nothing; including any point makes it non-empty.
    pub fn empty() -> Self {
        Volume {
            min: Vector3::repeat(f32::INFINITY),
            max: Vector3::repeat(f32::NEG_INFINITY),
        }
    }

    /// True when no point has been included.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grows the volume to contain `point`.
    pub fn include(&mut self, point: Vector3<f32>) {
        self.min = self.min.inf(&point);
        self.max = self.max.sup(&point);
    }

    /// Grows the volume to contain `other`.
    pub fn union(&mut self, other: &Volume) {
        if !other.is_empty() {
            self.include(other.min);
            self.include(other.max);
        }
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vector3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vector3::new(a.x, a.y, a.z),
            Vector3::new(b.x, a.y, a.z),
            Vector3::new(a.x, b.y, a.z),
            Vector3::new(b.x, b.y, a.z),
            Vector3::new(a.x, a.y, b.z),
            Vector3::new(b.x, a.y, b.z),
            Vector3::new(a.x, b.y, b.z),
            Vector3::new(b.x, b.y, b.z),
        ]
    }

    /// Axis-aligned box around the eight corners after `transform`.
    pub fn transformed(&self, transform: &Matrix4<f32>) -> Volume {
        let mut out = Volume::empty();
        if self.is_empty() {
            return out;
        }
        for corner in self.corners() {
            let p = transform * corner.push(1.0);
            assert!(p.w != 0.0, "degenerate field transform: homogeneous component is zero");
            out.include(p.xyz() / p.w);
        }
        out
    }
}

/// Sensed geometry attached to one spatial anchor: a rigid transform plus the
/// discs approximating its upward-facing surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    transform: Matrix4<f32>,
    discs: Vec<Disc>,
    bounds: Volume,
}

impl Field {
    /// Creates a field from prebuilt discs. Degenerate discs are dropped.
    pub fn new(transform: Matrix4<f32>, discs: impl IntoIterator<Item = Disc>) -> Self {
        let discs: Vec<Disc> = discs.into_iter().filter(|d| !d.is_degenerate()).collect();
        let mut bounds = Volume::empty();
        for disc in &discs {
            let c = disc.center.xyz() / disc.center.w;
            bounds.include(Vector3::new(c.x - disc.radius, c.y, c.z - disc.radius));
            bounds.include(Vector3::new(c.x + disc.radius, c.y, c.z + disc.radius));
        }
        Field { transform, discs, bounds }
    }

    /// Builds a field from a triangle mesh.
    ///
    /// Every face becomes a disc at its centroid whose radius reaches the
    /// farthest vertex in the x-z plane. Faces whose normal points downward
    /// (ceilings) and faces with zero extent are skipped, as are faces that
    /// reference missing vertices.
    pub fn from_triangles(transform: Matrix4<f32>, vertices: &[Vector3<f32>], faces: &[[usize; 3]]) -> Self {
        let up = Vector3::y();
        let discs = faces.iter().filter_map(|face| {
            let [v0, v1, v2] = [vertices.get(face[0])?, vertices.get(face[1])?, vertices.get(face[2])?];
            let normal = (v1 - v0).cross(&(v2 - v0));
            if normal.dot(&up) < 0.0 {
                return None;
            }
            let centroid = (v0 + v1 + v2) / 3.0;
            let radius = [v0, v1, v2]
                .iter()
                .map(|v| (v.x - centroid.x).hypot(v.z - centroid.z))
                .fold(0.0_f32, f32::max);
            Some(Disc::new(centroid, radius))
        });
        Field::new(transform, discs)
    }

    /// Local-to-world transform.
    pub fn transform(&self) -> &Matrix4<f32> {
        &self.transform
    }

    /// Discs in the local frame.
    pub fn discs(&self) -> &[Disc] {
        &self.discs
    }

    /// Bounding volume in the local frame.
    pub fn bounds(&self) -> &Volume {
        &self.bounds
    }

    /// True when the field holds no discs.
    pub fn is_empty(&self) -> bool {
        self.discs.is_empty()
    }

    /// Bounding volume in the world frame.
    pub fn world_bounds(&self) -> Volume {
        self.bounds.transformed(&self.transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ceiling_faces_rejected() {
        let vertices = [Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0), Vector3::new(1.0, 0.0, 0.0)];
        let floor = Field::from_triangles(Matrix4::identity(), &vertices, &[[0, 1, 2]]);
        assert_eq!(floor.discs().len(), 1);

        let ceiling = Field::from_triangles(Matrix4::identity(), &vertices, &[[0, 2, 1]]);
        assert!(ceiling.is_empty());
        assert!(ceiling.bounds().is_empty());
    }

    #[test]
    fn test_face_disc_geometry() {
        let vertices = [Vector3::new(0.0, 0.3, 0.0), Vector3::new(0.0, 0.3, 3.0), Vector3::new(3.0, 0.3, 0.0)];
        let field = Field::from_triangles(Matrix4::identity(), &vertices, &[[0, 1, 2]]);
        let disc = field.discs()[0];
        assert_relative_eq!(disc.center.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(disc.center.y, 0.3, epsilon = 1e-6);
        assert_relative_eq!(disc.center.z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(disc.radius, 5.0_f32.sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_faces_skipped() {
        let vertices = [Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 2.0, 0.0)];
        let field = Field::from_triangles(Matrix4::identity(), &vertices, &[[0, 1, 2], [0, 1, 9]]);
        assert!(field.is_empty());

        let field = Field::new(Matrix4::identity(), [Disc::new(Vector3::zeros(), 0.0), Disc::new(Vector3::zeros(), f32::NAN)]);
        assert!(field.is_empty());
    }

    #[test]
    fn test_bounds_and_world_bounds() {
        let field = Field::new(
            Matrix4::new_translation(&Vector3::new(10.0, 1.0, -2.0)),
            [Disc::new(Vector3::new(0.0, 0.0, 0.0), 0.5), Disc::new(Vector3::new(2.0, 0.4, 1.0), 0.25)],
        );
        assert_eq!(field.bounds().min, Vector3::new(-0.5, 0.0, -0.5));
        assert_eq!(field.bounds().max, Vector3::new(2.25, 0.4, 1.25));

        let world = field.world_bounds();
        assert_relative_eq!(world.min, Vector3::new(9.5, 1.0, -2.5), epsilon = 1e-5);
        assert_relative_eq!(world.max, Vector3::new(12.25, 1.4, -0.75), epsilon = 1e-5);
    }
}
