//! Plane models, regions and display colors

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point of the cloud. Shares its representation with the hull vertices.
pub use math_convex_hull::Vertex as Point;

/// Plane `a*x + b*y + c*z + d = 0` with `(a, b, c)` of unit length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneModel {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl PlaneModel {
    /// Plane through `point` with the given normal direction.
    ///
    /// Returns `None` when the normal has no usable length.
    pub fn from_point_normal(point: &Point, normal: &Point) -> Option<Self> {
        let n = normal.try_normalize()?;
        let d = -n.dot(point);
        d.is_finite().then_some(Self {
            a: n.x,
            b: n.y,
            c: n.z,
            d,
        })
    }

    /// The unit normal `(a, b, c)`
    pub fn normal(&self) -> Point {
        Point::new(self.a, self.b, self.c)
    }

    /// Signed perpendicular distance (positive on the normal side)
    pub fn signed_distance(&self, p: &Point) -> f64 {
        self.a * p.x + self.b * p.y + self.c * p.z + self.d
    }

    /// Perpendicular distance
    pub fn distance(&self, p: &Point) -> f64 {
        self.signed_distance(p).abs()
    }

    /// `|a² + b² + c² - 1|`
    pub fn norm_error(&self) -> f64 {
        (self.a * self.a + self.b * self.b + self.c * self.c - 1.0).abs()
    }

    /// Coefficients as `[a, b, c, d]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.a, self.b, self.c, self.d]
    }
}

impl fmt::Display for PlaneModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4}x {:+.4}y {:+.4}z {:+.4} = 0",
            self.a, self.b, self.c, self.d
        )
    }
}

/// A fitted plane and the indices of its inliers in the original point set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneRegion {
    pub model: PlaneModel,
    pub inliers: Vec<usize>,
}

impl PlaneRegion {
    /// Number of inliers
    pub fn len(&self) -> usize {
        self.inliers.len()
    }

    /// Whether the region has no inliers
    pub fn is_empty(&self) -> bool {
        self.inliers.is_empty()
    }

    /// Inlier coordinates, in inlier order
    pub fn points(&self, cloud: &[Point]) -> Vec<Point> {
        self.inliers.iter().map(|&i| cloud[i]).collect()
    }
}

/// RGB color with channels in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const RED: Rgb = Rgb::new(1.0, 0.0, 0.0);
    pub const GRAY: Rgb = Rgb::new(0.6, 0.6, 0.6);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Distinct color for region `index`.
    ///
    /// Hues step by the golden angle so neighbouring regions never share a
    /// color; the same index always maps to the same color.
    pub fn palette(index: usize) -> Self {
        const GOLDEN: f64 = 0.618_033_988_749_895;
        let hue = (0.1 + index as f64 * GOLDEN).fract();
        Self::from_hsv(hue, 0.75, 0.95)
    }

    /// Convert from HSV, all components in `[0, 1]`
    pub fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        let h6 = h.rem_euclid(1.0) * 6.0;
        let sector = h6.floor();
        let f = h6 - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));

        match sector as u8 {
            0 => Self::new(v, t, p),
            1 => Self::new(q, v, p),
            2 => Self::new(p, v, t),
            3 => Self::new(p, q, v),
            4 => Self::new(t, p, v),
            _ => Self::new(v, p, q),
        }
    }

    /// Hex form `0xRRGGBB` as an integer
    pub fn to_hex(&self) -> u32 {
        let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }
}
