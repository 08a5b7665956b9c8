//! Synthetic point clouds for tests and demos

use crate::types::Point;
use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};

/// `n` points on the parallelogram `origin + s*u + t*v` (`s, t` uniform in
/// `[0, 1)`), each coordinate perturbed by Gaussian noise of deviation `sigma`.
pub fn plane_patch<R: Rng + ?Sized>(
    n: usize,
    origin: Point,
    u: Point,
    v: Point,
    sigma: f64,
    rng: &mut R,
) -> Result<Vec<Point>, NormalError> {
    let noise = Normal::new(0.0, sigma)?;
    Ok((0..n)
        .map(|_| {
            let s = rng.random::<f64>();
            let t = rng.random::<f64>();
            let p = origin.add(&u.scale(s)).add(&v.scale(t));
            Point::new(
                p.x + noise.sample(rng),
                p.y + noise.sample(rng),
                p.z + noise.sample(rng),
            )
        })
        .collect())
}

/// A floor (z = 0) and a wall (x = 0), `n` points each.
///
/// The floor covers `x, y` in `[1, 3] x [0, 2]` and the wall covers `y, z` in
/// `[0, 2] x [1, 3]`, so the two patches stay more than a metre apart.
pub fn floor_and_wall<R: Rng + ?Sized>(
    n: usize,
    sigma: f64,
    rng: &mut R,
) -> Result<Vec<Point>, NormalError> {
    let mut points = plane_patch(
        n,
        Point::new(1.0, 0.0, 0.0),
        Point::new(2.0, 0.0, 0.0),
        Point::new(0.0, 2.0, 0.0),
        sigma,
        rng,
    )?;
    points.extend(plane_patch(
        n,
        Point::new(0.0, 0.0, 1.0),
        Point::new(0.0, 2.0, 0.0),
        Point::new(0.0, 0.0, 2.0),
        sigma,
        rng,
    )?);
    Ok(points)
}

/// `n` points uniform in the cube `[0, size]^3`
pub fn uniform_cube<R: Rng + ?Sized>(n: usize, size: f64, rng: &mut R) -> Vec<Point> {
    (0..n)
        .map(|_| {
            Point::new(
                rng.random::<f64>() * size,
                rng.random::<f64>() * size,
                rng.random::<f64>() * size,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_floor_and_wall_layout() {
        let mut rng = StdRng::seed_from_u64(3);
        let points = floor_and_wall(200, 0.01, &mut rng).unwrap();
        assert_eq!(points.len(), 400);
        assert!(points[..200].iter().all(|p| p.z.abs() < 0.1 && p.x > 0.9));
        assert!(points[200..].iter().all(|p| p.x.abs() < 0.1 && p.z > 0.9));
    }

    #[test]
    fn test_negative_sigma_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = plane_patch(
            1,
            Point::zero(),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
            -1.0,
            &mut rng,
        );
        assert!(result.is_err());
    }
}
