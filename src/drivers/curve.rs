use crate::types::ProcessedSample;
/// Fewer points than this and no curve is drawn.
pub const MIN_CURVE_POINTS: usize = 10;
/// Width of the sliding mean over velocity-sorted points.
pub const CURVE_WINDOW: usize = 20;
/// Averaged force-vs-velocity characteristic, sorted by velocity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CharacteristicCurve {
    pub velocity: Vec<f64>,
    pub force: Vec<f64>,
}
impl CharacteristicCurve {
    pub fn len(&self) -> usize {
        self.velocity.len()
    }
    pub fn is_empty(&self) -> bool {
        self.velocity.is_empty()
    }
}
/// Smooth a cloud of (velocity, force) points into a single characteristic line.
///
/// Points are sorted by velocity, then each output point is the mean of the points in
/// `[i - 10, i + 10)`, clipped at both ends.
pub fn average_curve(samples: &[ProcessedSample]) -> CharacteristicCurve {
    if samples.len() < MIN_CURVE_POINTS {
        return CharacteristicCurve::default();
    }
    let mut points: Vec<(f64, f64)> = samples.iter().map(|s| (s.velocity, s.force)).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    // prefix sums keep each window O(1)
    let mut sum_v = Vec::with_capacity(points.len() + 1);
    let mut sum_f = Vec::with_capacity(points.len() + 1);
    sum_v.push(0.0);
    sum_f.push(0.0);
    for (v, f) in &points {
        sum_v.push(sum_v[sum_v.len() - 1] + v);
        sum_f.push(sum_f[sum_f.len() - 1] + f);
    }
    let n = points.len();
    let half = CURVE_WINDOW / 2;
    let mut curve = CharacteristicCurve {
        velocity: Vec::with_capacity(n),
        force: Vec::with_capacity(n),
    };
    for i in 0..n {
        let start = i.saturating_sub(half);
        let end = (i + half).min(n);
        let count = (end - start) as f64;
        curve.velocity.push((sum_v[end] - sum_v[start]) / count);
        curve.force.push((sum_f[end] - sum_f[start]) / count);
    }
    curve
}
#[cfg(test)]
mod tests {
    use super::*;
    fn point(velocity: f64, force: f64) -> ProcessedSample {
        ProcessedSample {
            t: 0.0,
            position: 0.0,
            velocity,
            force,
        }
    }
    #[test]
    fn too_few_points_gives_empty_curve() {
        let samples: Vec<_> = (0..9).map(|i| point(i as f64, 1.0)).collect();
        assert!(average_curve(&samples).is_empty());
        assert!(average_curve(&[]).is_empty());
    }
    #[test]
    fn output_is_sorted_by_velocity() {
        let samples: Vec<_> = (0..40).rev().map(|i| point(i as f64, 2.0 * i as f64)).collect();
        let curve = average_curve(&samples);
        assert_eq!(curve.len(), 40);
        assert!(curve.velocity.windows(2).all(|w| w[0] <= w[1]));
        // linear input stays linear under a mean, away from the clipped edges
        for i in 10..30 {
            assert!((curve.force[i] - 2.0 * curve.velocity[i]).abs() < 1e-9);
        }
    }
    #[test]
    fn windows_are_clipped_at_the_edges() {
        let samples: Vec<_> = (0..10).map(|i| point(i as f64, i as f64)).collect();
        let curve = average_curve(&samples);
        // i = 0 averages 0..10, i = 9 averages 0..10 as well
        assert!((curve.velocity[0] - 4.5).abs() < 1e-12);
        assert!((curve.velocity[9] - 4.5).abs() < 1e-12);
    }
    #[test]
    fn constant_force_is_preserved() {
        let samples: Vec<_> = (0..25).map(|i| point((i * 7 % 25) as f64, 3.5)).collect();
        let curve = average_curve(&samples);
        assert!(curve.force.iter().all(|f| (f - 3.5).abs() < 1e-12));
    }
}
