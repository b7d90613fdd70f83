//! Time of impact between two moving convex shapes.
//!
//! Conservative advancement: the sweeps are advanced while a GJK distance
//! query proves the shapes are still separated, and a bisection/secant root
//! finder locates the time where the separation crosses the target distance.
//! Every loop is iteration-capped; hitting a cap reports [`ToiState::Failed`]
//! ("no impact found") rather than hanging, and the caller counts it.

use glam::Vec2;

use crate::{
    collision::distance::{distance, DistanceInput, DistanceProxy, SimplexCache},
    config::{LINEAR_SLOP, MAX_POLYGON_VERTICES, TOI_MAX_ITERATIONS, TOI_MAX_ROOT_ITERATIONS},
    core::types::Sweep,
};

#[derive(Debug, Clone, Copy)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Upper bound on the impact fraction, usually 1.
    pub t_max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToiState {
    Unknown,
    /// An iteration cap fired before convergence; treat as no impact.
    Failed,
    /// The shapes already overlap at the start of the sweep.
    Overlapped,
    /// Contact at the reported fraction.
    Touching,
    /// No contact within `t_max`.
    Separated,
}

#[derive(Debug, Clone, Copy)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

/// Axis along which two swept shapes separate, rebuilt from the GJK witness
/// simplex each outer iteration.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f32,
    ) -> Self {
        debug_assert!(cache.count > 0 && cache.count < 3);

        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        if cache.count == 1 {
            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_a = xf_a.apply(local_point_a);
            let point_b = xf_b.apply(local_point_b);
            let axis = (point_b - point_a).normalize_or_zero();
            return Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::Points,
                local_point: Vec2::ZERO,
                axis,
            };
        }

        if cache.index_a[0] == cache.index_a[1] {
            // Two witness points on B: separate along B's face normal.
            let local_point_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_point_b2 = proxy_b.vertex(cache.index_b[1] as usize);

            let edge = local_point_b2 - local_point_b1;
            let mut axis = Vec2::new(edge.y, -edge.x).normalize_or_zero();
            let normal = xf_b.q.apply(axis);

            let local_point = 0.5 * (local_point_b1 + local_point_b2);
            let point_b = xf_b.apply(local_point);

            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let point_a = xf_a.apply(local_point_a);

            let s = (point_a - point_b).dot(normal);
            if s < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceB,
                local_point,
                axis,
            }
        } else {
            // Two witness points on A.
            let local_point_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_a2 = proxy_a.vertex(cache.index_a[1] as usize);

            let edge = local_point_a2 - local_point_a1;
            let mut axis = Vec2::new(edge.y, -edge.x).normalize_or_zero();
            let normal = xf_a.q.apply(axis);

            let local_point = 0.5 * (local_point_a1 + local_point_a2);
            let point_a = xf_a.apply(local_point);

            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_b = xf_b.apply(local_point_b);

            let s = (point_b - point_a).dot(normal);
            if s < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceA,
                local_point,
                axis,
            }
        }
    }

    /// Minimum separation over all support pairs at time `t`, plus the pair
    /// achieving it.
    fn find_min_separation(&self, t: f32) -> (f32, usize, usize) {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);

        match self.kind {
            SeparationKind::Points => {
                let axis_a = xf_a.q.apply_inverse(self.axis);
                let axis_b = xf_b.q.apply_inverse(-self.axis);

                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);

                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(self.axis), index_a, index_b)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);

                let axis_b = xf_b.q.apply_inverse(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(normal), 0, index_b)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);

                let axis_a = xf_a.q.apply_inverse(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));

                ((point_a - point_b).dot(normal), index_a, 0)
            }
        }
    }

    /// Separation of a fixed support pair at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);

        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Computes the earliest fraction in `[0, t_max]` at which the swept shapes
/// touch at skin distance, or reports why there is none.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;

    // Large absolute angles poison the interpolation.
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut iterations = 0;
    let mut cache = SimplexCache::default();

    loop {
        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        // Current distance between cores; the cache also seeds the
        // separation function below.
        let dist_output = distance(
            &mut cache,
            &DistanceInput {
                proxy_a: *proxy_a,
                proxy_b: *proxy_b,
                transform_a: xf_a,
                transform_b: xf_b,
                use_radii: false,
            },
        );

        if dist_output.distance <= 0.0 {
            return ToiOutput {
                state: ToiState::Overlapped,
                t: 0.0,
                iterations,
            };
        }

        if dist_output.distance < target + tolerance {
            return ToiOutput {
                state: ToiState::Touching,
                t: t1,
                iterations,
            };
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Advance t2 toward the impact, resolving one deepest support pair
        // per inner pass.
        let mut t2 = t_max;
        let mut push_back_count = 0;
        loop {
            let (mut s2, index_a, index_b) = fcn.find_min_separation(t2);

            if s2 > target + tolerance {
                return ToiOutput {
                    state: ToiState::Separated,
                    t: t_max,
                    iterations,
                };
            }

            if s2 > target - tolerance {
                // Advance the sweeps and re-run the outer loop from t2.
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            if s1 < target - tolerance {
                // The interval start is already past the target; the
                // separation function degenerated.
                return ToiOutput {
                    state: ToiState::Failed,
                    t: t1,
                    iterations,
                };
            }

            if s1 <= target + tolerance {
                return ToiOutput {
                    state: ToiState::Touching,
                    t: t1,
                    iterations,
                };
            }

            // Root find on [t1, t2], alternating secant and bisection.
            let mut a1 = t1;
            let mut a2 = t2;
            let mut root_iterations = 0;
            loop {
                let t = if root_iterations & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };
                root_iterations += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }

                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iterations == TOI_MAX_ROOT_ITERATIONS {
                    break;
                }
            }

            push_back_count += 1;
            if push_back_count == MAX_POLYGON_VERTICES {
                break;
            }
        }

        iterations += 1;
        if iterations == TOI_MAX_ITERATIONS {
            // Root finder made no further progress within the budget.
            return ToiOutput {
                state: ToiState::Failed,
                t: t1,
                iterations,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::Shape;
    use approx::assert_relative_eq;

    fn sweep_line(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: from,
            c: to,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    #[test]
    fn fast_circle_hits_thin_box_mid_step() {
        // A 0.1-radius bullet crossing a thin wall in a single step.
        let bullet = Shape::circle(0.1);
        let wall = Shape::rect(10.0, 0.05);

        let output = time_of_impact(&ToiInput {
            proxy_a: DistanceProxy::new(&bullet),
            proxy_b: DistanceProxy::new(&wall),
            sweep_a: sweep_line(Vec2::new(0.0, 20.0), Vec2::new(0.0, -20.0)),
            sweep_b: sweep_line(Vec2::ZERO, Vec2::ZERO),
            t_max: 1.0,
        });

        assert_eq!(output.state, ToiState::Touching);
        // Centers start 20 apart and close at 40/step; contact at roughly
        // (20 - r_sum) / 40.
        assert!(output.t > 0.45 && output.t < 0.5, "t = {}", output.t);

        // The bullet's center has not passed the wall plane at the TOI.
        let y_at_toi = 20.0 - 40.0 * output.t;
        assert!(y_at_toi > 0.0);
    }

    #[test]
    fn separated_parallel_motion_reports_no_impact() {
        let a = Shape::circle(0.5);
        let b = Shape::circle(0.5);

        let output = time_of_impact(&ToiInput {
            proxy_a: DistanceProxy::new(&a),
            proxy_b: DistanceProxy::new(&b),
            sweep_a: sweep_line(Vec2::new(0.0, 5.0), Vec2::new(10.0, 5.0)),
            sweep_b: sweep_line(Vec2::ZERO, Vec2::new(10.0, 0.0)),
            t_max: 1.0,
        });

        assert_eq!(output.state, ToiState::Separated);
        assert_relative_eq!(output.t, 1.0);
    }

    #[test]
    fn initially_overlapping_shapes_report_overlap_at_zero() {
        let a = Shape::circle(1.0);
        let b = Shape::circle(1.0);

        let output = time_of_impact(&ToiInput {
            proxy_a: DistanceProxy::new(&a),
            proxy_b: DistanceProxy::new(&b),
            sweep_a: sweep_line(Vec2::ZERO, Vec2::new(1.0, 0.0)),
            sweep_b: sweep_line(Vec2::new(0.5, 0.0), Vec2::new(0.5, 0.0)),
            t_max: 1.0,
        });

        assert_eq!(output.state, ToiState::Overlapped);
        assert_eq!(output.t, 0.0);
    }

    #[test]
    fn head_on_boxes_touch_before_half_step() {
        let a = Shape::rect(0.5, 0.5);
        let b = Shape::rect(0.5, 0.5);

        let output = time_of_impact(&ToiInput {
            proxy_a: DistanceProxy::new(&a),
            proxy_b: DistanceProxy::new(&b),
            sweep_a: sweep_line(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)),
            sweep_b: sweep_line(Vec2::new(5.0, 0.0), Vec2::new(-5.0, 0.0)),
            t_max: 1.0,
        });

        assert_eq!(output.state, ToiState::Touching);
        // Faces meet after each travels ~4.5 of 10 units.
        assert!(output.t > 0.4 && output.t < 0.5, "t = {}", output.t);
    }
}
