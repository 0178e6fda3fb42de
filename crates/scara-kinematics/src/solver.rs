use crate::{FkSolution, JointRanges, ScaraGeometry, Transform};

/// Result of an inverse-kinematics query, in the loose shape solvers actually
/// produce: a verdict plus message, optionally accompanied by joint data that
/// may be keyed (any subset of the six canonical fields) or positional
/// radians/meters. Everything downstream goes through
/// [`crate::normalize_solution`]; nothing else may pick this apart.
#[derive(Debug, Clone)]
pub struct IkOutcome {
    pub ok: bool,
    pub message: String,
    pub payload: Option<IkPayload>,
}

impl IkOutcome {
    pub fn infeasible(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            payload: None,
        }
    }

    pub fn solved(message: impl Into<String>, payload: IkPayload) -> Self {
        Self {
            ok: true,
            message: message.into(),
            payload: Some(payload),
        }
    }
}

/// Joint data attached to a solver verdict.
#[derive(Debug, Clone)]
pub enum IkPayload {
    /// Keyed fields; any subset may be present.
    Fields(IkFields),
    /// Positional (q1_rad, q2_rad, d3_m).
    Triple(f64, f64, f64),
}

#[derive(Debug, Clone, Default)]
pub struct IkFields {
    pub q1_deg: Option<f64>,
    pub q2_deg: Option<f64>,
    pub d3_mm: Option<f64>,
    pub q1_rad: Option<f64>,
    pub q2_rad: Option<f64>,
    pub d3_m: Option<f64>,
}

/// The solver port. The engine only ever talks to a solver through this
/// trait; the inverse result goes through the normalizer before use.
pub trait Kinematics {
    /// Compose the joint transform chain and return the end-effector point
    /// together with the per-joint transforms for step-by-step display.
    fn forward(&self, q1_rad: f64, q2_rad: f64, d3_m: f64) -> FkSolution;

    /// Solve for the joint configuration reaching (x, y, z), meters.
    fn inverse(&self, x: f64, y: f64, z: f64) -> IkOutcome;

    /// Whether the configuration sits inside the configured joint travel.
    fn within_limits(&self, q1_rad: f64, q2_rad: f64, d3_m: f64) -> bool;
}

/// Reference two-link planar solver for the RRP arm.
///
/// Elbow-down is tried first; if it lands outside the configured travel and
/// elbow-up does not, the elbow-up branch is returned instead. The payload
/// carries radians and meters only, as an SI-native solver would produce.
pub struct PlanarScara {
    geometry: ScaraGeometry,
    ranges: JointRanges,
}

impl PlanarScara {
    pub fn new(geometry: ScaraGeometry, ranges: JointRanges) -> Self {
        Self { geometry, ranges }
    }

    pub fn geometry(&self) -> &ScaraGeometry {
        &self.geometry
    }

    fn q1_for(&self, x: f64, y: f64, q2: f64) -> f64 {
        let l1 = self.geometry.l1_m;
        let l2 = self.geometry.l2_m;
        y.atan2(x) - (l2 * q2.sin()).atan2(l1 + l2 * q2.cos())
    }
}

impl Kinematics for PlanarScara {
    fn forward(&self, q1_rad: f64, q2_rad: f64, d3_m: f64) -> FkSolution {
        let a1 = dh(q1_rad, self.geometry.d0_m, self.geometry.l1_m);
        let a2 = dh(q2_rad, 0.0, self.geometry.l2_m);
        let a3 = dh(0.0, -d3_m, 0.0);
        let t = mat_mul(&mat_mul(&a1, &a2), &a3);
        FkSolution {
            x: t[0][3],
            y: t[1][3],
            z: t[2][3],
            joint_transforms: [a1, a2, a3],
            end_transform: t,
        }
    }

    fn inverse(&self, x: f64, y: f64, z: f64) -> IkOutcome {
        const EPS: f64 = 1e-9;
        let l1 = self.geometry.l1_m;
        let l2 = self.geometry.l2_m;
        let r2 = x * x + y * y;
        let r = r2.sqrt();
        if r > self.geometry.reach_max() + EPS {
            return IkOutcome::infeasible(format!(
                "target radius {r:.4} m beyond maximum reach {:.4} m",
                self.geometry.reach_max()
            ));
        }
        if r < self.geometry.reach_min() - EPS {
            return IkOutcome::infeasible(format!(
                "target radius {r:.4} m inside minimum reach {:.4} m",
                self.geometry.reach_min()
            ));
        }

        let cos_q2 = ((r2 - l1 * l1 - l2 * l2) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
        let d3 = self.geometry.d0_m - z;

        let down = cos_q2.acos();
        let mut q2 = down;
        let mut q1 = self.q1_for(x, y, q2);
        let mut branch = "elbow-down";
        if !self.within_limits(q1, q2, d3) {
            let q1_up = self.q1_for(x, y, -down);
            if self.within_limits(q1_up, -down, d3) {
                q2 = -down;
                q1 = q1_up;
                branch = "elbow-up";
            }
        }

        IkOutcome::solved(
            format!("reachable ({branch})"),
            IkPayload::Fields(IkFields {
                q1_rad: Some(q1),
                q2_rad: Some(q2),
                d3_m: Some(d3),
                ..IkFields::default()
            }),
        )
    }

    fn within_limits(&self, q1_rad: f64, q2_rad: f64, d3_m: f64) -> bool {
        let (q1_lo, q1_hi) = self.ranges.q1_deg;
        let (q2_lo, q2_hi) = self.ranges.q2_deg;
        let (d3_lo, d3_hi) = self.ranges.d3_mm;
        let q1 = q1_rad.to_degrees();
        let q2 = q2_rad.to_degrees();
        let d3 = d3_m * 1000.0;
        q1 >= q1_lo && q1 <= q1_hi && q2 >= q2_lo && q2 <= q2_hi && d3 >= d3_lo && d3 <= d3_hi
    }
}

/// One Denavit-Hartenberg link transform with zero link twist: rotate by
/// `theta` about z, translate `d` along z and `a` along the rotated x.
fn dh(theta: f64, d: f64, a: f64) -> Transform {
    let (s, c) = theta.sin_cos();
    [
        [c, -s, 0.0, a * c],
        [s, c, 0.0, a * s],
        [0.0, 0.0, 1.0, d],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

fn mat_mul(a: &Transform, b: &Transform) -> Transform {
    let mut out = [[0.0; 4]; 4];
    for (i, row) in a.iter().enumerate() {
        for j in 0..4 {
            let mut acc = 0.0;
            for (k, v) in row.iter().enumerate() {
                acc += v * b[k][j];
            }
            out[i][j] = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver() -> PlanarScara {
        PlanarScara::new(ScaraGeometry::default(), JointRanges::default())
    }

    #[test]
    fn forward_at_zero_is_fully_extended() {
        let s = solver();
        let fk = s.forward(0.0, 0.0, 0.0);
        assert!((fk.x - 0.25).abs() < 1e-12);
        assert!(fk.y.abs() < 1e-12);
        assert!((fk.z - 0.11).abs() < 1e-12);
    }

    #[test]
    fn forward_right_angle_elbow() {
        let s = solver();
        let fk = s.forward(0.0, std::f64::consts::FRAC_PI_2, 0.020);
        assert!((fk.x - 0.15).abs() < 1e-12);
        assert!((fk.y - 0.10).abs() < 1e-12);
        assert!((fk.z - 0.09).abs() < 1e-12);
    }

    #[test]
    fn end_transform_agrees_with_point() {
        let s = solver();
        let fk = s.forward(0.3, -0.4, 0.015);
        assert!((fk.end_transform[0][3] - fk.x).abs() < 1e-12);
        assert!((fk.end_transform[1][3] - fk.y).abs() < 1e-12);
        assert!((fk.end_transform[2][3] - fk.z).abs() < 1e-12);
    }

    #[test]
    fn inverse_round_trips_through_forward() {
        let s = solver();
        let out = s.inverse(0.18, 0.08, 0.08);
        assert!(out.ok, "{}", out.message);
        let (q1, q2, d3) = match out.payload {
            Some(IkPayload::Fields(f)) => (
                f.q1_rad.unwrap(),
                f.q2_rad.unwrap(),
                f.d3_m.unwrap(),
            ),
            other => panic!("unexpected payload {other:?}"),
        };
        let fk = s.forward(q1, q2, d3);
        assert!((fk.x - 0.18).abs() < 1e-9);
        assert!((fk.y - 0.08).abs() < 1e-9);
        assert!((fk.z - 0.08).abs() < 1e-9);
    }

    #[test]
    fn inverse_rejects_out_of_reach() {
        let s = solver();
        let out = s.inverse(0.40, 0.0, 0.08);
        assert!(!out.ok);
        assert!(out.payload.is_none());
        assert!(out.message.contains("beyond maximum reach"));
    }

    #[test]
    fn inverse_rejects_inner_dead_zone() {
        let s = solver();
        let out = s.inverse(0.01, 0.0, 0.08);
        assert!(!out.ok);
        assert!(out.message.contains("inside minimum reach"));
    }

    #[test]
    fn within_limits_honors_ranges() {
        let s = solver();
        assert!(s.within_limits(0.5, -0.5, 0.030));
        assert!(!s.within_limits(2.0, 0.0, 0.030)); // ~115 degrees
        assert!(!s.within_limits(0.0, 0.0, 0.075)); // 75 mm stroke
    }
}
