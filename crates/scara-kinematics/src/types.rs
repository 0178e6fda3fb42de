use serde::{Deserialize, Serialize};

/// A 4x4 homogeneous transform, row major.
pub type Transform = [[f64; 4]; 4];

/// A Cartesian end-effector target, meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One joint-space configuration in operator units: degrees for the
/// revolute joints, millimeters of prismatic extension.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointConfig {
    pub q1_deg: f64,
    pub q2_deg: f64,
    pub d3_mm: f64,
}

impl JointConfig {
    pub fn new(q1_deg: f64, q2_deg: f64, d3_mm: f64) -> Self {
        Self {
            q1_deg,
            q2_deg,
            d3_mm,
        }
    }
}

/// The canonical joint solution: the same configuration carried in both unit
/// systems at once, so no consumer ever converts (or forgets to).
///
/// Invariant: `q*_deg` and `q*_rad` describe the same angle, `d3_mm` and
/// `d3_m` the same extension. Construct through [`JointSolution::from_degrees`],
/// [`JointSolution::from_radians`], or the solution normalizer; values are
/// superseded by new instances, never edited in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSolution {
    pub q1_deg: f64,
    pub q2_deg: f64,
    pub d3_mm: f64,
    pub q1_rad: f64,
    pub q2_rad: f64,
    pub d3_m: f64,
}

impl JointSolution {
    pub fn from_degrees(q1_deg: f64, q2_deg: f64, d3_mm: f64) -> Self {
        Self {
            q1_deg,
            q2_deg,
            d3_mm,
            q1_rad: q1_deg.to_radians(),
            q2_rad: q2_deg.to_radians(),
            d3_m: d3_mm / 1000.0,
        }
    }

    pub fn from_radians(q1_rad: f64, q2_rad: f64, d3_m: f64) -> Self {
        Self {
            q1_deg: q1_rad.to_degrees(),
            q2_deg: q2_rad.to_degrees(),
            d3_mm: d3_m * 1000.0,
            q1_rad,
            q2_rad,
            d3_m,
        }
    }

    pub fn from_config(config: &JointConfig) -> Self {
        Self::from_degrees(config.q1_deg, config.q2_deg, config.d3_mm)
    }

    /// The operator-unit view of this solution.
    pub fn config(&self) -> JointConfig {
        JointConfig::new(self.q1_deg, self.q2_deg, self.d3_mm)
    }
}

/// Forward-kinematics result: the end-effector point plus the per-joint
/// transform chain for step-by-step display.
#[derive(Debug, Clone)]
pub struct FkSolution {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// A1, A2, A3 in joint order.
    pub joint_transforms: [Transform; 3],
    /// The composed base-to-effector transform.
    pub end_transform: Transform,
}
