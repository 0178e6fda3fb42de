use serde::{Deserialize, Serialize};

/// Link geometry of the arm: two revolute link lengths and the base column
/// height the prismatic joint retracts into. All meters.
///
/// `z = d0_m - d3_m`: the prismatic joint extends downward from the column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScaraGeometry {
    #[serde(default = "default_l1")]
    pub l1_m: f64,
    #[serde(default = "default_l2")]
    pub l2_m: f64,
    #[serde(default = "default_d0")]
    pub d0_m: f64,
}

fn default_l1() -> f64 {
    0.15
}
fn default_l2() -> f64 {
    0.10
}
fn default_d0() -> f64 {
    0.11
}

impl Default for ScaraGeometry {
    fn default() -> Self {
        Self {
            l1_m: default_l1(),
            l2_m: default_l2(),
            d0_m: default_d0(),
        }
    }
}

impl ScaraGeometry {
    /// Furthest radial reach in the plane.
    pub fn reach_max(&self) -> f64 {
        self.l1_m + self.l2_m
    }

    /// Closest radial reach in the plane.
    pub fn reach_min(&self) -> f64 {
        (self.l1_m - self.l2_m).abs()
    }
}

/// Configured joint travel, in the operator-facing units (degrees for the
/// revolute joints, millimeters of extension for the prismatic one).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JointRanges {
    #[serde(default = "default_rev_range")]
    pub q1_deg: (f64, f64),
    #[serde(default = "default_rev_range")]
    pub q2_deg: (f64, f64),
    #[serde(default = "default_stroke")]
    pub d3_mm: (f64, f64),
}

fn default_rev_range() -> (f64, f64) {
    (-90.0, 90.0)
}
fn default_stroke() -> (f64, f64) {
    (0.0, 60.0)
}

impl Default for JointRanges {
    fn default() -> Self {
        Self {
            q1_deg: default_rev_range(),
            q2_deg: default_rev_range(),
            d3_mm: default_stroke(),
        }
    }
}
