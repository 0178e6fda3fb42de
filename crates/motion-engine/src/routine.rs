use scara_kinematics::{JointConfig, JointSolution};
use serde::{Deserialize, Serialize};

/// One stored routine entry: a joint configuration plus the gripper state to
/// assume once the arm arrives there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub q1_deg: f64,
    pub q2_deg: f64,
    pub d3_mm: f64,
    #[serde(default = "default_gripper")]
    pub gripper_open: bool,
}

fn default_gripper() -> bool {
    true
}

impl Pose {
    pub fn new(q1_deg: f64, q2_deg: f64, d3_mm: f64, gripper_open: bool) -> Self {
        Self {
            q1_deg,
            q2_deg,
            d3_mm,
            gripper_open,
        }
    }

    pub fn config(&self) -> JointConfig {
        JointConfig::new(self.q1_deg, self.q2_deg, self.d3_mm)
    }

    pub fn solution(&self) -> JointSolution {
        JointSolution::from_degrees(self.q1_deg, self.q2_deg, self.d3_mm)
    }
}

/// Ordered pose sequence. Insertion order is execution order; entries are
/// indexed from 0 internally and shown to the operator from 1. Poses can be
/// appended and the store cleared whole; there is no per-entry removal or
/// reordering.
#[derive(Debug, Clone, Default)]
pub struct RoutineStore {
    poses: Vec<Pose>,
}

impl RoutineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_poses(poses: Vec<Pose>) -> Self {
        Self { poses }
    }

    pub fn push(&mut self, pose: Pose) {
        self.poses.push(pose);
    }

    pub fn clear(&mut self) {
        self.poses.clear();
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pose> {
        self.poses.get(index)
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }
}
