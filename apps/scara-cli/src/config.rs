use anyhow::{Context, Result};
use motion_engine::{MotionTimings, Pose};
use scara_kinematics::{JointRanges, ScaraGeometry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Session configuration, loaded from YAML at startup. Every field has a
/// default, so a missing or partial file is fine; CLI flags override
/// whatever the file says. Nothing is ever written back to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub geometry: ScaraGeometry,
    pub limits: JointRanges,
    pub link: LinkConfig,
    pub motion: MotionTimings,
    pub speed_percent: f64,
    pub speed_range: (f64, f64),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            geometry: ScaraGeometry::default(),
            limits: JointRanges::default(),
            link: LinkConfig::default(),
            motion: MotionTimings::default(),
            speed_percent: 100.0,
            speed_range: (20.0, 200.0),
        }
    }
}

impl SessionConfig {
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => {
                let text =
                    fs::read_to_string(p).with_context(|| format!("reading config {p}"))?;
                serde_yaml::from_str(&text).with_context(|| format!("parsing config {p}"))
            }
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device of the arm controller; absent means disconnected mode.
    pub device: Option<String>,
    pub baud: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud: 115_200,
        }
    }
}

/// A routine file is a YAML list of poses.
pub fn load_routine(path: impl AsRef<Path>) -> Result<Vec<Pose>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading routine {}", path.display()))?;
    let poses: Vec<Pose> = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing routine {}", path.display()))?;
    Ok(poses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: SessionConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.link.baud, 115_200);
        assert_eq!(cfg.speed_percent, 100.0);
        assert_eq!(cfg.motion.animation_steps, 30);
        assert_eq!(cfg.motion.step_delay_ms, 1500.0);
    }

    #[test]
    fn partial_document_overrides_only_what_it_names() {
        let cfg: SessionConfig = serde_yaml::from_str(
            "link:\n  device: /dev/ttyUSB0\nmotion:\n  animation_ms: 300.0\nspeed_percent: 50.0\n",
        )
        .unwrap();
        assert_eq!(cfg.link.device.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cfg.link.baud, 115_200);
        assert_eq!(cfg.motion.animation_ms, 300.0);
        assert_eq!(cfg.motion.animation_steps, 30);
        assert_eq!(cfg.speed_percent, 50.0);
    }

    #[test]
    fn routine_yaml_parses_pose_list() {
        let poses: Vec<Pose> = serde_yaml::from_str(
            "- { q1_deg: 10.0, q2_deg: -20.0, d3_mm: 30.0, gripper_open: false }\n\
             - { q1_deg: 0.0, q2_deg: 0.0, d3_mm: 0.0 }\n",
        )
        .unwrap();
        assert_eq!(poses.len(), 2);
        assert!(!poses[0].gripper_open);
        assert!(poses[1].gripper_open);
    }
}
