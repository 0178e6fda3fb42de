use crate::{JointConfig, JointRanges};
use core::fmt;
use tracing::warn;

/// What the gate does about a violation. The default keeps the arm
/// operator-override-friendly: exceeded travel is reported and the command
/// still goes through. `Enforce` turns the same finding into a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatePolicy {
    #[default]
    WarnOnly,
    Enforce,
}

/// Gate outcome, kept two-valued on purpose: a `Warning` is a finding the
/// caller proceeds through, `Blocking` is a refusal. Collapsing these into
/// one failure state would lose the distinction the rest of the engine
/// depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clear,
    Warning,
    Blocking,
}

#[derive(Debug, Clone)]
pub struct LimitViolation {
    pub joint: &'static str,
    pub unit: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {:.2} {} outside [{:.2}, {:.2}]",
            self.joint, self.value, self.unit, self.min, self.max
        )
    }
}

#[derive(Debug, Clone)]
pub struct LimitReport {
    pub verdict: Verdict,
    pub violations: Vec<LimitViolation>,
}

impl LimitReport {
    pub fn is_clear(&self) -> bool {
        matches!(self.verdict, Verdict::Clear)
    }

    pub fn blocks(&self) -> bool {
        matches!(self.verdict, Verdict::Blocking)
    }
}

/// Checks candidate configurations against the configured joint travel
/// before any command is issued.
pub struct LimitGate {
    ranges: JointRanges,
    policy: GatePolicy,
}

impl LimitGate {
    pub fn new(ranges: JointRanges, policy: GatePolicy) -> Self {
        Self { ranges, policy }
    }

    pub fn ranges(&self) -> &JointRanges {
        &self.ranges
    }

    pub fn check(&self, config: &JointConfig) -> LimitReport {
        let mut violations = Vec::new();
        check_axis(&mut violations, "q1", "deg", config.q1_deg, self.ranges.q1_deg);
        check_axis(&mut violations, "q2", "deg", config.q2_deg, self.ranges.q2_deg);
        check_axis(&mut violations, "d3", "mm", config.d3_mm, self.ranges.d3_mm);

        let verdict = if violations.is_empty() {
            Verdict::Clear
        } else {
            for v in &violations {
                warn!(joint = v.joint, value = v.value, min = v.min, max = v.max, "joint limit exceeded");
            }
            match self.policy {
                GatePolicy::WarnOnly => Verdict::Warning,
                GatePolicy::Enforce => Verdict::Blocking,
            }
        };
        LimitReport {
            verdict,
            violations,
        }
    }
}

fn check_axis(
    out: &mut Vec<LimitViolation>,
    joint: &'static str,
    unit: &'static str,
    value: f64,
    (min, max): (f64, f64),
) {
    if value < min || value > max {
        out.push(LimitViolation {
            joint,
            unit,
            value,
            min,
            max,
        });
    }
}
