/// Percentages below this still run at this floor, so a careless setting can
/// never stall motion or divide a duration by zero.
pub const MIN_EFFECTIVE_PERCENT: f64 = 10.0;

/// The effective timing scalar for a raw percentage, flooring at
/// [`MIN_EFFECTIVE_PERCENT`] before dividing by 100.
pub fn factor_for(percent: f64) -> f64 {
    percent.max(MIN_EFFECTIVE_PERCENT) / 100.0
}

/// Operator speed setting. The stored percent is clamped to the configured
/// display range; the effective factor applies the global floor on top, so
/// the factor stays in [0.1, inf) whatever range a surface configures.
#[derive(Debug, Clone, Copy)]
pub struct SpeedModel {
    percent: f64,
    range: (f64, f64),
}

impl Default for SpeedModel {
    fn default() -> Self {
        Self {
            percent: 100.0,
            range: (20.0, 200.0),
        }
    }
}

impl SpeedModel {
    pub fn new(percent: f64, range: (f64, f64)) -> Self {
        // The range comes straight from operator config; store it low-high
        // whatever order it arrived in.
        let range = (range.0.min(range.1), range.0.max(range.1));
        let mut model = Self {
            percent: 0.0,
            range,
        };
        model.set_percent(percent);
        model
    }

    pub fn set_percent(&mut self, percent: f64) {
        let (lo, hi) = self.range;
        self.percent = percent.min(hi).max(lo);
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn factor(&self) -> f64 {
        factor_for(self.percent)
    }
}
