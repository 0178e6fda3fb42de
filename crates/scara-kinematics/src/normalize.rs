use crate::{IkFields, IkOutcome, IkPayload, JointSolution, KinematicsError, Result};

/// The single boundary between a solver's loosely shaped inverse result and
/// the engine's canonical [`JointSolution`].
///
/// A failed verdict becomes [`KinematicsError::NoSolution`] no matter what
/// payload came along. For a keyed payload, missing degree fields are filled
/// from the radian ones and missing millimeters from meters; a positional
/// triple is read as (q1_rad, q2_rad, d3_m). If the operator-unit fields are
/// still incomplete after filling, the result is
/// [`KinematicsError::IncompleteSolution`]. Radian and meter fields the
/// solver did provide are kept verbatim rather than recomputed.
pub fn normalize_solution(outcome: IkOutcome) -> Result<JointSolution> {
    if !outcome.ok {
        return Err(KinematicsError::NoSolution(outcome.message));
    }
    let fields = match outcome.payload {
        None => return Err(KinematicsError::IncompleteSolution("missing info")),
        Some(IkPayload::Triple(q1_rad, q2_rad, d3_m)) => IkFields {
            q1_rad: Some(q1_rad),
            q2_rad: Some(q2_rad),
            d3_m: Some(d3_m),
            ..IkFields::default()
        },
        Some(IkPayload::Fields(fields)) => fields,
    };

    let q1_deg = fields.q1_deg.or_else(|| fields.q1_rad.map(f64::to_degrees));
    let q2_deg = fields.q2_deg.or_else(|| fields.q2_rad.map(f64::to_degrees));
    let d3_mm = fields.d3_mm.or_else(|| fields.d3_m.map(|m| m * 1000.0));

    match (q1_deg, q2_deg, d3_mm) {
        (Some(q1_deg), Some(q2_deg), Some(d3_mm)) => Ok(JointSolution {
            q1_deg,
            q2_deg,
            d3_mm,
            q1_rad: fields.q1_rad.unwrap_or_else(|| q1_deg.to_radians()),
            q2_rad: fields.q2_rad.unwrap_or_else(|| q2_deg.to_radians()),
            d3_m: fields.d3_m.unwrap_or(d3_mm / 1000.0),
        }),
        _ => Err(KinematicsError::IncompleteSolution("missing joint fields")),
    }
}
