use scara_kinematics::JointSolution;

/// Serialize one actuator command line.
///
/// This is the sole outbound wire contract and the controller firmware
/// parses it positionally, so the format is byte-exact: radians and meters
/// at four decimals, the gripper as a bare 0/1, the speed factor at two
/// decimals, newline terminated.
pub fn encode_command(solution: &JointSolution, gripper_open: bool, speed_factor: f64) -> String {
    format!(
        "{:.4},{:.4},{:.4},{},{:.2}\n",
        solution.q1_rad,
        solution.q2_rad,
        solution.d3_m,
        i32::from(gripper_open),
        speed_factor
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_line_is_byte_exact() {
        let solution = JointSolution::from_radians(0.12345, -0.5, 0.0423);
        let line = encode_command(&solution, true, 1.0);
        assert_eq!(line, "0.1235,-0.5000,0.0423,1,1.00\n");
        assert_eq!(line.as_bytes().last(), Some(&b'\n'));
    }

    #[test]
    fn closed_gripper_encodes_as_zero() {
        let solution = JointSolution::from_degrees(0.0, 0.0, 0.0);
        assert_eq!(
            encode_command(&solution, false, 0.75),
            "0.0000,0.0000,0.0000,0,0.75\n"
        );
    }

    #[test]
    fn speed_factor_keeps_two_decimals() {
        let solution = JointSolution::from_degrees(0.0, 0.0, 0.0);
        assert!(encode_command(&solution, true, 0.1).ends_with(",0.10\n"));
        assert!(encode_command(&solution, true, 2.0).ends_with(",2.00\n"));
    }

    #[test]
    fn degree_built_solutions_encode_their_si_fields() {
        let solution = JointSolution::from_degrees(90.0, -90.0, 60.0);
        assert_eq!(
            encode_command(&solution, true, 1.0),
            "1.5708,-1.5708,0.0600,1,1.00\n"
        );
    }
}
