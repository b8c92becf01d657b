//! Tests for data::MachineStatusSnapshot

use cncstream_core::{CNCPoint, ControllerState, MachineStatusSnapshot, SpindleState};

#[test]
fn test_work_position_subtracts_offset() {
    let snapshot = MachineStatusSnapshot::new()
        .with_machine_position(CNCPoint::xyz(10.0, 5.0, -2.0))
        .with_work_offset(CNCPoint::xyz(2.0, 1.0, -1.0));

    let wpos = snapshot.work_position();
    assert_eq!(wpos.x, 8.0);
    assert_eq!(wpos.y, 4.0);
    assert_eq!(wpos.z, -1.0);
}

#[test]
fn test_signed_spindle_speed() {
    let cw = MachineStatusSnapshot::new().with_spindle(SpindleState::Cw, 12000.0);
    let ccw = MachineStatusSnapshot::new().with_spindle(SpindleState::Ccw, 12000.0);
    let unknown = MachineStatusSnapshot::new().with_spindle(SpindleState::Unknown, 500.0);

    assert_eq!(cw.signed_spindle_speed(), Some(12000.0));
    assert_eq!(ccw.signed_spindle_speed(), Some(-12000.0));
    assert_eq!(unknown.signed_spindle_speed(), None);
    assert_eq!(MachineStatusSnapshot::new().signed_spindle_speed(), Some(0.0));
}

#[test]
fn test_builder_defaults() {
    let snapshot = MachineStatusSnapshot::default()
        .with_state(ControllerState::Hold)
        .with_axis_count(9);

    assert_eq!(snapshot.axis_count, 6);
    assert_eq!(snapshot.state.to_string(), "Hold");
    assert!(!snapshot.state.is_moving());
    assert_eq!(snapshot.overrides.as_percentages(), [100, 100, 100]);
}
