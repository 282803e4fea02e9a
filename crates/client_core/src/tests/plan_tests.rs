use super::*;
use shared::{
    domain::{StepId, ZoneId},
    geometry::ZoneRect,
};

fn zone(id: i64) -> Zone {
    Zone {
        id: ZoneId(id),
        environment_id: EnvironmentId(1),
        name: format!("Zone {id}"),
        rect: ZoneRect::from_corners(0, 0, 50, 50),
        color: "#ff0000".into(),
        created_at: None,
        created_by: "admin".into(),
        active: true,
    }
}

fn step(number: u32, zone_id: i64, target: f64) -> ProcessStep {
    ProcessStep {
        id: StepId(i64::from(number)),
        process_id: ProcessId(9),
        step_number: number,
        name: format!("Step {number}"),
        target_zone_id: ZoneId(zone_id),
        target_duration_seconds: target,
        description: String::new(),
    }
}

fn plan(zones: Vec<Zone>, steps: Vec<ProcessStep>) -> SessionPlan {
    SessionPlan::new(EnvironmentId(1), ProcessId(9), zones, steps)
}

#[test]
fn orders_steps_and_totals_targets() {
    let validated = plan(
        vec![zone(1), zone(2)],
        vec![step(2, 2, 15.0), step(1, 1, 10.0), step(3, 1, 20.0)],
    )
    .validated()
    .expect("valid");

    let numbers: Vec<u32> = validated.steps.iter().map(|s| s.step_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(validated.total_steps(), 3);
    assert_eq!(validated.target_total_seconds(), 45.0);
}

#[test]
fn empty_zone_or_step_lists_are_rejected() {
    assert_eq!(
        plan(Vec::new(), vec![step(1, 1, 5.0)]).validated(),
        Err(PreconditionFailure::NoZones)
    );
    assert_eq!(
        plan(vec![zone(1)], Vec::new()).validated(),
        Err(PreconditionFailure::NoSteps)
    );

    let mut inactive = zone(1);
    inactive.active = false;
    assert_eq!(
        plan(vec![inactive], vec![step(1, 1, 5.0)]).validated(),
        Err(PreconditionFailure::NoZones)
    );
}

#[test]
fn gaps_unknown_zones_and_bad_durations_are_invalid() {
    let gap = plan(vec![zone(1)], vec![step(1, 1, 5.0), step(3, 1, 5.0)]).validated();
    assert!(matches!(
        gap,
        Err(PreconditionFailure::InvalidSteps(reason)) if reason.contains("expected step 2")
    ));

    let unknown = plan(vec![zone(1)], vec![step(1, 4, 5.0)]).validated();
    assert!(matches!(
        unknown,
        Err(PreconditionFailure::InvalidSteps(reason)) if reason.contains("unknown zone 4")
    ));

    let zero = plan(vec![zone(1)], vec![step(1, 1, 0.0)]).validated();
    assert!(matches!(zero, Err(PreconditionFailure::InvalidSteps(_))));

    let nan = plan(vec![zone(1)], vec![step(1, 1, f64::NAN)]).validated();
    assert!(matches!(nan, Err(PreconditionFailure::InvalidSteps(_))));
}
