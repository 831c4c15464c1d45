//! Mirrored device state
//!
//! `apply_event` folds one decoded event into the previous state. It is pure:
//! the same state and event always give the same result, and `last_update` is
//! taken from the event rather than the clock.

use dipcoat_core::{Axis, DeviceState, EventKind, HomeStatus, ParsedEvent, StatusSnapshot};

/// Return the state that results from applying `event` to `state`
pub fn apply_event(state: &DeviceState, event: &ParsedEvent) -> DeviceState {
    let mut next = state.clone();

    match &event.kind {
        EventKind::Mode { mode } => next.mode = *mode,
        EventKind::Position { axis, position } => {
            let axis = next.axis_mut(*axis);
            axis.position = *position;
            axis.moving = false;
        }
        EventKind::Movement { axis, interrupted } => {
            next.axis_mut(*axis).moving = !interrupted;
        }
        EventKind::Limit { axis, side } => {
            let axis = next.axis_mut(*axis);
            axis.set_limit(*side, true);
            axis.moving = false;
        }
        EventKind::Home { axis, status } => match (axis, status) {
            (_, HomeStatus::Complete) | (None, HomeStatus::Found) => {
                for axis in Axis::ALL {
                    mark_home_found(&mut next, axis);
                }
            }
            (Some(axis), HomeStatus::Found) => mark_home_found(&mut next, *axis),
            (Some(axis), HomeStatus::Searching) => next.axis_mut(*axis).moving = true,
            (None, HomeStatus::Searching) => {
                for axis in Axis::ALL {
                    next.axis_mut(axis).moving = true;
                }
            }
        },
        EventKind::Emergency { active } => {
            next.emergency_stop = *active;
            if *active {
                stop_all(&mut next);
            }
        }
        EventKind::Status { snapshot } => apply_snapshot(&mut next, snapshot),
        EventKind::Error { .. } | EventKind::Message => {}
    }

    next.last_update = Some(event.received_at);
    next
}

fn mark_home_found(state: &mut DeviceState, axis: Axis) {
    let axis = state.axis_mut(axis);
    axis.at_home = true;
    axis.position = 0;
    axis.moving = false;
}

fn stop_all(state: &mut DeviceState) {
    state.axis_y.moving = false;
    state.axis_z.moving = false;
}

fn apply_snapshot(state: &mut DeviceState, snapshot: &StatusSnapshot) {
    if let Some(mode) = snapshot.mode {
        state.mode = mode;
    }
    if let Some(emergency) = snapshot.emergency {
        state.emergency_stop = emergency;
    }

    let per_axis = [
        (
            Axis::Y,
            snapshot.position_y,
            snapshot.home_y,
            snapshot.limit_y_min,
            snapshot.limit_y_max,
        ),
        (
            Axis::Z,
            snapshot.position_z,
            snapshot.home_z,
            snapshot.limit_z_min,
            snapshot.limit_z_max,
        ),
    ];

    for (axis, position, home, limit_min, limit_max) in per_axis {
        let axis = state.axis_mut(axis);
        if let Some(position) = position {
            axis.position = position;
        }
        if let Some(home) = home {
            axis.at_home = home;
        }
        if let Some(limit_min) = limit_min {
            axis.limit_min = limit_min;
        }
        if let Some(limit_max) = limit_max {
            axis.limit_max = limit_max;
        }
        axis.derive_at_limit();
    }

    if snapshot.emergency == Some(true) {
        stop_all(state);
    }
}
