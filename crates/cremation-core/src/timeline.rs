//! Timeline projection of an order's status.
//!
//! Every step before the current status is completed, the current status is
//! the current step, and everything after it is upcoming. A completed order
//! therefore shows its final step as current, and the number of completed
//! steps always equals the index of the status.

use cremation_types::{OrderStatus, PhaseStep, StatusPhase, StepState, TimelineStep};

/// Projects a status onto the detailed seven-step timeline.
pub fn project(status: OrderStatus) -> Vec<TimelineStep> {
	let current = status.index();
	OrderStatus::ALL
		.into_iter()
		.map(|step| TimelineStep {
			index: step.index(),
			status: step,
			label: step.label().to_string(),
			state: StepState::classify(step.index(), current),
		})
		.collect()
}

/// Projects a status onto the coarse three-phase timeline.
pub fn project_phases(status: OrderStatus) -> Vec<PhaseStep> {
	let current = status.phase().index();
	StatusPhase::ALL
		.into_iter()
		.map(|phase| PhaseStep {
			index: phase.index(),
			phase,
			label: phase.label().to_string(),
			state: StepState::classify(phase.index(), current),
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn states(steps: &[TimelineStep]) -> Vec<StepState> {
		steps.iter().map(|s| s.state).collect()
	}

	#[test]
	fn test_completed_count_equals_index() {
		for status in OrderStatus::ALL {
			let steps = project(status);
			assert_eq!(steps.len(), 7);
			let completed = steps
				.iter()
				.filter(|s| s.state == StepState::Completed)
				.count();
			assert_eq!(completed, status.index(), "status {}", status);
			assert_eq!(
				steps
					.iter()
					.filter(|s| s.state == StepState::Current)
					.count(),
				1
			);
		}
	}

	#[test]
	fn test_pending_pickup_projection() {
		let steps = project(OrderStatus::PendingPickup);
		let mut expected = vec![StepState::Upcoming; 7];
		expected[0] = StepState::Current;
		assert_eq!(states(&steps), expected);
	}

	#[test]
	fn test_completed_projection() {
		let steps = project(OrderStatus::Completed);
		let mut expected = vec![StepState::Completed; 7];
		expected[6] = StepState::Current;
		assert_eq!(states(&steps), expected);
	}

	#[test]
	fn test_projection_is_idempotent() {
		for status in OrderStatus::ALL {
			assert_eq!(project(status), project(status));
		}
	}

	#[test]
	fn test_steps_carry_status_and_label() {
		let steps = project(OrderStatus::Cremating);
		assert_eq!(steps[3].status, OrderStatus::Cremating);
		assert_eq!(steps[3].label, "En cremación");
		assert_eq!(steps[3].state, StepState::Current);
		for (i, step) in steps.iter().enumerate() {
			assert_eq!(step.index, i);
		}
	}

	#[test]
	fn test_phase_projection() {
		let pending = project_phases(OrderStatus::PendingPickup);
		assert_eq!(pending[0].state, StepState::Current);
		assert_eq!(pending[2].state, StepState::Upcoming);

		let process = project_phases(OrderStatus::Delivered);
		assert_eq!(
			process.iter().map(|p| p.state).collect::<Vec<_>>(),
			vec![StepState::Completed, StepState::Current, StepState::Upcoming]
		);

		let done = project_phases(OrderStatus::Completed);
		assert_eq!(done[2].phase, StatusPhase::Completed);
		assert_eq!(done[2].state, StepState::Current);
	}

	#[test]
	fn test_json_state_names() {
		let steps = project(OrderStatus::InTransit);
		let value = serde_json::to_value(&steps).unwrap();
		assert_eq!(value[0]["state"], "completed");
		assert_eq!(value[1]["state"], "current");
		assert_eq!(value[2]["state"], "upcoming");
		assert_eq!(value[1]["status"], "IN_TRANSIT");
	}
}
