//! Assertions over the engine's event stream.

use mp_protocol::{Event, StepKey, StepState};
use std::collections::HashMap;

/// Status updates for one step, in emission order.
pub fn status_trail(events: &[Event], key: StepKey) -> Vec<StepState> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::StepStatusUpdate { step, status, .. } if *step == key => Some(status.status),
            _ => None,
        })
        .collect()
}

/// Panic if any step is marked running twice without a terminal status in
/// between.
pub fn assert_at_most_one_in_flight(events: &[Event]) {
    let mut running: HashMap<StepKey, bool> = HashMap::new();
    for event in events {
        if let Event::StepStatusUpdate { step, status, .. } = event {
            let in_flight = running.entry(*step).or_insert(false);
            match status.status {
                StepState::Running => {
                    assert!(!*in_flight, "{step} marked running twice: {events:#?}");
                    *in_flight = true;
                }
                StepState::Success | StepState::Error | StepState::Idle => *in_flight = false,
            }
        }
    }
}

/// Panic unless the first event is `RunStarted` and the last `RunFinished`.
pub fn assert_run_bracketed(events: &[Event]) {
    assert!(
        matches!(events.first(), Some(Event::RunStarted { .. })),
        "First event should be RunStarted, got: {:?}",
        events.first()
    );
    assert!(
        matches!(events.last(), Some(Event::RunFinished { .. })),
        "Last event should be RunFinished, got: {:?}",
        events.last()
    );
}

/// Progress readings for one step that arrived after its terminal status.
pub fn progress_after_finish(events: &[Event], key: StepKey) -> usize {
    let mut finished = false;
    let mut late = 0;
    for event in events {
        match event {
            Event::StepStatusUpdate { step, status, .. } if *step == key => {
                finished = status.status.is_terminal();
            }
            Event::StepProgressUpdate { step, .. } if *step == key && finished => late += 1,
            _ => {}
        }
    }
    late
}
