use crate::vr::{SessionState, XrEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    BeginSession,
    EndSession,
    /// Leave the render loop; with `restart` the system and session are rebuilt afterwards.
    Exit { restart: bool },
    /// The instance is going away: leave immediately and stop draining events.
    InstanceLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub effect: Effect,
}

pub fn transition(current: SessionState, event: &XrEvent) -> Transition {
    match event {
        XrEvent::InstanceLossPending { .. } => Transition {
            state: current,
            effect: Effect::InstanceLost,
        },
        XrEvent::SessionStateChanged { state, .. } => Transition {
            state: *state,
            effect: match state {
                SessionState::Ready => Effect::BeginSession,
                SessionState::Stopping => Effect::EndSession,
                SessionState::Exiting => Effect::Exit { restart: false },
                SessionState::LossPending => Effect::Exit { restart: true },
                SessionState::Unknown
                | SessionState::Idle
                | SessionState::Synchronized
                | SessionState::Visible
                | SessionState::Focused => Effect::None,
            },
        },
        XrEvent::EventsLost { .. }
        | XrEvent::ReferenceSpaceChangePending
        | XrEvent::InteractionProfileChanged
        | XrEvent::Unhandled(_) => Transition {
            state: current,
            effect: Effect::None,
        },
    }
}
