//! Lifecycle transition table.
//!
//! The state machine is an explicit table mapping `(state, trigger)` to a
//! [`Transition`]: the guard that must hold, the actions to run around the
//! state change and the destination state. This module does no I/O; the
//! [`Session`](crate::Session) looks a transition up here and then runs the
//! guard and actions it names.
//!
//! ```text
//!            set_target            connect             stream
//!   Init ───────────────▶ TargetSet ───────▶ Connected ───────▶ Streaming
//!    ▲                      │  ▲   ▲             │                   │
//!    └──── unset_target ────┘  │   └─ disconnect ┘                   │
//!                              └────────────── disconnect ───────────┘
//! ```
//!
//! `Streaming` returns to `TargetSet` rather than `Connected`: once
//! notifications are torn down the transport handle is not reused, so
//! reconnecting is a fresh acquisition.

use blefsm_types::{State, Trigger};

use crate::error::{Error, Result};

/// Precondition evaluated before a transition is taken.
///
/// A guard that fails leaves the state unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Always passes.
    Always,
    /// Claim the requested address from the device registry.
    ClaimTarget,
    /// Connect to the target within the session's connection timeout.
    ConnectWithTimeout,
    /// Install the measurement handler and enable notifications.
    SetupStream,
}

/// Side effect attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do.
    None,
    /// Forget the target, returning a still-held device to the registry.
    ReleaseTarget,
    /// Return the device to the registry, then disconnect the transport.
    Disconnect,
    /// Disable notifications, then disconnect.
    StopStreamAndDisconnect,
    /// Start the background task that keeps the stream open.
    StartStreamTask,
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Trigger that selects this row.
    pub trigger: Trigger,
    /// State the row applies to.
    pub source: State,
    /// State entered when the guard passes.
    pub dest: State,
    /// Precondition.
    pub guard: Guard,
    /// Runs after the guard passes, before the state changes.
    pub before: Action,
    /// Runs after the state changes.
    pub after: Action,
}

/// The complete transition table.
pub const TRANSITIONS: [Transition; 6] = [
    Transition {
        trigger: Trigger::SetTarget,
        source: State::Init,
        dest: State::TargetSet,
        guard: Guard::ClaimTarget,
        before: Action::None,
        after: Action::None,
    },
    Transition {
        trigger: Trigger::UnsetTarget,
        source: State::TargetSet,
        dest: State::Init,
        guard: Guard::Always,
        before: Action::ReleaseTarget,
        after: Action::None,
    },
    Transition {
        trigger: Trigger::Connect,
        source: State::TargetSet,
        dest: State::Connected,
        guard: Guard::ConnectWithTimeout,
        before: Action::None,
        after: Action::None,
    },
    Transition {
        trigger: Trigger::Disconnect,
        source: State::Connected,
        dest: State::TargetSet,
        guard: Guard::Always,
        before: Action::Disconnect,
        after: Action::None,
    },
    Transition {
        trigger: Trigger::Stream,
        source: State::Connected,
        dest: State::Streaming,
        guard: Guard::SetupStream,
        before: Action::None,
        after: Action::StartStreamTask,
    },
    Transition {
        trigger: Trigger::Disconnect,
        source: State::Streaming,
        dest: State::TargetSet,
        guard: Guard::Always,
        before: Action::StopStreamAndDisconnect,
        after: Action::None,
    },
];

/// Look up the transition for `trigger` fired from `state`.
///
/// # Errors
///
/// Returns [`Error::InvalidTransition`] when the table has no such row.
pub fn transition(state: State, trigger: Trigger) -> Result<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.source == state && t.trigger == trigger)
        .ok_or_else(|| Error::InvalidTransition {
            trigger,
            state,
            accepted: triggers_from(state).collect(),
        })
}

/// Triggers accepted from `state`.
pub fn triggers_from(state: State) -> impl Iterator<Item = Trigger> {
    TRANSITIONS
        .iter()
        .filter(move |t| t.source == state)
        .map(|t| t.trigger)
}

/// The step that moves a session in `state` one hop closer to `Init`.
///
/// Returns `None` once the session is in `Init`.
pub fn cleanup_step(state: State) -> Option<Trigger> {
    match state {
        State::Init => None,
        State::TargetSet => Some(Trigger::UnsetTarget),
        State::Connected | State::Streaming => Some(Trigger::Disconnect),
    }
}
