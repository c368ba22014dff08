//! Presence state machine
//!
//! A user is *idle* while their stored active-event set is empty and *busy*
//! otherwise. [`decide`] maps the stored state, the current platform presence
//! and the remote busy events of this sync onto one [`Transition`]; applying
//! it is left to the caller so every edge can be tested without I/O.
//!
//! | stored | remote busy | current presence   | outcome                                       |
//! |--------|-------------|--------------------|-----------------------------------------------|
//! | any    | any         | offline, no prompt | nothing                                       |
//! | idle   | none        | any                | nothing                                       |
//! | idle   | some        | == busy target     | remember manual status, store fingerprints    |
//! | idle   | some        | != busy target     | go busy, store fingerprints                   |
//! | busy   | none        | == busy target     | go free (restore last status), clear set      |
//! | busy   | none        | != busy target     | clear set                                     |
//! | busy   | same set    | any                | nothing                                       |
//! | busy   | new member  | != busy target     | go busy, store fingerprints                   |
//! | busy   | new member  | == busy target     | store fingerprints                            |

use calsync_domain::PresenceStatus;

/// Everything the state machine looks at for one user
#[derive(Debug, Clone)]
pub struct StatusInput<'a> {
    /// Presence to use while in a meeting
    pub busy_status: PresenceStatus,
    pub current: PresenceStatus,
    /// Whether the current presence was set by the user
    pub manual: bool,
    pub get_confirmation: bool,
    pub last_status: Option<PresenceStatus>,
    pub active_events: &'a [String],
    pub remote_fingerprints: &'a [String],
}

/// Presence change requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    None,
    /// Write the presence directly
    Set(PresenceStatus),
    /// Ask the user through a confirmation prompt
    Ask { to: PresenceStatus, is_free: bool },
}

/// Update to the stored "status before the meeting"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastStatusUpdate {
    Keep,
    Write(Option<PresenceStatus>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: StatusAction,
    pub last_status: LastStatusUpdate,
    /// New active-event set to persist, if any
    pub active_events: Option<Vec<String>>,
    /// Counted as a status change in the job summary
    pub changed: bool,
    pub reason: &'static str,
}

impl Transition {
    fn noop(reason: &'static str) -> Self {
        Self {
            action: StatusAction::None,
            last_status: LastStatusUpdate::Keep,
            active_events: None,
            changed: false,
            reason,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.action == StatusAction::None
            && self.last_status == LastStatusUpdate::Keep
            && self.active_events.is_none()
    }
}

fn remember(input: &StatusInput<'_>) -> Option<PresenceStatus> {
    input.manual.then_some(input.current)
}

/// Go busy, directly or through a prompt
fn enter_busy(input: &StatusInput<'_>, reason: &'static str) -> Transition {
    let (action, last_status) = if input.get_confirmation {
        (StatusAction::Ask { to: input.busy_status, is_free: false }, LastStatusUpdate::Keep)
    } else {
        (StatusAction::Set(input.busy_status), LastStatusUpdate::Write(remember(input)))
    };
    Transition {
        action,
        last_status,
        active_events: Some(input.remote_fingerprints.to_vec()),
        changed: true,
        reason,
    }
}

pub fn decide(input: &StatusInput<'_>) -> Transition {
    if input.current == PresenceStatus::Offline && !input.get_confirmation {
        return Transition::noop("user offline and does not want confirmations");
    }

    let is_busy_now = input.current == input.busy_status;

    match (input.active_events.is_empty(), input.remote_fingerprints.is_empty()) {
        (true, true) => Transition::noop("no events in local or remote"),

        (false, true) => {
            if !is_busy_now {
                return Transition {
                    active_events: Some(Vec::new()),
                    ..Transition::noop("no longer busy in calendar, presence already changed")
                };
            }
            let to = input.last_status.unwrap_or(PresenceStatus::Online);
            let action = if input.get_confirmation {
                StatusAction::Ask { to, is_free: true }
            } else {
                StatusAction::Set(to)
            };
            Transition {
                action,
                last_status: LastStatusUpdate::Write(None),
                active_events: Some(Vec::new()),
                changed: true,
                reason: "no longer busy in calendar, restoring previous status",
            }
        }

        (true, false) => {
            if is_busy_now {
                return Transition {
                    last_status: LastStatusUpdate::Write(remember(input)),
                    active_events: Some(input.remote_fingerprints.to_vec()),
                    ..Transition::noop("already marked as busy")
                };
            }
            enter_busy(input, "was free, now busy")
        }

        (false, false) => {
            let has_new_event = input
                .remote_fingerprints
                .iter()
                .any(|fingerprint| !input.active_events.contains(fingerprint));
            if !has_new_event {
                return Transition::noop("no change in active events");
            }
            if is_busy_now {
                return Transition {
                    active_events: Some(input.remote_fingerprints.to_vec()),
                    ..Transition::noop("already busy, new event joined")
                };
            }
            enter_busy(input, "new busy event while free")
        }
    }
}
