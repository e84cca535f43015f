//! Per-workspace polling state machine.
//!
//! Each workspace id is either idle or polling on behalf of `n >= 1`
//! subscribers. External events map to a pure [`transition`]; the registry
//! performs the returned [`Effect`].

/// Polling state of one workspace id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Polling { subscribers: usize },
}

/// Something that happened to a workspace id's subscriber set.
///
/// A connection closing is delivered as one `Unsubscribe` per id it held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// A new subscriber (not already subscribed) asked for this id.
    Subscribe,
    /// An existing subscriber left.
    Unsubscribe,
}

/// Side effect the caller must carry out after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    StartPolling,
    StopPolling,
}

pub fn transition(state: StreamState, event: StreamEvent) -> (StreamState, Effect) {
    match (state, event) {
        (StreamState::Idle, StreamEvent::Subscribe) => {
            (StreamState::Polling { subscribers: 1 }, Effect::StartPolling)
        }
        (StreamState::Idle, StreamEvent::Unsubscribe) => (StreamState::Idle, Effect::None),
        (StreamState::Polling { subscribers }, StreamEvent::Subscribe) => (
            StreamState::Polling {
                subscribers: subscribers + 1,
            },
            Effect::None,
        ),
        (StreamState::Polling { subscribers }, StreamEvent::Unsubscribe) if subscribers <= 1 => {
            (StreamState::Idle, Effect::StopPolling)
        }
        (StreamState::Polling { subscribers }, StreamEvent::Unsubscribe) => (
            StreamState::Polling {
                subscribers: subscribers - 1,
            },
            Effect::None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_subscribe_starts_polling() {
        assert_eq!(
            transition(StreamState::Idle, StreamEvent::Subscribe),
            (StreamState::Polling { subscribers: 1 }, Effect::StartPolling)
        );
    }

    #[test]
    fn test_additional_subscribers_share_poll() {
        let (state, effect) =
            transition(StreamState::Polling { subscribers: 1 }, StreamEvent::Subscribe);
        assert_eq!(state, StreamState::Polling { subscribers: 2 });
        assert_eq!(effect, Effect::None);
    }

    #[test]
    fn test_last_unsubscribe_stops_polling() {
        let (state, effect) =
            transition(StreamState::Polling { subscribers: 2 }, StreamEvent::Unsubscribe);
        assert_eq!(state, StreamState::Polling { subscribers: 1 });
        assert_eq!(effect, Effect::None);
        assert_eq!(
            transition(state, StreamEvent::Unsubscribe),
            (StreamState::Idle, Effect::StopPolling)
        );
    }

    #[test]
    fn test_unsubscribe_while_idle_is_noop() {
        assert_eq!(
            transition(StreamState::Idle, StreamEvent::Unsubscribe),
            (StreamState::Idle, Effect::None)
        );
    }
}
