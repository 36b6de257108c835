//! Convergence loop state machine for syncmesh.
//!
//! This module provides a pure, side-effect-free state machine for the
//! poll/sleep cycle. It takes events as input and produces a new state plus
//! a list of actions to execute.
//!
//! The actual I/O (running a pass, sleeping, exiting) is performed by
//! mesh-controller, not by this module. A pass outcome never stops the loop:
//! both success and failure lead to Sleeping. Only a shutdown request does.

/// Convergence loop state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// A pass is running.
    Polling {
        /// 1-based number of the running pass.
        pass: u64,
        /// Failed passes immediately preceding this one.
        consecutive_failures: u32,
    },
    /// Idle between passes.
    Sleeping {
        /// Number of the last finished pass.
        last_pass: u64,
        /// Failed passes in a row, including the last one.
        consecutive_failures: u32,
    },
    /// Shutdown requested; the loop has ended.
    Stopped,
}

impl LoopState {
    /// Enter the first pass.
    pub fn start() -> (Self, Vec<Action>) {
        (
            Self::Polling {
                pass: 1,
                consecutive_failures: 0,
            },
            vec![Action::RunPass { pass: 1 }],
        )
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            (_, Event::ShutdownRequested) => (Self::Stopped, vec![Action::Exit]),

            // From Polling
            (Self::Polling { pass, .. }, Event::PassSucceeded) => (
                Self::Sleeping {
                    last_pass: pass,
                    consecutive_failures: 0,
                },
                vec![
                    Action::Report(LoopEvent::PassSucceeded { pass }),
                    Action::Sleep,
                ],
            ),
            (
                Self::Polling {
                    pass,
                    consecutive_failures,
                },
                Event::PassFailed { error },
            ) => {
                let consecutive_failures = consecutive_failures.saturating_add(1);
                (
                    Self::Sleeping {
                        last_pass: pass,
                        consecutive_failures,
                    },
                    vec![
                        Action::Report(LoopEvent::PassFailed {
                            pass,
                            error,
                            consecutive_failures,
                        }),
                        Action::Sleep,
                    ],
                )
            }

            // From Sleeping
            (
                Self::Sleeping {
                    last_pass,
                    consecutive_failures,
                },
                Event::TimerElapsed,
            ) => {
                let pass = last_pass.saturating_add(1);
                (
                    Self::Polling {
                        pass,
                        consecutive_failures,
                    },
                    vec![Action::RunPass { pass }],
                )
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a pass is running.
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Polling { .. })
    }

    /// Check if the loop has ended.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Events that drive the convergence loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The running pass finished without error.
    PassSucceeded,
    /// The running pass raised an error.
    PassFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The sleep interval has elapsed.
    TimerElapsed,
    /// Termination signal received.
    ShutdownRequested,
}

/// Actions to be executed by the loop runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run one discovery, resolve and reconcile pass.
    RunPass {
        /// Pass number, for logging.
        pass: u64,
    },
    /// Sleep for the configured poll interval.
    Sleep,
    /// Surface a pass outcome to logs and counters.
    Report(LoopEvent),
    /// Leave the loop.
    Exit,
}

/// Pass outcomes surfaced to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// A pass converged every peer.
    PassSucceeded {
        /// Pass number.
        pass: u64,
    },
    /// A pass was aborted by an error; the next one retries everything.
    PassFailed {
        /// Pass number.
        pass: u64,
        /// Error message.
        error: String,
        /// Failed passes in a row.
        consecutive_failures: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_polling_first_pass() {
        let (state, actions) = LoopState::start();
        assert!(state.is_polling());
        assert_eq!(actions, vec![Action::RunPass { pass: 1 }]);
    }

    #[test]
    fn success_transitions_to_sleeping() {
        let (state, _) = LoopState::start();
        let (state, actions) = state.on_event(Event::PassSucceeded);

        assert_eq!(
            state,
            LoopState::Sleeping {
                last_pass: 1,
                consecutive_failures: 0
            }
        );
        assert!(actions.contains(&Action::Sleep));
        assert!(actions.contains(&Action::Report(LoopEvent::PassSucceeded { pass: 1 })));
    }

    #[test]
    fn failure_also_transitions_to_sleeping() {
        let (state, _) = LoopState::start();
        let (state, actions) = state.on_event(Event::PassFailed {
            error: "peer unreachable".into(),
        });

        assert!(matches!(
            state,
            LoopState::Sleeping {
                consecutive_failures: 1,
                ..
            }
        ));
        assert!(actions.contains(&Action::Sleep));
        assert!(!actions.contains(&Action::Exit));
    }

    #[test]
    fn timer_starts_next_pass() {
        let state = LoopState::Sleeping {
            last_pass: 4,
            consecutive_failures: 2,
        };
        let (state, actions) = state.on_event(Event::TimerElapsed);

        assert_eq!(
            state,
            LoopState::Polling {
                pass: 5,
                consecutive_failures: 2
            }
        );
        assert_eq!(actions, vec![Action::RunPass { pass: 5 }]);
    }

    #[test]
    fn consecutive_failures_accumulate_and_reset() {
        let (mut state, _) = LoopState::start();
        for _ in 0..3 {
            state = state
                .on_event(Event::PassFailed { error: "x".into() })
                .0
                .on_event(Event::TimerElapsed)
                .0;
        }
        let (state, actions) = state.on_event(Event::PassFailed { error: "x".into() });
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Report(LoopEvent::PassFailed {
                pass: 4,
                consecutive_failures: 4,
                ..
            })
        )));

        let (state, _) = state.on_event(Event::TimerElapsed);
        let (state, _) = state.on_event(Event::PassSucceeded);
        assert!(matches!(
            state,
            LoopState::Sleeping {
                consecutive_failures: 0,
                ..
            }
        ));
    }

    #[test]
    fn shutdown_stops_from_any_state() {
        let states = [
            LoopState::Polling {
                pass: 1,
                consecutive_failures: 0,
            },
            LoopState::Sleeping {
                last_pass: 1,
                consecutive_failures: 0,
            },
        ];
        for state in states {
            let (state, actions) = state.on_event(Event::ShutdownRequested);
            assert!(state.is_stopped());
            assert_eq!(actions, vec![Action::Exit]);
        }
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let sleeping = LoopState::Sleeping {
            last_pass: 1,
            consecutive_failures: 0,
        };
        let (state, actions) = sleeping.clone().on_event(Event::PassSucceeded);
        assert_eq!(state, sleeping);
        assert!(actions.is_empty());

        let (state, actions) = LoopState::Stopped.on_event(Event::TimerElapsed);
        assert!(state.is_stopped());
        assert!(actions.is_empty());
    }
}
