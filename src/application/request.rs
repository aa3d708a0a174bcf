//! Request lifecycle state machine.
//!
//! `NotSent → Loading → {Success | Failure}`, with `reset` returning to
//! `NotSent` from anywhere. Data and error live inside the phase that owns
//! them, so a request can never hold both, and `NotSent` holds neither.
//!
//! Transitions are not guarded: starting a request that is already loading
//! simply restarts it. Callers use [`RequestState::is_sent`] as their
//! single-flight check before issuing a call.

use crate::application::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    NotSent,
    Loading,
    Success,
    Failure,
}

#[derive(Debug, Clone)]
enum Phase<T, E> {
    NotSent,
    Loading,
    Success(Option<T>),
    Failure(Option<E>),
}

#[derive(Debug, Clone)]
pub struct RequestState<T = (), E = FetchError> {
    phase: Phase<T, E>,
}

impl<T, E> RequestState<T, E> {
    pub fn new() -> Self {
        Self {
            phase: Phase::NotSent,
        }
    }

    pub fn status(&self) -> RequestStatus {
        match self.phase {
            Phase::NotSent => RequestStatus::NotSent,
            Phase::Loading => RequestStatus::Loading,
            Phase::Success(_) => RequestStatus::Success,
            Phase::Failure(_) => RequestStatus::Failure,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match &self.phase {
            Phase::Success(data) => data.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match &self.phase {
            Phase::Failure(error) => error.as_ref(),
            _ => None,
        }
    }

    /// Enter `Loading`, discarding any previous data or error.
    pub fn on_start(&mut self) {
        self.phase = Phase::Loading;
    }

    /// Enter `Success`. Void operations pass `None` (or `()` for `T = ()`).
    pub fn on_success(&mut self, data: impl Into<Option<T>>) {
        self.phase = Phase::Success(data.into());
    }

    pub fn on_failure(&mut self, error: impl Into<Option<E>>) {
        self.phase = Phase::Failure(error.into());
    }

    pub fn reset(&mut self) {
        self.phase = Phase::NotSent;
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading)
    }

    pub fn is_sent(&self) -> bool {
        !matches!(self.phase, Phase::NotSent)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.phase, Phase::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.phase, Phase::Failure(_))
    }
}

impl<T, E> Default for RequestState<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Start,
        Succeed,
        Fail,
        Reset,
    }

    const OPS: [Op; 4] = [Op::Start, Op::Succeed, Op::Fail, Op::Reset];

    fn apply(state: &mut RequestState<u32, String>, op: Op, step: u32) {
        match op {
            Op::Start => state.on_start(),
            Op::Succeed => state.on_success(step),
            Op::Fail => state.on_failure(format!("failure {step}")),
            Op::Reset => state.reset(),
        }
    }

    fn assert_closed(state: &RequestState<u32, String>, last: Option<Op>) {
        let status = state.status();
        assert_eq!(state.data().is_some(), status == RequestStatus::Success);
        assert_eq!(state.error().is_some(), status == RequestStatus::Failure);
        assert!(state.data().is_none() || state.error().is_none());

        let expected = match last {
            None | Some(Op::Reset) => RequestStatus::NotSent,
            Some(Op::Start) => RequestStatus::Loading,
            Some(Op::Succeed) => RequestStatus::Success,
            Some(Op::Fail) => RequestStatus::Failure,
        };
        assert_eq!(status, expected);
        assert_eq!(state.is_sent(), status != RequestStatus::NotSent);
        assert_eq!(state.is_loading(), status == RequestStatus::Loading);
        assert_eq!(state.is_failure(), status == RequestStatus::Failure);
    }

    #[test]
    fn every_short_sequence_stays_closed() {
        let sequences = OPS.len().pow(5);
        for mut code in 0..sequences {
            let mut state = RequestState::<u32, String>::new();
            assert_closed(&state, None);
            for step in 0..5 {
                let op = OPS[code % OPS.len()];
                code /= OPS.len();
                apply(&mut state, op, step);
                assert_closed(&state, Some(op));
            }
        }
    }

    #[test]
    fn start_clears_previous_outcome() {
        let mut state = RequestState::<&str, &str>::new();
        state.on_start();
        state.on_success("games");
        assert_eq!(state.data(), Some(&"games"));

        state.on_start();
        assert!(state.data().is_none());
        assert!(state.is_loading());

        state.on_failure("offline");
        state.on_start();
        assert!(state.error().is_none());
    }

    #[test]
    fn void_success_is_distinguished_by_status() {
        let mut state = RequestState::<String, String>::new();
        state.on_start();
        state.on_success(None);

        assert!(state.is_success());
        assert!(state.data().is_none());

        let mut unit = RequestState::<(), String>::new();
        unit.on_success(());
        assert_eq!(unit.data(), Some(&()));
    }

    #[test]
    fn reset_returns_to_not_sent_from_failure() {
        let mut state = RequestState::<(), String>::new();
        state.on_start();
        state.on_failure("boom".to_string());
        assert!(state.is_sent());

        state.reset();
        assert_eq!(state.status(), RequestStatus::NotSent);
        assert!(state.error().is_none());
    }
}
