use serde::{Deserialize, Serialize};

/// Interview session status as owned by the external session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    /// Lobby: participants joining, consent being collected.
    Waiting,
    Active,
    Ended,
    Cancelled,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Scheduled
    }
}

impl SessionStatus {
    /// Ended and Cancelled both close monitoring and allow a report.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Cancelled)
    }
}

/// Requests a status change. The graph decides whether it is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequest {
    OpenLobby,
    Begin,
    End,
    Cancel,
}

pub struct SessionStatusGraph;

impl SessionStatusGraph {
    /// Pure function: (current, request) -> new status.
    /// Returns None if the transition is invalid.
    pub fn transition(current: SessionStatus, request: SessionRequest) -> Option<SessionStatus> {
        use SessionRequest::*;
        use SessionStatus::*;

        match (current, request) {
            (Scheduled, OpenLobby) => Some(Waiting),
            (Waiting, Begin) => Some(Active),
            (Active, End) => Some(Ended),

            (Scheduled, Cancel) | (Waiting, Cancel) | (Active, Cancel) => Some(Cancelled),

            // Terminal states are final.
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_ended() {
        let mut status = SessionStatus::default();
        for request in [SessionRequest::OpenLobby, SessionRequest::Begin, SessionRequest::End] {
            status = SessionStatusGraph::transition(status, request).expect("legal transition");
        }
        assert_eq!(status, SessionStatus::Ended);
        assert!(status.is_terminal());
    }

    #[test]
    fn terminal_states_are_final() {
        assert_eq!(SessionStatusGraph::transition(SessionStatus::Ended, SessionRequest::Begin), None);
        assert_eq!(SessionStatusGraph::transition(SessionStatus::Cancelled, SessionRequest::End), None);
        assert_eq!(SessionStatusGraph::transition(SessionStatus::Ended, SessionRequest::Cancel), None);
    }

    #[test]
    fn cannot_skip_the_lobby() {
        assert_eq!(SessionStatusGraph::transition(SessionStatus::Scheduled, SessionRequest::Begin), None);
        assert_eq!(
            SessionStatusGraph::transition(SessionStatus::Waiting, SessionRequest::Cancel),
            Some(SessionStatus::Cancelled)
        );
    }
}
