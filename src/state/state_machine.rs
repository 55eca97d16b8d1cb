use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle of a party, from lobby to final scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyStatus {
    /// Players are joining and may pre-submit their phase-1 statements.
    Lobby,
    /// Statement collection window for phase 1.
    RunningPhase1Prep,
    /// Group rounds are being played.
    RunningPhase1,
    /// Cross-group rounds narrated by the best liars of each group.
    RunningPhase2,
    /// Terminal state.
    Finished,
}

/// Events driving the party lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyEvent {
    /// A member starts the game (or the last lobby submission auto-starts it).
    StartPhase1,
    /// Statement collection ended, either because everyone submitted or on timeout.
    PrepFinalized,
    /// A member starts the cross-group phase after phase 1 completed.
    StartPhase2,
    /// Every phase-2 round has been played or the phase timed out.
    Phase2Completed,
}

/// Lifecycle of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    /// Queued behind the current round of its sequence.
    Draft,
    /// Phase-2 round waiting for its narrator's statements.
    Questioning,
    /// Statements are known and eligible players may vote.
    Voting,
    /// Scores are being settled; the lie is known.
    Reveal,
    /// Terminal state.
    Closed,
}

/// Events driving the round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// Open a phase-1 round whose statements were collected beforehand.
    OpenVoting,
    /// Open a phase-2 round; the narrator still has to submit statements.
    OpenQuestioning,
    /// The narrator submitted the statements of a phase-2 round.
    StatementsSubmitted,
    /// Reveal the lie, either because everyone voted or on a forced close.
    Reveal,
    /// Scores have been applied to the party.
    Settle,
    /// Drop a round that never started because its phase ran out of time.
    Skip,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    /// The party lifecycle rejected the event.
    #[error("invalid transition: {event:?} cannot be applied while party is {from:?}")]
    Party {
        /// Status the party was in when the event was received.
        from: PartyStatus,
        /// The rejected event.
        event: PartyEvent,
    },
    /// The round lifecycle rejected the event.
    #[error("invalid transition: {event:?} cannot be applied while round is {from:?}")]
    Round {
        /// Status the round was in when the event was received.
        from: RoundStatus,
        /// The rejected event.
        event: RoundEvent,
    },
}

impl PartyStatus {
    /// Compute the status reached by applying `event`, if the transition is valid.
    pub fn next(self, event: PartyEvent) -> Result<PartyStatus, InvalidTransition> {
        let next = match (self, event) {
            (PartyStatus::Lobby, PartyEvent::StartPhase1) => PartyStatus::RunningPhase1Prep,
            (PartyStatus::RunningPhase1Prep, PartyEvent::PrepFinalized) => {
                PartyStatus::RunningPhase1
            }
            (PartyStatus::RunningPhase1, PartyEvent::StartPhase2) => PartyStatus::RunningPhase2,
            (PartyStatus::RunningPhase2, PartyEvent::Phase2Completed) => PartyStatus::Finished,
            (from, event) => return Err(InvalidTransition::Party { from, event }),
        };

        Ok(next)
    }

    /// Whether the party still has a phase deadline that may fire.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            PartyStatus::RunningPhase1Prep
                | PartyStatus::RunningPhase1
                | PartyStatus::RunningPhase2
        )
    }
}

impl RoundStatus {
    /// Compute the status reached by applying `event`, if the transition is valid.
    pub fn next(self, event: RoundEvent) -> Result<RoundStatus, InvalidTransition> {
        let next = match (self, event) {
            (RoundStatus::Draft, RoundEvent::OpenVoting) => RoundStatus::Voting,
            (RoundStatus::Draft, RoundEvent::OpenQuestioning) => RoundStatus::Questioning,
            (RoundStatus::Questioning, RoundEvent::StatementsSubmitted) => RoundStatus::Voting,
            (RoundStatus::Questioning | RoundStatus::Voting, RoundEvent::Reveal) => {
                RoundStatus::Reveal
            }
            (RoundStatus::Reveal, RoundEvent::Settle) => RoundStatus::Closed,
            (RoundStatus::Draft, RoundEvent::Skip) => RoundStatus::Closed,
            (from, event) => return Err(InvalidTransition::Round { from, event }),
        };

        Ok(next)
    }

    /// Rounds that a member may force-close.
    pub fn is_open(self) -> bool {
        matches!(self, RoundStatus::Questioning | RoundStatus::Voting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_happy_path_through_party() {
        let status = PartyStatus::Lobby;
        let status = status.next(PartyEvent::StartPhase1).unwrap();
        assert_eq!(status, PartyStatus::RunningPhase1Prep);
        let status = status.next(PartyEvent::PrepFinalized).unwrap();
        assert_eq!(status, PartyStatus::RunningPhase1);
        let status = status.next(PartyEvent::StartPhase2).unwrap();
        assert_eq!(status, PartyStatus::RunningPhase2);
        let status = status.next(PartyEvent::Phase2Completed).unwrap();
        assert_eq!(status, PartyStatus::Finished);
        assert!(!status.is_running());
    }

    #[test]
    fn phase2_is_only_reachable_from_phase1() {
        for from in [
            PartyStatus::Lobby,
            PartyStatus::RunningPhase1Prep,
            PartyStatus::RunningPhase2,
            PartyStatus::Finished,
        ] {
            let err = from.next(PartyEvent::StartPhase2).unwrap_err();
            assert_eq!(
                err,
                InvalidTransition::Party {
                    from,
                    event: PartyEvent::StartPhase2
                }
            );
        }
    }

    #[test]
    fn finished_is_terminal() {
        for event in [
            PartyEvent::StartPhase1,
            PartyEvent::PrepFinalized,
            PartyEvent::StartPhase2,
            PartyEvent::Phase2Completed,
        ] {
            assert!(PartyStatus::Finished.next(event).is_err());
        }
    }

    #[test]
    fn phase1_round_skips_questioning() {
        let status = RoundStatus::Draft.next(RoundEvent::OpenVoting).unwrap();
        assert_eq!(status, RoundStatus::Voting);
        let status = status.next(RoundEvent::Reveal).unwrap();
        assert_eq!(status.next(RoundEvent::Settle).unwrap(), RoundStatus::Closed);
    }

    #[test]
    fn phase2_round_collects_statements_before_voting() {
        let status = RoundStatus::Draft
            .next(RoundEvent::OpenQuestioning)
            .unwrap();
        assert!(status.is_open());
        assert!(status.next(RoundEvent::Settle).is_err());
        assert_eq!(
            status.next(RoundEvent::StatementsSubmitted).unwrap(),
            RoundStatus::Voting
        );
    }

    #[test]
    fn closed_round_rejects_every_event() {
        for event in [
            RoundEvent::OpenVoting,
            RoundEvent::OpenQuestioning,
            RoundEvent::StatementsSubmitted,
            RoundEvent::Reveal,
            RoundEvent::Settle,
            RoundEvent::Skip,
        ] {
            assert!(RoundStatus::Closed.next(event).is_err());
        }
    }

    #[test]
    fn serializes_with_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&PartyStatus::RunningPhase1Prep).unwrap(),
            "\"RUNNING_PHASE1_PREP\""
        );
        assert_eq!(
            serde_json::to_string(&RoundStatus::Questioning).unwrap(),
            "\"QUESTIONING\""
        );
    }
}
