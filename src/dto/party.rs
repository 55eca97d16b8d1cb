use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    config::PartyDefaults,
    dto::{snapshot::PartySnapshot, validation},
    services::phase_service::{GroupPlacement, PartyOptions},
    state::game::StatementDraft,
};

/// Parameters of a new party; omitted fields use the configured defaults.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyRequest {
    /// Number of groups created up front (0-20).
    pub groups: Option<u32>,
    /// Seconds per round (30-300).
    pub round_timer_sec: Option<u32>,
    /// Seconds allowed for each playing phase (60-3600).
    pub phase_time_limit_sec: Option<u32>,
    /// Seconds allowed to submit phase-1 statements (30-600).
    pub statement_time_limit_sec: Option<u32>,
    /// Caller-chosen code, 3-9 alphanumeric characters.
    pub custom_code: Option<String>,
}

impl CreatePartyRequest {
    /// Fill missing fields from `defaults`.
    pub fn options(&self, defaults: &PartyDefaults) -> PartyOptions {
        PartyOptions {
            groups: self.groups.unwrap_or(defaults.groups),
            round_timer_sec: self.round_timer_sec.unwrap_or(defaults.round_timer_sec),
            phase_time_limit_sec: self
                .phase_time_limit_sec
                .unwrap_or(defaults.phase_time_limit_sec),
            statement_time_limit_sec: self
                .statement_time_limit_sec
                .unwrap_or(defaults.statement_time_limit_sec),
        }
    }
}

impl Validate for CreatePartyRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(groups) = self.groups {
            if let Err(e) = validation::validate_group_count(groups) {
                errors.add("groups", e);
            }
        }
        if let Some(seconds) = self.round_timer_sec {
            if let Err(e) = validation::validate_round_timer(seconds) {
                errors.add("roundTimerSec", e);
            }
        }
        if let Some(seconds) = self.phase_time_limit_sec {
            if let Err(e) = validation::validate_phase_time_limit(seconds) {
                errors.add("phaseTimeLimitSec", e);
            }
        }
        if let Some(seconds) = self.statement_time_limit_sec {
            if let Err(e) = validation::validate_statement_time_limit(seconds) {
                errors.add("statementTimeLimitSec", e);
            }
        }
        if let Some(ref code) = self.custom_code {
            if let Err(e) = validation::normalize_custom_code(code) {
                errors.add("customCode", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Returned once a party exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedParty {
    pub party_id: Uuid,
    pub code: String,
    /// Relative link players follow to join.
    pub join_url: String,
}

/// Join request; placement precedence is `createGroup`, `groupId`, `groupIndex`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinPartyRequest {
    pub nickname: String,
    pub group_id: Option<Uuid>,
    pub group_index: Option<u32>,
    #[serde(default)]
    pub create_group: bool,
}

impl JoinPartyRequest {
    pub fn placement(&self) -> GroupPlacement {
        if self.create_group {
            GroupPlacement::Create
        } else if let Some(id) = self.group_id {
            GroupPlacement::Id(id)
        } else if let Some(index) = self.group_index {
            GroupPlacement::Index(index)
        } else {
            GroupPlacement::Auto
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinedParty {
    pub player_id: Uuid,
    pub is_host: bool,
    pub group_id: Uuid,
}

/// Body of actions that only need the acting player.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
    /// Used when the `x-player-id` header is absent.
    pub player_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementInput {
    pub text: String,
    #[serde(default)]
    pub is_lie: bool,
}

impl From<StatementInput> for StatementDraft {
    fn from(value: StatementInput) -> Self {
        Self {
            text: value.text,
            is_lie: value.is_lie,
        }
    }
}

/// Three statements, exactly one of them a lie.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitStatementsRequest {
    pub player_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<StatementInput>,
}

impl SubmitStatementsRequest {
    pub fn drafts(self) -> Vec<StatementDraft> {
        self.items.into_iter().map(Into::into).collect()
    }
}

/// Acknowledgement carrying the refreshed party.
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotAck {
    pub ok: bool,
    pub snapshot: PartySnapshot,
}

impl SnapshotAck {
    pub fn new(snapshot: PartySnapshot) -> Self {
        Self { ok: true, snapshot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_uses_defaults_for_missing_fields() {
        let request: CreatePartyRequest =
            serde_json::from_str(r#"{"groups": 2, "roundTimerSec": 45}"#).unwrap();
        let options = request.options(&PartyDefaults::default());
        assert_eq!(options.groups, 2);
        assert_eq!(options.round_timer_sec, 45);
        assert_eq!(options.phase_time_limit_sec, 600);
        assert_eq!(options.statement_time_limit_sec, 120);
    }

    #[test]
    fn create_request_reports_every_bad_field() {
        let request = CreatePartyRequest {
            groups: Some(21),
            statement_time_limit_sec: Some(5),
            custom_code: Some("!".into()),
            ..Default::default()
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("groups"));
        assert!(fields.contains_key("statementTimeLimitSec"));
        assert!(fields.contains_key("customCode"));
        assert!(!fields.contains_key("roundTimerSec"));
    }

    #[test]
    fn join_placement_precedence() {
        let id = Uuid::new_v4();
        let request = JoinPartyRequest {
            nickname: "Ann".into(),
            group_id: Some(id),
            group_index: Some(2),
            create_group: true,
        };
        assert_eq!(request.placement(), GroupPlacement::Create);

        let request = JoinPartyRequest {
            create_group: false,
            ..request
        };
        assert_eq!(request.placement(), GroupPlacement::Id(id));

        let request = JoinPartyRequest {
            nickname: "Ann".into(),
            group_index: Some(2),
            ..Default::default()
        };
        assert_eq!(request.placement(), GroupPlacement::Index(2));
    }
}
