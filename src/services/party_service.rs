//! Async entry points over the party engine.
//!
//! Every mutation takes the party lock, loads the aggregate from the store,
//! applies the synchronous orchestrator, persists the touched records and
//! broadcasts the refreshed snapshot before the lock is released.

use std::time::SystemTime;

use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        models::{PartyEntity, PlayerEntity, RoundEntity},
        party_store::PartyStore,
    },
    dto::{
        party::{CreatePartyRequest, CreatedParty, JoinPartyRequest, JoinedParty},
        round::{RoundStatementsResponse, VoteResponse},
        snapshot::PartySnapshot,
    },
    error::ServiceError,
    services::{codes, phase_service, round_engine, snapshot_service, sse_events},
    state::{
        SharedState,
        game::{Party, PartySession, StatementDraft},
        state_machine::PartyStatus,
    },
};

/// Create a lobby party with the requested or default parameters.
pub async fn create_party(
    state: &SharedState,
    request: CreatePartyRequest,
) -> Result<CreatedParty, ServiceError> {
    request.validate()?;
    let options = request.options(&state.config().party_defaults());
    let store = state.store().as_ref();

    options.validate()?;
    let party_id = Uuid::new_v4();
    let code = codes::allocate_party_code(store, request.custom_code.as_deref(), party_id).await?;
    let mut session = phase_service::new_party(code, options, SystemTime::now())?;
    session.party.id = party_id;
    persist_session(store, &session).await?;

    let party = &session.party;
    info!(party = %party.code, party_id = %party.id, groups = party.groups.len(), "party created");
    Ok(CreatedParty {
        party_id: party.id,
        code: party.code.clone(),
        join_url: format!("/join/{}", party.code),
    })
}

/// Current snapshot of the party identified by `code`.
pub async fn get_snapshot(state: &SharedState, code: &str) -> Result<PartySnapshot, ServiceError> {
    let party_id = resolve_party_id(state, code).await?;
    let session = load_session(state.store().as_ref(), party_id)
        .await?
        .ok_or_else(party_not_found)?;
    Ok(snapshot_service::build_snapshot(&session))
}

pub async fn join_party(
    state: &SharedState,
    code: &str,
    request: JoinPartyRequest,
) -> Result<JoinedParty, ServiceError> {
    let party_id = resolve_party_id(state, code).await?;
    let placement = request.placement();
    let (outcome, _) = mutate(state, party_id, party_not_found(), move |session, now| {
        phase_service::join(session, &request.nickname, placement, now)
    })
    .await?;

    Ok(JoinedParty {
        player_id: outcome.player_id,
        is_host: outcome.is_host,
        group_id: outcome.group_id,
    })
}

/// Remove a player from a party still in its lobby.
pub async fn remove_player(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
) -> Result<PartySnapshot, ServiceError> {
    let party_id = resolve_party_id(state, code).await?;
    let (_, snapshot) = mutate(state, party_id, party_not_found(), move |session, _| {
        phase_service::remove_player(session, player_id)
    })
    .await?;
    Ok(snapshot)
}

pub async fn start_phase1(
    state: &SharedState,
    code: &str,
    requester_id: Uuid,
) -> Result<PartySnapshot, ServiceError> {
    let party_id = resolve_party_id(state, code).await?;
    let (_, snapshot) = mutate(state, party_id, party_not_found(), move |session, now| {
        phase_service::start_phase1(session, requester_id, now)
    })
    .await?;
    Ok(snapshot)
}

/// Record the phase-1 statements of a player, starting or finalizing the
/// preparation when that submission completes it.
pub async fn submit_phase1_statements(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
    items: Vec<StatementDraft>,
) -> Result<PartySnapshot, ServiceError> {
    let party_id = resolve_party_id(state, code).await?;
    let (_, snapshot) = mutate(state, party_id, party_not_found(), move |session, now| {
        phase_service::submit_phase1_statements(session, player_id, items, now)
    })
    .await?;
    Ok(snapshot)
}

pub async fn start_phase2(
    state: &SharedState,
    code: &str,
    requester_id: Uuid,
) -> Result<PartySnapshot, ServiceError> {
    let party_id = resolve_party_id(state, code).await?;
    let (_, snapshot) = mutate(state, party_id, party_not_found(), move |session, now| {
        phase_service::start_phase2(session, requester_id, now)
    })
    .await?;
    Ok(snapshot)
}

/// Attach the narrator's statements to an open phase-2 round.
pub async fn submit_round_statements(
    state: &SharedState,
    round_id: Uuid,
    narrator_id: Uuid,
    items: Vec<StatementDraft>,
) -> Result<RoundStatementsResponse, ServiceError> {
    let party_id = party_of_round(state, round_id).await?;
    let (round, _) = mutate(
        state,
        party_id,
        orphan_round(round_id, party_id),
        move |session, _| round_engine::submit_round_statements(session, round_id, narrator_id, items),
    )
    .await?;
    Ok(RoundStatementsResponse::from(&round))
}

pub async fn vote(
    state: &SharedState,
    round_id: Uuid,
    player_id: Uuid,
    statement_id: Uuid,
) -> Result<VoteResponse, ServiceError> {
    let party_id = party_of_round(state, round_id).await?;
    let (round_status, _) = mutate(
        state,
        party_id,
        orphan_round(round_id, party_id),
        move |session, now| round_engine::record_vote(session, round_id, player_id, statement_id, now),
    )
    .await?;
    debug!(%round_id, %player_id, status = ?round_status, "vote accepted");
    Ok(VoteResponse {
        accepted: true,
        round_status,
    })
}

/// Close a round on behalf of a party member.
pub async fn close_round(
    state: &SharedState,
    round_id: Uuid,
    requester_id: Uuid,
) -> Result<PartySnapshot, ServiceError> {
    let party_id = party_of_round(state, round_id).await?;
    let (_, snapshot) = mutate(
        state,
        party_id,
        orphan_round(round_id, party_id),
        move |session, now| round_engine::close_round_by_member(session, round_id, requester_id, now),
    )
    .await?;
    Ok(snapshot)
}

/// Run the deadline tick over every active party.
///
/// Changed parties are broadcast under their lock and their snapshots
/// returned. A failing party is logged and skipped so one bad record cannot
/// stall the others.
pub async fn enforce_deadlines(
    state: &SharedState,
    now: SystemTime,
) -> Result<Vec<PartySnapshot>, ServiceError> {
    let party_ids = state.store().list_active_parties().await?;
    let mut changed = Vec::new();

    for party_id in party_ids {
        match enforce_party_deadline(state, party_id, now).await {
            Ok(Some(snapshot)) => changed.push(snapshot),
            Ok(None) => {}
            Err(err) => warn!(%party_id, error = %err, "failed to enforce party deadline"),
        }
    }

    Ok(changed)
}

async fn enforce_party_deadline(
    state: &SharedState,
    party_id: Uuid,
    now: SystemTime,
) -> Result<Option<PartySnapshot>, ServiceError> {
    let store = state.store().as_ref();

    // cheap pre-check on the party record alone
    let Some(entity) = store.find_party(party_id).await? else {
        store.deactivate_party(party_id).await?;
        state.forget_party(party_id);
        return Ok(None);
    };
    if entity.status == PartyStatus::Finished {
        store.deactivate_party(party_id).await?;
        state.forget_party(party_id);
        return Ok(None);
    }
    let due = phase_service::next_deadline(&Party::from(entity))
        .is_some_and(|deadline| deadline <= now);
    if !due {
        return Ok(None);
    }

    let guard = state.lock_party(party_id).await;
    let Some(mut session) = load_session(store, party_id).await? else {
        return Ok(None);
    };
    if !phase_service::enforce_deadlines(&mut session, now)? {
        return Ok(None);
    }
    persist_session(store, &session).await?;

    let finished = session.party.status == PartyStatus::Finished;
    if finished {
        store.deactivate_party(party_id).await?;
    }
    let snapshot = snapshot_service::build_snapshot(&session);
    sse_events::broadcast_party_updated(state, &snapshot);
    drop(guard);

    if finished {
        state.forget_party(party_id);
    }
    info!(party = %snapshot.code, status = ?snapshot.status, "deadline enforced");
    Ok(Some(snapshot))
}

/// Load, mutate and persist a party under its lock, then broadcast the result.
async fn mutate<T, F>(
    state: &SharedState,
    party_id: Uuid,
    missing: ServiceError,
    apply: F,
) -> Result<(T, PartySnapshot), ServiceError>
where
    T: Send,
    F: FnOnce(&mut PartySession, SystemTime) -> Result<T, ServiceError> + Send,
{
    let store = state.store().as_ref();
    let _guard = state.lock_party(party_id).await;

    let Some(mut session) = load_session(store, party_id).await? else {
        return Err(missing);
    };
    let value = apply(&mut session, SystemTime::now())?;
    persist_session(store, &session).await?;

    let snapshot = snapshot_service::build_snapshot(&session);
    sse_events::broadcast_party_updated(state, &snapshot);
    Ok((value, snapshot))
}

pub(crate) async fn resolve_party_id(state: &SharedState, code: &str) -> Result<Uuid, ServiceError> {
    state
        .store()
        .find_party_id_by_code(code.trim().to_uppercase())
        .await?
        .ok_or_else(party_not_found)
}

async fn party_of_round(state: &SharedState, round_id: Uuid) -> Result<Uuid, ServiceError> {
    let round = state
        .store()
        .find_round(round_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("round not found".into()))?;
    Ok(round.party_id)
}

/// Rebuild the aggregate from its records; `None` when the party is absent.
async fn load_session(
    store: &dyn PartyStore,
    party_id: Uuid,
) -> Result<Option<PartySession>, ServiceError> {
    let Some(party) = store.find_party(party_id).await? else {
        return Ok(None);
    };

    let mut players = Vec::with_capacity(party.player_ids.len());
    for player_id in &party.player_ids {
        let player = store.find_player(*player_id).await?.ok_or_else(|| {
            ServiceError::Corrupted(format!(
                "player {player_id} of party {} is missing",
                party.code
            ))
        })?;
        players.push(player);
    }

    let round_ids: Vec<Uuid> = party
        .rounds_by_group
        .iter()
        .flat_map(|group| group.cursor.round_ids.iter().copied())
        .chain(party.phase2_rounds.round_ids.iter().copied())
        .collect();
    let mut rounds = Vec::with_capacity(round_ids.len());
    for round_id in round_ids {
        let round = store.find_round(round_id).await?.ok_or_else(|| {
            ServiceError::Corrupted(format!(
                "round {round_id} of party {} is missing",
                party.code
            ))
        })?;
        if round.party_id != party.id {
            return Err(ServiceError::Corrupted(format!(
                "round {round_id} belongs to party {} instead of {}",
                round.party_id, party.id
            )));
        }
        rounds.push(round);
    }

    Ok(Some(PartySession::from((party, players, rounds))))
}

/// Write back every record the session touched; the party record goes last.
async fn persist_session(store: &dyn PartyStore, session: &PartySession) -> Result<(), ServiceError> {
    for player_id in session.removed_players() {
        store.delete_player(*player_id).await?;
    }
    for player in session.players.values() {
        store.save_player(PlayerEntity::from(player)).await?;
    }
    for round in session.dirty_rounds() {
        let entity = RoundEntity::from(round);
        for statement in &entity.statements {
            store.save_statement(statement.clone()).await?;
        }
        for vote in &entity.votes {
            store.save_vote(vote.clone()).await?;
        }
        store.save_round(entity).await?;
    }
    store.save_party(PartyEntity::from(session)).await?;
    Ok(())
}

fn party_not_found() -> ServiceError {
    ServiceError::NotFound("party not found".into())
}

fn orphan_round(round_id: Uuid, party_id: Uuid) -> ServiceError {
    ServiceError::Corrupted(format!(
        "round {round_id} references missing party {party_id}"
    ))
}
