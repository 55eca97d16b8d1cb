use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use two_truths_back::{
    config::AppConfig,
    dao::party_store::memory::MemoryPartyStore,
    dto::{
        party::{CreatePartyRequest, JoinPartyRequest},
        session::CreateSessionRequest,
        snapshot::{PartySnapshot, RoundView},
    },
    error::ServiceError,
    services::{deadline_supervisor, party_service, session_service},
    state::{
        AppState, SharedState,
        game::{CompletionReason, GroupStatus, StatementDraft},
        state_machine::{PartyStatus, RoundStatus},
    },
};
use futures::future::join_all;
use uuid::Uuid;

fn fresh_state() -> SharedState {
    AppState::new(Arc::new(MemoryPartyStore::new()), AppConfig::default())
}

async fn create_party(state: &SharedState, groups: u32) -> String {
    let request = CreatePartyRequest {
        groups: Some(groups),
        ..Default::default()
    };
    party_service::create_party(state, request)
        .await
        .unwrap()
        .code
}

async fn join(state: &SharedState, code: &str, nickname: &str, group_index: u32) -> Uuid {
    let request = JoinPartyRequest {
        nickname: nickname.into(),
        group_index: Some(group_index),
        ..Default::default()
    };
    party_service::join_party(state, code, request)
        .await
        .unwrap()
        .player_id
}

fn statements(tag: &str) -> Vec<StatementDraft> {
    vec![
        StatementDraft {
            text: format!("{tag} once met a bear"),
            is_lie: false,
        },
        StatementDraft {
            text: format!("{tag} lie"),
            is_lie: true,
        },
        StatementDraft {
            text: format!("{tag} speaks four languages"),
            is_lie: false,
        },
    ]
}

fn current_round(snapshot: &PartySnapshot, group: usize) -> RoundView {
    snapshot.groups[group]
        .current_round
        .clone()
        .expect("group has a current round")
}

/// Statement ids of a voting round: (lie, some truth).
fn lie_and_truth(round: &RoundView) -> (Uuid, Uuid) {
    let lie = round
        .statements
        .iter()
        .find(|statement| statement.text.ends_with(" lie"))
        .expect("lie is listed")
        .id;
    let truth = round
        .statements
        .iter()
        .find(|statement| statement.id != lie)
        .expect("truth is listed")
        .id;
    (lie, truth)
}

fn phase1_score(snapshot: &PartySnapshot, player_id: Uuid) -> u32 {
    snapshot
        .leaderboard
        .iter()
        .find(|entry| entry.player_id == player_id)
        .map(|entry| entry.phase1)
        .unwrap_or_default()
}

/// Start phase 1 and let every player submit, in `players` order.
async fn run_preparation(state: &SharedState, code: &str, players: &[(Uuid, &str)]) -> PartySnapshot {
    party_service::start_phase1(state, code, players[0].0)
        .await
        .unwrap();
    let mut snapshot = None;
    for (player_id, tag) in players {
        snapshot = Some(
            party_service::submit_phase1_statements(state, code, *player_id, statements(tag))
                .await
                .unwrap(),
        );
    }
    snapshot.unwrap()
}

#[tokio::test]
async fn first_round_scores_by_arrival_order() {
    let state = fresh_state();
    let code = create_party(&state, 1).await;
    let a = join(&state, &code, "A", 1).await;
    let b = join(&state, &code, "B", 1).await;
    let c = join(&state, &code, "C", 1).await;
    let d = join(&state, &code, "D", 1).await;

    let snapshot = run_preparation(&state, &code, &[(a, "A"), (b, "B"), (c, "C"), (d, "D")]).await;
    assert_eq!(snapshot.status, PartyStatus::RunningPhase1);

    let round = current_round(&snapshot, 0);
    assert_eq!(round.narrator_id, a);
    assert_eq!(round.status, RoundStatus::Voting);
    assert!(round.statements.iter().all(|statement| statement.is_lie.is_none()));
    let (lie, truth) = lie_and_truth(&round);

    let first = party_service::vote(&state, round.id, b, lie).await.unwrap();
    assert_eq!(first.round_status, RoundStatus::Voting);
    party_service::vote(&state, round.id, c, lie).await.unwrap();
    let last = party_service::vote(&state, round.id, d, truth).await.unwrap();
    assert_eq!(last.round_status, RoundStatus::Closed);

    let snapshot = party_service::get_snapshot(&state, &code).await.unwrap();
    assert_eq!(phase1_score(&snapshot, b), 3);
    assert_eq!(phase1_score(&snapshot, c), 2);
    assert_eq!(phase1_score(&snapshot, d), 0);

    let reveal = snapshot.last_reveal.as_ref().expect("closed round is revealed");
    assert_eq!(reveal.round_id, round.id);
    assert_eq!(reveal.lie_text.as_deref(), Some("A lie"));

    let next = current_round(&snapshot, 0);
    assert_eq!(next.narrator_id, b);
    assert_eq!(next.status, RoundStatus::Voting);
}

#[tokio::test]
async fn duplicate_and_narrator_votes_are_rejected() {
    let state = fresh_state();
    let code = create_party(&state, 1).await;
    let a = join(&state, &code, "A", 1).await;
    let b = join(&state, &code, "B", 1).await;
    let c = join(&state, &code, "C", 1).await;

    let snapshot = run_preparation(&state, &code, &[(a, "A"), (b, "B"), (c, "C")]).await;
    let round = current_round(&snapshot, 0);
    let (lie, truth) = lie_and_truth(&round);

    let err = party_service::vote(&state, round.id, a, lie).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));

    party_service::vote(&state, round.id, b, truth).await.unwrap();
    let err = party_service::vote(&state, round.id, b, lie).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(ref message) if message == "already voted"));

    let err = party_service::vote(&state, Uuid::new_v4(), b, lie).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn manual_close_is_idempotent() {
    let state = fresh_state();
    let code = create_party(&state, 1).await;
    let a = join(&state, &code, "A", 1).await;
    let b = join(&state, &code, "B", 1).await;
    let c = join(&state, &code, "C", 1).await;

    let snapshot = run_preparation(&state, &code, &[(a, "A"), (b, "B"), (c, "C")]).await;
    let round = current_round(&snapshot, 0);
    let (lie, _) = lie_and_truth(&round);
    party_service::vote(&state, round.id, b, lie).await.unwrap();

    let closed = party_service::close_round(&state, round.id, c).await.unwrap();
    assert_eq!(phase1_score(&closed, b), 2);

    let err = party_service::close_round(&state, round.id, c).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    let again = party_service::get_snapshot(&state, &code).await.unwrap();
    assert_eq!(again.leaderboard, closed.leaderboard);
    assert_eq!(again.last_reveal, closed.last_reveal);
}

#[tokio::test]
async fn phase2_picks_least_leaking_narrators_and_finishes() {
    let state = fresh_state();
    let code = create_party(&state, 2).await;
    let mut groups = Vec::new();
    for index in 1..=2u32 {
        let mut members = Vec::new();
        for n in 1..=3 {
            let tag = format!("g{index}p{n}");
            members.push((join(&state, &code, &tag, index).await, tag));
        }
        groups.push(members);
    }
    let order: Vec<(Uuid, &str)> = groups
        .iter()
        .flatten()
        .map(|(id, tag)| (*id, tag.as_str()))
        .collect();
    let mut snapshot = run_preparation(&state, &code, &order).await;

    // first narrator of each group is found out, the others fool everyone
    while !snapshot.groups.iter().all(|group| group.status == GroupStatus::Done) {
        for group in 0..2 {
            let Some(round) = snapshot.groups[group].current_round.clone() else {
                continue;
            };
            if round.status != RoundStatus::Voting {
                continue;
            }
            let (lie, truth) = lie_and_truth(&round);
            let pick = if round.index == 1 { lie } else { truth };
            for (voter, _) in &groups[group] {
                if *voter != round.narrator_id {
                    party_service::vote(&state, round.id, *voter, pick).await.unwrap();
                }
            }
        }
        snapshot = party_service::get_snapshot(&state, &code).await.unwrap();
    }
    assert_eq!(
        snapshot.phase_timing.phase1.completion_reason,
        Some(CompletionReason::AllPlayed)
    );
    assert!(snapshot.phase2_eligibility.allowed);

    let host = groups[0][0].0;
    let mut snapshot = party_service::start_phase2(&state, &code, host).await.unwrap();
    assert_eq!(snapshot.status, PartyStatus::RunningPhase2);

    let first = snapshot.phase2_current_round.clone().unwrap();
    assert_eq!(first.status, RoundStatus::Questioning);
    assert_eq!(first.narrator_id, groups[0][1].0);
    assert!(first.statements.is_empty());

    let mut narrators = Vec::new();
    while let Some(round) = snapshot.phase2_current_round.clone() {
        narrators.push(round.narrator_id);
        let response = party_service::submit_round_statements(
            &state,
            round.id,
            round.narrator_id,
            statements("phase two"),
        )
        .await
        .unwrap();
        assert_eq!(response.status, RoundStatus::Voting);

        let narrator_group = groups
            .iter()
            .position(|members| members.iter().any(|(id, _)| *id == round.narrator_id))
            .unwrap();
        let voters = &groups[1 - narrator_group];
        let lie = response
            .statements
            .iter()
            .find(|statement| statement.text.ends_with(" lie"))
            .unwrap()
            .id;
        for (voter, _) in voters {
            party_service::vote(&state, round.id, *voter, lie).await.unwrap();
        }
        snapshot = party_service::get_snapshot(&state, &code).await.unwrap();
    }

    let expected: Vec<Uuid> = vec![groups[0][1].0, groups[0][2].0, groups[1][1].0, groups[1][2].0];
    assert_eq!(narrators, expected);
    assert_eq!(snapshot.status, PartyStatus::Finished);
    assert_eq!(
        snapshot.phase_timing.phase2.completion_reason,
        Some(CompletionReason::AllPlayed)
    );
    let results = snapshot.phase_results.phase2.expect("phase 2 results");
    assert!(!results.final_winners.is_empty());
    let top = &snapshot.leaderboard[0];
    assert!(top.phase2 >= 6);
}

#[tokio::test]
async fn single_group_party_cannot_start_phase2() {
    let state = fresh_state();
    let code = create_party(&state, 1).await;
    let a = join(&state, &code, "A", 1).await;
    join(&state, &code, "B", 1).await;

    let snapshot = party_service::get_snapshot(&state, &code).await.unwrap();
    assert!(!snapshot.phase2_eligibility.allowed);
    assert_eq!(
        snapshot.phase2_eligibility.reason.as_deref(),
        Some("single_group_no_phase2")
    );

    let err = party_service::start_phase2(&state, &code, a).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Conflict(ref message) if message == "phase 2 requires at least 2 groups"
    ));
}

#[tokio::test]
async fn removing_the_host_promotes_next_joiner() {
    let state = fresh_state();
    let code = create_party(&state, 1).await;
    let a = join(&state, &code, "A", 1).await;
    let b = join(&state, &code, "B", 1).await;
    let c = join(&state, &code, "C", 1).await;

    let snapshot = party_service::remove_player(&state, &code, a).await.unwrap();
    assert_eq!(snapshot.host_player_id, Some(b));
    assert!(snapshot.players.iter().all(|player| player.id != a));
    assert!(snapshot
        .players
        .iter()
        .any(|player| player.id == b && player.is_host));

    party_service::start_phase1(&state, &code, b).await.unwrap();
    let err = party_service::remove_player(&state, &code, c).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn phase1_deadline_forces_completion() {
    let state = fresh_state();
    let code = create_party(&state, 1).await;
    let a = join(&state, &code, "A", 1).await;
    let b = join(&state, &code, "B", 1).await;
    let c = join(&state, &code, "C", 1).await;
    let snapshot = run_preparation(&state, &code, &[(a, "A"), (b, "B"), (c, "C")]).await;
    let open_round = current_round(&snapshot, 0);

    let early = party_service::enforce_deadlines(&state, SystemTime::now())
        .await
        .unwrap();
    assert!(early.is_empty());

    let late = SystemTime::now() + Duration::from_secs(601);
    let changed = party_service::enforce_deadlines(&state, late).await.unwrap();
    assert_eq!(changed.len(), 1);
    let forced = &changed[0];
    assert_eq!(
        forced.phase_timing.phase1.completion_reason,
        Some(CompletionReason::TimeLimit)
    );
    assert!(forced.groups.iter().all(|group| group.status == GroupStatus::Done));
    assert_eq!(
        forced.last_reveal.as_ref().map(|reveal| reveal.round_id),
        Some(open_round.id)
    );

    let again = party_service::enforce_deadlines(&state, late).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn mutations_are_broadcast_to_party_subscribers() {
    let state = fresh_state();
    let code = create_party(&state, 1).await;
    let mut receiver = state.sse().subscribe(&code);

    join(&state, &code, "A", 1).await;

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.event.as_deref(), Some("party.updated"));
    let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
    assert_eq!(payload["snapshot"]["code"], code.as_str());
    assert_eq!(payload["snapshot"]["players"][0]["nickname"], "A");
}

#[tokio::test]
async fn sessions_round_trip_for_members_only() {
    let state = fresh_state();
    let code = create_party(&state, 1).await;
    let a = join(&state, &code, "A", 1).await;

    let token = session_service::create_session(
        &state,
        CreateSessionRequest {
            player_id: a,
            code: code.to_lowercase(),
        },
    )
    .await
    .unwrap()
    .token;
    let session = session_service::get_session(&state, &token).await.unwrap();
    assert_eq!(session.player_id, a);
    assert_eq!(session.code, code);

    session_service::delete_session(&state, &token).await.unwrap();
    let err = session_service::get_session(&state, &token).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = session_service::create_session(
        &state,
        CreateSessionRequest {
            player_id: Uuid::new_v4(),
            code,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn taken_custom_code_is_a_conflict() {
    let state = fresh_state();
    let request = || CreatePartyRequest {
        custom_code: Some("party7".into()),
        ..Default::default()
    };

    let created = party_service::create_party(&state, request()).await.unwrap();
    assert_eq!(created.code, "PARTY7");
    let err = party_service::create_party(&state, request()).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Conflict(ref message) if message == "Party code already exists"
    ));

    let snapshot = party_service::get_snapshot(&state, "PARTY7").await.unwrap();
    assert_eq!(snapshot.id, created.party_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_share_no_code() {
    let state = fresh_state();
    let handles = (0..8).map(|_| {
        let state = state.clone();
        tokio::spawn(async move {
            let request = CreatePartyRequest {
                custom_code: Some("SAME1".into()),
                ..Default::default()
            };
            party_service::create_party(&state, request).await
        })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<Uuid> = results
        .iter()
        .filter_map(|result| result.as_ref().ok().map(|created| created.party_id))
        .collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, ServiceError::Conflict(_))));

    let snapshot = party_service::get_snapshot(&state, "SAME1").await.unwrap();
    assert_eq!(snapshot.id, winners[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_close_the_round_once() {
    let state = fresh_state();
    let code = create_party(&state, 1).await;
    let mut players = Vec::new();
    for tag in ["A", "B", "C", "D", "E"] {
        players.push((join(&state, &code, tag, 1).await, tag));
    }
    let snapshot = run_preparation(&state, &code, &players).await;
    let round = current_round(&snapshot, 0);
    let (lie, _) = lie_and_truth(&round);

    let handles = players[1..].iter().map(|(voter, _)| {
        let state = state.clone();
        let (voter, round_id, lie) = (*voter, round.id, lie);
        tokio::spawn(async move { party_service::vote(&state, round_id, voter, lie).await })
    });
    let statuses: Vec<RoundStatus> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().round_status)
        .collect();
    assert_eq!(
        statuses
            .iter()
            .filter(|status| **status == RoundStatus::Closed)
            .count(),
        1
    );

    let party = state.store().find_party(snapshot.id).await.unwrap().unwrap();
    assert_eq!(party.round_history.len(), 1);
    assert_eq!(party.round_history[0].round_id, round.id);

    // four eligible voters, all right: 4 + 3 + 2 + 1
    let snapshot = party_service::get_snapshot(&state, &code).await.unwrap();
    let total: u32 = players
        .iter()
        .map(|(player_id, _)| phase1_score(&snapshot, *player_id))
        .sum();
    assert_eq!(total, 10);
    assert_eq!(current_round(&snapshot, 0).narrator_id, players[1].0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_final_submissions_finalize_once() {
    let state = fresh_state();
    let code = create_party(&state, 2).await;
    let mut players = Vec::new();
    for (index, tag) in [(1, "A"), (1, "B"), (1, "C"), (2, "D"), (2, "E"), (2, "F")] {
        players.push((join(&state, &code, tag, index).await, tag));
    }
    party_service::start_phase1(&state, &code, players[0].0)
        .await
        .unwrap();

    let handles = players.iter().map(|(player_id, tag)| {
        let state = state.clone();
        let code = code.clone();
        let (player_id, items) = (*player_id, statements(tag));
        tokio::spawn(async move {
            party_service::submit_phase1_statements(&state, &code, player_id, items).await
        })
    });
    for joined in join_all(handles).await {
        joined.unwrap().unwrap();
    }

    let snapshot = party_service::get_snapshot(&state, &code).await.unwrap();
    assert_eq!(snapshot.status, PartyStatus::RunningPhase1);
    assert_eq!(
        snapshot.phase_timing.phase1_prep.timing.completion_reason,
        Some(CompletionReason::AllSubmitted)
    );
    for group in &snapshot.groups {
        assert_eq!(group.current_round.as_ref().map(|round| round.index), Some(1));
    }

    let party = state.store().find_party(snapshot.id).await.unwrap().unwrap();
    assert_eq!(party.rounds_by_group.len(), 2);
    for rounds in &party.rounds_by_group {
        assert_eq!(rounds.cursor.round_ids.len(), 3);
    }
}

#[tokio::test]
async fn expired_parties_release_their_locks() {
    let state = AppState::new(
        Arc::new(MemoryPartyStore::with_ttl(Duration::from_millis(200))),
        AppConfig::default(),
    );
    for n in 0..10 {
        let code = create_party(&state, 1).await;
        join(&state, &code, &format!("P{n}"), 1).await;
    }
    assert_eq!(state.tracked_parties(), 10);

    tokio::time::sleep(Duration::from_millis(300)).await;
    deadline_supervisor::tick(&state).await;

    assert!(state.store().list_active_parties().await.unwrap().is_empty());
    assert_eq!(state.tracked_parties(), 0);
}
