//! Process-local [`PartyStore`] backed by concurrent maps with lazy TTL expiry.

use std::{
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use futures::future::{self, BoxFuture};
use uuid::Uuid;

use crate::{
    dao::{
        models::{
            PartyEntity, PlayerEntity, RoundEntity, SessionEntity, StatementEntity, VoteEntity,
        },
        party_store::PartyStore,
        storage::StorageResult,
    },
    state::game::PARTY_TTL,
};

struct Expiring<T> {
    expires_at: Instant,
    value: T,
}

impl<T> Expiring<T> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

#[derive(Default)]
struct Tables {
    parties: DashMap<Uuid, Expiring<PartyEntity>>,
    codes: DashMap<String, Expiring<Uuid>>,
    players: DashMap<Uuid, Expiring<PlayerEntity>>,
    rounds: DashMap<Uuid, Expiring<RoundEntity>>,
    statements: DashMap<Uuid, Expiring<StatementEntity>>,
    votes: DashMap<Uuid, Expiring<VoteEntity>>,
    sessions: DashMap<String, Expiring<SessionEntity>>,
    active: DashSet<Uuid>,
}

/// In-memory store used for local play and tests.
#[derive(Clone)]
pub struct MemoryPartyStore {
    tables: Arc<Tables>,
    ttl: Duration,
}

impl Default for MemoryPartyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPartyStore {
    pub fn new() -> Self {
        Self::with_ttl(PARTY_TTL)
    }

    /// Build a store whose records expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tables: Arc::new(Tables::default()),
            ttl,
        }
    }

    fn expiring<V>(&self, value: V) -> Expiring<V> {
        Expiring {
            expires_at: Instant::now() + self.ttl,
            value,
        }
    }

    fn write<K, V>(&self, map: &DashMap<K, Expiring<V>>, key: K, value: V)
    where
        K: Eq + Hash,
    {
        map.insert(key, self.expiring(value));
    }
}

fn read<K, V>(map: &DashMap<K, Expiring<V>>, key: &K) -> Option<V>
where
    K: Eq + Hash,
    V: Clone,
{
    let now = Instant::now();
    let value = map
        .get(key)
        .filter(|entry| !entry.is_expired(now))
        .map(|entry| entry.value.clone());
    if value.is_none() {
        map.remove_if(key, |_, entry| entry.is_expired(now));
    }
    value
}

fn purge<K, V>(map: &DashMap<K, Expiring<V>>, now: Instant) -> usize
where
    K: Eq + Hash,
{
    let before = map.len();
    map.retain(|_, entry| !entry.is_expired(now));
    before - map.len()
}

fn done<T: Send + 'static>(result: StorageResult<T>) -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(future::ready(result))
}

impl PartyStore for MemoryPartyStore {
    fn save_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = &self.tables;
        self.write(&tables.codes, party.code.to_uppercase(), party.id);
        tables.active.insert(party.id);
        self.write(&tables.parties, party.id, party);
        done(Ok(()))
    }

    fn find_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        done(Ok(read(&self.tables.parties, &id)))
    }

    fn find_party_id_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<Uuid>>> {
        done(Ok(read(&self.tables.codes, &code.to_uppercase())))
    }

    fn reserve_code(
        &self,
        code: String,
        party_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let now = Instant::now();
        let reserved = match self.tables.codes.entry(code.to_uppercase()) {
            Entry::Occupied(mut entry) if entry.get().is_expired(now) => {
                entry.insert(self.expiring(party_id));
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(self.expiring(party_id));
                true
            }
        };
        done(Ok(reserved))
    }

    fn list_active_parties(&self) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let tables = &self.tables;
        let ids: Vec<Uuid> = tables.active.iter().map(|id| *id).collect();
        let mut live = Vec::with_capacity(ids.len());
        for id in ids {
            if read(&tables.parties, &id).is_some() {
                live.push(id);
            } else {
                tables.active.remove(&id);
            }
        }
        done(Ok(live))
    }

    fn deactivate_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.tables.active.remove(&id);
        done(Ok(()))
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.write(&self.tables.players, player.id, player);
        done(Ok(()))
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        done(Ok(read(&self.tables.players, &id)))
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.tables.players.remove(&id);
        done(Ok(()))
    }

    fn save_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.write(&self.tables.rounds, round.id, round);
        done(Ok(()))
    }

    fn find_round(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        done(Ok(read(&self.tables.rounds, &id)))
    }

    fn save_statement(
        &self,
        statement: StatementEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.write(&self.tables.statements, statement.id, statement);
        done(Ok(()))
    }

    fn find_statement(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StatementEntity>>> {
        done(Ok(read(&self.tables.statements, &id)))
    }

    fn save_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.write(&self.tables.votes, vote.id, vote);
        done(Ok(()))
    }

    fn find_vote(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<VoteEntity>>> {
        done(Ok(read(&self.tables.votes, &id)))
    }

    fn save_session(
        &self,
        token: String,
        session: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.write(&self.tables.sessions, token, session);
        done(Ok(()))
    }

    fn find_session(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        done(Ok(read(&self.tables.sessions, &token)))
    }

    fn delete_session(&self, token: String) -> BoxFuture<'static, StorageResult<()>> {
        self.tables.sessions.remove(&token);
        done(Ok(()))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        done(Ok(()))
    }

    fn purge_expired(&self) -> BoxFuture<'static, StorageResult<usize>> {
        let tables = &self.tables;
        let now = Instant::now();
        let removed = purge(&tables.parties, now)
            + purge(&tables.codes, now)
            + purge(&tables.players, now)
            + purge(&tables.rounds, now)
            + purge(&tables.statements, now)
            + purge(&tables.votes, now)
            + purge(&tables.sessions, now);
        tables
            .active
            .retain(|id| tables.parties.contains_key(id));
        done(Ok(removed))
    }
}
