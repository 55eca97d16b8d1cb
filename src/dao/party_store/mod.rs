pub mod memory;
#[cfg(feature = "upstash-store")]
pub mod upstash;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{PartyEntity, PlayerEntity, RoundEntity, SessionEntity, StatementEntity, VoteEntity},
    storage::StorageResult,
};

/// Abstraction over the key-value persistence of parties and their records.
///
/// Every write refreshes the record's 24h TTL; expired records read as absent.
pub trait PartyStore: Send + Sync {
    /// Store the party and index it by code and in the active set.
    fn save_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>>;
    fn find_party_id_by_code(&self, code: String)
    -> BoxFuture<'static, StorageResult<Option<Uuid>>>;
    /// Atomically claim `code` for `party_id`; `false` when the code is already taken.
    fn reserve_code(&self, code: String, party_id: Uuid)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// Ids of parties that may still have a running phase.
    fn list_active_parties(&self) -> BoxFuture<'static, StorageResult<Vec<Uuid>>>;
    /// Remove a party from the active set; its records stay until they expire.
    fn deactivate_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn save_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_round(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;
    fn save_statement(&self, statement: StatementEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    fn find_statement(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StatementEntity>>>;
    fn save_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_vote(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<VoteEntity>>>;
    fn save_session(
        &self,
        token: String,
        session: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_session(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    fn delete_session(&self, token: String) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Drop expired records; returns how many were removed.
    fn purge_expired(&self) -> BoxFuture<'static, StorageResult<usize>>;
}
