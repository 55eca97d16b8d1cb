use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;
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

use super::{
    config::UpstashConfig,
    error::{UpstashDaoError, UpstashResult},
};

const ACTIVE_PARTIES_KEY: &str = "parties:active";

fn party_key(id: Uuid) -> String {
    format!("party:{id}")
}

fn code_key(code: &str) -> String {
    format!("party:code:{}", code.to_uppercase())
}

fn player_key(id: Uuid) -> String {
    format!("player:{id}")
}

fn round_key(id: Uuid) -> String {
    format!("round:{id}")
}

fn statement_key(id: Uuid) -> String {
    format!("statement:{id}")
}

fn vote_key(id: Uuid) -> String {
    format!("vote:{id}")
}

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

fn encode<T>(key: &str, value: &T) -> UpstashResult<String>
where
    T: ?Sized + Serialize,
{
    serde_json::to_string(value).map_err(|source| UpstashDaoError::Codec {
        key: key.to_string(),
        source,
    })
}

/// Redis answers `OK` when a `SET .. NX` wrote and nil when the key existed.
fn set_nx_applied(reply: &Value) -> UpstashResult<bool> {
    match reply {
        Value::String(_) => Ok(true),
        Value::Null => Ok(false),
        _ => Err(UpstashDaoError::UnexpectedResult { command: "SET" }),
    }
}

/// Body returned by the Upstash REST API for a single command.
#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

/// [`PartyStore`] talking to Upstash Redis through its REST API.
#[derive(Clone)]
pub struct UpstashPartyStore {
    client: Client,
    base_url: Arc<str>,
    token: Arc<str>,
    ttl_secs: u64,
}

impl UpstashPartyStore {
    /// Build the client and make sure the endpoint answers.
    pub async fn connect(config: UpstashConfig) -> UpstashResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| UpstashDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            token: Arc::<str>::from(config.token),
            ttl_secs: PARTY_TTL.as_secs(),
        };

        store.command("PING", Vec::new()).await?;
        Ok(store)
    }

    async fn command(&self, name: &'static str, args: Vec<String>) -> UpstashResult<Value> {
        let mut body = Vec::with_capacity(args.len() + 1);
        body.push(name.to_string());
        body.extend(args);

        let response = self
            .client
            .post(self.base_url.as_ref())
            .bearer_auth(self.token.as_ref())
            .json(&body)
            .send()
            .await
            .map_err(|source| UpstashDaoError::RequestSend {
                command: name,
                source,
            })?;

        let status = response.status();
        if !status.is_success() && !status.is_client_error() {
            return Err(UpstashDaoError::RequestStatus {
                command: name,
                status,
            });
        }

        let payload = response
            .json::<CommandResponse>()
            .await
            .map_err(|source| UpstashDaoError::DecodeResponse {
                command: name,
                source,
            })?;

        match payload.error {
            Some(message) => Err(UpstashDaoError::Command {
                command: name,
                message,
            }),
            None if status.is_success() => Ok(payload.result),
            None => Err(UpstashDaoError::RequestStatus {
                command: name,
                status,
            }),
        }
    }

    async fn set_json<T>(&self, key: String, value: &T) -> UpstashResult<()>
    where
        T: ?Sized + Serialize,
    {
        let encoded = encode(&key, value)?;
        self.command(
            "SET",
            vec![key, encoded, "EX".into(), self.ttl_secs.to_string()],
        )
        .await?;
        Ok(())
    }

    /// `SET .. NX EX`: write only when the key is absent.
    async fn set_json_if_absent<T>(&self, key: String, value: &T) -> UpstashResult<bool>
    where
        T: ?Sized + Serialize,
    {
        let encoded = encode(&key, value)?;
        let reply = self
            .command(
                "SET",
                vec![
                    key,
                    encoded,
                    "NX".into(),
                    "EX".into(),
                    self.ttl_secs.to_string(),
                ],
            )
            .await?;
        set_nx_applied(&reply)
    }

    async fn get_json<T>(&self, key: String) -> UpstashResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.command("GET", vec![key.clone()]).await? {
            Value::Null => Ok(None),
            Value::String(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| UpstashDaoError::Codec { key, source }),
            _ => Err(UpstashDaoError::UnexpectedResult { command: "GET" }),
        }
    }

    async fn delete(&self, key: String) -> UpstashResult<()> {
        self.command("DEL", vec![key]).await?;
        Ok(())
    }

    async fn save_party_records(&self, party: PartyEntity) -> UpstashResult<()> {
        self.set_json(code_key(&party.code), &party.id).await?;
        self.command(
            "SADD",
            vec![ACTIVE_PARTIES_KEY.into(), party.id.to_string()],
        )
        .await?;
        self.set_json(party_key(party.id), &party).await
    }

    async fn active_party_ids(&self) -> UpstashResult<Vec<Uuid>> {
        let Value::Array(members) = self
            .command("SMEMBERS", vec![ACTIVE_PARTIES_KEY.into()])
            .await?
        else {
            return Err(UpstashDaoError::UnexpectedResult {
                command: "SMEMBERS",
            });
        };

        Ok(members
            .into_iter()
            .filter_map(|member| match member {
                Value::String(raw) => match Uuid::parse_str(&raw) {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!(member = %raw, "ignoring malformed active party id");
                        None
                    }
                },
                _ => None,
            })
            .collect())
    }
}

impl PartyStore for UpstashPartyStore {
    fn save_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_party_records(party).await.map_err(Into::into) })
    }

    fn find_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.get_json(party_key(id)).await.map_err(Into::into) })
    }

    fn find_party_id_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { store.get_json(code_key(&code)).await.map_err(Into::into) })
    }

    fn reserve_code(
        &self,
        code: String,
        party_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_json_if_absent(code_key(&code), &party_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_active_parties(&self) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { store.active_party_ids().await.map_err(Into::into) })
    }

    fn deactivate_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .command("SREM", vec![ACTIVE_PARTIES_KEY.into(), id.to_string()])
                .await
                .map(|_| ())
                .map_err(Into::into)
        })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_json(player_key(player.id), &player)
                .await
                .map_err(Into::into)
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.get_json(player_key(id)).await.map_err(Into::into) })
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete(player_key(id)).await.map_err(Into::into) })
    }

    fn save_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_json(round_key(round.id), &round)
                .await
                .map_err(Into::into)
        })
    }

    fn find_round(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.get_json(round_key(id)).await.map_err(Into::into) })
    }

    fn save_statement(
        &self,
        statement: StatementEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_json(statement_key(statement.id), &statement)
                .await
                .map_err(Into::into)
        })
    }

    fn find_statement(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StatementEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.get_json(statement_key(id)).await.map_err(Into::into) })
    }

    fn save_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_json(vote_key(vote.id), &vote)
                .await
                .map_err(Into::into)
        })
    }

    fn find_vote(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.get_json(vote_key(id)).await.map_err(Into::into) })
    }

    fn save_session(
        &self,
        token: String,
        session: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_json(session_key(&token), &session)
                .await
                .map_err(Into::into)
        })
    }

    fn find_session(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .get_json(session_key(&token))
                .await
                .map_err(Into::into)
        })
    }

    fn delete_session(&self, token: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete(session_key(&token)).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .command("PING", Vec::new())
                .await
                .map(|_| ())
                .map_err(Into::into)
        })
    }

    fn purge_expired(&self) -> BoxFuture<'static, StorageResult<usize>> {
        // Redis expires keys on its own.
        Box::pin(async { Ok(0) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_keyed_uppercase() {
        assert_eq!(code_key("abc12"), "party:code:ABC12");
    }

    #[test]
    fn set_nx_reply_tells_whether_the_key_was_written() {
        assert!(set_nx_applied(&Value::String("OK".into())).unwrap());
        assert!(!set_nx_applied(&Value::Null).unwrap());
        assert!(set_nx_applied(&Value::Bool(true)).is_err());
    }

    #[test]
    fn command_response_accepts_missing_result() {
        let payload: CommandResponse =
            serde_json::from_str(r#"{"error": "WRONGTYPE"}"#).unwrap();
        assert_eq!(payload.result, Value::Null);
        assert_eq!(payload.error.as_deref(), Some("WRONGTYPE"));
    }
}
