use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// Header naming the player acting on a request.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Player id taken from the `x-player-id` header, when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerHeader(pub Option<Uuid>);

impl PlayerHeader {
    /// The header wins over `fallback`, usually the `playerId` of the body.
    pub fn actor(self, fallback: Option<Uuid>) -> Result<Uuid, AppError> {
        self.0
            .or(fallback)
            .ok_or_else(|| AppError::Forbidden("missing x-player-id".into()))
    }
}

impl<S> FromRequestParts<S> for PlayerHeader
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(PLAYER_ID_HEADER) else {
            return Ok(Self(None));
        };
        let id = value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or_else(|| AppError::BadRequest("invalid x-player-id header".into()))?;
        Ok(Self(Some(id)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<PlayerHeader, AppError> {
        let (mut parts, _) = request.into_parts();
        PlayerHeader::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn header_takes_precedence_over_body() {
        let header_id = Uuid::new_v4();
        let request = Request::builder()
            .header(PLAYER_ID_HEADER, header_id.to_string())
            .body(())
            .unwrap();
        let header = extract(request).await.unwrap();
        assert_eq!(header.actor(Some(Uuid::new_v4())).unwrap(), header_id);
    }

    #[tokio::test]
    async fn missing_header_falls_back_to_body() {
        let body_id = Uuid::new_v4();
        let header = extract(Request::new(())).await.unwrap();
        assert_eq!(header.actor(Some(body_id)).unwrap(), body_id);
        assert!(matches!(header.actor(None), Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn malformed_header_is_rejected() {
        let request = Request::builder()
            .header(PLAYER_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(extract(request).await, Err(AppError::BadRequest(_))));
    }
}
