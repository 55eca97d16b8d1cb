/// Party code generation and allocation.
pub mod codes;
/// Periodic deadline enforcement and housekeeping.
pub mod deadline_supervisor;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Async party operations: lock, load, mutate, persist and broadcast.
pub mod party_service;
/// Lobby, preparation and phase sequencing over a loaded party.
pub mod phase_service;
/// Voting, scoring and closing of a single round.
pub mod round_engine;
/// Reconnect sessions for players.
pub mod session_service;
/// Client snapshot projection.
pub mod snapshot_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
