//! NATS subjects and queue groups shared by the gateway and the token worker.

/// Subject the gateway sends token requests on and workers consume.
pub const DEFAULT_TOKEN_SUBJECT: &str = "token.request";

/// Queue group workers join so each request reaches exactly one of them.
pub const DEFAULT_QUEUE_GROUP: &str = "token-workers";

/// Connection name a worker reports to the server, e.g. `Token Worker-pod-7`.
pub fn worker_client_name(suffix: Option<&str>) -> String {
    match suffix.map(str::trim).filter(|s| !s.is_empty()) {
        Some(suffix) => format!("Token Worker-{}", suffix),
        None => "Token Worker".to_string(),
    }
}
