//! Shape checks for inbound `POST /token` bodies.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("Invalid request format")]
    MalformedRequest,
    #[error("Client ID and Client Secret are required")]
    MissingCredential,
}

/// Client credentials taken from a request body. Both fields are non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct RawCredentials {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
}

/// Decodes `{"client_id": ..., "client_secret": ...}`. Absent and `null`
/// fields count as empty; unknown fields are ignored.
pub fn validate(body: &[u8]) -> Result<Credentials, CredentialError> {
    let raw: Option<RawCredentials> =
        serde_json::from_slice(body).map_err(|_| CredentialError::MalformedRequest)?;

    let (client_id, client_secret) = raw
        .map(|r| {
            (
                r.client_id.unwrap_or_default(),
                r.client_secret.unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    if client_id.is_empty() || client_secret.is_empty() {
        return Err(CredentialError::MissingCredential);
    }

    Ok(Credentials {
        client_id,
        client_secret,
    })
}
