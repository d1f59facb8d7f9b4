use crate::errors::AuthError;
use boardbase_types::prelude::OwnerId;
use std::collections::HashMap;

/// Header carrying the acting user id on the trusted service channel.
pub const USER_HEADER: &str = "x-boardbase-user";
/// Shared-secret header that must accompany [`USER_HEADER`]. The user header
/// is ignored entirely when the secret is absent or wrong; a spoofable
/// attribute like the user agent never substitutes for it.
pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";
pub const USER_QUERY_PARAM: &str = "user_id";
pub const USER_BODY_FIELD: &str = "user_id";

/// The slice of an inbound request that identity resolution is allowed to
/// see. Header names are lowercased by the caller; `body` is the parsed JSON
/// body when one was supplied.
#[derive(Clone, Debug, Default)]
pub struct RequestSnapshot {
    pub method: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

impl RequestSnapshot {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    fn is_write(&self) -> bool {
        matches!(
            self.method.to_ascii_uppercase().as_str(),
            "POST" | "PUT" | "PATCH"
        )
    }
}

type ChannelFn = Box<dyn Fn(&RequestSnapshot) -> Option<String> + Send + Sync>;

struct Channel {
    name: &'static str,
    extract: ChannelFn,
}

/// Resolves the caller identity from an ordered list of channels; the first
/// channel yielding a non-empty value wins and later channels are not
/// consulted. Resolution never touches the user store: a fabricated id fails
/// closed at the owner-scoped lookup downstream.
pub struct CredentialResolver {
    channels: Vec<Channel>,
}

impl CredentialResolver {
    /// `service_token` guards the header channel. With `None` the header
    /// channel is disabled outright rather than degraded to trust-by-header.
    pub fn new(service_token: Option<String>) -> Self {
        let mut channels: Vec<Channel> = Vec::new();

        channels.push(Channel {
            name: "service-header",
            extract: Box::new(move |req| {
                let expected = service_token.as_deref()?;
                let presented = req.header(SERVICE_TOKEN_HEADER)?;
                if presented != expected {
                    return None;
                }
                req.header(USER_HEADER).map(str::to_string)
            }),
        });

        channels.push(Channel {
            name: "query",
            extract: Box::new(|req| req.query.get(USER_QUERY_PARAM).cloned()),
        });

        channels.push(Channel {
            name: "body",
            extract: Box::new(|req| {
                if !req.is_write() {
                    return None;
                }
                req.body
                    .as_ref()
                    .and_then(|body| body.get(USER_BODY_FIELD))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            }),
        });

        Self { channels }
    }

    pub fn resolve(&self, req: &RequestSnapshot) -> Result<OwnerId, AuthError> {
        for channel in &self.channels {
            let Some(candidate) = (channel.extract)(req) else {
                continue;
            };
            let candidate = candidate.trim();
            if candidate.is_empty() {
                continue;
            }
            tracing::debug!(channel = channel.name, "identity resolved");
            return Ok(OwnerId(candidate.to_string()));
        }
        Err(AuthError::unauthenticated("no identity on any channel"))
    }
}
