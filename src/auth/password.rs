//! Shared-password authentication.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::auth::{AuthDecision, Authenticator, WELCOME_MESSAGE};

/// Sub-document of `auth.config` for the `password` mode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordConfig {
    #[serde(default)]
    pub password: String,
}

/// Accepts clients whose credential equals the configured password byte for byte.
#[derive(Clone)]
pub struct PasswordAuthenticator {
    password: Vec<u8>,
}

impl PasswordAuthenticator {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into().into_bytes(),
        }
    }
}

impl std::fmt::Debug for PasswordAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordAuthenticator").finish_non_exhaustive()
    }
}

impl Authenticator for PasswordAuthenticator {
    fn evaluate(
        &self,
        _peer: SocketAddr,
        credential: &[u8],
        _send_bps: u64,
        _recv_bps: u64,
    ) -> AuthDecision {
        if credential == self.password.as_slice() {
            AuthDecision::accept(WELCOME_MESSAGE)
        } else {
            AuthDecision::reject("Wrong password")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(auth: &PasswordAuthenticator, credential: &[u8]) -> AuthDecision {
        auth.evaluate("127.0.0.1:1".parse().unwrap(), credential, 0, 0)
    }

    #[test]
    fn exact_match_is_accepted() {
        let auth = PasswordAuthenticator::new("hunter2");
        assert_eq!(check(&auth, b"hunter2"), AuthDecision::accept("Welcome"));
    }

    #[test]
    fn mismatches_are_rejected() {
        let auth = PasswordAuthenticator::new("hunter2");
        for credential in [&b"hunter3"[..], b"", b"hunter", b"hunter22", b"HUNTER2", b"hunter2\n"] {
            assert_eq!(check(&auth, credential), AuthDecision::reject("Wrong password"));
        }
    }

    #[test]
    fn debug_output_hides_password() {
        let auth = PasswordAuthenticator::new("hunter2");
        assert!(!format!("{:?}", auth).contains("hunter2"));
    }
}
