// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Two-phase session tokens.
//!
//! A [`SessionToken::Pending`] token is minted on the client the moment the
//! user starts a session, so navigation never waits for the network. Once the
//! platform answers the provisioning request, the server-issued
//! [`SessionToken::Confirmed`] token supersedes it.

use std::fmt;

use rand::Rng;

/// Prefix of client-generated tokens.
pub const PENDING_PREFIX: &str = "temp-";

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Token identifying a provisioning request / container pairing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionToken {
    /// Client-generated placeholder (`temp-<unix-millis>-<suffix>`).
    /// The platform may not know about it yet.
    Pending(String),
    /// Token issued by the platform. Authoritative.
    Confirmed(String),
}

impl SessionToken {
    /// Mint a new pending token from the wall clock.
    pub fn pending() -> Self {
        Self::pending_at(chrono::Utc::now().timestamp_millis(), &mut rand::thread_rng())
    }

    /// Mint a pending token for an explicit timestamp and random source.
    pub fn pending_at(timestamp_ms: i64, rng: &mut impl Rng) -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        SessionToken::Pending(format!("{}{}-{}", PENDING_PREFIX, timestamp_ms, suffix))
    }

    /// Interpret a stored token string.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.starts_with(PENDING_PREFIX) {
            SessionToken::Pending(raw)
        } else {
            SessionToken::Confirmed(raw)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SessionToken::Pending(token) | SessionToken::Confirmed(token) => token,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SessionToken::Pending(_))
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SessionToken::Confirmed(_))
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
