// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model carrying the Strava athlete credential.

use chrono::{DateTime, Utc};

/// Local user row, including the Strava OAuth credential.
///
/// Created on the first OAuth exchange, overwritten on re-authorization
/// and on token refresh. Never deleted.
#[derive(Debug, Clone)]
pub struct User {
    /// Local user identifier
    pub id: String,
    /// Display name ("firstname lastname" from Strava)
    pub name: Option<String>,
    /// Email address (synthesized as `{athlete_id}@strava.local`)
    pub email: Option<String>,
    /// Strava athlete ID, unique across users
    pub strava_athlete_id: Option<String>,
    pub strava_access_token: Option<String>,
    pub strava_refresh_token: Option<String>,
    /// When the access token expires
    pub strava_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the stored access token has expired as of `now`.
    ///
    /// A credential without a recorded expiry is treated as still valid.
    pub fn token_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.strava_token_expiry.is_some_and(|expiry| now >= expiry)
    }
}

/// Credential fields written after an OAuth exchange or refresh.
#[derive(Debug, Clone)]
pub struct StravaCredential {
    pub athlete_id: String,
    pub name: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_expiring(expiry: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: "u1".to_string(),
            name: None,
            email: None,
            strava_athlete_id: Some("42".to_string()),
            strava_access_token: Some("access".to_string()),
            strava_refresh_token: Some("refresh".to_string()),
            strava_token_expiry: expiry,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_token_expired_boundary() {
        let now = Utc::now();
        assert!(user_expiring(Some(now)).token_expired_at(now));
        assert!(user_expiring(Some(now - Duration::seconds(1))).token_expired_at(now));
        assert!(!user_expiring(Some(now + Duration::seconds(1))).token_expired_at(now));
    }

    #[test]
    fn test_missing_expiry_is_not_expired() {
        assert!(!user_expiring(None).token_expired_at(Utc::now()));
    }
}
