// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod session;
pub mod user;

pub use activity::{Activity, AnnotatedActivity, NewActivity, RemoteActivity, RemoteMap};
pub use session::{SessionCompletion, SessionKey, ToggleOutcome};
pub use user::{StravaCredential, User};
