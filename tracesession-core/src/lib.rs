// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Core types for ephemeral trace-viewer sessions.
//!
//! A session is a short-lived, pod-backed viewer instance (Perfetto or
//! TraceLens) bound to a single profiler artifact. This crate holds the data
//! model, the status state machine, the identity/dedup rules and the error
//! taxonomy shared by the storage and server crates.

pub mod clock;
pub mod error;
pub mod identity;
pub mod session;
pub mod status;
pub mod viewer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SessionError, StoreError};
pub use identity::{pod_name_for, ActiveKey, SessionIdGenerator};
pub use session::{
    Session, SessionConfig, SessionPolicy, DEFAULT_ESTIMATED_READY_SECONDS,
    DEFAULT_MAX_SESSION_TTL_MINUTES, DEFAULT_POD_NAMESPACE, DEFAULT_POD_PORT,
    DEFAULT_TTL_MINUTES, MAX_EXTEND_MINUTES, MIN_EXTEND_MINUTES, MIN_TTL_MINUTES,
};
pub use status::{InvalidTransition, SessionStatus};
pub use viewer::{ResourceProfile, ResourceProfileInfo, ViewerType};
