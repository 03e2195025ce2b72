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

//! Session persistence.
//!
//! [`SessionStore`] is the keyed-record collaborator the lifecycle manager
//! talks to. Two backends implement it ([`MemorySessionStore`] and the
//! JSON-snapshot [`FileSessionStore`]), and two registry layouts decide how
//! stores map onto clusters:
//!
//! - [`CentralizedRegistry`]: one control-plane store shared by every cluster.
//! - [`PerClusterRegistry`]: one store per cluster; reads without a cluster
//!   fan out over all of them.

pub mod file;
pub mod memory;
pub mod registry;
pub mod store;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use registry::{
    build_registry, CentralizedRegistry, PerClusterRegistry, RegistryLayout, SessionRegistry,
};
pub use store::{SessionFilter, SessionStore, StoreResult};
