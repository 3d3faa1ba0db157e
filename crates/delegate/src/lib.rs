// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! An in-process multicast delegate with automatic receiver lifetime tracking.
//!
//! The `multicast-delegate` crate provides an ordered, deduplicated collection
//! of bound operations ([`MulticastDelegate`]) invoked together as one logical
//! call, where each bound operation ([`Closure`]) may reference a receiver
//! whose lifetime is independent of the collection.
//!
//! The two hard problems this crate solves:
//!
//! - **Lifetime safety**: a receiver embeds a [`ClosureRegistry`] (the
//!   [`Delegatable`] capability); when the receiver is destroyed, every
//!   closure referencing it is purged from every delegate that holds one,
//!   before dispatch could ever touch freed state.
//! - **Mutation-safe iteration**: a callback invoked during a dispatch pass
//!   may bind or unbind entries of the same delegate (itself included)
//!   without any entry being skipped, double-invoked, or touched after
//!   removal.
//!
//! Execution is single-threaded and fully synchronous; the crate makes no
//! claim of, and must not be assumed to provide, multi-thread safety.
//!
//! # Feature flags
//!
//! - `stubs`: Enables stub receiver types for use in testing scenarios.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod closure;
pub mod correctness;
pub mod delegate;
pub mod identity;
pub mod registry;

#[cfg(any(test, feature = "stubs"))]
pub mod stubs;


pub use crate::{
    closure::{Closure, FreeFn, MethodFn, StaleReceiverError},
    delegate::MulticastDelegate,
    identity::{ClosureKey, DelegateToken, OperationToken, ReceiverToken},
    registry::{ClosureRegistry, Delegatable},
};
