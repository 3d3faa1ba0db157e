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

//! Identity tokens for receivers, delegates, and bound operations.
//!
//! Closure identity is an explicit composite key compared structurally,
//! never a raw memory comparison of the stored callable. Receiver and
//! delegate tokens come from a process-wide monotonic counter and are
//! never reused, so a token observed before a teardown can still be used
//! afterwards for queries without risk of aliasing a new object.

use std::{
    fmt::{self, Display},
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

fn next_identity() -> u64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}

/// A stable, totally ordered identity for a receiver's closure registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReceiverToken(u64);

impl ReceiverToken {
    /// Allocates the next receiver token.
    pub(crate) fn next() -> Self {
        Self(next_identity())
    }
}

impl Display for ReceiverToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receiver-{}", self.0)
    }
}

/// A stable, totally ordered identity for a multicast delegate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DelegateToken(u64);

impl DelegateToken {
    /// Allocates the next delegate token.
    pub(crate) fn next() -> Self {
        Self(next_identity())
    }
}

impl Display for DelegateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delegate-{}", self.0)
    }
}

/// The identity of a bound operation, derived from its function pointer.
///
/// Tokens are only constructible through the typed constructors, so a token
/// for a method of receiver type `R` can never be produced from a function
/// with a mismatched signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationToken(usize);

impl OperationToken {
    /// Returns the token identifying the free function `function`.
    #[must_use]
    pub fn for_function<A>(function: fn(&A)) -> Self {
        Self(function as usize)
    }

    /// Returns the token identifying the method `method` of receiver type `R`.
    #[must_use]
    pub fn for_method<R, A>(method: fn(&R, &A)) -> Self {
        Self(method as usize)
    }
}

impl Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation-{:#x}", self.0)
    }
}

/// The composite identity of a bound closure.
///
/// Equality and ordering are derived lexicographically from the tuple
/// (receiver token, operation token). Free functions carry no receiver token
/// and therefore sort before every bound method; among methods the receiver
/// token dominates and the operation token breaks ties. Two keys built from
/// the same (receiver, operation) pair, or from the same free function,
/// always compare equal regardless of construction order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClosureKey {
    /// The receiver identity, `None` for a free function.
    pub receiver: Option<ReceiverToken>,
    /// The bound operation identity.
    pub operation: OperationToken,
}

impl ClosureKey {
    /// Creates a key for a free function.
    #[must_use]
    pub fn function<A>(function: fn(&A)) -> Self {
        Self {
            receiver: None,
            operation: OperationToken::for_function(function),
        }
    }

    /// Creates a key for a method bound to the receiver identified by `receiver`.
    #[must_use]
    pub fn method<R, A>(receiver: ReceiverToken, method: fn(&R, &A)) -> Self {
        Self {
            receiver: Some(receiver),
            operation: OperationToken::for_method(method),
        }
    }
}

impl Display for ClosureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.receiver {
            Some(receiver) => write!(f, "({receiver}, {})", self.operation),
            None => write!(f, "(free, {})", self.operation),
        }
    }
}
