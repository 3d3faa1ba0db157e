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

//! The bound invocation unit held by a multicast delegate.
//!
//! A [`Closure`] is either a free function or a (receiver, method) pair,
//! callable with a fixed argument type. It is immutable after construction
//! and its identity is the structural [`ClosureKey`], so equality and
//! ordering never depend on the storage representation of the callable.

use std::{
    cmp::Ordering,
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    rc::{Rc, Weak},
};

use crate::{
    identity::{ClosureKey, DelegateToken, ReceiverToken},
    registry::Delegatable,
};

/// A free function callable with a reference to the argument value.
pub type FreeFn<A> = fn(&A);

/// A method of receiver type `R` callable with a reference to the argument value.
///
/// Receiver state mutated from inside a method goes through the receiver's
/// own interior mutability; the delegate only ever hands out `&R`.
pub type MethodFn<R, A> = fn(&R, &A);

/// The receiver referenced by a closure no longer exists.
///
/// Returned by [`Closure::invoke`] instead of dereferencing torn-down state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("closure {key} references a receiver that no longer exists")]
pub struct StaleReceiverError {
    /// The identity of the stale closure.
    pub key: ClosureKey,
}

/// The type-erased callable stored behind a closure.
///
/// `deregister` performs the receiver-side bookkeeping for removal and is a
/// no-op for free functions.
pub(crate) trait Callable<A> {
    fn call(&self, args: &A) -> Result<(), StaleReceiverError>;
    fn is_alive(&self) -> bool;
    fn deregister(&self, delegate: DelegateToken, key: ClosureKey);
}

struct FunctionCallable<A: 'static> {
    function: FreeFn<A>,
}

impl<A: 'static> Callable<A> for FunctionCallable<A> {
    fn call(&self, args: &A) -> Result<(), StaleReceiverError> {
        (self.function)(args);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        true
    }

    fn deregister(&self, _delegate: DelegateToken, _key: ClosureKey) {}
}

struct MethodCallable<R: Delegatable, A: 'static> {
    receiver: Weak<R>,
    method: MethodFn<R, A>,
    key: ClosureKey,
}

impl<R: Delegatable, A: 'static> Callable<A> for MethodCallable<R, A> {
    fn call(&self, args: &A) -> Result<(), StaleReceiverError> {
        // The upgraded handle keeps the receiver alive for the duration of
        // this single call, so a receiver cannot be destroyed in the middle
        // of its own callback.
        match self.receiver.upgrade() {
            Some(receiver) => {
                (self.method)(&receiver, args);
                Ok(())
            }
            None => Err(StaleReceiverError { key: self.key }),
        }
    }

    fn is_alive(&self) -> bool {
        self.receiver.strong_count() > 0
    }

    fn deregister(&self, delegate: DelegateToken, key: ClosureKey) {
        if let Some(receiver) = self.receiver.upgrade() {
            receiver.registry().deregister(delegate, key);
        } else {
            // The receiver's own teardown already emptied its registry
            log::debug!("Skipping deregister of {key}: receiver gone");
        }
    }
}

/// An immutable bound operation: a free function, or a (receiver, method) pair.
pub struct Closure<A: 'static> {
    key: ClosureKey,
    callable: Rc<dyn Callable<A>>,
}

impl<A: 'static> Closure<A> {
    /// Creates a closure over the free function `function`.
    #[must_use]
    pub fn from_function(function: FreeFn<A>) -> Self {
        Self {
            key: ClosureKey::function(function),
            callable: Rc::new(FunctionCallable { function }),
        }
    }

    /// Creates a closure binding `method` to `receiver`.
    ///
    /// The closure holds a non-owning handle: it never extends the
    /// receiver's lifetime.
    #[must_use]
    pub fn from_method<R: Delegatable>(receiver: &Rc<R>, method: MethodFn<R, A>) -> Self {
        let key = ClosureKey::method(receiver.registry().token(), method);
        Self {
            key,
            callable: Rc::new(MethodCallable {
                receiver: Rc::downgrade(receiver),
                method,
                key,
            }),
        }
    }

    /// Returns the composite identity of this closure.
    #[must_use]
    pub fn key(&self) -> ClosureKey {
        self.key
    }

    /// Returns the receiver identity, or `None` for a free function.
    #[must_use]
    pub fn receiver_token(&self) -> Option<ReceiverToken> {
        self.key.receiver
    }

    /// Returns whether the referenced receiver (if any) is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.callable.is_alive()
    }

    /// Invokes the bound operation with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`StaleReceiverError`] if the receiver has been torn down.
    pub fn invoke(&self, args: &A) -> Result<(), StaleReceiverError> {
        self.callable.call(args)
    }

    /// Removes this closure's entry from its receiver's registry.
    pub(crate) fn deregister(&self, delegate: DelegateToken) {
        self.callable.deregister(delegate, self.key);
    }
}

impl<A: 'static> Clone for Closure<A> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            callable: self.callable.clone(),
        }
    }
}

impl<A: 'static> Debug for Closure<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!(Closure))
            .field("key", &self.key)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl<A: 'static> PartialEq for Closure<A> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<A: 'static> Eq for Closure<A> {}

impl<A: 'static> PartialOrd for Closure<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A: 'static> Ord for Closure<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl<A: 'static> Hash for Closure<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
