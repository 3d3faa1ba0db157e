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

//! An ordered, deduplicated collection of closures invoked together as one
//! logical call.
//!
//! The delegate owns its closures outright and keeps them in ascending
//! [`ClosureKey`] order, which provides both the deduplication and the
//! deterministic dispatch order. Dispatch iterates with an explicit cursor
//! over the ordered set rather than a native iterator, so callbacks may
//! freely bind and unbind entries (their own included) mid-pass.
//!
//! # Dispatch contract
//!
//! For any mutation performed by a callback during a pass:
//!
//! - an entry removed before its turn is never invoked;
//! - an entry that survives the whole pass is invoked exactly once;
//! - an entry is never invoked twice;
//! - an entry inserted during the pass is not visited by that pass (it is
//!   visited from the next pass onward).
//!
//! Execution is single-threaded and fully synchronous; re-entering
//! `invoke_all` on the same delegate from a callback is a programmer error.

use std::{
    cell::{Cell, RefCell},
    fmt::{self, Debug},
    rc::{Rc, Weak},
};

use ustr::Ustr;

use crate::{
    closure::{Closure, FreeFn, MethodFn},
    correctness::{FAILED, check_predicate_true},
    identity::{ClosureKey, DelegateToken, ReceiverToken},
    registry::{ClosureRegistry, Delegatable, DelegateLink},
};

/// A bound closure plus the dispatch pass (if any) it was inserted in.
struct Entry<A: 'static> {
    closure: Closure<A>,
    added_in_pass: Option<u64>,
}

struct DelegateInner<A: 'static> {
    token: DelegateToken,
    name: Ustr,
    /// Ascending key order; the sort is the dedup and the dispatch order.
    entries: RefCell<Vec<Entry<A>>>,
    /// Position of the active dispatch pass, `None` outside a pass.
    cursor: Cell<Option<usize>>,
    /// Set when a removal at the cursor position already advanced it, so the
    /// dispatch loop does not advance again.
    cursor_moved: Cell<bool>,
    pass_seq: Cell<u64>,
    active_pass: Cell<Option<u64>>,
}

impl<A: 'static> DelegateInner<A> {
    fn position(&self, key: ClosureKey) -> Result<usize, usize> {
        self.entries
            .borrow()
            .binary_search_by(|entry| entry.closure.key().cmp(&key))
    }

    /// Removal bookkeeping shared by unbind, stale purging, and the
    /// registry-driven force-remove. With `deregister` false the receiver is
    /// never called back into.
    fn remove(&self, key: ClosureKey, deregister: bool) {
        let mut entries = self.entries.borrow_mut();
        match entries.binary_search_by(|entry| entry.closure.key().cmp(&key)) {
            Ok(index) => {
                let entry = entries.remove(index);
                self.note_removed(index);
                drop(entries);
                if deregister {
                    entry.closure.deregister(self.token);
                }
                log::debug!("{}: unbound {key}", self.name);
            }
            Err(_) => log::debug!("{}: {key} was not bound", self.name),
        }
    }

    fn note_removed(&self, index: usize) {
        if let Some(pos) = self.cursor.get() {
            if index < pos {
                self.cursor.set(Some(pos - 1));
            } else if index == pos {
                // The element after the removed one now sits at the cursor
                self.cursor_moved.set(true);
            }
        }
    }

    fn note_inserted(&self, index: usize) {
        if let Some(pos) = self.cursor.get() {
            if index <= pos {
                self.cursor.set(Some(pos + 1));
            }
        }
    }
}

impl<A: 'static> DelegateLink for DelegateInner<A> {
    fn force_remove(&self, key: ClosureKey) {
        self.remove(key, false);
    }
}

impl<A: 'static> Drop for DelegateInner<A> {
    fn drop(&mut self) {
        for entry in self.entries.get_mut().drain(..) {
            entry.closure.deregister(self.token);
        }
    }
}

/// An ordered, deduplicated multicast delegate generic over one argument type.
///
/// Handles are cheap to clone and all refer to the same underlying set.
/// Binding a (receiver, method) pair registers the closure in the receiver's
/// [`ClosureRegistry`]; the receiver's destruction purges it again before any
/// dispatch could touch freed state. Double-bind and unbind-of-absent are
/// silent no-ops, never errors.
pub struct MulticastDelegate<A: 'static> {
    inner: Rc<DelegateInner<A>>,
}

impl<A: 'static> MulticastDelegate<A> {
    /// Creates a new unnamed [`MulticastDelegate`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self::with_name(stringify!(MulticastDelegate))
    }

    /// Creates a new [`MulticastDelegate`] instance with `name` used in log output.
    #[must_use]
    pub fn with_name<T: AsRef<str>>(name: T) -> Self {
        Self {
            inner: Rc::new(DelegateInner {
                token: DelegateToken::next(),
                name: Ustr::from(name.as_ref()),
                entries: RefCell::new(Vec::new()),
                cursor: Cell::new(None),
                cursor_moved: Cell::new(false),
                pass_seq: Cell::new(0),
                active_pass: Cell::new(None),
            }),
        }
    }

    /// Returns the identity of this delegate.
    #[must_use]
    pub fn token(&self) -> DelegateToken {
        self.inner.token
    }

    /// Returns the name of this delegate.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name.as_str()
    }

    /// Binds `method` on `receiver`; a silent no-op if an equal closure is
    /// already bound.
    pub fn bind<R: Delegatable>(&self, receiver: &Rc<R>, method: MethodFn<R, A>) {
        self.insert_closure(Closure::from_method(receiver, method), Some(receiver.registry()));
    }

    /// Binds the free function `function`; a silent no-op if already bound.
    pub fn bind_function(&self, function: FreeFn<A>) {
        self.insert_closure(Closure::from_function(function), None);
    }

    /// Unbinds `method` on `receiver`; a silent no-op if not bound.
    pub fn unbind<R: Delegatable>(&self, receiver: &R, method: MethodFn<R, A>) {
        let key = ClosureKey::method(receiver.registry().token(), method);
        self.inner.remove(key, true);
    }

    /// Unbinds the free function `function`; a silent no-op if not bound.
    pub fn unbind_function(&self, function: FreeFn<A>) {
        self.inner.remove(ClosureKey::function(function), true);
    }

    /// Unbinds every entry, deregistering each from its receiver's registry.
    pub fn clear(&self) {
        let inner = &self.inner;
        let drained: Vec<Entry<A>> = inner.entries.borrow_mut().drain(..).collect();
        for entry in &drained {
            entry.closure.deregister(inner.token);
        }
        log::debug!("{}: cleared {} closures", inner.name, drained.len());
    }

    /// Returns whether `method` is bound on `receiver`.
    #[must_use]
    pub fn exists<R: Delegatable>(&self, receiver: &R, method: MethodFn<R, A>) -> bool {
        let key = ClosureKey::method(receiver.registry().token(), method);
        self.inner.position(key).is_ok()
    }

    /// Returns whether the free function `function` is bound.
    #[must_use]
    pub fn exists_function(&self, function: FreeFn<A>) -> bool {
        self.inner.position(ClosureKey::function(function)).is_ok()
    }

    /// Returns whether any bound closure references the receiver identified
    /// by `receiver`.
    #[must_use]
    pub fn binds_receiver(&self, receiver: ReceiverToken) -> bool {
        self.inner
            .entries
            .borrow()
            .iter()
            .any(|entry| entry.closure.receiver_token() == Some(receiver))
    }

    /// Returns the keys of all bound closures in dispatch order.
    #[must_use]
    pub fn keys(&self) -> Vec<ClosureKey> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|entry| entry.closure.key())
            .collect()
    }

    /// Returns the number of bound closures.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Returns whether no closures are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Invokes every bound closure with `args`, in ascending key order.
    ///
    /// Runs synchronously on the calling thread; see the module docs for the
    /// mutation contract callbacks can rely on.
    ///
    /// # Panics
    ///
    /// Panics if called from a callback of the same delegate while a pass is
    /// already active.
    pub fn invoke_all(&self, args: &A) {
        let inner = &self.inner;

        check_predicate_true(
            inner.active_pass.get().is_none(),
            &format!("{}: invoke_all re-entered during an active pass", inner.name),
        )
        .expect(FAILED);

        let pass = inner.pass_seq.get() + 1;
        inner.pass_seq.set(pass);
        inner.active_pass.set(Some(pass));
        inner.cursor.set(Some(0));

        loop {
            // The borrow is released before invoking so callbacks can
            // mutate the set through the cursor bookkeeping
            let closure = {
                let entries = inner.entries.borrow();
                let Some(pos) = inner.cursor.get() else { break };
                let Some(entry) = entries.get(pos) else { break };
                if entry.added_in_pass == Some(pass) {
                    inner.cursor.set(Some(pos + 1));
                    continue;
                }
                entry.closure.clone()
            };

            inner.cursor_moved.set(false);

            if let Err(e) = closure.invoke(args) {
                // Reachable only if receiver teardown failed to purge; drop
                // the entry rather than dereference torn-down state
                log::error!("{}: purging stale closure during dispatch: {e}", inner.name);
                inner.remove(closure.key(), false);
            }

            if !inner.cursor_moved.get() {
                if let Some(pos) = inner.cursor.get() {
                    inner.cursor.set(Some(pos + 1));
                }
            }
        }

        inner.cursor.set(None);
        inner.cursor_moved.set(false);
        inner.active_pass.set(None);
    }

    fn insert_closure(&self, closure: Closure<A>, registry: Option<&ClosureRegistry>) {
        let inner = &self.inner;
        let key = closure.key();
        let mut entries = inner.entries.borrow_mut();

        match entries.binary_search_by(|entry| entry.closure.key().cmp(&key)) {
            Ok(_) => log::debug!("{}: {key} already bound", inner.name),
            Err(index) => {
                if let Some(registry) = registry {
                    let weak = Rc::downgrade(&self.inner);
                    let link: Weak<dyn DelegateLink> = weak;
                    registry.register(link, inner.token, key);
                }
                entries.insert(
                    index,
                    Entry {
                        closure,
                        added_in_pass: inner.active_pass.get(),
                    },
                );
                inner.note_inserted(index);
                log::debug!("{}: bound {key}", inner.name);
            }
        }
    }
}

impl<A: 'static> Default for MulticastDelegate<A> {
    /// Creates a new default [`MulticastDelegate`] instance.
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Clone for MulticastDelegate<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: 'static> Debug for MulticastDelegate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!(MulticastDelegate))
            .field("token", &self.inner.token)
            .field("name", &self.inner.name)
            .field("count", &self.count())
            .finish()
    }
}
