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

//! Per-receiver bookkeeping of bound closures and automatic cleanup.
//!
//! Any owner type becomes a receiver by embedding a [`ClosureRegistry`] and
//! implementing [`Delegatable`]. Application code never calls the registry's
//! operations directly; they fire implicitly from bind/unbind on a delegate
//! and from the receiver's own destruction.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeSet,
    fmt::{self, Debug},
    rc::Weak,
};

use indexmap::IndexMap;

use crate::{
    correctness::{FAILED, check_predicate_true},
    identity::{ClosureKey, DelegateToken, ReceiverToken},
};

/// The capability making a type usable as a closure receiver.
///
/// Implementors embed a [`ClosureRegistry`] and return it here. The registry
/// purges every closure referencing the receiver, from every delegate that
/// holds one, when the receiver is destroyed.
pub trait Delegatable: 'static {
    /// Returns the receiver's closure registry.
    fn registry(&self) -> &ClosureRegistry;
}

/// The narrow type-erased boundary letting a registry talk to a delegate
/// without knowing its argument list.
///
/// Erasure is confined to this one seam; everything else stays fully typed.
pub(crate) trait DelegateLink {
    fn force_remove(&self, key: ClosureKey);
}

/// The closures one delegate has registered against this receiver.
struct DelegateSlot {
    /// Non-owning handle back to the delegate; the delegate owns the closures.
    link: Weak<dyn DelegateLink>,
    keys: BTreeSet<ClosureKey>,
}

/// Tracks which delegates hold closures referencing the owning receiver.
///
/// Teardown flows receiver -> delegate only, never the reverse: on
/// destruction the registry instructs every tracked delegate to force-remove
/// its entries, without re-entering the (dying) receiver.
pub struct ClosureRegistry {
    token: ReceiverToken,
    entries: RefCell<IndexMap<DelegateToken, DelegateSlot>>,
    torn_down: Cell<bool>,
}

impl ClosureRegistry {
    /// Creates a new [`ClosureRegistry`] instance with a fresh receiver token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: ReceiverToken::next(),
            entries: RefCell::new(IndexMap::new()),
            torn_down: Cell::new(false),
        }
    }

    /// Returns the identity of the owning receiver.
    #[must_use]
    pub fn token(&self) -> ReceiverToken {
        self.token
    }

    /// Returns whether no closures are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Returns the number of delegates holding closures against this receiver.
    #[must_use]
    pub fn delegate_count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns the total number of tracked closures across all delegates.
    #[must_use]
    pub fn closure_count(&self) -> usize {
        self.entries.borrow().values().map(|slot| slot.keys.len()).sum()
    }

    /// Records that the closure `key`, owned by `delegate`, references this
    /// receiver.
    ///
    /// The delegate deduplicates before registering, so a duplicate entry
    /// here means the two sides have desynchronized.
    pub(crate) fn register(
        &self,
        link: Weak<dyn DelegateLink>,
        delegate: DelegateToken,
        key: ClosureKey,
    ) {
        check_predicate_true(
            !self.torn_down.get(),
            &format!("{}: closure {key} registered after teardown", self.token),
        )
        .expect(FAILED);

        let mut entries = self.entries.borrow_mut();
        let slot = entries.entry(delegate).or_insert_with(|| DelegateSlot {
            link,
            keys: BTreeSet::new(),
        });
        let inserted = slot.keys.insert(key);

        check_predicate_true(
            inserted,
            &format!("{}: closure {key} already registered for {delegate}", self.token),
        )
        .expect(FAILED);

        log::debug!("{}: registered {key} for {delegate}", self.token);
    }

    /// Removes the single entry for (`delegate`, `key`), dropping the
    /// delegate's slot when its entry set becomes empty.
    pub(crate) fn deregister(&self, delegate: DelegateToken, key: ClosureKey) {
        let mut entries = self.entries.borrow_mut();

        let removed = entries
            .get_mut(&delegate)
            .is_some_and(|slot| slot.keys.remove(&key));

        check_predicate_true(
            removed,
            &format!("{}: closure {key} was not registered for {delegate}", self.token),
        )
        .expect(FAILED);

        if entries.get(&delegate).is_some_and(|slot| slot.keys.is_empty()) {
            entries.shift_remove(&delegate);
        }

        log::debug!("{}: deregistered {key} for {delegate}", self.token);
    }

    /// Purges every tracked closure from every delegate holding one.
    ///
    /// Runs as the first step of the receiver's destruction, while the
    /// receiver's storage is still valid, and never re-enters the receiver.
    /// Terminal: no further registration is legal once it has run.
    pub(crate) fn teardown(&self) {
        self.torn_down.set(true);
        let entries = self.entries.take();

        for (delegate, slot) in entries {
            match slot.link.upgrade() {
                Some(link) => {
                    for key in slot.keys {
                        link.force_remove(key);
                    }
                }
                None => log::debug!("{}: {delegate} already dropped", self.token),
            }
        }

        log::debug!("{}: torn down", self.token);
    }
}

impl Default for ClosureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ClosureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        let slots: Vec<(&DelegateToken, &BTreeSet<ClosureKey>)> =
            entries.iter().map(|(token, slot)| (token, &slot.keys)).collect();
        f.debug_struct(stringify!(ClosureRegistry))
            .field("token", &self.token)
            .field("entries", &slots)
            .field("torn_down", &self.torn_down.get())
            .finish()
    }
}

impl Drop for ClosureRegistry {
    fn drop(&mut self) {
        if !self.torn_down.get() {
            self.teardown();
        }
    }
}
