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

//! Stub receivers for testing delegate dispatch and lifetime behavior.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use ustr::Ustr;

use crate::{
    delegate::MulticastDelegate,
    registry::{ClosureRegistry, Delegatable},
};

/// A shared call journal recording invocations across receivers in order.
pub type Journal = Rc<RefCell<Vec<String>>>;

/// Creates a new empty [`Journal`].
#[must_use]
pub fn new_journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

/// A stub receiver recording every invocation into a shared journal.
///
/// The optional `delegate` and `peer` slots let individual methods mutate the
/// delegate mid-dispatch (self-unbind, cross-unbind, mid-pass bind, dropping
/// another receiver).
#[derive(Debug)]
pub struct Recorder {
    registry: ClosureRegistry,
    label: Ustr,
    journal: Journal,
    /// The delegate this recorder mutates from inside callbacks.
    pub delegate: RefCell<Option<MulticastDelegate<i32>>>,
    /// Another receiver this recorder's callbacks act on.
    pub peer: RefCell<Option<Rc<Self>>>,
}

impl Recorder {
    /// Creates a new [`Recorder`] instance writing to `journal`.
    pub fn new<T: AsRef<str>>(label: T, journal: Journal) -> Rc<Self> {
        Rc::new(Self {
            registry: ClosureRegistry::new(),
            label: Ustr::from(label.as_ref()),
            journal,
            delegate: RefCell::new(None),
            peer: RefCell::new(None),
        })
    }

    /// Appends `op` for this recorder to the shared journal.
    pub fn record(&self, op: &str) {
        self.journal.borrow_mut().push(format!("{}.{op}", self.label));
    }

    /// Returns the number of journal entries recorded by this recorder.
    #[must_use]
    pub fn calls(&self) -> usize {
        let prefix = format!("{}.", self.label);
        self.journal
            .borrow()
            .iter()
            .filter(|entry| entry.starts_with(&prefix))
            .count()
    }
}

impl Delegatable for Recorder {
    fn registry(&self) -> &ClosureRegistry {
        &self.registry
    }
}

/// Records the invocation.
pub fn on_event(recorder: &Recorder, _value: &i32) {
    recorder.record("on_event");
}

/// Records the invocation; a second distinct operation.
pub fn on_update(recorder: &Recorder, _value: &i32) {
    recorder.record("on_update");
}

/// Records the invocation; a third distinct operation.
pub fn on_close(recorder: &Recorder, _value: &i32) {
    recorder.record("on_close");
}

/// Records the invocation, then unbinds itself from the recorder's delegate.
pub fn on_event_unbind_self(recorder: &Recorder, _value: &i32) {
    recorder.record("on_event_unbind_self");
    if let Some(delegate) = recorder.delegate.borrow().as_ref() {
        delegate.unbind(recorder, on_event_unbind_self);
    }
}

/// Records the invocation, then unbinds the peer's `on_event` from the
/// recorder's delegate.
pub fn on_event_unbind_peer(recorder: &Recorder, _value: &i32) {
    recorder.record("on_event_unbind_peer");
    let delegate = recorder.delegate.borrow();
    let peer = recorder.peer.borrow();
    if let (Some(delegate), Some(peer)) = (delegate.as_ref(), peer.as_ref()) {
        delegate.unbind(peer.as_ref(), on_event);
    }
}

/// Records the invocation, then binds the peer's `on_event` on the recorder's
/// delegate.
pub fn on_event_bind_peer(recorder: &Recorder, _value: &i32) {
    recorder.record("on_event_bind_peer");
    let delegate = recorder.delegate.borrow();
    let peer = recorder.peer.borrow();
    if let (Some(delegate), Some(peer)) = (delegate.as_ref(), peer.as_ref()) {
        delegate.bind(peer, on_event);
    }
}

/// Records the invocation, then drops the recorder's handle to its peer,
/// destroying the peer if that handle was the last one.
pub fn on_event_drop_peer(recorder: &Recorder, _value: &i32) {
    recorder.record("on_event_drop_peer");
    recorder.peer.borrow_mut().take();
}

/// Records the invocation, then re-enters `invoke_all` on the recorder's
/// delegate.
pub fn on_event_reinvoke(recorder: &Recorder, value: &i32) {
    recorder.record("on_event_reinvoke");
    if let Some(delegate) = recorder.delegate.borrow().as_ref() {
        delegate.invoke_all(value);
    }
}

thread_local! {
    static FREE_CALLS: Cell<usize> = const { Cell::new(0) };
}

/// A free function counting its invocations thread-locally.
pub fn count_free_call(_value: &i32) {
    FREE_CALLS.with(|calls| calls.set(calls.get() + 1));
}

/// Returns the number of [`count_free_call`] invocations on this thread.
#[must_use]
pub fn free_call_count() -> usize {
    FREE_CALLS.with(Cell::get)
}

/// Resets the thread-local [`count_free_call`] counter.
pub fn reset_free_calls() {
    FREE_CALLS.with(|calls| calls.set(0));
}
