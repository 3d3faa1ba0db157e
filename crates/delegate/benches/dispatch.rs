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

use std::{cell::Cell, rc::Rc};

use criterion::{Criterion, criterion_group, criterion_main};
use multicast_delegate::{ClosureRegistry, Delegatable, MulticastDelegate};

struct Sink {
    registry: ClosureRegistry,
    hits: Cell<u64>,
}

impl Sink {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            registry: ClosureRegistry::new(),
            hits: Cell::new(0),
        })
    }
}

impl Delegatable for Sink {
    fn registry(&self) -> &ClosureRegistry {
        &self.registry
    }
}

fn on_tick(sink: &Sink, value: &u64) {
    sink.hits.set(sink.hits.get() + value);
}

fn bench_invoke_all(c: &mut Criterion) {
    let delegate = MulticastDelegate::with_name("bench");
    let sinks: Vec<Rc<Sink>> = (0..64).map(|_| Sink::new()).collect();
    for sink in &sinks {
        delegate.bind(sink, on_tick);
    }

    c.bench_function("MulticastDelegate::invoke_all (64 receivers)", |b| {
        b.iter(|| delegate.invoke_all(&1));
    });
}

fn bench_bind_unbind(c: &mut Criterion) {
    let delegate = MulticastDelegate::with_name("bench");
    let sink = Sink::new();

    c.bench_function("MulticastDelegate::bind + unbind", |b| {
        b.iter(|| {
            delegate.bind(&sink, on_tick);
            delegate.unbind(sink.as_ref(), on_tick);
        });
    });
}

criterion_group!(benches, bench_invoke_all, bench_bind_unbind);
criterion_main!(benches);
