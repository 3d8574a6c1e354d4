// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A module for `ember run demos/counter.rs`.
//!
//! Edit `STEP` or the message while it runs: the count carries over.

use ember_core::Context;
use std::fmt::Write;
use std::time::Duration;

const STEP: u64 = 1;

struct Counter {
    value: u64,
    loads: u32,
}

fn update(ctx: &mut Context) {
    // SAFETY: every generation of this file stores a `Counter`.
    let mut counter = unsafe { ctx.app_or_init(|_| Counter { value: 0, loads: 0 }) };
    // SAFETY: the state lives in `ctx.mem`, which this function does not touch.
    let counter = unsafe { counter.as_mut() };

    if ctx.reloaded {
        counter.loads += 1;
        ember_core::log::info!("Counter load #{} at tick {}", counter.loads, ctx.tick);
    }

    counter.value += STEP;
    // Scratch memory: gone after this invocation.
    let label = ctx.tmp.alloc_str(&mut ctx.chunks, "count");
    // SAFETY: `ctx.tmp` is only freed after this function returns.
    let label = unsafe { label.as_ref() };
    let _ = writeln!(ctx.out, "{label}: {}", counter.value);

    if ctx.args.iter().any(|arg| arg == "--once") {
        ctx.request_exit(0);
    }
    ctx.set_wake_delay(Duration::from_millis(500));
}

ember_core::export_main!(update);
