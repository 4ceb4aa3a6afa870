// Copyright 2021 The Bittern Developers
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

//! Microsecond wall clock used by the request scheduler. A process-wide
//! offset can be applied so tests can advance time deterministically.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime};

static MOCK_OFFSET_MICROS: AtomicI64 = AtomicI64::new(0);

/// Microseconds since the unix epoch, shifted by the mock offset if one
/// has been set.
pub fn now_micros() -> i64 {
	let since_epoch = SystemTime::now()
		.duration_since(SystemTime::UNIX_EPOCH)
		.unwrap_or(Duration::new(0, 0));
	let real = since_epoch.as_secs() as i64 * 1_000_000 + since_epoch.subsec_micros() as i64;
	real + MOCK_OFFSET_MICROS.load(Ordering::Relaxed)
}

/// Shift the clock forward (or backward) by the given number of
/// microseconds. Cumulative. Test support only; never called by the node.
pub fn add_mock_time_offset(delta_micros: i64) {
	MOCK_OFFSET_MICROS.fetch_add(delta_micros, Ordering::Relaxed);
}

/// Drop any mock offset and return to the real clock.
pub fn clear_mock_time() {
	MOCK_OFFSET_MICROS.store(0, Ordering::Relaxed);
}
