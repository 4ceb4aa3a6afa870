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

//! Leaky-bucket pacer limiting both the instantaneous burst and the
//! average rate of an operation. The bucket is refilled lazily on each
//! call rather than by a timer, so produced rates are worst-case
//! estimates.

use crate::time::now_micros;
use crate::Mutex;

struct PacerState {
	/// Tokens currently available.
	level: f64,
	/// Clock reading at the last refill, in microseconds.
	last_fill: i64,
}

/// A leaky bucket with a maximum burst size and an average sustained
/// rate. `try_leak` either consumes the requested tokens or refuses
/// without blocking.
pub struct Pacer {
	max_burst: u32,
	average_per_sec: u32,
	state: Mutex<PacerState>,
}

impl Pacer {
	/// Build a pacer holding at most `max_burst` tokens, refilled at
	/// `average_per_sec` tokens per second. Starts full.
	pub fn new(max_burst: u32, average_per_sec: u32) -> Pacer {
		Pacer {
			max_burst,
			average_per_sec,
			state: Mutex::new(PacerState {
				level: max_burst as f64,
				last_fill: now_micros(),
			}),
		}
	}

	/// Consume `n` tokens if the bucket, after refill, holds at least
	/// that many. Returns whether the tokens were consumed.
	pub fn try_leak(&self, n: u32) -> bool {
		let mut state = self.state.lock();
		let now = now_micros();
		let elapsed_secs = (now - state.last_fill).max(0) as f64 / 1_000_000.0;
		state.level =
			(state.level + elapsed_secs * self.average_per_sec as f64).min(self.max_burst as f64);
		state.last_fill = now;
		if state.level >= n as f64 {
			state.level -= n as f64;
			true
		} else {
			false
		}
	}

	/// Maximum burst size this pacer was built with.
	pub fn max_burst(&self) -> u32 {
		self.max_burst
	}
}
