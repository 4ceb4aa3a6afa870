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

//! Request-manager counters, to be read by tests, logging or the node's
//! stats surface.

use std::sync::atomic::{AtomicI64, Ordering};

/// Independently-atomic accumulators. Signed: cleanup paths subtract
/// amounts that can transiently exceed what a counter holds.
pub struct FetchStats {
	/// Transaction requests issued and not yet resolved.
	pub in_flight: AtomicI64,
	/// Transactions received.
	pub received_txns: AtomicI64,
	/// Transactions rejected by a peer.
	pub rejected_txns: AtomicI64,
	/// Transaction requests believed dropped (retried after silence).
	pub dropped_txns: AtomicI64,
	/// Transaction records currently tracked.
	pub pending_txns: AtomicI64,
}

impl FetchStats {
	/// All counters at zero.
	pub fn new() -> FetchStats {
		FetchStats {
			in_flight: AtomicI64::new(0),
			received_txns: AtomicI64::new(0),
			rejected_txns: AtomicI64::new(0),
			dropped_txns: AtomicI64::new(0),
			pending_txns: AtomicI64::new(0),
		}
	}

	pub(crate) fn add(counter: &AtomicI64, n: i64) {
		counter.fetch_add(n, Ordering::Relaxed);
	}

	pub(crate) fn sub(counter: &AtomicI64, n: i64) {
		counter.fetch_sub(n, Ordering::Relaxed);
	}

	/// Point-in-time copy of every counter.
	pub fn snapshot(&self) -> FetchStatsSnapshot {
		FetchStatsSnapshot {
			in_flight: self.in_flight.load(Ordering::Relaxed),
			received_txns: self.received_txns.load(Ordering::Relaxed),
			rejected_txns: self.rejected_txns.load(Ordering::Relaxed),
			dropped_txns: self.dropped_txns.load(Ordering::Relaxed),
			pending_txns: self.pending_txns.load(Ordering::Relaxed),
		}
	}
}

/// Simple thread-unaware copy of the counters, to be returned to
/// consumers such as test results or the stats RPC.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FetchStatsSnapshot {
	/// Transaction requests issued and not yet resolved.
	pub in_flight: i64,
	/// Transactions received.
	pub received_txns: i64,
	/// Transactions rejected by a peer.
	pub rejected_txns: i64,
	/// Transaction requests believed dropped.
	pub dropped_txns: i64,
	/// Transaction records currently tracked.
	pub pending_txns: i64,
}
