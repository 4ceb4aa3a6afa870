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

//! Per-object bookkeeping: one record for every object we are trying to
//! fetch, with the candidate sources ranked by how much we like them.

use std::sync::Arc;

use crate::core::core::inv::Inv;
use crate::p2p::{Peer, PeerId};
use crate::types::{MAX_SOURCE_LATENCY_USEC, UNMEASURED_LATENCY_USEC};

/// One peer that advertised (or is otherwise known to possess) the
/// object, with the score used to rank it against the others. Holds one
/// protocol-level reference on the peer from creation until the entry is
/// discarded.
pub struct SourceEntry {
	/// The candidate peer.
	pub peer: Arc<Peer>,
	/// How many times we asked this peer for this object.
	pub request_count: u32,
	/// Ranking score; higher is better. Computed once at insertion.
	pub desirability: i64,
}

impl SourceEntry {
	/// Score a peer as a source. Thin-block-capable peers get a flat
	/// bonus once the chain is nearly synced; measured request latency
	/// subtracts, clamped so a terrible peer is merely last, not
	/// unrepresentable.
	fn new(peer: Arc<Peer>, nearly_synced: bool) -> SourceEntry {
		let mut desirability = 0i64;
		if peer.thin_block_capable() && nearly_synced {
			desirability += MAX_SOURCE_LATENCY_USEC;
		}
		let mut latency = peer.tx_latency().average_micros();
		if latency == 0 {
			// never requested from this node; rank it as plausibly average
			latency = UNMEASURED_LATENCY_USEC;
		}
		if latency > MAX_SOURCE_LATENCY_USEC {
			latency = MAX_SOURCE_LATENCY_USEC;
		}
		desirability -= latency;
		SourceEntry {
			peer,
			request_count: 0,
			desirability,
		}
	}
}

/// Bookkeeping for one outstanding fetch.
pub struct ObjectRecord {
	/// The advertisement this record was created from. Re-advertisements
	/// overwrite the kind (a block may arrive as block or thin variants).
	pub inv: Inv,
	/// Highest priority any requester asked with.
	pub priority: u32,
	/// Candidate sources in non-increasing desirability order, no
	/// duplicate peers.
	pub sources: Vec<SourceEntry>,
	/// Requests issued but not yet resolved.
	pub outstanding_reqs: u32,
	/// Microseconds-since-epoch of the last issued request; 0 means
	/// never attempted.
	pub last_request_time: i64,
	/// Peer currently being awaited, if any.
	pub receiving_from: Option<PeerId>,
	/// While > 0 the scheduler skips this record.
	pub paused: u32,
}

impl ObjectRecord {
	/// Fresh record for an advertisement; no sources yet.
	pub fn new(inv: Inv) -> ObjectRecord {
		ObjectRecord {
			inv,
			priority: 0,
			sources: vec![],
			outstanding_reqs: 0,
			last_request_time: 0,
			receiving_from: None,
			paused: 0,
		}
	}

	/// Add a peer as a source if it isn't one already. Takes a
	/// protocol-level reference on the peer; the reference travels with
	/// the entry. Returns whether the peer was added.
	pub fn add_source(&mut self, peer: &Arc<Peer>, nearly_synced: bool) -> bool {
		if self.sources.iter().any(|s| s.peer.id() == peer.id()) {
			return false;
		}
		peer.add_ref();
		let entry = SourceEntry::new(peer.clone(), nearly_synced);
		self.insert_sorted(entry);
		true
	}

	/// Pop the currently most desirable source. The peer reference moves
	/// to the caller, who must release it or hand it back via
	/// `requeue_source`.
	pub fn pop_source(&mut self) -> Option<SourceEntry> {
		if self.sources.is_empty() {
			None
		} else {
			Some(self.sources.remove(0))
		}
	}

	/// Put a just-used source back at a reduced rank so the object can be
	/// re-requested after the retry interval. The entry keeps the peer
	/// reference it already holds. The flat penalty keeps the degrade
	/// monotone whether the score started positive or negative.
	pub fn requeue_source(&mut self, mut entry: SourceEntry) {
		entry.request_count += 1;
		entry.desirability -= MAX_SOURCE_LATENCY_USEC / 2;
		self.insert_sorted(entry);
	}

	fn insert_sorted(&mut self, entry: SourceEntry) {
		let pos = self
			.sources
			.iter()
			.position(|s| s.desirability < entry.desirability)
			.unwrap_or(self.sources.len());
		self.sources.insert(pos, entry);
	}
}
