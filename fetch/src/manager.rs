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

//! The request manager proper. Transactions live in a sharded map so the
//! scheduler and the network threads rarely contend; blocks are rare and
//! live in a single map behind one lock, together with the scheduler's
//! round-robin cursor.

use std::collections::HashMap;
use std::sync::Arc;

use rand::{thread_rng, Rng};

use crate::core::core::hash::Hash;
use crate::core::core::inv::{Inv, InvType};
use crate::core::global;
use crate::p2p::{BloomFilter, Peer, PeerId};
use crate::record::ObjectRecord;
use crate::sharded_map::{ShardedMap, NUM_SHARDS};
use crate::stats::FetchStats;
use crate::types::{
	ChainAdapter, FetchConfig, RejectReason, IBD_BLK_RETRY_FACTOR, IBD_TX_RETRY_FACTOR,
};
use crate::util::time::now_micros;
use crate::util::{Mutex, Pacer};

struct BlockMap {
	map: HashMap<Hash, ObjectRecord>,
	/// Key the next block pass resumes its walk at; None wraps to the
	/// beginning.
	cursor: Option<Hash>,
}

/// Read-only copy of one object record's bookkeeping, for tests and
/// debug surfaces.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordView {
	/// Highest requested priority.
	pub priority: u32,
	/// Requests issued but unresolved.
	pub outstanding_reqs: u32,
	/// Last attempt time in microseconds; 0 if never attempted.
	pub last_request_time: i64,
	/// Peer currently awaited.
	pub receiving_from: Option<PeerId>,
	/// Pause counter.
	pub paused: u32,
	/// Number of candidate sources currently held.
	pub num_sources: usize,
}

impl RecordView {
	fn of(record: &ObjectRecord) -> RecordView {
		RecordView {
			priority: record.priority,
			outstanding_reqs: record.outstanding_reqs,
			last_request_time: record.last_request_time,
			receiving_from: record.receiving_from,
			paused: record.paused,
			num_sources: record.sources.len(),
		}
	}
}

/// The fetch coordinator. The surrounding node owns exactly one and
/// shares it between the network threads and the request driver.
pub struct RequestManager {
	config: FetchConfig,
	adapter: Arc<dyn ChainAdapter>,
	tx_map: ShardedMap<ObjectRecord>,
	blocks: Mutex<BlockMap>,
	stats: FetchStats,
	request_pacer: Pacer,
	// Constructed for configuration parity with the request pacer; the
	// block pass is bounded by its retry interval and cursor instead.
	block_pacer: Pacer,
}

impl RequestManager {
	/// Build a request manager against the node's chain state.
	pub fn new(config: FetchConfig, adapter: Arc<dyn ChainAdapter>) -> RequestManager {
		let request_pacer = Pacer::new(config.request_pacer_max, config.request_pacer_avg);
		let block_pacer = Pacer::new(config.block_pacer_max, config.block_pacer_avg);
		RequestManager {
			config,
			adapter,
			tx_map: ShardedMap::new(),
			blocks: Mutex::new(BlockMap {
				map: HashMap::new(),
				cursor: None,
			}),
			stats: FetchStats::new(),
			request_pacer,
			block_pacer,
		}
	}

	/// The live counters.
	pub fn stats(&self) -> &FetchStats {
		&self.stats
	}

	/// The block request pacer, for callers issuing block fetches
	/// outside the scheduler.
	pub fn block_pacer(&self) -> &Pacer {
		&self.block_pacer
	}

	/// Get this object from somewhere, asynchronously. Repeated calls
	/// with the same `(inv, peer)` are idempotent; priority only ever
	/// rises.
	pub fn ask_for(&self, inv: &Inv, peer: &Arc<Peer>, priority: u32) {
		let nearly_synced = self.adapter.is_nearly_synced();
		match inv.kind {
			InvType::Tx => {
				let mut shard = self.tx_map.accessor(&inv.hash);
				if !shard.contains_key(&inv.hash) {
					FetchStats::add(&self.stats.pending_txns, 1);
				}
				let record = shard
					.entry(inv.hash)
					.or_insert_with(|| ObjectRecord::new(*inv));
				record.inv = *inv;
				record.priority = record.priority.max(priority);
				if record.add_source(peer, nearly_synced) {
					trace!("{} available at {}", inv, peer.log_name());
				}
			}
			InvType::Block | InvType::ThinBlock | InvType::XThinBlock => {
				let mut blocks = self.blocks.lock();
				let record = blocks
					.map
					.entry(inv.hash)
					.or_insert_with(|| ObjectRecord::new(*inv));
				record.inv = *inv;
				record.priority = record.priority.max(priority);
				if record.add_source(peer, nearly_synced) {
					debug!("{} available at {}", inv, peer.log_name());
				}
			}
		}
	}

	/// Get these objects from somewhere, asynchronously.
	pub fn ask_for_all(&self, invs: &[Inv], peer: &Arc<Peer>, priority: u32) {
		for inv in invs {
			self.ask_for(inv, peer, priority);
		}
	}

	/// Indicate that we got this object. The peer's latency record is
	/// updated (transactions only) and the record fully cleaned up.
	/// No-op if the object is no longer tracked.
	pub fn received(&self, inv: &Inv, peer: &Arc<Peer>, _bytes: usize) {
		let now = now_micros();
		match inv.kind {
			InvType::Tx => {
				let mut shard = self.tx_map.accessor(&inv.hash);
				if let Some(mut record) = shard.remove(&inv.hash) {
					debug!("TX received for {}.", inv);
					if record.last_request_time > 0 {
						// keep track of response latency of this node
						peer.tx_latency().record(now - record.last_request_time);
					}
					drop(shard);
					self.cleanup_record(&mut record);
					FetchStats::add(&self.stats.received_txns, 1);
				}
			}
			InvType::Block | InvType::ThinBlock | InvType::XThinBlock => {
				let mut blocks = self.blocks.lock();
				if let Some(mut record) = blocks.map.remove(&inv.hash) {
					debug!(
						"{} removed from request queue (received from {}).",
						inv,
						peer.log_name()
					);
					if blocks.cursor == Some(inv.hash) {
						blocks.cursor = None;
					}
					drop(blocks);
					self.cleanup_record(&mut record);
				}
			}
		}
	}

	/// Indicate that this object arrived through some other channel; the
	/// record is dropped with no latency accounting.
	pub fn already_received(&self, inv: &Inv) {
		debug!("Already received {}. Removing request.", inv);
		match inv.kind {
			InvType::Tx => {
				let mut shard = self.tx_map.accessor(&inv.hash);
				if let Some(mut record) = shard.remove(&inv.hash) {
					drop(shard);
					self.cleanup_record(&mut record);
				}
			}
			InvType::Block | InvType::ThinBlock | InvType::XThinBlock => {
				let mut blocks = self.blocks.lock();
				if let Some(mut record) = blocks.map.remove(&inv.hash) {
					if blocks.cursor == Some(inv.hash) {
						blocks.cursor = None;
					}
					drop(blocks);
					self.cleanup_record(&mut record);
				}
			}
		}
	}

	/// A peer said no. The record stays; the rejection is counted and
	/// the in-flight bookkeeping unwound (transactions only, as only the
	/// transaction pass accounts in-flight).
	pub fn rejected(&self, inv: &Inv, peer: &Arc<Peer>, reason: RejectReason) {
		match inv.kind {
			InvType::Tx => {
				let mut shard = self.tx_map.accessor(&inv.hash);
				let record = match shard.get_mut(&inv.hash) {
					Some(record) => record,
					None => {
						debug!("Item already removed. Unknown txn rejected {}", inv);
						return;
					}
				};
				if record.outstanding_reqs > 0 {
					record.outstanding_reqs -= 1;
					FetchStats::sub(&self.stats.in_flight, 1);
				}
				FetchStats::add(&self.stats.rejected_txns, 1);
			}
			InvType::Block | InvType::ThinBlock | InvType::XThinBlock => {
				let blocks = self.blocks.lock();
				if !blocks.map.contains_key(&inv.hash) {
					debug!("Item already removed. Unknown block rejected {}", inv);
					return;
				}
			}
		}
		match reason {
			RejectReason::Malformed
			| RejectReason::Invalid
			| RejectReason::Obsolete
			| RejectReason::Checkpoint
			| RejectReason::InsufficientFee
			| RejectReason::Duplicate
			| RejectReason::Nonstandard
			| RejectReason::Dust => {
				debug!("{} rejected by {} ({:?})", inv, peer.log_name(), reason);
			}
			RejectReason::Other(code) => {
				debug!("Unknown rejection code [{:#x}] for {}.", code, inv);
			}
		}
	}

	/// A peer went away. Every record awaiting it is reset so the next
	/// scheduler pass re-requests elsewhere; its source entries are
	/// dropped lazily when the scheduler next touches them.
	pub fn remove_source(&self, peer: &Arc<Peer>) {
		let id = peer.id();
		let mut tx = 0;
		let mut blk = 0;
		self.tx_map.for_each_mut(|_, record| {
			if record.receiving_from == Some(id) {
				Self::abandon_await(record);
				tx += 1;
			}
		});
		{
			let mut blocks = self.blocks.lock();
			for record in blocks.map.values_mut() {
				if record.receiving_from == Some(id) {
					Self::abandon_await(record);
					blk += 1;
				}
			}
		}
		debug!(
			"Removed source {}, outstanding: {} tx, {} blk",
			peer.log_name(),
			tx,
			blk
		);
	}

	fn abandon_await(record: &mut ObjectRecord) {
		record.last_request_time = 0; // request aborted
		record.outstanding_reqs = record.outstanding_reqs.saturating_sub(1);
		record.receiving_from = None;
		// In case processing data from this node caused a pause, we must
		// resume. This could lead to a double request.
		record.paused = 0;
	}

	/// Stop scheduling this object until a matching `resume`.
	pub fn pause(&self, inv: &Inv) {
		self.with_record_mut(inv, |record| {
			record.paused += 1;
			debug!("{} paused (count {})", record.inv, record.paused);
		});
	}

	/// Undo one `pause`. Saturating; resuming an unpaused object is a
	/// no-op.
	pub fn resume(&self, inv: &Inv) {
		self.with_record_mut(inv, |record| {
			record.paused = record.paused.saturating_sub(1);
			debug!("{} resumed (count {})", record.inv, record.paused);
		});
	}

	fn with_record_mut<F>(&self, inv: &Inv, f: F)
	where
		F: FnOnce(&mut ObjectRecord),
	{
		match inv.kind {
			InvType::Tx => {
				let mut shard = self.tx_map.accessor(&inv.hash);
				if let Some(record) = shard.get_mut(&inv.hash) {
					f(record);
				}
			}
			InvType::Block | InvType::ThinBlock | InvType::XThinBlock => {
				let mut blocks = self.blocks.lock();
				if let Some(record) = blocks.map.get_mut(&inv.hash) {
					f(record);
				}
			}
		}
	}

	/// Bookkeeping copy of a tracked transaction record.
	pub fn tx_record_view(&self, hash: &Hash) -> Option<RecordView> {
		self.tx_map.accessor(hash).get(hash).map(RecordView::of)
	}

	/// Bookkeeping copy of a tracked block record.
	pub fn block_record_view(&self, hash: &Hash) -> Option<RecordView> {
		self.blocks.lock().map.get(hash).map(RecordView::of)
	}

	/// Sum of `outstanding_reqs` over all tracked transactions; equals
	/// the in-flight counter whenever the manager is quiescent.
	pub fn tx_outstanding_total(&self) -> i64 {
		let mut total = 0i64;
		self.tx_map.for_each_mut(|_, record| {
			total += record.outstanding_reqs as i64;
		});
		total
	}

	/// Number of tracked block records.
	pub fn block_count(&self) -> usize {
		self.blocks.lock().map.len()
	}

	/// Number of tracked transaction records.
	pub fn tx_count(&self) -> usize {
		self.tx_map.len()
	}

	/// Driver tick: issue whatever requests are due. Any thread may call
	/// this; concurrent ticks are tolerated (the block pass skips if
	/// contended, the transaction pass touches a single shard).
	pub fn send_requests(&self) {
		let nearly_synced = self.adapter.is_nearly_synced();

		// If we're doing IBD or traffic shaping is on, stretch the retry
		// intervals; those objects can take much longer to download.
		let mut blk_retry = self.config.min_blk_request_retry_usec as i64;
		let mut tx_retry = self.config.min_tx_request_retry_usec as i64;
		if (!nearly_synced && !global::is_regtest()) || self.adapter.traffic_shaping_enabled() {
			blk_retry *= IBD_BLK_RETRY_FACTOR as i64;
			tx_retry *= IBD_TX_RETRY_FACTOR as i64;
		}

		self.send_block_requests(blk_retry, nearly_synced);
		self.send_tx_requests(tx_retry);
	}

	fn send_block_requests(&self, retry_interval: i64, nearly_synced: bool) {
		// don't wait around if some other thread is already sending
		// block requests
		let mut blocks = match self.blocks.try_lock() {
			Some(guard) => guard,
			None => return,
		};

		// Walk a snapshot of the keys, resuming at the stored cursor.
		// Records are re-looked-up per key: the lock is released around
		// peer I/O below and anything may have changed.
		let mut keys: Vec<Hash> = blocks.map.keys().cloned().collect();
		if let Some(cursor) = blocks.cursor {
			if let Some(pos) = keys.iter().position(|k| *k == cursor) {
				keys.rotate_left(pos);
			}
		}

		for (idx, key) in keys.iter().enumerate() {
			// advance the cursor before touching the record, so erasing
			// it cannot strand the cursor
			blocks.cursor = keys.get(idx + 1).cloned();

			let now = now_micros();
			let record = match blocks.map.get_mut(key) {
				Some(record) => record,
				None => continue,
			};
			// if never requested then last_request_time == 0 and the
			// interval check always passes
			if record.paused > 0 || now - record.last_request_time <= retry_interval {
				continue;
			}

			// Go through the sources looking for the first usable peer,
			// dropping our reference to each one discarded.
			let mut next: Option<Arc<Peer>> = None;
			while let Some(entry) = record.pop_source() {
				if entry.peer.flagged_for_disconnect() {
					debug!(
						"{} removed block ref to {} (on disconnect).",
						record.inv,
						entry.peer.log_name()
					);
					entry.peer.release();
					continue;
				}
				// Waiting 5 seconds for a timeout is fine once synced,
				// but waiting on a slow node during IBD really slows the
				// whole process down.
				if !nearly_synced && !self.is_ping_acceptable(&entry.peer) {
					debug!(
						"{} removed block ref to {} (bad ping time).",
						record.inv,
						entry.peer.log_name()
					);
					entry.peer.release();
					continue;
				}
				next = Some(entry.peer);
				break;
			}

			match next {
				Some(peer) => {
					if record.last_request_time > 0 {
						debug!("Block request timeout for {}. Retrying", record.inv);
					}
					let inv = record.inv;
					let then = record.last_request_time;
					record.outstanding_reqs += 1;
					record.last_request_time = now;
					record.receiving_from = Some(peer.id());

					// the record reference dies with the lock; refetch
					// by hash afterwards
					drop(blocks);
					let requested = self.request_block(&peer, &inv, nearly_synced);
					blocks = self.blocks.lock();

					if !requested {
						// Could not request the block: find the record
						// again, if it still exists, and write the
						// rollback through the map slot.
						if let Some(record) = blocks.map.get_mut(&inv.hash) {
							record.outstanding_reqs = record.outstanding_reqs.saturating_sub(1);
							record.last_request_time = then;
						}
					}

					// The source was popped off the list; drop our
					// reference rather than remembering the peer.
					peer.release();
				}
				None => {
					// Sources ran dry with nothing usable; nothing can
					// be done, so drop the record.
					debug!("Block {} has no available sources. Removing", record.inv);
					if let Some(mut record) = blocks.map.remove(key) {
						self.cleanup_record(&mut record);
					}
				}
			}
		}
	}

	fn send_tx_requests(&self, retry_interval: i64) {
		let shard_idx = thread_rng().gen_range(0, NUM_SHARDS);
		let mut shard = self.tx_map.shard(shard_idx);
		let now = now_micros();

		let keys: Vec<Hash> = shard.keys().cloned().collect();
		for key in keys {
			let mut remove = false;
			if let Some(record) = shard.get_mut(&key) {
				// if never requested then last_request_time == 0 and the
				// interval check always passes
				if record.paused > 0 || now - record.last_request_time <= retry_interval {
					continue;
				}
				if record.last_request_time > 0 {
					// a retry: the earlier request was presumably
					// dropped, though we can never be sure it isn't just
					// delayed, so this is not authoritative
					debug!("Request timeout for {}. Retrying", record.inv);
					FetchStats::add(&self.stats.dropped_txns, 1);
				}

				if !self.request_pacer.try_leak(1) {
					break; // no more send slots available
				}

				if record.sources.is_empty() {
					// we give up requesting it if there are no sources
					remove = true;
				} else {
					let mut next = None;
					while let Some(entry) = record.pop_source() {
						if entry.peer.flagged_for_disconnect() {
							entry.peer.release();
							continue;
						}
						next = Some(entry);
						break;
					}
					match next {
						Some(entry) => {
							record.outstanding_reqs += 1;
							record.last_request_time = now;
							record.receiving_from = Some(entry.peer.id());
							if let Err(e) = entry.peer.ask_for(record.inv) {
								// transient; the retry interval covers it
								debug!(
									"Skipped request to {}: {:?}",
									entry.peer.log_name(),
									e
								);
							}
							// keep the source around, at a worse rank, so
							// a timed-out request can be retried
							record.requeue_source(entry);
							FetchStats::add(&self.stats.in_flight, 1);
						}
						None => {
							// every remaining source was gone; orphaned
							remove = true;
						}
					}
				}
			}
			if remove {
				if let Some(mut record) = shard.remove(&key) {
					self.cleanup_record(&mut record);
				}
			}
		}
	}

	fn is_ping_acceptable(&self, peer: &Arc<Peer>) -> bool {
		peer.ping_micros() < self.config.acceptable_ping_usec as i64
	}

	/// Issue the actual block fetch to a chosen peer, deciding between
	/// headers-first, xthin and a plain getdata. Returns whether any
	/// block request went out; on false the caller rolls its bookkeeping
	/// back.
	fn request_block(&self, peer: &Arc<Peer>, inv: &Inv, nearly_synced: bool) -> bool {
		// First request the headers preceding the announced block, so the
		// header chain leading up to it is already validated by the time
		// the block arrives. During IBD the sync process takes care of
		// its own headers; regtest always wants them.
		if nearly_synced || global::is_regtest() {
			if !self.adapter.header_known(&inv.hash) {
				debug!("getheaders for {} to peer {}", inv.hash, peer.log_name());
				if peer
					.send_getheaders(self.adapter.best_header_locator(), inv.hash)
					.is_err()
				{
					return false;
				}
			}
		}

		if self.config.thin_blocks && nearly_synced {
			let thin_preferred = self.adapter.has_dedicated_thin_peer()
				|| self.adapter.thin_timer_elapsed(&inv.hash);
			// only one thin block can be requested per peer at a time
			let peer_can_thin = peer.thin_block_capable() && peer.thin_blocks_in_flight() < 1;
			if thin_preferred {
				// must download an xthin from a capable peer
				if peer_can_thin {
					return self.send_xthin(peer, &inv.hash);
				}
				false // no block was requested
			} else if peer_can_thin {
				self.send_xthin(peer, &inv.hash)
			} else {
				self.send_plain_block(peer, &inv.hash)
			}
		} else {
			self.send_plain_block(peer, &inv.hash)
		}
	}

	fn send_xthin(&self, peer: &Arc<Peer>, hash: &Hash) -> bool {
		let filter = BloomFilter::seeded(&self.adapter.orphan_hashes(), hash);
		peer.add_thin_block_in_flight(hash);
		match peer.send_get_xthin(*hash, filter) {
			Ok(()) => {
				debug!("Requesting xthinblock {} from peer {}", hash, peer.log_name());
				true
			}
			Err(e) => {
				peer.remove_thin_block_in_flight(hash);
				debug!("Skipped xthin request to {}: {:?}", peer.log_name(), e);
				false
			}
		}
	}

	fn send_plain_block(&self, peer: &Arc<Peer>, hash: &Hash) -> bool {
		match peer.ask_for(Inv::block(*hash)) {
			Ok(()) => {
				debug!("Requesting block {} from peer {}", hash, peer.log_name());
				true
			}
			Err(e) => {
				debug!("Skipped block request to {}: {:?}", peer.log_name(), e);
				false
			}
		}
	}

	/// Unwind one record: stats (transactions only), then every source
	/// reference. The record must already be out of its map.
	fn cleanup_record(&self, record: &mut ObjectRecord) {
		if record.inv.kind == InvType::Tx {
			// anything deleted from the map will be ignored, so reduce
			// in-flight by every request made for this object
			FetchStats::sub(&self.stats.in_flight, record.outstanding_reqs as i64);
			FetchStats::sub(&self.stats.dropped_txns, record.outstanding_reqs as i64 - 1);
			FetchStats::sub(&self.stats.pending_txns, 1);
		}
		for entry in record.sources.drain(..) {
			entry.peer.release();
		}
	}
}
