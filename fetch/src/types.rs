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

//! Configuration and the consumed chain-state interface for the request
//! manager.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::core::hash::Hash;
use crate::util::Mutex;

/// After this much latency (in microseconds) we don't care how much
/// worse a source gets; desirability bottoms out.
pub const MAX_SOURCE_LATENCY_USEC: i64 = 10_000_000;

/// Latency assigned to a peer we never requested a transaction from,
/// for ranking purposes.
pub const UNMEASURED_LATENCY_USEC: i64 = 80_000;

/// Retry-interval stretch for block requests while not nearly synced or
/// while traffic shaping is on.
pub const IBD_BLK_RETRY_FACTOR: u32 = 6;

/// Retry-interval stretch for transaction requests under the same
/// conditions. Block download gets the bandwidth during IBD.
pub const IBD_TX_RETRY_FACTOR: u32 = 24;

/// Why a peer said no to an object we asked it for. Recorded, never
/// fatal; unrecognized codes arrive as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
	/// The object could not be parsed.
	Malformed,
	/// The object failed validation.
	Invalid,
	/// The object belongs to an obsolete protocol version.
	Obsolete,
	/// The object conflicts with a checkpoint.
	Checkpoint,
	/// Fee below the peer's relay threshold.
	InsufficientFee,
	/// The peer already had the object.
	Duplicate,
	/// The object is non-standard.
	Nonstandard,
	/// Output below the dust threshold.
	Dust,
	/// Any unrecognized wire code.
	Other(u8),
}

fn default_tx_retry() -> u32 {
	5_000_000
}
fn default_blk_retry() -> u32 {
	30_000_000
}
fn default_acceptable_ping() -> u32 {
	25_000
}
fn default_request_pacer_max() -> u32 {
	32_768
}
fn default_request_pacer_avg() -> u32 {
	16_384
}
fn default_block_pacer_max() -> u32 {
	64
}
fn default_block_pacer_avg() -> u32 {
	32
}
fn default_thin_blocks() -> bool {
	true
}

/// Request manager configuration. All knobs have sensible defaults;
/// they exist for operators with unusual link characteristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
	/// Base interval before a transaction request is retried, in
	/// microseconds.
	#[serde(default = "default_tx_retry")]
	pub min_tx_request_retry_usec: u32,
	/// Base interval before a block request is retried, in microseconds.
	#[serde(default = "default_blk_retry")]
	pub min_blk_request_retry_usec: u32,
	/// Per-peer ping threshold applied to block sources during initial
	/// block download, in microseconds.
	#[serde(default = "default_acceptable_ping")]
	pub acceptable_ping_usec: u32,
	/// Transaction request pacer: maximum burst.
	#[serde(default = "default_request_pacer_max")]
	pub request_pacer_max: u32,
	/// Transaction request pacer: average requests per second.
	#[serde(default = "default_request_pacer_avg")]
	pub request_pacer_avg: u32,
	/// Block request pacer: maximum burst.
	#[serde(default = "default_block_pacer_max")]
	pub block_pacer_max: u32,
	/// Block request pacer: average requests per second.
	#[serde(default = "default_block_pacer_avg")]
	pub block_pacer_avg: u32,
	/// Whether to request thin blocks from capable peers.
	#[serde(default = "default_thin_blocks")]
	pub thin_blocks: bool,
}

impl Default for FetchConfig {
	fn default() -> FetchConfig {
		FetchConfig {
			min_tx_request_retry_usec: default_tx_retry(),
			min_blk_request_retry_usec: default_blk_retry(),
			acceptable_ping_usec: default_acceptable_ping(),
			request_pacer_max: default_request_pacer_max(),
			request_pacer_avg: default_request_pacer_avg(),
			block_pacer_max: default_block_pacer_max(),
			block_pacer_avg: default_block_pacer_avg(),
			thin_blocks: default_thin_blocks(),
		}
	}
}

/// Chain state the request manager consumes but does not maintain. The
/// node's chain component implements this; tests use
/// [`DummyChainAdapter`].
pub trait ChainAdapter: Send + Sync {
	/// Whether the best known tip is within a small age gap of current
	/// time.
	fn is_nearly_synced(&self) -> bool;

	/// Whether outbound traffic shaping is enabled.
	fn traffic_shaping_enabled(&self) -> bool {
		false
	}

	/// Whether the header for this block hash is already known.
	fn header_known(&self, hash: &Hash) -> bool;

	/// Locator anchored at the current best header, most recent first.
	fn best_header_locator(&self) -> Vec<Hash>;

	/// Hashes currently in the orphan transaction pool; seeds the filter
	/// sent along with xthin requests.
	fn orphan_hashes(&self) -> Vec<Hash>;

	/// Whether a dedicated thin-block peer is configured.
	fn has_dedicated_thin_peer(&self) -> bool {
		false
	}

	/// Whether the thin-block preference timer has elapsed for this
	/// block hash.
	fn thin_timer_elapsed(&self, hash: &Hash) -> bool;
}

/// Scriptable `ChainAdapter` for tests: every answer is settable.
pub struct DummyChainAdapter {
	nearly_synced: AtomicBool,
	traffic_shaping: AtomicBool,
	dedicated_thin_peer: AtomicBool,
	thin_timer: AtomicBool,
	headers: Mutex<HashSet<Hash>>,
	orphans: Mutex<Vec<Hash>>,
	locator: Mutex<Vec<Hash>>,
}

impl DummyChainAdapter {
	/// A nearly-synced chain with no known headers and no orphans.
	pub fn new() -> DummyChainAdapter {
		DummyChainAdapter {
			nearly_synced: AtomicBool::new(true),
			traffic_shaping: AtomicBool::new(false),
			dedicated_thin_peer: AtomicBool::new(false),
			thin_timer: AtomicBool::new(false),
			headers: Mutex::new(HashSet::new()),
			orphans: Mutex::new(vec![]),
			locator: Mutex::new(vec![]),
		}
	}

	/// Set the near-synced answer.
	pub fn set_nearly_synced(&self, synced: bool) {
		self.nearly_synced.store(synced, Ordering::Relaxed);
	}

	/// Set the traffic-shaping answer.
	pub fn set_traffic_shaping(&self, shaping: bool) {
		self.traffic_shaping.store(shaping, Ordering::Relaxed);
	}

	/// Set whether a dedicated thin-block peer is configured.
	pub fn set_dedicated_thin_peer(&self, dedicated: bool) {
		self.dedicated_thin_peer.store(dedicated, Ordering::Relaxed);
	}

	/// Set whether the thin-block timer reads as elapsed.
	pub fn set_thin_timer_elapsed(&self, elapsed: bool) {
		self.thin_timer.store(elapsed, Ordering::Relaxed);
	}

	/// Mark a header as known.
	pub fn add_header(&self, hash: Hash) {
		self.headers.lock().insert(hash);
	}

	/// Replace the orphan pool contents.
	pub fn set_orphans(&self, orphans: Vec<Hash>) {
		*self.orphans.lock() = orphans;
	}

	/// Replace the best-header locator.
	pub fn set_best_header_locator(&self, locator: Vec<Hash>) {
		*self.locator.lock() = locator;
	}
}

impl ChainAdapter for DummyChainAdapter {
	fn is_nearly_synced(&self) -> bool {
		self.nearly_synced.load(Ordering::Relaxed)
	}

	fn traffic_shaping_enabled(&self) -> bool {
		self.traffic_shaping.load(Ordering::Relaxed)
	}

	fn header_known(&self, hash: &Hash) -> bool {
		self.headers.lock().contains(hash)
	}

	fn best_header_locator(&self) -> Vec<Hash> {
		self.locator.lock().clone()
	}

	fn orphan_hashes(&self) -> Vec<Hash> {
		self.orphans.lock().clone()
	}

	fn has_dedicated_thin_peer(&self) -> bool {
		self.dedicated_thin_peer.load(Ordering::Relaxed)
	}

	fn thin_timer_elapsed(&self, _hash: &Hash) -> bool {
		self.thin_timer.load(Ordering::Relaxed)
	}
}
