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

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};

use crate::core::core::hash::Hash;
use crate::core::core::inv::{Inv, InvType};
use crate::msg::{BloomFilter, Msg};
use crate::types::{Error, PeerId, PeerInfo, Protocol};
use crate::util::Mutex;

/// Running accumulator of transaction-request round-trip latencies for
/// one peer. The request manager records a sample on every transaction
/// receipt; source ranking reads the average.
pub struct TxLatency {
	samples: Mutex<(u64, u64)>, // (count, total micros)
}

impl TxLatency {
	fn new() -> TxLatency {
		TxLatency {
			samples: Mutex::new((0, 0)),
		}
	}

	/// Record one round-trip time in microseconds. Nonsense negative
	/// samples (clock moved) are dropped.
	pub fn record(&self, micros: i64) {
		if micros < 0 {
			return;
		}
		let mut samples = self.samples.lock();
		samples.0 += 1;
		samples.1 += micros as u64;
	}

	/// Average recorded latency in microseconds; 0 when no data has been
	/// collected yet.
	pub fn average_micros(&self) -> i64 {
		let samples = self.samples.lock();
		if samples.0 == 0 {
			0
		} else {
			(samples.1 / samples.0) as i64
		}
	}

	/// Number of samples recorded.
	pub fn sample_count(&self) -> u64 {
		self.samples.lock().0
	}
}

/// Handle on a connected peer. Connection lifecycle is the server's
/// business; the handle exposes identity, capability and state queries,
/// an explicit protocol-level reference count, and the outbound message
/// surface.
///
/// The reference count tracks how many request-manager source entries
/// currently point at this peer. It is bookkeeping the engines maintain
/// on every path that stores or drops a source entry; the memory itself
/// is owned by `Arc`.
pub struct Peer {
	/// Static peer information.
	pub info: PeerInfo,
	proto: Box<dyn Protocol>,
	refs: AtomicI32,
	disconnect: AtomicBool,
	ping_micros: AtomicI64,
	thin_in_flight: Mutex<HashSet<Hash>>,
	tx_latency: TxLatency,
}

impl Peer {
	/// Wrap a connection (anything implementing `Protocol`) into a peer
	/// handle.
	pub fn new(info: PeerInfo, proto: Box<dyn Protocol>) -> Peer {
		Peer {
			info,
			proto,
			refs: AtomicI32::new(0),
			disconnect: AtomicBool::new(false),
			ping_micros: AtomicI64::new(0),
			thin_in_flight: Mutex::new(HashSet::new()),
			tx_latency: TxLatency::new(),
		}
	}

	/// The peer's stable identifier.
	pub fn id(&self) -> PeerId {
		self.info.id
	}

	/// Display name for logs: user agent plus id.
	pub fn log_name(&self) -> String {
		format!("{} ({})", self.info.user_agent, self.info.id)
	}

	/// Take one protocol-level reference on this peer.
	pub fn add_ref(&self) {
		self.refs.fetch_add(1, Ordering::SeqCst);
	}

	/// Drop one protocol-level reference on this peer.
	pub fn release(&self) {
		let prev = self.refs.fetch_sub(1, Ordering::SeqCst);
		debug_assert!(prev > 0, "peer {} released below zero", self.info.id);
	}

	/// Number of protocol-level references currently held.
	pub fn ref_count(&self) -> i32 {
		self.refs.load(Ordering::SeqCst)
	}

	/// Whether the server has flagged this peer for disconnection.
	pub fn flagged_for_disconnect(&self) -> bool {
		self.disconnect.load(Ordering::Relaxed)
	}

	/// Flag this peer for disconnection; the request manager stops
	/// selecting it as a source immediately.
	pub fn flag_for_disconnect(&self) {
		self.disconnect.store(true, Ordering::Relaxed);
	}

	/// Whether this peer advertises thin-block support.
	pub fn thin_block_capable(&self) -> bool {
		self.info.capabilities.contains(crate::types::Capabilities::THIN_BLOCKS)
	}

	/// Most recent ping round-trip in microseconds (0 when unmeasured).
	pub fn ping_micros(&self) -> i64 {
		self.ping_micros.load(Ordering::Relaxed)
	}

	/// Update the measured ping time.
	pub fn set_ping_micros(&self, micros: i64) {
		self.ping_micros.store(micros, Ordering::Relaxed);
	}

	/// Number of thin blocks currently being downloaded from this peer.
	pub fn thin_blocks_in_flight(&self) -> usize {
		self.thin_in_flight.lock().len()
	}

	/// Mark a thin block as being downloaded from this peer. Returns
	/// false if it already was.
	pub fn add_thin_block_in_flight(&self, hash: &Hash) -> bool {
		self.thin_in_flight.lock().insert(*hash)
	}

	/// Clear a thin block from the in-flight set (downloaded, failed or
	/// abandoned).
	pub fn remove_thin_block_in_flight(&self, hash: &Hash) -> bool {
		self.thin_in_flight.lock().remove(hash)
	}

	/// The transaction-request latency accumulator for this peer.
	pub fn tx_latency(&self) -> &TxLatency {
		&self.tx_latency
	}

	/// Queue a getdata for a single object on this peer.
	pub fn ask_for(&self, inv: Inv) -> Result<(), Error> {
		trace!("asking {} for {}", self.log_name(), inv);
		self.proto.send(Msg::GetData(vec![inv]))
	}

	/// Queue a getheaders anchored at the given locator.
	pub fn send_getheaders(&self, locator: Vec<Hash>, stop_hash: Hash) -> Result<(), Error> {
		self.proto.send(Msg::GetHeaders { locator, stop_hash })
	}

	/// Queue an xthin request for the given block with a filter of
	/// transactions we already hold.
	pub fn send_get_xthin(&self, hash: Hash, filter: BloomFilter) -> Result<(), Error> {
		let inv = Inv {
			kind: InvType::XThinBlock,
			hash,
		};
		self.proto.send(Msg::GetXThin(inv, filter))
	}
}
