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

//! Node-side glue. The surrounding node feeds network events in
//! (advertisements, received objects, rejections, disconnects, weak
//! blocks) and runs the request driver; everything else happens inside
//! the two engines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bittern_api::Foreign;
use bittern_core::core::block::Block;
use bittern_core::core::inv::Inv;
use bittern_core::global::{self, ChainTypes};
use bittern_fetch::{ChainAdapter, FetchConfig, RejectReason, RequestManager};
use bittern_p2p::{Peer, Peers};
use bittern_util::LoggingConfig;
use bittern_weak::{WeakBlockCache, WeakConfig};

fn default_request_tick_millis() -> u64 {
	100
}

/// Combined configuration for the acquisition subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
	/// Chain the node runs against.
	#[serde(default)]
	pub chain_type: ChainTypes,
	/// Request manager configuration.
	#[serde(default)]
	pub fetch: FetchConfig,
	/// Weak-block cache configuration.
	#[serde(default)]
	pub weak: WeakConfig,
	/// Logging configuration.
	#[serde(default)]
	pub logging: LoggingConfig,
	/// Cadence of the request driver thread in milliseconds.
	#[serde(default = "default_request_tick_millis")]
	pub request_tick_millis: u64,
}

impl Default for NodeConfig {
	fn default() -> NodeConfig {
		NodeConfig {
			chain_type: ChainTypes::default(),
			fetch: FetchConfig::default(),
			weak: WeakConfig::default(),
			logging: LoggingConfig::default(),
			request_tick_millis: default_request_tick_millis(),
		}
	}
}

/// One instance per node: the peer registry plus the two acquisition
/// engines, with the event entry points the server calls.
pub struct Node {
	/// Connected peers.
	pub peers: Arc<Peers>,
	/// The request manager.
	pub fetch: Arc<RequestManager>,
	/// The weak-block cache.
	pub weak: Arc<WeakBlockCache>,
}

impl Node {
	/// Assemble the subsystem against the node's chain state.
	pub fn new(config: NodeConfig, adapter: Arc<dyn ChainAdapter>) -> Node {
		global::set_chain_type(config.chain_type);
		Node {
			peers: Arc::new(Peers::new()),
			fetch: Arc::new(RequestManager::new(config.fetch, adapter)),
			weak: Arc::new(WeakBlockCache::new(config.weak)),
		}
	}

	/// A peer finished its handshake.
	pub fn peer_connected(&self, peer: Peer) -> Arc<Peer> {
		self.peers.add_connected(peer)
	}

	/// A peer's connection is going away: abandon whatever we were
	/// awaiting from it and drop it from the registry.
	pub fn peer_disconnected(&self, peer: &Arc<Peer>) {
		peer.flag_for_disconnect();
		self.fetch.remove_source(peer);
		self.peers.remove_peer(peer.id());
	}

	/// A peer advertised an object.
	pub fn inv_advertised(&self, inv: &Inv, peer: &Arc<Peer>, priority: u32) {
		self.fetch.ask_for(inv, peer, priority);
	}

	/// A peer advertised a batch of objects.
	pub fn invs_advertised(&self, invs: &[Inv], peer: &Arc<Peer>, priority: u32) {
		self.fetch.ask_for_all(invs, peer, priority);
	}

	/// An object we asked for arrived.
	pub fn object_received(&self, inv: &Inv, peer: &Arc<Peer>, bytes: usize) {
		self.fetch.received(inv, peer, bytes);
	}

	/// An object turned out to be already known through another channel.
	pub fn object_already_known(&self, inv: &Inv) {
		self.fetch.already_received(inv);
	}

	/// A peer rejected an object we asked it for.
	pub fn object_rejected(&self, inv: &Inv, peer: &Arc<Peer>, reason: RejectReason) {
		self.fetch.rejected(inv, peer, reason);
	}

	/// A weak block arrived from the network. Returns whether it was
	/// stored (false when disabled or already known).
	pub fn weak_block_received(&self, block: &Block) -> bool {
		if !self.weak.enabled() {
			debug!("Weak block processing disabled; ignoring {}.", block.hash());
			return false;
		}
		self.weak.store_weakblock(block)
	}

	/// A strong block was connected; the weak-block generation it closed
	/// is no longer needed.
	pub fn strong_block_connected(&self) {
		self.weak.reset();
	}

	/// One driver tick.
	pub fn tick(&self) {
		self.fetch.send_requests();
	}

	/// Observability API handle over the weak-block cache.
	pub fn weak_api(&self) -> Foreign {
		Foreign::new(Arc::downgrade(&self.weak))
	}
}

/// Run the request driver in a named background thread until `stop` is
/// raised.
pub fn run_requester(
	fetch: Arc<RequestManager>,
	tick_millis: u64,
	stop: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<()>> {
	thread::Builder::new()
		.name("requester".to_string())
		.spawn(move || {
			info!("requester thread started ({} ms tick)", tick_millis);
			while !stop.load(Ordering::Relaxed) {
				fetch.send_requests();
				thread::sleep(Duration::from_millis(tick_millis));
			}
			info!("requester thread stopped");
		})
}
