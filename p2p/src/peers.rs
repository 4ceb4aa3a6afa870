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

use std::collections::HashMap;
use std::sync::Arc;

use crate::peer::Peer;
use crate::types::PeerId;
use crate::util::RwLock;

/// Registry of currently connected peers, keyed by peer id.
pub struct Peers {
	peers: RwLock<HashMap<PeerId, Arc<Peer>>>,
}

impl Peers {
	/// An empty registry.
	pub fn new() -> Peers {
		Peers {
			peers: RwLock::new(HashMap::new()),
		}
	}

	/// Adds the peer to our internal peer mapping. Note that the peer is
	/// still returned so the server can run it.
	pub fn add_connected(&self, peer: Peer) -> Arc<Peer> {
		debug!("Saving newly connected peer {}.", peer.log_name());
		let id = peer.id();
		let apeer = Arc::new(peer);
		{
			let mut peers = self.peers.write();
			peers.insert(id, apeer.clone());
		}
		apeer
	}

	/// Get a peer we're connected to by id.
	pub fn get_peer(&self, id: PeerId) -> Option<Arc<Peer>> {
		self.peers.read().get(&id).cloned()
	}

	/// Whether the given id belongs to a connected peer.
	pub fn is_known(&self, id: PeerId) -> bool {
		self.peers.read().contains_key(&id)
	}

	/// All peers we are currently connected to.
	pub fn connected_peers(&self) -> Vec<Arc<Peer>> {
		self.peers.read().values().cloned().collect()
	}

	/// Number of peers we're currently connected to.
	pub fn peer_count(&self) -> u32 {
		self.peers.read().len() as u32
	}

	/// Drop a peer from the registry, typically after disconnect cleanup
	/// has run. The handle stays alive while anything still holds it.
	pub fn remove_peer(&self, id: PeerId) -> Option<Arc<Peer>> {
		let removed = self.peers.write().remove(&id);
		if let Some(ref peer) = removed {
			debug!("Removed peer {} from registry.", peer.log_name());
		}
		removed
	}

	/// Iterate over the peer list and prune all peers flagged for
	/// disconnection.
	pub fn clean_peers(&self) {
		let rm: Vec<PeerId> = self
			.connected_peers()
			.into_iter()
			.filter(|peer| peer.flagged_for_disconnect())
			.map(|peer| peer.id())
			.collect();

		let mut peers = self.peers.write();
		for id in rm {
			peers.remove(&id);
		}
	}
}
