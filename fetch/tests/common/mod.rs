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

//! Fixtures shared by the request-manager scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use bittern_core::core::hash::{Hash, Hashed};
use bittern_fetch::{DummyChainAdapter, FetchConfig, RequestManager};
use bittern_p2p::{Capabilities, Peer, PeerInfo, TrackingProtocol};

pub fn hash_of(n: u8) -> Hash {
	vec![n].hash()
}

pub fn peer_with(id: u64, capabilities: Capabilities) -> (Arc<TrackingProtocol>, Arc<Peer>) {
	let proto = Arc::new(TrackingProtocol::new());
	let peer = Arc::new(Peer::new(
		PeerInfo {
			id,
			user_agent: format!("test-peer-{}", id),
			capabilities,
		},
		Box::new(proto.clone()),
	));
	(proto, peer)
}

pub fn manager() -> (Arc<DummyChainAdapter>, RequestManager) {
	let adapter = Arc::new(DummyChainAdapter::new());
	let rm = RequestManager::new(FetchConfig::default(), adapter.clone());
	(adapter, rm)
}

/// Manager whose retry intervals never elapse within a test run. The
/// mock clock is process-global, so tests that count exact request
/// numbers use this to stay immune to other tests advancing it.
pub fn manager_slow() -> (Arc<DummyChainAdapter>, RequestManager) {
	let adapter = Arc::new(DummyChainAdapter::new());
	let config = FetchConfig {
		min_tx_request_retry_usec: u32::max_value(),
		min_blk_request_retry_usec: u32::max_value(),
		..FetchConfig::default()
	};
	let rm = RequestManager::new(config, adapter.clone());
	(adapter, rm)
}

/// Drive the scheduler until the random shard pick has certainly visited
/// every shard. Objects already requested are skipped by the retry
/// interval, so over-ticking cannot double-send.
pub fn tick(rm: &RequestManager) {
	for _ in 0..512 {
		rm.send_requests();
	}
}
