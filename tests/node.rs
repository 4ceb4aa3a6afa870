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

//! End-to-end scenarios through the facade: advertise, fetch, receive,
//! fail over, plus the weak-block flow down to the observability API.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bittern::core::core::block::{Block, BlockHeader};
use bittern::core::core::hash::Hashed;
use bittern::core::core::inv::Inv;
use bittern::core::core::transaction::Transaction;
use bittern::fetch::{DummyChainAdapter, FetchConfig, RequestManager};
use bittern::p2p::{Capabilities, Msg, Peer, PeerInfo, TrackingProtocol};
use bittern::weak::WeakConfig;
use bittern::{run_requester, Node, NodeConfig};

fn slow_config() -> NodeConfig {
	NodeConfig {
		fetch: FetchConfig {
			min_tx_request_retry_usec: u32::max_value(),
			min_blk_request_retry_usec: u32::max_value(),
			..FetchConfig::default()
		},
		..NodeConfig::default()
	}
}

fn node(config: NodeConfig) -> (Arc<DummyChainAdapter>, Node) {
	let adapter = Arc::new(DummyChainAdapter::new());
	(adapter.clone(), Node::new(config, adapter))
}

fn raw_peer(id: u64, capabilities: Capabilities) -> (Arc<TrackingProtocol>, Peer) {
	let proto = Arc::new(TrackingProtocol::new());
	let peer = Peer::new(
		PeerInfo {
			id,
			user_agent: format!("e2e-peer-{}", id),
			capabilities,
		},
		Box::new(proto.clone()),
	);
	(proto, peer)
}

fn tx(tag: &str) -> Transaction {
	Transaction::new(tag.as_bytes().to_vec())
}

fn block(nonce: u64, txs: Vec<Transaction>) -> Block {
	let mut header = BlockHeader::default();
	header.nonce = nonce;
	Block::new(header, txs)
}

/// Enough ticks that the random transaction shard pick certainly visited
/// every shard.
fn tick(node: &Node) {
	for _ in 0..512 {
		node.tick();
	}
}

fn getdata_count(sent: &[Msg], inv: &Inv) -> usize {
	sent.iter()
		.filter(|m| match m {
			Msg::GetData(invs) => invs.contains(inv),
			_ => false,
		})
		.count()
}

#[test]
fn advertise_fetch_receive() {
	let (_adapter, node) = node(slow_config());
	let (proto, peer) = raw_peer(1, Capabilities::default());
	let peer = node.peer_connected(peer);
	let inv = Inv::tx(tx("payment").hash());

	node.inv_advertised(&inv, &peer, 0);
	tick(&node);
	assert_eq!(getdata_count(&proto.sent(), &inv), 1);

	node.object_received(&inv, &peer, 250);
	let stats = node.fetch.stats().snapshot();
	assert_eq!(stats.received_txns, 1);
	assert_eq!(stats.in_flight, 0);
	assert!(node.fetch.tx_record_view(&inv.hash).is_none());
	// the peer recorded a latency sample for future source ranking
	assert_eq!(peer.tx_latency().sample_count(), 1);
}

#[test]
fn block_failover_after_disconnect() {
	let (adapter, node) = node(slow_config());
	let (proto_a, peer_a) = raw_peer(1, Capabilities::default());
	let (proto_b, peer_b) = raw_peer(2, Capabilities::empty());
	let peer_a = node.peer_connected(peer_a);
	let peer_b = node.peer_connected(peer_b);

	let hash = block(9, vec![tx("cb"), tx("t")]).hash();
	let inv = Inv::block(hash);
	adapter.add_header(hash);

	node.inv_advertised(&inv, &peer_a, 0);
	node.inv_advertised(&inv, &peer_b, 0);

	node.peer_disconnected(&peer_a);
	tick(&node);

	assert_eq!(proto_a.sent_count(), 0);
	assert!(proto_b.sent_count() > 0);
	assert_eq!(peer_a.ref_count(), 0);
	assert!(!node.peers.is_known(1));
	assert!(node.peers.is_known(2));
}

#[test]
fn batch_advertisement() {
	let (_adapter, node) = node(slow_config());
	let (proto, peer) = raw_peer(3, Capabilities::default());
	let peer = node.peer_connected(peer);

	let invs: Vec<Inv> = (0..5)
		.map(|n| Inv::tx(tx(&format!("batch-{}", n)).hash()))
		.collect();
	node.invs_advertised(&invs, &peer, 2);
	tick(&node);

	for inv in &invs {
		assert_eq!(getdata_count(&proto.sent(), inv), 1);
	}
	assert_eq!(node.fetch.stats().snapshot().in_flight, 5);
}

#[test]
fn weak_blocks_flow_to_the_api() {
	let (_adapter, node) = node(NodeConfig::default());
	let b1 = block(1, vec![tx("cb1"), tx("t1")]);
	let b2 = block(2, vec![tx("cb2"), tx("t1"), tx("t2")]);

	assert!(node.weak_block_received(&b1));
	assert!(node.weak_block_received(&b2));
	assert!(!node.weak_block_received(&b2));

	let api = node.weak_api();
	let stats = api.weakstats().unwrap();
	assert_eq!(stats.numknownweakblocks, 2);
	assert_eq!(stats.numweakchaintips, 1);
	assert_eq!(stats.maxweakchainheight, 1);
	assert_eq!(api.weaktiptxcount().unwrap(), 3);

	// a strong block closes the generation
	node.strong_block_connected();
	node.weak.empty_check();
	assert_eq!(api.weaktiptxcount().unwrap(), -1);
}

#[test]
fn disabled_weak_processing_refuses_blocks() {
	let config = NodeConfig {
		weak: WeakConfig {
			enable: false,
			..WeakConfig::default()
		},
		..NodeConfig::default()
	};
	let (_adapter, node) = node(config);
	assert!(!node.weak_block_received(&block(1, vec![tx("cb"), tx("t")])));
	assert_eq!(node.weak.num_known_weakblocks(), 0);
}

#[test]
fn requester_thread_drives_fetches() {
	let (_adapter, node) = node(slow_config());
	let (proto, peer) = raw_peer(4, Capabilities::default());
	let peer = node.peer_connected(peer);
	let inv = Inv::tx(tx("driven").hash());
	node.inv_advertised(&inv, &peer, 0);

	let stop = Arc::new(AtomicBool::new(false));
	let handle = run_requester(node.fetch.clone(), 1, stop.clone()).unwrap();

	// wait for the driver to hit the right shard
	let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
	while getdata_count(&proto.sent(), &inv) == 0 && std::time::Instant::now() < deadline {
		std::thread::sleep(std::time::Duration::from_millis(5));
	}
	stop.store(true, std::sync::atomic::Ordering::Relaxed);
	handle.join().unwrap();

	assert_eq!(getdata_count(&proto.sent(), &inv), 1);
}

#[test]
fn config_round_trips_through_serde() {
	let config = NodeConfig::default();
	let json = serde_json::to_string(&config).unwrap();
	let parsed: NodeConfig = serde_json::from_str(&json).unwrap();
	assert_eq!(parsed, config);

	// partial configs fill in defaults
	let parsed: NodeConfig = serde_json::from_str("{}").unwrap();
	assert_eq!(parsed, config);

	let rm = RequestManager::new(parsed.fetch, Arc::new(DummyChainAdapter::new()));
	assert_eq!(rm.block_pacer().max_burst(), 64);
}
