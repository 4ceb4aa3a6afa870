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

//! Block-side request manager scenarios: source failover, thin-block
//! selection and the rollback path when no request could be issued.

mod common;

use common::{hash_of, manager_slow, peer_with};

use bittern_core::core::inv::{Inv, InvType};
use bittern_p2p::{Capabilities, Msg};

fn has_block_fetch(sent: &[Msg]) -> bool {
	sent.iter().any(|m| match m {
		Msg::GetData(invs) => invs.iter().any(|i| i.kind.is_block_kind()),
		Msg::GetXThin(_, _) => true,
		_ => false,
	})
}

#[test]
fn failover_to_next_source_on_disconnect() {
	let (_adapter, rm) = manager_slow();
	// A advertises thin support, so it ranks above B
	let (proto_a, peer_a) = peer_with(1, Capabilities::default());
	let (proto_b, peer_b) = peer_with(2, Capabilities::empty());
	let inv = Inv::block(hash_of(1));

	rm.ask_for(&inv, &peer_a, 0);
	rm.ask_for(&inv, &peer_b, 0);
	assert_eq!(rm.block_record_view(&inv.hash).unwrap().num_sources, 2);

	peer_a.flag_for_disconnect();
	rm.send_requests();

	// the dead best source was skipped and released; B got the fetch
	assert_eq!(proto_a.sent_count(), 0);
	assert!(has_block_fetch(&proto_b.sent()));
	assert_eq!(peer_a.ref_count(), 0);

	let view = rm.block_record_view(&inv.hash).unwrap();
	assert_eq!(view.outstanding_reqs, 1);
	assert_eq!(view.receiving_from, Some(2));
	// the used source is spent too; block sources are not retained
	assert_eq!(view.num_sources, 0);
	assert_eq!(peer_b.ref_count(), 0);
}

#[test]
fn getheaders_precedes_block_fetch_when_header_unknown() {
	let (adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(3, Capabilities::empty());
	let inv = Inv::block(hash_of(2));

	adapter.set_nearly_synced(true);
	rm.ask_for(&inv, &peer, 0);
	rm.send_requests();

	let sent = proto.sent();
	assert_eq!(sent.len(), 2);
	match &sent[0] {
		Msg::GetHeaders { stop_hash, .. } => assert_eq!(*stop_hash, inv.hash),
		other => panic!("expected getheaders first, got {:?}", other),
	}
	match &sent[1] {
		Msg::GetData(invs) => assert_eq!(invs[0].kind, InvType::Block),
		other => panic!("expected getdata, got {:?}", other),
	}
}

#[test]
fn known_header_skips_getheaders() {
	let (adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(4, Capabilities::empty());
	let inv = Inv::block(hash_of(3));

	adapter.add_header(inv.hash);
	rm.ask_for(&inv, &peer, 0);
	rm.send_requests();

	let sent = proto.sent();
	assert_eq!(sent.len(), 1);
	assert!(has_block_fetch(&sent));
}

#[test]
fn thin_capable_peer_gets_xthin_request() {
	let (adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(5, Capabilities::default());
	let inv = Inv::block(hash_of(4));

	adapter.add_header(inv.hash);
	adapter.set_orphans(vec![hash_of(100), hash_of(101)]);
	rm.ask_for(&inv, &peer, 0);
	rm.send_requests();

	let sent = proto.sent();
	assert_eq!(sent.len(), 1);
	match &sent[0] {
		Msg::GetXThin(xinv, filter) => {
			assert_eq!(xinv.kind, InvType::XThinBlock);
			assert_eq!(xinv.hash, inv.hash);
			assert!(filter.contains(&hash_of(100)));
			assert!(filter.contains(&hash_of(101)));
		}
		other => panic!("expected get_xthin, got {:?}", other),
	}
	assert_eq!(peer.thin_blocks_in_flight(), 1);
}

#[test]
fn thin_peer_with_thin_in_flight_falls_back_to_getdata() {
	let (adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(6, Capabilities::default());
	let inv = Inv::block(hash_of(5));

	adapter.add_header(inv.hash);
	// one xthin per peer at a time; this peer is already busy
	peer.add_thin_block_in_flight(&hash_of(99));
	rm.ask_for(&inv, &peer, 0);
	rm.send_requests();

	let sent = proto.sent();
	assert_eq!(sent.len(), 1);
	match &sent[0] {
		Msg::GetData(invs) => assert_eq!(invs[0].kind, InvType::Block),
		other => panic!("expected getdata fallback, got {:?}", other),
	}
}

#[test]
fn rollback_is_observable_when_no_request_goes_out() {
	let (adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(7, Capabilities::empty());
	let inv = Inv::block(hash_of(6));

	// a dedicated thin peer is configured, so only xthin-capable peers
	// may serve this block; peer 7 cannot
	adapter.add_header(inv.hash);
	adapter.set_dedicated_thin_peer(true);
	rm.ask_for(&inv, &peer, 0);

	let before = rm.block_record_view(&inv.hash).unwrap();
	rm.send_requests();
	assert_eq!(proto.sent_count(), 0);

	// the bookkeeping was rolled back through the map slot
	let after = rm.block_record_view(&inv.hash).unwrap();
	assert_eq!(after.outstanding_reqs, before.outstanding_reqs);
	assert_eq!(after.last_request_time, before.last_request_time);
	// the attempted source was spent by the attempt
	assert_eq!(after.num_sources, 0);
	assert_eq!(peer.ref_count(), 0);

	// with nothing left to try, the next pass drops the record
	rm.send_requests();
	assert!(rm.block_record_view(&inv.hash).is_none());
}

#[test]
fn refused_send_rolls_back_too() {
	let (adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(8, Capabilities::empty());
	let inv = Inv::block(hash_of(7));

	adapter.add_header(inv.hash);
	proto.set_refuse(true);
	rm.ask_for(&inv, &peer, 0);
	rm.send_requests();

	let view = rm.block_record_view(&inv.hash).unwrap();
	assert_eq!(view.outstanding_reqs, 0);
	assert_eq!(view.last_request_time, 0);
}

#[test]
fn block_with_only_dead_sources_is_removed() {
	let (_adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(9, Capabilities::empty());
	let inv = Inv::block(hash_of(8));

	rm.ask_for(&inv, &peer, 0);
	peer.flag_for_disconnect();
	rm.send_requests();

	assert_eq!(proto.sent_count(), 0);
	assert!(rm.block_record_view(&inv.hash).is_none());
	assert_eq!(peer.ref_count(), 0);
}

#[test]
fn slow_peers_are_skipped_during_ibd() {
	let (adapter, rm) = manager_slow();
	let (proto_slow, peer_slow) = peer_with(10, Capabilities::empty());
	let (proto_fast, peer_fast) = peer_with(11, Capabilities::empty());
	let inv = Inv::block(hash_of(9));

	adapter.set_nearly_synced(false);
	peer_slow.set_ping_micros(300_000); // way past the 25ms gate
	peer_fast.set_ping_micros(1_000);
	// make the slow peer more desirable so it is tried first
	peer_slow.tx_latency().record(1_000);
	peer_fast.tx_latency().record(50_000);

	rm.ask_for(&inv, &peer_slow, 0);
	rm.ask_for(&inv, &peer_fast, 0);
	rm.send_requests();

	assert_eq!(proto_slow.sent_count(), 0);
	assert!(has_block_fetch(&proto_fast.sent()));
	assert_eq!(peer_slow.ref_count(), 0);
}

#[test]
fn thin_variants_share_the_block_slot() {
	let (_adapter, rm) = manager_slow();
	let (_proto, peer) = peer_with(12, Capabilities::default());
	let hash = hash_of(10);

	rm.ask_for(&Inv::block(hash), &peer, 0);
	rm.ask_for(
		&Inv {
			kind: InvType::ThinBlock,
			hash,
		},
		&peer,
		3,
	);

	let view = rm.block_record_view(&hash).unwrap();
	assert_eq!(view.num_sources, 1);
	assert_eq!(view.priority, 3);
	assert_eq!(rm.block_count(), 1);
}
