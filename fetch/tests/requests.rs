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

//! Transaction-side request manager scenarios.

mod common;

use common::{hash_of, manager, manager_slow, peer_with, tick};

use bittern_core::core::inv::Inv;
use bittern_p2p::{Capabilities, Msg};
use bittern_util::time::add_mock_time_offset;

fn getdata_count(sent: &[Msg], inv: &Inv) -> usize {
	sent.iter()
		.filter(|m| match m {
			Msg::GetData(invs) => invs.contains(inv),
			_ => false,
		})
		.count()
}

#[test]
fn simple_tx_fetch() {
	let (_adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(1, Capabilities::default());
	let inv = Inv::tx(hash_of(1));

	rm.ask_for(&inv, &peer, 0);
	assert_eq!(rm.stats().snapshot().pending_txns, 1);

	tick(&rm);
	assert_eq!(getdata_count(&proto.sent(), &inv), 1);
	assert_eq!(rm.stats().snapshot().in_flight, 1);

	rm.received(&inv, &peer, 250);
	assert!(rm.tx_record_view(&inv.hash).is_none());
	let stats = rm.stats().snapshot();
	assert_eq!(stats.received_txns, 1);
	assert_eq!(stats.in_flight, 0);
	assert_eq!(stats.pending_txns, 0);
	// all source references were dropped with the record
	assert_eq!(peer.ref_count(), 0);
}

#[test]
fn retry_after_silence() {
	let (_adapter, rm) = manager();
	let (proto, peer) = peer_with(2, Capabilities::default());
	let inv = Inv::tx(hash_of(2));

	rm.ask_for(&inv, &peer, 0);
	tick(&rm);
	assert_eq!(getdata_count(&proto.sent(), &inv), 1);
	assert_eq!(rm.stats().snapshot().dropped_txns, 0);

	// outwait the transaction retry interval
	add_mock_time_offset(5_000_001);
	tick(&rm);
	assert_eq!(getdata_count(&proto.sent(), &inv), 2);
	let stats = rm.stats().snapshot();
	assert_eq!(stats.dropped_txns, 1);
	assert_eq!(stats.in_flight, 2);

	rm.received(&inv, &peer, 250);
	let stats = rm.stats().snapshot();
	assert_eq!(stats.in_flight, 0);
	assert_eq!(stats.dropped_txns, 0);
	assert_eq!(stats.received_txns, 1);
}

#[test]
fn ask_for_is_idempotent() {
	let (_adapter, rm) = manager_slow();
	let (_proto, peer) = peer_with(3, Capabilities::default());
	let inv = Inv::tx(hash_of(3));

	rm.ask_for(&inv, &peer, 1);
	let before = rm.tx_record_view(&inv.hash).unwrap();
	rm.ask_for(&inv, &peer, 1);
	let after = rm.tx_record_view(&inv.hash).unwrap();

	assert_eq!(before, after);
	assert_eq!(after.num_sources, 1);
	assert_eq!(peer.ref_count(), 1);
	assert_eq!(rm.stats().snapshot().pending_txns, 1);

	// priority only ever rises
	rm.ask_for(&inv, &peer, 7);
	assert_eq!(rm.tx_record_view(&inv.hash).unwrap().priority, 7);
	rm.ask_for(&inv, &peer, 2);
	assert_eq!(rm.tx_record_view(&inv.hash).unwrap().priority, 7);
}

#[test]
fn received_twice_is_a_no_op() {
	let (_adapter, rm) = manager_slow();
	let (_proto, peer) = peer_with(4, Capabilities::default());
	let inv = Inv::tx(hash_of(4));

	rm.ask_for(&inv, &peer, 0);
	tick(&rm);
	rm.received(&inv, &peer, 100);
	let stats = rm.stats().snapshot();

	rm.received(&inv, &peer, 100);
	assert_eq!(rm.stats().snapshot(), stats);
}

#[test]
fn already_received_cleans_up_without_latency() {
	let (_adapter, rm) = manager_slow();
	let (_proto, peer) = peer_with(5, Capabilities::default());
	let inv = Inv::tx(hash_of(5));

	rm.ask_for(&inv, &peer, 0);
	rm.already_received(&inv);
	assert!(rm.tx_record_view(&inv.hash).is_none());
	assert_eq!(peer.tx_latency().sample_count(), 0);
	let stats = rm.stats().snapshot();
	assert_eq!(stats.received_txns, 0);
	assert_eq!(stats.pending_txns, 0);
	assert_eq!(peer.ref_count(), 0);
}

#[test]
fn pause_skips_scheduling_and_resume_restores() {
	let (_adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(6, Capabilities::default());
	let inv = Inv::tx(hash_of(6));

	rm.ask_for(&inv, &peer, 0);
	rm.pause(&inv);
	rm.pause(&inv);
	tick(&rm);
	assert_eq!(proto.sent_count(), 0);

	rm.resume(&inv);
	assert_eq!(rm.tx_record_view(&inv.hash).unwrap().paused, 1);
	tick(&rm);
	assert_eq!(proto.sent_count(), 0);

	rm.resume(&inv);
	tick(&rm);
	assert_eq!(getdata_count(&proto.sent(), &inv), 1);

	// resuming an unpaused record saturates at zero
	rm.resume(&inv);
	assert_eq!(rm.tx_record_view(&inv.hash).unwrap().paused, 0);
}

#[test]
fn remove_source_orphans_and_next_pass_deletes() {
	let (_adapter, rm) = manager_slow();
	let (proto, peer) = peer_with(7, Capabilities::default());
	let inv = Inv::tx(hash_of(7));

	rm.ask_for(&inv, &peer, 0);
	tick(&rm);
	assert_eq!(getdata_count(&proto.sent(), &inv), 1);

	// the peer goes away mid-request
	peer.flag_for_disconnect();
	rm.remove_source(&peer);

	let view = rm.tx_record_view(&inv.hash).unwrap();
	assert_eq!(view.outstanding_reqs, 0);
	assert_eq!(view.last_request_time, 0);
	assert_eq!(view.receiving_from, None);
	assert_eq!(view.paused, 0);

	// next pass pops the dead source, finds nothing usable, deletes
	tick(&rm);
	assert!(rm.tx_record_view(&inv.hash).is_none());
	assert_eq!(peer.ref_count(), 0);
	assert_eq!(getdata_count(&proto.sent(), &inv), 1);
}

#[test]
fn remove_source_resets_deep_pause() {
	let (_adapter, rm) = manager_slow();
	let (_proto, peer) = peer_with(8, Capabilities::default());
	let inv = Inv::tx(hash_of(8));

	rm.ask_for(&inv, &peer, 0);
	tick(&rm);
	rm.pause(&inv);
	rm.pause(&inv);
	rm.pause(&inv);

	rm.remove_source(&peer);
	assert_eq!(rm.tx_record_view(&inv.hash).unwrap().paused, 0);
}

#[test]
fn rejection_unwinds_in_flight_but_keeps_record() {
	let (_adapter, rm) = manager_slow();
	let (_proto, peer) = peer_with(9, Capabilities::default());
	let inv = Inv::tx(hash_of(9));

	rm.ask_for(&inv, &peer, 0);
	tick(&rm);
	assert_eq!(rm.stats().snapshot().in_flight, 1);

	rm.rejected(&inv, &peer, bittern_fetch::RejectReason::InsufficientFee);
	let stats = rm.stats().snapshot();
	assert_eq!(stats.in_flight, 0);
	assert_eq!(stats.rejected_txns, 1);
	assert!(rm.tx_record_view(&inv.hash).is_some());

	// unknown codes are logged, counted, never fatal
	rm.rejected(&inv, &peer, bittern_fetch::RejectReason::Other(0x42));
	assert_eq!(rm.stats().snapshot().rejected_txns, 2);
}

#[test]
fn in_flight_matches_outstanding_sum() {
	let (_adapter, rm) = manager();
	let (_proto, peer) = peer_with(10, Capabilities::default());

	for n in 100..120 {
		rm.ask_for(&Inv::tx(hash_of(n)), &peer, 0);
	}
	tick(&rm);
	assert_eq!(rm.tx_count(), 20);
	assert_eq!(
		rm.tx_outstanding_total(),
		rm.stats().snapshot().in_flight
	);
}
