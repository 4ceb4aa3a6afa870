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

use crate::msg::Msg;
use crate::util::Mutex;

/// Stable identifier of a connected peer. Never reused while the process
/// lives.
pub type PeerId = u64;

/// Things that can go wrong when talking to a peer. All of these are
/// transient from the engines' perspective; the scheduler retries on the
/// next tick.
#[derive(Debug, Fail)]
pub enum Error {
	/// The connection refused to queue the message (shutting down, full
	/// outbound buffer, ...).
	#[fail(display = "peer refused send")]
	SendRefused,
	/// The peer is no longer connected.
	#[fail(display = "peer disconnected")]
	Disconnected,
}

bitflags! {
	/// Options for what type of interaction a peer supports
	#[derive(Serialize, Deserialize)]
	pub struct Capabilities: u32 {
		/// We don't know (yet) what the peer can do.
		const UNKNOWN = 0b0000_0000;
		/// Full archival node, has the whole history without any pruning.
		const FULL_HIST = 0b0000_0001;
		/// Can provide a list of healthy peers
		const PEER_LIST = 0b0000_0010;
		/// Can serve thin blocks (block header plus shortids for
		/// transactions the requester likely already has).
		const THIN_BLOCKS = 0b0000_0100;
		/// All of the above.
		const FULL_NODE = Capabilities::FULL_HIST.bits
			| Capabilities::PEER_LIST.bits
			| Capabilities::THIN_BLOCKS.bits;
	}
}

impl Default for Capabilities {
	fn default() -> Capabilities {
		Capabilities::FULL_NODE
	}
}

/// General information about a connected peer that's useful to other
/// modules.
#[derive(Clone, Debug, Serialize)]
pub struct PeerInfo {
	/// Stable peer identifier.
	pub id: PeerId,
	/// Self-reported client string, used in logs.
	pub user_agent: String,
	/// What the peer can do.
	pub capabilities: Capabilities,
}

/// The communication channel to a remote peer, as far as the acquisition
/// engines are concerned: something that can attempt to queue an outbound
/// message. The concrete implementation wraps the node's connection
/// layer.
pub trait Protocol: Send + Sync {
	/// Queue a message for sending. A refusal is transient; the caller
	/// retries on its own schedule.
	fn send(&self, msg: Msg) -> Result<(), Error>;
}

impl<P: Protocol + ?Sized> Protocol for std::sync::Arc<P> {
	fn send(&self, msg: Msg) -> Result<(), Error> {
		(**self).send(msg)
	}
}

/// A `Protocol` that records every message instead of sending it, and can
/// be told to refuse sends. Used by tests and by the traffic simulator.
pub struct TrackingProtocol {
	sent: Mutex<Vec<Msg>>,
	refuse: std::sync::atomic::AtomicBool,
}

impl TrackingProtocol {
	/// A tracking protocol accepting everything.
	pub fn new() -> TrackingProtocol {
		TrackingProtocol {
			sent: Mutex::new(vec![]),
			refuse: std::sync::atomic::AtomicBool::new(false),
		}
	}

	/// Make subsequent sends fail (or succeed again).
	pub fn set_refuse(&self, refuse: bool) {
		self.refuse
			.store(refuse, std::sync::atomic::Ordering::Relaxed);
	}

	/// Everything sent so far, in order.
	pub fn sent(&self) -> Vec<Msg> {
		self.sent.lock().clone()
	}

	/// Number of messages sent so far.
	pub fn sent_count(&self) -> usize {
		self.sent.lock().len()
	}
}

impl Protocol for TrackingProtocol {
	fn send(&self, msg: Msg) -> Result<(), Error> {
		if self.refuse.load(std::sync::atomic::Ordering::Relaxed) {
			return Err(Error::SendRefused);
		}
		self.sent.lock().push(msg);
		Ok(())
	}
}
