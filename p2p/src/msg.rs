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

//! Outbound message types the acquisition engines can ask a peer to
//! emit. Serialization onto the wire happens in the connection layer.

use std::hash::Hasher;

use siphasher::sip::SipHasher24;

use crate::core::core::hash::Hash;
use crate::core::core::inv::Inv;

enum_from_primitive! {
	/// Numeric identifiers of the message types this crate can emit.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub enum Type {
		/// Request headers up to a stop hash.
		GetHeaders = 1,
		/// Request objects by inventory.
		GetData = 2,
		/// Request an xtreme thin block.
		GetXThin = 3,
	}
}

/// An outbound message, ready for the connection layer to serialize.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
	/// Ask for the headers between our locator and the stop hash.
	GetHeaders {
		/// Hashes of headers we already have, most recent first.
		locator: Vec<Hash>,
		/// Header to stop at.
		stop_hash: Hash,
	},
	/// Ask for the listed objects outright.
	GetData(Vec<Inv>),
	/// Ask for an xtreme thin block, sending along a filter of the
	/// transactions we likely already hold.
	GetXThin(Inv, BloomFilter),
}

impl Msg {
	/// The wire type identifier of this message.
	pub fn msg_type(&self) -> Type {
		match self {
			Msg::GetHeaders { .. } => Type::GetHeaders,
			Msg::GetData(_) => Type::GetData,
			Msg::GetXThin(_, _) => Type::GetXThin,
		}
	}
}

// Bits per element for the seeded filter; ~2% false positives with two
// hash functions at this density.
const FILTER_BITS_PER_ELEMENT: usize = 12;
const FILTER_NUM_HASHES: u8 = 2;
const FILTER_MIN_BYTES: usize = 32;

/// A fixed-parameter bloom filter seeded from the hashes the requester
/// already holds. Travels inside `GetXThin` so the peer can elide
/// transactions we own. Filter theory lives with the thin-block codec;
/// this is only the payload the engines need to build.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomFilter {
	bits: Vec<u8>,
	tweak: u64,
}

impl BloomFilter {
	/// An empty filter sized for `n_elements`, keyed off the target block
	/// hash so filters for different blocks are not comparable.
	pub fn sized_for(n_elements: usize, target: &Hash) -> BloomFilter {
		let n_bytes = (n_elements * FILTER_BITS_PER_ELEMENT / 8).max(FILTER_MIN_BYTES);
		BloomFilter {
			bits: vec![0u8; n_bytes],
			tweak: target.to_u64(),
		}
	}

	/// Build a filter holding every provided hash, typically the orphan
	/// pool contents, keyed off the target block hash.
	pub fn seeded(hashes: &[Hash], target: &Hash) -> BloomFilter {
		let mut filter = BloomFilter::sized_for(hashes.len(), target);
		for h in hashes {
			filter.insert(h);
		}
		filter
	}

	/// Add a hash to the filter.
	pub fn insert(&mut self, h: &Hash) {
		for i in 0..FILTER_NUM_HASHES {
			let bit = self.bit_index(i, h);
			self.bits[bit / 8] |= 1 << (bit % 8);
		}
	}

	/// Whether the filter may contain the hash (false positives possible,
	/// false negatives not).
	pub fn contains(&self, h: &Hash) -> bool {
		(0..FILTER_NUM_HASHES).all(|i| {
			let bit = self.bit_index(i, h);
			self.bits[bit / 8] & (1 << (bit % 8)) != 0
		})
	}

	/// Size of the filter bit field in bytes.
	pub fn size(&self) -> usize {
		self.bits.len()
	}

	fn bit_index(&self, n_hash: u8, h: &Hash) -> usize {
		let mut hasher = SipHasher24::new_with_keys(self.tweak, n_hash as u64);
		hasher.write(h.to_slice());
		(hasher.finish() % (self.bits.len() as u64 * 8)) as usize
	}
}
