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

//! Blocks and block headers. Like transactions, these carry only what
//! the acquisition subsystem requires; proof-of-work and validation are
//! the surrounding node's business.

use byteorder::{ByteOrder, LittleEndian};
use chrono::prelude::{DateTime, TimeZone, Utc};

use crate::core::hash::{Hash, Hashed};
use crate::core::transaction::Transaction;

/// Block header. Identifies the block; the block hash is the header hash.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockHeader {
	/// Protocol version of the block.
	pub version: u16,
	/// Height of this block since the genesis block.
	pub height: u64,
	/// Hash of the block previous to this in the chain.
	pub prev_hash: Hash,
	/// Merkle-style commitment to the block's transactions.
	pub tx_root: Hash,
	/// Timestamp at which the block was built.
	pub timestamp: DateTime<Utc>,
	/// Nonce chosen by the miner.
	pub nonce: u64,
}

impl Default for BlockHeader {
	fn default() -> BlockHeader {
		BlockHeader {
			version: 1,
			height: 0,
			prev_hash: Hash::default(),
			tx_root: Hash::default(),
			timestamp: Utc.timestamp(0, 0),
			nonce: 0,
		}
	}
}

impl Hashed for BlockHeader {
	fn bytes(&self) -> Vec<u8> {
		let mut buf = vec![0u8; 26];
		LittleEndian::write_u16(&mut buf[0..2], self.version);
		LittleEndian::write_u64(&mut buf[2..10], self.height);
		LittleEndian::write_i64(&mut buf[10..18], self.timestamp.timestamp());
		LittleEndian::write_u64(&mut buf[18..26], self.nonce);
		buf.extend_from_slice(self.prev_hash.to_slice());
		buf.extend_from_slice(self.tx_root.to_slice());
		buf
	}
}

/// A block: a header plus the transactions it commits to, coinbase first.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
	/// The block header.
	pub header: BlockHeader,
	/// Transactions in block order; index 0 is the coinbase.
	pub txs: Vec<Transaction>,
}

impl Block {
	/// Assemble a block from a header and its transactions.
	pub fn new(header: BlockHeader, txs: Vec<Transaction>) -> Block {
		Block { header, txs }
	}

	/// The block hash, which is the hash of its header.
	pub fn hash(&self) -> Hash {
		self.header.hash()
	}

	/// Number of transactions, coinbase included.
	pub fn num_txs(&self) -> usize {
		self.txs.len()
	}
}
