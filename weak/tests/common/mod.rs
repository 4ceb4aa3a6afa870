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

//! Block-building fixtures for the weak-block cache tests.

#![allow(dead_code)]

use bittern_core::core::block::{Block, BlockHeader};
use bittern_core::core::transaction::Transaction;
use bittern_weak::{WeakBlockCache, WeakConfig};

pub fn tx(tag: &str) -> Transaction {
	Transaction::new(tag.as_bytes().to_vec())
}

/// A block with the given transactions; the nonce keeps block hashes
/// distinct even for identical transaction sets.
pub fn block(nonce: u64, txs: Vec<Transaction>) -> Block {
	let mut header = BlockHeader::default();
	header.nonce = nonce;
	Block::new(header, txs)
}

pub fn cache() -> WeakBlockCache {
	WeakBlockCache::new(WeakConfig::default())
}
