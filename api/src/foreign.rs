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

//! Foreign API: read-only queries over the weak-block cache.

use std::sync::{Arc, Weak};

use bittern_weak::WeakBlockCache;

use crate::core::core::hash::Hash;
use crate::types::WeakStats;

/// Errors an API call can produce.
#[derive(Debug, Fail)]
pub enum Error {
	/// The cache this handle pointed at has been dropped.
	#[fail(display = "weak block cache is gone")]
	CacheGone,
	/// The command exists but is not implemented yet.
	#[fail(display = "{} is reserved for future use", _0)]
	Reserved(&'static str),
	/// A request argument failed to parse.
	#[fail(display = "invalid argument: {}", _0)]
	InvalidArgument(String),
}

/// Main interface into the weak-block observability functions. Holds a
/// non-owning reference to the cache; calls fail cleanly once the node
/// tears it down.
pub struct Foreign {
	weak_cache: Weak<WeakBlockCache>,
}

impl Foreign {
	/// Create a new API instance wrapping a non-owning reference of the
	/// weak-block cache.
	pub fn new(weak_cache: Weak<WeakBlockCache>) -> Foreign {
		Foreign { weak_cache }
	}

	fn cache(&self) -> Result<Arc<WeakBlockCache>, Error> {
		self.weak_cache.upgrade().ok_or(Error::CacheGone)
	}

	/// The `weakstats` document.
	pub fn weakstats(&self) -> Result<WeakStats, Error> {
		let cache = self.cache()?;
		let tips = cache.weak_chain_tips();
		let max_height = tips.iter().map(|(_, h)| *h).max().unwrap_or(-1);
		Ok(WeakStats {
			numknownweakblocks: cache.num_known_weakblocks(),
			numknownweakblocktransactions: cache.num_known_weakblock_transactions(),
			numweakchaintips: tips.len(),
			maxweakchainheight: max_height,
		})
	}

	/// The `weakchaintips` document: `[hex hash, height]` pairs in
	/// insertion order.
	pub fn weakchaintips(&self) -> Result<Vec<(String, i64)>, Error> {
		let cache = self.cache()?;
		Ok(cache
			.weak_chain_tips()
			.into_iter()
			.map(|(hash, height)| (hash.to_hex(), height))
			.collect())
	}

	/// The `weaktiptxcount` value: number of transactions in the longest
	/// chain tip's weak block, or -1 when there is none.
	pub fn weaktiptxcount(&self) -> Result<i64, Error> {
		let cache = self.cache()?;
		Ok(cache
			.get_weak_longest_chain_tip()
			.map(|wb| wb.num_txs() as i64)
			.unwrap_or(-1))
	}

	/// `weakconfirmations`: reserved. The argument is validated so
	/// malformed requests fail as such rather than as "reserved".
	pub fn weakconfirmations(&self, txid_hex: &str) -> Result<usize, Error> {
		Hash::from_hex(txid_hex).map_err(|e| Error::InvalidArgument(e.to_string()))?;
		Err(Error::Reserved("weakconfirmations"))
	}
}
