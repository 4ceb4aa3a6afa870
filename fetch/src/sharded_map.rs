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

//! A hash-keyed map split into independently locked shards, so the
//! transaction scheduler can work one shard at a time while other threads
//! insert into the rest.

use std::collections::HashMap;

use crate::core::core::hash::Hash;
use crate::util::{Mutex, MutexGuard};

/// Number of shards. Must be a power of two; the shard is selected from
/// the low bits of the key.
pub const NUM_SHARDS: usize = 16;

/// Fixed array of inner maps, each paired with its own mutex. A lock is
/// only ever held for one shard at a time; whole-map traversal visits
/// shards in index order and tolerates concurrent mutation of the shards
/// it is not currently holding.
pub struct ShardedMap<V> {
	shards: Vec<Mutex<HashMap<Hash, V>>>,
}

impl<V> ShardedMap<V> {
	/// An empty map with `NUM_SHARDS` shards.
	pub fn new() -> ShardedMap<V> {
		let mut shards = Vec::with_capacity(NUM_SHARDS);
		for _ in 0..NUM_SHARDS {
			shards.push(Mutex::new(HashMap::new()));
		}
		ShardedMap { shards }
	}

	/// Shard index a key lives in.
	pub fn shard_index(hash: &Hash) -> usize {
		hash.to_u64() as usize & (NUM_SHARDS - 1)
	}

	/// Scoped access to the shard holding `hash`. The shard lock is held
	/// until the returned guard is dropped.
	pub fn accessor(&self, hash: &Hash) -> MutexGuard<'_, HashMap<Hash, V>> {
		self.shards[Self::shard_index(hash)].lock()
	}

	/// Scoped access to a shard by index, for callers that pick their own
	/// shard (the scheduler's random pick).
	pub fn shard(&self, index: usize) -> MutexGuard<'_, HashMap<Hash, V>> {
		self.shards[index].lock()
	}

	/// Total number of entries. Counted shard by shard; concurrent
	/// writers can change the answer before it is returned.
	pub fn len(&self) -> usize {
		self.shards.iter().map(|s| s.lock().len()).sum()
	}

	/// Whether the map holds no entries at all.
	pub fn is_empty(&self) -> bool {
		self.shards.iter().all(|s| s.lock().is_empty())
	}

	/// Visit every entry, one shard lock at a time. No snapshot
	/// consistency across shards: entries added to or removed from other
	/// shards mid-walk may or may not be seen.
	pub fn for_each_mut<F>(&self, mut f: F)
	where
		F: FnMut(&Hash, &mut V),
	{
		for shard in &self.shards {
			let mut map = shard.lock();
			for (hash, value) in map.iter_mut() {
				f(hash, value);
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::core::core::hash::Hashed;

	fn h(n: u32) -> Hash {
		n.to_le_bytes().to_vec().hash()
	}

	#[test]
	fn insert_and_lookup_via_accessor() {
		let map: ShardedMap<u32> = ShardedMap::new();
		for n in 0..100 {
			map.accessor(&h(n)).insert(h(n), n);
		}
		assert_eq!(map.len(), 100);
		for n in 0..100 {
			assert_eq!(map.accessor(&h(n)).get(&h(n)), Some(&n));
		}
	}

	#[test]
	fn shard_index_is_stable_and_bounded() {
		for n in 0..1000 {
			let idx = ShardedMap::<u32>::shard_index(&h(n));
			assert!(idx < NUM_SHARDS);
			assert_eq!(idx, ShardedMap::<u32>::shard_index(&h(n)));
		}
	}

	#[test]
	fn keys_spread_across_shards() {
		let map: ShardedMap<u32> = ShardedMap::new();
		for n in 0..256 {
			map.accessor(&h(n)).insert(h(n), n);
		}
		let populated = (0..NUM_SHARDS).filter(|i| !map.shard(*i).is_empty()).count();
		assert!(populated > NUM_SHARDS / 2);
	}

	#[test]
	fn for_each_visits_everything() {
		let map: ShardedMap<u32> = ShardedMap::new();
		for n in 0..64 {
			map.accessor(&h(n)).insert(h(n), n);
		}
		let mut seen = 0;
		let mut sum = 0;
		map.for_each_mut(|_, v| {
			seen += 1;
			sum += *v;
		});
		assert_eq!(seen, 64);
		assert_eq!(sum, (0..64).sum::<u32>());
	}

	#[test]
	fn holding_one_shard_leaves_others_lockable() {
		let map: ShardedMap<u32> = ShardedMap::new();
		let _guard = map.shard(0);
		// a different shard can still be locked while shard 0 is held
		let other = map.shard(1);
		assert!(other.is_empty());
	}
}
