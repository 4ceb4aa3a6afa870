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

//! Weak-block storage and the mini-extension DAG.
//!
//! Transactions are stored once in a content-addressed pool with a
//! per-hash reference count; weak blocks hold shared references into the
//! pool. "B mini-extends A" when B repeats all of A's non-coinbase
//! transactions at the same positions and adds at least one more; the
//! partial order this generates is tracked through a `miniextends` map
//! with at most one outgoing edge per block, plus the list of chain tips
//! (blocks nothing else extends), in insertion order.

use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use crate::core::core::block::{Block, BlockHeader};
use crate::core::core::hash::{Hash, Hashed};
use crate::core::core::transaction::Transaction;
use crate::core::global;
use crate::types::{
	WeakConfig, CONSIDER_POW_RATIO_NO_RETARGET, MIN_POW_RATIO, MIN_POW_RATIO_NO_RETARGET,
};
use crate::util::Mutex;

/// A weak block: the block header plus shared references into the
/// transaction pool, coinbase at index 0. Cheap to keep many of; the
/// transaction bodies exist once regardless of how many weak blocks
/// carry them.
pub struct Weakblock {
	hash: Hash,
	header: BlockHeader,
	txs: Vec<Arc<Transaction>>,
}

impl Weakblock {
	/// The block hash this weak block was received under.
	pub fn hash(&self) -> Hash {
		self.hash
	}

	/// The weak block's header.
	pub fn header(&self) -> &BlockHeader {
		&self.header
	}

	/// Number of transactions, coinbase included.
	pub fn num_txs(&self) -> usize {
		self.txs.len()
	}

	/// The pooled transaction references, in block order.
	pub fn txs(&self) -> &[Arc<Transaction>] {
		&self.txs
	}
}

struct TxEntry {
	tx: Arc<Transaction>,
	refs: usize,
}

#[derive(Default)]
struct CacheInner {
	/// Content-addressed transaction pool; uses most of the memory.
	tx_pool: HashMap<Hash, TxEntry>,
	/// All known weak blocks by block hash.
	blocks: HashMap<Hash, Arc<Weakblock>>,
	/// The block each weak block minimally extends, if any. Together
	/// with `chain_tips` this holds the DAG.
	miniextends: HashMap<Hash, Hash>,
	/// Chain tips in order of insertion; a later tip is further down the
	/// vector, so the best weak block is the largest weak height that
	/// comes earliest.
	chain_tips: Vec<Hash>,
	/// Cache of blocks reassembled from weak blocks.
	reassembled: HashMap<Hash, Arc<Block>>,
}

/// The weak-block cache. The surrounding node owns exactly one; all of
/// its state sits behind a single internal lock.
pub struct WeakBlockCache {
	config: WeakConfig,
	inner: Mutex<CacheInner>,
}

impl WeakBlockCache {
	/// An empty cache with the given configuration.
	pub fn new(config: WeakConfig) -> WeakBlockCache {
		WeakBlockCache {
			config,
			inner: Mutex::new(CacheInner::default()),
		}
	}

	/// Whether weak-block processing is enabled at all.
	pub fn enabled(&self) -> bool {
		self.config.enable
	}

	/// POW-target ratio above which weak blocks are considered. Forced
	/// on POW-no-retarget networks.
	pub fn consider_pow_ratio(&self) -> u32 {
		if global::pow_no_retargeting() {
			CONSIDER_POW_RATIO_NO_RETARGET
		} else {
			self.config.consider_pow_ratio
		}
	}

	/// Absolute minimum POW multiplier; blocks weaker than this are
	/// rejected outright.
	pub fn min_pow_ratio(&self) -> u32 {
		if global::pow_no_retargeting() {
			MIN_POW_RATIO_NO_RETARGET
		} else {
			MIN_POW_RATIO
		}
	}

	/// Register a new weak block. Returns true if it was inserted, false
	/// if one with this block hash is already tracked.
	pub fn store_weakblock(&self, block: &Block) -> bool {
		let block_hash = block.hash();
		let mut inner = self.inner.lock();
		if inner.blocks.contains_key(&block_hash) {
			// stored it already
			return false;
		}

		let mut txs = Vec::with_capacity(block.txs.len());
		for tx in &block.txs {
			txs.push(store_transaction(&mut inner, tx));
		}
		let wb = Arc::new(Weakblock {
			hash: block_hash,
			header: block.header.clone(),
			txs,
		});
		inner.blocks.insert(block_hash, wb.clone());

		insert_chain_dag(&mut inner, &wb);
		debug!(
			"Tracking weak block {} of {} transactions.",
			block_hash,
			wb.num_txs()
		);
		true
	}

	/// The weak block stored under a block hash, if any.
	pub fn get_weakblock(&self, hash: &Hash) -> Option<Arc<Weakblock>> {
		self.inner.lock().blocks.get(hash).cloned()
	}

	/// Convenience wrapper around `get_weakblock`.
	pub fn is_known_weakblock(&self, hash: &Hash) -> bool {
		self.inner.lock().blocks.contains_key(hash)
	}

	/// Reassemble the full block for a stored weak block, memoizing the
	/// result until the weak block is purged. None for unknown hashes.
	pub fn block_for_weak(&self, hash: &Hash) -> Option<Arc<Block>> {
		let mut inner = self.inner.lock();
		if let Some(cached) = inner.reassembled.get(hash) {
			return Some(cached.clone());
		}
		let wb = inner.blocks.get(hash).cloned()?;
		let block = Arc::new(Block::new(
			wb.header().clone(),
			wb.txs().iter().map(|tx| (**tx).clone()).collect(),
		));
		debug_assert_eq!(block.hash(), wb.hash());
		inner.reassembled.insert(*hash, block.clone());
		Some(block)
	}

	/// Length of the mini-extension chain below the given weak block: 0
	/// for roots, -1 for hashes we don't know.
	pub fn weak_height(&self, hash: &Hash) -> i64 {
		let inner = self.inner.lock();
		if !inner.blocks.contains_key(hash) {
			return -1;
		}
		weak_height(&inner, hash)
	}

	/// Among chain tips, one with maximum weak height; ties break toward
	/// the earliest inserted. None when the cache is empty.
	pub fn get_weak_longest_chain_tip(&self) -> Option<Arc<Weakblock>> {
		let inner = self.inner.lock();
		let mut max_height = -1i64;
		let mut longest = None;
		for tip in &inner.chain_tips {
			let height = weak_height(&inner, tip);
			if height > max_height {
				max_height = height;
				longest = Some(tip);
			}
		}
		longest.and_then(|h| inner.blocks.get(h).cloned())
	}

	/// The weak block this one minimally extends, if any.
	pub fn miniextends_weak(&self, hash: &Hash) -> Option<Arc<Weakblock>> {
		let inner = self.inner.lock();
		let under = inner.miniextends.get(hash)?;
		inner.blocks.get(under).cloned()
	}

	/// All current chain tips as `(hash, weak height)` pairs, in
	/// insertion order.
	pub fn weak_chain_tips(&self) -> Vec<(Hash, i64)> {
		let inner = self.inner.lock();
		inner
			.chain_tips
			.iter()
			.map(|tip| (*tip, weak_height(&inner, tip)))
			.collect()
	}

	/// Number of weak blocks a transaction is referenced by: its weak
	/// confirmation count.
	pub fn weak_confirmations(&self, txid: &Hash) -> usize {
		self.inner
			.lock()
			.tx_pool
			.get(txid)
			.map(|entry| entry.refs)
			.unwrap_or(0)
	}

	/// Whether a (strong) block candidate builds on some known weak
	/// block: all of the weak block's non-coinbase transactions appear
	/// at the same positions. The highest such weak block is returned.
	pub fn builds_on_weak(&self, block: &Block) -> Option<Arc<Weakblock>> {
		let inner = self.inner.lock();
		let block_tx_hashes: Vec<Hash> = block.txs.iter().map(|tx| tx.hash()).collect();
		let mut best: Option<(i64, &Hash)> = None;
		for (hash, wb) in &inner.blocks {
			if wb.num_txs() > block_tx_hashes.len() {
				continue;
			}
			let covered = wb
				.txs()
				.iter()
				.enumerate()
				.skip(1)
				.all(|(i, tx)| tx.hash() == block_tx_hashes[i]);
			if covered {
				let height = weak_height(&inner, hash);
				if best.map(|(h, _)| height > h).unwrap_or(true) {
					best = Some((height, hash));
				}
			}
		}
		best.and_then(|(_, h)| inner.blocks.get(h).cloned())
	}

	/// Trim chain tips, oldest first, until at most `leave_tips` remain.
	/// None means the configured retention count. Purging a tip cascades
	/// down its chain, stopping at blocks other chains still build on.
	pub fn purge_old_weakblocks(&self, leave_tips: Option<usize>) {
		let leave_tips = leave_tips.unwrap_or(self.config.keep_chain_tips);
		let mut inner = self.inner.lock();
		debug!(
			"Purging old chain tips. {} chain tips right now.",
			inner.chain_tips.len()
		);
		while inner.chain_tips.len() > leave_tips {
			let oldest = inner.chain_tips[0];
			purge_chain_tip(&mut inner, &oldest);
		}
	}

	/// Remove every weak block, e.g. because a strong block arrived.
	pub fn reset(&self) {
		self.purge_old_weakblocks(Some(0));
	}

	/// Number of weak blocks currently tracked.
	pub fn num_known_weakblocks(&self) -> usize {
		self.inner.lock().blocks.len()
	}

	/// Number of distinct transactions currently pooled.
	pub fn num_known_weakblock_transactions(&self) -> usize {
		self.inner.lock().tx_pool.len()
	}

	/// Walk every invariant the DAG is supposed to maintain; panics on
	/// violation. Test and debugging aid.
	pub fn consistency_check(&self) {
		let inner = self.inner.lock();
		assert!(inner.chain_tips.len() <= inner.blocks.len());

		let mut longest_height = -1i64;
		let mut longest_tips: Vec<Hash> = vec![];

		for (block_hash, wb) in &inner.blocks {
			assert_eq!(wb.hash(), *block_hash);

			// collect the chain of blocks this one builds upon
			let mut chain = vec![];
			let mut cursor = *block_hash;
			while let Some(under) = inner.miniextends.get(&cursor) {
				chain.push(*under);
				let under_wb = &inner.blocks[under];
				assert!(weak_extends(under_wb, wb));
				cursor = *under;
			}
			assert_eq!(chain.len() as i64, weak_height(&inner, block_hash));

			// nothing outside the chain may be under this block
			for (other_hash, other_wb) in &inner.blocks {
				if !chain.contains(other_hash) && other_hash != block_hash {
					assert!(!weak_extends(other_wb, wb));
				}
			}

			if chain.len() as i64 >= longest_height {
				if chain.len() as i64 > longest_height {
					longest_tips.clear();
				}
				longest_tips.push(*block_hash);
				longest_height = chain.len() as i64;
			}

			// every tracked transaction reference is pooled and counted
			for tx in wb.txs() {
				let entry = &inner.tx_pool[&tx.hash()];
				assert!(entry.refs >= 1);
				assert!(Arc::ptr_eq(&entry.tx, tx));
			}
		}

		// pool refcounts equal the number of slots referencing each tx
		let mut slot_counts: HashMap<Hash, usize> = HashMap::new();
		for wb in inner.blocks.values() {
			for tx in wb.txs() {
				*slot_counts.entry(tx.hash()).or_insert(0) += 1;
			}
		}
		assert_eq!(slot_counts.len(), inner.tx_pool.len());
		for (txid, count) in slot_counts {
			assert_eq!(inner.tx_pool[&txid].refs, count);
		}

		drop(inner);
		match self.get_weak_longest_chain_tip() {
			Some(tip) => assert!(longest_tips.contains(&tip.hash())),
			None => assert!(longest_height < 0),
		}
	}

	/// Assert that absolutely everything has been released.
	pub fn empty_check(&self) {
		let inner = self.inner.lock();
		assert_eq!(inner.tx_pool.len(), 0);
		assert_eq!(inner.blocks.len(), 0);
		assert_eq!(inner.miniextends.len(), 0);
		assert_eq!(inner.chain_tips.len(), 0);
		assert_eq!(inner.reassembled.len(), 0);
	}
}

/// Insert a transaction into the pool, or bump its refcount, returning
/// the pooled reference.
fn store_transaction(inner: &mut CacheInner, tx: &Transaction) -> Arc<Transaction> {
	let txid = tx.hash();
	if let Some(entry) = inner.tx_pool.get_mut(&txid) {
		entry.refs += 1;
		return entry.tx.clone();
	}
	let pooled = Arc::new(tx.clone());
	inner.tx_pool.insert(
		txid,
		TxEntry {
			tx: pooled.clone(),
			refs: 1,
		},
	);
	pooled
}

/// Opposite of `store_transaction`: drop one reference, freeing the
/// transaction when nothing holds it anymore.
fn remove_transaction(inner: &mut CacheInner, tx: &Arc<Transaction>) {
	let txid = tx.hash();
	let gone = match inner.tx_pool.get_mut(&txid) {
		Some(entry) => {
			debug_assert!(entry.refs > 0);
			entry.refs -= 1;
			entry.refs == 0
		}
		None => {
			debug_assert!(false, "releasing unpooled transaction {}", txid);
			false
		}
	};
	if gone {
		inner.tx_pool.remove(&txid);
	}
}

/// Tests whether `wb` is extending `under`: strictly more transactions,
/// and except for the coinbase all of `under`'s transactions appear in
/// `wb` at the same positions. This is the transitive partial order "<"
/// whose covering relation is "mini extends". Pointer equality on the
/// pooled references is content equality.
fn weak_extends(under: &Weakblock, wb: &Weakblock) -> bool {
	if wb.hash() == under.hash() {
		return false;
	}
	if wb.num_txs() <= under.num_txs() {
		return false;
	}
	for i in 1..under.num_txs() {
		if !Arc::ptr_eq(&wb.txs()[i], &under.txs()[i]) {
			return false;
		}
	}
	true
}

fn weak_height(inner: &CacheInner, hash: &Hash) -> i64 {
	match inner.miniextends.get(hash) {
		Some(under) => 1 + weak_height(inner, under),
		None => 0,
	}
}

/// Hook a freshly stored weak block into the DAG: find the highest block
/// it extends, walking candidate chains from the tips downward.
fn insert_chain_dag(inner: &mut CacheInner, wb: &Arc<Weakblock>) {
	debug_assert!(!inner.miniextends.contains_key(&wb.hash()));

	// try the longest chains first
	let mut to_check: BinaryHeap<(i64, Hash)> = inner
		.chain_tips
		.iter()
		.map(|tip| (weak_height(inner, tip), *tip))
		.collect();

	while let Some((_, candidate)) = to_check.pop() {
		// queue whatever the candidate builds on
		if let Some(under) = inner.miniextends.get(&candidate) {
			to_check.push((weak_height(inner, under), *under));
		}
		let candidate_wb = inner.blocks[&candidate].clone();
		if weak_extends(&candidate_wb, wb) {
			debug!("Weakblock {} extends {}.", wb.hash(), candidate);
			inner.miniextends.insert(wb.hash(), candidate);
			reconnect_nodes(inner, Some(candidate), wb);
			return;
		}
	}
	debug!(
		"Weakblock {} does not extend any previous weak block. Inserting as new chain tip and potentially stacking other chains on top.",
		wb.hash()
	);
	reconnect_nodes(inner, None, wb);
}

/// After `wb` attached above `candidate` (or as a root), rewire blocks
/// that used to attach at the same place and are covered by `wb`; they
/// now mini-extend `wb` instead. If anything was rewired `wb` is buried
/// inside a chain; otherwise it becomes a chain tip.
fn reconnect_nodes(inner: &mut CacheInner, candidate: Option<Hash>, wb: &Arc<Weakblock>) {
	let mut buried = false;
	let rewire: Vec<Hash> = {
		let blocks = &inner.blocks;
		let miniextends = &inner.miniextends;
		blocks
			.iter()
			.filter(|(t_hash, t_wb)| {
				let attaches = match candidate {
					Some(c) => miniextends.get(*t_hash) == Some(&c),
					None => !miniextends.contains_key(*t_hash),
				};
				attaches && weak_extends(wb, t_wb)
			})
			.map(|(t_hash, _)| *t_hash)
			.collect()
	};

	for t_hash in rewire {
		match candidate {
			Some(c) => debug!(
				"Weakblock {} mini-extended {} before. Now is mini-extending {}.",
				t_hash,
				c,
				wb.hash()
			),
			None => debug!(
				"Weakblock {} was root before. Now is mini-extending {}.",
				t_hash,
				wb.hash()
			),
		}
		inner.miniextends.insert(t_hash, wb.hash());
		// a rewired block was a tip of its chain relative to wb; wb sits
		// below it now
		buried = true;
	}

	if !buried {
		debug!("Block {} is not buried and thus a new chain tip.", wb.hash());
		if let Some(c) = candidate {
			if let Some(pos) = inner.chain_tips.iter().position(|t| *t == c) {
				debug!("Removing/replacing old chain tip {}.", c);
				inner.chain_tips.remove(pos);
			}
		}
		inner.chain_tips.push(wb.hash());
	}
}

/// Forget one weak block: release its transaction references and drop
/// its indexes and reassembly cache entry. The DAG bookkeeping
/// (`miniextends`, `chain_tips`) is the caller's business.
fn forget_weakblock(inner: &mut CacheInner, hash: &Hash) {
	debug!("Removing weakblock {}.", hash);
	if let Some(wb) = inner.blocks.remove(hash) {
		for tx in wb.txs() {
			remove_transaction(inner, tx);
		}
		inner.reassembled.remove(hash);
	}
}

/// Remove a chain tip and everything below it that no surviving chain
/// still builds on.
fn purge_chain_tip(inner: &mut CacheInner, tip: &Hash) {
	debug!("Purging weak block {}, which is currently a chain tip.", tip);
	if let Some(pos) = inner.chain_tips.iter().position(|t| t == tip) {
		inner.chain_tips.remove(pos);
	}

	let mut current = *tip;
	loop {
		forget_weakblock(inner, &current);
		match inner.miniextends.remove(&current) {
			Some(under) => {
				// stop if any other chain depends on the block below
				if inner.miniextends.values().any(|v| *v == under) {
					debug!(
						"Stopping removal at {} as it is used by another chain.",
						under
					);
					return;
				}
				current = under;
			}
			None => {
				debug!("Purge finished, reached bottom of chain.");
				return;
			}
		}
	}
}
