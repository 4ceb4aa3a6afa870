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

//! Inventory advertisements: the (type, hash) pairs peers use to announce
//! objects they hold.

use std::fmt;

use crate::core::hash::Hash;

enum_from_primitive! {
	/// Kind of object an inventory item refers to. Blocks and their thin
	/// variants share an object slot, keyed by the block hash.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub enum InvType {
		/// A transaction.
		Tx = 1,
		/// A full block.
		Block = 2,
		/// A thin block (header + known-tx shortids).
		ThinBlock = 3,
		/// An xtreme thin block.
		XThinBlock = 4,
	}
}

impl InvType {
	/// Whether this inventory type occupies a block object slot.
	pub fn is_block_kind(self) -> bool {
		match self {
			InvType::Tx => false,
			InvType::Block | InvType::ThinBlock | InvType::XThinBlock => true,
		}
	}
}

/// An inventory item: the advertisement of one fetchable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Inv {
	/// Kind of the advertised object.
	pub kind: InvType,
	/// Content identifier of the advertised object.
	pub hash: Hash,
}

impl Inv {
	/// Advertisement of a transaction.
	pub fn tx(hash: Hash) -> Inv {
		Inv {
			kind: InvType::Tx,
			hash,
		}
	}

	/// Advertisement of a full block.
	pub fn block(hash: Hash) -> Inv {
		Inv {
			kind: InvType::Block,
			hash,
		}
	}
}

impl fmt::Display for Inv {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}:{:?}", self.kind, self.hash)
	}
}
