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

//! Transactions, reduced to what the acquisition subsystem needs: an
//! opaque body with a stable content hash. Validation and consensus
//! semantics live elsewhere in the node.

use crate::core::hash::{Hash, Hashed};

/// A transaction as the acquisition subsystem sees it: raw bytes plus the
/// content hash derived from them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
	/// Serialized transaction body.
	pub body: Vec<u8>,
}

impl Transaction {
	/// Wrap a serialized transaction body.
	pub fn new(body: Vec<u8>) -> Transaction {
		Transaction { body }
	}

	/// Size of the serialized body in bytes.
	pub fn size(&self) -> usize {
		self.body.len()
	}
}

impl Hashed for Transaction {
	fn bytes(&self) -> Vec<u8> {
		self.body.clone()
	}
}
