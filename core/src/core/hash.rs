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

//! Hash Function
//!
//! Primary content identifier used to key transactions, blocks and
//! inventory advertisements.

use std::fmt;

use blake2_rfc::blake2b::Blake2b;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::util;

/// A hash to uniquely (or close enough) identify one of the main blockchain
/// constructs. Used pervasively for blocks and transactions.
#[derive(Copy, Clone, PartialEq, PartialOrd, Eq, Ord, Hash, Default)]
pub struct Hash(pub [u8; 32]);

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for i in self.0[..4].iter().cloned() {
			write!(f, "{:02x}", i)?;
		}
		Ok(())
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for i in self.0[..].iter().cloned() {
			write!(f, "{:02x}", i)?;
		}
		Ok(())
	}
}

impl Hash {
	/// Creates a new hash from a vector, zero-padding or truncating to 32
	/// bytes.
	pub fn from_vec(v: &[u8]) -> Hash {
		let mut h = [0; 32];
		let copy_size = v.len().min(32);
		h[..copy_size].copy_from_slice(&v[..copy_size]);
		Hash(h)
	}

	/// Converts the hash to a byte vector
	pub fn to_vec(&self) -> Vec<u8> {
		self.0.to_vec()
	}

	/// Converts the hash to a byte slice
	pub fn to_slice(&self) -> &[u8] {
		&self.0
	}

	/// Hex representation of the full hash
	pub fn to_hex(&self) -> String {
		util::to_hex(self.to_vec())
	}

	/// Parse a hash from its hex representation
	pub fn from_hex(hex: &str) -> Result<Hash, std::num::ParseIntError> {
		let bytes = util::from_hex(hex.to_string())?;
		Ok(Hash::from_vec(&bytes))
	}

	/// Low 64 bits of the hash, used for shard selection
	pub fn to_u64(&self) -> u64 {
		let mut n = 0u64;
		for i in (0..8).rev() {
			n = (n << 8) | self.0[i] as u64;
		}
		n
	}
}

impl Serialize for Hash {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> Deserialize<'de> for Hash {
	fn deserialize<D>(deserializer: D) -> Result<Hash, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Hash::from_hex(&s).map_err(D::Error::custom)
	}
}

/// The "zero" hash, conventionally distinct from every real content hash.
pub const ZERO_HASH: Hash = Hash([0; 32]);

/// A trait for types that get their hash (blake2b) from their byte
/// serialization.
pub trait Hashed {
	/// The hash of the type's byte representation
	fn hash(&self) -> Hash {
		let mut blake = Blake2b::new(32);
		blake.update(&self.bytes());
		Hash::from_vec(blake.finalize().as_bytes())
	}

	/// Byte representation the hash is computed over
	fn bytes(&self) -> Vec<u8>;
}

impl Hashed for [u8] {
	fn bytes(&self) -> Vec<u8> {
		self.to_owned()
	}
}

impl Hashed for Vec<u8> {
	fn bytes(&self) -> Vec<u8> {
		self.clone()
	}
}
