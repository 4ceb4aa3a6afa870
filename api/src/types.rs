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

//! Serializable response types.

/// Weak-block statistics, the `weakstats` document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeakStats {
	/// Number of weak blocks currently tracked.
	pub numknownweakblocks: usize,
	/// Number of distinct transactions in the weak-block pool.
	pub numknownweakblocktransactions: usize,
	/// Number of current weak chain tips.
	pub numweakchaintips: usize,
	/// Largest weak height over all chain tips; -1 when empty.
	pub maxweakchainheight: i64,
}
