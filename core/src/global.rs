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

//! Values that should be shared across all modules, without necessarily
//! having to pass them all over the place, but aren't consensus values.
//! should be used sparingly.

use crate::util::RwLock;

/// Chain parameter sets the node can run against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ChainTypes {
	/// Local throwaway chain for tests and development; no POW
	/// retargeting.
	Regtest,
	/// Public test network.
	Testnet,
	/// Main production network.
	Mainnet,
}

impl Default for ChainTypes {
	fn default() -> ChainTypes {
		ChainTypes::Mainnet
	}
}

lazy_static! {
	/// The chain type the node currently runs against
	pub static ref CHAIN_TYPE: RwLock<ChainTypes> = RwLock::new(ChainTypes::Mainnet);
}

/// Set the chain type. Called once at startup (and freely in tests).
pub fn set_chain_type(new_type: ChainTypes) {
	let mut chain_type = CHAIN_TYPE.write();
	*chain_type = new_type;
}

/// The currently configured chain type.
pub fn chain_type() -> ChainTypes {
	*CHAIN_TYPE.read()
}

/// Whether the node runs against a local regression-test chain.
pub fn is_regtest() -> bool {
	chain_type() == ChainTypes::Regtest
}

/// Whether the chain runs without POW retargeting. Parameter selection
/// for weak blocks keys off this.
pub fn pow_no_retargeting() -> bool {
	chain_type() == ChainTypes::Regtest
}
