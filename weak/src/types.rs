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

//! Weak-block configuration.

/// Absolute minimum POW target multiplier. Below this, incoming weak
/// blocks are considered invalid and the senders penalized.
pub const MIN_POW_RATIO: u32 = 600;

/// Minimum POW multiplier on POW-no-retarget networks.
pub const MIN_POW_RATIO_NO_RETARGET: u32 = 8;

/// Consideration ratio forced on POW-no-retarget networks.
pub const CONSIDER_POW_RATIO_NO_RETARGET: u32 = 4;

fn default_enable() -> bool {
	true
}
fn default_consider_pow_ratio() -> u32 {
	30
}
fn default_keep_chain_tips() -> usize {
	5
}

/// Weak-block processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeakConfig {
	/// Master on/off switch for weak-block processing.
	#[serde(default = "default_enable")]
	pub enable: bool,
	/// Ratio of the strong-block POW target above which weak blocks are
	/// considered. Forced to a network-specific value on POW-no-retarget
	/// chains.
	#[serde(default = "default_consider_pow_ratio")]
	pub consider_pow_ratio: u32,
	/// Number of latest chain tips to keep after each purge.
	#[serde(default = "default_keep_chain_tips")]
	pub keep_chain_tips: usize,
}

impl Default for WeakConfig {
	fn default() -> WeakConfig {
		WeakConfig {
			enable: default_enable(),
			consider_pow_ratio: default_consider_pow_ratio(),
			keep_chain_tips: default_keep_chain_tips(),
		}
	}
}
