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

use bittern_p2p::Capabilities;

// We use `contains()` to filter capabilities bits.
#[test]
fn capabilities_contains() {
	let x = Capabilities::THIN_BLOCKS;

	// capabilities contain themselves
	assert!(x.contains(Capabilities::THIN_BLOCKS));

	// UNKNOWN can be used to filter for any capabilities
	assert!(x.contains(Capabilities::UNKNOWN));

	// capabilities do not contain other disjoint capabilities
	assert_eq!(false, x.contains(Capabilities::PEER_LIST));
}

#[test]
fn default_capabilities() {
	let x = Capabilities::default();

	assert!(x.contains(Capabilities::FULL_HIST));
	assert!(x.contains(Capabilities::PEER_LIST));
	assert!(x.contains(Capabilities::THIN_BLOCKS));

	assert_eq!(
		x,
		Capabilities::FULL_HIST | Capabilities::PEER_LIST | Capabilities::THIN_BLOCKS
	);
}
