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

//! Facade over the bittern object-acquisition subsystem: wires the
//! request manager, the weak-block cache and the peer registry into a
//! single [`Node`] value with the event surface the surrounding node
//! drives.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub use bittern_api as api;
pub use bittern_core as core;
pub use bittern_fetch as fetch;
pub use bittern_p2p as p2p;
pub use bittern_util as util;
pub use bittern_weak as weak;

mod node;

pub use crate::node::{run_requester, Node, NodeConfig};
