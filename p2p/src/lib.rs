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

//! The peer-facing surface consumed by the acquisition engines: a
//! refcounted peer handle, a registry of connected peers and the
//! outbound messages they can be asked to emit. Connection lifecycle and
//! wire serialization are handled elsewhere in the node; this crate ends
//! at the `Protocol` trait.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate enum_primitive;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

use bittern_core as core;
use bittern_util as util;

pub mod msg;
mod peer;
mod peers;
pub mod types;

pub use crate::msg::{BloomFilter, Msg, Type};
pub use crate::peer::{Peer, TxLatency};
pub use crate::peers::Peers;
pub use crate::types::{Capabilities, Error, PeerId, PeerInfo, Protocol, TrackingProtocol};
