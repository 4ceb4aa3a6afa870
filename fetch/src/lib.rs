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

//! The request manager: an asynchronous fetch coordinator. Given
//! advertisements of transactions and blocks from many peers, it decides
//! who to ask for what and when, enforces rate limits, tracks outstanding
//! requests, retries after silence and cleans up when peers disconnect.
//!
//! Everything here is driven from the outside: the node calls `ask_for`
//! on advertisements, `received`/`rejected` on results, `remove_source`
//! on disconnect, and a periodic driver calls `send_requests`.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

use bittern_core as core;
use bittern_p2p as p2p;
use bittern_util as util;

mod manager;
mod record;
mod sharded_map;
mod stats;
pub mod types;

pub use crate::manager::{RecordView, RequestManager};
pub use crate::record::{ObjectRecord, SourceEntry};
pub use crate::sharded_map::{ShardedMap, NUM_SHARDS};
pub use crate::stats::{FetchStats, FetchStatsSnapshot};
pub use crate::types::{ChainAdapter, DummyChainAdapter, FetchConfig, RejectReason};
