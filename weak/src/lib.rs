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

//! The weak-block cache: an in-memory store of sub-threshold block
//! candidates, organized as a DAG of mini-extension relationships with
//! content-deduplicated transaction storage, chain-tip tracking and
//! bounded retention.
//!
//! A weak block is a block candidate whose proof-of-work misses the
//! strong target by a bounded ratio. Propagating them lets nodes
//! pre-share and deduplicate transaction data, so the eventual strong
//! block travels (and validates) much faster.

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
use bittern_util as util;

mod cache;
pub mod types;

pub use crate::cache::{WeakBlockCache, Weakblock};
pub use crate::types::WeakConfig;
