//! microsub-core: feed fetching, parsing, normalizing, and tiering.
//!
//! This crate holds the parts of the ingestion engine that do not touch
//! storage: the uniform item representation (§3), the multi-format parser/
//! normalizer (C2), the conditional-GET fetcher (C1), the HTML sanitizer
//! (§4.2), channel-filter predicates (part of C5), the tier-interval math
//! (C6), and the opaque timeline cursor used by the Item Store (C3).

mod cursor;
mod datetime;
mod feed_kind;
mod fetch;
mod filter;
mod item;
mod mention;
mod parser;
pub mod prelude;
mod sanitize;
mod tier;
mod uid;

use prelude::internal::*;
use prelude::*;
