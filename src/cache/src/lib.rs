//! # Permscope Cache Guard
//!
//! Key-scoped "build exactly once, expire on TTL" cache used to own the
//! lifecycle of expensive, immutable snapshots (parsed datasets, indexes).
//!
//! ## Features
//!
//! - **Single-flight builds**: concurrent callers for the same key share one
//!   in-flight build instead of racing to populate the slot
//! - **Per-key exclusion**: builds for different keys run in parallel
//! - **TTL expiry**: a ready entry drops back to empty once its TTL elapses
//! - **No failure poisoning**: a failed build leaves nothing cached
//!
//! ## Example
//!
//! ```rust
//! use permscope_cache::CacheGuard;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache: CacheGuard<String, u32> = CacheGuard::new();
//!
//! let value = cache
//!     .get_or_build(&"answer".to_string(), Duration::from_secs(60), || async {
//!         Ok::<_, std::io::Error>(42)
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(value, 42);
//! assert_eq!(cache.stats().builds, 1);
//! # }
//! ```

mod entry;
mod guard;

pub use entry::{CacheEntry, CacheStats};
pub use guard::CacheGuard;
