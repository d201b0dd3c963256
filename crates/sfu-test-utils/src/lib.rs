//! # SFU Test Utilities
//!
//! Shared test utilities for the SFU signaling coordinator.
//!
//! ## Modules
//!
//! - `mock_engine` - In-memory media engine with deterministic IDs and failure knobs
//! - `fixtures` - Sample RTP, DTLS and SCTP parameter blobs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sfu_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let engine = MockEngine::builder()
//!         .with_latency(Duration::from_millis(5))
//!         .build();
//!
//!     // Hand `Arc::new(engine.clone())` to the registry, drive requests, then
//!     // inspect what the engine saw:
//!     assert_eq!(engine.routers_created(), 1);
//! }
//! ```

pub mod fixtures;
pub mod mock_engine;

pub use fixtures::*;
pub use mock_engine::*;
