//! # Trellis Test
//!
//! Test utilities for Trellis: temporary filesystem trees and a harness that
//! drives a real [`RequestProcessor`](trellis_pipeline::RequestProcessor)
//! over them.
//!
//! ## Key Features
//!
//! - **Fixtures**: [`FsFixture`] owns temporary `www` and `project` trees
//! - **Lazy processor**: built on first hit, rebuilt after `configure`
//! - **Early return**: stop after any stage with `return_after`
//! - **Dot-path results**: pick any value out of the final state with `want`
//!
//! ## Example
//!
//! ```
//! use trellis_test::{Harness, HitOptions};
//!
//! let mut harness = Harness::new().unwrap();
//! harness.fs().mk_www("%name/index.html.spt", "Hi, {name}!").unwrap();
//!
//! let name = harness
//!     .hit("/alice/", "", &HitOptions::default().want("path.name"))
//!     .unwrap();
//! assert_eq!(name, "alice");
//!
//! let status = harness
//!     .hit("/alice", "", &HitOptions::default().deferred().want("output.status"))
//!     .unwrap();
//! assert_eq!(status, 302);
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod fixture;
mod harness;

pub use error::TestError;
pub use fixture::FsFixture;
pub use harness::{output_body, Harness, HitOptions};
