//! # Pipeline Module
//!
//! Orchestrates the full duplicate detection workflow.
//!
//! ## Pipeline Stages
//! 1. **Discover** - Find candidate images under the root
//! 2. **Extract** - Fingerprint every image not already in the checkpoint,
//!    saving progress after each interval
//! 3. **Compare** - Bucket by aspect ratio, compare pairs inside each bucket
//! 4. **Cluster** - Merge duplicate edges into transitive groups
//! 5. **Score** - Rank group members and pick a keeper
//!
//! The checkpoint is cleared only after scoring succeeds. Any fatal error
//! leaves it where it is for the next resume.
//!
//! ## Parallelism
//! Uses rayon for parallel extraction within a checkpoint interval and for
//! comparing buckets. The record set itself is only written by the thread
//! driving the run.
//!
//! ## Example
//! ```rust,ignore
//! let pipeline = Pipeline::builder()
//!     .threshold(10)
//!     .hash_size(8)
//!     .resume(true)
//!     .build()?;
//! let result = pipeline.run(Path::new("/Users/photos"))?;
//! ```

mod executor;

pub use executor::{CancellationToken, ExtractionFailure, Pipeline, PipelineBuilder, PipelineResult};
