//! # image-dedup CLI
//!
//! Command-line interface for the duplicate image detector.
//!
//! ## Usage
//! ```bash
//! image-dedup scan ~/Photos --threshold 10
//! image-dedup scan ~/Photos --resume --output json
//! ```

mod cli;

use image_dedup::Result;

fn main() -> Result<()> {
    cli::run()
}
