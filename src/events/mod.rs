//! # Events Module
//!
//! Progress reporting as a stream of value objects.
//!
//! ## Design
//! The pipeline emits events through a channel after each processed image,
//! checkpoint save and compared bucket. Front ends subscribe to the stream
//! instead of polling shared job state.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! // In a separate thread, listen for events
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Extract(ExtractEvent::Progress(p)) => {
//!                 println!("Extracted {}/{}", p.completed, p.total)
//!             }
//!             Event::Checkpoint(CheckpointEvent::Saved { records, .. }) => {
//!                 println!("Checkpoint: {} records", records)
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! // Run the pipeline with the sender
//! pipeline.run_with_events(root, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
