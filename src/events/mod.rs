//! # Events Module
//!
//! Progress reporting for long-running phases (loading, training, matching).
//!
//! The core library emits events through a channel so the CLI can render
//! progress bars on another thread. Callers without a UI pass
//! [`null_sender`].
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Train(TrainEvent::EpochCompleted(p)) = event {
//!             println!("epoch {}/{} loss {:.4}", p.epoch, p.total_epochs, p.loss);
//!         }
//!     }
//! });
//!
//! pipeline.run_with_events(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
