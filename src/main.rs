//! # face-verify CLI
//!
//! Command-line interface for siamese face verification.
//!
//! ## Usage
//! ```bash
//! face-verify run --train people --test test_images --names Angelina,Brad
//! face-verify identify --checkpoint models/model_128.json --output json
//! ```

mod cli;

use face_verification::Result;

fn main() -> Result<()> {
    face_verification::init_tracing();
    cli::run()
}
