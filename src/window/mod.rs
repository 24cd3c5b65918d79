//! Streaming window construction
//!
//! ```text
//! candle stream → WindowBuilder ──push──→ CircularCandleBuffer (capacity W)
//!                      │
//!                      └── every S pushes once warmed up → Window
//! ```

pub mod builder;
pub mod ring_buffer;

pub use builder::{BuilderConfig, BuilderState, WindowBuilder};
pub use ring_buffer::CircularCandleBuffer;
