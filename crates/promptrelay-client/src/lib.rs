//! PromptRelay chat client
//!
//! This crate provides:
//! - A streaming chat wrapper with validation, throttling, timeout and
//!   quota fallback, whose chunks are always displayable text
//! - A transport seam with relay and direct-upstream implementations
//! - A process-lifetime response cache for the non-streaming path

pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod throttle;
pub mod transport;
pub mod upstream;

pub use cache::ResponseCache;
pub use chat::{ChatClient, ChunkStream, collect_chunks};
pub use config::{ClientConfig, RETRY_DELAY_CEILING};
pub use error::{ClientError, Result};
#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockStep, MockStepKind, MockTransport};
pub use throttle::Throttle;
pub use transport::{ChatTransport, RelayTransport, TextStream};
pub use upstream::{GeminiClient, GenerationConfig};
