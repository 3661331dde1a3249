//! Model Connection Adapters.
//!
//! Implementations of the ModelConnector port.
//!
//! ## Available Adapters
//!
//! - `MockModelConnector` - Scripted mock for testing
//! - `GeminiConnector` - Google Gemini models over SSE

mod gemini_connection;
mod mock_connection;

pub use gemini_connection::{GeminiConfig, GeminiConnection, GeminiConnector};
pub use mock_connection::{MockCall, MockConnection, MockModelConnector, MockReply};
