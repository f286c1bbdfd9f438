//! Progress stream listener.
//!
//! The [`StreamListener`] is the background task that owns the WebSocket
//! connection to the server's event stream. It decodes each frame as a
//! [`ProgressEvent`], feeds chunk progress to the multiplexer, and turns the
//! terminal conditions into cancellation triggers:
//!
//! | Condition                          | Trigger          |
//! |------------------------------------|------------------|
//! | event with `done = true`           | `RemoteDone`     |
//! | dial failure                       | `TransportError` |
//! | read or decode failure             | `TransportError` |
//! | server closes before completion    | `TransportError` |

mod error;
mod event;
mod stream;

pub use error::StreamError;
pub use event::ProgressEvent;
pub use stream::{stream_listener_factory, StreamListener, LISTENER_TASK_NAME};
