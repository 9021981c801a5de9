pub(crate) mod decoder;
pub(crate) mod encoder;
pub(crate) mod error;
pub(crate) mod event;
pub(crate) mod event_kind;
pub(crate) mod session_event;

pub use decoder::EventReader;
pub use encoder::{Encoder, HEADER_SIZE};
pub use error::{DecodeError, EncodeError};
pub use event::{Event, SourceAddr};
pub use event_kind::EventKind;
pub use session_event::SessionEventKind;
