mod action;
mod client;
mod error;
mod registry;
mod server_portal;
mod server_session;
mod session_core;
mod state;

pub use action::SessionAction;
pub use client::Client;
pub use error::SessionError;
pub use registry::{SessionRegistry, SharedServerSession};
pub use server_portal::{PortalSessions, ServerPortal};
pub use server_session::ServerSession;
pub use state::{SessionRole, SessionState};

use xbridge_shared::{SessionEventData, SessionHandle, SessionId};

/// Behaviour common to the three participant roles
pub trait Session {
    fn id(&self) -> SessionId;

    fn role(&self) -> SessionRole;

    fn state(&self) -> SessionState;

    /// Starts the close sequence. Idempotent: once closing, returns success
    /// without calling the transport again.
    fn close(&mut self) -> Result<(), SessionError>;

    /// Applies one lifecycle event, returning the identity the consumer must
    /// be notified under, or `None` when the event was absorbed
    fn interpret_event(
        &mut self,
        session: SessionHandle,
        event: &SessionEventData,
    ) -> Option<SessionId>;

    fn is_client(&self) -> bool {
        self.role() == SessionRole::Client
    }

    fn is_closing(&self) -> bool {
        self.state().is_closing()
    }
}
