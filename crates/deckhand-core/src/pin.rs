//! Scoped external references on remote handles

use std::ops::Deref;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::remote::RemoteHandle;
use crate::session::Session;

/// An extra external reference on a handle, dropped with the guard.
///
/// Keeps the remote object reachable through its proxy while a multi-call
/// sequence is in flight, independent of registry bookkeeping.
#[must_use = "the pin is released as soon as the guard is dropped"]
pub struct PinGuard<'a, H: RemoteHandle + ?Sized> {
    handle: Arc<H>,
    session: &'a Session,
}

impl<'a, H: RemoteHandle + ?Sized> PinGuard<'a, H> {
    pub(crate) fn new(handle: Arc<H>, session: &'a Session) -> Self {
        Self { handle, session }
    }

    /// The pinned handle
    pub fn handle(&self) -> &Arc<H> {
        &self.handle
    }
}

impl<H: RemoteHandle + ?Sized> Deref for PinGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<H: RemoteHandle + ?Sized> Drop for PinGuard<'_, H> {
    fn drop(&mut self) {
        match self.handle.release_ref() {
            Ok(count) => debug!(
                session = %self.session.id(),
                what = %self.handle.describe(),
                refs = count,
                "Unpinned handle"
            ),
            Err(e) => warn!(
                session = %self.session.id(),
                what = %self.handle.describe(),
                error = %e,
                "Failed to unpin handle"
            ),
        }
        self.session.note_unpinned();
    }
}
