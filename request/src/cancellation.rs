use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::pin,
};

use futures::future::{select, Either};
use futures_channel::oneshot;
use leptos::logging;

use crate::{Cancelled, FetchError};

/// Identifies one issued [`CancellationToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(u64);

/// Abort capability for a single in-flight request.
///
/// The token resolves once its [`CancellationSlot`] aborts it, replaces it, or is dropped.
#[derive(Debug)]
pub struct CancellationToken {
    id: TokenId,
    receiver: oneshot::Receiver<()>,
}

impl CancellationToken {
    /// The id of this token, usable with [`CancellationSlot::release`].
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Resolves once the token is aborted or its slot lets go of it.
    pub async fn cancelled(self) {
        let _ = self.receiver.await;
    }
}

/// Holds at most one live [`CancellationToken`].
#[derive(Debug, Default)]
pub struct CancellationSlot {
    current: RefCell<Option<(TokenId, oneshot::Sender<()>)>>,
    next_id: Cell<u64>,
}

impl CancellationSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the held token (if any) and installs a fresh one.
    pub fn replace(&self) -> CancellationToken {
        self.abort_current();

        let id = TokenId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let (sender, receiver) = oneshot::channel();
        *self
            .current
            .try_borrow_mut()
            .expect("CancellationSlot::replace borrow_mut") = Some((id, sender));

        CancellationToken { id, receiver }
    }

    /// Aborts the held token without installing a new one.
    ///
    /// Returns `true` if a request was still listening for the abort.
    pub fn abort_current(&self) -> bool {
        let current = self
            .current
            .try_borrow_mut()
            .expect("CancellationSlot::abort_current borrow_mut")
            .take();

        match current {
            Some((_, sender)) => sender.send(()).is_ok(),
            None => false,
        }
    }

    /// Forgets the token with `id` without aborting it.
    ///
    /// Does nothing if the slot already holds a newer token.
    pub fn release(&self, id: TokenId) {
        let mut current = self
            .current
            .try_borrow_mut()
            .expect("CancellationSlot::release borrow_mut");

        if matches!(current.as_ref(), Some((current_id, _)) if *current_id == id) {
            current.take();
        }
    }

    /// Whether a token is currently held.
    pub fn is_active(&self) -> bool {
        self.current
            .try_borrow()
            .expect("CancellationSlot::is_active borrow")
            .is_some()
    }
}

/// Races `fut` against `token`. The token wins ties.
///
/// Yields [`FetchError::Cancelled`] when the token fires before `fut` completes.
pub async fn with_cancellation<T, Fu>(
    fut: Fu,
    token: CancellationToken,
) -> Result<T, FetchError>
where
    Fu: Future<Output = Result<T, FetchError>>,
{
    let fut = pin!(fut);

    match select(token.receiver, fut).await {
        Either::Left((signal, _)) => {
            if signal.is_err() {
                logging::debug_warn!("Cancellation slot was dropped while a request was in flight.");
            }
            Err(FetchError::Cancelled(Cancelled::new("request was aborted")))
        }
        Either::Right((result, _)) => result,
    }
}
