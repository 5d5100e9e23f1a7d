//! A publish/subscribe style communication channel between the parties.
//!
//! Every party publishes messages addressed to a single destination party and receives all
//! messages addressed to itself through one inbound stream. Messages from the same sender
//! arrive in the order they were sent, messages from different senders are interleaved
//! arbitrarily.

use std::{fmt, future::Future};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::{
    Mutex,
    mpsc::{Receiver, Sender, channel, error::SendError},
};

use crate::circuit::PartyId;

/// Errors related to sending / receiving / (de-)serializing messages.
#[derive(Debug)]
pub struct Error {
    /// The protocol phase during which the error occurred.
    pub phase: String,
    /// The specific error that was raised.
    pub reason: ErrorKind,
}

/// The specific error that occurred when trying to send / receive a message.
#[derive(Debug)]
pub enum ErrorKind {
    /// The (serialized) message could not be received over the channel.
    RecvError(String),
    /// The (serialized) message could not be sent over the channel.
    SendError(String),
    /// The message could not be (de-)serialized.
    SerdeError(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ErrorKind::RecvError(e) => write!(f, "could not receive {}: {e}", self.phase),
            ErrorKind::SendError(e) => write!(f, "could not send {}: {e}", self.phase),
            ErrorKind::SerdeError(e) => write!(f, "malformed message in {}: {e}", self.phase),
        }
    }
}

/// A communication channel used to publish messages to the other parties and to receive the
/// messages they address to this party.
pub trait Channel {
    /// The error that can occur sending messages over the channel.
    type SendError: fmt::Debug;
    /// The error that can occur receiving messages over the channel.
    type RecvError: fmt::Debug;

    /// Sends a message to the party with the given id (must be between `1..=parties`), which
    /// may be the sending party itself.
    fn send_bytes_to(
        &self,
        party: PartyId,
        msg: Vec<u8>,
        phase: &str,
    ) -> impl Future<Output = Result<(), Self::SendError>> + Send;

    /// Awaits the next message addressed to this party, from whichever sender it comes.
    fn recv_bytes(
        &self,
        phase: &str,
    ) -> impl Future<Output = Result<Vec<u8>, Self::RecvError>> + Send;
}

/// Serializes and sends a message to the given party.
pub(crate) async fn send_to<T: Serialize>(
    channel: &impl Channel,
    party: PartyId,
    phase: &str,
    msg: &T,
) -> Result<(), Error> {
    let msg = bincode::serialize(msg).map_err(|e| Error {
        phase: format!("sending {phase}"),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })?;
    channel
        .send_bytes_to(party, msg, phase)
        .await
        .map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::SendError(format!("{e:?}")),
        })
}

/// Receives and deserializes the next message addressed to this party.
pub(crate) async fn recv<T: DeserializeOwned>(
    channel: &impl Channel,
    phase: &str,
) -> Result<T, Error> {
    let msg = channel.recv_bytes(phase).await.map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::RecvError(format!("{e:?}")),
    })?;
    bincode::deserialize(&msg).map_err(|e| Error {
        phase: format!("receiving {phase}"),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })
}

/// A simple in-memory channel using [`Sender`] and [`Receiver`].
///
/// Each party owns a single inbound queue that all parties (including itself) publish into,
/// which preserves per-sender order but interleaves different senders.
#[derive(Debug)]
pub struct SimpleChannel {
    s: Vec<Sender<Vec<u8>>>,
    r: Mutex<Receiver<Vec<u8>>>,
}

impl SimpleChannel {
    /// Creates channels for N parties to communicate with each other, where the channel of
    /// party `p` is at index `p - 1`.
    pub fn channels(parties: usize) -> Vec<Self> {
        let buffer_capacity = 1024;
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..parties).map(|_| channel(buffer_capacity)).unzip();
        receivers
            .into_iter()
            .map(|r| SimpleChannel {
                s: senders.clone(),
                r: Mutex::new(r),
            })
            .collect()
    }
}

/// The error raised by `send` calls of a [`SimpleChannel`].
#[derive(Debug)]
pub enum AsyncSendError {
    /// There is no party with this id.
    UnknownParty(PartyId),
    /// The receiving party has dropped its channel.
    Closed(SendError<Vec<u8>>),
}

#[derive(Debug)]
/// The error raised by `recv` calls of a [`SimpleChannel`].
pub enum AsyncRecvError {
    /// The channel has been closed.
    Closed,
}

impl Channel for SimpleChannel {
    type SendError = AsyncSendError;
    type RecvError = AsyncRecvError;

    async fn send_bytes_to(
        &self,
        p: PartyId,
        msg: Vec<u8>,
        _phase: &str,
    ) -> Result<(), AsyncSendError> {
        let Some(sender) = p.checked_sub(1).and_then(|i| self.s.get(i)) else {
            return Err(AsyncSendError::UnknownParty(p));
        };
        sender.send(msg).await.map_err(AsyncSendError::Closed)
    }

    async fn recv_bytes(&self, _phase: &str) -> Result<Vec<u8>, AsyncRecvError> {
        self.r.lock().await.recv().await.ok_or(AsyncRecvError::Closed)
    }
}
