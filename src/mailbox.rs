//! Content-addressed delivery of shares on top of an unordered [`Channel`].
//!
//! The protocol never asks for "the next message", it asks for "the share party X sent for
//! gate G". The [`Mailbox`] answers that by pulling messages off the channel until the
//! requested one shows up, buffering everything else it sees along the way.

use std::collections::{HashMap, VecDeque};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    channel::{self, Channel, recv, send_to},
    circuit::{GateId, PartyId},
    field::FieldElement,
};

/// The wire format of a single share, tagged with its sender and the gate it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ShareMsg {
    pub(crate) sender: PartyId,
    pub(crate) gate: GateId,
    pub(crate) value: FieldElement,
}

/// What happens to a buffered share once it has been handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// The share stays in the mailbox and can be read again, e.g. an input share needed by
    /// several gates.
    Keep,
    /// The share is removed, so that a later message with the same sender and gate is not
    /// shadowed by this one.
    Evict,
}

/// The per-party buffer of shares received from all senders.
#[derive(Debug)]
pub struct Mailbox<'ch, C: Channel> {
    channel: &'ch C,
    party: PartyId,
    pending: HashMap<(PartyId, GateId), VecDeque<FieldElement>>,
}

impl<'ch, C: Channel> Mailbox<'ch, C> {
    /// Creates an empty mailbox for `party`, receiving over `channel`.
    pub fn new(channel: &'ch C, party: PartyId) -> Self {
        Self {
            channel,
            party,
            pending: HashMap::new(),
        }
    }

    /// Sends a share for `gate` to party `to`.
    ///
    /// A share addressed to this party itself never touches the channel, it is put straight
    /// into the buffer under the key `(own id, gate)`.
    pub async fn send_share(
        &mut self,
        to: PartyId,
        gate: GateId,
        value: FieldElement,
    ) -> Result<(), channel::Error> {
        if to == self.party {
            self.keep_own(gate, value);
            return Ok(());
        }
        publish(self.channel, self.party, to, gate, value).await
    }

    /// Sends a share for `gate` to each listed party.
    pub async fn scatter_shares(
        &mut self,
        gate: GateId,
        shares: impl IntoIterator<Item = (PartyId, FieldElement)>,
    ) -> Result<(), channel::Error> {
        let (channel, party) = (self.channel, self.party);
        let (own, remote): (Vec<_>, Vec<_>) =
            shares.into_iter().partition(|(to, _)| *to == party);
        try_join_all(
            remote
                .into_iter()
                .map(|(to, value)| publish(channel, party, to, gate, value)),
        )
        .await?;
        for (_, value) in own {
            self.keep_own(gate, value);
        }
        Ok(())
    }

    fn keep_own(&mut self, gate: GateId, value: FieldElement) {
        trace!(gate, %value, "keeping own share");
        self.pending
            .entry((self.party, gate))
            .or_default()
            .push_back(value);
    }

    /// Returns the share `sender` sent for `gate`, waiting until it has arrived.
    ///
    /// Messages from other senders or for other gates that arrive in the meantime are
    /// buffered. If several shares with the same sender and gate are buffered, they are
    /// handed out in arrival order.
    pub async fn await_share(
        &mut self,
        sender: PartyId,
        gate: GateId,
        retention: Retention,
    ) -> Result<FieldElement, channel::Error> {
        loop {
            if let Some(value) = self.take(sender, gate, retention) {
                trace!(sender, gate, %value, ?retention, "received share");
                return Ok(value);
            }
            let msg: ShareMsg = recv(self.channel, "share").await?;
            if (msg.sender, msg.gate) != (sender, gate) {
                trace!(
                    sender = msg.sender,
                    gate = msg.gate,
                    "buffering share while waiting for gate {gate} of party {sender}"
                );
            }
            self.pending
                .entry((msg.sender, msg.gate))
                .or_default()
                .push_back(msg.value);
        }
    }

    fn take(
        &mut self,
        sender: PartyId,
        gate: GateId,
        retention: Retention,
    ) -> Option<FieldElement> {
        let queue = self.pending.get_mut(&(sender, gate))?;
        match retention {
            Retention::Keep => queue.front().copied(),
            Retention::Evict => {
                let value = queue.pop_front();
                if queue.is_empty() {
                    self.pending.remove(&(sender, gate));
                }
                value
            }
        }
    }
}

async fn publish(
    channel: &impl Channel,
    sender: PartyId,
    to: PartyId,
    gate: GateId,
    value: FieldElement,
) -> Result<(), channel::Error> {
    let msg = ShareMsg {
        sender,
        gate,
        value,
    };
    trace!(to, gate, %value, "sending share");
    send_to(channel, to, "share", &msg).await
}
