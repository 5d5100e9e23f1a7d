//! A publish/subscribe [`Channel`] over plain TCP connections.
//!
//! Every party listens on its own address. Each sender opens one connection to every party
//! (including itself) and writes length-prefixed frames, so messages of one sender arrive in
//! order. All incoming connections feed a single inbox, which interleaves the senders.

use std::{io, net::SocketAddr, time::Duration};

use bgw::{channel::Channel, circuit::PartyId};
use futures::future::try_join_all;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{
        Mutex,
        mpsc::{Receiver, Sender, channel},
    },
    time::sleep,
};
use tracing::{debug, trace, warn};

const CONNECT_ATTEMPTS: u32 = 20;
const RETRY_DELAY: Duration = Duration::from_millis(250);
const INBOX_CAPACITY: usize = 1024;
/// Frames are single shares, anything larger is treated as a broken connection.
const MAX_FRAME_LEN: u32 = 1 << 16;

/// The sending and receiving side of a party's TCP connections.
#[derive(Debug)]
pub struct TcpChannel {
    party: PartyId,
    peers: Vec<Mutex<TcpStream>>,
    inbox: Mutex<Receiver<Vec<u8>>>,
}

impl TcpChannel {
    /// Accepts connections on `listener` and connects to all `peers`, `peers[p - 1]` being the
    /// address of party `p`.
    ///
    /// Waits `sync_delay` before connecting so that the other parties can start listening, and
    /// retries refused connections for a while after that.
    pub async fn new(
        party: PartyId,
        listener: TcpListener,
        peers: &[SocketAddr],
        sync_delay: Duration,
    ) -> io::Result<Self> {
        let (inbox_tx, inbox_rx) = channel(INBOX_CAPACITY);
        tokio::spawn(accept_loop(party, listener, inbox_tx));
        sleep(sync_delay).await;
        let peers = try_join_all(peers.iter().map(|addr| connect(party, *addr))).await?;
        Ok(Self {
            party,
            peers: peers.into_iter().map(Mutex::new).collect(),
            inbox: Mutex::new(inbox_rx),
        })
    }
}

async fn connect(party: PartyId, addr: SocketAddr) -> io::Result<TcpStream> {
    let mut attempt = 1;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                debug!(party, %addr, "connected");
                return Ok(stream);
            }
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                debug!(party, %addr, attempt, "could not connect: {e}");
                attempt += 1;
                sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn accept_loop(party: PartyId, listener: TcpListener, inbox: Sender<Vec<u8>>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                trace!(party, %addr, "accepted connection");
                tokio::spawn(read_frames(stream, inbox.clone()));
            }
            Err(e) => {
                warn!(party, "could not accept connection: {e}");
                return;
            }
        }
    }
}

async fn read_frames(mut stream: TcpStream, inbox: Sender<Vec<u8>>) {
    loop {
        let len = match stream.read_u32().await {
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return,
            Err(e) => {
                warn!("could not read frame: {e}");
                return;
            }
        };
        if len > MAX_FRAME_LEN {
            warn!(len, "dropping connection after an oversized frame");
            return;
        }
        let mut frame = vec![0; len as usize];
        if let Err(e) = stream.read_exact(&mut frame).await {
            warn!("could not read frame: {e}");
            return;
        }
        if inbox.send(frame).await.is_err() {
            return;
        }
    }
}

impl Channel for TcpChannel {
    type SendError = io::Error;
    type RecvError = io::Error;

    async fn send_bytes_to(&self, p: PartyId, msg: Vec<u8>, phase: &str) -> io::Result<()> {
        let Some(peer) = p.checked_sub(1).and_then(|i| self.peers.get(i)) else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("party {p} does not exist"),
            ));
        };
        let len = u32::try_from(msg.len())
            .ok()
            .filter(|len| *len <= MAX_FRAME_LEN)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "message too large"))?;
        trace!(from = self.party, to = p, phase, len, "sending frame");
        let mut stream = peer.lock().await;
        stream.write_u32(len).await?;
        stream.write_all(&msg).await?;
        stream.flush().await
    }

    async fn recv_bytes(&self, _phase: &str) -> io::Result<Vec<u8>> {
        self.inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "all connections closed"))
    }
}

#[cfg(test)]
mod tests {
    use bgw::{config::Config, fixtures, protocol::mpc};

    use super::*;

    async fn listeners(parties: usize) -> io::Result<(Vec<TcpListener>, Vec<SocketAddr>)> {
        let mut listeners = vec![];
        let mut addrs = vec![];
        for _ in 0..parties {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            addrs.push(listener.local_addr()?);
            listeners.push(listener);
        }
        Ok((listeners, addrs))
    }

    #[tokio::test]
    async fn parties_compute_over_tcp() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixtures::sum_then_product()?;
        let (listeners, addrs) = listeners(3).await?;
        let channels = try_join_all(
            listeners
                .into_iter()
                .enumerate()
                .map(|(i, l)| TcpChannel::new(i + 1, l, &addrs, Duration::from_millis(50))),
        )
        .await?;
        let config = Config {
            seed: Some(5),
            ..Config::default()
        };
        let runs = channels.iter().enumerate().map(|(i, channel)| {
            let mut rng = config.party_rng(i + 1);
            let circuit = &fixture.circuit;
            let value = fixture.private_values[i];
            async move { mpc(channel, circuit, i + 1, value, &mut rng).await }
        });
        let outcomes = try_join_all(runs).await?;
        assert!(outcomes.iter().all(|o| o.result().value() == 35));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_unknown_parties() -> io::Result<()> {
        let (mut listeners, addrs) = listeners(1).await?;
        let channel = TcpChannel::new(1, listeners.remove(0), &addrs, Duration::ZERO).await?;
        channel.send_bytes_to(1, vec![1, 2, 3], "test").await?;
        assert_eq!(channel.recv_bytes("test").await?, vec![1, 2, 3]);
        let err = channel.send_bytes_to(2, vec![], "test").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_frames_close_the_connection() -> io::Result<()> {
        let (mut listeners, addrs) = listeners(1).await?;
        let channel = TcpChannel::new(1, listeners.remove(0), &addrs, Duration::ZERO).await?;
        let too_large = vec![0; MAX_FRAME_LEN as usize + 1];
        let err = channel.send_bytes_to(1, too_large, "test").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let mut peer = TcpStream::connect(addrs[0]).await?;
        peer.write_u32(u32::MAX).await?;
        let mut buf = [0; 1];
        let read = tokio::time::timeout(Duration::from_secs(5), peer.read(&mut buf)).await?;
        assert_eq!(read?, 0, "the connection should be closed");

        channel.send_bytes_to(1, vec![4, 2], "test").await?;
        assert_eq!(channel.recv_bytes("test").await?, vec![4, 2]);
        Ok(())
    }
}
