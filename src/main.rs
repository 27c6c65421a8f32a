//! `packet-tunnel` demo binary.
//!
//! Sends bursts of spam messages through the tunnel, ranging from a few bytes
//! to many transfer units, and checks that every message received from a
//! peer is intact and in sequence. Gaps are reported as lost messages.

mod cli;

use std::{collections::HashMap, error::Error, net::SocketAddr, time::Duration};

use bincode::{BorrowDecode, Encode};
use clap::Parser;
use packet_tunnel::{
    CompletedMessage,
    Message,
    PacketTunnelEngine,
    TunnelConfig,
    TunnelDriver,
    UdpTransport,
};
use tokio::{
    net::UdpSocket,
    signal,
    time::{self, Interval, MissedTickBehavior},
};
use tracing::{info, trace, warn};

const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Encode, BorrowDecode)]
struct Spam {
    sequence: u32,
    text: String,
}

impl Spam {
    fn new(sequence: u32, len: usize) -> Self {
        let text = ALPHABET.iter().cycle().take(len).map(|&b| char::from(b)).collect();
        Self { sequence, text }
    }

    fn is_intact(&self) -> bool {
        self.text
            .bytes()
            .zip(ALPHABET.iter().cycle())
            .all(|(got, &want)| got == want)
    }
}

struct SpamSender {
    next_sequence: u32,
    produced: usize,
    mtu: usize,
}

impl SpamSender {
    fn new(mtu: usize) -> Self {
        Self {
            next_sequence: 0,
            produced: 0,
            mtu,
        }
    }

    /// Mostly short messages, with every fifth one spanning up to fifty
    /// transfer units.
    fn next_len(&self) -> usize {
        let n = self.produced;
        if n % 5 == 0 {
            n.wrapping_mul(7919) % (self.mtu * 50)
        } else {
            n.wrapping_mul(31) % (self.mtu / 5).max(1)
        }
    }

    /// Queue roughly five transfer units worth of messages.
    fn burst(&mut self, engine: &mut PacketTunnelEngine) -> packet_tunnel::Result<()> {
        let first = self.next_sequence;
        let mut queued = 0;
        while queued < self.mtu * 5 {
            let spam = Spam::new(self.next_sequence, self.next_len());
            let bytes = spam.to_bytes()?;
            queued += bytes.len();
            engine.enqueue_outgoing(bytes)?;
            self.next_sequence = self.next_sequence.wrapping_add(1);
            self.produced += 1;
        }
        trace!(first, last = self.next_sequence.wrapping_sub(1), queued, "spam");
        Ok(())
    }
}

#[derive(Default)]
struct Verifier {
    expected: HashMap<SocketAddr, u32>,
    received: u64,
    lost: u64,
}

impl Verifier {
    fn check(&mut self, message: &CompletedMessage<SocketAddr>) -> Result<(), Box<dyn Error>> {
        let from = *message.source();
        let spam: Spam = message.decode()?;
        if !spam.is_intact() {
            return Err(format!(
                "malformed spam text in message {} from {from} ({} bytes)",
                spam.sequence,
                spam.text.len()
            )
            .into());
        }

        match self.expected.insert(from, spam.sequence.wrapping_add(1)) {
            Some(expected) if expected != spam.sequence => {
                let gap = spam.sequence.wrapping_sub(expected);
                if gap < u32::MAX / 2 {
                    warn!(%from, expected, got = spam.sequence, "sequence gap");
                    self.lost += u64::from(gap);
                } else {
                    info!(%from, got = spam.sequence, "peer restarted its sequence");
                }
            }
            _ => {}
        }
        self.received += 1;
        trace!(%from, sequence = spam.sequence, len = spam.text.len(), "received spam");
        Ok(())
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn spam_interval(hz: u32) -> Interval {
    // The command line refuses a zero rate.
    let period = Duration::from_secs(1) / hz.max(1);
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let socket = UdpSocket::bind(cli.bind).await?;
    socket.set_broadcast(cli.broadcast)?;

    let mut config = TunnelConfig::default()
        .with_max_transfer_unit(cli.mtu)
        .with_magic(cli.magic)
        .with_source_exclusion_id(cli.exclusion_id);
    if let Some(limit) = cli.max_message_size {
        config = config.with_max_incoming_message_size(limit);
    }
    let mut driver = TunnelDriver::new(config, UdpTransport::new(socket, cli.peer));

    let mtu = driver.engine().maximum_transfer_unit();
    info!(
        bind = %cli.bind,
        peer = %cli.peer,
        mtu,
        magic = cli.magic,
        mode = if cli.spam.is_some() { "spam" } else { "receive" },
        "packet tunnel running"
    );

    let mut spam_timer = cli.spam.map(spam_interval);
    let mut report = time::interval(Duration::from_secs(1));
    let mut sender = SpamSender::new(mtu);
    let mut verifier = Verifier::default();

    loop {
        let spam_due = tokio::select! {
            _ = signal::ctrl_c() => break,
            _ = report.tick() => {
                info!(
                    sent = sender.next_sequence,
                    received = verifier.received,
                    lost = verifier.lost,
                    "counters"
                );
                false
            }
            () = tick(&mut spam_timer) => true,
            received = driver.receive() => {
                for message in received? {
                    verifier.check(&message)?;
                }
                false
            }
        };

        if spam_due {
            sender.burst(driver.engine_mut())?;
            driver.flush().await?;
        }
    }

    info!("shutting down");
    Ok(())
}
