//! Command line interface for the `packet-tunnel` demo binary.
//!
//! Also included by `build.rs` to render the man page, so it may depend on
//! nothing but `clap` and `std`.

use std::net::SocketAddr;

use clap::Parser;

/// Command line arguments for the `packet-tunnel` binary.
#[derive(Debug, Parser)]
#[command(
    name = "packet-tunnel",
    version,
    about = "Tunnel messages of any size over UDP and verify they arrive intact"
)]
pub struct Cli {
    /// Local address to bind.
    #[arg(short, long, default_value = "0.0.0.0:9999")]
    pub bind: SocketAddr,

    /// Address every packet is sent to.
    #[arg(short, long, default_value = "255.255.255.255:9999")]
    pub peer: SocketAddr,

    /// Largest packet to send, header included.
    #[arg(long, default_value_t = 1388)]
    pub mtu: usize,

    /// Protocol magic number; both ends must agree.
    #[arg(long, default_value_t = 666)]
    pub magic: u32,

    /// Ignore packets tagged with this id. Zero disables the filter.
    #[arg(long, default_value_t = 0)]
    pub exclusion_id: u32,

    /// Send bursts of spam messages this many times per second.
    /// Without it the binary only receives.
    #[arg(long, value_name = "HZ", value_parser = clap::value_parser!(u32).range(1..))]
    pub spam: Option<u32>,

    /// Largest incoming message to reassemble.
    #[arg(long)]
    pub max_message_size: Option<usize>,

    /// Enable broadcast on the socket.
    #[arg(long)]
    pub broadcast: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn parses_spam_options() {
        let cli = Cli::parse_from([
            "packet-tunnel",
            "--peer",
            "127.0.0.1:4000",
            "--mtu",
            "500",
            "--spam",
            "20",
            "--broadcast",
        ]);
        assert_eq!(cli.peer.port(), 4000);
        assert_eq!(cli.mtu, 500);
        assert_eq!(cli.spam, Some(20));
        assert!(cli.broadcast);
        assert_eq!(cli.exclusion_id, 0);
        assert!(cli.max_message_size.is_none());
    }

    #[test]
    fn zero_spam_rate_is_rejected() {
        let err = Cli::try_parse_from(["packet-tunnel", "--spam", "0"])
            .expect_err("a zero rate must be refused");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn receive_mode_is_the_default() {
        let cli = Cli::parse_from(["packet-tunnel"]);
        assert!(cli.spam.is_none());
        assert_eq!(cli.bind.port(), 9999);
    }
}
