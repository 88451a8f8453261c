//! Spectator join request.

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use crate::error::NetResult;
use crate::protocol::Message;
use crate::transport::UdpTransport;

/// Times a spectator repeats its join request.
pub const SPECTATE_REPEATS: u32 = 3;

/// Pause between repeated join requests.
pub const SPECTATE_SPACING: Duration = Duration::from_millis(100);

/// Sends `SPECTATOR_REQUEST` to `host` a few times. Best effort: the host
/// accepts unconditionally and never answers.
///
/// # Errors
///
/// Socket errors from the first send.
pub fn request_spectate(transport: &UdpTransport, host: SocketAddr, name: &str) -> NetResult<()> {
    let request = Message::SpectatorRequest {
        name: Some(name.to_string()),
    };
    transport.send_message(&request, host)?;
    for _ in 1..SPECTATE_REPEATS {
        thread::sleep(SPECTATE_SPACING);
        if let Err(e) = transport.send_message(&request, host) {
            tracing::warn!(%host, error = %e, "spectator request resend failed");
        }
    }
    tracing::info!(%host, "spectator request sent");
    Ok(())
}
