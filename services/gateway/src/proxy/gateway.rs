//! Per-connection dispatch.
//!
//! ```text
//! Idle -> Handshaking -> Rejected
//!                     -> StatusFlow -> Closed
//!                     -> LoginFlow  -> Closed
//! ```

use std::fmt;
use std::sync::Arc;

use craftgate_protocol::{Packet, RequestType, PING_PACKET_ID, STATUS_REQUEST_PACKET_ID};
use tracing::debug;

use super::store::ServerStore;
use crate::connection::{Connection, HsConnection, LoginConnection};
use crate::error::GatewayError;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A status response was served.
    Status,
    /// A login session was bridged to a backend and has finished.
    Login,
    /// The connection was dropped without calling a backend.
    Rejected(RejectReason),
}

/// Why a session ended before reaching a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    UnknownRequest { next_state: i32 },
    BackendNotFound { server_address: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownRequest { next_state } => {
                write!(f, "unknown request type {next_state}")
            }
            RejectReason::BackendNotFound { server_address } => {
                write!(f, "no backend for '{server_address}'")
            }
        }
    }
}

/// Routes accepted connections to backends.
pub struct Gateway {
    store: Arc<dyn ServerStore>,
}

impl Gateway {
    /// Gateway resolving backends through `store`.
    pub fn new(store: Arc<dyn ServerStore>) -> Self {
        Self { store }
    }

    /// Serve one connection to completion.
    ///
    /// The connection is consumed and dropped on every path, which closes
    /// the player's stream.
    pub async fn handle_connection<C>(&self, mut conn: C) -> Result<SessionOutcome, GatewayError>
    where
        C: LoginConnection,
    {
        let handshake = conn.handshake().await?;

        let request_type = handshake.request_type();
        let status_flow = match request_type {
            RequestType::Status => true,
            RequestType::Login => false,
            RequestType::Unknown => {
                let reason = RejectReason::UnknownRequest {
                    next_state: handshake.next_state,
                };
                debug!(reason = %reason, "Connection rejected");
                return Ok(SessionOutcome::Rejected(reason));
            }
        };

        let Some(backend) = self.store.find_server(&mut conn).await else {
            let reason = RejectReason::BackendNotFound {
                server_address: handshake.server_address,
            };
            debug!(reason = %reason, "Connection rejected");
            return Ok(SessionOutcome::Rejected(reason));
        };

        debug!(
            backend = %backend.id(),
            request_type = %request_type,
            server_address = %handshake.server_address,
            "Dispatching connection"
        );

        if status_flow {
            let response = backend.status(&mut conn).await?;
            serve_status(&mut conn, &response).await?;
            Ok(SessionOutcome::Status)
        } else {
            backend.login(&mut conn).await?;
            Ok(SessionOutcome::Login)
        }
    }
}

/// Finish the status exchange with the player: answer its status request
/// with `response`, then echo one optional ping.
async fn serve_status<C>(conn: &mut C, response: &Packet) -> Result<(), GatewayError>
where
    C: HsConnection + ?Sized,
{
    let request = conn.read_packet().await?;
    if request.id != STATUS_REQUEST_PACKET_ID {
        return Err(GatewayError::UnexpectedPacket {
            expected: STATUS_REQUEST_PACKET_ID,
            got: request.id,
        });
    }
    conn.write_packet(response).await?;

    let ping = match conn.read_packet().await {
        Ok(ping) => ping,
        Err(e) if e.is_connection_closed() => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if ping.id != PING_PACKET_ID {
        return Err(GatewayError::UnexpectedPacket {
            expected: PING_PACKET_ID,
            got: ping.id,
        });
    }
    conn.write_packet(&ping).await?;
    Ok(())
}
