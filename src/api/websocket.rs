//! Live board updates over WebSocket.
//!
//! Each client gets every [`BoardEvent`] as a JSON text frame, starting with
//! the current unclassified counts. Clients refetch `/board` on
//! `range_reset` and patch their view from the other events.

use std::time::{Duration, Instant};

use actix_web::{HttpRequest, HttpResponse, web};
use actix_ws::{Message, MessageStream, Session};
use futures_util::StreamExt;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::models::{BoardEvent, BoardEventMessage};
use crate::services::Board;

const HEARTBEAT: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(40);

/// Why a session loop ended.
#[derive(Debug)]
enum Disconnect {
    ClientClosed,
    SendFailed,
    StreamError,
    TimedOut,
    ChannelClosed,
}

/// Upgrade the connection and stream board events to it.
pub async fn board_events(
    req: HttpRequest,
    payload: web::Payload,
    board: web::Data<Board>,
) -> Result<HttpResponse, actix_web::Error> {
    let peer = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let (response, session, stream) = actix_ws::handle(&req, payload)?;

    // Subscribe before reading counts so nothing falls between them.
    let events = board.broadcaster().subscribe();
    let counts = board.state().await.counts();
    info!(client = %peer, subscribers = board.broadcaster().receiver_count(), "Board subscriber connected");

    let mut client = BoardClient {
        session,
        peer,
        last_heard: Instant::now(),
    };
    actix_web::rt::spawn(async move {
        let first = BoardEventMessage::new(BoardEvent::CountsUpdated(counts));
        let reason = if client.send(&first).await {
            client.run(stream, events).await
        } else {
            Disconnect::SendFailed
        };
        info!(client = %client.peer, reason = ?reason, "Board subscriber disconnected");
        let _ = client.session.close(None).await;
    });

    Ok(response)
}

struct BoardClient {
    session: Session,
    peer: String,
    last_heard: Instant,
}

impl BoardClient {
    async fn send(&mut self, message: &BoardEventMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => self.session.text(json).await.is_ok(),
            Err(e) => {
                warn!(error = %e, "Failed to serialize board event");
                true
            }
        }
    }

    async fn run(
        &mut self,
        mut stream: MessageStream,
        mut events: Receiver<BoardEventMessage>,
    ) -> Disconnect {
        let mut heartbeat = tokio::time::interval(HEARTBEAT);

        loop {
            tokio::select! {
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Ping(bytes))) => {
                        self.last_heard = Instant::now();
                        if self.session.pong(&bytes).await.is_err() {
                            return Disconnect::SendFailed;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => self.last_heard = Instant::now(),
                    Some(Ok(Message::Text(text))) => {
                        debug!(client = %self.peer, message = %text, "Board stream is one-way, ignoring");
                    }
                    Some(Ok(Message::Close(_))) | None => return Disconnect::ClientClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(client = %self.peer, error = %e, "WebSocket protocol error");
                        return Disconnect::StreamError;
                    }
                },

                event = events.recv() => match event {
                    Ok(message) => {
                        if !self.send(&message).await {
                            return Disconnect::SendFailed;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // Counts and range events repeat; the client catches up on the next one.
                        warn!(client = %self.peer, missed, "Board subscriber lagged");
                    }
                    Err(RecvError::Closed) => return Disconnect::ChannelClosed,
                },

                _ = heartbeat.tick() => {
                    if self.last_heard.elapsed() > CLIENT_TIMEOUT + HEARTBEAT {
                        return Disconnect::TimedOut;
                    }
                    if self.session.ping(b"").await.is_err() {
                        return Disconnect::SendFailed;
                    }
                }
            }
        }
    }
}

/// Configure WebSocket routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(board_events)));
}
