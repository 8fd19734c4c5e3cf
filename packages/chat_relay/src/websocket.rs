use axum::extract::ws::{Message, WebSocket};
use futures::future;
use futures_util::{SinkExt, StreamExt};
use tracing::info;

use crate::hub::ChatHub;
use crate::session::{Frame, run_session};

impl From<Message> for Frame {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Close(_) => Frame::Close,
            // axum answers pings itself; binary has no meaning in this protocol
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => Frame::Other,
        }
    }
}

fn text_message(text: String) -> future::Ready<Result<Message, axum::Error>> {
    future::ready(Ok(Message::Text(text.into())))
}

/// Run the chat session protocol over an upgraded websocket.
pub async fn handle_websocket(socket: WebSocket, origin: String, hub: &ChatHub) {
    info!("WebSocket connection from {}", origin);

    let (sender, receiver) = socket.split();
    let outbound = sender.with(text_message);
    let inbound = receiver.map(|msg| msg.map(Frame::from));

    let outcome = run_session(hub, &origin, inbound, outbound).await;
    info!(
        "WebSocket connection from {} closed (name: {:?}, messages: {})",
        origin, outcome.name, outcome.messages
    );
}
