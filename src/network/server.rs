use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use message_io::network::{Endpoint, NetEvent, SendStatus, Transport};
use message_io::node::{self, NodeHandler, NodeListener};
use rand::rngs::OsRng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::error::ProtocolError;

use super::config::ServerConfig;
use super::session::{ServerKeys, Session};
use super::{wire, Message};

/// The network server: accepts connections and drives one `Session` per
/// peer. Sessions are advanced sequentially on the event loop; only the
/// ciphertext batch work inside the state machines is parallel.
pub struct Server {
    handler: NodeHandler<()>,
    listener: Option<NodeListener<()>>,
    keys: Arc<ServerKeys>,
    config: ServerConfig,
    local_addr: SocketAddr,
}

impl Server {
    pub fn bind(config: ServerConfig) -> io::Result<Server> {
        let (handler, listener) = node::split::<()>();
        let (_, local_addr) =
            handler.network().listen(Transport::FramedTcp, &config.bind_addr)?;
        info!("listening on {}", local_addr);

        let mut rng = ChaCha20Rng::from_rng(OsRng).expect("seeding from the OS generator");
        let keys = Arc::new(ServerKeys::generate(&mut rng, config.key_bits));
        keys.paillier
            .public()
            .precompute_randomizers(config.precomputed_randomizers, &mut rng);
        debug!("precomputed {} Paillier randomizers", config.precomputed_randomizers);

        Ok(Server { handler, listener: Some(listener), keys, config, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A clonable handle; `stop()` ends the event loop.
    pub fn handle(&self) -> NodeHandler<()> {
        self.handler.clone()
    }

    pub fn run(mut self) {
        let listener = self.listener.take().unwrap();
        let handler = self.handler.clone();
        let keys = self.keys.clone();
        let config = self.config.clone();

        let mut sessions: HashMap<Endpoint, Session> = HashMap::new();
        let mut next_id = 0usize;

        listener.for_each(move |event| match event.network() {
            NetEvent::Connected(_, _) => unreachable!(),
            NetEvent::Accepted(endpoint, _) => {
                info!("connexion {} from {}", next_id, endpoint.addr());
                let rng = ChaCha20Rng::from_rng(OsRng).expect("seeding from the OS generator");
                sessions.insert(
                    endpoint,
                    Session::new(
                        next_id,
                        keys.clone(),
                        config.lambda,
                        config.comparison_value,
                        rng,
                    ),
                );
                next_id += 1;
            }
            NetEvent::Message(endpoint, data) => {
                let outcome = sessions
                    .get_mut(&endpoint)
                    .ok_or_else(|| ProtocolError::desync("server", "message from unknown peer"))
                    .and_then(|session| session.handle(wire::decode(data)?));

                match outcome {
                    Ok(replies) => {
                        for reply in replies {
                            send_message(&handler, endpoint, &reply);
                        }
                    }
                    Err(err) => {
                        warn!("session failed: {err}");
                        send_message(
                            &handler,
                            endpoint,
                            &Message::Error { context: err.to_string() },
                        );
                        sessions.remove(&endpoint);
                        handler.network().remove(endpoint.resource_id());
                    }
                }
            }
            NetEvent::Disconnected(endpoint) => {
                if let Some(session) = sessions.remove(&endpoint) {
                    info!("connexion {} closed", session.id());
                }
            }
        });
    }
}

fn send_message(handler: &NodeHandler<()>, endpoint: Endpoint, msg: &Message) {
    match wire::encode(msg) {
        Ok(data) => match handler.network().send(endpoint, &data) {
            SendStatus::Sent => {}
            _ => warn!("failed to send {} to {}", msg.label(), endpoint.addr()),
        },
        Err(err) => warn!("failed to encode {}: {err}", msg.label()),
    }
}

/// Spawn a server on a background thread; used by the binaries and the
/// loopback tests.
pub fn spawn(config: ServerConfig) -> io::Result<(SocketAddr, NodeHandler<()>)> {
    let server = Server::bind(config)?;
    let addr = server.local_addr();
    let handle = server.handle();
    std::thread::spawn(move || server.run());
    Ok((addr, handle))
}
