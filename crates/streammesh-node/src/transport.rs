use crate::connection::handle_connection;
use crate::node::Node;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

/// One route: a binary-frame WebSocket upgrade at the root path, mirroring
/// the teacher's `wsrpc::serve` plumbing but without its JSON request
/// multiplexing layer, since this dialect has its own framing.
pub fn routes(node: Arc<Node>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::ws())
        .and(warp::any().map(move || node.clone()))
        .map(|ws: warp::ws::Ws, node: Arc<Node>| {
            ws.max_frame_size(16 << 20)
                .max_message_size(64 << 20)
                .on_upgrade(move |socket| handle_connection(socket, node))
        })
}
