mod client_server;
mod forwarding;
mod helpers;
mod websocket;
