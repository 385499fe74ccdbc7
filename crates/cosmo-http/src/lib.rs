//! cosmo-http — the `reqwest`-backed [`cosmo_core::Transport`] shipped with
//! the Cosmopolite client. Test code and alternative deployments can supply
//! their own `Transport` impl instead (see `cosmo-client`'s mock transport).

mod client;

pub use client::{HttpTransport, HttpTransportConfig};
