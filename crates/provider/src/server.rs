//! go-plugin server
//!
//! Terraform starts the provider with a magic cookie in the environment and
//! reads one handshake line from stdout telling it where to dial.

use std::io::Write;
use std::net::SocketAddr;

use anyhow::{bail, Result};
use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::info;

use crate::generated::tfplugin6::provider_server::ProviderServer;
use crate::provider::CloudAvenueProvider;

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efef95d1ad38e2b1c69c8b5d2c0e";

/// go-plugin core protocol version
pub const CORE_PROTOCOL_VERSION: u32 = 1;
/// Terraform plugin protocol version
pub const PLUGIN_PROTOCOL_VERSION: u32 = 6;

/// Refuses to run unless launched by Terraform.
pub fn check_magic_cookie(value: Option<&str>) -> Result<()> {
    match value {
        Some(MAGIC_COOKIE_VALUE) => Ok(()),
        _ => bail!(
            "This binary is a plugin. These are not meant to be executed directly.\n\
             Please execute the program that consumes these plugins, which will\n\
             load any plugins automatically"
        ),
    }
}

/// `core|plugin|network|address|protocol`
pub fn handshake_line(addr: SocketAddr) -> String {
    format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PLUGIN_PROTOCOL_VERSION, addr
    )
}

/// Binds a local port, prints the handshake and serves until the stream
/// of connections ends.
pub async fn serve(provider: CloudAvenueProvider) -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    info!("Provider listening on {}", addr);

    // Terraform reads exactly one line from stdout.
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", handshake_line(addr))?;
    stdout.flush()?;
    info!("Handshake sent, starting gRPC server");

    // Serve on the bound listener so the advertised port cannot be taken.
    let incoming = futures::stream::unfold(listener, |listener| async move {
        let conn = listener.accept().await.map(|(stream, _)| stream);
        Some((conn, listener))
    });

    Server::builder()
        .add_service(ProviderServer::new(provider))
        .serve_with_incoming(incoming)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_line() {
        let addr: SocketAddr = "127.0.0.1:40123".parse().unwrap();
        assert_eq!(handshake_line(addr), "1|6|tcp|127.0.0.1:40123|grpc");
    }

    #[test]
    fn test_magic_cookie() {
        assert!(check_magic_cookie(Some(MAGIC_COOKIE_VALUE)).is_ok());
        assert!(check_magic_cookie(Some("nope")).is_err());
        let err = check_magic_cookie(None).unwrap_err();
        assert!(err.to_string().contains("This binary is a plugin"));
    }
}
