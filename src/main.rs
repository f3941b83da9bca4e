use cinder::server::CinderServer;

/// Entry point: parses the command-line flags and runs the server. Exits
/// non-zero when the arguments are invalid or the listener cannot bind.
#[tokio::main]
async fn main() {
    let server = match CinderServer::new(std::env::args()) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to create server: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = server.run().await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
