use clap::Parser;
use log::info;
use server::network::Server;
use server::rooms::{RoomRegistry, DEFAULT_ROOMS};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "2000")]
    port: u16,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value = "64")]
    max_clients: usize,

    /// Comma-separated room names (defaults to the built-in set)
    #[arg(short, long, value_delimiter = ',')]
    rooms: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let rooms = if args.rooms.is_empty() {
        RoomRegistry::new(DEFAULT_ROOMS)
    } else {
        RoomRegistry::new(args.rooms.iter().map(|name| name.trim()))
    };

    let address = format!("{}:{}", args.host, args.port);
    info!("Starting server on {} (max {} clients)", address, args.max_clients);

    let mut server = Server::new(&address, args.max_clients, rooms).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
