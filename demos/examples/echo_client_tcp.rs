use clap::Parser;
use log::info;
use std::{io::BufRead, str::FromStr, time::Duration};

use demos::helpers::init_logger;
use filterio::{FilterChain, FnHandler};
use filterio_bootstrap::{ClientConfig, TcpClient};
use filterio_codec::{LineFramingFilter, StringFilter, TerminatorType};

#[derive(Parser)]
#[command(name = "Echo Client TCP")]
#[command(version = "0.0.0")]
#[command(about = "An example of echo client tcp", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("127.0.0.1"))]
    host: String,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, default_value_t = 3000)]
    connect_timeout_ms: u64,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        init_logger(log_level);
    }

    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let handler = FnHandler::new(|_session, line: String| {
        println!("< {}", line);
        None::<String>
    })
    .with_disconnect(move |session| {
        info!("disconnected ({:?})", session.close_reason());
        let _ = done_tx.send(());
    });

    let config = ClientConfig::new(cli.host, cli.port)
        .with_connect_timeout(Duration::from_millis(cli.connect_timeout_ms));
    let mut client = TcpClient::new(config, handler);
    client.filter_chain(|| {
        FilterChain::new()
            .with(LineFramingFilter::new(8192, true, TerminatorType::BOTH))
            .with(StringFilter::new())
    });

    let session = client.connect().await?;
    info!("connected to {:?}", session.remote_addr());

    // stdin is blocking, read it on its own thread
    let writer = session.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if writer.send(line).is_err() {
                break;
            }
        }
        writer.close();
    });

    let _ = done_rx.recv().await;
    client.graceful_stop().await;

    Ok(())
}
