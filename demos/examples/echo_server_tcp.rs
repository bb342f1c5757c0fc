use clap::Parser;
use log::info;
use std::{
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use demos::helpers::init_logger;
use filterio::{Error, FilterChain, Heartbeat, IoHandler, Session};
use filterio_bootstrap::{ServerConfig, TcpServer};
use filterio_codec::{LineFramingFilter, StringFilter, TerminatorType};

////////////////////////////////////////////////////////////////////////////////////////////////////
struct EchoHandler;

impl IoHandler for EchoHandler {
    type Rin = String;
    type Wout = String;

    fn on_connect(&self, session: &Session) -> Option<String> {
        info!("{:?} joined", session.remote_addr());
        session.set_attribute("lines", AtomicUsize::new(0));
        Some("welcome, type `quit` to leave".to_owned())
    }

    fn on_receive(&self, session: &Session, msg: String) -> Option<String> {
        info!("received: {} from {:?}", msg, session.remote_addr());
        if let Some(lines) = session.attribute::<AtomicUsize>("lines") {
            lines.fetch_add(1, Ordering::Relaxed);
        }
        if msg.trim() == "quit" {
            session.close();
            return None;
        }
        Some(msg)
    }

    fn on_disconnect(&self, session: &Session) {
        let lines = session
            .attribute::<AtomicUsize>("lines")
            .map_or(0, |lines| lines.load(Ordering::Relaxed));
        info!(
            "{:?} left after {} lines ({:?})",
            session.remote_addr(),
            lines,
            session.close_reason()
        );
    }

    fn on_exception(&self, session: &Session, err: &Error) {
        info!("{:?} failed: {}", session.remote_addr(), err);
    }
}

#[derive(Parser)]
#[command(name = "Echo Server TCP")]
#[command(version = "0.0.0")]
#[command(about = "An example of echo server tcp", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("0.0.0.0"))]
    host: String,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, default_value_t = 60)]
    idle_timeout_secs: u64,
    /// Expect a PING from every client this often; 0 disables the heartbeat
    #[arg(long, default_value_t = 0)]
    heartbeat_secs: u64,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let host = cli.host;
    let port = cli.port;
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        init_logger(log_level);
    }

    let mut config = ServerConfig::new(host.clone(), port)
        .with_idle_timeout(Duration::from_secs(cli.idle_timeout_secs));
    if cli.heartbeat_secs > 0 {
        config = config.with_heartbeat(Heartbeat::new(Duration::from_secs(cli.heartbeat_secs)));
    }
    let mut server = TcpServer::new(config, EchoHandler);
    server.filter_chain(|| {
        FilterChain::new()
            .with(LineFramingFilter::new(8192, true, TerminatorType::BOTH))
            .with(StringFilter::new())
    });

    let local_addr = server.start().await?;
    info!("listening {}...", local_addr);
    info!("Press ctrl-c to stop");
    info!("try `nc {} {}` in another shell", host, port);

    let (tx, rx) = tokio::sync::oneshot::channel();
    let mut tx = Some(tx);
    ctrlc::set_handler(move || {
        if let Some(tx) = tx.take() {
            let _ = tx.send(());
        }
    })?;
    let _ = rx.await;

    info!("stopping with {} open sessions", server.session_count());
    server.graceful_stop().await;

    Ok(())
}
