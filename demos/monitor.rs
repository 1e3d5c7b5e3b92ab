use std::net::{IpAddr, SocketAddr};

use switcher_link::{Session, SessionConfig, DEFAULT_PORT};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let Some(host) = std::env::args().nth(1) else {
        eprintln!("usage: monitor <switcher-ip> [port]");
        return;
    };
    let ip: IpAddr = match host.parse() {
        Ok(ip) => ip,
        Err(e) => {
            eprintln!("invalid address {}: {}", host, e);
            return;
        }
    };
    let port = std::env::args()
        .nth(2)
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::new(ip, port);

    println!("Connecting to {}...", addr);
    let session = match Session::connect(addr, SessionConfig::default()).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Connection failed: {}", e);
            return;
        }
    };

    if let Some(profile) = session.profile() {
        println!(
            "Connected to {} (protocol {})",
            profile.product_name.as_deref().unwrap_or("unknown switcher"),
            session.protocol_version()
        );
        println!("- Mix effects: {}", profile.mix_effects);
        println!("- Downstream keyers: {}", profile.downstream_keyers);
        println!("- Multiviewers: {}", profile.multiviewers);
        println!("- Super source: {}", profile.super_source);
        println!("- Audio mixer: {:?}", profile.audio_mixer);
        println!("- Inputs: {}", profile.inputs);
    }

    let (ended_tx, mut ended) = oneshot::channel();
    session.on_disconnected(move |reason| {
        warn!(%reason, "session ended");
        let _ = ended_tx.send(());
    });

    let mut changes = session.subscribe();
    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(change) => {
                    let paths: Vec<String> = change.paths.iter().map(ToString::to_string).collect();
                    info!(command = %change.command, paths = ?paths, "state changed");
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "change stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ended => break,
            _ = tokio::signal::ctrl_c() => {
                println!("Disconnecting...");
                session.disconnect().await;
                break;
            }
        }
    }
}
