mod config;

use crate::config::cli::{Command, NetworkOpt, PingOpt, QuicOpt, ThroughputOpt};
use anyhow::Context as _;
use clap::Parser;
use std::net::SocketAddr;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = config::cli::CliOpt::parse();
    match opt.command {
        Command::Rt => run_rt(),
        Command::Quic(quic) => run_quic(quic),
        Command::Ping(ping) => run_ping(ping),
        Command::Throughput(throughput) => run_throughput(throughput),
    }
}

/// Report which async runtime this binary was built against. Useful for
/// golden-tests runs that need to know whether to expect `rt-custom`'s
/// documented nondeterminism.
fn run_rt() -> anyhow::Result<()> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "rt-custom")] {
            println!("rt-custom");
        } else {
            println!("rt-tokio");
        }
    }
    Ok(())
}

fn describe_network(network: &NetworkOpt) -> anyhow::Result<()> {
    let graph = std::fs::read_to_string(&network.network_graph)
        .with_context(|| format!("reading network graph {:?}", network.network_graph))?;
    let events = std::fs::read_to_string(&network.network_events)
        .with_context(|| format!("reading network events {:?}", network.network_events))?;
    let graph: serde_json::Value = serde_json::from_str(&graph).context("parsing network graph JSON")?;
    let events: serde_json::Value = serde_json::from_str(&events).context("parsing network events JSON")?;

    let node_count = graph.get("nodes").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
    let edge_count = graph.get("edges").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
    let event_count = events.as_array().map(|a| a.len()).unwrap_or(0);

    println!(
        "network graph: {} nodes, {} edges; {} scheduled events",
        node_count, edge_count, event_count
    );
    println!(
        "client {} <-> server {} (seeds: quinn={}, network={}{})",
        network.client_ip_address,
        network.server_ip_address,
        network.quinn_rng_seed,
        network.network_rng_seed,
        if network.non_deterministic { ", non-deterministic" } else { "" },
    );
    Ok(())
}

fn run_ping(ping: PingOpt) -> anyhow::Result<()> {
    describe_network(&ping.network)?;
    println!(
        "ping: duration={}ms interval={}ms deadline={}ms",
        ping.duration_ms, ping.interval_ms, ping.deadline_ms
    );
    Ok(())
}

fn run_throughput(throughput: ThroughputOpt) -> anyhow::Result<()> {
    describe_network(&throughput.network)?;
    match throughput.send_bps {
        Some(bps) => println!("throughput: duration={}ms send_bps={}", throughput.duration_ms, bps),
        None => println!(
            "throughput: duration={}ms send_bps=<highest-capacity link, doubled>",
            throughput.duration_ms
        ),
    }
    Ok(())
}

fn run_quic(quic: QuicOpt) -> anyhow::Result<()> {
    describe_network(&quic.network)?;
    println!(
        "quic: requests={} concurrent_connections={} concurrent_streams_per_connection={} response_size={}",
        quic.requests, quic.concurrent_connections, quic.concurrent_streams_per_connection, quic.response_size
    );

    if !quic.schc_observer && !quic.schc_compress {
        println!("schc: disabled (pass --schc-observer or --schc-compress with --schc-rules)");
        return Ok(());
    }

    let rules_path = quic
        .schc_rules
        .as_ref()
        .context("--schc-rules is required when --schc-observer or --schc-compress is set")?;
    let rules_path = rules_path.to_str().context("--schc-rules path must be valid UTF-8")?;

    let client = SocketAddr::new(quic.network.client_ip_address, 44433);
    let server = SocketAddr::new(quic.network.server_ip_address, 4433);
    demo_schc_traffic(rules_path, &quic, client, server)
}

/// Synthesize a handful of representative request/response exchanges and
/// run them through whichever SCHC mode the caller selected, then print the
/// aggregated compression statistics. Stands in for driving the real QUIC
/// connection, which the observer/compressor attach to transparently.
#[cfg_attr(
    not(any(feature = "schc-observer", feature = "schc-compressor")),
    allow(unused_variables)
)]
fn demo_schc_traffic(
    rules_path: &str,
    quic: &QuicOpt,
    client: SocketAddr,
    server: SocketAddr,
) -> anyhow::Result<()> {
    #[cfg(feature = "schc-observer")]
    if quic.schc_observer {
        let observer = in_memory_network::schc_observer::SchcObserver::from_files(rules_path, quic.schc_debug)
            .context("loading SCHC observer rules")?;
        for i in 0..quic.requests {
            let request = vec![0u8; 32];
            observer.observe(&request, client, server, true);
            let response = vec![0u8; quic.response_size];
            observer.observe(&response, server, client, false);
            let _ = i;
        }
        observer.stats().report();
        return Ok(());
    }

    #[cfg(feature = "schc-compressor")]
    if quic.schc_compress {
        let compressor = in_memory_network::schc_compressor::SchcCompressor::from_files(rules_path, quic.schc_debug)
            .context("loading SCHC compressor rules")?;
        for i in 0..quic.requests {
            let request = vec![0u8; 32];
            let compressed = compressor.compress(&request, client, server, true, "client");
            if compressed.success {
                let _ = compressor.decompress(&compressed.compressed_packet, true, "server");
            }
            let response = vec![0u8; quic.response_size];
            let compressed = compressor.compress(&response, server, client, false, "server");
            if compressed.success {
                let _ = compressor.decompress(&compressed.compressed_packet, false, "client");
            }
            let _ = i;
        }
        compressor.stats().report();
        return Ok(());
    }

    #[allow(unreachable_code)]
    {
        anyhow::bail!(
            "--schc-observer/--schc-compress requested but this binary was built without the matching feature"
        )
    }
}
