use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::{info, warn};

use pi_pcap_bench::{
    ChunkedEstimator, Estimator, PI_TARGET, PcapSource, PortFilter, SequentialEstimator,
    SyntheticCapture, extract_filtered_records, extract_packet_records,
};

#[derive(Parser, Debug)]
#[command(name = "pi-pcap-bench")]
#[command(about = "Leibniz pi estimation and TCP/IP field extraction from PCAP files")]
#[command(version = "1.0.0")]
struct Args {
    /// Verbose logging (default: false)
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate pi; more terms give a more precise estimate
    Pi {
        /// Number of series terms to sum
        #[arg(allow_negative_numbers = true)]
        terms: i64,

        /// Which estimator(s) to run
        #[arg(long, value_enum, default_value_t = Variant::All)]
        variant: Variant,

        /// Worker threads for the chunked estimator (default: CPU count)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Decode a PCAP file into per-packet TCP/IP records
    PcapInfo {
        /// Path to PCAP file
        file: String,

        /// Only keep records with a source or destination port in this list (comma-separated)
        #[arg(short, long)]
        ports: Option<PortFilter>,

        /// Also print a summary of the whole capture
        #[arg(short, long)]
        summary: bool,

        /// Print the first N records
        #[arg(long, default_value = "0")]
        show: usize,
    },
    /// Write a synthetic PCAP file mixing TCP, UDP and ARP frames
    Generate {
        /// Output PCAP file path
        output: String,

        /// Number of packets to write
        #[arg(short, long, default_value = "1000")]
        count: usize,

        /// Source IP address for generated packets
        #[arg(long, default_value = "192.168.1.1")]
        src_ip: Ipv4Addr,

        /// Destination IP address for generated packets
        #[arg(long, default_value = "192.168.1.100")]
        dest_ip: Ipv4Addr,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Variant {
    Sequential,
    Chunked,
    All,
}

fn run_estimator(estimator: &dyn Estimator, terms: i64) -> Result<()> {
    info!("Running π estimation ({})", estimator.name());

    let start = Instant::now();
    let estimate = estimator
        .estimate(terms)
        .with_context(|| format!("{} estimation failed", estimator.name()))?;
    let elapsed = start.elapsed();

    info!("estimated: π={:.12}", estimate);
    info!("target:    π={:.12}", PI_TARGET);
    info!("error:     {:.3e}", (estimate - std::f64::consts::PI).abs());
    info!("Estimation took {:.2} seconds", elapsed.as_secs_f64());

    Ok(())
}

fn run_pi(terms: i64, variant: Variant, workers: Option<usize>) -> Result<()> {
    if matches!(variant, Variant::Sequential | Variant::All) {
        run_estimator(&SequentialEstimator, terms)?;
    }

    if matches!(variant, Variant::Chunked | Variant::All) {
        let estimator = match workers {
            Some(workers) => ChunkedEstimator::new(workers)?,
            None => ChunkedEstimator::default(),
        };
        info!("Chunked estimator using {} workers", estimator.workers());
        run_estimator(&estimator, terms)?;
    }

    Ok(())
}

fn run_pcap_info(file: &str, ports: Option<PortFilter>, summary: bool, show: usize) -> Result<()> {
    info!("Decoding packets from {}", file);

    let start = Instant::now();
    let mut source = PcapSource::open(file).context("Failed to open PCAP file")?;
    let records = match &ports {
        Some(filter) => {
            let list: Vec<u16> = filter.ports().collect();
            info!("Filtering on ports {:?}", list);
            extract_filtered_records(source.by_ref(), filter)
        }
        None => extract_packet_records(source.by_ref()),
    }
    .with_context(|| format!("Failed to decode packets from {}", file))?;
    let elapsed = start.elapsed();

    info!("Decoded packets: {}", records.len());
    info!("Pcap decoding took {:.2} seconds", elapsed.as_secs_f64());

    for record in records.iter().take(show) {
        info!("{}", record);
    }

    if summary {
        let analysis = source.summary();
        let ports: Vec<u16> = analysis.ports.iter().copied().collect();

        info!("PCAP analysis summary:");
        info!("  Total packets: {}", analysis.total_packets);
        info!("  IP packets: {}", analysis.network_packets);
        info!("  TCP/IP packets: {}", analysis.qualifying_packets);
        info!("  Duration: {:.3} seconds", analysis.duration_seconds);
        info!("  Detected {} unique ports: {:?}", ports.len(), ports);

        if analysis.qualifying_packets == 0 {
            warn!("No TCP/IP packets found in PCAP file");
            warn!("Check if your PCAP contains TCP traffic:");
            warn!("  tcpdump -r {} tcp -c 10", file);
        }
    }

    Ok(())
}

fn run_generate(output: &str, count: usize, src_ip: Ipv4Addr, dest_ip: Ipv4Addr) -> Result<()> {
    let mut capture = SyntheticCapture::new();

    for i in 0..count {
        let src_port = 40000 + (i % 1000) as u16;
        if i % 10 == 9 {
            capture.push_arp();
        } else if i % 5 == 4 {
            capture.push_udp(src_ip, dest_ip, src_port, 53, b"synthetic query");
        } else {
            let dest_port = if i % 2 == 0 { 80 } else { 443 };
            capture.push_tcp(src_ip, dest_ip, src_port, dest_port, b"synthetic payload");
        }
    }

    let written = capture
        .write_to(output)
        .with_context(|| format!("Failed to write {}", output))?;
    info!("Wrote {} packets to {}", written, output);

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match args.command {
        Commands::Pi {
            terms,
            variant,
            workers,
        } => run_pi(terms, variant, workers),
        Commands::PcapInfo {
            file,
            ports,
            summary,
            show,
        } => run_pcap_info(&file, ports, summary, show),
        Commands::Generate {
            output,
            count,
            src_ip,
            dest_ip,
        } => run_generate(&output, count, src_ip, dest_ip),
    }
}
