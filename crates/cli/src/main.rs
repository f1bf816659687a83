use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use rtp_jpeg::jpeg::marker::SOS;
use rtp_jpeg::jpeg::quant::{estimate_average_quality, estimate_quality};
use rtp_jpeg::jpeg::scan;
use rtp_jpeg::media::mjpeg::header::MainHeader;
use rtp_jpeg::media::mjpeg::{DEFAULT_MTU, JpegFrame};
use rtp_jpeg::{
    Depacketizer, DepacketizerConfig, MjpegDepacketizer, MjpegPacketizer, Packetizer,
    PacketizerConfig, RtpPacket, SessionDescription, generate_sdp,
};

#[derive(Parser)]
#[command(
    name = "rtp-jpeg",
    about = "Packetize JPEG images as RFC 2435 RTP streams and back",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the markers of a JPEG file and the RFC 2435 parameters it maps to
    Inspect { file: PathBuf },
    /// Print one line per RTP packet produced for a JPEG file
    Packetize {
        file: PathBuf,
        #[command(flatten)]
        packetizer: PacketizerArgs,
    },
    /// Packetize and depacketize a JPEG file, checking that the scan survives
    Roundtrip {
        file: PathBuf,
        #[command(flatten)]
        packetizer: PacketizerArgs,
        #[command(flatten)]
        depacketizer: DepacketizerArgs,
        /// Write the reassembled JPEG here
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the SDP describing a JPEG stream
    Sdp {
        /// Address for the origin and connection lines
        #[arg(long, default_value = "127.0.0.1")]
        ip: String,
    },
}

#[derive(Args)]
struct PacketizerArgs {
    /// Q value to send (1..=255); omit to send the image's tables with Q=255
    #[arg(long, short, value_parser = clap::value_parser!(u8).range(1..))]
    quality: Option<u8>,
    /// Restart interval to announce, overriding the image's DRI
    #[arg(long)]
    restart_interval: Option<u16>,
    /// Maximum RTP payload size
    #[arg(long, default_value_t = DEFAULT_MTU)]
    mtu: usize,
}

impl PacketizerArgs {
    fn config(&self) -> PacketizerConfig {
        PacketizerConfig {
            quality: self.quality,
            restart_interval: self.restart_interval,
            mtu: self.mtu,
        }
    }
}

#[derive(Args)]
struct DepacketizerArgs {
    /// Treat Q >= 100 as inline tables and accept Types 2..=5
    #[arg(long)]
    legacy_q: bool,
    /// Use the row-order base tables for Q-derived tables
    #[arg(long)]
    alt_quantizer: bool,
}

impl DepacketizerArgs {
    fn config(&self) -> DepacketizerConfig {
        DepacketizerConfig {
            legacy_q_mode: self.legacy_q,
            use_alt_quantizer: self.alt_quantizer,
        }
    }
}

/// 30 fps at 90 kHz.
const TIMESTAMP_INCREMENT: u32 = 3000;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Inspect { file } => inspect(&file),
        Command::Packetize { file, packetizer } => packetize(&file, &packetizer),
        Command::Roundtrip {
            file,
            packetizer,
            depacketizer,
            output,
        } => roundtrip(&file, &packetizer, &depacketizer, output.as_deref()),
        Command::Sdp { ip } => {
            let packetizer = MjpegPacketizer::with_random_ssrc(PacketizerConfig::default());
            print!("{}", generate_sdp(&packetizer, &ip, &SessionDescription::default()));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn inspect(file: &Path) -> Result<(), Box<dyn Error>> {
    let data = fs::read(file)?;

    let mut offset = 0;
    let mut scanner = scan(&data[..]);
    while let Some(marker) = scanner.next() {
        let kind = marker
            .kind()
            .map(|k| format!("{:?}", k))
            .unwrap_or_default();
        let start = scanner.position() - marker.encoded_len();
        println!(
            "{:>8}  FF{:02X}  {:<10} length {}",
            start, marker.code, kind, marker.declared_length
        );
        offset = scanner.position();
    }
    println!("{} bytes, markers end at {}", data.len(), offset);

    let frame = JpegFrame::parse(&data)?;
    println!(
        "type {} type-specific {:#04x} {}x{} restart interval {} scan {} bytes",
        frame.type_,
        frame.type_specific,
        frame.width,
        frame.height,
        frame.restart_interval,
        frame.scan.len()
    );
    let tables = &frame.tables;
    if !tables.is_empty() {
        let luma = estimate_quality(tables.is_sixteen_bit(0), &tables.tables, 0);
        let average =
            estimate_average_quality(tables.precision, &tables.tables, 0, tables.tables.len());
        println!(
            "{} quantization tables, estimated quality {} (luma DC) / {} (average)",
            tables.table_count(),
            luma,
            average
        );
    }
    Ok(())
}

fn packetize(file: &Path, args: &PacketizerArgs) -> Result<(), Box<dyn Error>> {
    let data = fs::read(file)?;
    let mut packetizer = MjpegPacketizer::with_random_ssrc(args.config());
    let packets = packetizer.packetize(&data, TIMESTAMP_INCREMENT)?;

    for packet in &packets {
        let rtp = RtpPacket::parse(packet)?;
        let header = MainHeader::parse(rtp.payload)?;
        println!(
            "seq {:>5}  ts {}  {}  offset {:>8}  type {:>3}  q {:>3}  {}x{}  {} bytes",
            rtp.sequence,
            rtp.timestamp,
            if rtp.marker { "M" } else { "-" },
            header.fragment_offset,
            header.type_,
            header.q,
            header.width_pixels(),
            header.height_pixels(),
            packet.len()
        );
    }
    println!("{} packets, ssrc {:#010X}", packets.len(), packetizer.ssrc());
    Ok(())
}

fn roundtrip(
    file: &Path,
    packetizer_args: &PacketizerArgs,
    depacketizer_args: &DepacketizerArgs,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let data = fs::read(file)?;
    let mut packetizer = MjpegPacketizer::with_random_ssrc(packetizer_args.config());
    let mut depacketizer = MjpegDepacketizer::new(depacketizer_args.config());

    let packets = packetizer.packetize(&data, TIMESTAMP_INCREMENT)?;
    let mut frames = Vec::new();
    for packet in &packets {
        frames.extend(depacketizer.depacketize(packet)?);
    }
    let Some(rebuilt) = frames.pop() else {
        return Err("no frame reassembled".into());
    };

    let same_scan = from_start_of_scan(&rebuilt) == from_start_of_scan(&data);
    println!(
        "{} packets, {} -> {} bytes, scan {}",
        packets.len(),
        data.len(),
        rebuilt.len(),
        if same_scan { "identical" } else { "differs" }
    );

    if let Some(path) = output {
        fs::write(path, &rebuilt)?;
        tracing::info!(path = %path.display(), len = rebuilt.len(), "wrote reassembled JPEG");
    }

    if same_scan {
        Ok(())
    } else {
        Err("scan data changed in transit".into())
    }
}

/// Bytes from the first SOS marker on, or everything if there is none.
fn from_start_of_scan(jpeg: &[u8]) -> &[u8] {
    let mut scanner = scan(jpeg);
    while let Some(marker) = scanner.next() {
        if marker.code == SOS {
            return &jpeg[scanner.position() - marker.encoded_len()..];
        }
    }
    jpeg
}
