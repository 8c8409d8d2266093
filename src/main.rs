use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dam", version = "1.0.0", about = "DAM (dessicated BAM) archive format CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dessicate a BAM/SAM/TAM alignment file into a .dam archive
    Dessicate {
        input: PathBuf,
        output: PathBuf,
        /// Temporary directory hint for the external sort; may repeat
        #[arg(long = "tmpdir")]
        tmpdirs: Vec<PathBuf>,
    },
    /// Reconstruct a BAM file from a .dam archive and a sequence source
    Hydrate {
        archive: PathBuf,
        reads: PathBuf,
        output: PathBuf,
    },
    /// Print the SAM header then dessicated records in an id range
    #[command(name = "dam_view")]
    DamView {
        archive: PathBuf,
        start_id: Option<String>,
        end_id: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        // ── dessicate ────────────────────────────────────────────────────────
        Commands::Dessicate { input, output, tmpdirs } => {
            dam::dessicate(&output, &input, &tmpdirs)?;
            let size = std::fs::metadata(&output)?.len();
            println!("Dessicated {} -> {} ({} B on disk)", input.display(), output.display(), size);
        }

        // ── hydrate ──────────────────────────────────────────────────────────
        Commands::Hydrate { archive, reads, output } => {
            let reader = dam::Reader::new(&archive);
            let mut sam_bytes = Vec::new();
            let stats = dam::rehydrate(&reader, &reads, &mut sam_bytes)?;

            let bam_writer = dam::procs::pipe_into_stdin(sam_bytes, "samtools", &["view", "-bS", "-"])?;
            let bam = dam::procs::drain_stdout(bam_writer)?;
            std::fs::write(&output, &bam)?;

            println!(
                "Hydrated {} against {} -> {} ({} emitted, {} reinjected, {} left dessicated)",
                archive.display(),
                reads.display(),
                output.display(),
                stats.emitted,
                stats.reinjected,
                stats.left_dessicated,
            );
        }

        // ── dam_view ─────────────────────────────────────────────────────────
        Commands::DamView { archive, start_id, end_id } => {
            let reader = dam::Reader::new(&archive);
            print!("{}", String::from_utf8_lossy(&reader.sam_header()?));
            for line in reader.iterator(start_id.as_deref(), end_id.as_deref())? {
                println!("{}", line?);
            }
        }
    }

    Ok(())
}
