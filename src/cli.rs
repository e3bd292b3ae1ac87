use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gathergate")]
#[command(about = "Rank-partitioned analysis pipeline with a gated collective gather", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline over an in-process thread group
    Run {
        /// Number of ranks to spawn
        #[arg(short, long, default_value_t = 4)]
        ranks: usize,

        /// Participant count the pipeline requires (aborts otherwise)
        #[arg(long, default_value_t = 4)]
        required: usize,

        /// Elements per rank-local partition
        #[arg(short, long, default_value_t = 20)]
        partition_len: usize,

        /// Fault override as RANK:INDEX=VALUE (repeatable; default is the
        /// reference table "2:2=-1 3:2=0")
        #[arg(long = "fault", value_name = "RANK:INDEX=VALUE")]
        faults: Vec<String>,

        /// Disable fault injection entirely
        #[arg(long, conflicts_with = "faults")]
        no_faults: bool,

        /// Gate mode: "local" decides per rank, "agreed" takes a collective
        /// AND before anyone enters the gather
        #[arg(long, default_value = "local", value_parser = ["local", "agreed"])]
        gate: String,

        /// Collective rendezvous timeout in milliseconds (0 waits forever)
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,

        /// Output the run report as JSON instead of human-readable text
        #[arg(long)]
        json: bool,

        /// Suppress per-rank progress output
        #[arg(long)]
        quiet: bool,
    },

    /// Participate as one rank of an externally launched MPI group
    /// (mpirun -n 4 gathergate mpi)
    #[cfg(feature = "mpi")]
    Mpi {
        /// Participant count the pipeline requires (aborts otherwise)
        #[arg(long, default_value_t = 4)]
        required: usize,

        /// Elements per rank-local partition
        #[arg(short, long, default_value_t = 20)]
        partition_len: usize,

        /// Fault override as RANK:INDEX=VALUE (repeatable; default is the
        /// reference table "2:2=-1 3:2=0")
        #[arg(long = "fault", value_name = "RANK:INDEX=VALUE")]
        faults: Vec<String>,

        /// Disable fault injection entirely
        #[arg(long, conflicts_with = "faults")]
        no_faults: bool,

        /// Gate mode: "local" decides per rank, "agreed" takes a collective
        /// AND before anyone enters the gather
        #[arg(long, default_value = "local", value_parser = ["local", "agreed"])]
        gate: String,

        /// Suppress per-rank progress output
        #[arg(long)]
        quiet: bool,
    },
}
