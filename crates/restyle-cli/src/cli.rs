use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "restyle")]
#[command(about = "Migrate a legacy stylesheet into Site Builder output buckets")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Parser, Debug)]
pub enum Commands {
    Migrate {
        /// Legacy stylesheet to transform.
        input: PathBuf,
        /// Directory receiving one <bucket>.css per category.
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,
        /// JSON override for the keyword pattern families.
        #[arg(long)]
        patterns: Option<PathBuf>,
        /// JSON file of extra template mixins merged over the builtins.
        #[arg(long)]
        mixins: Option<PathBuf>,
        /// Brand payload appended verbatim to the general bucket.
        #[arg(long)]
        brand_payload: Option<PathBuf>,
        /// Skip chrome-pattern exclusion (header/nav/footer rules kept).
        #[arg(long)]
        keep_chrome: bool,
    },
}
