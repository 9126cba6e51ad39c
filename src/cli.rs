use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logocraft")]
#[command(about = "Generate POS, kitchen display and thermal printer logos from one image")]
#[command(version)]
pub struct Cli {
    /// Source image (png, jpeg, jpg, bmp, gif, tiff, webp)
    #[arg(required_unless_present_any = ["list", "write_config"])]
    pub input: Option<PathBuf>,

    /// Output directory (default: the config's default_output_dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only produce this catalog entry; repeat for several (default: all)
    #[arg(short = 'f', long = "format", value_name = "NAME")]
    pub formats: Vec<String>,

    /// JSON config file with a custom catalog
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List catalog entries and exit
    #[arg(long)]
    pub list: bool,

    /// Write the active configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    pub write_config: Option<PathBuf>,

    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(short, long)]
    pub verbose: bool,
}
