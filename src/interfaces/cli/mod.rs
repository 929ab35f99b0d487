//! Command-line interface of kpsym.

use std::path::PathBuf;

use clap::Parser;

use crate::io::format::kpsym_output;

const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Logs a nicely formatted kpsym heading to the `kpsym-output` logger.
pub fn log_heading() {
    let version = if let Some(ver) = VERSION {
        format!("v{ver}")
    } else {
        "v unknown".to_string()
    };
    kpsym_output!("╭─────────────────────────────────────────────────────────────────────────────────────────────────────╮");
    kpsym_output!("│                                                                                                     │");
    kpsym_output!("│   kk       kk  ppppppp    sssssss  yy      yy  mmmmmm   mmmmmm                                      │");
    kpsym_output!("│   kk     kk    pp    pp  ss         yy    yy   mm   mm mm   mm                                      │");
    kpsym_output!("│   kk   kk      pp    pp   sssss      yy  yy    mm    mmm    mm                                      │");
    kpsym_output!("│   kk kk        ppppppp        ss      yyyy     mm           mm                                      │");
    kpsym_output!("│   kk   kk      pp              ss      yy      mm           mm                                      │");
    kpsym_output!("│   kk     kk    pp        sssssss       yy      mm           mm                                      │");
    kpsym_output!("│                                                                                                     │");
    kpsym_output!("│   k-point symmetry reduction for periodic electronic-structure calculations       {version:>17} │");
    kpsym_output!("╰─────────────────────────────────────────────────────────────────────────────────────────────────────╯");
    kpsym_output!("");
}

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// The YAML input file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// The output file. If not given, output is written to the console only.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enables debugging output.
    #[arg(short, long)]
    pub debug: bool,
}
