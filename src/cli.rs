//! Command-line interface definitions for newsclip.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. The binary exposes one subcommand per workflow step: extract a
//! single article, compile a batch into a document, or list the
//! supported sources.

use clap::{Parser, Subcommand};

/// Command-line arguments for the newsclip application.
///
/// # Examples
///
/// ```sh
/// # Extract one article and print it as text
/// newsclip fetch https://www.cna.com.tw/news/asoc/202608290001.aspx
///
/// # Compile several articles into a clipping document
/// newsclip export -o 剪報.docx https://udn.com/news/story/1/a https://www.setn.com/b
///
/// # Show the source registry
/// newsclip sources
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract a single article and print the normalized text
    Fetch {
        /// Article URL (or any text containing one)
        url: String,

        /// Print the result as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Compile articles into a .docx clipping document
    Export {
        /// File with one URL per line, read in addition to positional URLs
        #[arg(short, long)]
        input: Option<String>,

        /// Article URLs, compiled in the order given
        urls: Vec<String>,

        /// Output path for the compiled document
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List the supported sources and their fetch modes
    Sources,
}
