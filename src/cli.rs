//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download releases and cover art from band pages.
///
/// Takes release or artist URLs as arguments (or piped via stdin), resolves
/// them into track catalogs, and downloads the audio files with metadata.
#[derive(Parser, Debug)]
#[command(name = "bandcamp-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Release or artist URLs to download
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Settings file path (JSON; missing file uses defaults)
    #[arg(short = 's', long)]
    pub settings: Option<PathBuf>,

    /// Override the downloads directory template
    #[arg(short = 'o', long)]
    pub output_dir: Option<String>,

    /// Maximum releases processed concurrently (1-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub max_releases: Option<u8>,

    /// Maximum concurrent transfers per release (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub max_transfers: Option<u8>,

    /// Maximum attempts per transfer (1-20)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub max_retries: Option<u8>,

    /// Download the artist's full discography for every input URL
    #[arg(short = 'd', long)]
    pub discography: bool,

    /// Save cover art into each release folder
    #[arg(long)]
    pub cover_art: bool,

    /// Do not write metadata tags to downloaded tracks
    #[arg(long)]
    pub no_tags: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["bandcamp-dl"]).unwrap();
        assert!(args.urls.is_empty());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.max_transfers.is_none());
        assert!(!args.discography);
    }

    #[test]
    fn test_cli_positional_urls() {
        let args = Args::try_parse_from([
            "bandcamp-dl",
            "https://artist.example.com/album/a",
            "https://artist.example.com/track/b",
        ])
        .unwrap();
        assert_eq!(args.urls.len(), 2);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["bandcamp-dl", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["bandcamp-dl", "-q"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_concurrency_overrides() {
        let args =
            Args::try_parse_from(["bandcamp-dl", "-c", "5", "--max-releases", "2"]).unwrap();
        assert_eq!(args.max_transfers, Some(5));
        assert_eq!(args.max_releases, Some(2));
    }

    #[test]
    fn test_cli_rejects_zero_transfers() {
        let result = Args::try_parse_from(["bandcamp-dl", "-c", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_output_dir_override() {
        let args = Args::try_parse_from(["bandcamp-dl", "-o", "/music/{artist}"]).unwrap();
        assert_eq!(args.output_dir.as_deref(), Some("/music/{artist}"));
    }

    #[test]
    fn test_cli_discography_flag() {
        let args = Args::try_parse_from(["bandcamp-dl", "-d", "http://a.example.com"]).unwrap();
        assert!(args.discography);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["bandcamp-dl", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
