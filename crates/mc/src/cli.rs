use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "mergefsmc", version, about = "Tray mount controller for MergeFS")]
pub struct Args {
    /// Mount configuration files to mount at start-up
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Application config file (default: platform config dir)
    #[arg(long, env = "MERGEFSMC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter directive, e.g. "debug" or "common=trace"
    #[arg(long)]
    pub log_level: Option<String>,

    /// Also log to the console
    #[arg(long)]
    pub foreground: bool,
}

impl Args {
    /// Launch arguments as relayed between instances
    ///
    /// Position 0 is the executable, as the receiving side expects.
    pub fn launch_batch(&self, exe: &std::path::Path) -> Vec<String> {
        std::iter::once(exe.to_string_lossy().into_owned())
            .chain(self.files.iter().map(|f| f.to_string_lossy().into_owned()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_files_and_flags() {
        let args = Args::parse_from([
            "mergefsmc",
            "--log-level",
            "debug",
            "--foreground",
            "a.mfcfg",
            "b.mfcfg",
        ]);
        assert_eq!(args.files, vec![PathBuf::from("a.mfcfg"), PathBuf::from("b.mfcfg")]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.foreground);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_launch_batch_puts_exe_first() {
        let args = Args::parse_from(["mergefsmc", "x.mfcfg"]);
        assert_eq!(
            args.launch_batch(std::path::Path::new("mc.exe")),
            vec!["mc.exe".to_string(), "x.mfcfg".to_string()]
        );
        let empty = Args::parse_from(["mergefsmc"]);
        assert_eq!(empty.launch_batch(std::path::Path::new("mc.exe")).len(), 1);
    }
}
