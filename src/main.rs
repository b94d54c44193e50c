fn main() {
    #[cfg(feature = "cli")]
    oabkit::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("oabkit: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
