use clap::Parser;
use fleet::cli::{Cli, Commands, GlobalOpts};
use miette::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) so piping to
    // `head` or `grep -q` does not panic on a broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(&global);

    match cli.command {
        Commands::Import(args) => fleet::cli::commands::import::run(args, &global),
        Commands::Vehicles(cmd) => fleet::cli::commands::vehicles::run(cmd, &global),
        Commands::Devices(cmd) => fleet::cli::commands::devices::run(cmd, &global),
        Commands::Config(cmd) => fleet::cli::commands::config::run(cmd, &global),
        Commands::Completions(args) => fleet::cli::commands::completions::run(args),
    }
}

/// Diagnostics go to stderr; FLEET_LOG takes env-filter directives
fn init_logging(global: &GlobalOpts) {
    let fallback = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("FLEET_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
