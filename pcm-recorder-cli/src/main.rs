mod args;
mod commands;

use clap::Parser;

use args::Args;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.list_devices {
        return commands::list_devices();
    }
    commands::record(&args)
}
