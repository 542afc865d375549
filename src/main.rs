use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use clap::Parser;
use env_logger::Env;
use log::debug;

use crate::context::{Context, LOCAL_PORT};

mod context;
mod frontmatter;
mod functions;
mod highlighter;
mod markdown;
mod page;
mod serve;
mod site;

#[derive(Parser, Debug)]
#[command(name = "PORUS website generator")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Site sources: config.toml, templates/, content/, static/
    #[arg(default_value = "site")]
    path: String,
    /// Output directory, relative to the site sources
    #[arg(default_value = "public")]
    output_dir: String,
    /// Generate links for http://127.0.0.1:1111
    #[arg(short, long)]
    local: bool,
    /// Build with local links, then serve the output on 127.0.0.1:1111
    #[arg(short, long)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    debug!("running with {args:?}");

    let home = PathBuf::from_str(&args.path)?;
    let output_dir = home.join(&args.output_dir);

    let context = Context::new(home, output_dir, args.local || args.serve)?;

    site::build(&context)?;

    if args.serve {
        let addr = SocketAddr::from(([127, 0, 0, 1], LOCAL_PORT));

        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(serve::serve(context.output_dir.clone(), addr))?;
    }

    Ok(())
}
