use std::path::PathBuf;

use anyhow::Error;
use catalog::DEFAULT_CATALOG_PATH;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON seed with breeds and plans
    seed: PathBuf,

    /// Catalog file to merge into
    #[arg(default_value = DEFAULT_CATALOG_PATH)]
    catalog: PathBuf,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();

    process::load_catalog(&args.seed, &args.catalog)?;

    Ok(())
}
