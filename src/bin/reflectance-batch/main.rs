mod args;

use std::path::PathBuf;

use anyhow::{bail, Result};
use reflectance::calibrate_flight;

use crate::args::Args;

fn main() -> Result<()> {
    let args = Args::from_cmd_line()?;

    let pattern = args.root.join(&args.pattern);
    let flights = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_dir())
        .collect::<Vec<PathBuf>>();
    if flights.is_empty() {
        bail!("no flight folders match {:?}", pattern);
    }

    let mut failed = vec![];
    for flight in &flights {
        eprintln!("Calibrating {:?}", flight);
        match calibrate_flight(flight) {
            Ok(summary) => eprintln!(
                "Calibrated {} images from {} captures",
                summary.images_written(),
                summary.captures.len()
            ),
            Err(e) => {
                eprintln!("Failed: {}", e);
                failed.push(flight);
            }
        }
    }

    eprintln!(
        "Calibrated {} of {} flights",
        flights.len() - failed.len(),
        flights.len()
    );
    for flight in &failed {
        eprintln!("  failed: {:?}", flight);
    }
    if !failed.is_empty() {
        bail!("{} flights failed", failed.len());
    }
    Ok(())
}
