use std::path::PathBuf;

use anyhow::Result;
use reflectance::{arg, args_parser, cli::existing_dir};

pub struct Args {
    pub flight_dir: PathBuf,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("reflectance-calibrate")
            .about(
                "Calibrate the band images of a flight folder to reflectance \
                 using the panel captures taken before and after the flight.",
            )
            .arg(
                arg!("flight dir")
                    .required(true)
                    .help("Folder of IMG_<capture>_<band>.tif images (may hold calibration.json)"),
            )
            .get_matches();

        let flight_dir = existing_dir(matches.value_of("flight dir").unwrap())?;
        Ok(Args { flight_dir })
    }
}
