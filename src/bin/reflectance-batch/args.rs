use std::path::PathBuf;

use anyhow::Result;
use reflectance::{arg, args_parser, cli::existing_dir, opt};

pub struct Args {
    pub root: PathBuf,
    pub pattern: String,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("reflectance-batch")
            .about("Calibrate every flight folder below a root folder, one after another.")
            .arg(
                opt!("pattern")
                    .short("p")
                    .default_value("*SET/images")
                    .help("Glob of flight folders, relative to the root"),
            )
            .arg(
                arg!("root")
                    .required(true)
                    .help("Folder holding the flights"),
            )
            .get_matches();

        let root = existing_dir(matches.value_of("root").unwrap())?;
        let pattern = matches.value_of("pattern").unwrap().into();
        Ok(Args { root, pattern })
    }
}
