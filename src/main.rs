use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context};

use tiny_shadows::app::{self, Params, Pipeline};
use tiny_shadows::logging::{init_logging, LoggingConfig};

const USAGE: &str = "usage: tiny_shadows [MESH] [-s PIPELINE] [-j THREADS] [-o DIR] [-W WIDTH] [-H HEIGHT] [-w] [-v]";

/// Value following the flag at `i`.
fn flag_value<'a>(args: &'a [String], i: usize) -> anyhow::Result<&'a str> {
    return args
        .get(i + 1)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow!("{} expects a value\n{}", args[i], USAGE));
}

fn parse_args(args: &[String]) -> anyhow::Result<(Params, bool)> {
    // Default values.
    let mut params = Params::default();
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-s" => {
                params.pipeline = flag_value(args, i)?.parse::<Pipeline>()?;
                i += 1;
            }
            "-j" => {
                params.threads = flag_value(args, i)?.parse().context("bad thread count")?;
                i += 1;
            }
            "-o" => {
                params.output_dir = PathBuf::from(flag_value(args, i)?);
                i += 1;
            }
            "-W" => {
                params.width = flag_value(args, i)?.parse().context("bad width")?;
                i += 1;
            }
            "-H" => {
                params.height = flag_value(args, i)?.parse().context("bad height")?;
                i += 1;
            }
            "-w" => params.show_window = true,
            "-v" => verbose = true,
            flag if flag.starts_with('-') => return Err(anyhow!("unknown option {}\n{}", flag, USAGE)),
            mesh => params.mesh_path = PathBuf::from(mesh),
        }
        i += 1;
    }
    return Ok((params, verbose));
}

#[cfg_attr(feature = "window", show_image::main)]
fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let (params, verbose) = parse_args(&args)?;

    init_logging(LoggingConfig { verbose, ..Default::default() });

    let pipeline = params.pipeline;
    app::run(params).with_context(|| format!("{} pipeline failed", pipeline))?;

    return Ok(());
}
