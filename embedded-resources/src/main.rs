// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::{anyhow, Context, Result},
    clap::{Arg, ArgMatches, Command},
    embedded_resources::{read_manifest, OutputFormat, Packer, PackerSettings},
    log::LevelFilter,
    std::path::{Path, PathBuf},
};

const ABOUT: &str = "\
Pack files into a generated source file that embeds them.

Resources are listed in a manifest, one per line, as

    /path/to/file : logical/name

Paths are resolved relative to the root directory (by default the directory
containing the manifest). Each file is zlib compressed and written as a byte
array prefixed with its decompressed size, followed by a lookup table and
the number of resources.

The output file is replaced atomically: if packing fails, any existing
output is left untouched.
";

fn command() -> Command<'static> {
    Command::new("embed-resources")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Pack files into an embeddable resource bundle")
        .long_about(ABOUT)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        )
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .short('m')
                .takes_value(true)
                .required(true)
                .value_name("PATH")
                .help("Manifest listing resources to embed"),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .takes_value(true)
                .value_name("DIR")
                .help("Directory manifest paths are relative to"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .takes_value(true)
                .required(true)
                .value_name("PATH")
                .help("Generated source file to write"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .takes_value(true)
                .possible_values(["cpp", "rust"])
                .default_value("cpp")
                .help("Syntax of the generated file"),
        )
        .arg(
            Arg::new("namespace")
                .long("namespace")
                .takes_value(true)
                .help("C++ namespace or Rust module wrapping generated definitions"),
        )
        .arg(
            Arg::new("compression_level")
                .long("compression-level")
                .takes_value(true)
                .default_value("9")
                .help("zlib compression level (0-9)"),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .takes_value(true)
                .help("Number of threads used to compress resources"),
        )
}

fn init_logging(matches: &ArgMatches) {
    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();
}

fn settings_from_args(matches: &ArgMatches) -> Result<PackerSettings> {
    let format = matches
        .value_of("format")
        .unwrap_or("cpp")
        .parse::<OutputFormat>()
        .map_err(|e| anyhow!(e))?;

    let level = matches
        .value_of("compression_level")
        .unwrap_or("9")
        .parse::<u32>()
        .context("parsing --compression-level")?;
    if level > 9 {
        return Err(anyhow!("--compression-level must be between 0 and 9"));
    }

    let mut settings = PackerSettings::default()
        .output_format(format)
        .compression_level(level);

    if let Some(namespace) = matches.value_of("namespace") {
        settings = settings.namespace(namespace);
    }

    Ok(settings)
}

fn configure_threads(matches: &ArgMatches) -> Result<()> {
    if let Some(jobs) = matches.value_of("jobs") {
        let jobs = jobs.parse::<usize>().context("parsing --jobs")?;

        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("configuring thread pool")?;
    }

    Ok(())
}

fn main_impl() -> Result<()> {
    let matches = command().get_matches();

    init_logging(&matches);
    configure_threads(&matches)?;

    let manifest_path = PathBuf::from(
        matches
            .value_of("manifest")
            .ok_or_else(|| anyhow!("--manifest is required"))?,
    );
    let output = PathBuf::from(
        matches
            .value_of("output")
            .ok_or_else(|| anyhow!("--output is required"))?,
    );
    let root = match matches.value_of("root") {
        Some(root) => PathBuf::from(root),
        None => manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let settings = settings_from_args(&matches)?;

    let resources = read_manifest(&manifest_path, &root)?;
    Packer::new(settings)
        .pack(&resources, &output)
        .with_context(|| format!("packing resources into {}", output.display()))?;

    Ok(())
}

fn main() {
    let exit_code = match main_impl() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            1
        }
    };

    std::process::exit(exit_code)
}
