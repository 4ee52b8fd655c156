#[macro_use]
extern crate log;

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::exit;

use log::LevelFilter;
use structopt::clap::ArgMatches;
use structopt::StructOpt;

use mach_lipo::{arch_names, lipo, Error, FatFlags, InputFile, Options};

/// Options Apple's lipo spells with a single dash.
const LONG_OPTIONS: &[&str] = &[
    "create",
    "thin",
    "extract",
    "extract_family",
    "remove",
    "replace",
    "segalign",
    "arch",
    "output",
    "info",
    "detailed_info",
    "archs",
    "verify_arch",
    "fat64",
    "hideARM64",
    "verbose",
];

#[derive(Debug, StructOpt)]
#[structopt(name = "lipo", about = "Create or operate on universal files")]
struct Opt {
    /// Create one universal file from the input files
    #[structopt(long)]
    create: bool,

    /// Write the slice of one architecture as a thin file
    #[structopt(long, value_name = "arch_type")]
    thin: Option<String>,

    /// Keep the named architecture in a universal file
    #[structopt(long, number_of_values = 1, value_name = "arch_type")]
    extract: Vec<String>,

    /// Keep every architecture of the named architecture's CPU type
    #[structopt(long = "extract_family", number_of_values = 1, value_name = "arch_type")]
    extract_family: Vec<String>,

    /// Remove the named architecture
    #[structopt(long, number_of_values = 1, value_name = "arch_type")]
    remove: Vec<String>,

    /// Replace the named architecture with the contents of a thin file
    #[structopt(long, number_of_values = 2, value_names = &["arch_type", "file_name"])]
    replace: Vec<String>,

    /// Override the alignment of an architecture, a hexadecimal power of 2
    #[structopt(long, number_of_values = 2, value_names = &["arch_type", "alignment"])]
    segalign: Vec<String>,

    /// Declare the architecture of an input file
    #[structopt(long, number_of_values = 2, value_names = &["arch_type", "input_file"])]
    arch: Vec<String>,

    /// The output file
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Briefly list the architectures of the input files
    #[structopt(long)]
    info: bool,

    /// Print the fat header of the input files
    #[structopt(long = "detailed_info")]
    detailed_info: bool,

    /// Print the architectures of the input file
    #[structopt(long)]
    archs: bool,

    /// Check that the input file contains every named architecture
    #[structopt(long = "verify_arch", min_values = 1, value_name = "arch_type")]
    verify_arch: Vec<String>,

    /// Write 64-bit fat headers
    #[structopt(long)]
    fat64: bool,

    /// Hide the arm64 slices from loaders that only know 32-bit arm
    #[structopt(long = "hideARM64")]
    hide_arm64: bool,

    /// Log the decisions made while laying out the output
    #[structopt(long)]
    verbose: bool,

    /// The input files
    #[structopt(parse(from_os_str))]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operation {
    Create,
    Thin(String),
    Extract(Vec<String>),
    ExtractFamily(Vec<String>),
    Remove(Vec<String>),
    Replace(Vec<(String, PathBuf)>),
    Info,
    DetailedInfo,
    Archs,
    VerifyArch(Vec<String>),
}

impl Operation {
    fn writes_output(&self) -> bool {
        match self {
            Operation::Info | Operation::DetailedInfo | Operation::Archs | Operation::VerifyArch(_) => false,
            _ => true,
        }
    }
}

impl Opt {
    fn operation(&self) -> Option<Operation> {
        let mut ops = Vec::new();

        if self.create {
            ops.push(Operation::Create);
        }
        if let Some(ref arch) = self.thin {
            ops.push(Operation::Thin(arch.clone()));
        }
        if !self.extract.is_empty() {
            ops.push(Operation::Extract(self.extract.clone()));
        }
        if !self.extract_family.is_empty() {
            ops.push(Operation::ExtractFamily(self.extract_family.clone()));
        }
        if !self.remove.is_empty() {
            ops.push(Operation::Remove(self.remove.clone()));
        }
        if !self.replace.is_empty() {
            ops.push(Operation::Replace(
                self.replace
                    .chunks_exact(2)
                    .map(|pair| (pair[0].clone(), PathBuf::from(&pair[1])))
                    .collect(),
            ));
        }
        if self.info {
            ops.push(Operation::Info);
        }
        if self.detailed_info {
            ops.push(Operation::DetailedInfo);
        }
        if self.archs {
            ops.push(Operation::Archs);
        }
        if !self.verify_arch.is_empty() {
            ops.push(Operation::VerifyArch(self.verify_arch.clone()));
        }

        if ops.len() == 1 {
            ops.pop()
        } else {
            None
        }
    }

    /// The input files in command line order, `-arch` declarations included.
    fn inputs(&self, matches: &ArgMatches) -> Vec<InputFile> {
        let files = matches
            .indices_of("inputs")
            .into_iter()
            .flatten()
            .zip(self.inputs.iter().map(InputFile::new));
        let declared = matches
            .indices_of("arch")
            .into_iter()
            .flatten()
            .step_by(2)
            .zip(
                self.arch
                    .chunks_exact(2)
                    .map(|pair| InputFile::with_arch(pair[0].as_str(), pair[1].as_str())),
            );

        let mut inputs = files.chain(declared).collect::<Vec<_>>();

        inputs.sort_by_key(|&(index, _)| index);
        inputs.into_iter().map(|(_, input)| input).collect()
    }

    fn options(&self) -> Options {
        let mut flags = FatFlags::empty();

        if self.fat64 {
            flags |= FatFlags::FAT64;
        }
        if self.hide_arm64 {
            flags |= FatFlags::HIDE_ARM64;
        }

        Options {
            flags,
            segaligns: self
                .segalign
                .chunks_exact(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect(),
        }
    }
}

fn parse_command_line<I: IntoIterator<Item = OsString>>(args: I) -> (Opt, Vec<InputFile>) {
    let matches = Opt::clap().get_matches_from(normalize_args(args));
    let opt = Opt::from_clap(&matches);
    let inputs = opt.inputs(&matches);

    (opt, inputs)
}

/// Rewrite `-create` style options to `--create`, leaving short options such as `-o` alone.
fn normalize_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let rewritten = arg
                .to_str()
                .filter(|_| i > 0)
                .and_then(|s| s.strip_prefix('-'))
                .filter(|name| LONG_OPTIONS.contains(name))
                .map(|name| OsString::from(format!("--{}", name)));

            rewritten.unwrap_or(arg)
        })
        .collect()
}

fn usage(msg: &str) -> ! {
    eprintln!("lipo: {}", msg);

    exit(2)
}

fn run(op: Operation, inputs: &[InputFile], output: Option<PathBuf>, opts: &Options) -> mach_lipo::Result<bool> {
    let output = || match output {
        Some(ref path) => path.clone(),
        None => usage("no output file specified"),
    };

    match op {
        Operation::Create => lipo::create(inputs, output(), opts)?,
        Operation::Thin(arch) => lipo::thin(inputs, &arch, output())?,
        Operation::Extract(archs) => lipo::extract(inputs, &archs[..], output(), opts)?,
        Operation::ExtractFamily(archs) => lipo::extract_family(inputs, &archs[..], output(), opts)?,
        Operation::Remove(archs) => lipo::remove(inputs, &archs[..], output(), opts)?,
        Operation::Replace(replacements) => lipo::replace(inputs, &replacements[..], output(), opts)?,
        Operation::Info => {
            for line in lipo::info(inputs)? {
                println!("{}", line);
            }
        }
        Operation::DetailedInfo => print!("{}", lipo::detailed_info(inputs)?),
        Operation::Archs => println!("{}", lipo::archs(inputs)?.join(" ")),
        Operation::VerifyArch(archs) => return lipo::verify_arch(inputs, &archs[..]),
    }

    Ok(true)
}

fn main() {
    let (opt, inputs) = parse_command_line(env::args_os());

    let mut builder = pretty_env_logger::formatted_builder();

    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if opt.verbose {
        builder.filter_level(LevelFilter::Debug);
    }

    builder.init();

    let op = match opt.operation() {
        Some(op) => op,
        None => usage(
            "one of -create, -thin <arch_type>, -extract <arch_type>, -extract_family <arch_type>, \
             -remove <arch_type>, -replace <arch_type> <file_name>, -verify_arch <arch_type> ..., \
             -archs, -info, or -detailed_info must be specified",
        ),
    };

    if !op.writes_output() && opt.output.is_some() {
        usage("-output is not allowed with -info, -detailed_info, -archs or -verify_arch");
    }

    debug!("{:?}", op);

    match run(op, &inputs, opt.output.clone(), &opt.options()) {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(err) => {
            eprintln!("lipo: {}", err);

            if let Error::UnsupportedArch(_) = err {
                eprintln!("lipo: known architectures: {}", arch_names().join(" "));
            }

            exit(if err.is_usage() { 2 } else { 1 })
        }
    }
}
