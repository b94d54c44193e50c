// Command-line front end for oabkit.
//
// Subcommands inflate and patch OAB containers, and inspect plaintext OAB
// files (header, schema, records).

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use serde_json::json;

use crate::cancel::CancelToken;
use crate::io::{inflate_file, patch_file, to_hex};
use crate::oab::{ContactRecord, FieldValue, OabDecoder};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Offline Address Book decoder and LZX patch tool.
#[derive(Parser, Debug)]
#[command(
    name = "oabkit",
    version,
    about = "Offline Address Book decoder and LZX patch tool",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit JSON instead of text.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decompress a full OAB container.
    Inflate(InflateArgs),
    /// Apply an OAB patch container to a decompressed base file.
    Patch(PatchArgs),
    /// Print the file header and header record of a plaintext OAB file.
    Header(InspectArgs),
    /// Print the per-contact property schema.
    Schema(InspectArgs),
    /// Decode and print contact records.
    Dump(DumpArgs),
}

#[derive(Args, Debug)]
struct InflateArgs {
    /// Compressed full container.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Plaintext OAB output.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Decompressed OAB file the patch applies to.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// Patch container.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Plaintext OAB output.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Plaintext OAB file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Plaintext OAB file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Stop after this many records.
    #[arg(long, short = 'n')]
    limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Inflate,
    Patch,
    Header,
    Schema,
    Dump,
}

struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    source_file: Option<PathBuf>,
    input_file: PathBuf,
    output_file: Option<PathBuf>,
    limit: Option<usize>,
}

fn resolve_options(cli: Cli) -> Options {
    let base = |command, input_file| Options {
        command,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        source_file: None,
        input_file,
        output_file: None,
        limit: None,
    };

    match cli.command {
        Cmd::Inflate(args) => Options {
            output_file: Some(args.output),
            ..base(Command::Inflate, args.input)
        },
        Cmd::Patch(args) => Options {
            source_file: Some(args.source),
            output_file: Some(args.output),
            ..base(Command::Patch, args.patch)
        },
        Cmd::Header(args) => base(Command::Header, args.input),
        Cmd::Schema(args) => base(Command::Schema, args.input),
        Cmd::Dump(args) => Options {
            limit: args.limit,
            ..base(Command::Dump, args.input)
        },
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oabkit".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn log_filter(opts: &Options) -> &'static str {
    if opts.quiet {
        return "error";
    }
    match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Refuse to clobber an existing file unless `--force` was given.
fn check_output(path: &Path, force: bool) -> bool {
    if path.exists() && !force {
        eprintln!(
            "oabkit: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return false;
    }
    true
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("oabkit: json: {e}"),
    }
}

fn open_decoder(path: &Path) -> Option<OabDecoder> {
    match OabDecoder::open(path) {
        Ok(d) => Some(d),
        Err(e) => {
            eprintln!("oabkit: {}: {e}", path.display());
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Inflate / patch commands
// ---------------------------------------------------------------------------

fn cmd_inflate(opts: &Options) -> i32 {
    let Some(output) = opts.output_file.as_deref() else {
        eprintln!("oabkit: inflate requires an output file");
        return 1;
    };
    if !check_output(output, opts.force) {
        return 1;
    }
    match inflate_file(&opts.input_file, output) {
        Ok(stats) => {
            if opts.json_output {
                print_json(&json!({
                    "input_size": stats.input_size,
                    "output_size": stats.output_size,
                    "output_sha256": to_hex(&stats.output_sha256),
                }));
            } else if !opts.quiet {
                eprintln!(
                    "oabkit: inflated {} -> {} bytes",
                    stats.input_size, stats.output_size
                );
            }
            0
        }
        Err(e) => {
            eprintln!("oabkit: inflate: {}: {e}", opts.input_file.display());
            1
        }
    }
}

fn cmd_patch(opts: &Options) -> i32 {
    let (Some(source), Some(output)) = (opts.source_file.as_deref(), opts.output_file.as_deref())
    else {
        eprintln!("oabkit: patch requires --source and an output file");
        return 1;
    };
    if !check_output(output, opts.force) {
        return 1;
    }
    match patch_file(source, &opts.input_file, output) {
        Ok(stats) => {
            if opts.json_output {
                print_json(&json!({
                    "source_size": stats.source_size,
                    "patch_size": stats.patch_size,
                    "output_size": stats.output_size,
                    "output_sha256": to_hex(&stats.output_sha256),
                }));
            } else if !opts.quiet {
                eprintln!(
                    "oabkit: patched {} + {} -> {} bytes",
                    stats.source_size, stats.patch_size, stats.output_size
                );
            }
            0
        }
        Err(e) => {
            eprintln!("oabkit: patch: {}: {e}", opts.input_file.display());
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Inspection commands
// ---------------------------------------------------------------------------

fn cmd_header(opts: &Options) -> i32 {
    let Some(mut decoder) = open_decoder(&opts.input_file) else {
        return 1;
    };
    let header = match decoder.file_header() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("oabkit: header: {e}");
            return 1;
        }
    };
    let record = match decoder.header_record() {
        Ok(r) => r.clone(),
        Err(e) => {
            eprintln!("oabkit: header record: {e}");
            return 1;
        }
    };

    if opts.json_output {
        print_json(&json!({
            "version": header.version,
            "serial": header.serial,
            "total_records": header.total_records,
            "name": record.name,
            "sequence": record.sequence,
            "container_guid": record.container_guid,
            "dn": record.dn,
        }));
        return 0;
    }
    println!("version:        {:#x}", header.version);
    println!("serial:         {:#010x}", header.serial);
    println!("records:        {}", header.total_records);
    let show = |label: &str, v: &Option<String>| {
        if let Some(v) = v {
            println!("{label:<16}{v}");
        }
    };
    show("name:", &record.name);
    if let Some(seq) = record.sequence {
        println!("sequence:       {seq}");
    }
    show("container guid:", &record.container_guid);
    show("dn:", &record.dn);
    if opts.verbose > 0 {
        for (id, value) in &record.properties {
            println!("  {id}  {value:?}");
        }
    }
    0
}

fn cmd_schema(opts: &Options) -> i32 {
    let Some(mut decoder) = open_decoder(&opts.input_file) else {
        return 1;
    };
    let schema = match decoder.oab_schema() {
        Ok(s) => s.clone(),
        Err(e) => {
            eprintln!("oabkit: schema: {e}");
            return 1;
        }
    };

    if opts.json_output {
        let ids: Vec<String> = schema.iter().map(|id| id.to_string()).collect();
        print_json(&json!({
            "properties": ids,
            "schema_string": schema.export_string(),
        }));
        return 0;
    }
    for (i, id) in schema.iter().enumerate() {
        match id.prop_type() {
            Some(t) => println!("{i:4}  {id}  {t:?}"),
            None => println!("{i:4}  {id}  unknown"),
        }
    }
    0
}

fn field_json(value: &FieldValue) -> serde_json::Value {
    match value {
        FieldValue::Text(s) => json!(s),
        FieldValue::TextList(v) => json!(v),
        FieldValue::Integer(n) => json!(n),
        FieldValue::IntegerList(v) => json!(v),
        FieldValue::Bool(b) => json!(b),
        FieldValue::Binary(b) => json!(to_hex(b)),
        FieldValue::BinaryList(v) => json!(v.iter().map(|b| to_hex(b)).collect::<Vec<_>>()),
        FieldValue::Address(a) => json!({
            "street": a.street,
            "locality": a.locality,
            "region": a.region,
            "postal_code": a.postal_code,
            "country": a.country,
        }),
    }
}

fn contact_json(contact: &ContactRecord, offset: u64, hash: &str) -> serde_json::Value {
    let fields: serde_json::Map<String, serde_json::Value> = contact
        .fields()
        .map(|(field, value)| (field.name().to_string(), field_json(value)))
        .collect();
    json!({
        "offset": offset,
        "content_hash": hash,
        "kind": contact.kind().map(|k| k.to_string()),
        "fields": fields,
    })
}

fn print_contact(contact: &ContactRecord, offset: u64) {
    let kind = contact.kind().map_or_else(|| "-".to_string(), |k| k.to_string());
    println!("@{offset} [{kind}] {}", contact.uid().unwrap_or("-"));
    for (field, value) in contact.fields() {
        match value {
            FieldValue::Text(s) => println!("  {field}: {s}"),
            FieldValue::TextList(v) => println!("  {field}: {}", v.join("; ")),
            FieldValue::Integer(n) => println!("  {field}: {n}"),
            FieldValue::IntegerList(v) => println!("  {field}: {v:?}"),
            FieldValue::Bool(b) => println!("  {field}: {b}"),
            FieldValue::Binary(b) => println!("  {field}: <{} bytes>", b.len()),
            FieldValue::BinaryList(v) => println!("  {field}: <{} values>", v.len()),
            FieldValue::Address(a) => println!("  {field}: {a}"),
        }
    }
}

fn cmd_dump(opts: &Options) -> i32 {
    let Some(mut decoder) = open_decoder(&opts.input_file) else {
        return 1;
    };
    let cancel = CancelToken::new();
    let mut records = match decoder.records(|_, _| true, &cancel) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("oabkit: dump: {e}");
            return 1;
        }
    };

    let limit = opts.limit.unwrap_or(usize::MAX);
    let mut listed = Vec::new();
    for item in records.by_ref().take(limit) {
        match item {
            Ok(rec) => {
                if opts.json_output {
                    listed.push(contact_json(&rec.contact, rec.offset, &rec.content_hash));
                } else {
                    print_contact(&rec.contact, rec.offset);
                }
            }
            Err(e) => {
                eprintln!("oabkit: dump: {e}");
                return 1;
            }
        }
    }

    let stats = records.stats();
    if opts.json_output {
        print_json(&json!({
            "records": listed,
            "emitted": stats.emitted,
            "missing_identity": stats.missing_identity,
        }));
    } else if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oabkit: dump: {} record(s), {} without identity",
            stats.emitted, stats.missing_identity
        );
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Inflate => cmd_inflate(&opts),
        Command::Patch => cmd_patch(&opts),
        Command::Header => cmd_header(&opts),
        Command::Schema => cmd_schema(&opts),
        Command::Dump => cmd_dump(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
