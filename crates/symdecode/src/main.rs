use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use symdecode_core::buffer::read_cstr;
use symdecode_core::{global, Address};
use symdecode_utils::{debug, init_logging_with_format, init_logging_with_level, LogFormat, LogLevel, LoggingError};

const NAME_CAPACITY: usize = 1024;
const FILE_CAPACITY: usize = 4096;

/// Native address symbolizer: names, offsets and source lines for code in this process.
#[derive(Parser, Debug)]
#[command(name = "symdecode")]
#[command(version)]
#[command(about = "Native address symbolizer with a lock-free emergency path", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format, pretty or json (overrides SYMDECODE_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Demangle Rust or C++ symbol names
    Demangle
    {
        /// Mangled names; unrecognised names are printed unchanged
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Decode an address to `symbol+offset`
    Decode
    {
        /// Address (hex format: 0x1000 or decimal)
        #[arg(value_parser = parse_address)]
        address: Address,
        /// Look the address up in this module instead of the process map
        #[arg(short, long)]
        module: Option<PathBuf>,
        /// Decode relative to the module loaded at this base address
        #[arg(short, long, value_parser = parse_address, conflicts_with = "module")]
        base: Option<Address>,
        /// Print the raw linkage name instead of demangling it
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// Look up the source file and line of an address
    Source
    {
        /// Address (hex format: 0x1000 or decimal)
        #[arg(value_parser = parse_address)]
        address: Address,
        /// Treat the address as a return address
        #[arg(long, default_value_t = false)]
        after_call: bool,
    },
    /// Print the state of both decoder slots
    State,
    /// Decode a function inside this binary through both decoder paths
    SelfTest,
}

fn parse_address(text: &str) -> Result<Address, String>
{
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse::<u64>(),
    };
    parsed
        .map(Address::new)
        .map_err(|err| format!("invalid address `{text}`: {err}"))
}

fn resolve_log_format(flag: Option<LogFormat>) -> Result<LogFormat, LoggingError>
{
    flag.map_or_else(LogFormat::from_env, Ok)
}

fn main()
{
    let cli = Cli::parse();

    // Defaults to INFO (or RUST_LOG) unless --log-level is given
    let logging = resolve_log_format(cli.log_format).and_then(|format| match cli.log_level {
        Some(level) => init_logging_with_level(level, format),
        None => init_logging_with_format(format),
    });
    let _guard = match logging {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Commands) -> Result<(), Box<dyn std::error::Error>>
{
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Demangle { symbols } => {
            let mut buf = [0u8; NAME_CAPACITY];
            for symbol in symbols {
                if global::demangle(&symbol, &mut buf) {
                    writeln!(out, "{}", read_cstr(&buf))?;
                } else {
                    writeln!(out, "{symbol}")?;
                }
            }
        }
        Commands::Decode {
            address,
            module,
            base,
            raw,
        } => {
            debug!(%address, ?module, ?base, raw, "decoding address");
            let mut buf = [0u8; NAME_CAPACITY];
            let mut offset = 0;
            let found = match base {
                Some(base) => global::decode_with_base(address, &mut buf, &mut offset, base),
                None => global::decode(address, &mut buf, &mut offset, module.as_deref(), !raw),
            };
            if found {
                writeln!(out, "{address}: {}+{offset:#x}", read_cstr(&buf))?;
            } else {
                writeln!(out, "{address}: ??")?;
            }
        }
        Commands::Source { address, after_call } => {
            let mut file = [0u8; FILE_CAPACITY];
            let mut line = 0;
            if global::get_source_info(address, &mut file, &mut line, after_call) {
                writeln!(out, "{address}: {}:{line}", read_cstr(&file))?;
            } else {
                writeln!(out, "{address}: ??:0")?;
            }
        }
        Commands::State => {
            global::initialize();
            global::print_state_on(&mut out)?;
        }
        Commands::SelfTest => self_test(&mut out)?,
    }

    out.flush()?;
    Ok(())
}

#[inline(never)]
fn self_test_marker() -> u64
{
    std::hint::black_box(0x5e1f)
}

fn self_test(out: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>>
{
    let pc = Address::new(self_test_marker as fn() -> u64 as usize as u64);
    global::initialize();
    writeln!(out, "marker: {pc} (returns {:#x})", self_test_marker())?;

    let mut buf = [0u8; NAME_CAPACITY];
    let mut offset = 0;
    let shared = global::decode(pc, &mut buf, &mut offset, None, true);
    report(out, "shared decode", shared, || format!("{}+{offset:#x}", read_cstr(&buf)))?;

    let mut emergency_buf = [0u8; NAME_CAPACITY];
    let mut emergency_offset = 0;
    let emergency = global::emergency_decode(pc, &mut emergency_buf, &mut emergency_offset, None, true);
    report(out, "emergency decode", emergency, || {
        format!("{}+{emergency_offset:#x}", read_cstr(&emergency_buf))
    })?;

    let mut file = [0u8; FILE_CAPACITY];
    let mut line = 0;
    let source = global::get_source_info(pc, &mut file, &mut line, false);
    report(out, "shared source", source, || format!("{}:{line}", read_cstr(&file)))?;

    let mut emergency_file = [0u8; FILE_CAPACITY];
    let mut emergency_line = 0;
    let emergency_source = global::emergency_get_source_info(pc, &mut emergency_file, &mut emergency_line, false);
    report(out, "emergency source", emergency_source, || {
        format!("{}:{emergency_line}", read_cstr(&emergency_file))
    })?;

    writeln!(out)?;
    global::print_state_on(out)?;

    if !shared {
        return Err("shared decoder could not resolve its own binary".into());
    }
    if shared && emergency && read_cstr(&buf) != read_cstr(&emergency_buf) {
        return Err("shared and emergency decoders disagree".into());
    }
    Ok(())
}

fn report(out: &mut dyn Write, label: &str, ok: bool, detail: impl FnOnce() -> String) -> io::Result<()>
{
    if ok {
        writeln!(out, "  {label:<18} ok    {}", detail())
    } else {
        writeln!(out, "  {label:<18} none")
    }
}
