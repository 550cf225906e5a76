use regport_sim::bridge::axi::Resp;
use regport_sim::register::bank::SCRATCH_OFFSET;
use regport_sim::regport::word_to_byte;
use regport_sim::savestate::SaveState;
use regport_sim::{debug_flags, scenarios, HostIdentity, HostRegisters, SimError, Testbench, TestbenchConfig};
use std::env;
use std::path::PathBuf;
use std::process;

const SESSION_BASE_WORD: u32 = 0x100;
const SESSION_IDENTITY: HostIdentity = HostIdentity {
    signature: 0x5245_4750, // "REGP"
    version: 0x0001_0000,
    min_compatible_version: 0x0001_0000,
};

struct Options {
    list: bool,
    save_state: Option<PathBuf>,
    load_state: Option<PathBuf>,
    names: Vec<String>,
}

fn usage(program: &str) {
    eprintln!(
        "Usage: {} [--list] [--timeout N] [--strict] [--save-state PATH] [--load-state PATH] [scenario...]",
        program
    );
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("regport-sim");
    let mut opts = Options {
        list: false,
        save_state: None,
        load_state: None,
        names: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                usage(program);
                process::exit(0);
            }
            "--list" => {
                opts.list = true;
                i += 1;
            }
            // flags are read once; set them before anything touches debug_flags
            "--strict" => {
                env::set_var("STRICT_CONTRACT", "1");
                i += 1;
            }
            "--timeout" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("--timeout requires a value");
                    process::exit(2);
                };
                if value.parse::<u64>().is_err() {
                    eprintln!("--timeout: '{}' is not a cycle count", value);
                    process::exit(2);
                }
                env::set_var("SIM_TIMEOUT_CYCLES", value);
                i += 2;
            }
            "--save-state" | "--load-state" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("{} requires a path", args[i]);
                    process::exit(2);
                };
                if args[i] == "--save-state" {
                    opts.save_state = Some(PathBuf::from(value));
                } else {
                    opts.load_state = Some(PathBuf::from(value));
                }
                i += 2;
            }
            s if s.starts_with('-') => {
                eprintln!("Unknown option: {}", s);
                usage(program);
                process::exit(2);
            }
            s => {
                opts.names.push(s.to_string());
                i += 1;
            }
        }
    }
    opts
}

/// Runs the selected scenarios and returns how many failed.
fn run_scenarios(names: &[String]) -> usize {
    let selected: Vec<&scenarios::Scenario> = if names.is_empty() {
        scenarios::all().iter().collect()
    } else {
        let mut picked = Vec::new();
        for name in names {
            match scenarios::find(name) {
                Some(s) => picked.push(s),
                None => {
                    eprintln!("Unknown scenario: {} (try --list)", name);
                    process::exit(2);
                }
            }
        }
        picked
    };

    let mut failed = 0;
    for s in selected {
        match s.run() {
            Ok(()) => {
                if !debug_flags::quiet() {
                    println!("PASS  {}", s.name);
                }
            }
            Err(e) => {
                println!("FAIL  {}: {}", s.name, e);
                failed += 1;
            }
        }
    }
    failed
}

// Host block session: restore (or build) the block, bump the scratch word
// over the bridge, save.
fn run_session(load: Option<&PathBuf>, save: Option<&PathBuf>) -> Result<(), SimError> {
    let config = TestbenchConfig::default();
    let mut tb = match load {
        Some(path) => {
            let state: SaveState<HostRegisters> =
                SaveState::load_from_file(path).map_err(SimError::SaveState)?;
            Testbench::from_state(state, config)
        }
        None => Testbench::with_config(HostRegisters::new(SESSION_BASE_WORD, SESSION_IDENTITY, 0)?, config),
    };

    let scratch = word_to_byte(tb.responder().base()).wrapping_add(SCRATCH_OFFSET);
    let (value, _) = tb.read(scratch)?;
    let resp = tb.write(scratch, value.wrapping_add(1))?;
    if resp != Resp::Okay {
        log::warn!("scratch write answered {:?}", resp);
    }
    let stored = tb.responder().scratch().map(|r| r.value()).unwrap_or_default();
    println!(
        "session: cycle {} scratch {:#010X} -> {:#010X}",
        tb.cycle(),
        value,
        stored
    );

    if let Some(path) = save {
        tb.save_state()?.save_to_file(path).map_err(SimError::SaveState)?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let opts = parse_args();

    if opts.list {
        for s in scenarios::all() {
            println!("{:<20} {}", s.name, s.description);
        }
        return;
    }

    let session = opts.load_state.is_some() || opts.save_state.is_some();
    if session {
        if let Err(e) = run_session(opts.load_state.as_ref(), opts.save_state.as_ref()) {
            log::error!("{}", e);
            eprintln!("session failed: {}", e);
            process::exit(1);
        }
        if opts.names.is_empty() {
            return;
        }
    }

    let failed = run_scenarios(&opts.names);
    if failed > 0 {
        eprintln!("{} scenario(s) failed", failed);
        process::exit(1);
    }
}
