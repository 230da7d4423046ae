//! Entrypoint for CLI
use std::{
    env,
    error::Error,
    fs,
    io::{self, Write},
    time::Duration,
};

use chip8_core::{
    constants::{NANOS_IN_SECOND, TIMER_FREQUENCY},
    prelude::*,
    IMPL_VERSION,
};
use log::{error, info, warn};

mod clock;

use clock::Clock;

static USAGE: &str = r#"
usage: chip8 run FILE [HZ]

commands:
    run     Run the target ROM file, stepping the CPU at HZ
            instructions per second (default 700)

examples:
    chip8 run breakout.rom
    chip8 run breakout.rom 1200
"#;

/// Default CPU step rate. Timers always run at 60Hz regardless.
const DEFAULT_CLOCK: Hz = Hz(700);

fn run_rom(filepath: &str, clock_frequency: Hz) -> Chip8Result<()> {
    let rom = fs::read(filepath)?;
    info!("loaded {filepath} ({} bytes)", rom.len());

    let mut vm = Chip8Vm::new(Chip8Conf {
        clock_frequency: Some(clock_frequency),
        rng_seed: None,
    });
    vm.load_rom(&rom)?;

    let mut cpu_clock = Clock::new(clock_frequency.into());
    let mut timer_clock = Clock::new(Duration::from_nanos(NANOS_IN_SECOND / TIMER_FREQUENCY));
    let mut key_wait_logged = false;

    // Clear the terminal once; every redraw repaints in place.
    print!("\x1B[2J");

    loop {
        cpu_clock.wait();

        // Timer cadence is decoupled from the step cadence.
        if timer_clock.tick() {
            vm.tick_timers();
        }

        match vm.step() {
            Ok(Flow::Draw) => {
                let mut out = io::stdout();
                write!(out, "\x1B[H{}", vm.dump_display()?)?;
                out.flush()?;
            }
            Ok(Flow::KeyWait) => {
                // There is no input backend attached, so a program
                // spinning on Fx0A will never resume.
                if !key_wait_logged {
                    warn!("program is waiting for a keypress");
                    key_wait_logged = true;
                }
            }
            Ok(_) => {}
            Err(err) => {
                error!("machine halted: {err}");
                println!("{}", vm.dump_display()?);
                return Err(err);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    match parse_args() {
        Some(Cmd::Run { filepath, hz }) => run_rom(&filepath, hz)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next()?.as_str() {
        "run" => {
            let filepath = args.next()?;
            let hz = match args.next() {
                Some(raw) => Hz(raw.parse().ok()?),
                None => DEFAULT_CLOCK,
            };
            Some(Cmd::Run { filepath, hz })
        }
        _ => None,
    }
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run { filepath: String, hz: Hz },
}
