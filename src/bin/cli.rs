//! lkrsend command line interface.

use std::{process, time::Duration};

use clap::{
    crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg, ArgMatches,
};
use console::style;
use hexplay::HexViewBuilder;
use log::{debug, log_enabled, trace, warn, Level, LevelFilter};
use serialport::{DataBits, FlowControl, Parity, StopBits};
use simplelog::*;

use lkrsend::{self as ls, ConsoleMonitor};

/// Exit status for missing or malformed arguments.
const EXIT_BAD_ARGUMENTS: i32 = 1;

fn main() {
    println!("[BL] lkrsend v{}", crate_version!());

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .about(crate_description!())
        .long_about(
            "\n\
            lkrsend works in tandem with the UART bootloader to push a kernel \
            image over the serial port:\n\
               \t* reads the image file from disk \n\
               \t* types `lkr_uart` into the bootloader shell \n\
               \t* sends the image size in decimal, newline terminated \n\
               \t* waits for 'Receiving <size> bytes...' \n\
               \t* sends the raw image \n\
            \n\
            If the bootloader does not answer, lkrsend sends `reboot`, waits \
            for the device to come back and tries once more.\n\
            \n\
            Exit status: 0 on success, 1 for bad arguments or an unreadable \
            image, 2 when the bootloader never acknowledged, 3 for serial \
            port errors.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("KERNEL_IMAGE")
                .help("path to the kernel image to be pushed")
                .index(1),
        )
        .arg(
            Arg::with_name("DEVICE_TTY")
                .help("the serial device to use")
                .long_help(
                    "the serial device to use; `/dev/ttyUSB0` (`COM36` on \
                     Windows) when not given.",
                )
                .index(2),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial port baud rate")
                .short("-b")
                .long("--baud-rate")
                .takes_value(true)
                .default_value("115200")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("DATA_BITS")
                .help("number of bits per character")
                .short("-d")
                .long("--data-bits")
                .takes_value(true)
                .possible_values(&["5", "6", "7", "8"])
                .default_value("8")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("STOP_BITS")
                .help("number of stop bits per byte")
                .short("-s")
                .long("--stop-bits")
                .takes_value(true)
                .possible_values(&["1", "2"])
                .default_value("1")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("PARITY")
                .help("parity checking protocol")
                .short("-p")
                .long("--parity")
                .takes_value(true)
                .possible_values(&["none", "odd", "even"])
                .default_value("none")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("FLOW_CONTROL")
                .help("flow control mode")
                .short("-f")
                .long("--flow-control")
                .takes_value(true)
                .possible_values(&["none", "soft", "hard"])
                .default_value("none")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("TIMEOUT_MS")
                .help("read timeout for each response line, in milliseconds")
                .short("-t")
                .long("--timeout")
                .takes_value(true)
                .default_value("3000")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("SETTLE_MS")
                .help("wait after `reboot` before retrying, in milliseconds")
                .long("--settle")
                .takes_value(true)
                .default_value("3000")
                .require_equals(true),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'lkrsend -v -v -v' or 'lkrsend -vvv' vs 'lkrsend -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(e) = TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("could not set up logging: {}", e);
    }

    trace!("{:#?}", matches);

    if let Err(e) = ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(0);
    }) {
        warn!("could not install the Ctrl-C handler: {}", e);
    }

    // The image is the only argument without a default value
    let kernel_image = match matches.value_of("KERNEL_IMAGE") {
        Some(path) => path,
        None => {
            println!("{}: no kernel image given", style("error").red());
            println!("{}", matches.usage());
            process::exit(EXIT_BAD_ARGUMENTS);
        }
    };

    // Arguments with default values ===========================================

    // It's safe to call unwrap on all command line arguments with default
    // values, because the value with either be what the user input at runtime
    // or the default value

    let baud_rate = numeric_arg::<u32>(&matches, "BAUD_RATE", "baud-rate");
    let read_timeout = Duration::from_millis(numeric_arg(&matches, "TIMEOUT_MS", "timeout"));
    let settle_delay = Duration::from_millis(numeric_arg(&matches, "SETTLE_MS", "settle"));

    let data_bits = match matches.value_of("DATA_BITS").unwrap() {
        "5" => DataBits::Five,
        "6" => DataBits::Six,
        "7" => DataBits::Seven,
        "8" => DataBits::Eight,
        _ => unreachable!(),
    };

    let stop_bits = match matches.value_of("STOP_BITS").unwrap() {
        "1" => StopBits::One,
        "2" => StopBits::Two,
        _ => unreachable!(),
    };

    let parity = match matches.value_of("PARITY").unwrap() {
        "none" => Parity::None,
        "even" => Parity::Even,
        "odd" => Parity::Odd,
        _ => unreachable!(),
    };

    let flow_control = match matches.value_of("FLOW_CONTROL").unwrap() {
        "none" => FlowControl::None,
        "soft" => FlowControl::Software,
        "hard" => FlowControl::Hardware,
        _ => unreachable!(),
    };

    // END - Arguments with default values =====================================

    let mut builder = ls::SettingsBuilder::default()
        .kernel_image(kernel_image)
        .baud_rate(baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .flow_control(flow_control)
        .read_timeout(read_timeout)
        .settle_delay(settle_delay);
    if let Some(path) = matches.value_of("DEVICE_TTY") {
        builder = builder.path(path);
    }
    let settings = builder.finalize();
    debug!("{:#?}", settings);

    // Run the transfer ========================================================

    println!(
        "[BL] 🔌 Using {} at {} baud",
        style(&settings.path).cyan(),
        settings.baud_rate
    );

    let mut monitor = ConsoleMonitor::new();
    let exit_code = match push(&settings, &mut monitor) {
        Ok(()) => 0,
        Err(e) => {
            println!(
                "{}",
                style(format!("[BL] 💥 Transfer failed, exits here: {}", e)).red()
            );
            e.exit_code()
        }
    };
    debug!("exit code: {}", exit_code);
    process::exit(exit_code);
}

/// Load the image, push it and report what was sent.
fn push(settings: &ls::Settings, monitor: &mut ConsoleMonitor) -> Result<(), ls::Error> {
    let payload = ls::session::load_image(settings)?;
    let path = settings.kernel_image.as_deref().unwrap_or_default();
    println!("[BL] {} size = {}", path, style(payload.len()).green());

    let transfer = ls::session::push(settings, &payload, monitor)?;
    debug!("{:?}", transfer);

    println!(
        "[BL] First {} bytes of {} (HEX)= {}",
        ls::PREVIEW_LEN.min(payload.len()),
        path,
        payload.preview()
    );
    if log_enabled!(Level::Debug) {
        let head = &payload.as_bytes()[..ls::PREVIEW_LEN.min(payload.len())];
        println!("{}", HexViewBuilder::new(head).row_width(16).finish());
    }
    println!(
        "{}",
        style(format!(
            "[BL] 👍 {} bytes pushed, transfer succeeded",
            transfer.bytes_sent
        ))
        .green()
    );
    Ok(())
}

/// Parse a numeric argument that has a default value, exiting with a usage
/// error when the user gave something else.
fn numeric_arg<T: std::str::FromStr>(matches: &ArgMatches<'_>, name: &str, flag: &str) -> T {
    value_t!(matches.value_of(name), T).unwrap_or_else(|_| {
        println!(
            "{}: `{}` needs to be a numeric value",
            style("error").red(),
            style(flag).cyan()
        );
        println!(
            "   {} `{}` is not a valid value",
            style("-->").cyan(),
            style(matches.value_of(name).unwrap_or_default()).on_red()
        );
        process::exit(EXIT_BAD_ARGUMENTS);
    })
}
