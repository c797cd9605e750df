pub mod actions;
pub mod config;

use clap::{Arg, ArgMatches, Command};

/// Build the command tree. Split from `parse_args` so tests can feed argv.
pub fn command() -> Command {
    Command::new("cts602")
        .about("Modbus RTU master for Nilan CTS 602 controllers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML file with link settings")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .help("Serial port name (overrides config)")
                .value_name("PORT")
                .global(true),
        )
        .arg(
            Arg::new("baud")
                .long("baud")
                .help("Baud rate (overrides config)")
                .value_name("BAUD")
                .value_parser(clap::value_parser!(u32))
                .global(true),
        )
        .arg(
            Arg::new("slave")
                .long("slave")
                .help("Slave address (overrides config)")
                .value_name("ID")
                .value_parser(clap::value_parser!(u8).range(1..=247))
                .global(true),
        )
        .subcommand(Command::new("ports").about("List available serial ports"))
        .subcommand(
            Command::new("registers")
                .about("Print the register catalog")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .short('j')
                        .help("Output as JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("poll")
                .about("Poll the controller and print a status block until Ctrl-C")
                .arg(
                    Arg::new("every")
                        .long("every")
                        .help("Seconds between status blocks")
                        .value_name("SECS")
                        .default_value("5")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                ),
        )
        .subcommand(
            Command::new("read")
                .about("Read a block of registers once")
                .arg(
                    Arg::new("class")
                        .help("Register class")
                        .value_parser(["input", "holding"])
                        .required(true),
                )
                .arg(
                    Arg::new("start")
                        .help("First register address")
                        .value_parser(clap::value_parser!(u16))
                        .required(true),
                )
                .arg(
                    Arg::new("quantity")
                        .help("Number of registers (1-125)")
                        .value_parser(clap::value_parser!(u16).range(1..=125))
                        .default_value("1"),
                ),
        )
        .subcommand(
            Command::new("write")
                .about("Write one or more consecutive holding registers")
                .arg(
                    Arg::new("address")
                        .help("Holding register address")
                        .value_parser(clap::value_parser!(u16))
                        .required(true),
                )
                .arg(
                    Arg::new("values")
                        .help("Raw 16-bit values")
                        .value_parser(clap::value_parser!(u16))
                        .num_args(1..=123)
                        .required(true),
                ),
        )
}

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    command().get_matches()
}
