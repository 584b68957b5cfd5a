use clap::Parser;

/// Run several commands in parallel, coordinate their start via dependency
/// and delay clauses, and interleave their output onto one structured
/// stream.
///
/// Each COMMAND is `[KEY][#COLOR][+DELAY…][:DEP…][|ACTION…]=CMD`; see the
/// project README for the full grammar.
#[derive(Parser, Debug)]
#[command(name = "multiplex", version, about)]
pub struct Args {
    /// Command expressions to run, one per channel.
    #[arg(required = true)]
    pub commands: Vec<String>,

    /// Stop every channel after this many seconds, whatever their own state.
    #[arg(short = 't', long)]
    pub timeout: Option<f64>,

    /// Prefix every output line with a timestamp: `absolute` (default, local
    /// wall clock) or `relative` (elapsed since start).
    #[arg(
        long,
        alias = "timestamp",
        num_args = 0..=1,
        default_missing_value = "absolute",
        value_name = "MODE"
    )]
    pub time: Option<String>,

    /// Shorthand for `--time=relative`.
    #[arg(short = 'r', long)]
    pub relative: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_flag_defaults_to_absolute_when_bare() {
        let args = Args::parse_from(["multiplex", "--time", "A=echo hi"]);
        assert_eq!(args.time.as_deref(), Some("absolute"));
    }

    #[test]
    fn time_flag_accepts_explicit_mode() {
        let args = Args::parse_from(["multiplex", "--time=relative", "A=echo hi"]);
        assert_eq!(args.time.as_deref(), Some("relative"));
    }

    #[test]
    fn timestamp_is_an_alias_for_time() {
        let args = Args::parse_from(["multiplex", "--timestamp=relative", "A=echo hi"]);
        assert_eq!(args.time.as_deref(), Some("relative"));
    }

    #[test]
    fn requires_at_least_one_command() {
        assert!(Args::try_parse_from(["multiplex"]).is_err());
    }
}
