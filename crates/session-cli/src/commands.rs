//! Stdin command parsing for the interactive session.

use anyhow::{Result, anyhow, bail};

/// Volume presets stepped through by a bare `volume`.
pub const VOLUME_STEPS: [f64; 3] = [0.0, 0.5, 1.0];
/// Rate presets stepped through by a bare `rate`.
pub const RATE_STEPS: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Play,
    Pause,
    /// Explicit volume, or `None` to step to the next preset.
    Volume(Option<f64>),
    /// Explicit rate, or `None` to step to the next preset.
    Rate(Option<f64>),
    Info,
    Status,
    Seek(f64),
    FullScreen,
    PictureInPicture,
    Background,
    Remove,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play | pause
  volume [v]     step 0 -> 0.5 -> 1, or set v in [0, 1]
  rate [r]       step 0.5 .. 2, or set r > 0
  info           query duration, position, playing, muted
  status         show cached state
  seek <s>       simulate a seek on the player (loopback)
  fullscreen     toggle fullscreen (loopback)
  pip            toggle picture in picture (loopback)
  background     report background playback (loopback)
  remove
  quit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<CliCommand>> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();
    if parts.next().is_some() {
        bail!("too many arguments for {word}");
    }
    let command = match word.to_ascii_lowercase().as_str() {
        "play" => CliCommand::Play,
        "pause" => CliCommand::Pause,
        "volume" | "vol" => CliCommand::Volume(arg.map(number).transpose()?),
        "rate" | "speed" => CliCommand::Rate(arg.map(number).transpose()?),
        "info" => CliCommand::Info,
        "status" => CliCommand::Status,
        "seek" => {
            let arg = arg.ok_or_else(|| anyhow!("seek needs a position in seconds"))?;
            CliCommand::Seek(number(arg)?)
        }
        "fullscreen" | "fs" => CliCommand::FullScreen,
        "pip" => CliCommand::PictureInPicture,
        "background" | "bg" => CliCommand::Background,
        "remove" => CliCommand::Remove,
        "help" | "?" => CliCommand::Help,
        "quit" | "exit" | "q" => CliCommand::Quit,
        other => bail!("unknown command {other:?} (try help)"),
    };
    let takes_arg = matches!(
        command,
        CliCommand::Volume(_) | CliCommand::Rate(_) | CliCommand::Seek(_)
    );
    if arg.is_some() && !takes_arg {
        bail!("{word} takes no arguments");
    }
    Ok(Some(command))
}

fn number(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| anyhow!("not a number: {raw}"))
}

/// Next preset after `current`; the first preset when `current` is not one.
pub fn next_in_cycle(steps: &[f64], current: f64) -> f64 {
    let Some(first) = steps.first() else {
        return current;
    };
    match steps.iter().position(|step| (step - current).abs() < 1e-9) {
        Some(index) => steps[(index + 1) % steps.len()],
        None => *first,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_valued_commands() {
        assert_eq!(parse("play").unwrap(), Some(CliCommand::Play));
        assert_eq!(parse("  VOLUME ").unwrap(), Some(CliCommand::Volume(None)));
        assert_eq!(parse("volume 0.25").unwrap(), Some(CliCommand::Volume(Some(0.25))));
        assert_eq!(parse("rate 1.5").unwrap(), Some(CliCommand::Rate(Some(1.5))));
        assert_eq!(parse("seek 42").unwrap(), Some(CliCommand::Seek(42.0)));
        assert_eq!(parse("q").unwrap(), Some(CliCommand::Quit));
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("volume loud").is_err());
        assert!(parse("seek").is_err());
        assert!(parse("play now").is_err());
        assert!(parse("rate 1 2").is_err());
        assert!(parse("rewind").is_err());
    }

    #[test]
    fn volume_cycles_through_presets() {
        assert_eq!(next_in_cycle(&VOLUME_STEPS, 0.5), 1.0);
        assert_eq!(next_in_cycle(&VOLUME_STEPS, 1.0), 0.0);
        assert_eq!(next_in_cycle(&VOLUME_STEPS, 0.0), 0.5);
    }

    #[test]
    fn rate_cycle_restarts_from_unknown_value() {
        assert_eq!(next_in_cycle(&RATE_STEPS, 1.0), 1.25);
        assert_eq!(next_in_cycle(&RATE_STEPS, 2.0), 0.5);
        assert_eq!(next_in_cycle(&RATE_STEPS, 3.0), 0.5);
        assert_eq!(next_in_cycle(&[], 3.0), 3.0);
    }
}
