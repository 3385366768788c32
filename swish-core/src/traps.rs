//! Facilities for configuring trap handlers.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error;
use crate::sys;

/// A condition that can be trapped in the shell.
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug)]
pub enum TrapSignal {
    /// A system signal.
    Signal(sys::signal::Signal),
    /// The `EXIT` trap, run when the shell terminates.
    Exit,
}

impl Display for TrapSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signal(s) => write!(f, "{}", s.as_str()),
            Self::Exit => write!(f, "EXIT"),
        }
    }
}

impl FromStr for TrapSignal {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<i32>() {
            return match n {
                0 => Ok(Self::Exit),
                _ => sys::signal::Signal::try_from(n)
                    .map(Self::Signal)
                    .map_err(|_| error::Error::InvalidSignal(s.to_owned())),
            };
        }

        let mut name = s.to_ascii_uppercase();
        if name == "EXIT" {
            return Ok(Self::Exit);
        }
        if !name.starts_with("SIG") {
            name.insert_str(0, "SIG");
        }
        sys::signal::Signal::from_str(&name)
            .map(Self::Signal)
            .map_err(|_| error::Error::InvalidSignal(s.to_owned()))
    }
}

/// Configuration of trap handlers in the shell.
#[derive(Clone, Default)]
pub struct TrapHandlerConfig {
    handlers: HashMap<TrapSignal, String>,
    /// Current depth of trap-handler execution; used to keep a trap body
    /// from re-entering its own dispatch.
    pub handler_depth: u32,
}

impl TrapHandlerConfig {
    /// Returns the handler command registered for the given condition.
    pub fn get_handler(&self, signal: TrapSignal) -> Option<&str> {
        self.handlers.get(&signal).map(|s| s.as_str())
    }

    /// Iterates over the registered handlers.
    pub fn iter_handlers(&self) -> impl Iterator<Item = (TrapSignal, &str)> {
        self.handlers.iter().map(|(sig, cmd)| (*sig, cmd.as_str()))
    }

    /// Registers a handler command for a condition, updating the process
    /// signal disposition accordingly. An empty command ignores the signal.
    pub fn register_handler(
        &mut self,
        signal: TrapSignal,
        command: String,
    ) -> Result<(), error::Error> {
        if let TrapSignal::Signal(sig) = signal {
            if command.is_empty() {
                sys::signal::ignore(sig)?;
            } else {
                sys::signal::catch(sig)?;
            }
        }
        self.handlers.insert(signal, command);
        Ok(())
    }

    /// Removes the handler for a condition, restoring the default
    /// disposition.
    pub fn remove_handler(&mut self, signal: TrapSignal) -> Result<(), error::Error> {
        if self.handlers.remove(&signal).is_some() {
            if let TrapSignal::Signal(sig) = signal {
                // The shell keeps its own SIGINT handling.
                if sig != sys::signal::Signal::SIGINT {
                    sys::signal::set_default(sig)?;
                }
            }
        }
        Ok(())
    }

    /// Drops all handlers without touching dispositions, for a forked child
    /// that is about to reset signals itself.
    pub fn clear_for_child(&mut self) {
        self.handlers.clear();
        self.handler_depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_signal_specifications() {
        assert_eq!("EXIT".parse::<TrapSignal>().unwrap(), TrapSignal::Exit);
        assert_eq!("0".parse::<TrapSignal>().unwrap(), TrapSignal::Exit);
        assert_eq!(
            "INT".parse::<TrapSignal>().unwrap(),
            TrapSignal::Signal(sys::signal::Signal::SIGINT)
        );
        assert_eq!(
            "SIGTERM".parse::<TrapSignal>().unwrap(),
            TrapSignal::Signal(sys::signal::Signal::SIGTERM)
        );
        assert_eq!(
            "term".parse::<TrapSignal>().unwrap(),
            TrapSignal::Signal(sys::signal::Signal::SIGTERM)
        );
        assert!("NOSUCH".parse::<TrapSignal>().is_err());
    }

    #[test]
    fn registers_and_removes_handlers() {
        let mut config = TrapHandlerConfig::default();
        config
            .register_handler(TrapSignal::Exit, "echo bye".to_owned())
            .unwrap();
        assert_eq!(config.get_handler(TrapSignal::Exit), Some("echo bye"));

        config.remove_handler(TrapSignal::Exit).unwrap();
        assert_eq!(config.get_handler(TrapSignal::Exit), None);
    }
}
