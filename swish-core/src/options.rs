//! Defines runtime options for the shell.

/// Runtime changeable options for a shell instance.
#[derive(Clone, Default)]
pub struct RuntimeOptions {
    /// -e
    pub exit_on_nonzero_command_exit: bool,
    /// -f
    pub disable_filename_globbing: bool,
    /// -i
    pub interactive: bool,
    /// -n
    pub do_not_execute_commands: bool,
    /// -u
    pub treat_unset_variables_as_error: bool,
    /// -x
    pub print_commands_and_arguments: bool,
    /// -I
    pub ignore_eof: bool,
}

impl RuntimeOptions {
    /// Updates the option named by the given single-letter flag. Returns
    /// false if the letter names no known option.
    pub fn set_by_letter(&mut self, letter: char, value: bool) -> bool {
        match letter {
            'e' => self.exit_on_nonzero_command_exit = value,
            'f' => self.disable_filename_globbing = value,
            'i' => self.interactive = value,
            'n' => self.do_not_execute_commands = value,
            'u' => self.treat_unset_variables_as_error = value,
            'x' => self.print_commands_and_arguments = value,
            'I' => self.ignore_eof = value,
            _ => return false,
        }
        true
    }

    /// Returns the single-letter flags currently enabled, for `$-`-style
    /// reporting.
    pub fn enabled_letters(&self) -> String {
        let mut letters = String::new();
        for (letter, enabled) in [
            ('e', self.exit_on_nonzero_command_exit),
            ('f', self.disable_filename_globbing),
            ('i', self.interactive),
            ('n', self.do_not_execute_commands),
            ('u', self.treat_unset_variables_as_error),
            ('x', self.print_commands_and_arguments),
            ('I', self.ignore_eof),
        ] {
            if enabled {
                letters.push(letter);
            }
        }
        letters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_by_letter_updates_known_flags() {
        let mut options = RuntimeOptions::default();
        assert!(options.set_by_letter('e', true));
        assert!(options.exit_on_nonzero_command_exit);
        assert!(options.set_by_letter('e', false));
        assert!(!options.exit_on_nonzero_command_exit);
        assert!(!options.set_by_letter('q', true));
    }

    #[test]
    fn enabled_letters_reflect_state() {
        let mut options = RuntimeOptions::default();
        options.set_by_letter('e', true);
        options.set_by_letter('x', true);
        assert_eq!(options.enabled_letters(), "ex");
    }
}
