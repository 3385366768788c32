//! Redirection primitives.
//!
//! Redirections operate directly on the process's descriptor table, since
//! external commands are launched by fork/exec and must inherit them. A
//! pushed redirection saves the displaced descriptor (duplicated to 10 or
//! above, close-on-exec) so it can be restored afterwards; child-style
//! application skips the save because the child exits anyway.

use std::io::Write;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use crate::error;
use crate::sys;

/// A redirection with its target already expanded.
#[derive(Debug)]
pub(crate) struct ExpandedRedirect {
    /// The descriptor being redirected.
    pub fd: u32,
    /// What to attach to it.
    pub action: RedirAction,
}

/// The action of an [`ExpandedRedirect`].
#[derive(Debug)]
pub(crate) enum RedirAction {
    /// Open a file for reading.
    ReadFile(String),
    /// Open a file for writing, truncating it.
    WriteFile(String),
    /// Open a file for appending.
    AppendFile(String),
    /// Duplicate another descriptor.
    DupFrom(u32),
    /// Close the descriptor.
    Close,
    /// Attach a here-document body.
    HereDoc(String),
}

/// How redirections are applied.
#[derive(Clone, Copy, Eq, PartialEq)]
pub(crate) enum RedirMode {
    /// Save displaced descriptors for a later [`RedirStack::pop`].
    Push,
    /// Apply destructively (forked children, `exec`).
    NoSave,
}

struct SavedFd {
    fd: RawFd,
    saved: Option<OwnedFd>,
}

/// Tracks pushed redirections so they can be unwound.
#[derive(Default)]
pub(crate) struct RedirStack {
    frames: Vec<Vec<SavedFd>>,
}

impl RedirStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pushed redirection frames.
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Applies a list of redirections. In `Push` mode a frame is recorded
    /// for [`Self::pop`]; if application fails partway, the frame is
    /// unwound before the error returns.
    pub(crate) fn apply(
        &mut self,
        redirects: &[ExpandedRedirect],
        mode: RedirMode,
    ) -> Result<(), error::Error> {
        if mode == RedirMode::Push {
            self.frames.push(vec![]);
        }

        for redirect in redirects {
            if mode == RedirMode::Push {
                let saved = sys::process::save_fd(redirect.fd as RawFd).ok();
                if let Some(frame) = self.frames.last_mut() {
                    frame.push(SavedFd {
                        fd: redirect.fd as RawFd,
                        saved,
                    });
                }
            }

            if let Err(e) = apply_one(redirect) {
                if mode == RedirMode::Push {
                    self.pop();
                }
                return Err(e);
            }
        }

        Ok(())
    }

    /// Restores the most recently pushed redirection frame.
    pub(crate) fn pop(&mut self) {
        if let Some(frame) = self.frames.pop() {
            for entry in frame.into_iter().rev() {
                match entry.saved {
                    Some(saved) => {
                        let _ = sys::process::dup2(saved.as_raw_fd(), entry.fd);
                        // `saved` drops here, closing the temporary.
                    }
                    None => sys::process::close_fd(entry.fd),
                }
            }
        }
    }

    /// Restores every pushed frame.
    pub(crate) fn pop_all(&mut self) {
        while !self.frames.is_empty() {
            self.pop();
        }
    }

    /// Discards all saved descriptors without restoring them. Used in
    /// forked children and before `exec`, where the current descriptor
    /// table is the one that should survive.
    pub(crate) fn forget_all(&mut self) {
        self.frames.clear();
    }
}

fn apply_one(redirect: &ExpandedRedirect) -> Result<(), error::Error> {
    let target_fd = redirect.fd as RawFd;

    match &redirect.action {
        RedirAction::ReadFile(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| error::Error::RedirectionFailure(path.clone(), e))?;
            sys::process::dup2(file.as_raw_fd(), target_fd)?;
        }
        RedirAction::WriteFile(path) => {
            let file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
                .map_err(|e| error::Error::RedirectionFailure(path.clone(), e))?;
            sys::process::dup2(file.as_raw_fd(), target_fd)?;
        }
        RedirAction::AppendFile(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| error::Error::RedirectionFailure(path.clone(), e))?;
            sys::process::dup2(file.as_raw_fd(), target_fd)?;
        }
        RedirAction::DupFrom(source) => {
            sys::process::dup2(*source as RawFd, target_fd)
                .map_err(|_| error::Error::BadFileDescriptor(*source))?;
        }
        RedirAction::Close => {
            sys::process::close_fd(target_fd);
        }
        RedirAction::HereDoc(body) => {
            let (read_end, write_end) = sys::process::pipe()?;
            let mut writer = std::fs::File::from(write_end);
            writer.write_all(body.as_bytes())?;
            drop(writer);
            sys::process::dup2(read_end.as_raw_fd(), target_fd)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    // The tests below redirect descriptors well above the standard ones so
    // they don't disturb the test harness's own stdio.

    #[test]
    fn push_and_pop_restore_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let path_str = path.to_str().unwrap().to_owned();

        let mut stack = RedirStack::new();

        // Redirect fd 9 to a file, write through it, then restore.
        stack
            .apply(
                &[ExpandedRedirect {
                    fd: 9,
                    action: RedirAction::WriteFile(path_str),
                }],
                RedirMode::Push,
            )
            .unwrap();

        let dup = sys::process::dup_fd(9).unwrap();
        let mut f = std::fs::File::from(dup);
        f.write_all(b"through fd 9").unwrap();
        drop(f);

        stack.pop();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "through fd 9");
    }

    #[test]
    fn heredoc_contents_are_readable() {
        let mut stack = RedirStack::new();
        stack
            .apply(
                &[ExpandedRedirect {
                    fd: 8,
                    action: RedirAction::HereDoc("hello doc\n".to_owned()),
                }],
                RedirMode::Push,
            )
            .unwrap();

        let dup = sys::process::dup_fd(8).unwrap();
        let mut reader = std::fs::File::from(dup);
        let mut contents = String::new();
        reader.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello doc\n");

        stack.pop();
    }

    #[test]
    fn failed_application_unwinds_frame() {
        let mut stack = RedirStack::new();
        let result = stack.apply(
            &[ExpandedRedirect {
                fd: 9,
                action: RedirAction::ReadFile("/definitely/not/here".to_owned()),
            }],
            RedirMode::Push,
        );
        assert!(result.is_err());
        assert_eq!(stack.depth(), 0);
    }
}
