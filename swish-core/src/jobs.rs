//! Job management.
//!
//! A job is the set of processes forked for one pipeline or background
//! command. Foreground jobs are waited on immediately; background jobs are
//! tracked here until `wait` or an between-commands sweep reaps them.

use std::fmt::Display;

use crate::error;
use crate::sys;
use crate::sys::process::Pid;

/// The execution state of a job.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobState {
    /// At least one process is still live.
    Running,
    /// Every process has terminated; holds the job's exit status.
    Done(u8),
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Done(_) => write!(f, "Done"),
        }
    }
}

/// A set of processes managed as a single unit.
pub struct Job {
    /// The shell-internal ID of the job (assigned when backgrounded).
    pub id: usize,
    /// The job's processes, in pipeline order.
    pids: Vec<Pid>,
    /// The command line the job was created from.
    pub command_line: String,
    /// The job's current state.
    pub state: JobState,
    last_status: u8,
}

impl Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]  {}\t{}", self.id, self.state, self.command_line)
    }
}

impl Job {
    /// Records a forked process as part of this job.
    pub fn add_pid(&mut self, pid: Pid) {
        self.pids.push(pid);
    }

    /// Returns a `[id] pid` style string for background-start reporting.
    pub fn to_pid_style_string(&self) -> String {
        let pid = self
            .pids
            .last()
            .map_or_else(|| "?".to_owned(), |p| p.as_raw().to_string());
        format!("[{}] {pid}", self.id)
    }

    /// Waits for every process in the job; the status of the last one
    /// becomes the job's status.
    pub fn wait(&mut self) -> Result<u8, error::Error> {
        for pid in std::mem::take(&mut self.pids) {
            self.last_status = sys::process::wait_for_pid(pid)?;
        }
        self.state = JobState::Done(self.last_status);
        Ok(self.last_status)
    }

    /// Polls the job without blocking; returns true once every process has
    /// been reaped.
    pub fn poll(&mut self) -> Result<bool, error::Error> {
        while let Some(pid) = self.pids.first().copied() {
            match sys::process::try_reap_pid(pid)? {
                Some(status) => {
                    self.last_status = status;
                    self.pids.remove(0);
                }
                None => return Ok(false),
            }
        }
        self.state = JobState::Done(self.last_status);
        Ok(true)
    }
}

/// Tracks the shell's background jobs.
#[derive(Default)]
pub struct JobManager {
    jobs: Vec<Job>,
    next_id: usize,
    /// The process ID of the most recently started background job (`$!`).
    pub last_async_pid: Option<Pid>,
}

impl JobManager {
    /// Returns a new job manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a job for processes about to be forked. The job is not
    /// tracked until handed to [`Self::add_background`].
    pub fn create_job(&self, command_line: String) -> Job {
        Job {
            id: 0,
            pids: vec![],
            command_line,
            state: JobState::Running,
            last_status: 0,
        }
    }

    /// Registers a job as a background job and returns a reference to it.
    pub fn add_background(&mut self, mut job: Job) -> &Job {
        self.next_id += 1;
        job.id = self.next_id;
        self.last_async_pid = job.pids.last().copied();
        self.jobs.push(job);
        self.jobs.last().expect("job was just pushed")
    }

    /// Returns the tracked jobs.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Waits for every tracked job to finish, removing them. Returns the
    /// status of the last job waited on.
    pub fn wait_all(&mut self) -> Result<u8, error::Error> {
        let mut status = 0;
        for mut job in std::mem::take(&mut self.jobs) {
            status = job.wait()?;
        }
        if self.jobs.is_empty() {
            self.next_id = 0;
        }
        Ok(status)
    }

    /// Polls tracked jobs, removing and returning those that finished.
    pub fn reap_finished(&mut self) -> Result<Vec<Job>, error::Error> {
        let mut finished = vec![];
        let mut i = 0;
        while i < self.jobs.len() {
            if self.jobs[i].poll()? {
                finished.push(self.jobs.remove(i));
            } else {
                i += 1;
            }
        }
        if self.jobs.is_empty() {
            self.next_id = 0;
        }
        Ok(finished)
    }

    /// Drops all job records (used in forked children, which must not wait
    /// on their parent's children).
    pub fn clear(&mut self) {
        self.jobs.clear();
        self.next_id = 0;
        self.last_async_pid = None;
    }
}
