//! Shell quoting and typed remote command lines.
//!
//! Every value that ends up on a remote command line goes through
//! [`shell_escape`]; programs and environment names are compile-time
//! literals, so nothing caller-supplied is ever interpolated raw.

use std::fmt;

/// Quote `value` so a POSIX shell reads it back as exactly `value`.
///
/// Wraps in single quotes; each embedded `'` becomes `'\''`.
#[must_use]
pub fn shell_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Output redirection applied to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Truncate(String),
    Append(String),
}

/// A single remote command: program, arguments, and the few shell
/// features the provisioning phases need (cwd, env, `su`, stdin, redirect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    program: &'static str,
    args: Vec<String>,
    env: Vec<(&'static str, String)>,
    cwd: Option<String>,
    run_as: Option<String>,
    stdin_line: Option<String>,
    redirect: Option<Redirect>,
}

impl RemoteCommand {
    #[must_use]
    pub fn new(program: &'static str) -> Self {
        Self {
            program,
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            run_as: None,
            stdin_line: None,
            redirect: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.env.push((key, value.into()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<String>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Run through `su <user> -c`.
    #[must_use]
    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.run_as = Some(user.into());
        self
    }

    /// Feed `line` to the command's stdin via `echo`.
    #[must_use]
    pub fn stdin_line(mut self, line: impl Into<String>) -> Self {
        self.stdin_line = Some(line.into());
        self
    }

    #[must_use]
    pub fn write_to(mut self, path: impl Into<String>) -> Self {
        self.redirect = Some(Redirect::Truncate(path.into()));
        self
    }

    #[must_use]
    pub fn append_to(mut self, path: impl Into<String>) -> Self {
        self.redirect = Some(Redirect::Append(path.into()));
        self
    }

    #[must_use]
    pub fn program(&self) -> &'static str {
        self.program
    }

    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn redirect(&self) -> Option<&Redirect> {
        self.redirect.as_ref()
    }

    /// Render the full command line for a POSIX shell.
    #[must_use]
    pub fn render(&self) -> String {
        let mut line = String::new();
        for (key, value) in &self.env {
            line.push_str(key);
            line.push('=');
            line.push_str(&shell_escape(value));
            line.push(' ');
        }
        line.push_str(self.program);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_escape(arg));
        }
        if let Some(input) = &self.stdin_line {
            line = format!("echo {} | {line}", shell_escape(input));
        }
        match &self.redirect {
            Some(Redirect::Truncate(path)) => {
                line = format!("{line} > {}", shell_escape(path));
            }
            Some(Redirect::Append(path)) => {
                line = format!("{line} >> {}", shell_escape(path));
            }
            None => {}
        }
        if let Some(user) = &self.run_as {
            line = format!("su {} -c {}", shell_escape(user), shell_escape(&line));
        }
        if let Some(dir) = &self.cwd {
            line = format!("cd {} && {line}", shell_escape(dir));
        }
        line
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
