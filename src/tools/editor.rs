use crate::review::Editor;
use anyhow::Result;
use std::path::Path;
use std::process::Command;

/// Opens files with the configured editor command.
#[derive(Debug, Clone)]
pub struct CommandEditor {
    program: String,
}

impl CommandEditor {
    pub fn new(program: impl Into<String>) -> Self {
        CommandEditor {
            program: program.into(),
        }
    }
}

impl Editor for CommandEditor {
    fn open(&self, dir: &Path, file: &str) -> Result<()> {
        // The editor needs the terminal, so stdin is not redirected here.
        let status = Command::new(&self.program)
            .arg(file)
            .current_dir(dir)
            .status();
        match status {
            Ok(s) if s.success() => Ok(()),
            Ok(s) => anyhow::bail!("{} exited with {:?}", self.program, s.code()),
            Err(e) => Err(e.into()),
        }
    }
}
