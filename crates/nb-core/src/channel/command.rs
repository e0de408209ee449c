//! Engine command line and pre-spawn resource checks.

use nb_common::{Error, Result};
use nb_config::EngineConfig;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A resolved program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Launcher invocation for the configured engine, run from `engine_dir`.
    pub fn from_engine(engine: &EngineConfig) -> Self {
        let mut argv = engine.command().into_iter();
        let program = argv.next().unwrap_or_else(|| engine.launcher.clone());
        Self {
            program,
            args: argv.collect(),
            cwd: engine.engine_dir.clone(),
        }
    }

    /// Shell-ish rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Fail with `MissingResource` for the first path that does not exist.
pub fn check_resources<P: AsRef<Path>>(resources: &[P]) -> Result<()> {
    for path in resources {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingResource {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn from_engine_splits_program_and_args() {
        let engine = EngineConfig {
            engine_dir: Some(PathBuf::from("/opt/corenlp")),
            ..EngineConfig::default()
        };
        let cmd = ProcessCommand::from_engine(&engine);
        assert_eq!(cmd.program, "java");
        assert_eq!(cmd.args[0], "-Xmx1800m");
        assert_eq!(cmd.args[1], "-cp");
        assert!(cmd.args[2].starts_with("/opt/corenlp/stanford-corenlp-2011-09-16.jar"));
        assert!(cmd.args.contains(&"edu.stanford.nlp.pipeline.StanfordCoreNLP".to_string()));
        assert_eq!(cmd.args.last().unwrap(), "/opt/corenlp/default.properties");
        assert_eq!(cmd.cwd.as_deref(), Some(Path::new("/opt/corenlp")));
    }

    #[test]
    fn builder_and_display() {
        let cmd = ProcessCommand::new("sh").arg("-c").args(["echo hi"]);
        assert_eq!(cmd.display(), "sh -c echo hi");
        assert!(cmd.cwd.is_none());
    }

    #[test]
    fn check_resources_reports_first_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("a.jar");
        std::fs::write(&present, b"").unwrap();
        let missing = dir.path().join("b.jar");
        let also_missing = dir.path().join("c.jar");

        assert!(check_resources(&[&present]).is_ok());
        match check_resources(&[&present, &missing, &also_missing]) {
            Err(Error::MissingResource { path }) => assert_eq!(path, missing),
            other => panic!("expected MissingResource, got {:?}", other),
        }
    }

    #[test]
    fn empty_resource_list_passes() {
        let none: [PathBuf; 0] = [];
        assert!(check_resources(&none).is_ok());
    }
}
