//! Engine launch settings and the startup readiness table.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How to launch the parser engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Launcher executable (the JVM).
    pub launcher: String,

    /// Arguments passed to the launcher before the classpath.
    pub jvm_args: Vec<String>,

    /// Directory holding the jars and properties file. Relative entries of
    /// `classpath` and `properties` are resolved against it.
    pub engine_dir: Option<PathBuf>,

    /// Ordered classpath entries.
    pub classpath: Vec<String>,

    /// Separator used to join classpath entries.
    pub classpath_separator: String,

    /// Entry class of the interactive shell.
    pub main_class: String,

    /// Properties file handed to the engine.
    pub properties: String,

    /// Flag that precedes the properties file on the command line.
    pub properties_flag: String,

    /// Additional files that must exist before the engine is spawned.
    pub extra_resources: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            launcher: "java".to_string(),
            jvm_args: vec!["-Xmx1800m".to_string()],
            engine_dir: None,
            classpath: vec![
                "stanford-corenlp-2011-09-16.jar".to_string(),
                "stanford-corenlp-2011-09-14-models.jar".to_string(),
                "joda-time.jar".to_string(),
                "xom.jar".to_string(),
            ],
            classpath_separator: default_classpath_separator().to_string(),
            main_class: "edu.stanford.nlp.pipeline.StanfordCoreNLP".to_string(),
            properties: "default.properties".to_string(),
            properties_flag: "-props".to_string(),
            extra_resources: Vec::new(),
        }
    }
}

fn default_classpath_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}

impl EngineConfig {
    /// Resolve a configured file name against `engine_dir`.
    pub fn resolve_path(&self, entry: impl AsRef<Path>) -> PathBuf {
        let entry = entry.as_ref();
        match &self.engine_dir {
            Some(dir) if entry.is_relative() => dir.join(entry),
            _ => entry.to_path_buf(),
        }
    }

    /// Classpath entries resolved against `engine_dir`, in order.
    pub fn classpath_paths(&self) -> Vec<PathBuf> {
        self.classpath.iter().map(|c| self.resolve_path(c)).collect()
    }

    /// Joined `-cp` argument.
    pub fn classpath_arg(&self) -> String {
        self.classpath_paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(&self.classpath_separator)
    }

    /// Full argv: launcher, jvm args, `-cp <classpath>`, main class,
    /// properties flag and properties file.
    pub fn command(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.jvm_args.len() + 6);
        argv.push(self.launcher.clone());
        argv.extend(self.jvm_args.iter().cloned());
        if !self.classpath.is_empty() {
            argv.push("-cp".to_string());
            argv.push(self.classpath_arg());
        }
        argv.push(self.main_class.clone());
        if !self.properties.is_empty() {
            if !self.properties_flag.is_empty() {
                argv.push(self.properties_flag.clone());
            }
            argv.push(self.resolve_path(&self.properties).display().to_string());
        }
        argv
    }

    /// Every file that must exist before spawning: classpath entries, the
    /// properties file, then `extra_resources`.
    pub fn required_resources(&self) -> Vec<PathBuf> {
        let mut out = self.classpath_paths();
        if !self.properties.is_empty() {
            out.push(self.resolve_path(&self.properties));
        }
        out.extend(self.extra_resources.iter().map(|p| self.resolve_path(p)));
        out
    }
}

/// One startup phase: a literal substring the engine prints when the phase
/// completes, and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessStep {
    pub marker: String,
    pub timeout_secs: u64,
    #[serde(default)]
    pub label: Option<String>,
}

impl ReadinessStep {
    pub fn new(marker: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            marker: marker.into(),
            timeout_secs,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label if set, otherwise the marker itself.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.marker)
    }
}

/// Model loading sequence of the 2011 CoreNLP shell.
pub fn default_readiness() -> Vec<ReadinessStep> {
    vec![
        ReadinessStep::new("done.", 20).with_label("POS tagger"),
        ReadinessStep::new("done.", 200).with_label("NER all classifier"),
        ReadinessStep::new("done.", 600).with_label("NER muc classifier"),
        ReadinessStep::new("done.", 600).with_label("CoNLL classifier"),
        ReadinessStep::new("done.", 200).with_label("PCFG parser"),
        ReadinessStep::new("Entering interactive shell.", 30).with_label("interactive shell"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_matches_shell_invocation() {
        let cfg = EngineConfig {
            classpath_separator: ":".to_string(),
            ..EngineConfig::default()
        };
        let argv = cfg.command();
        assert_eq!(argv[0], "java");
        assert_eq!(argv[1], "-Xmx1800m");
        assert_eq!(argv[2], "-cp");
        assert_eq!(
            argv[3],
            "stanford-corenlp-2011-09-16.jar:stanford-corenlp-2011-09-14-models.jar:joda-time.jar:xom.jar"
        );
        assert_eq!(argv[4], "edu.stanford.nlp.pipeline.StanfordCoreNLP");
        assert_eq!(argv[5], "-props");
        assert_eq!(argv[6], "default.properties");
        assert_eq!(argv.len(), 7);
    }

    #[test]
    fn engine_dir_prefixes_relative_entries() {
        let cfg = EngineConfig {
            engine_dir: Some(PathBuf::from("/opt/corenlp")),
            classpath: vec!["a.jar".into(), "/abs/b.jar".into()],
            extra_resources: vec![PathBuf::from("models/x.gz")],
            ..EngineConfig::default()
        };
        let resources = cfg.required_resources();
        assert_eq!(
            resources,
            vec![
                PathBuf::from("/opt/corenlp/a.jar"),
                PathBuf::from("/abs/b.jar"),
                PathBuf::from("/opt/corenlp/default.properties"),
                PathBuf::from("/opt/corenlp/models/x.gz"),
            ]
        );
    }

    #[test]
    fn empty_properties_omits_flag() {
        let cfg = EngineConfig {
            properties: String::new(),
            classpath: Vec::new(),
            ..EngineConfig::default()
        };
        assert_eq!(
            cfg.command(),
            vec!["java", "-Xmx1800m", "edu.stanford.nlp.pipeline.StanfordCoreNLP"]
        );
        assert!(cfg.required_resources().is_empty());
    }

    #[test]
    fn default_readiness_sequence() {
        let steps = default_readiness();
        let timeouts: Vec<u64> = steps.iter().map(|s| s.timeout_secs).collect();
        assert_eq!(timeouts, vec![20, 200, 600, 600, 200, 30]);
        assert!(steps[..5].iter().all(|s| s.marker == "done."));
        assert_eq!(steps[5].marker, "Entering interactive shell.");
        assert_eq!(steps[0].display_name(), "POS tagger");
        assert_eq!(ReadinessStep::new("x", 1).display_name(), "x");
    }
}
