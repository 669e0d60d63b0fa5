//! Language registry
//!
//! Maps a language tag to everything the sandbox layer needs to run code in
//! that language: the filename the source must be written as, the sandbox
//! image, an optional build step, the run step, and the wall-clock deadline.
//! The table is a set of constants; no command fragment is ever derived from
//! user input other than by resolving a tag against this registry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Supported languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Go,
    Cpp,
    Java,
}

/// Static descriptor for one language
#[derive(Debug, Clone, Copy)]
pub struct LanguageSpec {
    /// Filename the source is written as inside the workspace
    pub source_name: &'static str,
    /// Sandbox image reference
    pub image: &'static str,
    /// Build step, if the language needs one before running
    pub compile: Option<&'static str>,
    /// Run step
    pub run: &'static str,
    /// Wall-clock ceiling for a batch execution
    pub deadline: Duration,
}

impl LanguageSpec {
    /// The shell expression executed inside the sandbox.
    pub fn shell_command(&self) -> String {
        match self.compile {
            Some(compile) => format!("{} && {}", compile, self.run),
            None => self.run.to_string(),
        }
    }
}

const PYTHON: LanguageSpec = LanguageSpec {
    source_name: "main.py",
    image: "runner-python",
    compile: None,
    run: "python3 main.py",
    deadline: Duration::from_secs(5),
};

const JAVASCRIPT: LanguageSpec = LanguageSpec {
    source_name: "main.js",
    image: "runner-js",
    compile: None,
    run: "node main.js",
    deadline: Duration::from_secs(5),
};

const GO: LanguageSpec = LanguageSpec {
    source_name: "main.go",
    image: "runner-go",
    compile: Some("go build -o /tmp/prog main.go"),
    run: "/tmp/prog",
    deadline: Duration::from_secs(10),
};

const CPP: LanguageSpec = LanguageSpec {
    source_name: "main.cpp",
    image: "runner-cpp",
    compile: Some("g++ -O2 -o /tmp/prog main.cpp"),
    run: "/tmp/prog",
    deadline: Duration::from_secs(10),
};

// javac derives the class name from the filename, so the source must be
// written as Main.java.
const JAVA: LanguageSpec = LanguageSpec {
    source_name: "Main.java",
    image: "runner-java",
    compile: Some("javac -d /tmp Main.java"),
    run: "java -cp /tmp Main",
    deadline: Duration::from_secs(10),
};

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::Javascript,
        Language::Go,
        Language::Cpp,
        Language::Java,
    ];

    /// Resolve a language tag. Returns `None` for anything not in the
    /// registry.
    pub fn from_tag(tag: &str) -> Option<Language> {
        match tag {
            "python" => Some(Language::Python),
            "javascript" => Some(Language::Javascript),
            "go" => Some(Language::Go),
            "cpp" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Go => "go",
            Language::Cpp => "cpp",
            Language::Java => "java",
        }
    }

    pub fn spec(&self) -> &'static LanguageSpec {
        match self {
            Language::Python => &PYTHON,
            Language::Javascript => &JAVASCRIPT,
            Language::Go => &GO,
            Language::Cpp => &CPP,
            Language::Java => &JAVA,
        }
    }

    /// Whether the language has a build step before the run step.
    pub fn compiled(&self) -> bool {
        self.spec().compile.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_tags() {
        for lang in Language::ALL {
            assert_eq!(Language::from_tag(lang.tag()), Some(lang));
        }
    }

    #[test]
    fn rejects_unknown_tags() {
        assert_eq!(Language::from_tag("ruby"), None);
        assert_eq!(Language::from_tag(""), None);
        assert_eq!(Language::from_tag("Python"), None);
    }

    #[test]
    fn java_source_name_matches_class() {
        assert_eq!(Language::Java.spec().source_name, "Main.java");
    }

    #[test]
    fn compiled_languages_get_longer_deadlines() {
        for lang in Language::ALL {
            let spec = lang.spec();
            if lang.compiled() {
                assert!(spec.deadline >= Duration::from_secs(10));
            } else {
                assert!(spec.deadline <= Duration::from_secs(5));
            }
        }
    }

    #[test]
    fn shell_command_chains_compile_and_run() {
        assert_eq!(
            Language::Go.spec().shell_command(),
            "go build -o /tmp/prog main.go && /tmp/prog"
        );
        assert_eq!(Language::Python.spec().shell_command(), "python3 main.py");
    }

    #[test]
    fn serde_uses_lowercase_tags() {
        let json = serde_json::to_string(&Language::Cpp).unwrap();
        assert_eq!(json, "\"cpp\"");
        let lang: Language = serde_json::from_str("\"javascript\"").unwrap();
        assert_eq!(lang, Language::Javascript);
    }
}
