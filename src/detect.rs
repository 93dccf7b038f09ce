use std::fmt;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::report::{Failure, FailureKind};

/// The closed set of languages the grader knows how to compile and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Python,
    Java,
    Cpp,
}

impl Language {
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Python => "Python",
            Language::Java => "Java",
            Language::Cpp => "C++",
        };
        write!(f, "{name}")
    }
}

/// Black-box text classifier producing a language label for a source text.
///
/// Any implementation with this signature is substitutable: the default is a
/// deterministic token-scoring heuristic, but a statistical model or an
/// external service fits behind the same seam.
pub trait Classifier: Send + Sync {
    fn classify(&self, source: &str) -> Result<String>;
}

/// Default classifier: scores language-specific tokens and picks the winner.
pub struct HeuristicClassifier;

impl Classifier for HeuristicClassifier {
    fn classify(&self, source: &str) -> Result<String> {
        let count = |needles: &[&str]| -> usize {
            needles
                .iter()
                .map(|needle| source.matches(needle).count())
                .sum()
        };

        let cpp_score = count(&[
            "#include",
            "std::",
            "using namespace",
            "cout",
            "cin",
            "int main(",
        ]);
        let java_score = count(&[
            "public class",
            "public static void main",
            "System.out",
            "import java",
            "String[]",
        ]);
        let python_score = count(&["def ", "print(", "import sys", "elif ", "lambda ", "#!"])
            + source
                .lines()
                .filter(|line| {
                    let t = line.trim_start();
                    (t.starts_with("for ") || t.starts_with("if ") || t.starts_with("while "))
                        && t.trim_end().ends_with(':')
                })
                .count();

        let best = [
            ("C++", cpp_score),
            ("Java", java_score),
            ("Python", python_score),
        ]
        .into_iter()
        .max_by_key(|(_, score)| *score)
        .filter(|(_, score)| *score > 0);

        Ok(match best {
            Some((label, _)) => label.to_string(),
            None => "Unknown".to_string(),
        })
    }
}

static PUBLIC_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*public\s+(?:final\s+|abstract\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)")
        .expect("invalid public class regex")
});

/// Classifies the submitted source and prepares it for on-disk execution.
///
/// The outer error means the classifier itself failed and the submission
/// cannot be graded at all; the inner error is a graded failure (unsupported
/// language, unsupported Java shape) to be reported back to the student.
///
/// Java sources get their public class renamed to `class_name`, since javac
/// requires the public class to match the file's base name and the
/// submission's self-chosen name cannot be trusted to match ours.
pub fn detect(
    classifier: &dyn Classifier,
    source: &str,
    class_name: &str,
) -> Result<Result<(Language, String), Failure>> {
    let label = classifier.classify(source)?;
    log::debug!("Classifier verdict: {label}");

    let detected = if label.contains("Python") {
        (Language::Python, source.to_string())
    } else if label.contains("Java") {
        let rewritten = match rewrite_public_class(source, class_name) {
            Ok(rewritten) => rewritten,
            Err(failure) => return Ok(Err(failure)),
        };
        (Language::Java, rewritten)
    } else if label.contains("C++") {
        (Language::Cpp, source.to_string())
    } else {
        return Ok(Err(Failure::new(
            FailureKind::UnsupportedLanguage,
            "Language can only be C++, Java or Python.",
        )));
    };

    Ok(Ok(detected))
}

/// Renames the single public top-level class to `class_name`.
///
/// Zero public classes is legal Java under any file name, so the source
/// passes through unchanged. More than one public class cannot be renamed
/// unambiguously and is rejected instead of silently picking one.
fn rewrite_public_class(source: &str, class_name: &str) -> Result<String, Failure> {
    let matches: Vec<_> = PUBLIC_CLASS_RE.captures_iter(source).collect();

    match matches.as_slice() {
        [] => Ok(source.to_string()),
        [only] => {
            let name = match only.get(1) {
                Some(name) => name,
                None => return Ok(source.to_string()),
            };
            let mut rewritten = String::with_capacity(source.len() + class_name.len());
            rewritten.push_str(&source[..name.start()]);
            rewritten.push_str(class_name);
            rewritten.push_str(&source[name.end()..]);
            Ok(rewritten)
        }
        _ => Err(Failure::new(
            FailureKind::CompileError,
            "Java submissions must declare exactly one public class.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PYTHON_SOURCE: &str = "import sys\nwith open(sys.argv[1]) as f:\n    print(f.read().strip())\n";
    const JAVA_SOURCE: &str = "import java.util.Scanner;\n\npublic class Solution {\n    public static void main(String[] args) {\n        System.out.println(42);\n    }\n}\n";
    const CPP_SOURCE: &str = "#include <iostream>\nusing namespace std;\nint main() {\n    cout << 42 << endl;\n    return 0;\n}\n";

    #[test]
    fn detects_python() {
        let (lang, rewritten) = detect(&HeuristicClassifier, PYTHON_SOURCE, "code_1")
            .unwrap()
            .unwrap();
        assert_eq!(lang, Language::Python);
        assert_eq!(rewritten, PYTHON_SOURCE);
    }

    #[test]
    fn detects_cpp() {
        let (lang, _) = detect(&HeuristicClassifier, CPP_SOURCE, "code_1")
            .unwrap()
            .unwrap();
        assert_eq!(lang, Language::Cpp);
    }

    #[test]
    fn detects_java_and_rewrites_class_name() {
        let (lang, rewritten) = detect(&HeuristicClassifier, JAVA_SOURCE, "code_7")
            .unwrap()
            .unwrap();
        assert_eq!(lang, Language::Java);
        assert!(rewritten.contains("public class code_7 {"));
        assert!(!rewritten.contains("Solution"));
    }

    #[test]
    fn rejects_unclassifiable_source() {
        let failure = detect(&HeuristicClassifier, "SELECT * FROM users;", "code_1")
            .unwrap()
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::UnsupportedLanguage);
        assert_eq!(failure.message, "Language can only be C++, Java or Python.");
    }

    #[test]
    fn java_without_public_class_passes_through() {
        let source = "import java.util.*;\nclass Helper {\n    public static void main(String[] args) { System.out.println(1); }\n}\n";
        let rewritten = rewrite_public_class(source, "code_1").unwrap();
        assert_eq!(rewritten, source);
    }

    #[test]
    fn java_with_two_public_classes_is_rejected() {
        let source = "public class A {\n}\npublic class B {\n}\n";
        let failure = rewrite_public_class(source, "code_1").unwrap_err();
        assert_eq!(failure.kind, FailureKind::CompileError);
    }

    #[test]
    fn rewrite_keeps_modifiers() {
        let source = "public final class Keep {\n}\n";
        let rewritten = rewrite_public_class(source, "code_2").unwrap();
        assert_eq!(rewritten, "public final class code_2 {\n}\n");
    }
}
