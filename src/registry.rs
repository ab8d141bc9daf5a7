use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

use crate::config::EngineConfig;

lazy_static! {
    static ref PUBLIC_CLASS: Regex = Regex::new(r"public\s+class\s+(\w+)").expect("valid regex");
}

/// Placeholder for the source file path in argument templates
pub const SOURCE_PLACEHOLDER: &str = "{source}";
/// Placeholder for the compiled artifact path in argument templates
pub const OUTPUT_PLACEHOLDER: &str = "{output}";
/// Placeholder for the discovered entry symbol in argument templates
pub const ENTRY_PLACEHOLDER: &str = "{entry}";

/// How a language is executed, chosen once when the registry is built
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Evaluated in-process with a restricted global scope
    Sandboxed,
    /// Source file handed straight to an interpreter
    Interpreted { interpreter: String },
    /// Compiled into `main` inside the workspace, then executed
    Compiled {
        compiler: String,
        compile_args: Vec<String>,
    },
    /// The source file must be named after a declared entry symbol,
    /// which is also what the runtime is asked to execute
    EntryPoint {
        compiler: String,
        compile_args: Vec<String>,
        runtime: String,
        run_args: Vec<String>,
        /// First capture group yields the entry symbol
        entry_pattern: Regex,
        /// Human-readable name of the required declaration
        entry_description: String,
    },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Sandboxed => "sandboxed",
            Strategy::Interpreted { .. } => "interpreted",
            Strategy::Compiled { .. } => "compiled",
            Strategy::EntryPoint { .. } => "entry-point",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LanguageDescriptor {
    pub id: String,
    /// Source file extension without the leading dot
    pub extension: String,
    pub strategy: Strategy,
}

impl LanguageDescriptor {
    fn new(id: &str, extension: &str, strategy: Strategy) -> Self {
        Self {
            id: id.to_string(),
            extension: extension.to_string(),
            strategy,
        }
    }

    /// The conventional source file name, `main.<ext>`
    pub fn main_file_name(&self) -> String {
        format!("main.{}", self.extension)
    }
}

/// Substitute template placeholders in an argument list
pub fn expand_args(template: &[String], replacements: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            replacements
                .iter()
                .fold(arg.clone(), |acc, (from, to)| acc.replace(from, to))
        })
        .collect()
}

/// Read-only mapping from language identifier to its descriptor
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<Arc<LanguageDescriptor>>,
}

impl LanguageRegistry {
    /// The built-in language set in advertised order
    pub fn builtin() -> Self {
        Self::from_descriptors(builtin_descriptors())
    }

    fn from_descriptors(descriptors: Vec<LanguageDescriptor>) -> Self {
        Self {
            languages: descriptors.into_iter().map(Arc::new).collect(),
        }
    }

    /// The built-in set with the binary overrides from `config` applied
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut descriptors = builtin_descriptors();

        for (language, overrides) in &config.languages {
            let Some(descriptor) = descriptors
                .iter_mut()
                .find(|d| d.id.eq_ignore_ascii_case(language))
            else {
                warn!("Ignoring overrides for unknown language '{}'", language);
                continue;
            };

            match &mut descriptor.strategy {
                Strategy::Sandboxed => {}
                Strategy::Interpreted { interpreter } => {
                    if let Some(path) = &overrides.interpreter {
                        *interpreter = path.clone();
                    }
                }
                Strategy::Compiled { compiler, .. } => {
                    if let Some(path) = &overrides.compiler {
                        *compiler = path.clone();
                    }
                }
                Strategy::EntryPoint { compiler, runtime, .. } => {
                    if let Some(path) = &overrides.compiler {
                        *compiler = path.clone();
                    }
                    if let Some(path) = &overrides.runtime {
                        *runtime = path.clone();
                    }
                }
            }
        }

        Self::from_descriptors(descriptors)
    }

    /// Case-insensitive, exact-match lookup
    pub fn resolve(&self, language: &str) -> Option<Arc<LanguageDescriptor>> {
        self.languages
            .iter()
            .find(|d| d.id.eq_ignore_ascii_case(language))
            .cloned()
    }

    pub fn supported_languages(&self) -> Vec<String> {
        self.languages.iter().map(|d| d.id.clone()).collect()
    }
}

fn builtin_descriptors() -> Vec<LanguageDescriptor> {
    let compile_to_main = || {
        vec![
            "-o".to_string(),
            OUTPUT_PLACEHOLDER.to_string(),
            SOURCE_PLACEHOLDER.to_string(),
        ]
    };

    vec![
        LanguageDescriptor::new("javascript", "js", Strategy::Sandboxed),
        LanguageDescriptor::new(
            "python",
            "py",
            Strategy::Interpreted {
                interpreter: "python3".to_string(),
            },
        ),
        LanguageDescriptor::new(
            "ruby",
            "rb",
            Strategy::Interpreted {
                interpreter: "ruby".to_string(),
            },
        ),
        LanguageDescriptor::new(
            "c",
            "c",
            Strategy::Compiled {
                compiler: "gcc".to_string(),
                compile_args: compile_to_main(),
            },
        ),
        LanguageDescriptor::new(
            "cpp",
            "cpp",
            Strategy::Compiled {
                compiler: "g++".to_string(),
                compile_args: compile_to_main(),
            },
        ),
        LanguageDescriptor::new(
            "java",
            "java",
            Strategy::EntryPoint {
                compiler: "javac".to_string(),
                compile_args: vec![SOURCE_PLACEHOLDER.to_string()],
                runtime: "java".to_string(),
                run_args: vec![ENTRY_PLACEHOLDER.to_string()],
                entry_pattern: PUBLIC_CLASS.clone(),
                entry_description: "public class".to_string(),
            },
        ),
    ]
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
