//! Compiler configuration.

use serde::{Deserialize, Serialize};

/// ECMAScript version the compiler emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptTarget {
    Es3,
    #[default]
    Es5,
    Es2015,
    Es2017,
    Es2020,
    EsNext,
}

impl ScriptTarget {
    /// Value accepted by `tsc --target`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Es3 => "ES3",
            Self::Es5 => "ES5",
            Self::Es2015 => "ES2015",
            Self::Es2017 => "ES2017",
            Self::Es2020 => "ES2020",
            Self::EsNext => "ESNext",
        }
    }
}

/// Module format of the emitted code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[default]
    CommonJs,
    Amd,
    Umd,
    System,
    Es2015,
    EsNext,
}

impl ModuleKind {
    /// Value accepted by `tsc --module`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommonJs => "commonjs",
            Self::Amd => "amd",
            Self::Umd => "umd",
            Self::System => "system",
            Self::Es2015 => "es2015",
            Self::EsNext => "esnext",
        }
    }
}

/// Where source-map information goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    /// Embedded in each `.js` file as a data URL, with the sources inlined.
    #[default]
    Inline,
    /// Separate `.js.map` files next to the output.
    External,
}

/// Options passed to the compiler.
///
/// `Default` is the fixed build configuration: ES5, CommonJS, inline source
/// maps, and no output at all when any error is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub target: ScriptTarget,
    pub module: ModuleKind,
    pub source_maps: SourceMapMode,
    pub no_emit_on_error: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            target: ScriptTarget::Es5,
            module: ModuleKind::CommonJs,
            source_maps: SourceMapMode::Inline,
            no_emit_on_error: true,
        }
    }
}

impl CompilerOptions {
    /// Set the source-map mode.
    pub fn with_source_maps(mut self, mode: SourceMapMode) -> Self {
        self.source_maps = mode;
        self
    }

    /// Render as `tsc` command-line flags.
    ///
    /// Output and declaration directories are added by the caller.
    pub fn to_tsc_args(&self) -> Vec<String> {
        let mut args = vec![
            "--target".to_string(),
            self.target.as_str().to_string(),
            "--module".to_string(),
            self.module.as_str().to_string(),
            "--pretty".to_string(),
            "false".to_string(),
        ];

        match self.source_maps {
            SourceMapMode::Inline => {
                args.push("--inlineSourceMap".to_string());
                args.push("--inlineSources".to_string());
            }
            SourceMapMode::External => args.push("--sourceMap".to_string()),
        }

        if self.no_emit_on_error {
            args.push("--noEmitOnError".to_string());
        }

        args
    }
}
