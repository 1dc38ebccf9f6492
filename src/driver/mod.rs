//! Batch driver
//!
//! Runs the tokenizer and compilation engine over one or many `.jack` files.
//! Every unit gets its own {Tokenizer, CompilationEngine} pair; units are
//! spread over scoped worker threads and a failure only marks its own unit.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::backend::xml::token_dump;
use crate::backend::{XmlStyle, XmlWriter};
use crate::frontend::lexer::Tokenizer;
use crate::frontend::parser::parse;
use crate::frontend::token::{Token, TokenKind, MAX_INT};
use crate::utils::{Error, Result};

/// Source file extension
pub const SOURCE_EXTENSION: &str = "jack";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Batch processing configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Worker threads; at least one
    pub jobs: usize,
    /// Directory for outputs, next to each source when unset
    pub out_dir: Option<PathBuf>,
    /// Write `XxxT.xml`
    pub emit_tokens: bool,
    /// Layout of `Xxx.xml`
    pub style: XmlStyle,
    /// When false the units are only checked
    pub write_outputs: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            out_dir: None,
            emit_tokens: true,
            style: XmlStyle::Indented,
            write_outputs: true,
        }
    }
}

/// Available parallelism, capped at 8
pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4)
}

// ============================================================================
// RESULTS
// ============================================================================

/// What a successful unit produced
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSummary {
    pub token_count: usize,
    pub outputs: Vec<PathBuf>,
}

/// Result of processing one source file
#[derive(Debug)]
pub struct UnitOutcome {
    pub path: PathBuf,
    pub result: Result<UnitSummary>,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Results of a batch run, in input order
#[derive(Debug, Default)]
pub struct BatchResults {
    pub outcomes: Vec<UnitOutcome>,
    pub duration: Duration,
}

impl BatchResults {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn summary(&self) -> String {
        format!(
            "Analysis complete: {} files processed, {} successful, {} failed, {:.2}s total",
            self.outcomes.len(),
            self.success_count(),
            self.failure_count(),
            self.duration.as_secs_f64()
        )
    }
}

/// Errors locating the sources of a run
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("source path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no .jack files found in {}", .0.display())]
    NoSources(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// PIPELINE
// ============================================================================

/// A file is used as-is; a directory yields its `.jack` files, sorted
pub fn discover(path: &Path) -> std::result::Result<Vec<PathBuf>, DiscoveryError> {
    if !path.exists() {
        return Err(DiscoveryError::NotFound(path.to_path_buf()));
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let io_err = |source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(io_err)? {
        let entry_path = entry.map_err(io_err)?.path();
        let is_source = entry_path.is_file()
            && entry_path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION);
        if is_source {
            files.push(entry_path);
        }
    }

    if files.is_empty() {
        return Err(DiscoveryError::NoSources(path.to_path_buf()));
    }
    files.sort();
    debug!("discovered {} source files in {}", files.len(), path.display());
    Ok(files)
}

/// Run the compilation engine and render the parse tree
pub fn render_tree(tokenizer: Tokenizer, style: XmlStyle) -> Result<String> {
    let mut writer = XmlWriter::new(Vec::new(), style);
    parse(tokenizer, &mut writer)?;
    debug_assert_eq!(writer.depth(), 0, "unbalanced tag stream");
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Output path for `source`: `Foo.jack` + `T.xml` -> `FooT.xml`
pub fn output_path(source: &Path, config: &BatchConfig, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = match &config.out_dir {
        Some(dir) => dir.clone(),
        None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    dir.join(format!("{stem}{suffix}"))
}

/// Process one file, reporting a failure on stderr
pub fn analyze_file(path: &Path, config: &BatchConfig) -> UnitOutcome {
    info!("analyzing {}", path.display());
    let result = process_unit(path, config);

    match &result {
        Ok(summary) => info!(
            "finished {} ({} tokens, {} files written)",
            path.display(),
            summary.token_count,
            summary.outputs.len()
        ),
        Err(err) => report_failure(path, err),
    }

    UnitOutcome {
        path: path.to_path_buf(),
        result,
    }
}

fn process_unit(path: &Path, config: &BatchConfig) -> Result<UnitSummary> {
    let source = fs::read_to_string(path).map_err(|e| file_error(path, e))?;
    let tokenizer = Tokenizer::new(&source)?;
    let token_count = tokenizer.len();

    for token in out_of_range_constants(tokenizer.tokens()) {
        warn!(
            "{}:{}: integer constant {} is larger than {MAX_INT}",
            path.display(),
            token.line,
            token.text
        );
    }
    let mut outputs = Vec::new();

    if config.write_outputs && config.emit_tokens {
        let target = output_path(path, config, "T.xml");
        fs::write(&target, token_dump(tokenizer.tokens())?).map_err(|e| file_error(&target, e))?;
        outputs.push(target);
    }

    let tree = render_tree(tokenizer, config.style)?;

    if config.write_outputs {
        let target = output_path(path, config, ".xml");
        fs::write(&target, tree).map_err(|e| file_error(&target, e))?;
        outputs.push(target);
    }

    Ok(UnitSummary {
        token_count,
        outputs,
    })
}

fn file_error(path: &Path, source: io::Error) -> Error {
    Error::File {
        path: path.to_path_buf(),
        source,
    }
}

/// Integer constants outside 0..=32767; the grammar accepts them as written
pub fn out_of_range_constants(tokens: &[Token]) -> impl Iterator<Item = &Token> {
    tokens
        .iter()
        .filter(|t| t.kind == TokenKind::IntegerConstant && t.int_value().is_none())
}

/// Format the diagnostic for a failed unit
pub fn format_failure(path: &Path, err: &Error) -> String {
    let mut message = match err.line() {
        Some(line) => format!("Error in file {}:{line} -> {err}\n", path.display()),
        None => format!("Error in file {} -> {err}\n", path.display()),
    };
    if let Some(text) = err.offending_text() {
        message.push('\t');
        message.push_str(text);
        message.push('\n');
    }
    message
}

/// One write per diagnostic so concurrent workers never interleave
fn report_failure(path: &Path, err: &Error) {
    debug!("{} failed with {}", path.display(), err.code());
    let message = format_failure(path, err);
    if let Err(e) = io::stderr().lock().write_all(message.as_bytes()) {
        warn!("could not write diagnostic for {}: {e}", path.display());
    }
}

/// Process all files on up to `config.jobs` scoped threads
pub fn run_batch(files: &[PathBuf], config: &BatchConfig) -> BatchResults {
    let start = Instant::now();
    let jobs = config.jobs.clamp(1, files.len().max(1));
    let chunk_size = files.len().div_ceil(jobs).max(1);
    info!("processing {} files on {} workers", files.len(), jobs);

    let outcomes: Vec<UnitOutcome> = thread::scope(|scope| {
        let workers: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|path| analyze_file(path, config))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        workers
            .into_iter()
            .flat_map(|worker| {
                worker
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    BatchResults {
        outcomes,
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const GOOD: &str = "class Main {\n  function void main() {\n    return;\n  }\n}\n";
    const BAD_SYNTAX: &str = "class Broken {\n  function void run() {\n    let = 1;\n  }\n}\n";
    const BAD_LEX: &str = "class Odd {\n  field int #x;\n}\n";

    fn write_sources(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, source) in files {
            fs::write(dir.path().join(name), source).unwrap();
        }
        dir
    }

    #[test]
    fn test_discover_directory_filters_and_sorts() {
        let dir = write_sources(&[("B.jack", GOOD), ("A.jack", GOOD), ("notes.txt", "x")]);
        let files = discover(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A.jack", "B.jack"]);
    }

    #[test]
    fn test_discover_errors() {
        let dir = write_sources(&[("readme.md", "nothing")]);
        assert!(matches!(discover(dir.path()), Err(DiscoveryError::NoSources(_))));
        assert!(matches!(
            discover(&dir.path().join("missing")),
            Err(DiscoveryError::NotFound(_))
        ));
    }

    #[test]
    fn test_output_paths() {
        let config = BatchConfig::default();
        let source = Path::new("/work/Main.jack");
        assert_eq!(output_path(source, &config, "T.xml"), PathBuf::from("/work/MainT.xml"));

        let config = BatchConfig {
            out_dir: Some(PathBuf::from("/out")),
            ..BatchConfig::default()
        };
        assert_eq!(output_path(source, &config, ".xml"), PathBuf::from("/out/Main.xml"));
    }

    #[test]
    fn test_batch_writes_outputs_and_isolates_failures() {
        let dir = write_sources(&[
            ("Main.jack", GOOD),
            ("Broken.jack", BAD_SYNTAX),
            ("Odd.jack", BAD_LEX),
        ]);
        let files = discover(dir.path()).unwrap();
        let config = BatchConfig {
            jobs: 3,
            ..BatchConfig::default()
        };

        let results = run_batch(&files, &config);
        assert_eq!(results.outcomes.len(), 3);
        assert_eq!(results.success_count(), 1);
        assert_eq!(results.failure_count(), 2);

        // Broken, Main, Odd in input order
        assert!(matches!(
            results.outcomes[0].result,
            Err(Error::UnexpectedToken { line: 3, .. })
        ));
        assert!(results.outcomes[1].is_success());
        assert!(matches!(results.outcomes[2].result, Err(Error::Lex { line: 2, .. })));

        let tree = fs::read_to_string(dir.path().join("Main.xml")).unwrap();
        assert!(tree.starts_with("<class>\n  <keyword> class </keyword>\n"));
        let tokens = fs::read_to_string(dir.path().join("MainT.xml")).unwrap();
        assert!(tokens.starts_with("<tokens>\n<keyword> class </keyword>\n"));
        assert_eq!(tokens.lines().count(), 13 + 2);

        // tokens are written before parsing, the tree only on success
        assert!(dir.path().join("BrokenT.xml").exists());
        assert!(!dir.path().join("Broken.xml").exists());
        assert!(!dir.path().join("OddT.xml").exists());
    }

    #[test]
    fn test_deep_unit_fails_alone() {
        let depth = 20_000;
        let deep = format!(
            "class Deep {{ function void main() {{ let x = {}1{}; return; }} }}",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let dir = write_sources(&[("Deep.jack", deep.as_str()), ("Ok.jack", "class Ok { }")]);
        let config = BatchConfig {
            jobs: 2,
            ..BatchConfig::default()
        };

        let results = run_batch(&discover(dir.path()).unwrap(), &config);
        assert_eq!(results.outcomes.len(), 2);
        assert!(matches!(
            results.outcomes[0].result,
            Err(Error::NestingTooDeep { line: 1, .. })
        ));
        assert!(results.outcomes[1].is_success());
        assert!(dir.path().join("Ok.xml").exists());
    }

    #[test]
    fn test_missing_source_keeps_path_and_cause() {
        let dir = write_sources(&[]);
        let outcome = analyze_file(&dir.path().join("Gone.jack"), &BatchConfig::default());
        match outcome.result {
            Err(Error::File { path, source }) => {
                assert!(path.ends_with("Gone.jack"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_constants() {
        let tokens = Tokenizer::new("let x = 32767 + 32768 - 0;").unwrap();
        let large: Vec<&str> = out_of_range_constants(tokens.tokens())
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(large, vec!["32768"]);
    }

    #[test]
    fn test_check_mode_writes_nothing() {
        let dir = write_sources(&[("Main.jack", GOOD)]);
        let config = BatchConfig {
            write_outputs: false,
            ..BatchConfig::default()
        };
        let results = run_batch(&discover(dir.path()).unwrap(), &config);

        assert_eq!(results.success_count(), 1);
        assert!(!dir.path().join("Main.xml").exists());
        assert!(!dir.path().join("MainT.xml").exists());
    }

    #[test]
    fn test_flat_style_output() {
        let tree = render_tree(Tokenizer::new("class A { }").unwrap(), XmlStyle::Flat).unwrap();
        assert_eq!(
            tree,
            "<class><keyword> class </keyword><identifier> A </identifier>\
             <symbol> { </symbol><symbol> } </symbol></class>"
        );
    }

    #[test]
    fn test_failure_message_format() {
        let err = Error::UnexpectedToken {
            expected: "identifier".to_string(),
            got: crate::frontend::token::TokenKind::IntegerConstant,
            text: "1".to_string(),
            line: 1,
        };
        let message = format_failure(Path::new("Main.jack"), &err);
        assert_eq!(
            message,
            "Error in file Main.jack:1 -> expected identifier, got integerConstant '1'\n\t1\n"
        );
    }
}
