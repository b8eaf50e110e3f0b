//! Source discovery and per-file compilation.
//!
//! Each source file is compiled independently; no state is carried from
//! one file to the next. Output is only written for files that compile
//! without error.
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    compiler::{self, CompiledClass},
    constants::{SOURCE_EXTENSION, VM_EXTENSION},
    error::{JackError, JackResult},
};

/// Suffix appended to the file stem of a token dump.
const TOKENS_SUFFIX: &str = "T";
const XML_EXTENSION: &str = "xml";

#[derive(Debug, Clone)]
pub struct CompilerConf {
    /// Extension of source files, without the leading dot.
    pub source_ext: String,
    /// Extension of emitted VM files, without the leading dot.
    pub output_ext: String,
    /// Directory to write output to. When `None` each output
    /// file is written next to its source.
    pub out_dir: Option<PathBuf>,
}

impl Default for CompilerConf {
    fn default() -> Self {
        Self {
            source_ext: SOURCE_EXTENSION.to_owned(),
            output_ext: VM_EXTENSION.to_owned(),
            out_dir: None,
        }
    }
}

/// Outcome of compiling a set of source files.
#[derive(Debug, Default)]
pub struct Report {
    /// Output files written, in compilation order.
    pub compiled: Vec<PathBuf>,
    /// Source files that failed, with their error.
    pub failed: Vec<(PathBuf, JackError)>,
}

impl Report {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Source files denoted by the path.
///
/// A file path must carry the source extension. A directory is scanned
/// without recursing, and its source files are returned sorted by name.
pub fn find_sources(path: &Path, conf: &CompilerConf) -> JackResult<Vec<PathBuf>> {
    let metadata = fs::metadata(path)?;

    if metadata.is_dir() {
        let mut sources = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.is_file() && has_extension(&entry_path, &conf.source_ext) {
                sources.push(entry_path);
            }
        }

        if sources.is_empty() {
            return Err(JackError::NoSources(path.to_path_buf()));
        }

        sources.sort();
        Ok(sources)
    } else if has_extension(path, &conf.source_ext) {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(JackError::InvalidSource(path.to_path_buf()))
    }
}

/// Path the VM code of a source file is written to.
pub fn output_path(source: &Path, conf: &CompilerConf) -> PathBuf {
    let target = source.with_extension(&conf.output_ext);
    match (&conf.out_dir, target.file_name()) {
        (Some(dir), Some(file_name)) => dir.join(file_name),
        _ => target,
    }
}

/// Compile source text of one class.
#[inline]
pub fn compile_source(source: &str) -> JackResult<CompiledClass> {
    compiler::compile(source)
}

/// Compile one source file, returning the path of the written output.
pub fn compile_file(path: &Path, conf: &CompilerConf) -> JackResult<PathBuf> {
    let source = read_source(path)?;
    let class = compile_source(&source)?;

    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        if stem != class.name.as_str() {
            log::warn!("{}: class {} is declared in file named {stem}", path.display(), class.name);
        }
    }

    let output = output_path(path, conf);
    if let Some(dir) = &conf.out_dir {
        fs::create_dir_all(dir)?;
    }
    fs::write(&output, class.code)?;

    log::info!("{} -> {}", path.display(), output.display());

    Ok(output)
}

/// Compile every source file the path denotes.
///
/// A failed file does not stop the remaining files from compiling.
pub fn compile_path(path: &Path, conf: &CompilerConf) -> JackResult<Report> {
    let sources = find_sources(path, conf)?;
    log::debug!("found {} source file(s) in {}", sources.len(), path.display());

    let mut report = Report::default();

    for source in sources {
        match compile_file(&source, conf) {
            Ok(output) => report.compiled.push(output),
            Err(err) => {
                log::error!("{}: {err}", source.display());
                report.failed.push((source, err));
            }
        }
    }

    Ok(report)
}

/// Write the token dump of a source file next to it, as `<stem>T.xml`.
pub fn tokenize_file(path: &Path) -> JackResult<PathBuf> {
    let source = read_source(path)?;
    let xml = compiler::tokens_xml(&source)?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| JackError::InvalidSource(path.to_path_buf()))?;
    let output = path.with_file_name(format!("{stem}{TOKENS_SUFFIX}.{XML_EXTENSION}"));

    fs::write(&output, xml)?;
    log::info!("{} -> {}", path.display(), output.display());

    Ok(output)
}

fn read_source(path: &Path) -> JackResult<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8(bytes)?)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

#[cfg(test)]
mod test {
    use super::*;

    const MAIN: &str = "class Main { function void main() { return; } }";

    /// Fresh scratch directory, unique per test.
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("jack-driver-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_output_path() {
        let mut conf = CompilerConf::default();
        assert_eq!(output_path(Path::new("src/Main.jack"), &conf), PathBuf::from("src/Main.vm"));

        conf.out_dir = Some(PathBuf::from("build"));
        assert_eq!(output_path(Path::new("src/Main.jack"), &conf), PathBuf::from("build/Main.vm"));
    }

    #[test]
    fn test_find_sources_sorted() {
        let dir = scratch_dir("find");
        fs::write(dir.join("Square.jack"), "").unwrap();
        fs::write(dir.join("Main.jack"), "").unwrap();
        fs::write(dir.join("Main.vm"), "").unwrap();
        fs::create_dir_all(dir.join("nested.jack")).unwrap();

        let conf = CompilerConf::default();
        let sources = find_sources(&dir, &conf).unwrap();
        assert_eq!(sources, [dir.join("Main.jack"), dir.join("Square.jack")]);

        assert_eq!(find_sources(&dir.join("Main.jack"), &conf).unwrap(), [dir.join("Main.jack")]);
        assert!(matches!(
            find_sources(&dir.join("Main.vm"), &conf),
            Err(JackError::InvalidSource(_))
        ));
        assert!(matches!(
            find_sources(&dir.join("Missing.jack"), &conf),
            Err(JackError::Io(_))
        ));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_no_sources() {
        let dir = scratch_dir("empty");
        assert!(matches!(
            find_sources(&dir, &CompilerConf::default()),
            Err(JackError::NoSources(_))
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_compile_path_continues_after_failure() {
        let dir = scratch_dir("report");
        fs::write(dir.join("Bad.jack"), "class Bad { function void f() { let x = 1; } }").unwrap();
        fs::write(dir.join("Main.jack"), MAIN).unwrap();

        let report = compile_path(&dir, &CompilerConf::default()).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.compiled, [dir.join("Main.vm")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, dir.join("Bad.jack"));
        assert!(matches!(report.failed[0].1, JackError::UndefinedSymbol { .. }));

        // nothing is written for the failed file
        assert!(!dir.join("Bad.vm").exists());
        assert_eq!(
            fs::read_to_string(dir.join("Main.vm")).unwrap(),
            "function Main.main 0\npush constant 0\nreturn\n"
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_compile_file_to_out_dir() {
        let dir = scratch_dir("out");
        let source = dir.join("Main.jack");
        fs::write(&source, MAIN).unwrap();

        let conf = CompilerConf {
            out_dir: Some(dir.join("build")),
            ..Default::default()
        };
        let output = compile_file(&source, &conf).unwrap();
        assert_eq!(output, dir.join("build").join("Main.vm"));
        assert!(output.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_tokenize_file() {
        let dir = scratch_dir("tokens");
        let source = dir.join("Main.jack");
        fs::write(&source, "class Main { }").unwrap();

        let output = tokenize_file(&source).unwrap();
        assert_eq!(output, dir.join("MainT.xml"));
        assert_eq!(
            fs::read_to_string(output).unwrap(),
            "<tokens>\n<keyword> class </keyword>\n<identifier> Main </identifier>\n<symbol> { </symbol>\n<symbol> } </symbol>\n</tokens>\n"
        );

        fs::remove_dir_all(&dir).unwrap();
    }
}
