use std::fs;
use std::path::Path;
use std::time::Instant;

use sieve_compiler::{BuildStats, IndexBuilder};
use sieve_core::FilterIndex;

#[derive(Debug, Clone)]
pub struct CompileStats {
    pub lines: usize,
    pub build: BuildStats,
    pub parse_ms: f64,
    pub build_ms: f64,
}

/// Read and index `inputs`. Unlike the host runtime, a missing list is an
/// error here.
pub fn compile_lists(inputs: &[String], verbose: bool) -> Result<(FilterIndex, CompileStats), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let mut builder = IndexBuilder::new();
    let mut lines = 0usize;

    for (list_id, path) in inputs.iter().enumerate() {
        let bytes = fs::read(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        let content = String::from_utf8_lossy(&bytes);
        let stats = builder.add_list(&content);
        lines += stats.lines;
        if stats.errors > 0 {
            log::warn!("{path}: skipped {} malformed lines", stats.errors);
        }

        if verbose {
            println!(
                "  [{}] {} - {} lines, {} rules, {} skipped",
                list_id,
                Path::new(path).file_name().unwrap_or_default().to_string_lossy(),
                stats.lines,
                stats.rules,
                stats.errors
            );
        }
    }

    let parse_ms = start.elapsed().as_secs_f64() * 1000.0;
    let build_start = Instant::now();
    let (index, build) = builder.build();
    let build_ms = build_start.elapsed().as_secs_f64() * 1000.0;
    log::info!(
        "compiled {} lists into {} rules in {:.1}ms",
        inputs.len(),
        build.index.rules,
        parse_ms + build_ms
    );

    Ok((
        index,
        CompileStats {
            lines,
            build,
            parse_ms,
            build_ms,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_lists_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "||ads.com^\n||ads.com^\n").unwrap();
        fs::write(&b, "0.0.0.0 tracker.net\n/banner/track.js\n").unwrap();

        let inputs = vec![a.display().to_string(), b.display().to_string()];
        let (index, stats) = compile_lists(&inputs, false).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.build.optimize.deduped, 1);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.txt");
        fs::write(&list, "/(unclosed/\n||tracker.net^\n").unwrap();

        let (index, stats) = compile_lists(&[list.display().to_string()], false).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(stats.build.parse.errors, 1);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt").display().to_string();
        assert!(compile_lists(&[missing], false).is_err());
        assert!(compile_lists(&[], false).is_err());
    }
}
