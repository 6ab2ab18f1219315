//! Transcripts through the extraction tool's subtitle writer

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::command::CommandRunner;
use super::listing_tool::{command_error, failed_run, ToolOptions};
use super::retry::RetryPolicy;
use crate::error::{ProviderError, ProviderErrorKind};

pub const STRATEGY: &str = "transcripts:tool";

pub struct ToolTranscripts {
    runner: Arc<dyn CommandRunner>,
    options: ToolOptions,
    retry: RetryPolicy,
}

impl ToolTranscripts {
    pub fn new(runner: Arc<dyn CommandRunner>, options: ToolOptions, retry: RetryPolicy) -> Self {
        Self {
            runner,
            options,
            retry,
        }
    }

    /// Write the item's subtitles to `dest` (a `.vtt` path)
    pub fn fetch(&self, item_id: &str, item_url: &str, dest: &Path) -> Result<PathBuf, ProviderError> {
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let stem = dest
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| io_error(format!("invalid artifact path {}", dest.display())))?;
        fs::create_dir_all(dir).map_err(|e| io_error(e.to_string()))?;

        let template = dir.join(format!("{}.%(ext)s", stem));
        let mut args = vec![
            "--skip-download".to_string(),
            "--write-subs".to_string(),
            "--write-auto-subs".to_string(),
            "--sub-format".to_string(),
            "vtt".to_string(),
            "--no-warnings".to_string(),
            "-o".to_string(),
            template.display().to_string(),
        ];
        args.extend(self.options.network_args());
        args.push(item_url.to_string());

        self.retry.run("subtitle download", || {
            let output = self
                .runner
                .run(&self.options.program, &args, self.options.timeout)
                .map_err(|e| command_error(STRATEGY, e))?;
            if !output.success {
                return Err(failed_run(STRATEGY, &output));
            }
            Ok(())
        })?;

        let produced = produced_subtitles(dir, stem).map_err(|e| io_error(e.to_string()))?;
        let Some(chosen) = pick_subtitle(&produced) else {
            return Err(ProviderError::new(
                STRATEGY,
                ProviderErrorKind::NotAvailable,
                format!("no subtitles published for {}", item_id),
            ));
        };

        debug!(item_id, from = %chosen.display(), to = %dest.display(), "moving subtitle file");
        fs::rename(chosen, dest).map_err(|e| io_error(e.to_string()))?;
        for extra in produced.iter().filter(|p| *p != chosen) {
            let _ = fs::remove_file(extra);
        }
        Ok(dest.to_path_buf())
    }
}

impl ToolTranscripts {
    /// Ask the tool which subtitle tracks exist, without writing anything
    pub fn is_available(&self, item_id: &str, item_url: &str) -> Result<bool, ProviderError> {
        let mut args = vec![
            "--skip-download".to_string(),
            "--list-subs".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(self.options.network_args());
        args.push(item_url.to_string());

        let output = self.retry.run("subtitle listing", || {
            let output = self
                .runner
                .run(&self.options.program, &args, self.options.timeout)
                .map_err(|e| command_error(STRATEGY, e))?;
            if !output.success {
                return Err(failed_run(STRATEGY, &output));
            }
            Ok(output)
        })?;

        let available = lists_tracks(&output.stdout);
        debug!(item_id, available, "subtitle tracks listed");
        Ok(available)
    }
}

/// `--list-subs` prints a table header per kind of track it found
fn lists_tracks(listing: &str) -> bool {
    listing.lines().any(|line| {
        line.contains("Available subtitles for") || line.contains("Available automatic captions for")
    })
}

/// Files the tool wrote for `stem`: `<stem>.<lang>.vtt`
fn produced_subtitles(dir: &Path, stem: &str) -> std::io::Result<Vec<PathBuf>> {
    let prefix = format!("{}.", stem);
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_lang_variant = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".vtt"))
            .is_some_and(|lang| !lang.is_empty());
        if is_lang_variant {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// English first, otherwise whatever sorts first
fn pick_subtitle(produced: &[PathBuf]) -> Option<&PathBuf> {
    produced
        .iter()
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(".en.") || n.contains(".en-"))
        })
        .or_else(|| produced.first())
}

fn io_error(message: String) -> ProviderError {
    ProviderError::new(STRATEGY, ProviderErrorKind::NetworkError, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::command::CommandError;
    use crate::provider::testing::{arg_value, FakeRunner};
    use std::time::Duration;
    use tempfile::TempDir;

    fn options() -> ToolOptions {
        ToolOptions {
            program: "yt-dlp".to_string(),
            cookies_file: None,
            proxy: None,
            timeout: Duration::from_secs(5),
        }
    }

    /// Simulate the tool writing `<stem>.<lang>.vtt` next to the `-o` template
    fn writes_langs(runner: &FakeRunner, langs: &'static [&'static str]) {
        runner.on_run(Box::new(move |args| {
            let template = arg_value(args, "-o").unwrap();
            let rendered = template.display().to_string();
            for lang in langs {
                let path = rendered.replace("%(ext)s", &format!("{}.vtt", lang));
                fs::write(path, format!("WEBVTT\n\n{}", lang)).unwrap();
            }
        }));
    }

    #[test]
    fn renames_english_subtitle_to_artifact() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("subs").join("abc.vtt");
        let runner = Arc::new(FakeRunner::default());
        runner.push_ok("");
        writes_langs(&runner, &["de", "en"]);

        let tool = ToolTranscripts::new(runner.clone(), options(), RetryPolicy::immediate(0));
        let path = tool.fetch("abc", "https://youtu.be/abc", &dest).unwrap();

        assert_eq!(path, dest);
        assert!(fs::read_to_string(&dest).unwrap().ends_with("en"));
        assert!(!dest.with_file_name("abc.de.vtt").exists());
        assert!(runner.calls()[0].contains(&"--write-auto-subs".to_string()));
    }

    #[test]
    fn nothing_written_is_not_available() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::default());
        runner.push_ok("");

        let tool = ToolTranscripts::new(runner, options(), RetryPolicy::immediate(0));
        let err = tool
            .fetch("abc", "https://youtu.be/abc", &temp.path().join("abc.vtt"))
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NotAvailable);
        assert_eq!(err.strategy, STRATEGY);
    }

    #[test]
    fn rate_limit_is_reported() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::default());
        runner.push_failure(1, "ERROR: Unable to download: HTTP Error 429: Too Many Requests");

        let tool = ToolTranscripts::new(runner.clone(), options(), RetryPolicy::immediate(2));
        let err = tool
            .fetch("abc", "https://youtu.be/abc", &temp.path().join("abc.vtt"))
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::RateLimited);
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn listed_tracks_mean_available() {
        let runner = Arc::new(FakeRunner::default());
        runner.push_ok(
            "[info] abc has no subtitles\n[info] Available automatic captions for abc:\nLanguage Name Formats\nen English vtt\n",
        );
        let tool = ToolTranscripts::new(runner.clone(), options(), RetryPolicy::immediate(0));

        assert!(tool.is_available("abc", "https://youtu.be/abc").unwrap());
        let call = &runner.calls()[0];
        assert!(call.contains(&"--list-subs".to_string()));
        assert!(!call.contains(&"--write-subs".to_string()));
    }

    #[test]
    fn no_tracks_means_unavailable() {
        let runner = Arc::new(FakeRunner::default());
        runner.push_ok("[info] abc has no subtitles\n[info] abc has no automatic captions\n");
        let tool = ToolTranscripts::new(runner, options(), RetryPolicy::immediate(0));
        assert!(!tool.is_available("abc", "https://youtu.be/abc").unwrap());
    }

    #[test]
    fn availability_check_reports_auth_failure() {
        let runner = Arc::new(FakeRunner::default());
        runner.push_failure(1, "ERROR: Sign in to confirm you're not a bot");
        let tool = ToolTranscripts::new(runner, options(), RetryPolicy::immediate(0));
        let err = tool.is_available("abc", "https://youtu.be/abc").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
    }

    #[test]
    fn timeout_is_network_error() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::default());
        runner.push_error(CommandError::TimedOut {
            program: "yt-dlp".into(),
            timeout: Duration::from_secs(5),
        });

        let tool = ToolTranscripts::new(runner, options(), RetryPolicy::immediate(0));
        let err = tool
            .fetch("abc", "https://youtu.be/abc", &temp.path().join("abc.vtt"))
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NetworkError);
    }
}
