//! Fake HTTP and subprocess backends that record every call

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use super::command::{CommandError, CommandOutput, CommandRunner};
use super::http::{HttpClient, HttpResponse, TransportError};

/// Matches `path?name&name=value` patterns against rendered calls
fn call_matches(pattern: &str, call: &str) -> bool {
    let (pattern_path, pattern_query) = pattern.split_once('?').unwrap_or((pattern, ""));
    let (call_path, call_query) = call.split_once('?').unwrap_or((call, ""));
    if !call_path.contains(pattern_path) {
        return false;
    }
    let params: Vec<(&str, &str)> = call_query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .collect();
    pattern_query
        .split('&')
        .filter(|t| !t.is_empty())
        .all(|token| match token.split_once('=') {
            Some((name, value)) => params.iter().any(|(k, v)| *k == name && *v == value),
            None => params.iter().any(|(k, _)| *k == token),
        })
}

struct Rule {
    pattern: String,
    responses: VecDeque<(u16, String)>,
}

/// Canned responses by pattern; unmatched calls fail at the transport level
#[derive(Default)]
pub struct FakeHttp {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn respond(&self, pattern: &str, status: u16, body: &str) {
        self.respond_seq(pattern, vec![(status, body.to_string())]);
    }

    /// Responses are consumed in order; the last one repeats
    pub fn respond_seq(&self, pattern: &str, responses: Vec<(u16, String)>) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            responses: responses.into(),
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| call_matches(pattern, c))
            .count()
    }
}

impl HttpClient for FakeHttp {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        _bearer: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let rendered: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        let call = format!("{}?{}", url, rendered.join("&"));
        self.calls.lock().unwrap().push(call.clone());

        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .find(|r| call_matches(&r.pattern, &call))
            .ok_or_else(|| TransportError {
                message: format!("connection refused: {}", url),
            })?;
        let (status, body) = if rule.responses.len() > 1 {
            rule.responses.pop_front().unwrap()
        } else {
            rule.responses.front().cloned().unwrap()
        };
        Ok(HttpResponse { status, body })
    }
}

/// Side effect a fake command performs before returning
pub type FakeEffect = Box<dyn Fn(&[String]) + Send + Sync>;

/// Scripted subprocess results, in call order; the last one repeats
#[derive(Default)]
pub struct FakeRunner {
    results: Mutex<VecDeque<Result<CommandOutput, CommandError>>>,
    effect: Mutex<Option<FakeEffect>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn push_ok(&self, stdout: &str) {
        self.results.lock().unwrap().push_back(Ok(CommandOutput {
            success: true,
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }));
    }

    pub fn push_failure(&self, code: i32, stderr: &str) {
        self.results.lock().unwrap().push_back(Ok(CommandOutput {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }));
    }

    pub fn push_error(&self, error: CommandError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn on_run(&self, effect: FakeEffect) {
        *self.effect.lock().unwrap() = Some(effect);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        _timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        self.calls.lock().unwrap().push(call);

        if let Some(effect) = self.effect.lock().unwrap().as_ref() {
            effect(args);
        }

        let mut results = self.results.lock().unwrap();
        if results.len() > 1 {
            results.pop_front().unwrap()
        } else {
            results.front().cloned().unwrap_or_else(|| {
                Err(CommandError::NotFound {
                    program: program.to_string(),
                })
            })
        }
    }
}

/// Value of `flag` in an argument list (`-o <value>`)
pub fn arg_value(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}
