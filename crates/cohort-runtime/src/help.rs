//! User-facing diagnostics channel.
//!
//! Failures the user should read are rendered from a small set of keyed
//! templates rather than logged. The sequencer emits exactly one message per
//! failed bootstrap and one for a degraded affinity request.

use std::io::{self, Write};

/// Topic under which every runtime message is filed.
pub const HELP_TOPIC: &str = "help-cohort-runtime";
/// Key for an aborted bootstrap. Arguments: operation, stage, error string,
/// code description, numeric code.
pub const INTERNAL_FAILURE: &str = "startup:internal-failure";
/// Key for a processor-affinity request that could not be honoured.
/// Arguments: rank.
pub const PAFFINITY_UNAVAILABLE: &str = "startup:paffinity-unavailable";
/// Key for the resolved-parameter dump. Arguments: rank, rendered
/// parameters.
pub const SHOW_PARAMS: &str = "startup:show-params";

/// Sink for user-facing diagnostics.
pub trait HelpChannel: Send + Sync {
    /// Shows the message registered under `topic`/`key`, filled with `args`.
    fn show_help(&self, topic: &str, key: &str, args: &[String]);
}

/// Renders a message for `key` from `args`.
///
/// Unknown keys fall back to listing the arguments so nothing is lost.
#[must_use]
pub fn render(key: &str, args: &[String]) -> String {
    let arg = |index: usize| args.get(index).map_or("<unknown>", String::as_str);
    match key {
        INTERNAL_FAILURE => format!(
            "Process startup could not complete.\n\
             \n\
             A required step failed during {}, so the process cannot take part\n\
             in the job. This usually points at an environment or installation\n\
             problem rather than at the application.\n\
             \n\
             \x20 stage:   {}\n\
             \x20 error:   {}\n\
             \x20 code:    {} ({})\n",
            arg(0),
            arg(1),
            arg(2),
            arg(3),
            arg(4),
        ),
        PAFFINITY_UNAVAILABLE => format!(
            "Processor affinity was requested for rank {} but could not be applied.\n\
             The process continues unbound; performance may differ from a pinned run.\n",
            arg(0),
        ),
        SHOW_PARAMS => format!("Resolved runtime parameters for rank {}:\n{}\n", arg(0), arg(1)),
        _ => format!("[{key}] {}\n", args.join(", ")),
    }
}

/// Writes rendered messages to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrHelpChannel;

impl HelpChannel for StderrHelpChannel {
    fn show_help(&self, topic: &str, key: &str, args: &[String]) {
        let mut stderr = io::stderr().lock();
        let written = writeln!(stderr, "--- {topic} ---\n{}", render(key, args));
        if let Err(error) = written {
            tracing::warn!(target: "cohort_runtime::help", %error, key, "failed to write help message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn internal_failure_names_stage_and_code() {
        let text = render(
            INTERNAL_FAILURE,
            &strings(&["initialize", "stage1-barrier", "no release", "timeout", "-15"]),
        );
        assert!(text.contains("stage:   stage1-barrier"));
        assert!(text.contains("error:   no release"));
        assert!(text.contains("timeout (-15)"));
    }

    #[test]
    fn missing_arguments_render_placeholders() {
        let text = render(PAFFINITY_UNAVAILABLE, &[]);
        assert!(text.contains("rank <unknown>"));
    }

    #[test]
    fn unknown_keys_list_arguments() {
        assert_eq!(render("other", &strings(&["a", "b"])), "[other] a, b\n");
    }
}
