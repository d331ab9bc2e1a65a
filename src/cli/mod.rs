//! Command-line interface: a minimal, in-scope demonstration of the
//! three external-interface operations. It parses `--theme`, `--style`,
//! `--use-fixed`, and `--seeds`, calls `load_and_resolve` →
//! `apply_overrides` → `enumerate_plan`, and prints each rendered item
//! plus a final summary to stdout. It does not perform HTTP calls, write
//! a manifest, or launch any of the out-of-scope collaborators.

use std::path::PathBuf;

use clap::Parser;
use indexmap::IndexMap;

use crate::config::Config;
use crate::error::PromptloomError;
use crate::pipeline;

/// Resolve a template and enumerate its generation plan.
#[derive(Parser, Debug)]
#[command(
    name = "promptloom",
    about = "Template resolution and generation-plan core for batch image-prompt generation",
    version
)]
pub struct Cli {
    /// Path to the prompt or template source file to resolve.
    pub template_path: PathBuf,

    /// Apply a named theme overlay, discovered under the configured
    /// configs-root (`{theme}-{Placeholder}[.{style}].yaml`).
    #[arg(long)]
    pub theme: Option<String>,

    /// Apply an explicit theme-config document instead of (or alongside)
    /// `--theme`'s implicit discovery.
    #[arg(long)]
    pub theme_file: Option<PathBuf>,

    /// Style token used to resolve style-qualified theme and fixed-value
    /// entries.
    #[arg(long)]
    pub style: Option<String>,

    /// Pin placeholders to specific variation keys: `"Key1:val1|Key2:val2"`.
    #[arg(long, value_name = "K1:V1|K2:V2")]
    pub use_fixed: Option<String>,

    /// Override the seed assignment: a comma list (`1,2,3`), a range
    /// (`100-103`), or a count-at-start (`4#100`).
    #[arg(long)]
    pub seeds: Option<String>,

    /// Enable debug-level logging (overridden by `RUST_LOG` if set).
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Run the resolve → override → enumerate pipeline and print results.
    pub fn run(&self) -> Result<(), PromptloomError> {
        let cwd = std::env::current_dir().map_err(PromptloomError::Io)?;
        let config = Config::load(&cwd)?;

        let (resolved, context) = pipeline::load_and_resolve(
            &self.template_path,
            self.theme.as_deref(),
            self.theme_file.as_deref(),
            self.style.as_deref(),
            config.configs_root.as_deref(),
        )?;

        let fixed_values = self.use_fixed.as_deref().map(parse_fixed_values).transpose()?;
        let seed_list = self.seeds.as_deref().map(parse_seeds).transpose()?;

        let (context, options) = pipeline::apply_overrides(context, &resolved, fixed_values, seed_list)?;
        let plan = pipeline::enumerate_plan(&resolved, &context, options)?;

        let mut count = 0usize;
        for item in plan {
            println!("{}", item.prompt);
            println!("  seed: {}", item.seed);
            if !item.negative.is_empty() {
                println!("  negative: {}", item.negative);
            }
            count += 1;
        }

        println!("---");
        println!("{count} item(s) enumerated");
        for warning in &resolved.warnings {
            println!("warning: {warning}");
        }

        Ok(())
    }
}

/// Parse `"Key1:val1|Key2:val2"` into an ordered map, preserving the order
/// the user wrote them in (matters only for error-message ordering).
fn parse_fixed_values(spec: &str) -> Result<IndexMap<String, String>, PromptloomError> {
    let mut values = IndexMap::new();
    for pair in spec.split('|') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once(':').ok_or_else(|| PromptloomError::SchemaViolation {
            detail: format!("--use-fixed entry '{pair}' is not of the form Key:value"),
        })?;
        values.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(values)
}

/// Parse `--seeds` in one of its three forms: a comma list, a range
/// `A-B`, or a count-at-start `N#S`.
fn parse_seeds(spec: &str) -> Result<Vec<i64>, PromptloomError> {
    let spec = spec.trim();
    let malformed = |detail: String| PromptloomError::SchemaViolation { detail };

    if let Some((count, start)) = spec.split_once('#') {
        let count: usize = count
            .trim()
            .parse()
            .map_err(|_| malformed(format!("--seeds count '{count}' is not a number")))?;
        let start: i64 = start
            .trim()
            .parse()
            .map_err(|_| malformed(format!("--seeds start '{start}' is not a number")))?;
        return Ok((0..count as i64).map(|i| start + i).collect());
    }

    if let Some((lo, hi)) = spec.split_once('-') {
        let lo: i64 = lo.trim().parse().map_err(|_| malformed(format!("--seeds range start '{lo}' is not a number")))?;
        let hi: i64 = hi.trim().parse().map_err(|_| malformed(format!("--seeds range end '{hi}' is not a number")))?;
        if hi < lo {
            return Err(malformed(format!("--seeds range '{spec}' has end before start")));
        }
        return Ok((lo..=hi).collect());
    }

    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| malformed(format!("--seeds entry '{s}' is not a number"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_list() {
        assert_eq!(parse_seeds("1,2,3").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn parses_range() {
        assert_eq!(parse_seeds("100-103").unwrap(), vec![100, 101, 102, 103]);
    }

    #[test]
    fn parses_count_at_start() {
        assert_eq!(parse_seeds("4#100").unwrap(), vec![100, 101, 102, 103]);
    }

    #[test]
    fn rejects_backwards_range() {
        assert!(parse_seeds("5-2").is_err());
    }

    #[test]
    fn parses_fixed_values() {
        let values = parse_fixed_values("Hair:blonde|Mood:happy").unwrap();
        assert_eq!(values.get("Hair").map(String::as_str), Some("blonde"));
        assert_eq!(values.get("Mood").map(String::as_str), Some("happy"));
    }

    #[test]
    fn rejects_malformed_fixed_value_pair() {
        assert!(parse_fixed_values("Hair-blonde").is_err());
    }
}
