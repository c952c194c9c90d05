// SLURM Job Script Templating
//
// Pure text transforms: rendering a fresh `#SBATCH` header, and mutating an
// existing script (directive lines + command line).

use crate::domain::error::{DomainError, Result};
use crate::domain::settings::SlurmSettings;

const DIRECTIVE_PREFIX: &str = "#SBATCH";
const SHEBANG: &str = "#!/bin/bash -l";

/// Short option spellings accepted by sbatch, mapped to their long form
const SHORT_FLAGS: &[(&str, &str)] = &[
    ("-J", "--job-name"),
    ("-o", "--output"),
    ("-e", "--error"),
    ("-p", "--partition"),
    ("-A", "--account"),
    ("-q", "--qos"),
    ("-t", "--time"),
    ("-N", "--nodes"),
    ("-c", "--cpus-per-task"),
    ("-G", "--gpus"),
];

/// Render the `#SBATCH` header for the given settings
pub fn sbatch_header(slurm: &SlurmSettings) -> String {
    let mut lines = vec![
        SHEBANG.to_string(),
        format!("{} --job-name={}", DIRECTIVE_PREFIX, slurm.effective_job_name()),
    ];
    if !slurm.output.is_empty() {
        lines.push(format!("{} --output={}", DIRECTIVE_PREFIX, slurm.output));
    }
    if !slurm.error.is_empty() {
        lines.push(format!("{} --error={}", DIRECTIVE_PREFIX, slurm.error));
    }
    lines.push(format!("{} --nodes 1", DIRECTIVE_PREFIX));
    if !slurm.partition.is_empty() {
        lines.push(format!("{} -p {}", DIRECTIVE_PREFIX, slurm.partition));
    }
    if slurm.gpus > 0 {
        lines.push(format!("{} --gpus {}", DIRECTIVE_PREFIX, slurm.gpus));
    }
    if slurm.cpus > 0 {
        lines.push(format!("{} --cpus-per-task {}", DIRECTIVE_PREFIX, slurm.cpus));
    }
    if !slurm.mem.is_empty() {
        lines.push(format!("{} --mem {}", DIRECTIVE_PREFIX, slurm.mem));
    }
    if !slurm.time.is_empty() {
        lines.push(format!("{} --time {}", DIRECTIVE_PREFIX, slurm.time));
    }
    if !slurm.account.is_empty() {
        lines.push(format!("{} --account={}", DIRECTIVE_PREFIX, slurm.account));
    }
    if !slurm.qos.is_empty() {
        lines.push(format!("{} --qos={}", DIRECTIVE_PREFIX, slurm.qos));
    }
    if !slurm.additional.is_empty() {
        lines.push(slurm.additional.clone());
    }
    lines.push(String::new());
    if !slurm.env_activation.is_empty() {
        lines.push(slurm.env_activation.clone());
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Fresh job script: header, blank line, command
pub fn render_job_script(command: &str, slurm: &SlurmSettings) -> String {
    format!("{}\n{}\n", sbatch_header(slurm), command)
}

/// Replace the first non-comment line mentioning `python` with `command`
///
/// Appends the command after a blank line when no such line exists.
pub fn splice_command(script: &str, command: &str) -> String {
    let mut lines: Vec<&str> = script.lines().collect();
    let target = lines
        .iter()
        .position(|l| l.contains("python") && !l.trim_start().starts_with('#'));

    match target {
        Some(idx) => {
            lines[idx] = command;
            let mut out = lines.join("\n");
            out.push('\n');
            out
        }
        None => {
            let mut out = script.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
            out.push_str(command);
            out.push('\n');
            out
        }
    }
}

fn canonical_flag(flag: &str) -> &str {
    SHORT_FLAGS
        .iter()
        .find(|(short, _)| *short == flag)
        .map(|(_, long)| *long)
        .unwrap_or(flag)
}

/// Split a directive line into (flag as written, separator)
fn parse_directive(line: &str) -> Option<(&str, char)> {
    let body = line.trim_start().strip_prefix(DIRECTIVE_PREFIX)?;
    if !body.starts_with(char::is_whitespace) {
        return None;
    }
    let body = body.trim_start();
    let end = body
        .find(|c: char| c == '=' || c.is_whitespace())
        .unwrap_or(body.len());
    let flag = &body[..end];
    if flag.is_empty() {
        return None;
    }
    let sep = if body[end..].starts_with('=') { '=' } else { ' ' };
    Some((flag, sep))
}

fn is_directive(line: &str) -> bool {
    parse_directive(line).is_some()
}

/// Set, rewrite or remove one `#SBATCH` directive
///
/// `flag` is the long form (e.g. `--partition`); short spellings already in
/// the script (`-p gpu`) are matched and rewritten in place, keeping their
/// separator. An empty `value` removes every matching directive. A missing
/// directive is inserted after the last existing one (or after the shebang).
pub fn set_directive(script: &str, flag: &str, value: &str) -> Result<String> {
    if !flag.starts_with("--") || flag.len() < 3 || flag.contains(char::is_whitespace) {
        return Err(DomainError::InvalidDirective(flag.to_string()));
    }
    if value.contains('\n') {
        return Err(DomainError::InvalidDirective(format!(
            "{}: value spans several lines",
            flag
        )));
    }

    let trailing_newline = script.ends_with('\n');
    let mut lines: Vec<String> = script.lines().map(str::to_string).collect();

    let matches_flag = |line: &str| {
        parse_directive(line)
            .map(|(written, _)| canonical_flag(written) == flag)
            .unwrap_or(false)
    };

    if value.is_empty() {
        lines.retain(|l| !matches_flag(l));
    } else if let Some(idx) = lines.iter().position(|l| matches_flag(l)) {
        if let Some((written, sep)) = parse_directive(&lines[idx]) {
            lines[idx] = format!("{} {}{}{}", DIRECTIVE_PREFIX, written, sep, value);
        }
    } else {
        let insert_at = match lines.iter().rposition(|l| is_directive(l)) {
            Some(last) => last + 1,
            None => lines
                .first()
                .filter(|l| l.starts_with("#!"))
                .map(|_| 1)
                .unwrap_or(0),
        };
        lines.insert(insert_at, format!("{} {}={}", DIRECTIVE_PREFIX, flag, value));
    }

    let mut out = lines.join("\n");
    if trailing_newline || !script.contains('\n') && !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

/// Apply every configured (non-empty) SLURM field to an existing script
///
/// Fields left empty in the settings do not touch the script.
pub fn apply_settings(script: &str, slurm: &SlurmSettings) -> Result<String> {
    let gpus = (slurm.gpus > 0).then(|| slurm.gpus.to_string());
    let cpus = (slurm.cpus > 0).then(|| slurm.cpus.to_string());

    let fields: [(&str, Option<&str>); 10] = [
        ("--job-name", Some(slurm.job_name.as_str())),
        ("--output", Some(slurm.output.as_str())),
        ("--error", Some(slurm.error.as_str())),
        ("--partition", Some(slurm.partition.as_str())),
        ("--account", Some(slurm.account.as_str())),
        ("--qos", Some(slurm.qos.as_str())),
        ("--gpus", gpus.as_deref()),
        ("--cpus-per-task", cpus.as_deref()),
        ("--mem", Some(slurm.mem.as_str())),
        ("--time", Some(slurm.time.as_str())),
    ];

    let mut out = script.to_string();
    for (flag, value) in fields {
        match value {
            Some(v) if !v.is_empty() => out = set_directive(&out, flag, v)?,
            _ => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slurm() -> SlurmSettings {
        SlurmSettings {
            partition: "gpu".to_string(),
            account: "lab".to_string(),
            env_activation: "conda activate gnn".to_string(),
            ..SlurmSettings::default()
        }
    }

    #[test]
    fn test_header_emits_only_configured_directives() {
        let header = sbatch_header(&slurm());

        assert!(header.starts_with("#!/bin/bash -l\n#SBATCH --job-name=gnn_job\n"));
        assert!(header.contains("#SBATCH -p gpu\n"));
        assert!(header.contains("#SBATCH --gpus 1\n"));
        assert!(header.contains("#SBATCH --mem 16G\n"));
        assert!(header.contains("#SBATCH --account=lab\n"));
        assert!(header.contains("conda activate gnn\n"));
        assert!(!header.contains("--qos"));
        assert!(!header.contains("--output"));
    }

    #[test]
    fn test_header_falls_back_to_default_job_name() {
        let settings = SlurmSettings {
            job_name: "  ".to_string(),
            ..SlurmSettings::default()
        };
        let header = sbatch_header(&settings);
        assert!(header.contains("#SBATCH --job-name=gnn_job\n"));
        assert!(!header.contains("--job-name=\n"));
    }

    #[test]
    fn test_header_skips_zero_gpus() {
        let settings = SlurmSettings {
            gpus: 0,
            ..SlurmSettings::default()
        };
        assert!(!sbatch_header(&settings).contains("--gpus"));
    }

    #[test]
    fn test_render_places_command_last() {
        let script = render_job_script("python train.py --model GCN", &slurm());
        assert!(script.ends_with("\n\npython train.py --model GCN\n"));
    }

    #[test]
    fn test_splice_replaces_first_python_line() {
        let template = "#!/bin/bash\n# python old.py (comment)\nmodule load cuda\npython old.py --x 1\npython second.py\n";

        let out = splice_command(template, "python new.py");

        assert_eq!(
            out,
            "#!/bin/bash\n# python old.py (comment)\nmodule load cuda\npython new.py\npython second.py\n"
        );
    }

    #[test]
    fn test_splice_appends_when_no_python_line() {
        let out = splice_command("#!/bin/bash\n#SBATCH -p gpu", "./run.sh");
        assert_eq!(out, "#!/bin/bash\n#SBATCH -p gpu\n\n./run.sh\n");
    }

    #[test]
    fn test_set_directive_rewrites_short_form() {
        let script = "#!/bin/bash\n#SBATCH -p cpu\n#SBATCH --mem=4G\necho hi\n";

        let out = set_directive(script, "--partition", "gpu").unwrap();
        let out = set_directive(&out, "--mem", "32G").unwrap();

        assert_eq!(out, "#!/bin/bash\n#SBATCH -p gpu\n#SBATCH --mem=32G\necho hi\n");
    }

    #[test]
    fn test_set_directive_inserts_after_last_directive() {
        let script = "#!/bin/bash\n#SBATCH --nodes 1\n\npython a.py\n";

        let out = set_directive(script, "--qos", "high").unwrap();

        assert_eq!(
            out,
            "#!/bin/bash\n#SBATCH --nodes 1\n#SBATCH --qos=high\n\npython a.py\n"
        );
    }

    #[test]
    fn test_set_directive_inserts_after_shebang() {
        let out = set_directive("#!/bin/bash\npython a.py\n", "--time", "01:00:00").unwrap();
        assert_eq!(out, "#!/bin/bash\n#SBATCH --time=01:00:00\npython a.py\n");
    }

    #[test]
    fn test_set_directive_empty_value_removes() {
        let script = "#SBATCH --qos=high\n#SBATCH -q low\necho\n";
        let out = set_directive(script, "--qos", "").unwrap();
        assert_eq!(out, "echo\n");
    }

    #[test]
    fn test_set_directive_ignores_lookalike_lines() {
        let script = "#SBATCHX --mem 1G\n# SBATCH --mem 2G\n";
        let out = set_directive(script, "--mem", "8G").unwrap();
        assert_eq!(out, "#SBATCH --mem=8G\n#SBATCHX --mem 1G\n# SBATCH --mem 2G\n");
    }

    #[test]
    fn test_set_directive_rejects_bad_flag() {
        assert!(set_directive("", "partition", "gpu").is_err());
        assert!(set_directive("", "--mem", "1G\nrm -rf /").is_err());
    }

    #[test]
    fn test_apply_settings_keeps_unconfigured_directives() {
        let template = "#!/bin/bash\n#SBATCH --output=/logs/out.txt\n#SBATCH -p cpu\npython old.py\n";

        let out = apply_settings(template, &slurm()).unwrap();

        assert!(out.contains("#SBATCH --output=/logs/out.txt\n"));
        assert!(out.contains("#SBATCH -p gpu\n"));
        assert!(out.contains("#SBATCH --account=lab\n"));
        assert!(out.contains("#SBATCH --job-name=gnn_job\n"));
        assert!(out.ends_with("python old.py\n"));
    }
}
